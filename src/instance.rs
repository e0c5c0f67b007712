//! Live form instances and their editing/submission state machine.
//!
//! ```text
//! Pristine -> Dirty -> Validating -> {Valid, Invalid} -> Submitting -> {Submitted, SubmitFailed}
//! ```
//!
//! Writes are O(1): they store the value, mark the field touched and move the
//! form to `Dirty`. Validation only runs on an explicit field check (blur) or
//! when a submission is attempted.

use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::error::{FormsError, FormsResult, LoadError, SubmitError};
use crate::schema::{coerce_bool, ValidationSchema};
use crate::types::{
    Ack, FieldDescriptor, FieldError, FieldKind, FieldValue, FormRecord, FormState, FormStatus,
    Template,
};

/// A user's form data bound to its template and compiled schema.
#[derive(Debug, Clone)]
pub struct FormInstance {
    record: FormRecord,
    template: Arc<Template>,
    schema: Arc<ValidationSchema>,
    state: FormState,
    errors: BTreeMap<String, FieldError>,
    last_error: Option<SubmitError>,
    ack: Option<Ack>,
}

impl FormInstance {
    /// Start a fresh, pristine form for `project_id`.
    pub fn new(
        template: Arc<Template>,
        schema: Arc<ValidationSchema>,
        project_id: impl Into<String>,
        created_by: Option<String>,
    ) -> Self {
        let now = Utc::now();
        let record = FormRecord {
            id: Uuid::new_v4(),
            template_id: template.id.clone(),
            project_id: project_id.into(),
            name: template.name.clone(),
            category: template.category.clone(),
            values: HashMap::new(),
            touched: BTreeSet::new(),
            status: FormStatus::NotStarted,
            created_by,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };

        Self {
            record,
            template,
            schema,
            state: FormState::Pristine,
            errors: BTreeMap::new(),
            last_error: None,
            ack: None,
        }
    }

    /// Bind a persisted record to its template.
    ///
    /// Completed records come back read-only (`Submitted`); records holding
    /// values come back `Dirty`, empty ones `Pristine`.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::Malformed` if the record belongs to another template.
    pub fn bind(
        mut record: FormRecord,
        template: Arc<Template>,
        schema: Arc<ValidationSchema>,
    ) -> FormsResult<Self> {
        if record.template_id != template.id {
            return Err(LoadError::Malformed(format!(
                "form {} references template '{}', not '{}'",
                record.id, record.template_id, template.id
            ))
            .into());
        }

        // An empty file selection comes back from JSON as an empty list.
        for field in template.fields.iter().filter(|f| f.kind == FieldKind::File) {
            if let Some(value) = record.values.get_mut(&field.id) {
                if matches!(value, FieldValue::List(items) if items.is_empty()) {
                    *value = FieldValue::Files(Vec::new());
                }
            }
        }

        let state = if record.status == FormStatus::Completed {
            FormState::Submitted
        } else if record.values.is_empty() {
            FormState::Pristine
        } else {
            FormState::Dirty
        };

        Ok(Self {
            record,
            template,
            schema,
            state,
            errors: BTreeMap::new(),
            last_error: None,
            ack: None,
        })
    }

    pub fn id(&self) -> Uuid {
        self.record.id
    }

    pub fn record(&self) -> &FormRecord {
        &self.record
    }

    pub fn template(&self) -> &Arc<Template> {
        &self.template
    }

    pub fn schema(&self) -> &Arc<ValidationSchema> {
        &self.schema
    }

    pub fn state(&self) -> FormState {
        self.state
    }

    pub fn status(&self) -> FormStatus {
        self.record.status
    }

    pub fn values(&self) -> &HashMap<String, FieldValue> {
        &self.record.values
    }

    pub fn value(&self, field_id: &str) -> Option<&FieldValue> {
        self.record.values.get(field_id)
    }

    pub fn touched(&self) -> &BTreeSet<String> {
        &self.record.touched
    }

    pub fn is_touched(&self, field_id: &str) -> bool {
        self.record.touched.contains(field_id)
    }

    /// Errors from the most recent validation pass.
    pub fn errors(&self) -> &BTreeMap<String, FieldError> {
        &self.errors
    }

    pub fn error(&self, field_id: &str) -> Option<&FieldError> {
        self.errors.get(field_id)
    }

    /// Error to display for a field: only once the field was touched or the
    /// whole form failed validation.
    pub fn visible_error(&self, field_id: &str) -> Option<&FieldError> {
        if self.is_touched(field_id) || self.state == FormState::Invalid {
            self.errors.get(field_id)
        } else {
            None
        }
    }

    /// Failure of the most recent submission attempt, if it failed.
    pub fn last_error(&self) -> Option<&SubmitError> {
        self.last_error.as_ref()
    }

    /// Acknowledgement of the successful submission.
    pub fn ack(&self) -> Option<&Ack> {
        self.ack.as_ref()
    }

    pub fn is_read_only(&self) -> bool {
        self.state == FormState::Submitted
    }

    /// A submission is in flight.
    pub fn is_busy(&self) -> bool {
        self.state == FormState::Submitting
    }

    /// Store a value; last write wins. Marks the field touched and the form
    /// dirty without validating.
    ///
    /// # Errors
    ///
    /// `UnknownField` for ids outside the template, `AlreadyInProgress` while
    /// submitting, `ReadOnly` once submitted.
    pub fn set_value(&mut self, field_id: &str, value: impl Into<FieldValue>) -> FormsResult<()> {
        self.ensure_editable()?;
        self.field(field_id)?;
        self.record
            .values
            .insert(field_id.to_string(), value.into());
        self.mark_edited(field_id);
        Ok(())
    }

    /// Remove a field's value, with the same transition as [`Self::set_value`].
    pub fn clear_value(&mut self, field_id: &str) -> FormsResult<()> {
        self.ensure_editable()?;
        self.field(field_id)?;
        self.record.values.remove(field_id);
        self.mark_edited(field_id);
        Ok(())
    }

    /// Blur: mark the field touched and check it.
    ///
    /// Once submitted (or while submitting) nothing changes and the field's
    /// current error, if any, is returned.
    pub fn touch(&mut self, field_id: &str) -> FormsResult<Option<FieldError>> {
        self.field(field_id)?;
        if self.is_locked() {
            return Ok(self.errors.get(field_id).cloned());
        }
        self.record.touched.insert(field_id.to_string());
        self.validate_field(field_id)
    }

    /// Run a single field's rule and refresh only that field's error entry.
    /// Submitted forms keep their errors as they are.
    pub fn validate_field(&mut self, field_id: &str) -> FormsResult<Option<FieldError>> {
        let rule = self
            .schema
            .rule(field_id)
            .ok_or_else(|| FormsError::UnknownField(field_id.to_string()))?;
        if self.is_read_only() {
            return Ok(self.errors.get(field_id).cloned());
        }

        match rule.check(self.record.values.get(field_id)) {
            Ok(()) => {
                self.errors.remove(field_id);
                Ok(None)
            }
            Err(error) => {
                self.errors.insert(field_id.to_string(), error.clone());
                Ok(Some(error))
            }
        }
    }

    /// Run every rule against the current values and settle on `Valid` or
    /// `Invalid`. Repeating it without writes in between yields the same errors.
    pub fn validate(&mut self) -> &BTreeMap<String, FieldError> {
        if self.is_read_only() {
            return &self.errors;
        }
        let settle = !self.is_locked();
        if settle {
            self.transition(FormState::Validating);
        }

        self.errors = self.schema.validate(&self.record.values);

        if settle {
            let next = if self.errors.is_empty() {
                FormState::Valid
            } else {
                FormState::Invalid
            };
            self.transition(next);
        }
        &self.errors
    }

    /// Enter `Submitting`, validating first unless already `Valid`.
    ///
    /// Returns the record to hand to the persistence collaborator, stamped as
    /// completed.
    ///
    /// # Errors
    ///
    /// `AlreadyInProgress` while another submission is in flight, `ReadOnly`
    /// once submitted, `Invalid` with every field error if validation fails.
    pub fn begin_submit(&mut self) -> FormsResult<FormRecord> {
        match self.state {
            FormState::Submitting => return Err(FormsError::AlreadyInProgress),
            FormState::Submitted => return Err(FormsError::ReadOnly(self.record.id)),
            FormState::Valid => {}
            _ => {
                if !self.validate().is_empty() {
                    return Err(FormsError::Invalid(self.errors.values().cloned().collect()));
                }
            }
        }

        self.last_error = None;
        self.transition(FormState::Submitting);

        let now = Utc::now();
        let mut payload = self.record.clone();
        payload.status = FormStatus::Completed;
        payload.completed_at = Some(now);
        payload.updated_at = now;
        Ok(payload)
    }

    /// `Submitting -> Submitted`. The form becomes read-only.
    pub(crate) fn complete_submit(&mut self, ack: Ack) {
        if self.state != FormState::Submitting {
            debug!(form_id = %self.record.id, state = ?self.state, "Ignoring stale submit completion");
            return;
        }
        self.record.status = FormStatus::Completed;
        self.record.completed_at = Some(ack.timestamp);
        self.record.updated_at = ack.timestamp;
        self.ack = Some(ack);
        self.transition(FormState::Submitted);
    }

    /// `Submitting -> SubmitFailed`. Values and field errors are kept as they are.
    pub(crate) fn fail_submit(&mut self, error: SubmitError) {
        if self.state != FormState::Submitting {
            debug!(form_id = %self.record.id, state = ?self.state, "Ignoring stale submit failure");
            return;
        }
        self.last_error = Some(error);
        self.transition(FormState::SubmitFailed);
    }

    /// Drop an in-flight submission without an outcome (`Submitting -> Valid`).
    pub(crate) fn abandon_submit(&mut self) {
        if self.state == FormState::Submitting {
            self.transition(FormState::Valid);
        }
    }

    /// Clear all values, touched marks and errors.
    pub fn reset(&mut self) -> FormsResult<()> {
        self.ensure_editable()?;
        self.record.values.clear();
        self.record.touched.clear();
        self.record.status = FormStatus::NotStarted;
        self.record.updated_at = Utc::now();
        self.errors.clear();
        self.last_error = None;
        self.transition(FormState::Pristine);
        Ok(())
    }

    /// Percentage of required fields holding a value. Forms without required
    /// fields count every field.
    pub fn progress(&self) -> u8 {
        if self.record.status == FormStatus::Completed {
            return 100;
        }

        let required: Vec<&FieldDescriptor> =
            self.template.fields.iter().filter(|f| f.required).collect();
        let counted: Vec<&FieldDescriptor> = if required.is_empty() {
            self.template.fields.iter().collect()
        } else {
            required
        };
        if counted.is_empty() {
            return 0;
        }

        let filled = counted
            .iter()
            .filter(|f| match self.record.values.get(&f.id) {
                Some(value) if f.kind == FieldKind::Checkbox => coerce_bool(value),
                Some(value) => !value.is_blank(),
                None => false,
            })
            .count();

        ((filled * 100) / counted.len()) as u8
    }

    fn field(&self, field_id: &str) -> FormsResult<&FieldDescriptor> {
        self.template
            .field(field_id)
            .ok_or_else(|| FormsError::UnknownField(field_id.to_string()))
    }

    fn is_locked(&self) -> bool {
        matches!(self.state, FormState::Submitting | FormState::Submitted)
    }

    fn ensure_editable(&self) -> FormsResult<()> {
        match self.state {
            FormState::Submitting => Err(FormsError::AlreadyInProgress),
            FormState::Submitted => Err(FormsError::ReadOnly(self.record.id)),
            _ => Ok(()),
        }
    }

    fn mark_edited(&mut self, field_id: &str) {
        self.record.touched.insert(field_id.to_string());
        if self.record.status == FormStatus::NotStarted {
            self.record.status = FormStatus::InProgress;
        }
        self.record.updated_at = Utc::now();
        self.transition(FormState::Dirty);
    }

    fn transition(&mut self, next: FormState) {
        if self.state != next {
            debug!(form_id = %self.record.id, from = ?self.state, to = ?next, "Form state change");
            self.state = next;
        }
    }
}
