//! Render dispatcher: maps field kinds to widgets and applies widget events.

use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::error::{FormsError, FormsResult};
use crate::instance::FormInstance;
use crate::types::{
    FieldDescriptor, FieldError, FieldErrorKind, FieldKind, FieldOption, FieldValue, FileHandle,
    FormState,
};

/// Concrete input widget a field is drawn with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WidgetKind {
    TextInput,
    TextArea,
    NumberInput,
    DatePicker,
    TimePicker,
    Select,
    Switch,
    FileUpload,
}

/// Total mapping from field kind to widget. Unknown kinds get a plain text input.
pub fn resolve_widget(kind: FieldKind) -> WidgetKind {
    match kind {
        FieldKind::Text => WidgetKind::TextInput,
        FieldKind::Textarea => WidgetKind::TextArea,
        FieldKind::Number => WidgetKind::NumberInput,
        FieldKind::Date => WidgetKind::DatePicker,
        FieldKind::Time => WidgetKind::TimePicker,
        FieldKind::Select => WidgetKind::Select,
        FieldKind::Checkbox => WidgetKind::Switch,
        FieldKind::File => WidgetKind::FileUpload,
        FieldKind::Other => {
            warn!("Unsupported field kind, rendering as text input");
            WidgetKind::TextInput
        }
    }
}

/// Everything a widget needs to draw one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetBinding {
    pub field_id: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    pub widget: WidgetKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<FieldValue>,
    /// Only set once the field is touched or the form failed validation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub required: bool,
    pub disabled: bool,
    pub multiple: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FieldOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accept: Option<String>,
    /// Per-file limit for upload widgets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_size: Option<u64>,
}

/// A rendered form: page-level flags plus one binding per field in display order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormView {
    pub form_id: Uuid,
    pub title: String,
    pub state: FormState,
    /// Show a busy indicator; inputs stay responsive but disabled.
    pub busy: bool,
    pub read_only: bool,
    pub progress: u8,
    /// Message of the last failed submission.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submit_error: Option<String>,
    pub widgets: Vec<WidgetBinding>,
}

/// User interaction coming back from a widget.
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetEvent {
    Change { field_id: String, value: FieldValue },
    Clear { field_id: String },
    Blur { field_id: String },
    /// Files picked or dropped; replaces the current selection.
    SelectFiles { field_id: String, files: Vec<FileHandle> },
    RemoveFile { field_id: String, index: usize },
}

/// What applying a widget event did.
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    /// The value was written.
    Applied,
    /// The field was checked on blur; carries its error, if any.
    Validated(Option<FieldError>),
    /// The selection failed the upload pre-check; values are unchanged.
    Rejected(FieldError),
    /// Nothing to do (disabled field, out-of-range index).
    Ignored,
}

/// Turns instances into widget bindings and widget events into instance updates.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderDispatcher;

impl RenderDispatcher {
    pub fn new() -> Self {
        Self
    }

    pub fn render(&self, instance: &FormInstance) -> FormView {
        let read_only = instance.is_read_only();
        let busy = instance.is_busy();

        let widgets = instance
            .template()
            .fields
            .iter()
            .map(|field| self.bind(instance, field, read_only || busy))
            .collect();

        FormView {
            form_id: instance.id(),
            title: instance.template().name.clone(),
            state: instance.state(),
            busy,
            read_only,
            progress: instance.progress(),
            submit_error: instance.last_error().map(ToString::to_string),
            widgets,
        }
    }

    fn bind(&self, instance: &FormInstance, field: &FieldDescriptor, locked: bool) -> WidgetBinding {
        let max_size = instance
            .schema()
            .rule(&field.id)
            .and_then(|rule| rule.file_constraints())
            .map(|c| c.max_size);

        WidgetBinding {
            field_id: field.id.clone(),
            label: field.label.clone(),
            help: field.help.clone(),
            widget: resolve_widget(field.kind),
            value: instance.value(&field.id).cloned(),
            error: instance
                .visible_error(&field.id)
                .map(|e| e.message.clone()),
            required: field.required,
            disabled: field.disabled || locked,
            multiple: field.multiple,
            options: field.options.clone(),
            accept: field.accept.clone(),
            max_size,
        }
    }

    /// Apply a widget event to the instance.
    ///
    /// # Errors
    ///
    /// Propagates `UnknownField`, `AlreadyInProgress` and `ReadOnly` from the
    /// instance.
    pub fn apply(&self, instance: &mut FormInstance, event: WidgetEvent) -> FormsResult<EventOutcome> {
        match event {
            WidgetEvent::Blur { field_id } => Ok(EventOutcome::Validated(instance.touch(&field_id)?)),
            WidgetEvent::Change { field_id, value } => {
                if Self::field(instance, &field_id)?.disabled {
                    return Ok(EventOutcome::Ignored);
                }
                instance.set_value(&field_id, value)?;
                Ok(EventOutcome::Applied)
            }
            WidgetEvent::Clear { field_id } => {
                if Self::field(instance, &field_id)?.disabled {
                    return Ok(EventOutcome::Ignored);
                }
                instance.clear_value(&field_id)?;
                Ok(EventOutcome::Applied)
            }
            WidgetEvent::SelectFiles { field_id, files } => {
                self.select_files(instance, &field_id, files)
            }
            WidgetEvent::RemoveFile { field_id, index } => {
                let field = Self::field(instance, &field_id)?;
                if field.disabled {
                    return Ok(EventOutcome::Ignored);
                }
                let mut files = match instance.value(&field_id) {
                    Some(FieldValue::Files(files)) if index < files.len() => files.clone(),
                    _ => return Ok(EventOutcome::Ignored),
                };
                files.remove(index);
                instance.set_value(&field_id, files)?;
                Ok(EventOutcome::Applied)
            }
        }
    }

    fn select_files(
        &self,
        instance: &mut FormInstance,
        field_id: &str,
        files: Vec<FileHandle>,
    ) -> FormsResult<EventOutcome> {
        let field = Self::field(instance, field_id)?;
        if field.disabled {
            return Ok(EventOutcome::Ignored);
        }
        if field.kind != FieldKind::File {
            return Ok(EventOutcome::Rejected(FieldError::new(
                field_id,
                FieldErrorKind::TypeMismatch,
                format!("{} does not accept files", field.label),
            )));
        }
        if !field.multiple && files.len() > 1 {
            return Ok(EventOutcome::Rejected(FieldError::new(
                field_id,
                FieldErrorKind::TypeMismatch,
                "Only one file may be attached",
            )));
        }

        let constraints = instance
            .schema()
            .rule(field_id)
            .and_then(|rule| rule.file_constraints());
        if let Some(constraints) = constraints {
            if let Err(error) = constraints.check(field_id, &files) {
                return Ok(EventOutcome::Rejected(error));
            }
        }

        instance.set_value(field_id, files)?;
        Ok(EventOutcome::Applied)
    }

    fn field<'a>(instance: &'a FormInstance, field_id: &str) -> FormsResult<&'a FieldDescriptor> {
        instance
            .template()
            .field(field_id)
            .ok_or_else(|| FormsError::UnknownField(field_id.to_string()))
    }
}

/// Whether the form state lets the user press submit.
pub fn can_submit(state: FormState) -> bool {
    !matches!(state, FormState::Submitting | FormState::Submitted)
}
