//! Template construction and load-time structural checks.

use std::collections::HashSet;

use crate::error::{FormsError, FormsResult, TemplateDefect};
use crate::types::{FieldDescriptor, FieldKind, FieldOption, Template};

impl FieldDescriptor {
    /// Create a new field. Select fields should go through [`FieldDescriptor::select`].
    pub fn new(id: impl Into<String>, label: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            id: id.into(),
            kind,
            label: label.into(),
            required: false,
            options: Vec::new(),
            multiple: false,
            accept: None,
            disabled: false,
            help: None,
        }
    }

    /// Create a single-line text field.
    pub fn text(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(id, label, FieldKind::Text)
    }

    /// Create a multi-line text field.
    pub fn textarea(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(id, label, FieldKind::Textarea)
    }

    /// Create a numeric field.
    pub fn number(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(id, label, FieldKind::Number)
    }

    /// Create a date field.
    pub fn date(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(id, label, FieldKind::Date)
    }

    /// Create a time-of-day field.
    pub fn time(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(id, label, FieldKind::Time)
    }

    /// Create a checkbox field.
    pub fn checkbox(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(id, label, FieldKind::Checkbox)
    }

    /// Create a file upload field.
    pub fn file(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(id, label, FieldKind::File)
    }

    /// Create a select field.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTemplate` with `EmptyOptions` when `options` is empty.
    pub fn select<I, O>(id: impl Into<String>, label: impl Into<String>, options: I) -> FormsResult<Self>
    where
        I: IntoIterator<Item = O>,
        O: Into<FieldOption>,
    {
        let mut field = Self::new(id, label, FieldKind::Select);
        field.options = options.into_iter().map(Into::into).collect();
        if field.options.is_empty() {
            return Err(FormsError::InvalidTemplate {
                template_id: String::new(),
                defect: TemplateDefect::EmptyOptions(field.id),
            });
        }
        Ok(field)
    }

    /// Mark as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Allow several values (multi-select, multi-file).
    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    /// Restrict accepted files, e.g. `"image/*,.pdf"`.
    pub fn accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    /// Render without allowing edits.
    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    /// Set the helper text.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Whether `value` is one of the declared option values.
    pub fn has_option(&self, value: &str) -> bool {
        self.options.iter().any(|o| o.value == value)
    }
}

impl Template {
    /// Create a template and run the structural check on it.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTemplate` if the fields are malformed.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        category: impl Into<String>,
        fields: Vec<FieldDescriptor>,
    ) -> FormsResult<Self> {
        let template = Self {
            id: id.into(),
            name: name.into(),
            category: category.into(),
            description: String::new(),
            fields,
        };
        validate_structure(&template)?;
        Ok(template)
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Find a field by its id.
    pub fn field(&self, id: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.id == id)
    }

    /// Number of fields.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }
}

/// Check a template for defects that would make forms built on it unusable.
///
/// Rejects blank field ids, duplicate field ids and select fields without
/// options. Run once when a template is loaded, not per form instance.
///
/// # Errors
///
/// Returns `InvalidTemplate` describing the first defect found in display order.
pub fn validate_structure(template: &Template) -> FormsResult<()> {
    let reject = |defect| FormsError::InvalidTemplate {
        template_id: template.id.clone(),
        defect,
    };

    let mut seen = HashSet::with_capacity(template.fields.len());
    for (index, field) in template.fields.iter().enumerate() {
        if field.id.trim().is_empty() {
            return Err(reject(TemplateDefect::BlankFieldId { index }));
        }
        if !seen.insert(field.id.as_str()) {
            return Err(reject(TemplateDefect::DuplicateFieldId(field.id.clone())));
        }
        if field.kind == FieldKind::Select && field.options.is_empty() {
            return Err(reject(TemplateDefect::EmptyOptions(field.id.clone())));
        }
    }
    Ok(())
}
