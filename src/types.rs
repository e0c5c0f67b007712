//! Type definitions for the inspection form engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use uuid::Uuid;

/// Input kinds a template field can declare.
///
/// Unknown kind strings deserialize to `Other` so a template written for a
/// newer engine still loads; such fields validate and render as plain text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Single-line text.
    Text,
    /// Multi-line text.
    Textarea,
    /// Numeric input.
    Number,
    /// Calendar date.
    Date,
    /// Time of day.
    Time,
    /// Choice among declared options.
    Select,
    /// Boolean toggle.
    Checkbox,
    /// File upload.
    File,
    /// Any kind this engine does not know.
    #[serde(other)]
    Other,
}

impl Default for FieldKind {
    fn default() -> Self {
        Self::Text
    }
}

impl FieldKind {
    /// Wire name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Textarea => "textarea",
            Self::Number => "number",
            Self::Date => "date",
            Self::Time => "time",
            Self::Select => "select",
            Self::Checkbox => "checkbox",
            Self::File => "file",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One choice of a select field.
///
/// Deserializes from either a bare string (value and label identical) or a
/// `{ "value": .., "label": .. }` object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawOption")]
pub struct FieldOption {
    /// Stored value.
    pub value: String,
    /// Display label.
    pub label: String,
}

impl FieldOption {
    /// Create an option with a distinct display label.
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

impl From<&str> for FieldOption {
    fn from(value: &str) -> Self {
        Self::new(value, value)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawOption {
    Bare(String),
    Full {
        value: String,
        #[serde(default)]
        label: Option<String>,
    },
}

impl From<RawOption> for FieldOption {
    fn from(raw: RawOption) -> Self {
        match raw {
            RawOption::Bare(value) => Self {
                label: value.clone(),
                value,
            },
            RawOption::Full { value, label } => Self {
                label: label.unwrap_or_else(|| value.clone()),
                value,
            },
        }
    }
}

/// Declarative definition of one input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Identifier, unique within its template.
    pub id: String,
    /// Declared input kind.
    #[serde(rename = "type")]
    pub kind: FieldKind,
    /// Display label.
    pub label: String,
    /// Whether a value must be supplied (for checkboxes: must be checked).
    #[serde(default)]
    pub required: bool,
    /// Choices for select fields, in display order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FieldOption>,
    /// Multi-value select or multi-file upload.
    #[serde(default)]
    pub multiple: bool,
    /// Accepted extensions / MIME types for file fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accept: Option<String>,
    /// Rendered but not editable.
    #[serde(default)]
    pub disabled: bool,
    /// Helper text shown under the input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
}

/// Reusable form definition: ordered fields plus metadata.
///
/// Immutable once loaded; share it behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    /// Unique template identifier.
    pub id: String,
    /// Display name, copied onto forms started from it.
    pub name: String,
    /// Category tag such as `sampling` or `inventory`.
    #[serde(rename = "type")]
    pub category: String,
    /// Longer description for template pickers.
    #[serde(default)]
    pub description: String,
    /// Fields in display order.
    pub fields: Vec<FieldDescriptor>,
}

/// Metadata of an uploaded file as seen by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHandle {
    /// Original file name, including extension.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// MIME type reported by the picker, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,
}

impl FileHandle {
    /// Create a handle without a MIME type.
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            mime: None,
        }
    }

    /// Builder method to set the MIME type.
    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    /// Lowercased extension including the leading dot, if any.
    pub fn extension(&self) -> Option<String> {
        let (stem, ext) = self.name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(format!(".{}", ext.to_lowercase()))
    }
}

/// Value types that can be stored in form fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Checkbox state.
    Bool(bool),
    /// Numeric value. Only finite numbers survive persistence.
    Number(f64),
    /// Text, including dates and times in their wire format.
    Text(String),
    /// Multi-select choices.
    List(Vec<String>),
    /// Uploaded files. An empty selection reads back as an empty `List`
    /// and is normalized when the record is bound to its template.
    Files(Vec<FileHandle>),
}

impl FieldValue {
    /// Empty text, an empty list or no files count as "no value".
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Text(s) => s.trim().is_empty(),
            Self::List(items) => items.is_empty(),
            Self::Files(files) => files.is_empty(),
            Self::Bool(_) | Self::Number(_) => false,
        }
    }

    /// Scalar text view; finite numbers and booleans are stringified.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::Text(s) => Some(Cow::Borrowed(s.as_str())),
            Self::Number(n) if n.is_finite() => Some(Cow::Owned(n.to_string())),
            Self::Number(_) => None,
            Self::Bool(b) => Some(Cow::Owned(b.to_string())),
            Self::List(_) | Self::Files(_) => None,
        }
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for FieldValue {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(items: Vec<String>) -> Self {
        Self::List(items)
    }
}

impl From<Vec<FileHandle>> for FieldValue {
    fn from(files: Vec<FileHandle>) -> Self {
        Self::Files(files)
    }
}

/// Lifecycle status of a form as shown in project form lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FormStatus {
    /// Created but never edited.
    NotStarted,
    /// Edited, not yet submitted.
    InProgress,
    /// Submitted; the form is read-only.
    Completed,
}

impl Default for FormStatus {
    fn default() -> Self {
        Self::NotStarted
    }
}

/// Editing and submission state of a live form instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FormState {
    /// No field has been written yet.
    Pristine,
    /// Written since the last validation.
    Dirty,
    /// A full validation pass is running.
    Validating,
    /// Last validation found no errors.
    Valid,
    /// Last validation found errors.
    Invalid,
    /// A save is in flight.
    Submitting,
    /// Saved; terminal and read-only.
    Submitted,
    /// The last save failed; may be resubmitted.
    SubmitFailed,
}

impl Default for FormState {
    fn default() -> Self {
        Self::Pristine
    }
}

/// Per-field validation failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldErrorKind {
    /// Required value is missing (or a required checkbox is unchecked).
    Required,
    /// Value does not fit the field kind.
    TypeMismatch,
    /// Select value is not among the declared options.
    InvalidOption,
    /// A file exceeds the configured size limit.
    FileTooLarge,
}

/// Validation error attached to one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// ID of the field with error.
    pub field_id: String,
    /// Failure category.
    pub kind: FieldErrorKind,
    /// Display message.
    pub message: String,
}

impl FieldError {
    /// Create a new field error.
    pub fn new(
        field_id: impl Into<String>,
        kind: FieldErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field_id: field_id.into(),
            kind,
            message: message.into(),
        }
    }
}

/// Persisted part of a form: what the persistence collaborator stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormRecord {
    /// Unique form identifier; the store's dedupe key.
    pub id: Uuid,
    /// Template the form was started from.
    pub template_id: String,
    /// Owning project (or other parent entity).
    pub project_id: String,
    /// Template name at creation time.
    pub name: String,
    /// Template category at creation time.
    #[serde(rename = "type")]
    pub category: String,
    /// Field id to value.
    #[serde(default)]
    pub values: HashMap<String, FieldValue>,
    /// Fields the user has interacted with.
    #[serde(default)]
    pub touched: BTreeSet<String>,
    /// List status.
    #[serde(default)]
    pub status: FormStatus,
    /// User id of the session that started the form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
    /// Submission timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Acknowledgement returned by the persistence collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    /// Id of the persisted form.
    pub id: Uuid,
    /// When the store accepted the record.
    pub timestamp: DateTime<Utc>,
}

/// Snapshot of the signed-in user, supplied by the page shell.
///
/// The engine records who started a form but makes no access decisions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// User identifier.
    pub user_id: String,
    /// Role name, e.g. `inspector`.
    pub role: String,
    /// Extra provider claims.
    #[serde(default)]
    pub claims: HashMap<String, String>,
}

impl Session {
    /// Create a session without extra claims.
    pub fn new(user_id: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: role.into(),
            claims: HashMap::new(),
        }
    }

    /// Builder method to add a claim.
    pub fn with_claim(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.claims.insert(key.into(), value.into());
        self
    }
}
