//! Error types for the inspection form engine.

use thiserror::Error;
use uuid::Uuid;

use crate::types::FieldError;

/// Structural defect found while checking a template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateDefect {
    /// A field id is empty or whitespace-only.
    #[error("field at position {index} has a blank id")]
    BlankFieldId {
        /// Position of the field in display order.
        index: usize,
    },

    /// Two fields share the same id.
    #[error("duplicate field id '{0}'")]
    DuplicateFieldId(String),

    /// A select field declares no options.
    #[error("select field '{0}' has no options")]
    EmptyOptions(String),
}

/// Failures reported by the persistence collaborator while saving.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// The request never reached the server or the connection dropped.
    #[error("Network error: {0}")]
    Network(String),

    /// The server refused the record.
    #[error("Server rejected submission: {reason}")]
    ServerRejected {
        /// Server-supplied reason, suitable for display.
        reason: String,
    },

    /// No answer within the configured submit timeout.
    #[error("Submission timed out")]
    Timeout,
}

/// Failures while fetching a template or a form record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// Nothing stored under the requested id.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Transport failure.
    #[error("Network error: {0}")]
    Network(String),

    /// No answer within the configured load timeout.
    #[error("Load timed out")]
    Timeout,

    /// The stored payload could not be decoded.
    #[error("Malformed record: {0}")]
    Malformed(String),
}

/// Errors that can occur during form operations.
#[derive(Debug, Error)]
pub enum FormsError {
    /// The template failed its structural check and cannot back any form.
    #[error("Invalid template '{template_id}': {defect}")]
    InvalidTemplate {
        /// Id of the rejected template.
        template_id: String,
        /// What was wrong with it.
        defect: TemplateDefect,
    },

    /// Template not found.
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    /// Form not found.
    #[error("Form not found: {0}")]
    FormNotFound(Uuid),

    /// The template has no field with this id.
    #[error("Unknown field: {0}")]
    UnknownField(String),

    /// Validation blocked the submission; carries every field error.
    #[error("Form has {} invalid field(s)", .0.len())]
    Invalid(Vec<FieldError>),

    /// A submission for this form is already in flight.
    #[error("Submission already in progress")]
    AlreadyInProgress,

    /// The form was submitted and can no longer be edited.
    #[error("Form {0} is read-only")]
    ReadOnly(Uuid),

    /// Submission failed in the persistence layer.
    #[error(transparent)]
    Submit(#[from] SubmitError),

    /// Template or form fetch failed.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// The form was discarded before the operation could apply.
    #[error("Form was discarded")]
    Cancelled,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl FormsError {
    /// Create a configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the user can recover by editing or retrying.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Invalid(_) | Self::AlreadyInProgress | Self::Submit(_) => true,
            Self::InvalidTemplate { .. }
            | Self::TemplateNotFound(_)
            | Self::FormNotFound(_)
            | Self::UnknownField(_)
            | Self::ReadOnly(_)
            | Self::Load(_)
            | Self::Cancelled
            | Self::Config(_) => false,
        }
    }
}

/// Result type for form operations.
pub type FormsResult<T> = Result<T, FormsError>;
