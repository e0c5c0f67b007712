#![allow(missing_docs)]
//! Inspection Forms - schema-driven form engine
//!
//! Templates describe the fields of an inspection form (sampling, inventory,
//! testing, service logs). From a template this crate derives a validation
//! schema, tracks a live form instance through editing and submission, maps
//! each field to the widget that should draw it and persists submitted
//! records through a pluggable store.
//!
//! # Example
//!
//! ```rust,ignore
//! use inspection_forms::{
//!     FormsConfig, FormsService, MemoryFormStore, MemoryTemplateSource, Session,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> inspection_forms::FormsResult<()> {
//!     let service = FormsService::new(
//!         FormsConfig::from_env()?,
//!         MemoryTemplateSource::with_builtin()?,
//!         Arc::new(MemoryFormStore::new()),
//!     )?;
//!
//!     let session = Session::new("inspector-7", "inspector");
//!     let form = service.start_form("1", "project-42", &session).await?;
//!     form.update(|f| f.set_value("quantity", 12))?;
//!
//!     match service.submit(&form).await {
//!         Ok(ack) => println!("Saved {} at {}", ack.id, ack.timestamp),
//!         Err(e) => eprintln!("{}", e),
//!     }
//!     Ok(())
//! }
//! ```

#![deny(unsafe_code)]

pub mod catalog;
pub mod config;
pub mod controller;
pub mod error;
pub mod instance;
pub mod render;
pub mod schema;
pub mod service;
pub mod store;
pub mod template;
pub mod types;

pub use catalog::builtin_templates;
pub use config::FormsConfig;
pub use controller::{FormHandle, SubmissionController};
pub use error::{FormsError, FormsResult, LoadError, SubmitError, TemplateDefect};
pub use instance::FormInstance;
pub use render::{
    resolve_widget, EventOutcome, FormView, RenderDispatcher, WidgetBinding, WidgetEvent,
    WidgetKind,
};
pub use schema::{build_validation_schema, FileConstraints, ValidationRule, ValidationSchema};
pub use service::FormsService;
pub use store::{FormFilter, FormStore, MemoryFormStore, MemoryTemplateSource, TemplateSource};
pub use template::validate_structure;
pub use types::{
    Ack, FieldDescriptor, FieldError, FieldErrorKind, FieldKind, FieldOption, FieldValue,
    FileHandle, FormRecord, FormState, FormStatus, Session, Template,
};

/// Crate name
pub const CRATE_NAME: &str = "inspection-forms";
/// Crate version
pub const CRATE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build a service backed by the in-memory store and the built-in templates,
/// configured from the environment.
///
/// # Errors
///
/// Returns an error if configuration is invalid.
pub fn create_memory_service_from_env(
) -> FormsResult<FormsService<MemoryTemplateSource, MemoryFormStore>> {
    let config = FormsConfig::from_env()?;
    FormsService::new(
        config,
        MemoryTemplateSource::with_builtin()?,
        std::sync::Arc::new(MemoryFormStore::new()),
    )
}
