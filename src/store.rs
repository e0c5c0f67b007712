//! Persistence and template collaborators.
//!
//! The engine only talks to these traits. The in-memory implementations keep
//! records JSON-encoded, the way a remote store would hold serialized payloads.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::warn;
use uuid::Uuid;

use crate::catalog::builtin_templates;
use crate::error::{FormsResult, LoadError, SubmitError};
use crate::types::{Ack, FormRecord, FormStatus, Template};

/// Where submitted forms are persisted.
///
/// `save` must be idempotent for the same record id: the user may resubmit
/// after a network error that the server actually processed.
#[async_trait]
pub trait FormStore: Send + Sync {
    async fn save(&self, record: &FormRecord) -> Result<Ack, SubmitError>;

    async fn load(&self, form_id: Uuid) -> Result<FormRecord, LoadError>;

    async fn list(&self, filter: &FormFilter) -> Result<Vec<FormRecord>, LoadError>;
}

/// Where templates come from.
#[async_trait]
pub trait TemplateSource: Send + Sync {
    /// Templates in catalog order, optionally restricted to one category.
    async fn list_templates(&self, category: Option<&str>) -> Result<Vec<Template>, LoadError>;

    async fn get_template(&self, id: &str) -> Result<Template, LoadError>;
}

/// Filters for project form lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFilter {
    pub project_id: Option<String>,
    /// Any of these statuses; empty means all.
    pub statuses: Vec<FormStatus>,
    pub category: Option<String>,
    /// Case-insensitive substring of the form name or category.
    pub search: Option<String>,
}

impl FormFilter {
    /// A filter that matches every record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Only forms of this project.
    pub fn project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Also accept this status. Repeat to allow several.
    pub fn status(mut self, status: FormStatus) -> Self {
        self.statuses.push(status);
        self
    }

    /// Only forms of this template category.
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Case-insensitive match on form name or category.
    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    /// Whether `record` passes every set criterion.
    pub fn matches(&self, record: &FormRecord) -> bool {
        if let Some(project_id) = &self.project_id {
            if &record.project_id != project_id {
                return false;
            }
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&record.status) {
            return false;
        }
        if let Some(category) = &self.category {
            if &record.category != category {
                return false;
            }
        }
        if let Some(term) = &self.search {
            let term = term.trim().to_lowercase();
            if !term.is_empty()
                && !record.name.to_lowercase().contains(&term)
                && !record.category.to_lowercase().contains(&term)
            {
                return false;
            }
        }
        true
    }
}

/// In-memory form store.
pub struct MemoryFormStore {
    records: RwLock<HashMap<Uuid, serde_json::Value>>,
}

impl MemoryFormStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether no record is stored.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn decode(value: &serde_json::Value) -> Result<FormRecord, LoadError> {
        serde_json::from_value(value.clone()).map_err(|e| LoadError::Malformed(e.to_string()))
    }
}

impl Default for MemoryFormStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FormStore for MemoryFormStore {
    async fn save(&self, record: &FormRecord) -> Result<Ack, SubmitError> {
        let encoded = serde_json::to_value(record).map_err(|e| SubmitError::ServerRejected {
            reason: e.to_string(),
        })?;
        self.records.write().insert(record.id, encoded);
        Ok(Ack {
            id: record.id,
            timestamp: Utc::now(),
        })
    }

    async fn load(&self, form_id: Uuid) -> Result<FormRecord, LoadError> {
        let records = self.records.read();
        let value = records
            .get(&form_id)
            .ok_or_else(|| LoadError::NotFound(form_id.to_string()))?;
        Self::decode(value)
    }

    async fn list(&self, filter: &FormFilter) -> Result<Vec<FormRecord>, LoadError> {
        let mut result: Vec<FormRecord> = self
            .records
            .read()
            .iter()
            .filter_map(|(id, value)| match Self::decode(value) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(form_id = %id, error = %e, "Skipping undecodable form record");
                    None
                }
            })
            .filter(|record| filter.matches(record))
            .collect();
        result.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(result)
    }
}

/// In-memory template catalog.
pub struct MemoryTemplateSource {
    templates: RwLock<Vec<Template>>,
}

impl MemoryTemplateSource {
    /// Create a source over `templates`, kept in the given order.
    pub fn new(templates: Vec<Template>) -> Self {
        Self {
            templates: RwLock::new(templates),
        }
    }

    /// A source preloaded with the built-in inspection templates.
    pub fn with_builtin() -> FormsResult<Self> {
        Ok(Self::new(builtin_templates()?))
    }

    /// Add a template, replacing any with the same id.
    pub fn insert(&self, template: Template) {
        let mut templates = self.templates.write();
        match templates.iter_mut().find(|t| t.id == template.id) {
            Some(existing) => *existing = template,
            None => templates.push(template),
        }
    }
}

#[async_trait]
impl TemplateSource for MemoryTemplateSource {
    async fn list_templates(&self, category: Option<&str>) -> Result<Vec<Template>, LoadError> {
        Ok(self
            .templates
            .read()
            .iter()
            .filter(|t| category.is_none_or(|c| t.category == c))
            .cloned()
            .collect())
    }

    async fn get_template(&self, id: &str) -> Result<Template, LoadError> {
        self.templates
            .read()
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| LoadError::NotFound(format!("template {}", id)))
    }
}
