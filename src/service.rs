//! Forms service: template cache plus form lifecycle entry points.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::FormsConfig;
use crate::controller::{FormHandle, SubmissionController};
use crate::error::{FormsError, FormsResult, LoadError};
use crate::instance::FormInstance;
use crate::schema::{build_validation_schema, ValidationSchema};
use crate::store::{FormFilter, FormStore, TemplateSource};
use crate::template::validate_structure;
use crate::types::{Ack, FormRecord, Session, Template};

type CachedTemplate = (Arc<Template>, Arc<ValidationSchema>);

/// Entry point for hosts: loads templates, starts and reloads forms, submits.
///
/// Templates are checked and compiled once, on first use, and then shared
/// read-only by every instance created from them.
pub struct FormsService<T: TemplateSource, S: FormStore> {
    config: FormsConfig,
    templates: T,
    cache: RwLock<HashMap<String, CachedTemplate>>,
    controller: SubmissionController<S>,
}

impl<T: TemplateSource, S: FormStore> FormsService<T, S> {
    /// Create a service.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the configuration is invalid.
    pub fn new(config: FormsConfig, templates: T, store: Arc<S>) -> FormsResult<Self> {
        config.validate()?;
        let controller = SubmissionController::new(store, config.clone());
        Ok(Self {
            config,
            templates,
            cache: RwLock::new(HashMap::new()),
            controller,
        })
    }

    pub fn config(&self) -> &FormsConfig {
        &self.config
    }

    pub fn controller(&self) -> &SubmissionController<S> {
        &self.controller
    }

    /// Templates in catalog order, optionally for one category.
    pub async fn list_templates(&self, category: Option<&str>) -> FormsResult<Vec<Template>> {
        let templates = timeout(self.config.load_timeout(), self.templates.list_templates(category))
            .await
            .map_err(|_| LoadError::Timeout)??;
        Ok(templates)
    }

    /// A template by id, checked and cached on first load.
    ///
    /// # Errors
    ///
    /// `TemplateNotFound` if the source has no such template,
    /// `InvalidTemplate` if it fails the structural check.
    pub async fn get_template(&self, template_id: &str) -> FormsResult<Arc<Template>> {
        Ok(self.cached(template_id).await?.0)
    }

    async fn cached(&self, template_id: &str) -> FormsResult<CachedTemplate> {
        if let Some((template, schema)) = self.cache.read().await.get(template_id) {
            return Ok((template.clone(), schema.clone()));
        }

        let template = timeout(self.config.load_timeout(), self.templates.get_template(template_id))
            .await
            .map_err(|_| LoadError::Timeout)?
            .map_err(|e| match e {
                LoadError::NotFound(_) => FormsError::TemplateNotFound(template_id.to_string()),
                other => other.into(),
            })?;
        validate_structure(&template)?;

        let schema = build_validation_schema(&template, &self.config);
        info!(
            template_id = %template.id,
            fields = schema.len(),
            "Loaded form template"
        );

        let entry = (Arc::new(template), Arc::new(schema));
        let mut cache = self.cache.write().await;
        let entry = cache
            .entry(template_id.to_string())
            .or_insert(entry);
        Ok((entry.0.clone(), entry.1.clone()))
    }

    /// Start a new form for `project_id` on behalf of `session`.
    pub async fn start_form(
        &self,
        template_id: &str,
        project_id: &str,
        session: &Session,
    ) -> FormsResult<FormHandle> {
        let (template, schema) = self.cached(template_id).await?;
        let instance = FormInstance::new(template, schema, project_id, Some(session.user_id.clone()));
        info!(
            form_id = %instance.id(),
            template_id = %template_id,
            project_id = %project_id,
            "Started form"
        );
        Ok(FormHandle::new(instance))
    }

    /// Reload a persisted form. Completed forms come back read-only.
    ///
    /// # Errors
    ///
    /// `FormNotFound` if nothing is stored under `form_id`.
    pub async fn load_form(&self, form_id: Uuid) -> FormsResult<FormHandle> {
        let record = self.load_record(form_id).await?;
        let (template, schema) = self.cached(&record.template_id).await?;
        let instance = FormInstance::bind(record, template, schema)?;
        debug!(form_id = %form_id, state = ?instance.state(), "Loaded form");
        Ok(FormHandle::new(instance))
    }

    async fn load_record(&self, form_id: Uuid) -> FormsResult<FormRecord> {
        let record = timeout(self.config.load_timeout(), self.controller.store().load(form_id))
            .await
            .map_err(|_| LoadError::Timeout)?
            .map_err(|e| match e {
                LoadError::NotFound(_) => FormsError::FormNotFound(form_id),
                other => other.into(),
            })?;
        Ok(record)
    }

    /// Submit a form. See [`SubmissionController::submit`].
    pub async fn submit(&self, handle: &FormHandle) -> FormsResult<Ack> {
        self.controller.submit(handle).await
    }

    /// Stored forms matching `filter`, most recently updated first.
    pub async fn list_forms(&self, filter: &FormFilter) -> FormsResult<Vec<FormRecord>> {
        let records = timeout(self.config.load_timeout(), self.controller.store().list(filter))
            .await
            .map_err(|_| LoadError::Timeout)??;
        Ok(records)
    }
}
