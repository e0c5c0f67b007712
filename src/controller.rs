//! Form handles and the submission controller.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::FormsConfig;
use crate::error::{FormsError, FormsResult, SubmitError};
use crate::instance::FormInstance;
use crate::store::FormStore;
use crate::types::{Ack, FormState};

/// Shared handle to a form instance owned by one view.
///
/// Clones refer to the same instance. The lock is only taken for short,
/// synchronous sections and never across an `.await`.
#[derive(Debug, Clone)]
pub struct FormHandle {
    id: Uuid,
    instance: Arc<Mutex<FormInstance>>,
    disposed: Arc<AtomicBool>,
}

impl FormHandle {
    pub fn new(instance: FormInstance) -> Self {
        Self {
            id: instance.id(),
            instance: Arc::new(Mutex::new(instance)),
            disposed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Read the instance.
    pub fn read<R>(&self, f: impl FnOnce(&FormInstance) -> R) -> R {
        f(&*self.instance.lock())
    }

    /// Mutate the instance.
    pub fn update<R>(&self, f: impl FnOnce(&mut FormInstance) -> R) -> R {
        f(&mut *self.instance.lock())
    }

    pub fn state(&self) -> FormState {
        self.read(FormInstance::state)
    }

    /// Copy of the current instance.
    pub fn snapshot(&self) -> FormInstance {
        self.read(FormInstance::clone)
    }

    /// The owning view went away. Results arriving afterwards are not applied.
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

/// Puts an instance back to `Valid` if the submit future is dropped while
/// `save` is pending.
struct InflightGuard<'a> {
    handle: &'a FormHandle,
    armed: bool,
}

impl<'a> InflightGuard<'a> {
    fn new(handle: &'a FormHandle) -> Self {
        Self {
            handle,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            debug!(form_id = %self.handle.id(), "Submission dropped before completion");
            self.handle.update(FormInstance::abandon_submit);
        }
    }
}

/// Orchestrates validate -> persist -> report for form instances.
///
/// At most one submission per instance is in flight; the controller never
/// retries on its own.
pub struct SubmissionController<S: FormStore> {
    store: Arc<S>,
    config: FormsConfig,
}

impl<S: FormStore> SubmissionController<S> {
    pub fn new(store: Arc<S>, config: FormsConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Submit the form behind `handle`.
    ///
    /// Validates first unless the form is already `Valid`. On success the
    /// form becomes `Submitted` and read-only; on failure it becomes
    /// `SubmitFailed` and may be resubmitted.
    ///
    /// # Errors
    ///
    /// - `Cancelled` if the handle was disposed before submitting
    /// - `AlreadyInProgress` if a submission is pending (`save` is not called)
    /// - `ReadOnly` if the form was already submitted
    /// - `Invalid` with every field error if validation fails
    /// - `Submit` with the collaborator's failure or a timeout
    pub async fn submit(&self, handle: &FormHandle) -> FormsResult<Ack> {
        if handle.is_disposed() {
            return Err(FormsError::Cancelled);
        }

        let payload = handle.update(FormInstance::begin_submit)?;
        let guard = InflightGuard::new(handle);

        info!(form_id = %payload.id, template_id = %payload.template_id, "Submitting form");
        let outcome = match timeout(self.config.submit_timeout(), self.store.save(&payload)).await {
            Ok(result) => result,
            Err(_) => Err(SubmitError::Timeout),
        };
        guard.disarm();

        if handle.is_disposed() {
            debug!(form_id = %payload.id, "Form discarded during submission; result not applied");
            return outcome.map_err(FormsError::from);
        }

        match outcome {
            Ok(ack) => {
                handle.update(|instance| instance.complete_submit(ack));
                info!(form_id = %ack.id, "Form submitted");
                Ok(ack)
            }
            Err(error) => {
                warn!(form_id = %payload.id, error = %error, "Form submission failed");
                handle.update(|instance| instance.fail_submit(error.clone()));
                Err(error.into())
            }
        }
    }
}
