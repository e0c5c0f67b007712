//! Configuration for the form engine.

use crate::error::{FormsError, FormsResult};
use std::env;
use std::time::Duration;

/// Default per-file upload limit (5 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 5 * 1024 * 1024;

/// Configuration shared by the schema builder, the render dispatcher and the
/// submission controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormsConfig {
    /// Largest accepted file, in bytes. A file of exactly this size passes.
    pub max_file_size: u64,

    /// Upper bound on a single `save` call, in milliseconds.
    pub submit_timeout_ms: u64,

    /// Upper bound on a single template or form `load`, in milliseconds.
    pub load_timeout_ms: u64,
}

impl Default for FormsConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            submit_timeout_ms: 30_000,
            load_timeout_ms: 15_000,
        }
    }
}

impl FormsConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `FORMS_MAX_FILE_SIZE`: Per-file limit in bytes (default: 5242880)
    /// - `FORMS_SUBMIT_TIMEOUT_MS`: Submit timeout (default: 30000)
    /// - `FORMS_LOAD_TIMEOUT_MS`: Load timeout (default: 15000)
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but unparseable, or if the
    /// resulting configuration is invalid.
    pub fn from_env() -> FormsResult<Self> {
        let defaults = Self::default();
        let config = Self {
            max_file_size: parse_var("FORMS_MAX_FILE_SIZE", defaults.max_file_size)?,
            submit_timeout_ms: parse_var("FORMS_SUBMIT_TIMEOUT_MS", defaults.submit_timeout_ms)?,
            load_timeout_ms: parse_var("FORMS_LOAD_TIMEOUT_MS", defaults.load_timeout_ms)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is invalid.
    pub fn validate(&self) -> FormsResult<()> {
        if self.max_file_size == 0 {
            return Err(FormsError::config("max_file_size must be greater than 0"));
        }

        if self.submit_timeout_ms < 100 {
            return Err(FormsError::config(
                "submit_timeout_ms must be at least 100ms",
            ));
        }

        if self.load_timeout_ms < 100 {
            return Err(FormsError::config("load_timeout_ms must be at least 100ms"));
        }

        Ok(())
    }

    /// Builder method to set the per-file size limit.
    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    /// Builder method to set the submit timeout.
    pub fn with_submit_timeout(mut self, ms: u64) -> Self {
        self.submit_timeout_ms = ms;
        self
    }

    /// Builder method to set the load timeout.
    pub fn with_load_timeout(mut self, ms: u64) -> Self {
        self.load_timeout_ms = ms;
        self
    }

    pub(crate) fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.submit_timeout_ms)
    }

    pub(crate) fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }
}

fn parse_var(name: &str, default: u64) -> FormsResult<u64> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| FormsError::config(format!("{} must be an integer, got '{}'", name, raw))),
        Err(_) => Ok(default),
    }
}
