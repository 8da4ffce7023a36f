//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::{AppConfig, VolatileBackend};
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

/// Ten years.
const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `namespace` or `compiler_version` is empty
    /// - either TTL is 0 or longer than ten years
    /// - `max_body_bytes` is 0 or exceeds 50MB
    /// - `compiler_timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `brotli_quality` exceeds 11
    /// - `sweep_interval_secs` is 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.namespace.trim().is_empty() {
            return Err(invalid("namespace", "must not be empty"));
        }
        if self.compiler_version.trim().is_empty() {
            return Err(invalid("compiler_version", "must not be empty"));
        }

        if self.compile_ttl_secs == 0 {
            return Err(invalid("compile_ttl_secs", "must be greater than 0"));
        }
        if self.share_ttl_secs == 0 {
            return Err(invalid("share_ttl_secs", "must be greater than 0"));
        }
        if self.compile_ttl_secs > MAX_TTL_SECS {
            return Err(invalid("compile_ttl_secs", "must not exceed ten years"));
        }
        if self.share_ttl_secs > MAX_TTL_SECS {
            return Err(invalid("share_ttl_secs", "must not exceed ten years"));
        }

        if self.max_body_bytes == 0 {
            return Err(invalid("max_body_bytes", "must be greater than 0"));
        }
        if self.max_body_bytes > 50 * 1024 * 1024 {
            return Err(invalid("max_body_bytes", "must not exceed 50MB"));
        }

        if self.compiler_timeout_ms < 100 {
            return Err(invalid("compiler_timeout_ms", "must be at least 100ms"));
        }
        if self.compiler_timeout_ms > 300_000 {
            return Err(invalid("compiler_timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.brotli_quality > 11 {
            return Err(invalid("brotli_quality", "must be between 0 and 11"));
        }

        if self.sweep_interval_secs == 0 {
            return Err(invalid("sweep_interval_secs", "must be greater than 0"));
        }

        if self.volatile_backend == VolatileBackend::Memory && self.memory_max_entries == 0 {
            return Err(invalid("memory_max_entries", "must be greater than 0 for the memory backend"));
        }

        if self.share_ttl_secs > self.compile_ttl_secs {
            tracing::warn!(
                share_ttl_secs = self.share_ttl_secs,
                compile_ttl_secs = self.compile_ttl_secs,
                "Ephemeral shares outlive compiled artifacts"
            );
        }

        Ok(())
    }
}
