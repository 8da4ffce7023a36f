//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (KUMI_*)
//! 2. TOML config file (if KUMI_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Deserializer, Serialize};

use crate::codec;
use crate::digest::KeyScheme;

mod validation;

pub use validation::ConfigError;

/// Where compile results, artifacts and ephemeral shares are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolatileBackend {
    /// `kv` table in the SQLite database; shared by every process using it.
    Sqlite,
    /// In-process moka cache; lost on restart.
    Memory,
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (KUMI_*)
/// 2. TOML config file (if KUMI_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Socket address the HTTP server binds to.
    ///
    /// Set via KUMI_BIND_ADDR environment variable.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Base URL used in returned artifact and share URLs.
    ///
    /// Set via KUMI_PUBLIC_BASE_URL. When unset, the request's Host header
    /// is used.
    #[serde(default)]
    pub public_base_url: Option<String>,

    /// Prefix of every volatile store key.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Compiler version tag partitioning compile cache keys.
    ///
    /// Set via KUMI_COMPILER_VERSION environment variable.
    #[serde(default = "default_compiler_version", deserialize_with = "string_or_number")]
    pub compiler_version: String,

    /// Path to the SQLite database holding public shares (and the volatile
    /// `kv` table when that backend is selected).
    ///
    /// Set via KUMI_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Volatile store backend.
    ///
    /// Set via KUMI_VOLATILE_BACKEND (`sqlite` or `memory`).
    #[serde(default = "default_volatile_backend")]
    pub volatile_backend: VolatileBackend,

    /// Entry limit for the memory backend.
    #[serde(default = "default_memory_max_entries")]
    pub memory_max_entries: u64,

    /// Lifetime of compile results and artifacts.
    #[serde(default = "default_compile_ttl_secs")]
    pub compile_ttl_secs: u64,

    /// Lifetime of ephemeral shares.
    #[serde(default = "default_share_ttl_secs")]
    pub share_ttl_secs: u64,

    /// External compiler command line; the schema source is written to its stdin.
    ///
    /// Set via KUMI_COMPILER_COMMAND environment variable. Required to serve.
    #[serde(default)]
    pub compiler_command: Option<String>,

    /// Compiler timeout in milliseconds.
    #[serde(default = "default_compiler_timeout_ms")]
    pub compiler_timeout_ms: u64,

    /// Coalesce concurrent identical cache misses into one compile.
    #[serde(default = "default_true")]
    pub single_flight: bool,

    /// Maximum accepted request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Interval between expired-entry sweeps of the volatile store.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Brotli quality (0-11) for share blobs.
    #[serde(default = "default_brotli_quality")]
    pub brotli_quality: u32,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".into()
}

fn default_namespace() -> String {
    "kumi".into()
}

fn default_compiler_version() -> String {
    "1".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./kumi.sqlite")
}

fn default_volatile_backend() -> VolatileBackend {
    VolatileBackend::Sqlite
}

fn default_memory_max_entries() -> u64 {
    10_000
}

fn default_compile_ttl_secs() -> u64 {
    30 * 24 * 60 * 60
}

fn default_share_ttl_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_compiler_timeout_ms() -> u64 {
    30_000
}

fn default_true() -> bool {
    true
}

fn default_max_body_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_sweep_interval_secs() -> u64 {
    300
}

fn default_brotli_quality() -> u32 {
    codec::DEFAULT_QUALITY
}

/// Accepts an unquoted TOML number such as `compiler_version = 2`.
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Int(n) => n.to_string(),
        Raw::Float(n) => n.to_string(),
    })
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            public_base_url: None,
            namespace: default_namespace(),
            compiler_version: default_compiler_version(),
            db_path: default_db_path(),
            volatile_backend: default_volatile_backend(),
            memory_max_entries: default_memory_max_entries(),
            compile_ttl_secs: default_compile_ttl_secs(),
            share_ttl_secs: default_share_ttl_secs(),
            compiler_command: None,
            compiler_timeout_ms: default_compiler_timeout_ms(),
            single_flight: true,
            max_body_bytes: default_max_body_bytes(),
            sweep_interval_secs: default_sweep_interval_secs(),
            brotli_quality: default_brotli_quality(),
        }
    }
}

impl AppConfig {
    pub fn compile_ttl(&self) -> Duration {
        Duration::from_secs(self.compile_ttl_secs)
    }

    pub fn share_ttl(&self) -> Duration {
        Duration::from_secs(self.share_ttl_secs)
    }

    pub fn compiler_timeout(&self) -> Duration {
        Duration::from_millis(self.compiler_timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Key layout for this namespace and compiler version.
    pub fn key_scheme(&self) -> KeyScheme {
        KeyScheme::new(&self.namespace, &self.compiler_version)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `KUMI_`
    /// 2. TOML file from `KUMI_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("KUMI_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("KUMI_")
                .map(|key| key.as_str().to_lowercase().into())
                .ignore(&["compiler_version"])
                .split("__"),
        );

        // Env values are parsed as TOML scalars, which would turn "1.10" into 1.1.
        if let Ok(version) = std::env::var("KUMI_COMPILER_VERSION") {
            figment = figment.merge(("compiler_version", version));
        }

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Check that a compiler command is configured (deferred until serving).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if no compiler command is set.
    pub fn require_compiler_command(&self) -> Result<&str, ConfigError> {
        self.compiler_command
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ConfigError::Missing {
                field: "compiler_command".into(),
                hint: "Set KUMI_COMPILER_COMMAND environment variable".into(),
            })
    }
}
