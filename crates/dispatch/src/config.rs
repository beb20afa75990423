//! Dispatcher configuration.
//!
//! Read once at process start and never mutated. `DispatchConfig` carries the
//! backup-model policy and the shared default API key; `ProvidersConfig`
//! gates which providers appear in the resolver table.

use anyhow::{Context, Result};
use compact_str::CompactString;
use serde::Deserialize;
use std::path::Path;

/// Process-wide dispatcher configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Whether backup-model fallback is enabled.
    pub use_backup_model: bool,

    /// The fixed backup provider/model used when the primary is unavailable
    /// or throttled.
    pub backup: BackupModel,

    /// Shared API key used when a user has not supplied their own.
    pub default_api_key: Option<String>,
}

/// The fixed backup provider/model pair.
#[derive(Debug, Clone, Deserialize)]
pub struct BackupModel {
    /// Backup provider id.
    pub provider: CompactString,
    /// Backup model id.
    pub model: CompactString,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            use_backup_model: false,
            backup: BackupModel {
                provider: "anthropic".into(),
                model: "claude-3-7-sonnet-20250219".into(),
            },
            default_api_key: None,
        }
    }
}

impl DispatchConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }
}

/// Which providers are enabled for this process.
///
/// The resolver table is built from this once at startup; optional backends
/// appear only when configured here, never via runtime feature probing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Endpoint of a local Ollama instance; enables the `ollama` provider.
    pub ollama_endpoint: Option<String>,

    /// Model served by the local Ollama instance.
    pub ollama_model: Option<CompactString>,
}
