//! Configuration System
//!
//! Layered configuration for the generation pipeline: merge-policy defaults, the global
//! user file, the workspace file and `FOLIO_` environment overrides, in that order.

use crate::logging::LoggingConfig;
use crate::error::GenerationError;
use crate::plan::{PlanConfig, PlanRegistry};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

pub use crate::provider::{ProviderConfig, ProviderType};

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FolioConfig {
    /// Generative backend used for every pipeline call
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Pipeline tuning knobs
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Document store location
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Standalone TOML file of section plans, applied beneath `plans`
    #[serde(default)]
    pub plans_file: Option<PathBuf>,

    /// Extra or overriding section plans keyed by document type
    #[serde(default)]
    pub plans: HashMap<String, PlanConfig>,
}

impl FolioConfig {
    /// Built-in plans, then `plans_file`, then inline `[plans.*]` tables
    pub fn plan_registry(&self) -> Result<PlanRegistry, GenerationError> {
        let mut registry = PlanRegistry::builtin();
        if let Some(path) = &self.plans_file {
            registry = registry.with_plan_file(path)?;
        }
        registry.with_configured(&self.plans)
    }
}

/// Knobs for compression, validation, refinement, timeouts and concurrency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Prior sections at or above this many characters are summarized before reuse
    #[serde(default = "default_compression_threshold")]
    pub compression_threshold_chars: usize,

    /// Length kept when summarization fails and the compressor truncates instead
    #[serde(default = "default_truncation_chars")]
    pub truncation_chars: usize,

    /// Minimum trimmed length for a generated section to count as content
    #[serde(default = "default_min_content_chars")]
    pub min_content_chars: usize,

    /// Run the refinement pass on batch-generated sections
    #[serde(default = "default_true")]
    pub refine: bool,

    /// Timeout for a single batch backend call
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,

    /// Timeout between two fragments of a streaming backend call
    #[serde(default = "default_fragment_timeout_secs")]
    pub fragment_timeout_secs: u64,

    /// Upper bound on independent sections generated at the same time
    #[serde(default = "default_max_concurrent_sections")]
    pub max_concurrent_sections: usize,
}

fn default_compression_threshold() -> usize {
    500
}

fn default_truncation_chars() -> usize {
    300
}

fn default_min_content_chars() -> usize {
    50
}

fn default_true() -> bool {
    true
}

fn default_call_timeout_secs() -> u64 {
    120
}

fn default_fragment_timeout_secs() -> u64 {
    30
}

fn default_max_concurrent_sections() -> usize {
    4
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            compression_threshold_chars: default_compression_threshold(),
            truncation_chars: default_truncation_chars(),
            min_content_chars: default_min_content_chars(),
            refine: default_true(),
            call_timeout_secs: default_call_timeout_secs(),
            fragment_timeout_secs: default_fragment_timeout_secs(),
            max_concurrent_sections: default_max_concurrent_sections(),
        }
    }
}

impl PipelineConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn fragment_timeout(&self) -> Duration {
        Duration::from_secs(self.fragment_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.truncation_chars == 0 {
            return Err("truncation_chars must be greater than zero".to_string());
        }
        if self.truncation_chars + 3 >= self.compression_threshold_chars {
            return Err(format!(
                "truncation_chars ({}) plus the ellipsis must be shorter than compression_threshold_chars ({})",
                self.truncation_chars, self.compression_threshold_chars
            ));
        }
        if self.max_concurrent_sections == 0 {
            return Err("max_concurrent_sections must be at least 1".to_string());
        }
        if self.call_timeout_secs == 0 || self.fragment_timeout_secs == 0 {
            return Err("timeouts must be at least one second".to_string());
        }
        Ok(())
    }
}

/// Document store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Sled database directory
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
}

fn default_store_path() -> PathBuf {
    directories::ProjectDirs::from("", "", "folio")
        .map(|dirs| dirs.data_dir().join("store"))
        .unwrap_or_else(|| PathBuf::from(".folio/store"))
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Provider(String),
    Pipeline(String),
    Plan(String, String),
    Storage(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Provider(msg) => write!(f, "Provider: {}", msg),
            ValidationError::Pipeline(msg) => write!(f, "Pipeline: {}", msg),
            ValidationError::Plan(name, msg) => write!(f, "Plan '{}': {}", name, msg),
            ValidationError::Storage(msg) => write!(f, "Storage: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl FolioConfig {
    /// Validate the entire configuration, collecting every problem found
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.provider.validate() {
            errors.push(ValidationError::Provider(e));
        }

        if let Err(e) = self.pipeline.validate() {
            errors.push(ValidationError::Pipeline(e));
        }

        for (document_type, plan) in &self.plans {
            if let Err(e) = plan.to_plan(document_type) {
                errors.push(ValidationError::Plan(document_type.clone(), e.to_string()));
            }
        }

        if self.storage.store_path.as_os_str().is_empty() {
            errors.push(ValidationError::Storage(
                "Store path cannot be empty".to_string(),
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
