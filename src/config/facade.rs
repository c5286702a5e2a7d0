//! Config loading entry point: applies sources in precedence order.

use super::merge::merge_policy::builder_with_defaults;
use super::sources::{global_file, workspace_file};
use super::FolioConfig;
use config::{ConfigError, Environment, File};
use std::path::{Path, PathBuf};

/// Loads `FolioConfig` from layered sources.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace.
    ///
    /// Precedence (lowest to highest): defaults, global file, workspace file, environment.
    pub fn load(workspace_root: &Path) -> Result<FolioConfig, ConfigError> {
        let builder = builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        builder
            .add_source(Self::environment())
            .build()?
            .try_deserialize()
    }

    /// Load configuration from one explicit file, still honoring environment overrides.
    pub fn load_from_file(path: &Path) -> Result<FolioConfig, ConfigError> {
        builder_with_defaults()?
            .add_source(File::from(path).required(true))
            .add_source(Self::environment())
            .build()?
            .try_deserialize()
    }

    /// Path of the user-level config file, if a home directory can be resolved.
    pub fn global_config_path() -> Option<PathBuf> {
        global_file::global_config_path()
    }

    fn environment() -> Environment {
        Environment::with_prefix("FOLIO")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }
}
