//! Config loading entry point: assembles the layered builder and validates
//! the result once.

use super::merge::merge_policy;
use super::sources::{global_file, workspace_file};
use super::BenchlineConfig;
use crate::error::ReportError;
use config::{Config, Environment, File};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment prefix; `BENCHLINE__PIPELINE__BUILDER__CHUNK_SIZE=4` sets
/// `pipeline.builder.chunk_size`
pub const ENV_PREFIX: &str = "BENCHLINE";
pub const ENV_SEPARATOR: &str = "__";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace.
    ///
    /// Precedence, lowest to highest: built-in defaults, global file,
    /// `config/config.toml`, `config/{BENCHLINE_ENV}.toml`, environment.
    pub fn load(workspace_root: &Path) -> Result<BenchlineConfig, ReportError> {
        Self::load_layers(workspace_root, Self::global_config_path().as_deref())
    }

    /// Same as `load`, with an explicit global file (or none).
    pub fn load_layers(
        workspace_root: &Path,
        global: Option<&Path>,
    ) -> Result<BenchlineConfig, ReportError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder, global)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = builder.add_source(Self::environment());

        let config: BenchlineConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        debug!(
            workspace = %workspace_root.display(),
            provider = ?config.provider.provider_type,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Load a single explicit file over the defaults; environment still wins.
    pub fn load_from_file(path: &Path) -> Result<BenchlineConfig, ReportError> {
        let config: BenchlineConfig = merge_policy::builder_with_defaults()?
            .add_source(File::from(path.to_path_buf()))
            .add_source(Self::environment())
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn global_config_path() -> Option<PathBuf> {
        global_file::global_config_path()
    }

    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true)
    }

    /// Defaults only, no files or environment
    pub fn defaults() -> Result<BenchlineConfig, ReportError> {
        let config: BenchlineConfig = Config::builder().build()?.try_deserialize()?;
        Ok(config)
    }
}
