//! Merge rules: built-in defaults under every file and env layer.

use crate::config::PIPELINE_VERSION;
use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with the defaults that must exist before any
/// file layer is merged. Everything else falls back to serde defaults.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("pipeline.version", PIPELINE_VERSION as i64)?
        .set_default("storage.store_path", ".benchline/store")?
        .set_default("logging.level", "info")
}
