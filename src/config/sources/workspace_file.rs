//! Per-workspace layers under `<workspace>/config/`

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File};
use std::path::{Path, PathBuf};

/// Selects the environment overlay file; unset means `development`.
pub const ENV_SELECTOR: &str = "BENCHLINE_ENV";

/// Existing workspace layers, lowest precedence first: `config.toml`, then
/// the `{BENCHLINE_ENV}.toml` overlay.
pub fn layer_paths(workspace_root: &Path) -> Vec<PathBuf> {
    let dir = workspace_root.join("config");
    let overlay = std::env::var(ENV_SELECTOR).unwrap_or_else(|_| "development".to_string());
    [dir.join("config.toml"), dir.join(format!("{}.toml", overlay))]
        .into_iter()
        .filter(|path| path.is_file())
        .collect()
}

pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
    workspace_root: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Ok(layer_paths(workspace_root)
        .into_iter()
        .fold(builder, |builder, path| builder.add_source(File::from(path))))
}
