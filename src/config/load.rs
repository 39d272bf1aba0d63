use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::merge::{apply_env_overrides, merge_layers};
use super::{Config, ConfigLayer};
use crate::store::Layout;

pub const USER_CONFIG_FILE: &str = "clarity.toml";

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn read_layer(path: &Path) -> Result<Option<ConfigLayer>, ConfigError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    toml::from_str(&contents)
        .map(Some)
        .map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

pub fn load_user_config(config_dir: &Path) -> Result<Option<ConfigLayer>, ConfigError> {
    read_layer(&config_dir.join(USER_CONFIG_FILE))
}

/// `meta/clarity.toml`, shared with everyone who syncs the workspace.
pub fn load_workspace_config(workspace_root: &Path) -> Result<Option<ConfigLayer>, ConfigError> {
    read_layer(&Layout::new(workspace_root).workspace_config())
}

pub fn load(config_dir: &Path, workspace_root: Option<&Path>) -> Result<Config, ConfigError> {
    let mut config = load_layers(config_dir, workspace_root)?;
    for warning in apply_env_overrides(&mut config) {
        tracing::warn!("{warning}");
    }
    Ok(config)
}

fn load_layers(config_dir: &Path, workspace_root: Option<&Path>) -> Result<Config, ConfigError> {
    let user = load_user_config(config_dir)?;
    let workspace = match workspace_root {
        Some(root) => load_workspace_config(root)?,
        None => None,
    };
    Ok(merge_layers(user, workspace))
}

/// Configuration plus the problems met while loading it.
#[derive(Clone, Debug)]
pub struct LoadedConfig {
    pub config: Config,
    /// Logged by the caller once a subscriber is installed.
    pub warnings: Vec<String>,
}

/// Like [`load`], but never fails: a broken file falls back to defaults.
/// Writes a default user config the first time. Nothing is logged here, as
/// this runs before telemetry is set up.
pub fn load_or_init(config_dir: &Path, workspace_root: Option<&Path>) -> LoadedConfig {
    let path = config_dir.join(USER_CONFIG_FILE);
    let had_user_config = path.exists();
    let mut warnings = Vec::new();

    let mut config = load_layers(config_dir, workspace_root).unwrap_or_else(|e| {
        warnings.push(format!("config load failed, using defaults: {e}"));
        Config::default()
    });
    warnings.extend(apply_env_overrides(&mut config));

    if !had_user_config && let Err(e) = write_config(&path, &Config::default()) {
        warnings.push(format!("failed to write default config: {e}"));
    }
    LoadedConfig { config, warnings }
}

pub fn write_config(path: &Path, cfg: &Config) -> Result<(), ConfigError> {
    let write_err = |source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };
    let dir = path
        .parent()
        .ok_or_else(|| write_err(std::io::ErrorKind::InvalidInput.into()))?;
    fs::create_dir_all(dir).map_err(write_err)?;
    let contents = toml::to_string_pretty(cfg)?;
    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    temp.write_all(contents.as_bytes()).map_err(write_err)?;
    temp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}
