//! Per-user directories.

use std::ffi::OsString;
use std::path::PathBuf;

/// Overrides the per-user directory.
pub const CONFIG_DIR_ENV: &str = "CLARITY_CONFIG_DIR";

/// Base directory for the workspace registry, user config, local workspaces
/// and logs.
///
/// Uses `CLARITY_CONFIG_DIR` if set, otherwise `~/.clarity`.
pub fn config_dir() -> PathBuf {
    config_dir_from(std::env::var_os(CONFIG_DIR_ENV))
}

fn config_dir_from(env: Option<OsString>) -> PathBuf {
    if let Some(dir) = env
        && !dir.to_string_lossy().trim().is_empty()
    {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".clarity")
}

/// Default directory for rolling log files.
pub fn log_dir() -> PathBuf {
    config_dir().join("logs")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_wins_unless_blank() {
        assert_eq!(
            config_dir_from(Some("/tmp/cfg".into())),
            PathBuf::from("/tmp/cfg")
        );
        assert!(config_dir_from(Some("  ".into())).ends_with(".clarity"));
        assert!(config_dir_from(None).ends_with(".clarity"));
    }
}
