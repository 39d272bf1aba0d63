//! Layered configuration: defaults, the user file, the workspace file, then
//! the environment.

mod load;
mod merge;
mod schema;

pub use load::{
    ConfigError, LoadedConfig, load, load_or_init, load_user_config, load_workspace_config, write_config,
};
pub use merge::{apply_env_overrides, apply_overrides_from, merge_layers};
pub use schema::{
    AttachmentsConfig, Config, ConfigLayer, DoctorConfig, DoctorConfigOverride,
    FileLoggingConfig, FileLoggingConfigOverride, LogFormat, LogRotation, LoggingConfig,
    LoggingConfigOverride, OutputConfig, OutputConfigOverride, OutputFormat, SyncConfig,
    SyncConfigOverride,
};
