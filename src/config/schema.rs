use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::DEFAULT_GRACE_SECONDS;
use crate::git::AUTOSYNC_TIMEOUT;
use crate::store::doctor::DEFAULT_TIME_REGRESSION_ALLOWANCE_SECS;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How long after a hand-off the previous owner may still edit.
    pub assign_grace_seconds: u64,
    pub logging: LoggingConfig,
    pub output: OutputConfig,
    pub sync: SyncConfig,
    pub doctor: DoctorConfig,
    pub attachments: AttachmentsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            assign_grace_seconds: DEFAULT_GRACE_SECONDS,
            logging: LoggingConfig::default(),
            output: OutputConfig::default(),
            sync: SyncConfig::default(),
            doctor: DoctorConfig::default(),
            attachments: AttachmentsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Json,
    Edn,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "edn" => Ok(Self::Edn),
            other => Err(format!("unknown output format `{other}` (expected json or edn)")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub pretty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Commit and push after every mutating command.
    pub auto: bool,
    /// Per-process budget for auto-sync.
    pub timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            auto: false,
            timeout_secs: AUTOSYNC_TIMEOUT.as_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DoctorConfig {
    pub time_regression_allowance_secs: u64,
}

impl Default for DoctorConfig {
    fn default() -> Self {
        Self {
            time_regression_allowance_secs: DEFAULT_TIME_REGRESSION_ALLOWANCE_SECS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttachmentsConfig {
    pub max_bytes: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Tree,
    Pretty,
    Compact,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogRotation {
    Daily,
    Hourly,
    Minutely,
    Never,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log to stderr; stdout carries command output only.
    pub stdout: bool,
    pub stdout_format: LogFormat,
    pub filter: Option<String>,
    pub file: FileLoggingConfig,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            stdout: true,
            stdout_format: LogFormat::Tree,
            filter: None,
            file: FileLoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoggingConfig {
    pub enabled: bool,
    pub dir: Option<PathBuf>,
    pub format: LogFormat,
    pub rotation: LogRotation,
    pub retention_max_age_days: Option<u64>,
    pub retention_max_files: Option<usize>,
}

impl Default for FileLoggingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: None,
            format: LogFormat::Json,
            rotation: LogRotation::Daily,
            retention_max_age_days: Some(14),
            retention_max_files: Some(20),
        }
    }
}

// =============================================================================
// Partial layers
// =============================================================================

/// One config file. Absent keys leave the lower layer untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigLayer {
    pub assign_grace_seconds: Option<u64>,
    pub logging: LoggingConfigOverride,
    pub output: OutputConfigOverride,
    pub sync: SyncConfigOverride,
    pub doctor: DoctorConfigOverride,
    pub attachments: AttachmentsConfig,
}

impl ConfigLayer {
    pub fn apply_to(&self, base: &mut Config) {
        if let Some(secs) = self.assign_grace_seconds {
            base.assign_grace_seconds = secs;
        }
        self.logging.apply_to(&mut base.logging);
        self.output.apply_to(&mut base.output);
        self.sync.apply_to(&mut base.sync);
        if let Some(secs) = self.doctor.time_regression_allowance_secs {
            base.doctor.time_regression_allowance_secs = secs;
        }
        if self.attachments.max_bytes.is_some() {
            base.attachments.max_bytes = self.attachments.max_bytes;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfigOverride {
    pub format: Option<OutputFormat>,
    pub pretty: Option<bool>,
}

impl OutputConfigOverride {
    fn apply_to(&self, target: &mut OutputConfig) {
        if let Some(format) = self.format {
            target.format = format;
        }
        if let Some(pretty) = self.pretty {
            target.pretty = pretty;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfigOverride {
    pub auto: Option<bool>,
    pub timeout_secs: Option<u64>,
}

impl SyncConfigOverride {
    fn apply_to(&self, target: &mut SyncConfig) {
        if let Some(auto) = self.auto {
            target.auto = auto;
        }
        if let Some(secs) = self.timeout_secs {
            target.timeout_secs = secs;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DoctorConfigOverride {
    pub time_regression_allowance_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfigOverride {
    pub stdout: Option<bool>,
    pub stdout_format: Option<LogFormat>,
    pub filter: Option<String>,
    pub file: Option<FileLoggingConfigOverride>,
}

impl LoggingConfigOverride {
    pub fn apply_to(&self, target: &mut LoggingConfig) {
        if let Some(stdout) = self.stdout {
            target.stdout = stdout;
        }
        if let Some(format) = self.stdout_format {
            target.stdout_format = format;
        }
        if let Some(filter) = self.filter.as_ref() {
            target.filter = Some(filter.clone());
        }
        if let Some(file) = self.file.as_ref() {
            file.apply_to(&mut target.file);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoggingConfigOverride {
    pub enabled: Option<bool>,
    pub dir: Option<PathBuf>,
    pub format: Option<LogFormat>,
    pub rotation: Option<LogRotation>,
    pub retention_max_age_days: Option<u64>,
    pub retention_max_files: Option<usize>,
}

impl FileLoggingConfigOverride {
    pub fn apply_to(&self, target: &mut FileLoggingConfig) {
        if let Some(enabled) = self.enabled {
            target.enabled = enabled;
        }
        if let Some(dir) = self.dir.as_ref() {
            target.dir = Some(dir.clone());
        }
        if let Some(format) = self.format {
            target.format = format;
        }
        if let Some(rotation) = self.rotation {
            target.rotation = rotation;
        }
        if let Some(days) = self.retention_max_age_days {
            target.retention_max_age_days = Some(days);
        }
        if let Some(files) = self.retention_max_files {
            target.retention_max_files = Some(files);
        }
    }
}
