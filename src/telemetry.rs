//! Tracing subscriber setup.
//!
//! Logs go to stderr (stdout carries the command's JSON) and, when enabled,
//! to a rolling file under the config directory.

use std::fs;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};
use tracing_tree::HierarchicalLayer;

use crate::config::{FileLoggingConfig, LogFormat, LogRotation, LoggingConfig};
use crate::paths;

const LOG_FILE_PREFIX: &str = "clarity.log";

/// Environment variable holding an `EnvFilter` directive.
pub const LOG_ENV: &str = "LOG";

#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    /// `-v` count: 0 warnings, 1 info, 2 debug, 3+ trace.
    pub verbosity: u8,
    pub logging: LoggingConfig,
}

impl TelemetryConfig {
    pub fn new(verbosity: u8, logging: LoggingConfig) -> Self {
        Self { verbosity, logging }
    }
}

/// Keeps the non-blocking file writer flushing until dropped.
pub struct TelemetryGuard {
    _guards: Vec<tracing_appender::non_blocking::WorkerGuard>,
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

pub fn init(config: TelemetryConfig) -> TelemetryGuard {
    let logging = &config.logging;
    let mut layers: Vec<BoxedLayer> = Vec::new();
    let mut guard = None;
    let mut deferred = Vec::new();

    if logging.stdout {
        let ansi = std::io::stderr().is_terminal();
        layers.push(layer(logging.stdout_format, std::io::stderr, ansi));
    }
    if logging.file.enabled {
        match open_log_dir(&logging.file) {
            Ok((dir, pruned)) => {
                deferred.extend(pruned);
                let (writer, worker) =
                    tracing_appender::non_blocking(appender(logging.file.rotation, &dir));
                layers.push(layer(logging.file.format, writer, false));
                guard = Some(worker);
            }
            Err(message) => deferred.push(message),
        }
    }
    layers.push(filter(&config).boxed());

    // Only the first init in a process installs a subscriber.
    if Registry::default().with(layers).try_init().is_ok() {
        for message in deferred {
            tracing::debug!("{message}");
        }
    }
    TelemetryGuard { _guards: guard.into_iter().collect() }
}

/// `LOG` wins; otherwise the configured directives apply at `-v` 0 and the
/// verbosity level beyond that.
fn filter(config: &TelemetryConfig) -> EnvFilter {
    let builder = EnvFilter::builder()
        .with_default_directive(level_from_verbosity(config.verbosity).into())
        .with_env_var(LOG_ENV);
    match &config.logging.filter {
        Some(directives) if config.verbosity == 0 && std::env::var_os(LOG_ENV).is_none() => {
            builder.parse_lossy(directives)
        }
        _ => builder.from_env_lossy(),
    }
}

fn layer<W>(format: LogFormat, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    match format {
        LogFormat::Tree => HierarchicalLayer::new(2)
            .with_writer(writer)
            .with_ansi(ansi)
            .with_targets(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().with_writer(writer).with_ansi(ansi).boxed(),
        LogFormat::Compact => fmt::layer().compact().with_writer(writer).with_ansi(ansi).boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(writer)
            .with_current_span(true)
            .boxed(),
    }
}

fn appender(rotation: LogRotation, dir: &Path) -> RollingFileAppender {
    let rotation = match rotation {
        LogRotation::Daily => Rotation::DAILY,
        LogRotation::Hourly => Rotation::HOURLY,
        LogRotation::Minutely => Rotation::MINUTELY,
        LogRotation::Never => Rotation::NEVER,
    };
    RollingFileAppender::new(rotation, dir, LOG_FILE_PREFIX)
}

/// Create the log directory and apply retention. Messages are logged once
/// the subscriber exists.
fn open_log_dir(config: &FileLoggingConfig) -> Result<(PathBuf, Option<String>), String> {
    let dir = config.dir.clone().unwrap_or_else(paths::log_dir);
    fs::create_dir_all(&dir).map_err(|e| format!("cannot create log dir {}: {e}", dir.display()))?;
    let retention = RetentionLimits::from_file_config(config);
    let pruned = if retention.is_enabled() {
        Some(match prune_logs(&dir, LOG_FILE_PREFIX, retention, SystemTime::now()) {
            Ok(report) => format!(
                "log retention removed {} of {} file(s), {} failed",
                report.removed, report.candidates, report.failed
            ),
            Err(e) => format!("log retention failed: {e}"),
        })
    } else {
        None
    };
    Ok((dir, pruned))
}

fn level_from_verbosity(verbosity: u8) -> tracing::metadata::LevelFilter {
    match verbosity {
        0 => tracing::metadata::LevelFilter::WARN,
        1 => tracing::metadata::LevelFilter::INFO,
        2 => tracing::metadata::LevelFilter::DEBUG,
        _ => tracing::metadata::LevelFilter::TRACE,
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct RetentionLimits {
    max_age: Option<Duration>,
    max_files: Option<usize>,
}

impl RetentionLimits {
    fn from_file_config(config: &FileLoggingConfig) -> Self {
        Self {
            max_age: config
                .retention_max_age_days
                .map(|days| Duration::from_secs(days.saturating_mul(24 * 60 * 60))),
            max_files: config.retention_max_files,
        }
    }

    fn is_enabled(&self) -> bool {
        self.max_age.is_some() || self.max_files.is_some()
    }
}

#[derive(Clone, Debug)]
struct LogEntry {
    path: PathBuf,
    modified: SystemTime,
}

#[derive(Clone, Debug, Default)]
struct PruneReport {
    candidates: usize,
    removed: usize,
    failed: usize,
}

fn prune_logs(
    dir: &Path,
    prefix: &str,
    retention: RetentionLimits,
    now: SystemTime,
) -> std::io::Result<PruneReport> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let matches = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(prefix));
        let meta = entry.metadata()?;
        if matches && meta.is_file() {
            entries.push(LogEntry {
                path,
                modified: meta.modified().unwrap_or(now),
            });
        }
    }
    let candidates = entries.len();
    let mut report = PruneReport {
        candidates,
        ..PruneReport::default()
    };
    for path in expired_logs(&mut entries, retention, now) {
        match fs::remove_file(&path) {
            Ok(()) => report.removed += 1,
            Err(_) => report.failed += 1,
        }
    }
    Ok(report)
}

/// Files past `max_age`, then the oldest beyond `max_files`. `entries` keeps
/// the survivors.
fn expired_logs(
    entries: &mut Vec<LogEntry>,
    retention: RetentionLimits,
    now: SystemTime,
) -> Vec<PathBuf> {
    let mut removed = Vec::new();
    if let Some(max_age) = retention.max_age {
        let (old, keep): (Vec<_>, Vec<_>) = entries.drain(..).partition(|entry| {
            now.duration_since(entry.modified).unwrap_or(Duration::ZERO) > max_age
        });
        removed.extend(old.into_iter().map(|entry| entry.path));
        *entries = keep;
    }
    if let Some(max_files) = retention.max_files
        && entries.len() > max_files
    {
        entries.sort_by_key(|entry| entry.modified);
        let excess = entries.len() - max_files;
        removed.extend(entries.drain(..excess).map(|entry| entry.path));
    }
    removed
}
