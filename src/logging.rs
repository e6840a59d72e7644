//! Logging setup with optional file rotation
//!
//! Stderr logging is always available; a daily-rotated file layer is added when
//! a log file is configured. `RUST_LOG` overrides the configured level.

use crate::config::LoggingConfig;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level
    pub level: Level,

    /// Log to file
    pub file_path: Option<PathBuf>,

    /// Log to stderr
    pub stderr: bool,

    /// Emit JSON instead of the compact text format
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            file_path: None,
            stderr: true,
            json: false,
        }
    }
}

impl LogConfig {
    /// Build from the loaded server configuration, then apply env overrides
    pub fn from_config(config: &LoggingConfig) -> Self {
        let mut log_config = Self {
            level: parse_level(&config.level).unwrap_or(Level::INFO),
            file_path: config.file.clone(),
            stderr: true,
            json: config.json,
        };

        if let Ok(log_file) = std::env::var("SMARTHOME_LOG_FILE") {
            log_config.file_path = Some(PathBuf::from(log_file));
        }

        if let Ok(log_stderr) = std::env::var("SMARTHOME_LOG_STDERR") {
            log_config.stderr = log_stderr.to_lowercase() != "false";
        }

        log_config
    }

    /// Force debug level (CLI `--debug`)
    pub fn with_debug(mut self, debug: bool) -> Self {
        if debug {
            self.level = Level::DEBUG;
        }
        self
    }
}

fn parse_level(level: &str) -> Option<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Initialize logging with the given configuration
///
/// The returned guard must be held for the lifetime of the process when file
/// logging is enabled, otherwise buffered lines are lost.
pub fn init_logging(
    config: LogConfig,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>, Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(config.level.into())
        .from_env_lossy();

    let stderr_layer = config.stderr.then(|| {
        let layer = fmt::layer().with_writer(std::io::stderr).with_target(true);
        if config.json {
            layer.json().boxed()
        } else {
            layer.compact().boxed()
        }
    });

    let mut guard = None;
    let file_layer = match &config.file_path {
        Some(file_path) => {
            let directory = file_path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            std::fs::create_dir_all(directory)?;

            let file_name = file_path
                .file_name()
                .unwrap_or_else(|| std::ffi::OsStr::new("smarthome-voice.log"));
            let appender = tracing_appender::rolling::daily(directory, file_name);
            let (writer, worker_guard) = tracing_appender::non_blocking(appender);
            guard = Some(worker_guard);

            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            Some(if config.json {
                layer.json().boxed()
            } else {
                layer.boxed()
            })
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}
