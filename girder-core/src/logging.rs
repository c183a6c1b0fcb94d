//! Logging setup for Girder applications.
//!
//! Structured events go through `tracing`. [`LogConfig`] installs a
//! `tracing-subscriber` registry writing through a non-blocking
//! `tracing-appender` worker; keep the returned guard alive for the life of
//! the process or buffered lines are lost on exit.
//!
//! ```no_run
//! use girder_core::logging::*;
//!
//! let _guard = LogConfig::new()
//!     .level(LogLevel::Debug)
//!     .format(LogFormat::Compact)
//!     .output(LogOutput::Stderr)
//!     .init()
//!     .expect("logging");
//!
//! info!("girder started");
//! ```
//!
//! `RUST_LOG` takes precedence over the configured level unless an
//! explicit filter is set with [`LogConfig::with_env_filter`].

use crate::Error;
use std::io;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub use tracing::{debug, error, info, trace, warn};

/// Minimum severity emitted when no filter directives are given
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Very detailed tracing, including per-factory calls
    Trace,
    /// Debugging information
    Debug,
    /// General operational messages
    Info,
    /// Warnings such as re-registered typers
    Warn,
    /// Errors only
    Error,
}

impl LogLevel {
    /// Directive form understood by `EnvFilter`
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Case-insensitive; `warning` is accepted for `warn`
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

/// Line format of the fmt layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line (default)
    Json,
    /// Single-line human readable text
    Plain,
    /// Multi-line output for development
    Pretty,
    /// Abbreviated single-line text
    Compact,
}

impl LogFormat {
    /// Case-insensitive; `text` is accepted for `plain`
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "json" => Some(LogFormat::Json),
            "plain" | "text" => Some(LogFormat::Plain),
            "pretty" => Some(LogFormat::Pretty),
            "compact" => Some(LogFormat::Compact),
            _ => None,
        }
    }
}

/// Where log lines are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    /// Standard output (default)
    Stdout,
    /// Standard error
    Stderr,
    /// Append to a single file
    File(String),
    /// Files under `directory` named `<prefix>.<period>`
    RollingFile {
        directory: String,
        prefix: String,
        rotation: Rotation,
    },
}

/// Rotation period for [`LogOutput::RollingFile`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    Minutely,
    Hourly,
    Daily,
    Never,
}

impl From<Rotation> for tracing_appender::rolling::Rotation {
    fn from(rotation: Rotation) -> Self {
        match rotation {
            Rotation::Minutely => Self::MINUTELY,
            Rotation::Hourly => Self::HOURLY,
            Rotation::Daily => Self::DAILY,
            Rotation::Never => Self::NEVER,
        }
    }
}

/// Logging configuration, built with chained setters
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Fallback level when neither `env_filter` nor `RUST_LOG` is set
    pub level: LogLevel,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Include the emitting thread id
    pub thread_ids: bool,
    /// Include the event target (module path)
    pub targets: bool,
    /// Include source file and line
    pub file_line: bool,
    /// Emit span close events and attach span context to JSON lines
    pub spans: bool,
    /// ANSI colors for the text formats
    pub colors: bool,
    /// Filter directives overriding `level` and `RUST_LOG`
    pub env_filter: Option<String>,
}

impl LogConfig {
    /// JSON at `info` to stdout
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the fallback level
    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Set the line format
    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the destination
    pub fn output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    /// Show thread ids
    pub fn with_thread_ids(mut self, enable: bool) -> Self {
        self.thread_ids = enable;
        self
    }

    /// Show event targets
    pub fn with_targets(mut self, enable: bool) -> Self {
        self.targets = enable;
        self
    }

    /// Show source locations
    pub fn with_file_line(mut self, enable: bool) -> Self {
        self.file_line = enable;
        self
    }

    /// Record span closes and span context
    pub fn with_spans(mut self, enable: bool) -> Self {
        self.spans = enable;
        self
    }

    /// Enable ANSI colors
    pub fn with_colors(mut self, enable: bool) -> Self {
        self.colors = enable;
        self
    }

    /// Explicit filter directives, e.g. `girder_core=trace,hyper=warn`
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    fn filter(&self) -> Result<EnvFilter, Error> {
        match &self.env_filter {
            Some(directives) => EnvFilter::try_new(directives)
                .map_err(|e| Error::Internal(format!("invalid log filter {directives:?}: {e}"))),
            None => Ok(EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(self.level.as_str()))),
        }
    }

    /// Install the global subscriber.
    ///
    /// Fails if the filter does not parse, the log file cannot be opened or
    /// a global subscriber is already set.
    pub fn init(self) -> Result<WorkerGuard, Error> {
        let filter = self.filter()?;

        let (writer, guard) = match &self.output {
            LogOutput::Stdout => tracing_appender::non_blocking(io::stdout()),
            LogOutput::Stderr => tracing_appender::non_blocking(io::stderr()),
            LogOutput::File(path) => {
                let file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)?;
                tracing_appender::non_blocking(file)
            }
            LogOutput::RollingFile {
                directory,
                prefix,
                rotation,
            } => tracing_appender::non_blocking(tracing_appender::rolling::RollingFileAppender::new(
                (*rotation).into(),
                directory,
                prefix,
            )),
        };

        let span_events = if self.spans {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };
        let base = fmt::layer()
            .with_writer(writer)
            .with_target(self.targets)
            .with_thread_ids(self.thread_ids)
            .with_span_events(span_events);
        let registry = tracing_subscriber::registry().with(filter);

        let installed = match self.format {
            LogFormat::Json => registry
                .with(
                    base.json()
                        .with_current_span(self.spans)
                        .with_span_list(self.spans)
                        .with_file(self.file_line)
                        .with_line_number(self.file_line),
                )
                .try_init(),
            LogFormat::Plain => registry
                .with(
                    base.with_ansi(self.colors)
                        .with_file(self.file_line)
                        .with_line_number(self.file_line),
                )
                .try_init(),
            LogFormat::Pretty => registry
                .with(
                    base.pretty()
                        .with_ansi(self.colors)
                        .with_file(self.file_line)
                        .with_line_number(self.file_line),
                )
                .try_init(),
            LogFormat::Compact => registry
                .with(base.compact().with_ansi(self.colors))
                .try_init(),
        };

        installed.map_err(|e| Error::Internal(format!("logging already initialised: {e}")))?;
        Ok(guard)
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Json,
            output: LogOutput::Stdout,
            thread_ids: false,
            targets: true,
            file_line: false,
            spans: false,
            colors: false,
            env_filter: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        assert_eq!(LogLevel::from_name("WARNING"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::from_name("Debug").map(|l| l.as_str()), Some("debug"));
        assert_eq!(LogLevel::from_name("loud"), None);
        assert_eq!(LogFormat::from_name("text"), Some(LogFormat::Plain));
        assert_eq!(LogFormat::from_name("JSON"), Some(LogFormat::Json));
    }

    #[test]
    fn test_default_is_json_info_stdout() {
        let config = LogConfig::default();
        assert_eq!(config.level, LogLevel::Info);
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.output, LogOutput::Stdout);
        assert!(config.targets);
    }

    #[test]
    fn test_invalid_filter_is_an_error() {
        let result = LogConfig::new().with_env_filter("girder=loudest").init();
        assert!(matches!(result, Err(Error::Internal(_))));
    }
}
