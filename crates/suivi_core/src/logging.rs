//! Process-wide logging for the server.
//!
//! # Responsibility
//! - Start one `flexi_logger` backend writing size-rotated files, with an
//!   optional stderr echo for foreground runs.
//! - Route panics through the log as single-line `event=panic` records.
//!
//! # Invariants
//! - The backend is started at most once per process.
//! - Asking again with an identical [`LoggingConfig`] is a no-op; any other
//!   configuration is refused.

use flexi_logger::{
    Cleanup, Criterion, Duplicate, FileSpec, Logger, LoggerHandle, Naming, WriteMode,
};
use log::{error, info};
use once_cell::sync::OnceCell;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Once;

const LOG_BASENAME: &str = "suivi";
const ROTATE_AT_BYTES: u64 = 8 * 1024 * 1024;
const KEEP_ROTATED_FILES: usize = 5;
const PANIC_MESSAGE_LIMIT: usize = 200;

static ACTIVE: OnceCell<ActiveLogger> = OnceCell::new();
static PANIC_HOOK: Once = Once::new();

struct ActiveLogger {
    config: LoggingConfig,
    _handle: LoggerHandle,
}

#[derive(Debug)]
pub enum LoggingError {
    UnknownLevel(String),
    EmptyDirectory,
    CurrentDir(std::io::Error),
    CreateDirectory { dir: PathBuf, source: std::io::Error },
    Backend(String),
    /// A logger is already running with another configuration.
    Conflict {
        active: LoggingConfig,
        requested: LoggingConfig,
    },
}

impl Display for LoggingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownLevel(level) => write!(
                f,
                "unknown log level `{level}` (expected trace, debug, info, warn or error)"
            ),
            Self::EmptyDirectory => write!(f, "log directory must not be empty"),
            Self::CurrentDir(err) => write!(f, "cannot resolve current directory: {err}"),
            Self::CreateDirectory { dir, source } => {
                write!(f, "cannot create log directory `{}`: {source}", dir.display())
            }
            Self::Backend(message) => write!(f, "logger backend failed: {message}"),
            Self::Conflict { active, requested } => write!(
                f,
                "logging already runs as {active}; cannot switch to {requested}"
            ),
        }
    }
}

impl Error for LoggingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::CurrentDir(err) | Self::CreateDirectory { source: err, .. } => Some(err),
            _ => None,
        }
    }
}

/// Validated logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: &'static str,
    /// Always absolute.
    pub log_dir: PathBuf,
    pub echo_stderr: bool,
}

impl LoggingConfig {
    /// Validates `level` and resolves a relative `log_dir` against the
    /// current working directory.
    pub fn new(level: &str, log_dir: impl AsRef<Path>) -> Result<Self, LoggingError> {
        let level = parse_level(level)?;
        let log_dir = log_dir.as_ref();
        if log_dir.as_os_str().is_empty() {
            return Err(LoggingError::EmptyDirectory);
        }
        let log_dir = if log_dir.is_absolute() {
            log_dir.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(LoggingError::CurrentDir)?
                .join(log_dir)
        };

        Ok(Self {
            level,
            log_dir,
            echo_stderr: false,
        })
    }

    pub fn with_stderr_echo(mut self, echo: bool) -> Self {
        self.echo_stderr = echo;
        self
    }
}

impl Display for LoggingConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "level={} log_dir={} echo_stderr={}",
            self.level,
            self.log_dir.display(),
            self.echo_stderr
        )
    }
}

/// Starts the logger, or confirms the running one matches `config`.
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let active = ACTIVE.get_or_try_init(|| start_backend(config))?;
    if active.config != *config {
        return Err(LoggingError::Conflict {
            active: active.config.clone(),
            requested: config.clone(),
        });
    }
    Ok(())
}

/// Configuration of the running logger, if any.
pub fn active_logging() -> Option<LoggingConfig> {
    ACTIVE.get().map(|active| active.config.clone())
}

/// `debug` for debug builds, `info` otherwise.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn start_backend(config: &LoggingConfig) -> Result<ActiveLogger, LoggingError> {
    std::fs::create_dir_all(&config.log_dir).map_err(|source| {
        LoggingError::CreateDirectory {
            dir: config.log_dir.clone(),
            source,
        }
    })?;

    let echo = if config.echo_stderr {
        Duplicate::Info
    } else {
        Duplicate::None
    };
    let handle = Logger::try_with_str(config.level)
        .map_err(|err| LoggingError::Backend(err.to_string()))?
        .log_to_file(
            FileSpec::default()
                .directory(&config.log_dir)
                .basename(LOG_BASENAME),
        )
        .rotate(
            Criterion::Size(ROTATE_AT_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(KEEP_ROTATED_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .duplicate_to_stderr(echo)
        .start()
        .map_err(|err| LoggingError::Backend(err.to_string()))?;

    PANIC_HOOK.call_once(install_panic_hook);
    info!(
        "event=logging_init module=logging status=ok {} version={} os={}",
        config,
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS
    );

    Ok(ActiveLogger {
        config: config.clone(),
        _handle: handle,
    })
}

fn parse_level(level: &str) -> Result<&'static str, LoggingError> {
    const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
    let wanted = level.trim().to_ascii_lowercase();
    let wanted = if wanted == "warning" { "warn" } else { &wanted };
    LEVELS
        .into_iter()
        .find(|candidate| *candidate == wanted)
        .ok_or_else(|| LoggingError::UnknownLevel(level.to_string()))
}

fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let thread = std::thread::current();
        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = panic_info
            .payload()
            .downcast_ref::<&str>()
            .map(|message| (*message).to_string())
            .or_else(|| panic_info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "<non-string payload>".to_string());
        error!(
            "event=panic module=logging status=error thread={} location={} message={}",
            thread.name().unwrap_or("unnamed"),
            location,
            one_line(&payload, PANIC_MESSAGE_LIMIT)
        );
        previous(panic_info);
    }));
}

/// Flattens `text` to one line of at most `limit` characters.
fn one_line(text: &str, limit: usize) -> String {
    let mut flat = text
        .chars()
        .map(|ch| if ch.is_control() { ' ' } else { ch })
        .take(limit)
        .collect::<String>();
    if text.chars().count() > limit {
        flat.push_str("...");
    }
    flat
}
