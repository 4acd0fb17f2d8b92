//! Rolling file logs driven by [`CoreConfig`].
//!
//! Log lines carry ids, counts, layers and status only. Object names and
//! property payloads stay out of the files.
//!
//! The logger is process-global: the first successful init wins and later
//! calls must request the same level and directory.

use crate::config::CoreConfig;
use flexi_logger::{
    Age, Cleanup, Criterion, FileSpec, FlexiLoggerError, Logger, LoggerHandle, Naming, WriteMode,
};
use log::{info, LevelFilter};
use once_cell::sync::OnceCell;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

const LOG_BASENAME: &str = "modelcascade";
const ROTATE_AT_BYTES: u64 = 8 * 1024 * 1024;
const KEEP_ROTATED: usize = 7;

static ACTIVE: OnceCell<(LogSettings, LoggerHandle)> = OnceCell::new();

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("unsupported log level `{0}`; expected off|error|warn|info|debug|trace")]
    UnsupportedLevel(String),
    #[error("log_dir must be absolute, got `{0}`")]
    RelativeDir(PathBuf),
    #[error("cannot create log directory `{dir}`: {source}")]
    CreateDir {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("logger backend failed to start: {0}")]
    Backend(#[from] FlexiLoggerError),
    #[error("logging already active as {active}; refusing {requested}")]
    AlreadyActive {
        active: LogSettings,
        requested: LogSettings,
    },
}

/// Resolved level and directory for the file logger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: LevelFilter,
    pub dir: PathBuf,
}

impl std::fmt::Display for LogSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "level={} dir={}",
            level_name(self.level),
            self.dir.display()
        )
    }
}

impl LogSettings {
    /// Reads the log settings out of `config`; `None` when no `log_dir` is set.
    pub fn from_config(config: &CoreConfig) -> Result<Option<Self>, LoggingError> {
        let Some(dir) = &config.log_dir else {
            return Ok(None);
        };
        if !dir.is_absolute() {
            return Err(LoggingError::RelativeDir(dir.clone()));
        }
        Ok(Some(Self {
            level: parse_level(&config.log_level)?,
            dir: dir.clone(),
        }))
    }
}

/// Starts file logging for `config`.
///
/// Returns `Ok(false)` when the config has no `log_dir`, `Ok(true)` once the
/// logger is running. Repeating the call with the same settings is a no-op.
pub fn init_logging_from_config(config: &CoreConfig) -> Result<bool, LoggingError> {
    let Some(settings) = LogSettings::from_config(config)? else {
        return Ok(false);
    };
    let fresh = init_logging(settings)?;
    if fresh {
        info!("{}", startup_line(config));
    }
    Ok(true)
}

/// Starts the file logger with explicit settings.
///
/// Returns `Ok(true)` when this call started the logger and `Ok(false)` when
/// identical settings were already active.
///
/// # Errors
/// - `AlreadyActive` when a logger with other settings is running.
/// - `CreateDir` / `Backend` when the directory or logger cannot be set up.
pub fn init_logging(settings: LogSettings) -> Result<bool, LoggingError> {
    if !settings.dir.is_absolute() {
        return Err(LoggingError::RelativeDir(settings.dir));
    }
    if let Some((active, _)) = ACTIVE.get() {
        return same_or_conflict(active, settings).map(|()| false);
    }

    let mut started = false;
    let (active, _) = ACTIVE.get_or_try_init(|| {
        let handle = start_backend(&settings)?;
        started = true;
        Ok::<_, LoggingError>((settings.clone(), handle))
    })?;
    if !started {
        same_or_conflict(active, settings)?;
    }
    Ok(started)
}

/// Settings of the running logger, if any.
pub fn logging_status() -> Option<LogSettings> {
    ACTIVE.get().map(|(settings, _)| settings.clone())
}

/// `debug` for debug builds, `info` otherwise.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn start_backend(settings: &LogSettings) -> Result<LoggerHandle, LoggingError> {
    std::fs::create_dir_all(&settings.dir).map_err(|source| LoggingError::CreateDir {
        dir: settings.dir.clone(),
        source,
    })?;
    let handle = Logger::try_with_str(level_name(settings.level))?
        .log_to_file(
            FileSpec::default()
                .directory(settings.dir.as_path())
                .basename(LOG_BASENAME),
        )
        .rotate(
            Criterion::AgeOrSize(Age::Day, ROTATE_AT_BYTES),
            Naming::Timestamps,
            Cleanup::KeepLogFiles(KEEP_ROTATED),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()?;
    Ok(handle)
}

fn same_or_conflict(active: &LogSettings, requested: LogSettings) -> Result<(), LoggingError> {
    if *active == requested {
        Ok(())
    } else {
        Err(LoggingError::AlreadyActive {
            active: active.clone(),
            requested,
        })
    }
}

fn parse_level(raw: &str) -> Result<LevelFilter, LoggingError> {
    let trimmed = raw.trim();
    let candidate = if trimmed.eq_ignore_ascii_case("warning") {
        "warn"
    } else {
        trimmed
    };
    LevelFilter::from_str(candidate).map_err(|_| LoggingError::UnsupportedLevel(raw.to_string()))
}

fn level_name(level: LevelFilter) -> &'static str {
    match level {
        LevelFilter::Off => "off",
        LevelFilter::Error => "error",
        LevelFilter::Warn => "warn",
        LevelFilter::Info => "info",
        LevelFilter::Debug => "debug",
        LevelFilter::Trace => "trace",
    }
}

fn startup_line(config: &CoreConfig) -> String {
    let store = if config.db_path.is_some() { "file" } else { "memory" };
    let limits = config.page_limits();
    format!(
        "event=core_init module=core status=ok version={} platform={} store={} busy_timeout_ms={} lake_page_default={} lake_page_max={}",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        store,
        config.busy_timeout_ms,
        limits.default_page_size,
        limits.max_page_size
    )
}
