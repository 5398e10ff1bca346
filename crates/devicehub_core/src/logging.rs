//! Core logging bootstrap and safety policy.
//!
//! # Responsibility
//! - Initialize stderr or size-rotated file logging exactly once per process.
//! - Emit stable, metadata-only diagnostic events from core.
//!
//! # Invariants
//! - Logging init is idempotent for the same configuration.
//! - Logging initialization must not panic.
//! - Re-initialization with a different configuration is rejected.

use crate::config::LoggerConfig;
use flexi_logger::{
    Cleanup, Criterion, Duplicate, FileSpec, Logger, LoggerHandle, Naming, WriteMode,
};
use log::{error, info};
use once_cell::sync::OnceCell;
use std::path::PathBuf;

const MAX_LOG_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
const MAX_LOG_FILES: usize = 5;
const MAX_PANIC_PAYLOAD_CHARS: usize = 160;

static LOGGING_STATE: OnceCell<LoggingState> = OnceCell::new();
static PANIC_HOOK_INSTALLED: OnceCell<()> = OnceCell::new();

#[derive(Debug, Clone, PartialEq, Eq)]
struct ActiveLogging {
    level: &'static str,
    log_file: Option<PathBuf>,
    development: bool,
}

struct LoggingState {
    active: ActiveLogging,
    _logger: LoggerHandle,
}

/// Initializes core logging from logger configuration.
///
/// Returns `Ok(())` when logging is active, or a human-readable error string
/// when initialization fails.
///
/// # Errors
/// - Returns an error when `level` is unsupported.
/// - Returns an error when logging is already active with another config.
/// - Returns an error when the log directory cannot be created or the
///   backend fails to start.
pub fn init_logging(config: &LoggerConfig) -> Result<(), String> {
    let requested = ActiveLogging {
        level: normalize_level(&config.level)?,
        log_file: normalize_log_file(&config.filename),
        development: config.is_development(),
    };

    if let Some(state) = LOGGING_STATE.get() {
        return ensure_same_config(&state.active, &requested);
    }

    let state = LOGGING_STATE.get_or_try_init(|| -> Result<LoggingState, String> {
        let logger = start_logger(&requested)?;
        install_panic_hook_once();

        info!(
            "event=app_start module=core status=ok platform={} build_mode={} version={}",
            std::env::consts::OS,
            build_mode(),
            env!("CARGO_PKG_VERSION")
        );
        info!(
            "event=core_init module=core status=ok level={} target={}",
            requested.level,
            describe_target(&requested.log_file)
        );

        Ok(LoggingState {
            active: requested.clone(),
            _logger: logger,
        })
    })?;

    ensure_same_config(&state.active, &requested)
}

/// Returns active logging status metadata.
///
/// Returns `None` when logging has not been initialized, otherwise the
/// level and the log file (`None` for stderr).
pub fn logging_status() -> Option<(&'static str, Option<PathBuf>)> {
    LOGGING_STATE
        .get()
        .map(|state| (state.active.level, state.active.log_file.clone()))
}

fn start_logger(requested: &ActiveLogging) -> Result<LoggerHandle, String> {
    let logger = Logger::try_with_str(requested.level)
        .map_err(|err| format!("invalid log level `{}`: {err}", requested.level))?;

    let logger = match &requested.log_file {
        None => logger.log_to_stderr(),
        Some(path) => {
            if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|err| {
                    format!("failed to create log directory `{}`: {err}", parent.display())
                })?;
            }
            let file_spec = FileSpec::try_from(path.as_path())
                .map_err(|err| format!("invalid log file `{}`: {err}", path.display()))?;
            let logger = logger
                .log_to_file(file_spec)
                .rotate(
                    Criterion::Size(MAX_LOG_FILE_SIZE_BYTES),
                    Naming::Numbers,
                    Cleanup::KeepLogFiles(MAX_LOG_FILES),
                )
                .append()
                .format_for_files(flexi_logger::detailed_format);
            if requested.development {
                logger.duplicate_to_stderr(Duplicate::All)
            } else {
                logger
            }
        }
    };

    logger
        .write_mode(WriteMode::BufferAndFlush)
        .start()
        .map_err(|err| format!("failed to start logger: {err}"))
}

fn ensure_same_config(active: &ActiveLogging, requested: &ActiveLogging) -> Result<(), String> {
    if active.log_file != requested.log_file {
        return Err(format!(
            "logging already initialized at `{}`; refusing to switch to `{}`",
            describe_target(&active.log_file),
            describe_target(&requested.log_file)
        ));
    }
    if active.level != requested.level {
        return Err(format!(
            "logging already initialized with level `{}`; refusing to switch to `{}`",
            active.level, requested.level
        ));
    }
    Ok(())
}

fn normalize_level(level: &str) -> Result<&'static str, String> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        other => Err(format!(
            "unsupported log level `{other}`; expected trace|debug|info|warn|error"
        )),
    }
}

fn normalize_log_file(filename: &str) -> Option<PathBuf> {
    let trimmed = filename.trim();
    (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
}

fn describe_target(log_file: &Option<PathBuf>) -> String {
    match log_file {
        Some(path) => path.display().to_string(),
        None => "stderr".to_string(),
    }
}

fn build_mode() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "release"
    }
}

fn install_panic_hook_once() {
    if PANIC_HOOK_INSTALLED.get().is_some() {
        return;
    }

    let previous_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        // Payloads can carry request data; keep them single-line and short.
        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = panic_payload_summary(panic_info);
        error!(
            "event=panic_captured module=core status=error location={} payload={}",
            location, payload
        );
        previous_hook(panic_info);
    }));

    let _ = PANIC_HOOK_INSTALLED.set(());
}

fn panic_payload_summary(info: &std::panic::PanicHookInfo<'_>) -> String {
    let payload = if let Some(message) = info.payload().downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = info.payload().downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    };

    sanitize_message(&payload, MAX_PANIC_PAYLOAD_CHARS)
}

fn sanitize_message(value: &str, max_chars: usize) -> String {
    let normalized = value.replace(['\n', '\r'], " ");
    let mut truncated = normalized.chars().take(max_chars).collect::<String>();
    if normalized.chars().count() > max_chars {
        truncated.push_str("...");
    }
    truncated
}
