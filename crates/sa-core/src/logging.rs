//! Logging infrastructure for simpleaudio

use std::fs::File;

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{Config, LogLevel};

/// Map a configured level onto a tracing level, `None` disables logging
pub fn level_for(log_level: LogLevel) -> Option<Level> {
    match log_level {
        LogLevel::Off => None,
        LogLevel::Error => Some(Level::ERROR),
        LogLevel::Warn => Some(Level::WARN),
        LogLevel::Info => Some(Level::INFO),
        LogLevel::Debug => Some(Level::DEBUG),
        LogLevel::Trace => Some(Level::TRACE),
    }
}

fn filter(level: Level) -> EnvFilter {
    EnvFilter::from_default_env().add_directive(level.into())
}

/// Install the global subscriber described by `config.debug`.
///
/// Console output always carries the target, so `sched` and `device`
/// messages can be told apart. Returns false when logging is off or another
/// subscriber is already installed.
pub fn init(config: &Config) -> bool {
    let Some(level) = level_for(config.debug.log_level) else {
        return false;
    };

    let mut file_error = None;
    let file_layer = if config.debug.log_to_file {
        match File::create(&config.debug.log_path) {
            Ok(file) => Some(fmt::layer().with_writer(file).with_ansi(false)),
            Err(err) => {
                file_error = Some(err);
                None
            }
        }
    } else {
        None
    };

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_names(true)
        .with_line_number(true);

    let installed = tracing_subscriber::registry()
        .with(filter(level))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .is_ok();

    if let Some(err) = file_error {
        tracing::warn!(
            "Cannot create log file {}, logging to console only: {}",
            config.debug.log_path.display(),
            err
        );
    }
    installed
}

/// Console logging at info level, for tools and tests without a config
pub fn init_default() -> bool {
    tracing_subscriber::registry()
        .with(filter(Level::INFO))
        .with(fmt::layer())
        .try_init()
        .is_ok()
}

// Component-specific logging

/// Log a write-scheduler trace message
#[macro_export]
macro_rules! sched_trace {
    ($($arg:tt)*) => {
        tracing::trace!(target: "sched", $($arg)*)
    };
}

/// Log a write-scheduler debug message
#[macro_export]
macro_rules! sched_debug {
    ($($arg:tt)*) => {
        tracing::debug!(target: "sched", $($arg)*)
    };
}

/// Log a device debug message
#[macro_export]
macro_rules! device_debug {
    ($($arg:tt)*) => {
        tracing::debug!(target: "device", $($arg)*)
    };
}
