use chrono::Local;
use once_cell::sync::Lazy;
use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

/// Severity of a log message
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// Global log file path protected by Mutex
///
/// When None, logs go to stderr so stdout carries only program output.
pub static LOG_FILE: Lazy<Mutex<Option<String>>> = Lazy::new(|| Mutex::new(None));

/// Minimum level that is written; anything below is dropped
pub static LOG_LEVEL: Lazy<Mutex<Level>> = Lazy::new(|| Mutex::new(Level::Info));

/// Logs a message with timestamp and level to the configured output
///
/// # Arguments
/// * `level` - Severity of the message
/// * `message` - The message to log
///
/// # Returns
/// * `io::Result<()>` - Ok on success (or when filtered out), Err if writing fails
///
/// # Example
/// ```text
/// // log(Level::Info, "Starting transfer").unwrap();
/// ```
pub fn log(level: Level, message: &str) -> io::Result<()> {
    if level < *LOG_LEVEL.lock().unwrap_or_else(PoisonError::into_inner) {
        return Ok(());
    }

    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let log_message = format!("{} [{}] {}\n", timestamp, level, message);

    match &*LOG_FILE.lock().unwrap_or_else(PoisonError::into_inner) {
        Some(log_file) => {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_file)?;
            file.write_all(log_message.as_bytes())?;
        }
        None => {
            io::stderr().lock().write_all(log_message.as_bytes())?;
        }
    }

    Ok(())
}

pub fn log_debug(message: &str) -> io::Result<()> {
    log(Level::Debug, message)
}

pub fn log_info(message: &str) -> io::Result<()> {
    log(Level::Info, message)
}

pub fn log_warning(message: &str) -> io::Result<()> {
    log(Level::Warning, message)
}

pub fn log_error(message: &str) -> io::Result<()> {
    log(Level::Error, message)
}

/// Sets the path for the log file
///
/// Subsequent log calls append to this file instead of writing to stderr.
///
/// # Errors
/// Returns `InvalidInput` if the path is not valid UTF-8.
pub fn set_log_file<P: AsRef<Path>>(path: P) -> io::Result<()> {
    let path_str = path.as_ref().to_str().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "log file path is not valid UTF-8")
    })?;
    *LOG_FILE.lock().unwrap_or_else(PoisonError::into_inner) = Some(path_str.to_string());
    Ok(())
}

/// Sets the minimum level that gets written
pub fn set_log_level(level: Level) {
    *LOG_LEVEL.lock().unwrap_or_else(PoisonError::into_inner) = level;
}

#[cfg(test)]
pub(crate) fn reset_logging_for_tests() {
    *LOG_FILE.lock().unwrap() = None;
    *LOG_LEVEL.lock().unwrap() = Level::Info;
}
