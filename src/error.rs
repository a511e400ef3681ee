//! Error types
//!
//! `FtpsError` is what callers of the session API see. `TransferError` is raised
//! by a transfer engine during a single attempt and is retried by the session.

use std::fmt;
use std::io;
use std::path::PathBuf;

use suppaftp::{FtpError, Status};
use thiserror::Error;

/// Errors returned to callers of `Session` and the configuration helpers
#[derive(Debug, Error)]
pub enum FtpsError {
    /// URL does not start with `ftps://`
    #[error("invalid URL '{0}': expected URL scheme is ftps://")]
    InvalidScheme(String),

    /// Invalid configuration value or unreadable configuration file
    #[error("configuration error: {0}")]
    Config(String),

    /// Local file could not be opened, created or inspected
    #[error("local file {}: {source}", .path.display())]
    LocalFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Every attempt of an operation failed
    ///
    /// Sessions never return this on their own; it is produced by
    /// `Outcome::into_result` when the caller wants exhaustion to be fatal.
    #[error("operation failed after {attempts} attempt(s){}", .last_error.as_ref().map(|e| format!(": {e}")).unwrap_or_default())]
    RetriesExhausted {
        attempts: u32,
        last_error: Option<TransferError>,
    },
}

impl FtpsError {
    pub(crate) fn local_file(path: impl Into<PathBuf>, source: io::Error) -> Self {
        FtpsError::LocalFile {
            path: path.into(),
            source,
        }
    }
}

/// Category of a transfer engine failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferErrorKind {
    /// URL missing or not parseable as an FTPS target
    UrlMalformed,
    /// Host name did not resolve to any address
    CouldNotResolveHost,
    /// TCP connection could not be established
    CouldNotConnect,
    /// Connection or transfer timed out
    OperationTimedOut,
    /// TLS handshake failed
    SslConnect,
    /// Server rejected the credentials
    LoginDenied,
    /// Remote file or directory does not exist
    RemoteFileNotFound,
    /// Fewer bytes were transferred than declared
    PartialFile,
    /// Writing received data to the sink failed
    WriteError,
    /// Reading upload data from the source failed
    ReadError,
    /// Unexpected or malformed server reply
    Protocol,
}

impl fmt::Display for TransferErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransferErrorKind::UrlMalformed => "malformed URL",
            TransferErrorKind::CouldNotResolveHost => "could not resolve host",
            TransferErrorKind::CouldNotConnect => "could not connect",
            TransferErrorKind::OperationTimedOut => "operation timed out",
            TransferErrorKind::SslConnect => "TLS connect error",
            TransferErrorKind::LoginDenied => "login denied",
            TransferErrorKind::RemoteFileNotFound => "remote file not found",
            TransferErrorKind::PartialFile => "partial file",
            TransferErrorKind::WriteError => "write error",
            TransferErrorKind::ReadError => "read error",
            TransferErrorKind::Protocol => "protocol error",
        };
        f.write_str(name)
    }
}

/// Failure of a single engine attempt
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct TransferError {
    pub kind: TransferErrorKind,
    pub message: String,
}

impl TransferError {
    pub fn new(kind: TransferErrorKind, message: impl Into<String>) -> Self {
        TransferError {
            kind,
            message: message.into(),
        }
    }
}

impl From<FtpError> for TransferError {
    fn from(err: FtpError) -> Self {
        match err {
            FtpError::ConnectionError(e) => {
                let kind = match e.kind() {
                    io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
                        TransferErrorKind::OperationTimedOut
                    }
                    _ => TransferErrorKind::CouldNotConnect,
                };
                TransferError::new(kind, e.to_string())
            }
            FtpError::SecureError(msg) => TransferError::new(TransferErrorKind::SslConnect, msg),
            FtpError::UnexpectedResponse(response) => {
                let kind = match response.status {
                    Status::NotLoggedIn => TransferErrorKind::LoginDenied,
                    Status::FileUnavailable => TransferErrorKind::RemoteFileNotFound,
                    _ => TransferErrorKind::Protocol,
                };
                let body = String::from_utf8_lossy(&response.body);
                TransferError::new(kind, body.trim_end().to_string())
            }
            other => TransferError::new(TransferErrorKind::Protocol, other.to_string()),
        }
    }
}
