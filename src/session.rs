//! FTPS session with bounded retries
//!
//! A `Session` owns one transfer handle for its whole lifetime. Every
//! operation configures the handle, performs it under the retry budget and
//! returns the handle to the baseline configuration, whatever the result.
//!
//! Exhausting the retry budget is not an error: operations return an
//! `Outcome` and the caller decides whether exhaustion is fatal
//! (`Outcome::into_result`).

use std::fmt;
use std::fs::File;
use std::path::Path;
use std::time::Duration;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::config::SessionConfig;
use crate::engine::{
    redact_url, FtpsHandle, HandleOptions, SharedBuffer, TransferHandle, TransferOption,
};
use crate::error::{FtpsError, TransferError};
use crate::listing::parse_listing;
use crate::logging::{log_debug, log_error, log_warning};
use crate::retry::{retry_with, AttemptRecord, RetryReport};

/// Bytes escaped in remote names before they go into a URL
///
/// `/` stays literal so nested paths keep their separators.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Handle options that hold between operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Baseline {
    pub verify_peer: bool,
    pub verify_host: bool,
    pub connect_timeout: Duration,
}

impl Baseline {
    /// Resets the handle and applies the baseline options
    pub fn apply<H: TransferHandle + ?Sized>(&self, handle: &mut H) {
        handle.reset();
        handle.set_option(TransferOption::VerifyPeer(self.verify_peer));
        handle.set_option(TransferOption::VerifyHost(self.verify_host));
        handle.set_option(TransferOption::ConnectTimeout(self.connect_timeout));
    }

    /// True when `options` carry exactly the baseline and nothing else
    pub fn matches(&self, options: &HandleOptions) -> bool {
        options.is_idle()
            && options.verify_peer == self.verify_peer
            && options.verify_host == self.verify_host
            && options.connect_timeout == Some(self.connect_timeout)
    }
}

/// How an operation ended
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The engine reported success on attempt number `attempts`
    Completed { attempts: u32 },
    /// Every attempt failed (or the budget was zero)
    Exhausted {
        attempts: u32,
        last_error: Option<TransferError>,
    },
}

impl Outcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Outcome::Completed { attempts } | Outcome::Exhausted { attempts, .. } => *attempts,
        }
    }

    /// Turns exhaustion into `FtpsError::RetriesExhausted`
    pub fn into_result(self) -> Result<u32, FtpsError> {
        match self {
            Outcome::Completed { attempts } => Ok(attempts),
            Outcome::Exhausted {
                attempts,
                last_error,
            } => Err(FtpsError::RetriesExhausted {
                attempts,
                last_error,
            }),
        }
    }
}

impl From<RetryReport<TransferError>> for Outcome {
    fn from(report: RetryReport<TransferError>) -> Self {
        if report.succeeded {
            Outcome::Completed {
                attempts: report.attempts,
            }
        } else {
            Outcome::Exhausted {
                attempts: report.attempts,
                last_error: report.failures.into_iter().last().map(|record| record.error),
            }
        }
    }
}

/// Result of `Session::list`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    /// Entry names in server order
    pub files: Vec<String>,
    pub outcome: Outcome,
}

/// FTPS client session
pub struct Session<H: TransferHandle = FtpsHandle> {
    base_url: String,
    max_retries: u32,
    baseline: Baseline,
    handle: H,
}

impl Session<FtpsHandle> {
    /// Creates a session with the default timeout (5 s) and attempt budget (5)
    ///
    /// # Errors
    /// `InvalidScheme` if `url` does not start with `ftps://`.
    pub fn new(url: &str) -> Result<Self, FtpsError> {
        Session::from_config(&SessionConfig::new(url))
    }

    pub fn with_options(url: &str, connect_timeout_secs: u64, max_retries: u32) -> Result<Self, FtpsError> {
        let config = SessionConfig {
            connect_timeout: connect_timeout_secs,
            max_retries,
            ..SessionConfig::new(url)
        };
        Session::from_config(&config)
    }

    pub fn from_config(config: &SessionConfig) -> Result<Self, FtpsError> {
        // Validate before the handle exists
        config.validate()?;
        Session::with_handle(config, FtpsHandle::new())
    }
}

impl<H: TransferHandle> Session<H> {
    /// Creates a session around an existing transfer handle
    ///
    /// The handle is reset to the baseline immediately. No network activity
    /// happens here.
    pub fn with_handle(config: &SessionConfig, handle: H) -> Result<Self, FtpsError> {
        config.validate()?;

        let mut session = Session {
            base_url: config.url.clone(),
            max_retries: config.max_retries,
            baseline: Baseline {
                verify_peer: config.verify_peer,
                verify_host: config.verify_host,
                connect_timeout: Duration::from_secs(config.connect_timeout),
            },
            handle,
        };
        session.reset_to_baseline();
        Ok(session)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn connect_timeout(&self) -> Duration {
        self.baseline.connect_timeout
    }

    pub fn baseline(&self) -> Baseline {
        self.baseline
    }

    pub fn handle(&self) -> &H {
        &self.handle
    }

    /// Clears per-operation options and reapplies the baseline
    pub fn reset_to_baseline(&mut self) {
        self.baseline.apply(&mut self.handle);
    }

    /// Runs whatever the handle is currently configured for, with retries
    ///
    /// Does not reset the handle; the operation methods do that.
    pub fn perform_with_retry(&mut self) -> Outcome {
        perform_logged(&mut self.handle, self.max_retries)
    }

    /// Lists a remote directory
    ///
    /// `None` and `Some("")` list the directory the base URL points at.
    /// Each entry is the last whitespace-separated token of a listing line.
    pub fn list(&mut self, remote_dir: Option<&str>) -> Listing {
        let remote_dir = match remote_dir {
            None | Some("") => String::new(),
            Some(dir) if dir.ends_with('/') => dir.to_string(),
            Some(dir) => format!("{}/", dir),
        };
        let url = self.url_for(&remote_dir);

        let buffer = SharedBuffer::new();
        let _ = log_debug(&format!("Listing directory: {}", redact_url(&url)));
        let outcome = self.run(vec![
            TransferOption::Url(url),
            TransferOption::WriteSink(Box::new(buffer.clone())),
        ]);

        Listing {
            files: parse_listing(&buffer.contents()),
            outcome,
        }
    }

    /// Downloads a remote file into `local_filename`
    ///
    /// The local file is created (or truncated) before the first attempt, so
    /// it exists even when every attempt fails. A retry truncates it again.
    ///
    /// # Errors
    /// `LocalFile` if the local file cannot be created.
    pub fn download(&mut self, remote_filename: &str, local_filename: impl AsRef<Path>) -> Result<Outcome, FtpsError> {
        let local = local_filename.as_ref();
        let url = self.url_for(remote_filename);

        let output_file = File::create(local).map_err(|e| FtpsError::local_file(local, e))?;
        let _ = log_debug(&format!(
            "Downloading file: {} -> {}",
            redact_url(&url),
            local.display()
        ));

        // The file is closed when the handle is reset
        Ok(self.run(vec![
            TransferOption::Url(url),
            TransferOption::WriteSink(Box::new(output_file)),
        ]))
    }

    /// Uploads `local_filename` to the remote path
    ///
    /// The declared transfer size is the local file size at open time. A retry
    /// sends the file again from its first byte.
    ///
    /// # Errors
    /// `LocalFile` if the local file cannot be opened or inspected.
    pub fn upload(&mut self, local_filename: impl AsRef<Path>, remote_filename: &str) -> Result<Outcome, FtpsError> {
        let local = local_filename.as_ref();
        let url = self.url_for(remote_filename);

        let input_file = File::open(local).map_err(|e| FtpsError::local_file(local, e))?;
        let size = input_file
            .metadata()
            .map_err(|e| FtpsError::local_file(local, e))?
            .len();
        let _ = log_debug(&format!(
            "Uploading file: {} -> {}",
            local.display(),
            redact_url(&url)
        ));

        Ok(self.run(vec![
            TransferOption::Url(url),
            TransferOption::Upload(true),
            TransferOption::ReadSource(Box::new(input_file)),
            TransferOption::InFileSize(size),
        ]))
    }

    fn url_for(&self, remote_path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url,
            utf8_percent_encode(remote_path, PATH_SEGMENT)
        )
    }

    /// Configures the handle, performs with retries and resets it on every path
    fn run(&mut self, options: Vec<TransferOption>) -> Outcome {
        let baseline = self.baseline;
        let max_retries = self.max_retries;
        let mut handle = scopeguard::guard(&mut self.handle, move |handle| baseline.apply(handle));

        for option in options {
            handle.set_option(option);
        }
        perform_logged(&mut **handle, max_retries)
    }
}

impl<H: TransferHandle> fmt::Debug for Session<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("base_url", &redact_url(&self.base_url))
            .field("max_retries", &self.max_retries)
            .field("baseline", &self.baseline)
            .finish_non_exhaustive()
    }
}

fn perform_logged<H: TransferHandle + ?Sized>(handle: &mut H, max_retries: u32) -> Outcome {
    let report = retry_with(
        max_retries,
        |attempt| -> Result<(), TransferError> {
            if attempt > 0 {
                // Output and input start over, not where the failed attempt stopped
                handle.options_mut().restart_streams()?;
            }
            handle.perform()
        },
        |failure| log_failure(failure, max_retries),
    );

    if report.succeeded {
        let _ = log_debug("Operation performed successfully");
    } else {
        let _ = log_error(&format!(
            "Failed to perform operation after {} attempt(s)",
            report.attempts
        ));
    }
    Outcome::from(report)
}

fn log_failure(failure: &AttemptRecord<TransferError>, max_retries: u32) {
    let _ = log_warning(&format!("Attempt {} failed: {}", failure.index, failure.error));
    if failure.index + 1 < max_retries {
        let _ = log_debug(&format!("Retrying ({})...", failure.index + 1));
    }
}
