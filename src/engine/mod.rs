//! Transfer engine abstraction
//!
//! A `TransferHandle` is a reusable, option-driven transfer context: options
//! are set one by one, `perform` runs whatever they describe, and `reset`
//! returns the handle to its defaults. `FtpsHandle` is the real engine; tests
//! substitute a scripted handle.

pub mod ftps;
pub mod target;
pub mod tls;

#[cfg(test)]
pub(crate) mod mock;

pub use ftps::FtpsHandle;
pub use target::{redact_url, FtpsTarget};

use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::error::{TransferError, TransferErrorKind};

/// Destination for received bytes that can be emptied before a new attempt
pub trait TransferSink: Write + Send {
    /// Discards everything written so far
    fn restart(&mut self) -> io::Result<()>;
}

impl TransferSink for File {
    fn restart(&mut self) -> io::Result<()> {
        self.set_len(0)?;
        self.seek(SeekFrom::Start(0)).map(|_| ())
    }
}

/// Origin of upload bytes that can be read again from the start
pub trait TransferSource: Read + Send {
    /// Moves back to the first byte
    fn restart(&mut self) -> io::Result<()>;
}

impl<T: Read + Seek + Send> TransferSource for T {
    fn restart(&mut self) -> io::Result<()> {
        self.seek(SeekFrom::Start(0)).map(|_| ())
    }
}

/// A single handle option
pub enum TransferOption {
    /// Target URL
    Url(String),
    /// Timeout for establishing the control connection
    ConnectTimeout(Duration),
    /// Verify the server certificate chain
    VerifyPeer(bool),
    /// Verify that the certificate matches the host name
    VerifyHost(bool),
    /// Destination for received bytes (listing or download)
    WriteSink(Box<dyn TransferSink>),
    /// Origin of bytes to upload
    ReadSource(Box<dyn TransferSource>),
    /// Perform an upload instead of a download
    Upload(bool),
    /// Declared size of the upload in bytes
    InFileSize(u64),
}

impl fmt::Debug for TransferOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferOption::Url(url) => f.debug_tuple("Url").field(&redact_url(url)).finish(),
            TransferOption::ConnectTimeout(t) => f.debug_tuple("ConnectTimeout").field(t).finish(),
            TransferOption::VerifyPeer(v) => f.debug_tuple("VerifyPeer").field(v).finish(),
            TransferOption::VerifyHost(v) => f.debug_tuple("VerifyHost").field(v).finish(),
            TransferOption::WriteSink(_) => f.write_str("WriteSink(..)"),
            TransferOption::ReadSource(_) => f.write_str("ReadSource(..)"),
            TransferOption::Upload(v) => f.debug_tuple("Upload").field(v).finish(),
            TransferOption::InFileSize(n) => f.debug_tuple("InFileSize").field(n).finish(),
        }
    }
}

/// Current option state of a handle
///
/// `Default` is the state right after `reset`: no URL, no timeout, no data
/// streams, and both TLS checks enabled.
pub struct HandleOptions {
    pub url: Option<String>,
    pub connect_timeout: Option<Duration>,
    pub verify_peer: bool,
    pub verify_host: bool,
    pub upload: bool,
    pub in_file_size: Option<u64>,
    pub write_sink: Option<Box<dyn TransferSink>>,
    pub read_source: Option<Box<dyn TransferSource>>,
}

impl Default for HandleOptions {
    fn default() -> Self {
        HandleOptions {
            url: None,
            connect_timeout: None,
            verify_peer: true,
            verify_host: true,
            upload: false,
            in_file_size: None,
            write_sink: None,
            read_source: None,
        }
    }
}

impl HandleOptions {
    /// Stores one option, replacing any previous value
    pub fn apply(&mut self, option: TransferOption) {
        match option {
            TransferOption::Url(url) => self.url = Some(url),
            TransferOption::ConnectTimeout(timeout) => self.connect_timeout = Some(timeout),
            TransferOption::VerifyPeer(verify) => self.verify_peer = verify,
            TransferOption::VerifyHost(verify) => self.verify_host = verify,
            TransferOption::WriteSink(sink) => self.write_sink = Some(sink),
            TransferOption::ReadSource(source) => self.read_source = Some(source),
            TransferOption::Upload(upload) => self.upload = upload,
            TransferOption::InFileSize(size) => self.in_file_size = Some(size),
        }
    }

    /// Empties the sink and rewinds the source so an attempt starts over
    pub fn restart_streams(&mut self) -> Result<(), TransferError> {
        if let Some(sink) = self.write_sink.as_mut() {
            sink.restart().map_err(|e| {
                TransferError::new(TransferErrorKind::WriteError, format!("cannot truncate output: {}", e))
            })?;
        }
        if let Some(source) = self.read_source.as_mut() {
            source.restart().map_err(|e| {
                TransferError::new(TransferErrorKind::ReadError, format!("cannot rewind input: {}", e))
            })?;
        }
        Ok(())
    }

    /// True when nothing operation-specific is set
    pub fn is_idle(&self) -> bool {
        self.url.is_none()
            && !self.upload
            && self.in_file_size.is_none()
            && self.write_sink.is_none()
            && self.read_source.is_none()
    }
}

impl fmt::Debug for HandleOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleOptions")
            .field("url", &self.url.as_deref().map(redact_url))
            .field("connect_timeout", &self.connect_timeout)
            .field("verify_peer", &self.verify_peer)
            .field("verify_host", &self.verify_host)
            .field("upload", &self.upload)
            .field("in_file_size", &self.in_file_size)
            .field("write_sink", &self.write_sink.is_some())
            .field("read_source", &self.read_source.is_some())
            .finish()
    }
}

/// Reusable handle to a transfer engine
pub trait TransferHandle {
    /// Drops every option and returns to `HandleOptions::default()`
    fn reset(&mut self);

    /// Sets one option for the next `perform`
    fn set_option(&mut self, option: TransferOption);

    /// Runs the configured operation, blocking until it finishes
    fn perform(&mut self) -> Result<(), TransferError>;

    /// Currently configured options
    fn options(&self) -> &HandleOptions;

    /// Mutable access to the configured options and streams
    fn options_mut(&mut self) -> &mut HandleOptions;
}

/// In-memory write sink that can be read back after the handle releases it
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        SharedBuffer::default()
    }

    /// Copy of everything written so far
    pub fn contents(&self) -> Vec<u8> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn clear(&self) {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl TransferSink for SharedBuffer {
    fn restart(&mut self) -> io::Result<()> {
        self.clear();
        Ok(())
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
