//! FTPS (FTP over TLS) transfer handle
//!
//! `FtpsHandle` implements `TransferHandle` on top of suppaftp's rustls
//! stream. The URL decides the operation: a path ending in `/` is listed, the
//! upload flag stores the read source, anything else is retrieved into the
//! write sink. The control connection survives `reset` and is reused by later
//! performs against the same login.

use std::io::{self, Write};
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use secrecy::ExposeSecret;
use suppaftp::types::{FileType, Mode};
use suppaftp::{FtpError, RustlsConnector, RustlsFtpStream};

use crate::engine::target::FtpsTarget;
use crate::engine::{tls, HandleOptions, TransferHandle, TransferOption};
use crate::error::{TransferError, TransferErrorKind};
use crate::logging::log_debug;

/// Connect timeout used when none is configured
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(300);

struct Connection {
    target: FtpsTarget,
    verify_peer: bool,
    verify_host: bool,
    stream: RustlsFtpStream,
}

impl Connection {
    fn open(target: FtpsTarget, options: &HandleOptions) -> Result<Self, TransferError> {
        let timeout = options.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT);

        let addrs: Vec<SocketAddr> = (target.host.as_str(), target.port)
            .to_socket_addrs()
            .map_err(|e| {
                TransferError::new(
                    TransferErrorKind::CouldNotResolveHost,
                    format!("{}: {}", target.host, e),
                )
            })?
            .collect();

        if addrs.is_empty() {
            return Err(TransferError::new(
                TransferErrorKind::CouldNotResolveHost,
                format!("no addresses found for {}", target.host),
            ));
        }

        let tls_config = tls::client_config(options.verify_peer, options.verify_host)?;

        // Try each address until one completes the TLS upgrade
        let mut last_error = None;
        let mut secured = None;
        for addr in addrs {
            let _ = log_debug(&format!("Connecting to {} ({})", target.host, addr));
            match RustlsFtpStream::connect_timeout(addr, timeout) {
                Ok(plain) => {
                    let connector = RustlsConnector::from(tls_config.clone());
                    match plain.into_secure(connector, &target.host) {
                        Ok(stream) => {
                            secured = Some(stream);
                            break;
                        }
                        Err(e) => last_error = Some(e),
                    }
                }
                Err(e) => last_error = Some(e),
            }
        }

        let mut stream = match secured {
            Some(stream) => stream,
            None => {
                return Err(last_error.map(TransferError::from).unwrap_or_else(|| {
                    TransferError::new(TransferErrorKind::CouldNotConnect, "no addresses available")
                }))
            }
        };

        stream.login(target.user.as_str(), target.password.expose_secret().as_str())?;
        stream.transfer_type(FileType::Binary)?;
        stream.set_mode(Mode::Passive);
        stream.set_passive_nat_workaround(true);

        Ok(Connection {
            target,
            verify_peer: options.verify_peer,
            verify_host: options.verify_host,
            stream,
        })
    }

    fn serves(&self, target: &FtpsTarget, options: &HandleOptions) -> bool {
        self.target.same_login(target)
            && self.verify_peer == options.verify_peer
            && self.verify_host == options.verify_host
    }

    fn close(mut self) {
        let _ = self.stream.quit();
    }
}

/// Transfer handle backed by a real FTPS connection
#[derive(Default)]
pub struct FtpsHandle {
    options: HandleOptions,
    connection: Option<Connection>,
}

impl FtpsHandle {
    pub fn new() -> Self {
        FtpsHandle::default()
    }

    /// Closes the cached control connection, if any
    pub fn disconnect(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close();
        }
    }

    fn run(&mut self, target: FtpsTarget) -> Result<(), TransferError> {
        let upload = self.options.upload;
        let directory = target.is_directory();
        let list_path = target.list_path().map(str::to_owned);
        let path = target.path.clone();

        let FtpsHandle {
            options,
            connection,
        } = self;
        let stream = stream_for(connection, target, options)?;

        if upload {
            let source = options.read_source.as_mut().ok_or_else(|| {
                TransferError::new(TransferErrorKind::ReadError, "upload requested without a read source")
            })?;
            let sent = stream.put_file(path.as_str(), source)?;
            if let Some(declared) = options.in_file_size {
                if sent != declared {
                    return Err(TransferError::new(
                        TransferErrorKind::PartialFile,
                        format!("sent {} of {} declared bytes", sent, declared),
                    ));
                }
            }
            return Ok(());
        }

        let mut discard = io::sink();
        let sink: &mut dyn Write = match options.write_sink.as_mut() {
            Some(sink) => sink,
            None => &mut discard,
        };

        if directory {
            let lines = stream.list(list_path.as_deref())?;
            for line in lines {
                sink.write_all(line.as_bytes())
                    .and_then(|_| sink.write_all(b"\n"))
                    .map_err(|e| TransferError::new(TransferErrorKind::WriteError, e.to_string()))?;
            }
        } else {
            stream.retr(path.as_str(), |reader| {
                io::copy(reader, &mut *sink).map_err(FtpError::ConnectionError)
            })?;
        }
        sink.flush()
            .map_err(|e| TransferError::new(TransferErrorKind::WriteError, e.to_string()))
    }
}

fn stream_for<'a>(
    slot: &'a mut Option<Connection>,
    target: FtpsTarget,
    options: &HandleOptions,
) -> Result<&'a mut RustlsFtpStream, TransferError> {
    let reusable = slot
        .as_ref()
        .is_some_and(|connection| connection.serves(&target, options));

    if !reusable {
        if let Some(stale) = slot.take() {
            stale.close();
        }
        let connection = Connection::open(target, options)?;
        return Ok(&mut slot.insert(connection).stream);
    }

    let _ = log_debug(&format!("Reusing connection to {}:{}", target.host, target.port));
    slot.as_mut()
        .map(|connection| &mut connection.stream)
        .ok_or_else(|| TransferError::new(TransferErrorKind::CouldNotConnect, "connection lost"))
}

impl TransferHandle for FtpsHandle {
    fn reset(&mut self) {
        self.options = HandleOptions::default();
    }

    fn set_option(&mut self, option: TransferOption) {
        self.options.apply(option);
    }

    fn perform(&mut self) -> Result<(), TransferError> {
        let url = self
            .options
            .url
            .as_deref()
            .ok_or_else(|| TransferError::new(TransferErrorKind::UrlMalformed, "no URL set"))?;
        let target = FtpsTarget::parse(url)?;

        let result = self.run(target);
        if result.is_err() {
            // Next attempt starts from a fresh control connection
            self.disconnect();
        }
        result
    }

    fn options(&self) -> &HandleOptions {
        &self.options
    }

    fn options_mut(&mut self) -> &mut HandleOptions {
        &mut self.options
    }
}

impl Drop for FtpsHandle {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ftps_handle_send() {
        fn assert_send<T: Send>() {}
        assert_send::<FtpsHandle>();
    }

    #[test]
    fn test_reset_restores_defaults() {
        let mut handle = FtpsHandle::new();
        handle.set_option(TransferOption::Url("ftps://host/f1.txt".to_string()));
        handle.set_option(TransferOption::VerifyPeer(false));
        handle.set_option(TransferOption::Upload(true));

        handle.reset();

        assert!(handle.options().is_idle());
        assert!(handle.options().verify_peer);
    }

    #[test]
    fn test_perform_without_url_fails() {
        let mut handle = FtpsHandle::new();
        let err = handle.perform().unwrap_err();
        assert_eq!(err.kind, TransferErrorKind::UrlMalformed);
    }

    #[test]
    fn test_perform_with_malformed_url_fails() {
        let mut handle = FtpsHandle::new();
        handle.set_option(TransferOption::Url("ftps://".to_string()));
        let err = handle.perform().unwrap_err();
        assert_eq!(err.kind, TransferErrorKind::UrlMalformed);
    }

    #[test]
    fn test_unresolvable_host() {
        let mut handle = FtpsHandle::new();
        handle.set_option(TransferOption::Url("ftps://host.invalid/".to_string()));
        handle.set_option(TransferOption::ConnectTimeout(Duration::from_secs(1)));
        let err = handle.perform().unwrap_err();
        assert_eq!(err.kind, TransferErrorKind::CouldNotResolveHost);
    }
}
