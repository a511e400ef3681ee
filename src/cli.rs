use std::env;
use std::process;

use crate::config::{parse_config, SessionConfig};
use crate::error::FtpsError;

/// Operation requested on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `list [dir]`
    List(Option<String>),
    /// `get REMOTE LOCAL`
    Get { remote: String, local: String },
    /// `put LOCAL REMOTE`
    Put { local: String, remote: String },
}

/// Parsed command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Args {
    pub log_file: Option<String>,
    pub debug: bool,
    pub config_file: Option<String>,
    pub url: Option<String>,
    pub connect_timeout: Option<u64>,
    pub max_retries: Option<u32>,
    pub verify_peer: bool,
    pub verify_host: bool,
    pub command: Command,
}

impl Args {
    /// Builds the session configuration: config file (if any), then flags
    ///
    /// # Errors
    /// Config file errors and anything `SessionConfig::validate` rejects.
    pub fn session_config(&self) -> Result<SessionConfig, FtpsError> {
        let mut config = match (&self.config_file, &self.url) {
            (Some(path), _) => parse_config(path)?,
            (None, Some(url)) => SessionConfig::new(url.as_str()),
            (None, None) => return Err(FtpsError::Config("missing server URL".to_string())),
        };

        if let Some(timeout) = self.connect_timeout {
            config.connect_timeout = timeout;
        }
        if let Some(retries) = self.max_retries {
            config.max_retries = retries;
        }
        config.verify_peer |= self.verify_peer;
        config.verify_host |= self.verify_host;

        config.validate()?;
        Ok(config)
    }
}

/// Prints usage instructions for the program.
pub fn print_usage() {
    println!(
        "Usage: {} [-h] [-v] [-D] [-l logfile] [-t connect_timeout] [-r max_retries] [--verify-peer] [--verify-host] (-c config_file | URL) COMMAND\n\
         Commands:\n  \
           list [REMOTE_DIR]\n  \
           get REMOTE_FILE LOCAL_FILE\n  \
           put LOCAL_FILE REMOTE_FILE",
        crate::PROGRAM_NAME
    );
}

/// Parses process arguments, exiting with usage on error
pub fn parse_args() -> Args {
    let mut args = env::args();
    args.next(); // Skip program name

    match parse_args_from(args) {
        Ok(args) => args,
        Err(message) => {
            eprintln!("Error: {}", message);
            print_usage();
            process::exit(1);
        }
    }
}

fn parse_number<T: std::str::FromStr>(value: Option<String>, what: &str) -> Result<T, String> {
    let value = value.ok_or_else(|| format!("Missing {} argument", what))?;
    value
        .parse()
        .map_err(|_| format!("{} must be a non-negative number", what))
}

/// Parses arguments (without the program name)
///
/// `-h` and `-v` print and exit immediately.
pub fn parse_args_from<I: Iterator<Item = String>>(mut args: I) -> Result<Args, String> {
    let mut log_file = None;
    let mut debug = false;
    let mut config_file = None;
    let mut connect_timeout: Option<u64> = None;
    let mut max_retries: Option<u32> = None;
    let mut verify_peer = false;
    let mut verify_host = false;
    let mut positional = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" => {
                print_usage();
                process::exit(0);
            }
            "-v" => {
                println!("{} version {}", crate::PROGRAM_NAME, crate::PROGRAM_VERSION);
                process::exit(0);
            }
            "-D" => debug = true,
            "-l" => log_file = Some(args.next().ok_or("Missing log file argument")?),
            "-c" => config_file = Some(args.next().ok_or("Missing config file argument")?),
            "-t" => {
                let timeout: u64 = parse_number(args.next(), "Connect timeout")?;
                if timeout == 0 {
                    return Err("Connect timeout must be a positive number".to_string());
                }
                connect_timeout = Some(timeout);
            }
            "-r" => max_retries = Some(parse_number(args.next(), "Max retries")?),
            "--verify-peer" => verify_peer = true,
            "--verify-host" => verify_host = true,
            _ => positional.push(arg),
        }
    }

    let mut positional = positional.into_iter();
    let url = if config_file.is_none() {
        Some(positional.next().ok_or("Missing server URL argument")?)
    } else {
        None
    };

    let command = match positional.next().as_deref() {
        Some("list") => Command::List(positional.next()),
        Some("get") => Command::Get {
            remote: positional.next().ok_or("Missing remote file argument")?,
            local: positional.next().ok_or("Missing local file argument")?,
        },
        Some("put") => Command::Put {
            local: positional.next().ok_or("Missing local file argument")?,
            remote: positional.next().ok_or("Missing remote file argument")?,
        },
        Some(other) => return Err(format!("Unknown command: {}", other)),
        None => return Err("Missing command".to_string()),
    };

    if let Some(extra) = positional.next() {
        return Err(format!("Unexpected argument: {}", extra));
    }

    Ok(Args {
        log_file,
        debug,
        config_file,
        url,
        connect_timeout,
        max_retries,
        verify_peer,
        verify_host,
        command,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, String> {
        parse_args_from(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_parse_list_with_url() {
        let args = parse(&["-t", "10", "-r", "3", "ftps://host", "list", "incoming"]).unwrap();
        assert_eq!(args.url.as_deref(), Some("ftps://host"));
        assert_eq!(args.connect_timeout, Some(10));
        assert_eq!(args.max_retries, Some(3));
        assert_eq!(args.command, Command::List(Some("incoming".to_string())));
    }

    #[test]
    fn test_parse_get_and_put() {
        let args = parse(&["ftps://host", "get", "remote.txt", "local.txt"]).unwrap();
        assert_eq!(
            args.command,
            Command::Get {
                remote: "remote.txt".to_string(),
                local: "local.txt".to_string()
            }
        );

        let args = parse(&["ftps://host", "put", "local.txt", "remote.txt"]).unwrap();
        assert_eq!(
            args.command,
            Command::Put {
                local: "local.txt".to_string(),
                remote: "remote.txt".to_string()
            }
        );
    }

    #[test]
    fn test_parse_with_config_file() {
        let args = parse(&["-c", "session.json", "--verify-peer", "list"]).unwrap();
        assert_eq!(args.config_file.as_deref(), Some("session.json"));
        assert!(args.url.is_none());
        assert!(args.verify_peer);
        assert_eq!(args.command, Command::List(None));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["ftps://host"]).is_err());
        assert!(parse(&["ftps://host", "delete", "x"]).is_err());
        assert!(parse(&["ftps://host", "get", "only-remote"]).is_err());
        assert!(parse(&["-t", "0", "ftps://host", "list"]).is_err());
        assert!(parse(&["-r", "many", "ftps://host", "list"]).is_err());
        assert!(parse(&["ftps://host", "list", "a", "b"]).is_err());
    }

    #[test]
    fn test_session_config_overrides() {
        let args = parse(&["-t", "9", "-r", "0", "--verify-host", "ftps://host", "list"]).unwrap();
        let config = args.session_config().unwrap();
        assert_eq!(config.url, "ftps://host");
        assert_eq!(config.connect_timeout, 9);
        assert_eq!(config.max_retries, 0);
        assert!(!config.verify_peer);
        assert!(config.verify_host);
    }

    #[test]
    fn test_session_config_rejects_scheme() {
        let args = parse(&["ftp://host", "list"]).unwrap();
        assert!(matches!(args.session_config(), Err(FtpsError::InvalidScheme(_))));
    }
}
