use ftps_session::cli::{self, Args, Command};
use ftps_session::logging::{log_error, log_info};
use ftps_session::{set_log_file, set_log_level, FtpsError, Level, Outcome, Session};
use std::process;

/// Exit code when every attempt of the operation failed
const EXIT_EXHAUSTED: i32 = 2;

fn run(args: &Args) -> Result<Outcome, FtpsError> {
    let config = args.session_config()?;
    let mut session = Session::from_config(&config)?;

    match &args.command {
        Command::List(dir) => {
            let listing = session.list(dir.as_deref());
            for name in &listing.files {
                println!("{}", name);
            }
            Ok(listing.outcome)
        }
        Command::Get { remote, local } => session.download(remote, local),
        Command::Put { local, remote } => session.upload(local, remote),
    }
}

fn main() {
    let args = cli::parse_args();

    if let Some(log_file) = &args.log_file {
        if let Err(e) = set_log_file(log_file) {
            eprintln!("Error: cannot use log file {}: {}", log_file, e);
            process::exit(1);
        }
    }
    if args.debug {
        set_log_level(Level::Debug);
    }

    let code = match run(&args) {
        Ok(outcome) if outcome.is_completed() => {
            let _ = log_info(&format!("Done after {} attempt(s)", outcome.attempts()));
            0
        }
        Ok(outcome) => {
            if let Err(e) = outcome.into_result() {
                eprintln!("Error: {}", e);
            }
            EXIT_EXHAUSTED
        }
        Err(e) => {
            let _ = log_error(&e.to_string());
            eprintln!("Error: {}", e);
            1
        }
    };

    process::exit(code);
}
