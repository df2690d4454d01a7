mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;
use ed247_runtime::LogLevel;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "ed247", version, about = "ED-247 component tool")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr): error, warning, info, debug, test or 0-4.
    #[arg(
        long,
        value_name = "LEVEL",
        default_value = "warning",
        env = "ED247_LOG_LEVEL",
        global = true
    )]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_send_subcommand() {
        let cli = Cli::try_parse_from([
            "ed247",
            "send",
            "component.json",
            "--stream",
            "Altitude",
            "--hex",
            "00ff10",
        ])
        .expect("send args should parse");

        assert!(matches!(cli.command, Command::Send(_)));
    }

    #[test]
    fn rejects_conflicting_payload_args() {
        let err = Cli::try_parse_from([
            "ed247",
            "send",
            "component.json",
            "--stream",
            "Altitude",
            "--hex",
            "00",
            "--data",
            "hello",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn accepts_numeric_log_level() {
        let cli = Cli::try_parse_from(["ed247", "--log-level", "3", "info", "component.json"])
            .expect("numeric level should parse");
        assert_eq!(cli.log_level, LogLevel::Debug);
    }

    #[test]
    fn rejects_unknown_log_level() {
        let err = Cli::try_parse_from(["ed247", "--log-level", "loud", "version"])
            .expect_err("unknown level should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn parses_listen_subcommand() {
        let cli = Cli::try_parse_from([
            "ed247",
            "listen",
            "component.json",
            "--streams",
            "Bus.*",
            "--timeout",
            "2s",
        ])
        .expect("listen args should parse");
        assert!(matches!(cli.command, Command::Listen(_)));
    }
}
