mod cmd;
mod logging;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};

#[derive(Parser, Debug)]
#[command(name = "lspbridge", version, about = "Sandboxed language-server bridge CLI")]
struct Cli {
    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    if let Err(err) = cmd::run(cli.command) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_demo_subcommand() {
        let cli = Cli::try_parse_from(["lspbridge", "demo", "--quiescence-ms", "100"])
            .expect("demo args should parse");
        assert!(matches!(cli.command, Command::Demo(_)));
    }

    #[test]
    fn rejects_unknown_subcommand() {
        Cli::try_parse_from(["lspbridge", "frobnicate"])
            .expect_err("unknown subcommand should fail");
    }
}
