mod demo;

use std::fmt;

use clap::Subcommand;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run an end-to-end session against the built-in demo server.
    Demo(demo::DemoArgs),
}

pub fn run(command: Command) -> CliResult<()> {
    match command {
        Command::Demo(args) => demo::run(args),
    }
}

/// CLI failure, rendered to stderr by main.
#[derive(Debug)]
pub struct CliError(String);

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<E: std::error::Error> From<E> for CliError {
    fn from(err: E) -> Self {
        Self(err.to_string())
    }
}

pub type CliResult<T> = std::result::Result<T, CliError>;
