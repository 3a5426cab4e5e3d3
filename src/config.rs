use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use thiserror::Error;

use crate::filter::Op;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("a command must be specified")]
    MissingCommand,

    #[error("invalid duration '{0}' (expected e.g. 250ms, 2s, 1m30s)")]
    InvalidDuration(String),
}

/// Operation kinds selectable with `--ops`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OpKind {
    Write,
    Create,
    Remove,
    Rename,
    Chmod,
}

impl From<OpKind> for Op {
    fn from(kind: OpKind) -> Op {
        match kind {
            OpKind::Write => Op::WRITE,
            OpKind::Create => Op::CREATE,
            OpKind::Remove => Op::REMOVE,
            OpKind::Rename => Op::RENAME,
            OpKind::Chmod => Op::CHMOD,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "rewatch",
    about = "Re-run a command after interesting files change",
    override_usage = "rewatch [OPTIONS] COMMAND [ARGS...]"
)]
pub struct Cli {
    /// Delay command execution until no interesting event has arrived for this long
    #[arg(long, default_value = "250ms", value_parser = parse_duration)]
    pub min_wait: Duration,

    /// Comma-separated list of interesting filename suffixes
    #[arg(long, default_value = "rs,toml")]
    pub suffixes: String,

    /// Comma-separated list of operations that count as activity
    #[arg(long, value_enum, value_delimiter = ',', default_values = ["write", "create"])]
    pub ops: Vec<OpKind>,

    /// Directory to watch (repeatable)
    #[arg(long = "watch", value_name = "PATH", default_value = ".")]
    pub watch: Vec<PathBuf>,

    /// Also watch subdirectories
    #[arg(long)]
    pub recursive: bool,

    /// Don't drop events for paths matched by .gitignore
    #[arg(long)]
    pub no_ignore: bool,

    /// Print output to the terminal instead of running the TUI
    #[arg(long)]
    pub plain: bool,

    /// Write diagnostics to this file (filtered by RUST_LOG)
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Command to run, followed by its arguments
    #[arg(
        value_name = "COMMAND",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub command: Vec<String>,
}

/// Validated settings, fixed for the life of the process.
#[derive(Debug, Clone)]
pub struct Config {
    pub command: String,
    pub args: Vec<String>,
    pub suffixes: Vec<String>,
    pub ops: Vec<Op>,
    pub min_wait: Duration,
    pub watch: Vec<PathBuf>,
    pub recursive: bool,
    pub respect_gitignore: bool,
    pub plain: bool,
    pub log_file: Option<PathBuf>,
}

impl TryFrom<Cli> for Config {
    type Error = ConfigError;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        let mut command = cli.command.into_iter();
        let program = command.next().ok_or(ConfigError::MissingCommand)?;
        Ok(Self {
            command: program,
            args: command.collect(),
            suffixes: split_trim(&cli.suffixes, ','),
            ops: cli.ops.into_iter().map(Op::from).collect(),
            min_wait: cli.min_wait,
            watch: cli.watch,
            recursive: cli.recursive,
            respect_gitignore: !cli.no_ignore,
            plain: cli.plain,
            log_file: cli.log_file,
        })
    }
}

/// Split and trim each piece. Empty pieces are kept: `""` yields `[""]`,
/// which is how extensionless files are made interesting.
fn split_trim(s: &str, sep: char) -> Vec<String> {
    s.split(sep).map(|bit| bit.trim().to_string()).collect()
}

/// Anything `humantime` accepts (`250ms`, `1m30s`, `500us`), or a bare
/// number of milliseconds.
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    let s = s.trim();
    if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
        return s
            .parse()
            .map(Duration::from_millis)
            .map_err(|_| ConfigError::InvalidDuration(s.to_string()));
    }
    humantime::parse_duration(s).map_err(|_| ConfigError::InvalidDuration(s.to_string()))
}
