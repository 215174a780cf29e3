use clap::{Parser, Subcommand, ValueEnum};
use jiff::Timestamp;
use shortid::DEFAULT_ABC;
use std::fmt::{Display, Formatter};

pub const WORKER_ENV: &str = "SHORTID_WORKER";
pub const SEED_ENV: &str = "SHORTID_SEED";
pub const ALPHABET_ENV: &str = "SHORTID_ALPHABET";
pub const EPOCH_ENV: &str = "SHORTID_EPOCH";
pub const LOG_FORMAT_ENV: &str = "SHORTID_LOG_FORMAT";

pub const DEFAULT_WORKER: u8 = 0;
pub const DEFAULT_SEED: u64 = 1;
pub const DEFAULT_EPOCH: &str = "2016-01-01T00:00:00Z";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    #[value(name = "text")]
    Text,
    #[value(name = "json")]
    Json,
}

impl Display for LogFormatArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormatArg::Text => write!(f, "text"),
            LogFormatArg::Json => write!(f, "json"),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "shortid", about = "Generate and inspect short ids")]
pub struct CLI {
    /// Worker number in [0, 31], distinct per process sharing an id space.
    #[arg(long, env = WORKER_ENV, default_value_t = DEFAULT_WORKER)]
    pub worker: u8,

    /// Seed used to shuffle the alphabet, identical across processes.
    #[arg(long, env = SEED_ENV, default_value_t = DEFAULT_SEED)]
    pub seed: u64,

    /// 64 unique symbols.
    #[arg(long, env = ALPHABET_ENV, default_value = DEFAULT_ABC)]
    pub alphabet: String,

    #[arg(long, env = EPOCH_ENV, default_value = DEFAULT_EPOCH)]
    pub epoch: Timestamp,

    #[arg(
        long,
        env = LOG_FORMAT_ENV,
        value_enum,
        default_value_t = LogFormatArg::Text
    )]
    pub log_format: LogFormatArg,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print new ids, one per line.
    Generate {
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
    },
    /// Print the shuffled alphabet.
    Alphabet,
    /// Print the worker, counter and issue time encoded in ids.
    Decode {
        #[arg(required = true)]
        ids: Vec<String>,
    },
}
