mod cli;

use crate::cli::{Command, LogFormatArg, CLI};
use clap::Parser;
use shortid::{Shortid, ShortidSettings};
use std::io::{self, Write};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CLI::try_parse()?;

    // ids go to stdout, logs to stderr
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr);
    match config.log_format {
        LogFormatArg::Text => subscriber.init(),
        LogFormatArg::Json => subscriber.json().init(),
    }

    info!(
        worker = config.worker,
        seed = config.seed,
        epoch = %config.epoch,
        log_format = %config.log_format,
        "starting shortid"
    );

    let settings = ShortidSettings::builder()
        .worker(config.worker)
        .alphabet(config.alphabet)
        .seed(config.seed)
        .epoch(config.epoch)
        .build();
    let sid = Shortid::from_settings(settings)?;

    let mut out = io::stdout().lock();
    match config.command {
        Command::Generate { count } => {
            for _ in 0..count {
                writeln!(out, "{}", sid.generate()?)?;
            }
        }
        Command::Alphabet => {
            writeln!(out, "{}", sid.abc().alphabet())?;
        }
        Command::Decode { ids } => {
            for id in ids {
                let parts = sid.decode(&id)?;
                let issued = parts
                    .timestamp(sid.epoch())
                    .map(|issued| issued.to_string())
                    .unwrap_or_else(|| "out of range".to_owned());
                writeln!(
                    out,
                    "{id}\tworker={}\tcounter={}\tissued={issued}",
                    parts.worker, parts.counter
                )?;
            }
        }
    }

    Ok(())
}
