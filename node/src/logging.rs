use std::{fs::OpenOptions, io::Write, path::Path};

use anyhow::{Context, Result};
use env_logger::{Builder, Env, Target};

/// Initializes the global logger.
///
/// With a `log_file` only the message of every record is appended to it, one per
/// line, so the status records can be parsed straight from the file.
pub fn init(log_file: Option<&Path>) -> Result<()> {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));

    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("cannot open log file '{}'", path.display()))?;

        builder
            .format(|buf, record| writeln!(buf, "{}", record.args()))
            .target(Target::Pipe(Box::new(file)));
    }

    builder.try_init().context("logger already initialized")
}
