use std::{env, fs, fs::File, io::BufReader};

use anyhow::{Context, Result, bail};
use coordinator::{Session, status};
use log::info;

mod config;
mod logging;
mod model;

use config::NodeConfig;
use model::ToyModel;

const USAGE: &str = "usage: node run <config.json> | node status <log_file>";

fn main() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();

    match args.as_slice() {
        [cmd, path] if cmd == "run" => run(path),
        [cmd, path] if cmd == "status" => last_status(path),
        _ => bail!(USAGE),
    }
}

/// Takes part in a training run until it completes or fails.
fn run(config_path: &str) -> Result<()> {
    let cfg = NodeConfig::load(config_path)?;
    logging::init(cfg.log_file.as_deref())?;

    let text = fs::read_to_string(&cfg.train_data_file).with_context(|| {
        format!("cannot read training data '{}'", cfg.train_data_file.display())
    })?;
    let words: Vec<&str> = text.split_whitespace().collect();

    let model = ToyModel::new(&cfg.parameter_sizes, words.len(), cfg.seed);
    let mut session = Session::new(cfg.run_config()?, model, &words)?;

    info!(rank = cfg.rank, world_size = cfg.world_size; "starting training");
    let outcome = session.run()?;

    match outcome.checkpoint {
        Some(path) => info!(epochs = outcome.epochs; "checkpoint at {}", path.display()),
        None => info!(epochs = outcome.epochs; "run completed"),
    }

    Ok(())
}

/// Prints the last completion record found in a log file.
fn last_status(log_path: &str) -> Result<()> {
    let file = File::open(log_path).with_context(|| format!("cannot open '{log_path}'"))?;

    match status::last_completed(BufReader::new(file))? {
        Some(record) => {
            println!("{}", serde_json::to_string(&record)?);
            Ok(())
        }
        None => bail!("no completed run in '{log_path}'"),
    }
}
