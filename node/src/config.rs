use std::{fs, num::NonZeroUsize, path::PathBuf, time::Duration};

use anyhow::{Context, Result, anyhow};
use coordinator::RunConfig;
use serde::Deserialize;

const DEFAULT_JOIN_TIMEOUT_SECS: u64 = 60;

/// The configuration file of a node.
#[derive(Debug, Deserialize)]
pub struct NodeConfig {
    pub endpoint: String,
    pub world_size: usize,
    pub rank: usize,
    #[serde(default = "default_join_timeout")]
    pub join_timeout_secs: u64,
    pub max_epochs: usize,
    pub checkpoint_path: PathBuf,
    pub secret: String,
    pub train_data_file: PathBuf,
    /// Where to write the log, stderr if missing.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    /// The length of every buffer of the stand-in model.
    pub parameter_sizes: Vec<usize>,
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_join_timeout() -> u64 {
    DEFAULT_JOIN_TIMEOUT_SECS
}

impl NodeConfig {
    /// Reads and parses the configuration file at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("cannot read '{path}'"))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("invalid config JSON")
    }

    /// The part of the configuration the coordination core needs.
    pub fn run_config(&self) -> Result<RunConfig> {
        let max_epochs = NonZeroUsize::new(self.max_epochs)
            .ok_or_else(|| anyhow!("max_epochs must be at least 1"))?;

        let config = RunConfig {
            endpoint: self.endpoint.clone(),
            world_size: self.world_size,
            rank: self.rank,
            join_timeout: Duration::from_secs(self.join_timeout_secs),
            max_epochs,
            checkpoint_path: self.checkpoint_path.clone(),
            secret: self.secret.clone(),
        };

        config.validate()?;
        Ok(config)
    }
}
