use std::{num::NonZeroUsize, path::PathBuf, time::Duration};

use crate::{Result, TrainingError};

/// Everything a process needs to take part in a run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// The `host:port` the master listens on.
    pub endpoint: String,
    /// The amount of processes, master included.
    pub world_size: usize,
    /// This process' rank, 0 is the master.
    pub rank: usize,
    /// How long to wait for the group to form.
    pub join_timeout: Duration,
    /// The amount of epochs to run, there's no early stopping.
    pub max_epochs: NonZeroUsize,
    /// Where the master writes the final checkpoint.
    pub checkpoint_path: PathBuf,
    /// The secret mixed into every provenance hash.
    pub secret: String,
}

impl RunConfig {
    /// Checks the invariants every member must agree on.
    ///
    /// # Returns
    /// A `TrainingError::Config` describing the first broken invariant.
    pub fn validate(&self) -> Result<()> {
        if self.world_size < 2 {
            return Err(TrainingError::Config(format!(
                "world size must be at least 2 (a master and a worker), got {}",
                self.world_size
            )));
        }

        if self.rank >= self.world_size {
            return Err(TrainingError::Config(format!(
                "rank {} is out of range for world size {}",
                self.rank, self.world_size
            )));
        }

        if self.endpoint.is_empty() {
            return Err(TrainingError::Config("endpoint must not be empty".into()));
        }

        if self.checkpoint_path.as_os_str().is_empty() {
            return Err(TrainingError::Config(
                "checkpoint path must not be empty".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(world_size: usize, rank: usize) -> RunConfig {
        RunConfig {
            endpoint: "127.0.0.1:29500".into(),
            world_size,
            rank,
            join_timeout: Duration::from_secs(1),
            max_epochs: NonZeroUsize::new(1).unwrap(),
            checkpoint_path: "out/checkpoint.safetensors".into(),
            secret: "s".into(),
        }
    }

    #[test]
    fn accepts_a_master_and_a_worker() {
        assert!(config(2, 0).validate().is_ok());
        assert!(config(2, 1).validate().is_ok());
    }

    #[test]
    fn rejects_a_lonely_master() {
        assert!(matches!(config(1, 0).validate(), Err(TrainingError::Config(_))));
    }

    #[test]
    fn rejects_out_of_range_rank() {
        assert!(matches!(config(3, 3).validate(), Err(TrainingError::Config(_))));
    }

    #[test]
    fn rejects_empty_paths() {
        let mut cfg = config(2, 0);
        cfg.checkpoint_path = PathBuf::new();
        assert!(cfg.validate().is_err());
    }
}
