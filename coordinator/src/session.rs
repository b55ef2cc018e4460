use log::info;
use tokio::runtime::Runtime;

use crate::{
    Result, TrainingError,
    config::RunConfig,
    model::LocalModel,
    protocol::{EpochDriver, TrainingOutcome},
    provenance::{self, ProvenanceChain},
    role::{Master, Role, Worker},
    status::StatusRecord,
};

/// A member of a training run, driven from synchronous code.
///
/// It owns the runtime the collectives run on, so the caller only ever sees the
/// blocking `run`.
pub struct Session<M: LocalModel> {
    runtime: Runtime,
    config: RunConfig,
    model: M,
    corpus: String,
}

impl<M: LocalModel + Sync> Session<M> {
    /// Creates a new `Session`.
    ///
    /// # Arguments
    /// * `config` - The configuration of this member of the run.
    /// * `model` - The local model whose buffers get synchronized.
    /// * `corpus` - The training words, bound into the first provenance hash.
    ///
    /// # Returns
    /// A new `Session` or a `Config` error if the configuration can't work.
    pub fn new<S: AsRef<str>>(config: RunConfig, model: M, corpus: &[S]) -> Result<Self> {
        config.validate()?;

        let runtime = Runtime::new()
            .map_err(|e| TrainingError::Runtime(format!("failed to start the runtime: {e}")))?;

        Ok(Self {
            runtime,
            config,
            model,
            corpus: provenance::join_corpus(corpus),
        })
    }

    /// Joins the group and trains until the last epoch, blocking the caller.
    ///
    /// A failure of any kind is logged as a `FAILED` status record and no
    /// checkpoint is written.
    ///
    /// # Returns
    /// The outcome of the run or the error that stopped it.
    pub fn run(&mut self) -> Result<TrainingOutcome> {
        let result = self
            .runtime
            .block_on(Self::train(&self.config, &mut self.model, &self.corpus));

        match &result {
            Ok(outcome) => {
                info!(rank = self.config.rank, epochs = outcome.epochs; "training finished")
            }
            Err(e) => StatusRecord::Failed {
                error: e.to_string(),
            }
            .log(),
        }

        result
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn into_model(self) -> M {
        self.model
    }

    async fn train(config: &RunConfig, model: &mut M, corpus: &str) -> Result<TrainingOutcome> {
        let group = collective::join(
            &config.endpoint,
            config.world_size,
            config.rank,
            config.join_timeout,
        )
        .await
        .map_err(TrainingError::rendezvous)?;

        let role = if group.is_master() {
            let chain = ProvenanceChain::new(corpus.to_string(), config.secret.clone());
            Role::Master(Master::new(chain, &config.checkpoint_path))
        } else {
            Role::Worker(Worker)
        };

        EpochDriver::new(group, role, model, config.max_epochs)
            .run()
            .await
    }
}
