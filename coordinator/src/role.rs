use std::path::PathBuf;

use log::{debug, info};

use crate::{
    Result, TrainingError,
    checkpoint::CheckpointWriter,
    model::LocalModel,
    protocol::TrainingOutcome,
    provenance::ProvenanceChain,
    step::RoleStep,
    telemetry::{EpochContext, EpochTelemetry},
};

/// The root of every collective, it owns the provenance chain and the checkpoint.
#[derive(Debug)]
pub struct Master {
    chain: ProvenanceChain,
    writer: CheckpointWriter,
}

impl Master {
    pub fn new(chain: ProvenanceChain, checkpoint_path: impl Into<PathBuf>) -> Self {
        Self {
            chain,
            writer: CheckpointWriter::new(checkpoint_path),
        }
    }

    pub fn chain(&self) -> &ProvenanceChain {
        &self.chain
    }
}

impl RoleStep for Master {
    fn reset_local<M: LocalModel + ?Sized>(
        &mut self,
        model: &mut M,
        ctx: &mut EpochContext,
    ) -> Result<()> {
        for i in 0..model.parameter_count() {
            model.parameter_mut(i).fill(0.0);
        }

        ctx.telemetry = EpochTelemetry::default();
        Ok(())
    }

    fn contribute_to_reduce(&self, buf: &mut [f32], workers: usize) {
        let n = workers as f32;
        buf.iter_mut().for_each(|x| *x /= n);
    }

    fn receive_broadcast<M: LocalModel + ?Sized>(
        &mut self,
        _model: &mut M,
        _ctx: &EpochContext,
    ) -> Result<()> {
        // The averages were computed in place, the model already holds them.
        Ok(())
    }

    fn commit_epoch(&mut self, ctx: &EpochContext) -> Result<()> {
        let link = self.chain.advance(ctx.epoch)?;
        debug!(epoch = ctx.epoch; "provenance advanced to {}", link.hash);
        Ok(())
    }

    async fn finalize<M: LocalModel + Sync + ?Sized>(
        &mut self,
        model: &M,
        ctx: &EpochContext,
    ) -> Result<TrainingOutcome> {
        let epochs = ctx.telemetry.epoch_count();
        let loss = ctx.telemetry.loss();
        let hash = self.chain.latest_hash().to_string();

        self.writer.save(epochs, model, loss, &hash).await?;
        info!(epochs = epochs; "checkpoint written to {}", self.writer.path().display());

        Ok(TrainingOutcome {
            epochs,
            loss,
            checkpoint: Some(self.writer.path().to_path_buf()),
            hash: Some(hash),
        })
    }
}

/// A member that trains on its own shard and adopts the group's averages.
#[derive(Debug, Default)]
pub struct Worker;

impl RoleStep for Worker {
    fn reset_local<M: LocalModel + ?Sized>(
        &mut self,
        model: &mut M,
        ctx: &mut EpochContext,
    ) -> Result<()> {
        let loss = model
            .train_epoch(ctx.epoch)
            .map_err(|e| TrainingError::Runtime(format!("training epoch {}: {e}", ctx.epoch)))?;

        debug!(epoch = ctx.epoch, loss = loss; "local epoch trained");
        ctx.telemetry = EpochTelemetry::local(ctx.epoch, loss);
        Ok(())
    }

    fn contribute_to_reduce(&self, _buf: &mut [f32], _workers: usize) {}

    fn receive_broadcast<M: LocalModel + ?Sized>(
        &mut self,
        model: &mut M,
        ctx: &EpochContext,
    ) -> Result<()> {
        model.apply_averaged().map_err(|e| {
            TrainingError::Runtime(format!("applying averages of epoch {}: {e}", ctx.epoch))
        })
    }

    fn commit_epoch(&mut self, _ctx: &EpochContext) -> Result<()> {
        Ok(())
    }

    async fn finalize<M: LocalModel + Sync + ?Sized>(
        &mut self,
        _model: &M,
        ctx: &EpochContext,
    ) -> Result<TrainingOutcome> {
        Ok(TrainingOutcome {
            epochs: ctx.telemetry.epoch_count(),
            loss: ctx.telemetry.loss(),
            checkpoint: None,
            hash: None,
        })
    }
}

/// The part a member plays in the run, picked once from its rank.
#[derive(Debug)]
pub enum Role {
    Master(Master),
    Worker(Worker),
}

impl RoleStep for Role {
    fn reset_local<M: LocalModel + ?Sized>(
        &mut self,
        model: &mut M,
        ctx: &mut EpochContext,
    ) -> Result<()> {
        match self {
            Self::Master(master) => master.reset_local(model, ctx),
            Self::Worker(worker) => worker.reset_local(model, ctx),
        }
    }

    fn contribute_to_reduce(&self, buf: &mut [f32], workers: usize) {
        match self {
            Self::Master(master) => master.contribute_to_reduce(buf, workers),
            Self::Worker(worker) => worker.contribute_to_reduce(buf, workers),
        }
    }

    fn receive_broadcast<M: LocalModel + ?Sized>(
        &mut self,
        model: &mut M,
        ctx: &EpochContext,
    ) -> Result<()> {
        match self {
            Self::Master(master) => master.receive_broadcast(model, ctx),
            Self::Worker(worker) => worker.receive_broadcast(model, ctx),
        }
    }

    fn commit_epoch(&mut self, ctx: &EpochContext) -> Result<()> {
        match self {
            Self::Master(master) => master.commit_epoch(ctx),
            Self::Worker(worker) => worker.commit_epoch(ctx),
        }
    }

    async fn finalize<M: LocalModel + Sync + ?Sized>(
        &mut self,
        model: &M,
        ctx: &EpochContext,
    ) -> Result<TrainingOutcome> {
        match self {
            Self::Master(master) => master.finalize(model, ctx).await,
            Self::Worker(worker) => worker.finalize(model, ctx).await,
        }
    }
}
