use std::{num::NonZeroUsize, path::PathBuf};

use collective::{MASTER_RANK, ProcessGroup};
use log::{debug, info, warn};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::{
    Result,
    model::LocalModel,
    role::Role,
    step::RoleStep,
    telemetry::EpochContext,
};

/// How a run that went through every epoch ended.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingOutcome {
    /// The synchronized epoch counter after the last epoch.
    pub epochs: u64,
    /// The averaged loss of the last epoch.
    pub loss: f32,
    /// Where the checkpoint was written, only the master writes one.
    pub checkpoint: Option<PathBuf>,
    /// The last provenance hash, only the master keeps the chain.
    pub hash: Option<String>,
}

/// Runs the per epoch synchronization protocol on one member of the group.
///
/// Every member runs the same sequence of collectives, the role only decides
/// what happens to the local buffers in between.
pub struct EpochDriver<'m, R, W, M>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    M: LocalModel + ?Sized,
{
    group: ProcessGroup<R, W>,
    role: Role,
    model: &'m mut M,
    max_epochs: NonZeroUsize,
}

impl<'m, R, W, M> EpochDriver<'m, R, W, M>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    M: LocalModel + Sync + ?Sized,
{
    pub fn new(
        group: ProcessGroup<R, W>,
        role: Role,
        model: &'m mut M,
        max_epochs: NonZeroUsize,
    ) -> Self {
        Self {
            group,
            role,
            model,
            max_epochs,
        }
    }

    /// Runs every epoch, finalizes the role and leaves the group.
    ///
    /// # Returns
    /// The outcome of the run, or the first error. A failed collective aborts the
    /// whole run, there's no partial retry.
    pub async fn run(mut self) -> Result<TrainingOutcome> {
        let workers = self.group.workers();
        let mut ctx = EpochContext::new(0, workers);

        for epoch in 0..self.max_epochs.get() {
            ctx = EpochContext::new(epoch, workers);
            self.run_epoch(&mut ctx).await?;
        }

        let outcome = self.role.finalize(&*self.model, &ctx).await?;

        let rank = self.group.rank();
        if let Err(e) = self.group.disconnect().await {
            warn!(rank = rank; "leaving the group after the last epoch failed: {e}");
        }

        Ok(outcome)
    }

    async fn run_epoch(&mut self, ctx: &mut EpochContext) -> Result<()> {
        let rank = self.group.rank();

        self.role.reset_local(&mut *self.model, ctx)?;
        self.group.barrier().await?;

        let workers = ctx.workers;
        for i in 0..self.model.parameter_count() {
            let buf = self.model.parameter_mut(i);
            average(&mut self.group, &self.role, buf, workers).await?;
            ctx.rounds += 1;
        }

        for buf in ctx.telemetry.buffers_mut() {
            average(&mut self.group, &self.role, buf, workers).await?;
            ctx.rounds += 1;
        }

        self.role.receive_broadcast(&mut *self.model, ctx)?;
        self.role.commit_epoch(ctx)?;

        info!(
            rank = rank,
            epoch = ctx.epoch,
            rounds = ctx.rounds,
            loss = ctx.telemetry.loss();
            "epoch synchronized"
        );

        Ok(())
    }
}

/// One averaging round: barrier, reduce into the master, scale, barrier, broadcast.
async fn average<R, W>(
    group: &mut ProcessGroup<R, W>,
    role: &Role,
    buf: &mut [f32],
    workers: usize,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    group.barrier().await?;
    group.reduce_sum(buf, MASTER_RANK).await?;
    role.contribute_to_reduce(buf, workers);
    group.barrier().await?;
    group.broadcast(buf, MASTER_RANK).await?;

    debug!(rank = group.rank(), len = buf.len(); "buffer averaged");
    Ok(())
}
