use crate::{
    Result,
    model::LocalModel,
    protocol::TrainingOutcome,
    telemetry::EpochContext,
};

/// What a member does around each step of the epoch protocol.
///
/// The driver calls the same steps on every member, the role decides what they mean.
#[allow(unused)]
#[trait_variant::make(RoleStep: Send)]
pub trait LocalRoleStep {
    /// Prepares the local buffers for the epoch's averaging round.
    fn reset_local<M: LocalModel + ?Sized>(
        &mut self,
        model: &mut M,
        ctx: &mut EpochContext,
    ) -> Result<()>;

    /// Runs on every member right after a buffer was reduced into the master.
    ///
    /// # Arguments
    /// * `buf` - The buffer that was just reduced.
    /// * `workers` - The amount of workers that contributed to it.
    fn contribute_to_reduce(&self, buf: &mut [f32], workers: usize);

    /// Runs once every buffer of the epoch has been broadcast.
    fn receive_broadcast<M: LocalModel + ?Sized>(
        &mut self,
        model: &mut M,
        ctx: &EpochContext,
    ) -> Result<()>;

    /// Seals a successfully synchronized epoch.
    fn commit_epoch(&mut self, ctx: &EpochContext) -> Result<()>;

    /// Closes the run after the last epoch.
    async fn finalize<M: LocalModel + Sync + ?Sized>(
        &mut self,
        model: &M,
        ctx: &EpochContext,
    ) -> Result<TrainingOutcome>;
}
