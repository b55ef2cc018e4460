use std::error::Error;

/// The result type of the model collaborator.
pub type ModelResult<T> = std::result::Result<T, Box<dyn Error + Send + Sync>>;

/// The local training process, as seen by the coordination core.
///
/// Parameters are an ordered sequence of flat buffers whose count, order and
/// lengths must be the same on every member of the group.
pub trait LocalModel: Send {
    fn parameter_count(&self) -> usize;

    fn parameter(&self, index: usize) -> &[f32];

    fn parameter_mut(&mut self, index: usize) -> &mut [f32];

    /// Runs one local pass over this member's data.
    ///
    /// # Arguments
    /// * `epoch` - The zero based epoch being trained.
    ///
    /// # Returns
    /// The loss of the pass.
    fn train_epoch(&mut self, epoch: usize) -> ModelResult<f32>;

    /// Makes the live model pick up the averaged buffers written in place.
    fn apply_averaged(&mut self) -> ModelResult<()> {
        Ok(())
    }
}
