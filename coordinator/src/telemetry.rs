/// The length of the auxiliary telemetry slot.
pub const AUX_LEN: usize = 64;

/// The scalars synchronized alongside the parameters every epoch.
///
/// Each field is its own buffer so it goes through the same reduce, scale and
/// broadcast round as a parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochTelemetry {
    pub epoch: [f32; 1],
    pub loss: [f32; 1],
    /// Carried for wire compatibility, nothing reads it.
    pub aux: [f32; AUX_LEN],
}

impl Default for EpochTelemetry {
    fn default() -> Self {
        Self {
            epoch: [0.0],
            loss: [0.0],
            aux: [0.0; AUX_LEN],
        }
    }
}

impl EpochTelemetry {
    /// A worker's contribution after training the zero based `epoch`.
    pub fn local(epoch: usize, loss: f32) -> Self {
        Self {
            epoch: [(epoch + 1) as f32],
            loss: [loss],
            ..Default::default()
        }
    }

    /// The synchronized epoch counter.
    pub fn epoch_count(&self) -> u64 {
        self.epoch[0].round().max(0.0) as u64
    }

    pub fn loss(&self) -> f32 {
        self.loss[0]
    }

    /// The buffers in the order they are synchronized.
    pub fn buffers_mut(&mut self) -> [&mut [f32]; 3] {
        [&mut self.epoch, &mut self.loss, &mut self.aux]
    }
}

/// The state of the epoch being synchronized, handed to every role step.
#[derive(Debug, Clone)]
pub struct EpochContext {
    /// The zero based epoch index.
    pub epoch: usize,
    /// The amount of workers, the divisor of every average.
    pub workers: usize,
    /// The amount of buffers averaged so far in this epoch.
    pub rounds: usize,
    pub telemetry: EpochTelemetry,
}

impl EpochContext {
    pub fn new(epoch: usize, workers: usize) -> Self {
        Self {
            epoch,
            workers,
            rounds: 0,
            telemetry: EpochTelemetry::default(),
        }
    }
}
