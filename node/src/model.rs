use coordinator::{LocalModel, ModelResult};
use rand::{Rng, SeedableRng, rngs::StdRng};

const LEARNING_RATE: f32 = 0.1;

/// A stand-in for a real network: buffers pulled towards a target every epoch.
///
/// The target depends on the local training text, so members with different
/// shards drift apart between averaging rounds.
pub struct ToyModel {
    buffers: Vec<Vec<f32>>,
    weights: Vec<Vec<f32>>,
    target: f32,
    rng: StdRng,
}

impl ToyModel {
    /// Creates a new `ToyModel`.
    ///
    /// # Arguments
    /// * `sizes` - The length of every buffer.
    /// * `words` - The amount of words of the local training text.
    /// * `seed` - The seed for the initial weights, random if missing.
    pub fn new(sizes: &[usize], words: usize, seed: Option<u64>) -> Self {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let weights: Vec<Vec<f32>> = sizes
            .iter()
            .map(|&n| (0..n).map(|_| rng.random_range(-1.0..1.0)).collect())
            .collect();

        Self {
            buffers: weights.clone(),
            weights,
            target: (1.0 + words as f32).ln(),
            rng,
        }
    }

    /// The weights the model trains with.
    pub fn weights(&self) -> &[Vec<f32>] {
        &self.weights
    }
}

impl LocalModel for ToyModel {
    fn parameter_count(&self) -> usize {
        self.buffers.len()
    }

    fn parameter(&self, index: usize) -> &[f32] {
        &self.buffers[index]
    }

    fn parameter_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.buffers[index]
    }

    fn train_epoch(&mut self, _epoch: usize) -> ModelResult<f32> {
        let mut loss = 0.0;
        let mut count = 0;

        for (weights, buffer) in self.weights.iter_mut().zip(&mut self.buffers) {
            for (w, b) in weights.iter_mut().zip(buffer.iter_mut()) {
                let noise: f32 = self.rng.random_range(-0.01..0.01);
                let err = *w - self.target;
                loss += 0.5 * err * err;
                count += 1;

                *w -= LEARNING_RATE * err + noise;
                *b = *w;
            }
        }

        Ok(if count == 0 { 0.0 } else { loss / count as f32 })
    }

    fn apply_averaged(&mut self) -> ModelResult<()> {
        for (weights, buffer) in self.weights.iter_mut().zip(&self.buffers) {
            weights.copy_from_slice(buffer);
        }

        Ok(())
    }
}
