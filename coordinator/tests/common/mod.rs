#![allow(dead_code)]

use std::path::PathBuf;

use coordinator::{LocalModel, ModelResult};

/// A model whose local epoch always lands on the same buffers.
///
/// Rank `r` trains to `[r, 2r]` and `[10r]` with loss `r`, so the averages of a
/// group are easy to work out by hand.
pub struct Shard {
    rank: usize,
    pub params: Vec<Vec<f32>>,
    pub trained: usize,
    pub applied: usize,
}

impl Shard {
    pub fn new(rank: usize) -> Self {
        Self {
            rank,
            params: vec![vec![0.0; 2], vec![0.0; 1]],
            trained: 0,
            applied: 0,
        }
    }
}

impl LocalModel for Shard {
    fn parameter_count(&self) -> usize {
        self.params.len()
    }

    fn parameter(&self, index: usize) -> &[f32] {
        &self.params[index]
    }

    fn parameter_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.params[index]
    }

    fn train_epoch(&mut self, _epoch: usize) -> ModelResult<f32> {
        let r = self.rank as f32;
        self.params = vec![vec![r, 2.0 * r], vec![10.0 * r]];
        self.trained += 1;
        Ok(r)
    }

    fn apply_averaged(&mut self) -> ModelResult<()> {
        self.applied += 1;
        Ok(())
    }
}

/// A fresh path under the system temp dir, removed if it already exists.
pub fn temp_path(name: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "coordinator-{}-{name}.safetensors",
        std::process::id()
    ));
    let _ = std::fs::remove_file(&path);
    path
}
