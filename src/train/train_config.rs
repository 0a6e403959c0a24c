use std::path::PathBuf;
use std::sync::mpsc;

use crate::error::{Error, Result};
use crate::train::evaluation::Evaluation;

/// Configuration for a `train_loop` run.
///
/// # Fields
/// - `batch_size`           — samples per training mini-batch
/// - `learning_rate`        — constant SGD step size
/// - `steps`                — number of mini-batch updates to run
/// - `test_frequency`       — evaluate on the test batch every this many steps
/// - `test_batch_size`      — size of the fixed test batch
/// - `checkpoint_frequency` — write `checkpoint_{k}.json` every this many steps
/// - `checkpoint_dir`       — where checkpoints go; `None` disables them
/// - `progress_tx`          — optional channel; one `Evaluation` is sent per
///                            test run. A dropped receiver is ignored.
#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub batch_size: usize,
    pub learning_rate: f64,
    pub steps: usize,
    pub test_frequency: usize,
    pub test_batch_size: usize,
    pub checkpoint_frequency: usize,
    pub checkpoint_dir: Option<PathBuf>,
    pub progress_tx: Option<mpsc::Sender<Evaluation>>,
}

impl TrainConfig {
    /// Creates a `TrainConfig` that tests every 100 steps on 100 samples and
    /// writes no checkpoints.
    pub fn new(batch_size: usize, learning_rate: f64, steps: usize) -> Self {
        TrainConfig {
            batch_size,
            learning_rate,
            steps,
            test_frequency: 100,
            test_batch_size: 100,
            checkpoint_frequency: 1000,
            checkpoint_dir: None,
            progress_tx: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let counts = [
            ("batch_size", self.batch_size),
            ("steps", self.steps),
            ("test_frequency", self.test_frequency),
            ("test_batch_size", self.test_batch_size),
            ("checkpoint_frequency", self.checkpoint_frequency),
        ];
        if let Some((name, _)) = counts.iter().find(|(_, value)| *value == 0) {
            return Err(Error::Config(format!("{} must be at least 1", name)));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(Error::Config(format!(
                "learning_rate must be a positive number, got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }
}
