use serde::{Serialize, Deserialize};

/// Test-batch statistics recorded by `train_loop` every `test_frequency` steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Number of completed training steps.
    pub step: usize,
    /// Total steps requested for this run.
    pub total_steps: usize,
    /// Mean cross-entropy over the test batch.
    pub loss: f64,
    /// Mean over the test batch of the highest predicted probability.
    pub average_confidence: f64,
    /// Fraction of the test batch whose top prediction matches the label.
    pub accuracy: f64,
}

impl Evaluation {
    /// Completed fraction of the run, in percent.
    pub fn progress_percent(&self) -> f64 {
        if self.total_steps == 0 {
            return 100.0;
        }
        self.step as f64 / self.total_steps as f64 * 100.0
    }
}

/// Outcome of a `train_loop` run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainReport {
    pub evaluations: Vec<Evaluation>,
    /// Loss of the last training batch, measured before its update.
    pub final_train_loss: f64,
}
