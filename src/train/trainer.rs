use crate::data::dataset::{labels_to_one_hot, Batch};
use crate::error::{Error, Result};
use crate::loss::cross_entropy::CrossEntropyLoss;
use crate::math::matrix::Matrix;
use crate::network::network::Network;
use crate::optim::sgd::Sgd;
use crate::train::evaluation::Evaluation;

/// One training step: forward, backward against one-hot labels, update.
///
/// Returns the batch loss measured before the update.
pub fn train_step(network: &mut Network, batch: &Batch, optimizer: &Sgd) -> Result<f64> {
    let expected = one_hot_for(network, batch)?;

    let caches = network.forward_training(&batch.images)?;
    let predictions = match caches.last() {
        Some(cache) => &cache.output,
        None => return Err(Error::Config("cannot train an empty network".to_owned())),
    };
    let loss = CrossEntropyLoss::loss(predictions, &expected)?;

    let gradients = network.backward(&caches, &expected)?;
    optimizer.step(network, &gradients)?;
    Ok(loss)
}

/// Scores `network` on a batch without touching its weights.
pub fn evaluate(network: &Network, batch: &Batch, step: usize, total_steps: usize) -> Result<Evaluation> {
    let expected = one_hot_for(network, batch)?;
    let caches = network.forward_training(&batch.images)?;
    let predictions = match caches.last() {
        Some(cache) => &cache.output,
        None => return Err(Error::Config("cannot evaluate an empty network".to_owned())),
    };
    let loss = CrossEntropyLoss::loss(predictions, &expected)?;

    let mut confidence_sum = 0.0;
    let mut correct = 0usize;
    for (j, &label) in batch.labels.iter().enumerate() {
        let (predicted, confidence) = top_prediction(&predictions.column(j));
        confidence_sum += confidence;
        if predicted as f64 == label {
            correct += 1;
        }
    }
    let n = batch.len() as f64;

    Ok(Evaluation {
        step,
        total_steps,
        loss,
        average_confidence: confidence_sum / n,
        accuracy: correct as f64 / n,
    })
}

/// Index and value of the largest entry; `(0, NaN)` for an empty slice.
pub fn top_prediction(probabilities: &[f64]) -> (usize, f64) {
    probabilities
        .iter()
        .copied()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .unwrap_or((0, f64::NAN))
}

fn one_hot_for(network: &Network, batch: &Batch) -> Result<Matrix> {
    let classes = network
        .output_size()
        .ok_or_else(|| Error::Config("network has no layers".to_owned()))?;
    labels_to_one_hot(&batch.labels, classes)
}
