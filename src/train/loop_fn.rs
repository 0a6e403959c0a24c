use std::path::Path;

use rand::Rng;
use tracing::{debug, info};

use crate::data::dataset::Dataset;
use crate::error::Result;
use crate::network::network::Network;
use crate::optim::sgd::Sgd;
use crate::train::evaluation::{Evaluation, TrainReport};
use crate::train::sampler::BatchSampler;
use crate::train::train_config::TrainConfig;
use crate::train::trainer::{evaluate, train_step};

// ---------------------------------------------------------------------------
// Public entry point
// ---------------------------------------------------------------------------

/// Trains `network` for `config.steps` mini-batch steps.
///
/// # Arguments
/// - `network` — modified in place
/// - `train`   — sampled in shuffled, equally sized batches
/// - `test`    — one fixed batch of `config.test_batch_size` samples is drawn
///               from it up front and scored every `config.test_frequency` steps
/// - `config`  — hyperparameters, checkpoint location, optional progress channel
/// - `rng`     — drives every shuffle, so a seeded RNG gives a reproducible run
///
/// # Checkpoints
/// When `config.checkpoint_dir` is set the network is written as
/// `checkpoint_initialization.json` before the first step,
/// `checkpoint_{k}.json` after every `checkpoint_frequency` steps and
/// `checkpoint_final.json` after the last one.
pub fn train_loop<R: Rng>(
    network: &mut Network,
    train: &Dataset,
    test: &Dataset,
    config: &TrainConfig,
    rng: &mut R,
) -> Result<TrainReport> {
    config.validate()?;

    let test_batch = BatchSampler::new(test, config.test_batch_size, &mut *rng)?.next_batch()?;
    let mut sampler = BatchSampler::new(train, config.batch_size, &mut *rng)?;
    let optimizer = Sgd::new(config.learning_rate);
    let mut report = TrainReport::default();

    if let Some(dir) = &config.checkpoint_dir {
        save_checkpoint(network, dir, "checkpoint_initialization.json")?;
    }

    info!(
        steps = config.steps,
        batch_size = config.batch_size,
        learning_rate = config.learning_rate,
        train_samples = train.len(),
        "starting training"
    );

    for step in 1..=config.steps {
        let batch = sampler.next_batch()?;
        report.final_train_loss = train_step(network, &batch, &optimizer)?;

        if step % config.test_frequency == 0 {
            let evaluation = evaluate(network, &test_batch, step, config.steps)?;
            log_evaluation(&evaluation, sampler.epoch());
            if let Some(tx) = &config.progress_tx {
                // Nobody listening any more is not a reason to stop training.
                let _ = tx.send(evaluation.clone());
            }
            report.evaluations.push(evaluation);
        }

        if step == config.steps {
            if let Some(dir) = &config.checkpoint_dir {
                save_checkpoint(network, dir, "checkpoint_final.json")?;
            }
            break;
        }

        if step % config.checkpoint_frequency == 0 {
            if let Some(dir) = &config.checkpoint_dir {
                let name = format!("checkpoint_{}.json", step / config.checkpoint_frequency);
                save_checkpoint(network, dir, &name)?;
            }
        }
    }

    Ok(report)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn log_evaluation(evaluation: &Evaluation, epoch: usize) {
    info!(
        step = evaluation.step,
        epoch,
        loss = evaluation.loss,
        avg_highest = evaluation.average_confidence,
        accuracy = evaluation.accuracy,
        "step {} of {} ({:.2}%)",
        evaluation.step,
        evaluation.total_steps,
        evaluation.progress_percent()
    );
}

fn save_checkpoint(network: &Network, dir: &Path, name: &str) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(name);
    network.save_json(&path)?;
    debug!(path = %path.display(), "checkpoint written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::activation::ActivationFunction;
    use crate::error::Error;
    use crate::math::matrix::Matrix;
    use rand::{rngs::StdRng, SeedableRng};
    use std::sync::mpsc;

    /// Class `c` lights up feature `c`; everything else is dim noise.
    fn toy_dataset(n: usize) -> Dataset {
        let columns: Vec<Vec<f64>> = (0..n)
            .map(|i| (0..4).map(|f| if f == i % 3 { 1.0 } else { 0.1 * ((i + f) % 2) as f64 }).collect())
            .collect();
        let labels = (0..n).map(|i| (i % 3) as f64).collect();
        Dataset::new(Matrix::from_columns(&columns).unwrap(), labels).unwrap()
    }

    fn toy_network(rng: &mut StdRng) -> Network {
        Network::with_rng(
            vec![(6, 4, ActivationFunction::ReLU), (3, 6, ActivationFunction::Softmax)],
            rng,
        )
        .unwrap()
    }

    #[test]
    fn evaluations_and_checkpoints_follow_the_schedule() {
        let dir = tempfile::tempdir().unwrap();
        let mut rng = StdRng::seed_from_u64(2);
        let mut network = toy_network(&mut rng);
        let data = toy_dataset(30);
        let (tx, rx) = mpsc::channel();

        let mut config = TrainConfig::new(5, 0.2, 25);
        config.test_frequency = 10;
        config.test_batch_size = 6;
        config.checkpoint_frequency = 10;
        config.checkpoint_dir = Some(dir.path().to_path_buf());
        config.progress_tx = Some(tx);

        let report = train_loop(&mut network, &data, &data, &config, &mut rng).unwrap();

        let steps: Vec<usize> = report.evaluations.iter().map(|e| e.step).collect();
        assert_eq!(steps, vec![10, 20]);
        assert_eq!(rx.try_iter().count(), 2);
        assert!(report.final_train_loss.is_finite());

        for name in [
            "checkpoint_initialization.json",
            "checkpoint_1.json",
            "checkpoint_2.json",
            "checkpoint_final.json",
        ] {
            assert!(dir.path().join(name).exists(), "missing {}", name);
        }
        assert!(!dir.path().join("checkpoint_3.json").exists());

        let final_model = Network::load_json(dir.path().join("checkpoint_final.json")).unwrap();
        assert_eq!(final_model, network);
    }

    #[test]
    fn dropped_progress_receiver_does_not_stop_training() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut network = toy_network(&mut rng);
        let data = toy_dataset(12);
        let (tx, rx) = mpsc::channel();
        drop(rx);

        let mut config = TrainConfig::new(4, 0.1, 6);
        config.test_frequency = 2;
        config.test_batch_size = 4;
        config.progress_tx = Some(tx);

        let report = train_loop(&mut network, &data, &data, &config, &mut rng).unwrap();
        assert_eq!(report.evaluations.len(), 3);
    }

    #[test]
    fn oversized_batches_fail_before_training() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut network = toy_network(&mut rng);
        let before = network.clone();
        let data = toy_dataset(6);

        let config = TrainConfig::new(8, 0.1, 10);
        let err = train_loop(&mut network, &data, &data, &config, &mut rng).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(network, before);
    }
}
