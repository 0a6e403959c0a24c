//! Finite-difference check of the analytic backward pass.
//!
//! Each trial builds a fresh single softmax layer, takes the analytic
//! gradient of one weight from `Network::backward`, then nudges that weight
//! by `step` and measures the change in cross-entropy. A correct backward
//! pass keeps the two within roughly `step`.

use rand::Rng;
use serde::{Serialize, Deserialize};
use tracing::{debug, info};

use crate::activation::activation::ActivationFunction;
use crate::data::dataset::labels_to_one_hot;
use crate::error::{Error, Result};
use crate::math::matrix::Matrix;
use crate::network::network::Network;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientCheckConfig {
    /// Number of independent trials to average over.
    pub trials: usize,
    /// Input width and number of classes of the test layer.
    pub size: usize,
    /// Finite-difference step.
    pub step: f64,
    /// `(row, col)` of the weight being checked.
    pub coordinate: (usize, usize),
}

impl GradientCheckConfig {
    pub fn new(trials: usize) -> Self {
        GradientCheckConfig {
            trials,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.trials == 0 {
            return Err(Error::Config("gradient check needs at least one trial".to_owned()));
        }
        if self.size == 0 {
            return Err(Error::Config("gradient check layer size must be at least 1".to_owned()));
        }
        if !(self.step.is_finite() && self.step > 0.0) {
            return Err(Error::Config(format!("step must be positive, got {}", self.step)));
        }
        let (row, col) = self.coordinate;
        if row >= self.size || col >= self.size {
            return Err(Error::Config(format!(
                "weight ({}, {}) is outside a {}x{} layer",
                row, col, self.size, self.size
            )));
        }
        Ok(())
    }
}

impl Default for GradientCheckConfig {
    fn default() -> Self {
        GradientCheckConfig {
            trials: 20,
            size: 5,
            step: 1e-5,
            coordinate: (0, 0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    pub analytic: f64,
    pub numerical: f64,
}

impl TrialResult {
    pub fn deviation(&self) -> f64 {
        (self.analytic - self.numerical).abs()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientCheckReport {
    pub trials: Vec<TrialResult>,
    pub average_deviation: f64,
}

/// Runs `config.trials` independent finite-difference checks.
pub fn check_gradients<R: Rng + ?Sized>(config: &GradientCheckConfig, rng: &mut R) -> Result<GradientCheckReport> {
    config.validate()?;

    let mut trials = Vec::with_capacity(config.trials);
    for trial in 0..config.trials {
        let result = run_trial(config, rng)?;
        debug!(
            trial,
            analytic = result.analytic,
            numerical = result.numerical,
            "gradient check trial"
        );
        trials.push(result);
    }

    let average_deviation = trials.iter().map(TrialResult::deviation).sum::<f64>() / trials.len() as f64;
    info!(trials = trials.len(), average_deviation, "gradient check finished");

    Ok(GradientCheckReport {
        trials,
        average_deviation,
    })
}

fn run_trial<R: Rng + ?Sized>(config: &GradientCheckConfig, rng: &mut R) -> Result<TrialResult> {
    let (row, col) = config.coordinate;
    let network = Network::with_rng(vec![(config.size, config.size, ActivationFunction::Softmax)], rng)?;

    let input = Matrix::random_normal(config.size, 1, 0.0, 1.0, rng)?;
    let target_class = rng.gen_range(0..config.size) as f64;
    let target = labels_to_one_hot(&[target_class], config.size)?;

    let caches = network.forward_training(&input)?;
    let gradients = network.backward(&caches, &target)?;
    let baseline = batch_loss(&network, &input, &target)?;

    let mut perturbed = network.clone();
    perturbed.layers_mut()[0].weights.data[row][col] += config.step;
    let perturbed_loss = batch_loss(&perturbed, &input, &target)?;

    Ok(TrialResult {
        analytic: gradients[0].weight_gradient.data[row][col],
        numerical: (perturbed_loss - baseline) / config.step,
    })
}

fn batch_loss(network: &Network, input: &Matrix, target: &Matrix) -> Result<f64> {
    let caches = network.forward_training(input)?;
    match caches.last() {
        Some(cache) => Network::cross_entropy_loss(&cache.output, target),
        None => Err(Error::Config("network has no layers".to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn analytic_gradient_matches_finite_differences() {
        let report = check_gradients(&GradientCheckConfig::default(), &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(report.trials.len(), 20);
        assert!(report.average_deviation < 1e-2, "average deviation {}", report.average_deviation);
    }

    #[test]
    fn other_coordinates_check_out_too() {
        let config = GradientCheckConfig {
            trials: 25,
            size: 7,
            coordinate: (4, 2),
            ..Default::default()
        };
        let report = check_gradients(&config, &mut StdRng::seed_from_u64(9)).unwrap();
        assert!(report.trials.iter().all(|t| t.deviation() < 1e-2));
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(check_gradients(&GradientCheckConfig::new(0), &mut rng).is_err());
        let outside = GradientCheckConfig { coordinate: (5, 0), ..Default::default() };
        assert!(matches!(check_gradients(&outside, &mut rng), Err(Error::Config(_))));
        let bad_step = GradientCheckConfig { step: 0.0, ..Default::default() };
        assert!(check_gradients(&bad_step, &mut rng).is_err());
    }
}
