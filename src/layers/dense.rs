use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::activation::activation::{relu_derivative, ActivationFunction};
use crate::error::{Error, Result};
use crate::layers::cache::{LayerCache, LayerGradients};
use crate::math::matrix::Matrix;

/// Fully connected layer: `activation(W·x + b)`.
///
/// `weights` is `size x input_size`; `biases` has `size` entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub weights: Matrix,
    pub biases: Vec<f64>,
    pub activation: ActivationFunction,
}

impl Layer {
    /// He-initialized weights and zero biases, drawn from the thread RNG.
    pub fn new(size: usize, input_size: usize, activation: ActivationFunction) -> Result<Layer> {
        Layer::with_rng(size, input_size, activation, &mut rand::thread_rng())
    }

    pub fn with_rng<R: Rng + ?Sized>(
        size: usize,
        input_size: usize,
        activation: ActivationFunction,
        rng: &mut R,
    ) -> Result<Layer> {
        if size == 0 {
            return Err(Error::Config("a layer needs at least one neuron".to_owned()));
        }
        Ok(Layer {
            weights: Matrix::he(size, input_size, rng)?,
            biases: vec![0.0; size],
            activation,
        })
    }

    /// Builds a layer from existing parameters, checking that they agree.
    pub fn from_parts(weights: Matrix, biases: Vec<f64>, activation: ActivationFunction) -> Result<Layer> {
        let layer = Layer { weights, biases, activation };
        layer.validate()?;
        Ok(layer)
    }

    pub fn size(&self) -> usize {
        self.weights.rows
    }

    pub fn input_size(&self) -> usize {
        self.weights.cols
    }

    pub fn is_output_layer(&self) -> bool {
        self.activation == ActivationFunction::Softmax
    }

    pub fn validate(&self) -> Result<()> {
        self.weights.validate()?;
        if self.biases.len() != self.weights.rows {
            return Err(Error::Shape(format!(
                "layer has {} biases for {} weight rows",
                self.biases.len(),
                self.weights.rows
            )));
        }
        Ok(())
    }

    /// Single-sample forward pass.
    pub fn forward(&self, input: &[f64]) -> Result<Vec<f64>> {
        let z = self
            .weights
            .dot(&Matrix::column_vector(input))?
            .add_column_broadcast(&self.biases)?;
        Ok(self.activation.apply(&z.column(0)))
    }

    /// Batched forward pass; `input` holds one sample per column.
    pub fn forward_batch(&self, input: &Matrix) -> Result<Matrix> {
        let z = self.weights.dot(input)?.add_column_broadcast(&self.biases)?;
        self.activation.apply_batch(&z)
    }

    /// Full backward pass, including the gradient for the previous layer.
    ///
    /// For the softmax output layer `output_gradient` must already be the
    /// gradient with respect to the logits; it is used as-is.
    pub fn backward(&self, cache: &LayerCache, output_gradient: &Matrix) -> Result<LayerGradients> {
        let mut gradients = self.backward_params(cache, output_gradient)?;
        gradients.input_gradient = Some(self.weights.transpose().dot(&gradients.bias_gradients)?);
        Ok(gradients)
    }

    /// Backward pass without propagating to the input, for the first layer.
    pub fn backward_params(&self, cache: &LayerCache, output_gradient: &Matrix) -> Result<LayerGradients> {
        if output_gradient.shape() != cache.output.shape() {
            return Err(Error::Shape(format!(
                "output gradient is {}x{} but the layer produced {}x{}",
                output_gradient.rows, output_gradient.cols, cache.output.rows, cache.output.cols
            )));
        }

        let pre_activation = match self.activation {
            ActivationFunction::Softmax => output_gradient.clone(),
            ActivationFunction::ReLU => output_gradient.hadamard(&cache.output.map(relu_derivative))?,
        };
        let weight_gradient = pre_activation.dot(&cache.input.transpose())?;

        Ok(LayerGradients {
            input_gradient: None,
            weight_gradient,
            bias_gradients: pre_activation,
        })
    }

    /// SGD step. The batch size is the number of bias-gradient columns.
    pub fn update(&mut self, gradients: &LayerGradients, learning_rate: f64) -> Result<()> {
        let batch_size = gradients.batch_size();
        if batch_size == 0 {
            return Err(Error::Shape("cannot update from an empty batch".to_owned()));
        }
        if gradients.weight_gradient.shape() != self.weights.shape() {
            return Err(Error::Shape(format!(
                "weight gradient is {}x{} but weights are {}x{}",
                gradients.weight_gradient.rows,
                gradients.weight_gradient.cols,
                self.weights.rows,
                self.weights.cols
            )));
        }
        if gradients.bias_gradients.rows != self.biases.len() {
            return Err(Error::Shape(format!(
                "bias gradients have {} rows but the layer has {} biases",
                gradients.bias_gradients.rows,
                self.biases.len()
            )));
        }

        let step = learning_rate / batch_size as f64;
        self.weights = self.weights.sub(&gradients.weight_gradient.scale(step))?;
        for (b, g) in self.biases.iter_mut().zip(gradients.bias_gradients.row_sums()) {
            *b -= g * step;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::{rngs::StdRng, SeedableRng};

    fn fixed_layer(activation: ActivationFunction) -> Layer {
        Layer::from_parts(
            Matrix::from_rows(vec![vec![1.0, -1.0], vec![0.5, 2.0], vec![-1.0, 0.0]]).unwrap(),
            vec![0.0, -1.0, 0.5],
            activation,
        )
        .unwrap()
    }

    #[test]
    fn new_layer_has_zero_bias_and_matching_shapes() {
        let mut rng = StdRng::seed_from_u64(1);
        let layer = Layer::with_rng(4, 3, ActivationFunction::ReLU, &mut rng).unwrap();
        assert_eq!(layer.weights.shape(), (4, 3));
        assert_eq!(layer.biases, vec![0.0; 4]);
        assert!(Layer::with_rng(0, 3, ActivationFunction::ReLU, &mut rng).is_err());
    }

    #[test]
    fn forward_applies_relu() {
        let layer = fixed_layer(ActivationFunction::ReLU);
        // z = [1-1+0, 0.5+2-1, -1+0.5] = [0, 1.5, -0.5]
        assert_eq!(layer.forward(&[1.0, 1.0]).unwrap(), vec![0.0, 1.5, 0.0]);
        assert!(matches!(layer.forward(&[1.0]), Err(Error::Shape(_))));
    }

    #[test]
    fn output_layer_softmax_does_not_clamp_logits() {
        let layer = fixed_layer(ActivationFunction::Softmax);
        let out = layer.forward(&[-3.0, 0.0]).unwrap();
        // z = [-3, -2.5, 3.5]; a ReLU before softmax would make the first two equal.
        assert!(out[0] < out[1]);
        assert_abs_diff_eq!(out.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn batch_forward_matches_single_sample_forward() {
        let mut rng = StdRng::seed_from_u64(3);
        for activation in [ActivationFunction::ReLU, ActivationFunction::Softmax] {
            let mut layer = Layer::with_rng(4, 3, activation, &mut rng).unwrap();
            layer.biases = vec![0.1, -0.2, 0.3, 0.0];
            let batch = Matrix::random_normal(3, 5, 0.0, 1.0, &mut rng).unwrap();
            let out = layer.forward_batch(&batch).unwrap();
            for j in 0..batch.cols {
                let single = layer.forward(&batch.column(j)).unwrap();
                for (a, b) in single.iter().zip(out.column(j)) {
                    assert_abs_diff_eq!(*a, b, epsilon = 1e-12);
                }
            }
        }
    }

    #[test]
    fn zero_output_gradient_gives_zero_parameter_gradients() {
        let mut rng = StdRng::seed_from_u64(11);
        for activation in [ActivationFunction::ReLU, ActivationFunction::Softmax] {
            let layer = Layer::with_rng(6, 4, activation, &mut rng).unwrap();
            let input = Matrix::random_normal(4, 8, 0.0, 1.0, &mut rng).unwrap();
            let output = layer.forward_batch(&input).unwrap();
            let cache = LayerCache::new(input, output);
            let grads = layer.backward(&cache, &Matrix::zeros(6, 8)).unwrap();
            assert!(grads.weight_gradient.data.iter().flatten().all(|&g| g == 0.0));
            assert!(grads.bias_gradients.data.iter().flatten().all(|&g| g == 0.0));
            assert_eq!(grads.bias_gradients.cols, 8);
        }
    }

    #[test]
    fn relu_backward_masks_inactive_units() {
        let layer = fixed_layer(ActivationFunction::ReLU);
        let input = Matrix::column_vector(&[1.0, 1.0]);
        let output = layer.forward_batch(&input).unwrap();
        let cache = LayerCache::new(input, output);
        let grads = layer
            .backward(&cache, &Matrix::column_vector(&[1.0, 1.0, 1.0]))
            .unwrap();
        // Unit 0 sits exactly at 0 and unit 2 is negative: both are masked.
        assert_eq!(grads.bias_gradients.column(0), vec![0.0, 1.0, 0.0]);
        assert_eq!(grads.weight_gradient.data, vec![vec![0.0, 0.0], vec![1.0, 1.0], vec![0.0, 0.0]]);
        // Wᵀ · [0, 1, 0] is the second weight row.
        assert_eq!(grads.input_gradient.unwrap().column(0), vec![0.5, 2.0]);
    }

    #[test]
    fn backward_params_skips_input_gradient() {
        let layer = fixed_layer(ActivationFunction::Softmax);
        let input = Matrix::column_vector(&[1.0, 2.0]);
        let output = layer.forward_batch(&input).unwrap();
        let cache = LayerCache::new(input, output);
        let grads = layer.backward_params(&cache, &Matrix::column_vector(&[0.1, 0.2, -0.3])).unwrap();
        assert!(grads.input_gradient.is_none());
        assert!(layer.backward(&cache, &Matrix::zeros(2, 1)).is_err());
    }

    #[test]
    fn update_averages_over_the_batch() {
        let mut layer = fixed_layer(ActivationFunction::ReLU);
        let grads = LayerGradients {
            input_gradient: None,
            weight_gradient: Matrix::from_rows(vec![vec![4.0, 0.0], vec![0.0, 0.0], vec![0.0, -4.0]]).unwrap(),
            bias_gradients: Matrix::from_rows(vec![vec![1.0, 3.0], vec![0.0, 0.0], vec![-2.0, -2.0]]).unwrap(),
        };
        layer.update(&grads, 0.5).unwrap();
        // step = 0.5 / 2
        assert_eq!(layer.weights.data[0], vec![0.0, -1.0]);
        assert_eq!(layer.weights.data[2], vec![-1.0, 1.0]);
        assert_eq!(layer.biases, vec![-1.0, -1.0, 1.5]);
    }

    #[test]
    fn update_rejects_empty_or_mismatched_gradients() {
        let mut layer = fixed_layer(ActivationFunction::ReLU);
        let empty = LayerGradients {
            input_gradient: None,
            weight_gradient: Matrix::zeros(3, 2),
            bias_gradients: Matrix::zeros(3, 0),
        };
        assert!(layer.update(&empty, 0.1).is_err());

        let wrong = LayerGradients {
            input_gradient: None,
            weight_gradient: Matrix::zeros(2, 3),
            bias_gradients: Matrix::zeros(3, 1),
        };
        assert!(layer.update(&wrong, 0.1).is_err());
    }
}
