use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use rand::Rng;
use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::activation::activation::ActivationFunction;
use crate::error::{Error, Result};
use crate::layers::cache::{LayerCache, LayerGradients};
use crate::layers::dense::Layer;
use crate::loss::cross_entropy::CrossEntropyLoss;
use crate::math::matrix::Matrix;

/// An ordered stack of dense layers. Data flows from `layers[0]` to the last
/// layer, which is the softmax classifier when the network is trained.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Network {
    layers: Vec<Layer>,
}

impl Network {
    /// Builds a network from `(size, input_size, activation)` tuples.
    pub fn new(layer_specs: Vec<(usize, usize, ActivationFunction)>) -> Result<Network> {
        Network::with_rng(layer_specs, &mut rand::thread_rng())
    }

    pub fn with_rng<R: Rng + ?Sized>(
        layer_specs: Vec<(usize, usize, ActivationFunction)>,
        rng: &mut R,
    ) -> Result<Network> {
        let mut network = Network::default();
        for (size, input_size, activation) in layer_specs {
            network.push(Layer::with_rng(size, input_size, activation, rng)?)?;
        }
        Ok(network)
    }

    /// Appends a layer, rejecting it if it cannot consume the current output.
    pub fn push(&mut self, layer: Layer) -> Result<()> {
        layer.validate()?;
        if let Some(last) = self.layers.last() {
            if last.is_output_layer() {
                return Err(Error::Config(
                    "no layer can follow the softmax output layer".to_owned(),
                ));
            }
            if last.size() != layer.input_size() {
                return Err(Error::Shape(format!(
                    "layer {} expects {} inputs but the previous layer outputs {}",
                    self.layers.len(),
                    layer.input_size(),
                    last.size()
                )));
            }
        }
        self.layers.push(layer);
        Ok(())
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Mutable access for diagnostics that perturb individual weights.
    pub fn layers_mut(&mut self) -> &mut [Layer] {
        &mut self.layers
    }

    pub fn input_size(&self) -> Option<usize> {
        self.layers.first().map(Layer::input_size)
    }

    pub fn output_size(&self) -> Option<usize> {
        self.layers.last().map(Layer::size)
    }

    /// Re-checks every invariant `push` enforces. Used after deserializing.
    pub fn validate(&self) -> Result<()> {
        let mut checked = Network::default();
        for layer in &self.layers {
            checked.push(layer.clone())?;
        }
        Ok(())
    }

    /// Single-sample forward pass with no caching.
    pub fn forward_inference(&self, input: &[f64]) -> Result<Vec<f64>> {
        let mut current = input.to_vec();
        for layer in &self.layers {
            current = layer.forward(&current)?;
        }
        Ok(current)
    }

    /// Batched forward pass that records each layer's input and output for
    /// the backward pass. Layer `i`'s input is layer `i - 1`'s output.
    pub fn forward_training(&self, batch: &Matrix) -> Result<Vec<LayerCache>> {
        let mut caches: Vec<LayerCache> = Vec::with_capacity(self.layers.len());
        let mut layer_input = batch.clone();
        for layer in &self.layers {
            let layer_output = layer.forward_batch(&layer_input)?;
            caches.push(LayerCache::new(layer_input, layer_output.clone()));
            layer_input = layer_output;
        }
        Ok(caches)
    }

    /// Backpropagates softmax + cross-entropy through every layer.
    ///
    /// The last layer must be softmax. Returns one `LayerGradients` per layer,
    /// index-aligned with `layers()`; the first entry carries no input gradient.
    pub fn backward(&self, caches: &[LayerCache], expected: &Matrix) -> Result<Vec<LayerGradients>> {
        if caches.len() != self.layers.len() {
            return Err(Error::Shape(format!(
                "got {} layer caches for {} layers",
                caches.len(),
                self.layers.len()
            )));
        }
        let (last_layer, last_cache) = match (self.layers.last(), caches.last()) {
            (Some(layer), Some(cache)) => (layer, cache),
            _ => return Err(Error::Config("cannot backpropagate through an empty network".to_owned())),
        };
        if !last_layer.is_output_layer() {
            return Err(Error::Config(
                "backward assumes a softmax output layer trained with cross-entropy".to_owned(),
            ));
        }

        // Closed form of the softmax Jacobian composed with cross-entropy.
        let mut delta = CrossEntropyLoss::derivative(&last_cache.output, expected)?;

        let mut gradients = Vec::with_capacity(self.layers.len());
        for (i, (layer, cache)) in self.layers.iter().zip(caches).enumerate().rev() {
            let layer_gradients = if i == 0 {
                layer.backward_params(cache, &delta)?
            } else {
                layer.backward(cache, &delta)?
            };
            if let Some(input_gradient) = &layer_gradients.input_gradient {
                delta = input_gradient.clone();
            }
            gradients.push(layer_gradients);
        }
        gradients.reverse();
        Ok(gradients)
    }

    /// Applies one SGD step to every layer.
    pub fn update(&mut self, gradients: &[LayerGradients], learning_rate: f64) -> Result<()> {
        if gradients.len() != self.layers.len() {
            return Err(Error::Shape(format!(
                "got {} gradient sets for {} layers",
                gradients.len(),
                self.layers.len()
            )));
        }
        for (layer, layer_gradients) in self.layers.iter_mut().zip(gradients) {
            layer.update(layer_gradients, learning_rate)?;
        }
        Ok(())
    }

    /// Mean cross-entropy of a batch of predictions against one-hot labels.
    pub fn cross_entropy_loss(predictions: &Matrix, one_hot_labels: &Matrix) -> Result<f64> {
        CrossEntropyLoss::loss(predictions, one_hot_labels)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Network> {
        let network: Option<Network> = serde_json::from_str(json)?;
        let network = network.ok_or_else(|| Error::Format("model document is null".to_owned()))?;
        network.validate()?;
        Ok(network)
    }

    /// Serializes the network weights to a pretty-printed JSON file.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let writer = BufWriter::new(File::create(path.as_ref())?);
        serde_json::to_writer_pretty(writer, self)?;
        debug!(path = %path.as_ref().display(), "saved model");
        Ok(())
    }

    /// Deserializes a network from a JSON file previously written by `save_json`.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Network> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        let network: Option<Network> = serde_json::from_reader(reader)?;
        let network = network.ok_or_else(|| {
            Error::Format(format!("model file {} holds a null document", path.as_ref().display()))
        })?;
        network.validate()?;
        debug!(path = %path.as_ref().display(), layers = network.layers.len(), "loaded model");
        Ok(network)
    }
}
