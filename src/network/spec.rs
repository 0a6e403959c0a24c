use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::activation::activation::ActivationFunction;
use crate::data::{IMAGE_PIXELS, NUM_CLASSES};
use crate::error::{Error, Result};
use crate::network::network::Network;

/// Describes one layer in a network architecture.
///
/// Fields:
/// - `size`       — number of neurons in this layer
/// - `input_size` — output size of the previous layer, or the raw input
///                  dimension for the first layer
/// - `activation` — activation applied after the affine transform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub size: usize,
    pub input_size: usize,
    pub activation: ActivationFunction,
}

/// Architecture of a network without its weights. Saved as JSON so a run
/// can be started from a file instead of the built-in default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub layers: Vec<LayerSpec>,
}

impl NetworkSpec {
    /// Hidden ReLU layers of the given widths followed by a softmax layer.
    pub fn classifier(input_size: usize, hidden: &[usize], classes: usize) -> NetworkSpec {
        let mut layers = Vec::with_capacity(hidden.len() + 1);
        let mut previous = input_size;
        for &size in hidden {
            layers.push(LayerSpec { size, input_size: previous, activation: ActivationFunction::ReLU });
            previous = size;
        }
        layers.push(LayerSpec { size: classes, input_size: previous, activation: ActivationFunction::Softmax });
        NetworkSpec { layers }
    }

    /// 784 → 20 (ReLU) → 20 (ReLU) → 10 (Softmax).
    pub fn digits() -> NetworkSpec {
        NetworkSpec::classifier(IMAGE_PIXELS, &[20, 20], NUM_CLASSES)
    }

    /// Creates a freshly initialized network with this architecture.
    pub fn build<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Network> {
        if self.layers.is_empty() {
            return Err(Error::Config("a network spec needs at least one layer".to_owned()));
        }
        Network::with_rng(
            self.layers.iter().map(|l| (l.size, l.input_size, l.activation)).collect(),
            rng,
        )
    }

    /// Serializes the spec to a pretty-printed JSON file.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Deserializes a `NetworkSpec` from a JSON file.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<NetworkSpec> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

impl Default for NetworkSpec {
    fn default() -> Self {
        NetworkSpec::digits()
    }
}
