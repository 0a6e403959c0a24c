use crate::error::Result;
use crate::layers::cache::LayerGradients;
use crate::network::network::Network;

/// Plain mini-batch SGD with a constant learning rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sgd {
    pub learning_rate: f64,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Sgd {
        Sgd { learning_rate }
    }

    /// Applies one update to every layer from its batch gradients.
    pub fn step(&self, network: &mut Network, gradients: &[LayerGradients]) -> Result<()> {
        network.update(gradients, self.learning_rate)
    }
}
