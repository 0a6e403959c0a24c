pub mod error;
pub mod math;
pub mod activation;
pub mod layers;
pub mod network;
pub mod loss;
pub mod optim;
pub mod data;
pub mod train;
pub mod gradcheck;

// Convenience re-exports
pub use error::{Error, Result};
pub use math::matrix::Matrix;
pub use activation::activation::ActivationFunction;
pub use layers::{Layer, LayerCache, LayerGradients};
pub use network::{Network, NetworkSpec};
pub use loss::cross_entropy::CrossEntropyLoss;
pub use optim::sgd::Sgd;
pub use data::{Batch, Dataset};
pub use train::{train_loop, BatchSampler, Evaluation, TrainConfig, TrainReport};
pub use gradcheck::{check_gradients, GradientCheckConfig, GradientCheckReport};
