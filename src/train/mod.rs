pub mod evaluation;
pub mod loop_fn;
pub mod sampler;
pub mod train_config;
pub mod trainer;

pub use evaluation::{Evaluation, TrainReport};
pub use loop_fn::train_loop;
pub use sampler::BatchSampler;
pub use train_config::TrainConfig;
pub use trainer::{evaluate, top_prediction, train_step};
