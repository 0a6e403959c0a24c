pub mod cache;
pub mod dense;

pub use cache::{LayerCache, LayerGradients};
pub use dense::Layer;
