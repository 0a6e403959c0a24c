use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Every failure the library can surface. Nothing is retried internally;
/// callers decide how to report.
#[derive(Error, Debug)]
pub enum Error {
    /// Bad arguments or hyperparameters (e.g. batch size larger than the dataset).
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Input that does not follow the expected file or model format.
    #[error("invalid format: {0}")]
    Format(String),

    /// Matrix or vector dimensions that cannot be combined.
    #[error("shape mismatch: {0}")]
    Shape(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}
