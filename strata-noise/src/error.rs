use thiserror::Error;

/// Failures surfaced by the noise engine.
///
/// `InvalidConfiguration` is only ever produced at construction time; the
/// remaining variants abort a single call and leave the generator reusable.
#[derive(Error, Debug)]
pub enum NoiseError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("interpolation distance {0} outside [0, 1]")]
    DistanceOutOfRange(f64),
    #[error("layer processing failed: {0}")]
    LayerProcessFailure(String),
    #[error("layer processing timed out after {waited_ms} ms")]
    LayerProcessTimeout { waited_ms: u64 },
    #[error("generation cancelled")]
    Cancelled,
}

impl NoiseError {
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}
