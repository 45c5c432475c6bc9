use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid attribution model: {0}")]
    InvalidModel(String),

    #[error("Experiment has no control variant")]
    MissingControl,

    #[error("Experiment has {0} control variants, expected exactly one")]
    MultipleControls(usize),

    #[error("Experiment needs at least two variants, got {0}")]
    InsufficientVariants(usize),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
