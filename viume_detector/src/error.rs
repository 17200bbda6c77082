use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("Invalid model configuration: {0}")]
    InvalidConfig(String),
    #[error("Failed to load model: {0}")]
    ModelLoad(#[source] ort::Error),
    #[error("Session mutex poisoned")]
    SessionPoisoned,
    #[error("Inference failed: {0}")]
    Inference(#[from] ort::Error),
    #[error("Unexpected model output shape {0:?}")]
    UnexpectedShape(Vec<usize>),
}
