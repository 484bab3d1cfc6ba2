use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconciliationError {
    #[error("Invalid plan input: {0}")]
    InvalidPlanInput(String),

    #[error("Invalid execution document '{document}': {details}")]
    InvalidExecutionDocument { document: String, details: String },

    #[error("Invalid classification thresholds: {0}")]
    InvalidThreshold(String),

    #[error("Invalid projection factor: {0}")]
    InvalidProjectionFactor(String),

    #[error("Invalid month: {0}")]
    InvalidMonth(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ReconciliationError>;
