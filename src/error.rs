use thiserror::Error;

use crate::coordinator::CoordinatorError;
use crate::storage::EngineError;

pub type Result<T> = std::result::Result<T, StationError>;

#[derive(Error, Debug)]
pub enum StationError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Temperature validation error: {message}")]
    TemperatureValidation { message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration source error: {0}")]
    ConfigSource(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Failed to prepare statement registry: {0}")]
    RegistryPreparation(EngineError),

    #[error("Storage engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Coordinator error: {0}")]
    Coordinator(#[from] CoordinatorError),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Async task error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}
