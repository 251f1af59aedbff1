//! Error types for controller commands.

use doorman_hardware::HardwareError;
use doorman_storage::StorageError;

/// Result type alias for controller operations.
pub type Result<T> = std::result::Result<T, ControllerError>;

/// Errors returned to the collaborator that issued a command.
///
/// Input-path failures (decode errors, unknown tags, rule configuration
/// errors) never surface here; they only reach the event log.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// Admin code missing or wrong.
    #[error("Unauthorized")]
    Unauthorized,

    /// Request payload rejected.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Addressed user or rule does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Relay already pulsing and nothing could be queued.
    #[error("Relay busy")]
    RelayBusy,

    /// Relay or pin failure while executing the command.
    #[error("Hardware error: {0}")]
    Hardware(#[from] HardwareError),

    /// Settings document could not be persisted.
    #[error("Storage error: {0}")]
    Storage(StorageError),

    /// Controller task is gone.
    #[error("Controller stopped")]
    Stopped,
}

impl ControllerError {
    /// Create a new validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl From<StorageError> for ControllerError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::NotFound {
                entity_type, value, ..
            } => Self::NotFound(format!("{entity_type} {value}")),
            StorageError::Validation(message) => Self::Validation(message),
            other => Self::Storage(other),
        }
    }
}

impl From<doorman_core::Error> for ControllerError {
    fn from(error: doorman_core::Error) -> Self {
        Self::Validation(error.to_string())
    }
}
