use thiserror::Error;

/// Storage-specific error types for the door controller.
///
/// These errors represent failures reading or writing the settings
/// document and invalid edits to the user and rule tables.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem access failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings document could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Entity not found
    #[error("Entity not found: {entity_type} with {field}={value}")]
    NotFound {
        entity_type: String,
        field: String,
        value: String,
    },

    /// Data validation failed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StorageError {
    /// Create a not-found error for a rule index.
    pub fn rule_not_found(index: usize) -> Self {
        Self::NotFound {
            entity_type: "rule".to_string(),
            field: "index".to_string(),
            value: index.to_string(),
        }
    }
}

impl From<doorman_core::Error> for StorageError {
    fn from(error: doorman_core::Error) -> Self {
        Self::Validation(error.to_string())
    }
}

/// Specialized result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
