//! Error types for physical I/O.
//!
//! Pin reads and writes can fail on real boards (expander on a flaky bus,
//! GPIO character device gone). Callers in the tick loop log these errors and
//! keep running; the relay retries a failed deactivation on the next tick.

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur while reading inputs or driving outputs.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// Reading an input level failed.
    #[error("Read failed on {pin}: {message}")]
    ReadFailed { pin: String, message: String },

    /// Driving an output level failed.
    #[error("Write failed on {pin}: {message}")]
    WriteFailed { pin: String, message: String },

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HardwareError {
    /// Create a new read failure.
    pub fn read_failed(pin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ReadFailed {
            pin: pin.into(),
            message: message.into(),
        }
    }

    /// Create a new write failure.
    pub fn write_failed(pin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::WriteFailed {
            pin: pin.into(),
            message: message.into(),
        }
    }
}
