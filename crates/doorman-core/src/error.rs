use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // Credential errors
    #[error("Invalid Wiegand mode: {value}")]
    InvalidWiegandMode { value: String },

    #[error("Unsupported frame length: {bits} bits")]
    UnsupportedFrameLength { bits: usize },

    // Validation errors
    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },
}

pub type Result<T> = std::result::Result<T, Error>;
