//! Error types for Wiegand framing and decoding.

/// Result type alias for frame construction.
pub type Result<T> = std::result::Result<T, WiegandError>;

/// Errors raised by the frame construction helpers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WiegandError {
    /// Frame length is not one of the supported lengths.
    #[error("Unsupported frame length: {bits} bits")]
    UnsupportedLength { bits: usize },

    /// Code does not fit into the data bits of the frame.
    #[error("Code {code} does not fit into {data_bits} data bits")]
    CodeTooWide { code: u64, data_bits: usize },
}

impl WiegandError {
    /// Create a new unsupported length error.
    pub fn unsupported_length(bits: usize) -> Self {
        Self::UnsupportedLength { bits }
    }
}

/// Why a completed frame produced no credential.
///
/// Decode failures never propagate to the caller of the poll loop; they are
/// reported as [`DecodeEvent::Failed`](crate::DecodeEvent::Failed) and end up
/// in the event log.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Gap elapsed with a bit count outside {26, 34, 36}.
    #[error("unsupported frame length ({bits} bits)")]
    UnsupportedLength { bits: usize },

    /// More edges arrived than the accumulator holds.
    #[error("frame overflow ({bits} edges)")]
    Overflow { bits: usize },

    /// Leading even or trailing odd parity bit is wrong.
    #[error("parity error ({bits} bits)")]
    Parity { bits: usize },

    /// Edge queue was full while the frame was being captured.
    #[error("{dropped} edges dropped during capture")]
    EdgesDropped { dropped: u64 },
}

impl DecodeError {
    /// Number of bits seen in the failing frame, if known.
    pub fn bits(&self) -> Option<usize> {
        match self {
            Self::UnsupportedLength { bits } | Self::Overflow { bits } | Self::Parity { bits } => {
                Some(*bits)
            }
            Self::EdgesDropped { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_display() {
        assert_eq!(
            DecodeError::UnsupportedLength { bits: 32 }.to_string(),
            "unsupported frame length (32 bits)"
        );
        assert_eq!(
            DecodeError::Parity { bits: 26 }.to_string(),
            "parity error (26 bits)"
        );
    }

    #[test]
    fn test_decode_error_bits() {
        assert_eq!(DecodeError::Overflow { bits: 70 }.bits(), Some(70));
        assert_eq!(DecodeError::EdgesDropped { dropped: 3 }.bits(), None);
    }

    #[test]
    fn test_wiegand_error_display() {
        let error = WiegandError::unsupported_length(30);
        assert_eq!(error.to_string(), "Unsupported frame length: 30 bits");
    }
}
