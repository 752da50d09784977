use thiserror::Error;

pub type DecodeResult<T> = Result<T, DecodeError>;

#[derive(Debug, Error)]
pub enum DecodeError {
    /// The source has no further record. Not a failure.
    #[error("end of stream")]
    EndOfStream,

    #[error("truncated input at offset {offset}: needed {needed} bytes, {available} available")]
    TruncatedInput {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("malformed block at offset {offset}: {reason}")]
    MalformedBlock { offset: usize, reason: String },

    #[error("unsupported encoding at offset {offset}: {reason}")]
    UnsupportedEncoding { offset: usize, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DecodeError {
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, DecodeError::EndOfStream)
    }

    pub(crate) fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        DecodeError::MalformedBlock {
            offset,
            reason: reason.into(),
        }
    }
}
