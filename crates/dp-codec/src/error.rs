use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to encode value: {0}")]
    Encode(String),
    #[error("failed to decode value: {0}")]
    Decode(String),
    #[error("array header declared {declared} bytes but only {available} were present")]
    TruncatedArray { declared: u32, available: u32 },
}
