//! Error types for the sleep-radar engine

use thiserror::Error;

/// Errors raised by configuration, I/O and codec paths.
///
/// The staging core itself (aggregate, estimate, classify, score) is
/// infallible: empty or degenerate input produces a default output.
#[derive(Debug, Error)]
pub enum SleepError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Sensor frame error: {0}")]
    Frame(#[from] FrameError),
}

/// Errors produced while parsing or building sensor frames
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("Incomplete frame: need {needed} bytes, have {available}")]
    Incomplete { needed: usize, available: usize },

    #[error("Invalid frame header: {0:02X} {1:02X}")]
    InvalidHeader(u8, u8),

    #[error("Invalid frame tail: {0:02X} {1:02X}")]
    InvalidTail(u8, u8),

    #[error("Checksum mismatch: expected {expected:02X}, got {actual:02X}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    #[error("Payload too large: {0} bytes")]
    PayloadTooLarge(usize),
}
