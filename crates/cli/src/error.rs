//! CLI-local error type; wraps core errors plus usage/input failures.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] rtp_extract::error::CoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid input after {0} attempts")]
    InvalidInput(u32),

    #[error("stream index {0} is out of range")]
    StreamIndexOutOfRange(usize),

    #[error("no stream with SSRC {0:#010x}")]
    UnknownSsrc(u32),

    #[error("{0}")]
    Usage(String),
}

pub type Result<T> = std::result::Result<T, CliError>;
