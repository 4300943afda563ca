//! Error types for the audio transport
//!
//! Only conditions that are fatal to a session are errors. Transient
//! conditions (a failed datagram send, a full jitter buffer, an underrun)
//! are counted in session statistics and never unwind a loop.

use thiserror::Error;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    #[error("socket error: {0}")]
    Socket(#[from] SocketError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Audio device errors; fatal to the owning session
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("device not found: {0}")]
    NotFound(String),

    #[error("unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[error("stream failed: {0}")]
    Stream(String),
}

/// Socket errors; fatal to the owning session
#[derive(Error, Debug)]
pub enum SocketError {
    #[error("socket bind failed: {0}")]
    Bind(String),

    #[error("receive failed: {0}")]
    Receive(String),
}

/// Result type alias for the crate
pub type Result<T> = std::result::Result<T, Error>;
