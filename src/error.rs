//! Error types for the voice session core

use thiserror::Error;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Audio error: {0}")]
    Audio(#[from] MalformedAudioError),
}

/// Audio device acquisition and streaming errors
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("No input device available")]
    NoInputDevice,

    #[error("No output device available")]
    NoOutputDevice,

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to open stream: {0}")]
    StreamError(String),
}

/// Remote conversational stream errors
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Connection failed: {0}")]
    ConnectFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Stream error: {0}")]
    Stream(String),
}

/// Malformed audio data received on either direction of the stream.
///
/// These are recovered locally by dropping the offending frame or
/// fragment; they never escalate to a session-level error.
#[derive(Error, Debug)]
pub enum MalformedAudioError {
    #[error("PCM byte length {0} is not a multiple of 2")]
    OddByteLength(usize),

    #[error("Invalid wire encoding: {0}")]
    InvalidWireEncoding(String),
}

/// Result type alias for the crate
pub type Result<T> = std::result::Result<T, Error>;
