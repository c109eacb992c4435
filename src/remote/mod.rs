//! Remote conversational endpoint boundary
//!
//! The endpoint itself is a collaborator, not owned here: an opaque
//! duplex stream that accepts wire-encoded audio frames and delivers
//! synthesized speech fragments, an interruption signal, and lifecycle
//! events back through a callback sink.

pub mod outbound;
#[cfg(test)]
pub mod testing;

use std::sync::Arc;

use crate::error::RemoteError;

pub use outbound::OutboundSender;

/// Events delivered by the remote stream.
///
/// Exactly one `Opened` fires per connection attempt, before any
/// `Fragment`; `Error` and `Closed` are terminal for that connection.
#[derive(Debug, Clone)]
pub enum RemoteEvent {
    Opened,
    Fragment {
        /// Wire-encoded PCM audio.
        audio: String,
        /// Optional format hint, e.g. `audio/pcm;rate=24000`.
        mime_type: Option<String>,
    },
    /// The user began speaking over the assistant (barge-in).
    Interrupted,
    Error(String),
    Closed,
}

/// Sink invoked by the transport for each inbound event.
pub type EventSink = Box<dyn Fn(RemoteEvent) + Send + Sync>;

/// Live duplex stream to the conversational endpoint.
pub trait RemoteStream: Send + Sync {
    /// Dispatch one wire-encoded PCM frame. Must not block the caller
    /// waiting on network I/O completion.
    fn send_media(&self, media: &str) -> Result<(), RemoteError>;

    /// Close the stream. Idempotent.
    fn close(&self);
}

/// Opens duplex streams to the conversational endpoint.
pub trait RemoteConnector: Send + Sync {
    fn connect(
        &self,
        config: &ConnectConfig,
        events: EventSink,
    ) -> Result<Arc<dyn RemoteStream>, RemoteError>;
}

/// Connection-time configuration for the remote endpoint.
#[derive(Debug, Clone)]
pub struct ConnectConfig {
    pub system_instruction: String,
    pub voice: String,
    pub response_modality: ResponseModality,
}

/// Requested response media type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseModality {
    Audio,
}

/// Parse the sample rate out of a fragment's mime hint.
///
/// Returns `None` when the hint carries no parseable rate; callers
/// fall back to the fixed output rate.
pub fn rate_from_mime(mime: &str) -> Option<u32> {
    mime.split(';')
        .find_map(|part| part.trim().strip_prefix("rate="))?
        .parse()
        .ok()
}
