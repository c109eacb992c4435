//! # Voice Session
//!
//! Realtime bidirectional voice conversation session core.
//!
//! Captures microphone audio, encodes it, and streams it to a remote
//! conversational endpoint while scheduling the synthesized speech
//! fragments coming back for gapless playback, including mid-utterance
//! interruption (barge-in).
//!
//! ## Architecture Overview
//!
//! ```text
//!                  ┌──────────────────────────────────────────┐
//!                  │         Session State Machine            │
//!                  │   Idle → Connecting → Active → Idle/Err  │
//!                  └───────┬──────────────────────┬───────────┘
//!                          │ owns                 │ owns
//!   ┌──────────┐   ┌───────▼────────┐     ┌───────▼──────────┐
//!   │Microphone├──►│Capture Pipeline│     │Playback Scheduler│
//!   └──────────┘   │  (PCM encode)  │     │  (gapless chain) │
//!                  └───────┬────────┘     └───────▲──────────┘
//!                          │ frames              │ fragments
//!                  ┌───────▼────────┐     ┌──────┴───────────┐
//!                  │Outbound Sender │     │   PCM decode     │
//!                  │ (wire encode)  │     │  (wire decode)   │
//!                  └───────┬────────┘     └──────▲───────────┘
//!                          │                     │
//!                  ┌───────▼─────────────────────┴───────────┐
//!                  │     Remote conversational endpoint      │
//!                  │  (duplex stream, collaborator boundary) │
//!                  └─────────────────────────────────────────┘
//! ```

pub mod audio;
pub mod codec;
pub mod config;
pub mod error;
pub mod remote;
pub mod session;

pub use error::{Error, Result};
pub use session::{SessionHandle, SessionStatus, SessionView};

/// Application-wide constants
pub mod constants {
    /// Sample rate for microphone capture
    pub const INPUT_SAMPLE_RATE: u32 = 16_000;

    /// Sample rate for synthesized speech playback
    pub const OUTPUT_SAMPLE_RATE: u32 = 24_000;

    /// Channel count (mono on both directions)
    pub const CHANNELS: u16 = 1;

    /// Fixed outbound frame length in samples (256 ms at 16 kHz)
    pub const FRAME_SAMPLES: usize = 4096;

    /// Capacity of the capture-to-sender frame queue
    pub const FRAME_QUEUE_CAPACITY: usize = 32;

    /// Default synthesized voice identifier
    pub const DEFAULT_VOICE: &str = "Kore";
}
