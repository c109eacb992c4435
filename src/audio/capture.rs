//! Microphone capture pipeline
//!
//! Slices the input device's callback stream into fixed-length frames,
//! encodes each one, and hands it off through a bounded non-blocking
//! queue. The device callback is a hard realtime context; a blocked
//! callback causes audible dropouts, so full or disconnected queues
//! drop the frame instead of waiting. Stale audio has no value.

use bytes::Bytes;
use crossbeam_channel::{Sender, TrySendError};

use crate::audio::device::InputDevice;
use crate::codec;
use crate::constants::FRAME_SAMPLES;
use crate::error::DeviceError;

/// Converts the continuous microphone stream into discrete encoded
/// frames delivered to the outbound sender.
pub struct CapturePipeline {
    device: Option<Box<dyn InputDevice>>,
}

impl CapturePipeline {
    pub fn new() -> Self {
        Self { device: None }
    }

    /// Take ownership of the input device and begin producing frames.
    /// Idempotent; a second call while active is a no-op.
    pub fn activate(
        &mut self,
        mut device: Box<dyn InputDevice>,
        frames: Sender<Bytes>,
    ) -> Result<(), DeviceError> {
        if self.device.is_some() {
            return Ok(());
        }

        let mut pending: Vec<f32> = Vec::with_capacity(FRAME_SAMPLES * 2);
        device.start(Box::new(move |samples| {
            pending.extend_from_slice(samples);

            while pending.len() >= FRAME_SAMPLES {
                let frame: Vec<f32> = pending.drain(..FRAME_SAMPLES).collect();
                match frames.try_send(codec::encode(&frame)) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        tracing::debug!("frame queue full, dropping frame");
                    }
                    Err(TrySendError::Disconnected(_)) => {
                        tracing::debug!("sender unavailable, dropping frame");
                    }
                }
            }
        }))?;

        self.device = Some(device);
        Ok(())
    }

    /// Stop the device and release it. Idempotent; safe to call when
    /// never activated.
    pub fn deactivate(&mut self) {
        if let Some(mut device) = self.device.take() {
            device.stop();
        }
    }

    pub fn is_active(&self) -> bool {
        self.device.is_some()
    }
}

impl Default for CapturePipeline {
    fn default() -> Self {
        Self::new()
    }
}
