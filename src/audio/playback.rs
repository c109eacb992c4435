//! Gapless playback scheduling for inbound speech fragments
//!
//! Fragments arrive from the remote stream in order and must play
//! back-to-back with no gap and no overlap. Each new start time is the
//! later of "now" and the previous fragment's computed end, so the
//! schedule never starts in the past and scheduled intervals never
//! overlap. Barge-in flushes everything instantly.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::watch;

use crate::audio::device::{OutputDevice, SourceId};
use crate::codec;
use crate::error::MalformedAudioError;

/// One decoded chunk of synthesized speech received from the remote
/// endpoint.
pub struct AudioFragment {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioFragment {
    /// Decode a fragment from its wire representation.
    pub fn from_wire(audio: &str, sample_rate: u32) -> Result<Self, MalformedAudioError> {
        let bytes = codec::wire_decode(audio)?;
        let samples = codec::decode(&bytes)?;
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Playback duration in seconds.
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Playback timeline state. Single-writer: mutated only inside
/// `enqueue`, `interrupt`, and source completion callbacks, serialized
/// by the mutex.
struct Timeline {
    next_start_time: f64,
    active: HashSet<SourceId>,
}

/// Schedules decoded fragments on the output device timeline.
pub struct PlaybackScheduler {
    device: Arc<dyn OutputDevice>,
    timeline: Arc<Mutex<Timeline>>,
    speaking_tx: Arc<watch::Sender<bool>>,
}

impl PlaybackScheduler {
    /// A fresh scheduler starts with a zeroed timeline; scheduling
    /// state never leaks across sessions.
    pub fn new(device: Arc<dyn OutputDevice>, speaking_tx: Arc<watch::Sender<bool>>) -> Self {
        Self {
            device,
            timeline: Arc::new(Mutex::new(Timeline {
                next_start_time: 0.0,
                active: HashSet::new(),
            })),
            speaking_tx,
        }
    }

    /// Schedule a fragment to play directly after the previous one.
    ///
    /// Fragments whose sample rate differs from the device's are
    /// dropped: the device plays buffers at its own rate, so a
    /// mismatched fragment would occupy the timeline for a different
    /// real duration than the one scheduled and the next fragment
    /// would overlap it or leave a gap.
    pub fn enqueue(&self, fragment: AudioFragment) {
        if fragment.samples.is_empty() {
            // Zero-duration fragments are accepted but neither
            // scheduled nor allowed to advance the timeline.
            return;
        }

        let device_rate = self.device.sample_rate();
        if fragment.sample_rate != device_rate {
            tracing::warn!(
                fragment_rate = fragment.sample_rate,
                device_rate,
                "dropping fragment with mismatched sample rate"
            );
            return;
        }

        let duration = fragment.duration();
        let mut timeline = self.timeline.lock();

        let start_at = timeline.next_start_time.max(self.device.current_time());

        let completion_timeline = Arc::clone(&self.timeline);
        let completion_speaking = Arc::clone(&self.speaking_tx);
        let on_complete = Box::new(move |id: SourceId| {
            let now_empty = {
                let mut timeline = completion_timeline.lock();
                timeline.active.remove(&id);
                timeline.active.is_empty()
            };
            if now_empty {
                completion_speaking.send_replace(false);
            }
        });

        // Holding the lock across schedule keeps completion callbacks
        // (which also take the lock) from observing an id that is not
        // yet in the active set.
        let id = self.device.schedule(fragment.samples, start_at, on_complete);
        timeline.next_start_time = start_at + duration;
        timeline.active.insert(id);
        drop(timeline);

        tracing::debug!(start_at, duration, "scheduled fragment");
        self.speaking_tx.send_if_modified(|speaking| {
            let changed = !*speaking;
            *speaking = true;
            changed
        });
    }

    /// Stop every active source and reset the timeline. Called on
    /// barge-in; a no-op when nothing is playing apart from the
    /// timeline reset.
    pub fn interrupt(&self) {
        let stopped: Vec<SourceId> = {
            let mut timeline = self.timeline.lock();
            timeline.next_start_time = 0.0;
            timeline.active.drain().collect()
        };

        for id in &stopped {
            self.device.stop(*id);
        }

        if !stopped.is_empty() {
            tracing::debug!(count = stopped.len(), "playback interrupted");
        }

        self.speaking_tx.send_if_modified(|speaking| {
            let changed = *speaking;
            *speaking = false;
            changed
        });
    }

    /// Identical effect to `interrupt`; called on session teardown.
    pub fn shutdown(&self) {
        self.interrupt();
    }

    pub fn subscribe_speaking(&self) -> watch::Receiver<bool> {
        self.speaking_tx.subscribe()
    }

    #[cfg(test)]
    fn active_count(&self) -> usize {
        self.timeline.lock().active.len()
    }
}
