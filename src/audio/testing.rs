//! Test doubles for the device boundary

use parking_lot::Mutex;
use std::sync::Arc;

use crate::audio::device::{
    CompletionCallback, InputDevice, OutputDevice, SampleCallback, SourceId,
};
use crate::error::DeviceError;

struct FakeSource {
    id: SourceId,
    start_at: f64,
    duration: f64,
    on_complete: Option<CompletionCallback>,
}

struct FakeOutputState {
    now: f64,
    next_id: SourceId,
    sources: Vec<FakeSource>,
    stopped: Vec<SourceId>,
}

/// Output device with a manually advanced clock. Sources complete when
/// the clock passes their end time.
pub struct FakeOutput {
    sample_rate: u32,
    state: Mutex<FakeOutputState>,
}

impl FakeOutput {
    pub fn new(sample_rate: u32) -> Arc<Self> {
        Arc::new(Self {
            sample_rate,
            state: Mutex::new(FakeOutputState {
                now: 0.0,
                next_id: 0,
                sources: Vec::new(),
                stopped: Vec::new(),
            }),
        })
    }

    /// Advance the device clock, firing completion callbacks for every
    /// source whose playback interval has fully elapsed.
    pub fn advance(&self, seconds: f64) {
        let mut finished: Vec<(SourceId, CompletionCallback)> = Vec::new();
        {
            let mut state = self.state.lock();
            state.now += seconds;
            let now = state.now;

            let mut i = 0;
            while i < state.sources.len() {
                if state.sources[i].start_at + state.sources[i].duration <= now {
                    let mut src = state.sources.remove(i);
                    if let Some(cb) = src.on_complete.take() {
                        finished.push((src.id, cb));
                    }
                } else {
                    i += 1;
                }
            }
        }
        // Callbacks run outside the state lock, as real devices do.
        for (id, cb) in finished {
            cb(id);
        }
    }

    /// (start, duration) of every still-scheduled source, in schedule
    /// order.
    pub fn scheduled(&self) -> Vec<(f64, f64)> {
        self.state
            .lock()
            .sources
            .iter()
            .map(|s| (s.start_at, s.duration))
            .collect()
    }

    pub fn stopped(&self) -> Vec<SourceId> {
        self.state.lock().stopped.clone()
    }
}

impl OutputDevice for FakeOutput {
    fn current_time(&self) -> f64 {
        self.state.lock().now
    }

    fn schedule(
        &self,
        samples: Vec<f32>,
        start_at: f64,
        on_complete: CompletionCallback,
    ) -> SourceId {
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.sources.push(FakeSource {
            id,
            start_at,
            duration: samples.len() as f64 / self.sample_rate as f64,
            on_complete: Some(on_complete),
        });
        id
    }

    fn stop(&self, source: SourceId) {
        let mut state = self.state.lock();
        state.sources.retain(|s| s.id != source);
        state.stopped.push(source);
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

type SharedCallback = Arc<Mutex<Option<SampleCallback>>>;

/// Input device driven by the test instead of real hardware.
pub struct FakeInput {
    sample_rate: u32,
    callback: SharedCallback,
}

/// Test-side handle for pushing samples into a [`FakeInput`].
#[derive(Clone)]
pub struct FakeInputDriver {
    callback: SharedCallback,
}

impl FakeInput {
    pub fn new(sample_rate: u32) -> (Self, FakeInputDriver) {
        let callback: SharedCallback = Arc::new(Mutex::new(None));
        (
            Self {
                sample_rate,
                callback: Arc::clone(&callback),
            },
            FakeInputDriver { callback },
        )
    }
}

impl InputDevice for FakeInput {
    fn start(&mut self, on_samples: SampleCallback) -> Result<(), DeviceError> {
        *self.callback.lock() = Some(on_samples);
        Ok(())
    }

    fn stop(&mut self) {
        *self.callback.lock() = None;
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl FakeInputDriver {
    /// Deliver one device callback's worth of raw samples.
    pub fn push(&self, samples: &[f32]) {
        if let Some(cb) = self.callback.lock().as_mut() {
            cb(samples);
        }
    }

    pub fn is_started(&self) -> bool {
        self.callback.lock().is_some()
    }
}
