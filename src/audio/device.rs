//! Audio device boundary
//!
//! The session owns devices exclusively. Capture and playback receive
//! handles on activation and give them back on deactivation; nothing
//! else touches the hardware. The traits here are the seam that lets
//! the scheduler and session run against test doubles.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::StreamConfig;
use crossbeam_channel::bounded;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::constants::CHANNELS;
use crate::error::DeviceError;

/// Callback receiving raw f32 samples from the input device.
pub type SampleCallback = Box<dyn FnMut(&[f32]) + Send>;

/// Identifier for a scheduled playback source.
pub type SourceId = u64;

/// Callback invoked when a scheduled source finishes playing.
pub type CompletionCallback = Box<dyn FnOnce(SourceId) + Send>;

/// Microphone-side device handle.
pub trait InputDevice: Send {
    /// Begin delivering raw samples to the callback. Idempotent.
    ///
    /// The callback runs on the device's realtime thread and must
    /// never block.
    fn start(&mut self, on_samples: SampleCallback) -> Result<(), DeviceError>;

    /// Stop delivering samples and release the stream. Idempotent.
    fn stop(&mut self);

    fn sample_rate(&self) -> u32;
}

/// Speaker-side device handle with a schedulable timeline.
///
/// `current_time` is a monotonic clock in seconds on the device's own
/// timeline. Implementations must not invoke a completion callback
/// from inside `schedule`, and `stop` cancels a source without
/// invoking its completion callback.
pub trait OutputDevice: Send + Sync {
    fn current_time(&self) -> f64;

    /// Schedule a mono sample buffer to begin playing at `start_at`
    /// seconds on the device timeline.
    fn schedule(
        &self,
        samples: Vec<f32>,
        start_at: f64,
        on_complete: CompletionCallback,
    ) -> SourceId;

    /// Cancel a scheduled or playing source. Unknown ids are ignored.
    fn stop(&self, source: SourceId);

    fn sample_rate(&self) -> u32;
}

/// Factory for opening concrete devices.
pub trait AudioBackend: Send + Sync {
    fn open_input(&self, sample_rate: u32) -> Result<Box<dyn InputDevice>, DeviceError>;
    fn open_output(&self, sample_rate: u32) -> Result<Arc<dyn OutputDevice>, DeviceError>;
}

/// How long to wait for a device thread to report stream readiness.
const STREAM_READY_TIMEOUT: Duration = Duration::from_secs(5);

fn mono_config(sample_rate: u32) -> StreamConfig {
    StreamConfig {
        channels: CHANNELS,
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    }
}

/// Default-host microphone input backed by cpal.
///
/// The stream lives on a dedicated thread because cpal streams are not
/// `Send`; the thread parks while the stream runs and drops it on stop.
pub struct CpalInput {
    sample_rate: u32,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl CpalInput {
    /// Check device availability and prepare an input handle.
    ///
    /// The stream itself is not built until `start`.
    pub fn open(sample_rate: u32) -> Result<Self, DeviceError> {
        cpal::default_host()
            .default_input_device()
            .ok_or(DeviceError::NoInputDevice)?;

        Ok(Self {
            sample_rate,
            running: Arc::new(AtomicBool::new(false)),
            thread: None,
        })
    }

    /// Roll back a failed `start` so a later retry is not swallowed by
    /// the idempotency guard.
    fn abort_start(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl InputDevice for CpalInput {
    fn start(&mut self, mut on_samples: SampleCallback) -> Result<(), DeviceError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let (ready_tx, ready_rx) = bounded::<Result<(), DeviceError>>(1);
        let running = Arc::clone(&self.running);
        let running_for_loop = Arc::clone(&self.running);
        let config = mono_config(self.sample_rate);

        let spawned = thread::Builder::new()
            .name("voice-capture".into())
            .spawn(move || {
                let device = match cpal::default_host().default_input_device() {
                    Some(device) => device,
                    None => {
                        let _ = ready_tx.send(Err(DeviceError::NoInputDevice));
                        return;
                    }
                };

                let stream = device.build_input_stream(
                    &config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        if running.load(Ordering::Relaxed) {
                            on_samples(data);
                        }
                    },
                    |err| tracing::error!("input stream error: {}", err),
                    None,
                );

                match stream {
                    Ok(stream) => {
                        if let Err(e) = stream.play() {
                            let _ = ready_tx.send(Err(DeviceError::StreamError(e.to_string())));
                            return;
                        }
                        let _ = ready_tx.send(Ok(()));

                        // Keep thread alive while running; dropping the
                        // stream on exit stops capture.
                        while running_for_loop.load(Ordering::Relaxed) {
                            thread::sleep(Duration::from_millis(10));
                        }
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(DeviceError::StreamError(e.to_string())));
                    }
                }
            });

        match spawned {
            Ok(handle) => self.thread = Some(handle),
            Err(e) => {
                self.abort_start();
                return Err(DeviceError::StreamError(e.to_string()));
            }
        }

        let outcome = ready_rx
            .recv_timeout(STREAM_READY_TIMEOUT)
            .unwrap_or_else(|_| {
                Err(DeviceError::StreamError(
                    "timed out waiting for input stream".into(),
                ))
            });

        if let Err(e) = outcome {
            self.abort_start();
            return Err(e);
        }

        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Drop for CpalInput {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One buffer scheduled on the output timeline.
struct ScheduledSource {
    id: SourceId,
    start_sample: u64,
    samples: Vec<f32>,
    on_complete: Option<CompletionCallback>,
}

/// State shared between the output handle and its render thread.
struct OutputState {
    /// Samples rendered since the stream opened; the device clock.
    clock: AtomicU64,
    next_id: AtomicU64,
    sources: Mutex<Vec<ScheduledSource>>,
}

/// Default-host speaker output backed by cpal.
///
/// Carries a sample-accurate mixer: the render callback sums every
/// scheduled source whose start time has arrived and fires completion
/// callbacks once a source is exhausted.
pub struct CpalOutput {
    sample_rate: u32,
    state: Arc<OutputState>,
    running: Arc<AtomicBool>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl CpalOutput {
    /// Open the default output device and start the render stream.
    pub fn open(sample_rate: u32) -> Result<Arc<Self>, DeviceError> {
        let state = Arc::new(OutputState {
            clock: AtomicU64::new(0),
            next_id: AtomicU64::new(0),
            sources: Mutex::new(Vec::new()),
        });

        let (ready_tx, ready_rx) = bounded::<Result<(), DeviceError>>(1);
        let running = Arc::new(AtomicBool::new(true));
        let running_for_loop = Arc::clone(&running);
        let render_state = Arc::clone(&state);
        let config = mono_config(sample_rate);

        let handle = thread::Builder::new()
            .name("voice-playback".into())
            .spawn(move || {
                let device = match cpal::default_host().default_output_device() {
                    Some(device) => device,
                    None => {
                        let _ = ready_tx.send(Err(DeviceError::NoOutputDevice));
                        return;
                    }
                };

                let stream = device.build_output_stream(
                    &config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        render(&render_state, data);
                    },
                    |err| tracing::error!("output stream error: {}", err),
                    None,
                );

                match stream {
                    Ok(stream) => {
                        if let Err(e) = stream.play() {
                            let _ = ready_tx.send(Err(DeviceError::StreamError(e.to_string())));
                            return;
                        }
                        let _ = ready_tx.send(Ok(()));

                        while running_for_loop.load(Ordering::Relaxed) {
                            thread::sleep(Duration::from_millis(10));
                        }
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(DeviceError::StreamError(e.to_string())));
                    }
                }
            })
            .map_err(|e| DeviceError::StreamError(e.to_string()))?;

        let outcome = ready_rx
            .recv_timeout(STREAM_READY_TIMEOUT)
            .unwrap_or_else(|_| {
                Err(DeviceError::StreamError(
                    "timed out waiting for output stream".into(),
                ))
            });

        match outcome {
            Ok(()) => Ok(Arc::new(Self {
                sample_rate,
                state,
                running,
                thread: Mutex::new(Some(handle)),
            })),
            Err(e) => {
                running.store(false, Ordering::SeqCst);
                let _ = handle.join();
                Err(e)
            }
        }
    }
}

impl OutputDevice for CpalOutput {
    fn current_time(&self) -> f64 {
        self.state.clock.load(Ordering::Relaxed) as f64 / self.sample_rate as f64
    }

    fn schedule(
        &self,
        samples: Vec<f32>,
        start_at: f64,
        on_complete: CompletionCallback,
    ) -> SourceId {
        let id = self.state.next_id.fetch_add(1, Ordering::Relaxed);
        let start_sample = (start_at * self.sample_rate as f64).round() as u64;
        self.state.sources.lock().push(ScheduledSource {
            id,
            start_sample,
            samples,
            on_complete: Some(on_complete),
        });
        id
    }

    fn stop(&self, source: SourceId) {
        // Cancelled sources never run their completion callback.
        self.state.sources.lock().retain(|s| s.id != source);
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread.lock().take() {
            let _ = handle.join();
        }
    }
}

/// Mix scheduled sources into one output buffer and advance the clock.
fn render(state: &OutputState, data: &mut [f32]) {
    let start = state.clock.load(Ordering::Relaxed);
    let end = start + data.len() as u64;
    data.fill(0.0);

    let mut finished: Vec<(SourceId, CompletionCallback)> = Vec::new();
    {
        let mut sources = state.sources.lock();
        for src in sources.iter() {
            let src_end = src.start_sample + src.samples.len() as u64;
            let lo = src.start_sample.max(start);
            let hi = src_end.min(end);
            for t in lo..hi {
                data[(t - start) as usize] += src.samples[(t - src.start_sample) as usize];
            }
        }

        let mut i = 0;
        while i < sources.len() {
            let src_end = sources[i].start_sample + sources[i].samples.len() as u64;
            if src_end <= end {
                let mut src = sources.swap_remove(i);
                if let Some(cb) = src.on_complete.take() {
                    finished.push((src.id, cb));
                }
            } else {
                i += 1;
            }
        }
    }

    for sample in data.iter_mut() {
        *sample = sample.clamp(-1.0, 1.0);
    }

    state.clock.fetch_add(data.len() as u64, Ordering::Relaxed);

    // Callbacks run after the sources lock is released; they take the
    // scheduler's own lock.
    for (id, cb) in finished {
        cb(id);
    }
}

/// Default-host device factory.
pub struct CpalBackend;

impl AudioBackend for CpalBackend {
    fn open_input(&self, sample_rate: u32) -> Result<Box<dyn InputDevice>, DeviceError> {
        Ok(Box::new(CpalInput::open(sample_rate)?))
    }

    fn open_output(&self, sample_rate: u32) -> Result<Arc<dyn OutputDevice>, DeviceError> {
        Ok(CpalOutput::open(sample_rate)?)
    }
}
