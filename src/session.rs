//! Session lifecycle state machine
//!
//! The session is the sole authority over the input device, output
//! device, and remote stream. It consumes explicit events one at a
//! time (user commands and remote callbacks), so all mutable state has
//! a single writer: the event loop. Teardown is unconditional and
//! idempotent on every exit path, and events from a torn-down
//! connection are discarded by generation tag.

use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use crate::audio::capture::CapturePipeline;
use crate::audio::device::{AudioBackend, InputDevice};
use crate::audio::playback::{AudioFragment, PlaybackScheduler};
use crate::config::SessionConfig;
use crate::constants::{FRAME_QUEUE_CAPACITY, INPUT_SAMPLE_RATE, OUTPUT_SAMPLE_RATE};
use crate::remote::{
    rate_from_mime, EventSink, OutboundSender, RemoteConnector, RemoteEvent, RemoteStream,
};

/// Lifecycle status of the one allowed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Connecting,
    Active,
    /// Requires an explicit user-initiated restart; not a crash state.
    Error,
}

/// User-facing snapshot: one status plus at most one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    pub status: SessionStatus,
    pub message: Option<String>,
}

/// Events consumed by the session state machine.
#[derive(Debug)]
pub enum SessionEvent {
    Start,
    Stop,
    Remote {
        generation: u64,
        event: RemoteEvent,
    },
    /// Component teardown; stops the session and ends the event loop.
    Shutdown,
}

/// The session state machine core. Drive it by feeding events to
/// [`Session::handle_event`]; [`SessionHandle`] does this from a tokio
/// task.
pub struct Session {
    config: SessionConfig,
    backend: Arc<dyn AudioBackend>,
    connector: Arc<dyn RemoteConnector>,
    /// Used to route remote callbacks back into the event loop.
    events: mpsc::UnboundedSender<SessionEvent>,

    status: SessionStatus,
    /// Bumped on every connect and every teardown; remote events
    /// carrying an older generation are ignored.
    generation: u64,

    remote: Option<Arc<dyn RemoteStream>>,
    /// Held between device acquisition and capture activation.
    input: Option<Box<dyn InputDevice>>,
    capture: CapturePipeline,
    scheduler: Option<PlaybackScheduler>,
    outbound: Option<OutboundSender>,

    view_tx: watch::Sender<SessionView>,
    speaking_tx: Arc<watch::Sender<bool>>,
}

impl Session {
    pub fn new(
        config: SessionConfig,
        backend: Arc<dyn AudioBackend>,
        connector: Arc<dyn RemoteConnector>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        let (view_tx, _) = watch::channel(SessionView {
            status: SessionStatus::Idle,
            message: None,
        });
        let (speaking_tx, _) = watch::channel(false);

        Self {
            config,
            backend,
            connector,
            events,
            status: SessionStatus::Idle,
            generation: 0,
            remote: None,
            input: None,
            capture: CapturePipeline::new(),
            scheduler: None,
            outbound: None,
            view_tx,
            speaking_tx: Arc::new(speaking_tx),
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn view(&self) -> watch::Receiver<SessionView> {
        self.view_tx.subscribe()
    }

    pub fn speaking(&self) -> watch::Receiver<bool> {
        self.speaking_tx.subscribe()
    }

    /// Process one event. Never blocks on devices or the network.
    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Start => self.handle_start(),
            SessionEvent::Stop | SessionEvent::Shutdown => self.handle_stop(),
            SessionEvent::Remote { generation, event } => self.handle_remote(generation, event),
        }
    }

    fn handle_start(&mut self) {
        if matches!(self.status, SessionStatus::Connecting | SessionStatus::Active) {
            tracing::warn!("start requested while a session is already running");
            return;
        }

        self.set_view(SessionStatus::Connecting, None);

        let output = match self.backend.open_output(OUTPUT_SAMPLE_RATE) {
            Ok(output) => output,
            Err(e) => {
                tracing::error!("output device unavailable: {}", e);
                self.fail("Audio output unavailable.");
                return;
            }
        };
        self.scheduler = Some(PlaybackScheduler::new(output, Arc::clone(&self.speaking_tx)));

        match self.backend.open_input(INPUT_SAMPLE_RATE) {
            Ok(input) => self.input = Some(input),
            Err(e) => {
                tracing::error!("microphone unavailable: {}", e);
                self.fail("Microphone unavailable. Check permissions.");
                return;
            }
        }

        self.generation += 1;
        let generation = self.generation;
        let events = self.events.clone();
        let sink: EventSink = Box::new(move |event| {
            let _ = events.send(SessionEvent::Remote { generation, event });
        });

        match self.connector.connect(&self.config.connect_config(), sink) {
            Ok(remote) => {
                tracing::info!(language = %self.config.language.name, "connecting to remote endpoint");
                self.remote = Some(remote);
            }
            Err(e) => {
                tracing::error!("remote connect failed: {}", e);
                self.fail("Connection failed. Please check your network.");
            }
        }
    }

    fn handle_stop(&mut self) {
        self.teardown();
        self.set_view(SessionStatus::Idle, None);
    }

    fn handle_remote(&mut self, generation: u64, event: RemoteEvent) {
        if generation != self.generation {
            tracing::debug!("ignoring event from a torn-down connection");
            return;
        }

        match event {
            RemoteEvent::Opened => self.handle_opened(),
            RemoteEvent::Fragment { audio, mime_type } => self.handle_fragment(audio, mime_type),
            RemoteEvent::Interrupted => {
                if let Some(scheduler) = &self.scheduler {
                    scheduler.interrupt();
                }
            }
            RemoteEvent::Error(reason) => {
                tracing::error!("remote stream error: {}", reason);
                self.fail("Connection lost. Please try again.");
            }
            RemoteEvent::Closed => {
                tracing::info!("remote stream closed");
                self.handle_stop();
            }
        }
    }

    fn handle_opened(&mut self) {
        if self.status != SessionStatus::Connecting {
            tracing::warn!("unexpected open in status {:?}", self.status);
            return;
        }

        let Some(input) = self.input.take() else {
            tracing::warn!("no input device held at open");
            return;
        };
        let Some(remote) = self.remote.as_ref().map(Arc::clone) else {
            tracing::warn!("no remote stream held at open");
            return;
        };

        let (frame_tx, frame_rx) = crossbeam_channel::bounded(FRAME_QUEUE_CAPACITY);

        if let Err(e) = self.capture.activate(input, frame_tx) {
            tracing::error!("capture activation failed: {}", e);
            self.fail("Microphone unavailable. Check permissions.");
            return;
        }

        match OutboundSender::spawn(frame_rx, remote) {
            Ok(outbound) => self.outbound = Some(outbound),
            Err(e) => {
                tracing::error!("failed to spawn outbound sender: {}", e);
                self.fail("Could not start conversation.");
                return;
            }
        }

        tracing::info!("session active, listening");
        self.set_view(SessionStatus::Active, None);
    }

    fn handle_fragment(&mut self, audio: String, mime_type: Option<String>) {
        if self.status != SessionStatus::Active {
            return;
        }
        let Some(scheduler) = &self.scheduler else {
            return;
        };

        let rate = mime_type
            .as_deref()
            .and_then(rate_from_mime)
            .unwrap_or(OUTPUT_SAMPLE_RATE);

        match AudioFragment::from_wire(&audio, rate) {
            Ok(fragment) => scheduler.enqueue(fragment),
            Err(e) => {
                // One bad fragment must not end the conversation.
                tracing::warn!("dropping malformed fragment: {}", e);
            }
        }
    }

    /// Tear down on a failure path and surface one user-visible
    /// message.
    fn fail(&mut self, message: &str) {
        self.teardown();
        self.set_view(SessionStatus::Error, Some(message.to_string()));
    }

    /// Release every resource. Idempotent and total: safe to call
    /// repeatedly or when nothing is open.
    fn teardown(&mut self) {
        if let Some(remote) = self.remote.take() {
            remote.close();
        }

        // Deactivating capture drops the frame producer, which drains
        // and ends the outbound worker.
        self.capture.deactivate();
        self.input = None;
        if let Some(outbound) = self.outbound.take() {
            outbound.join();
        }

        if let Some(scheduler) = self.scheduler.take() {
            scheduler.shutdown();
        }

        // Callbacks from released resources must be ignored, not acted
        // on.
        self.generation += 1;
    }

    fn set_view(&mut self, status: SessionStatus, message: Option<String>) {
        self.status = status;
        self.view_tx.send_replace(SessionView { status, message });
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Async front for [`Session`]: pumps events from user actions and
/// remote callbacks into the state machine on a tokio task.
pub struct SessionHandle {
    events: mpsc::UnboundedSender<SessionEvent>,
    view: watch::Receiver<SessionView>,
    speaking: watch::Receiver<bool>,
}

impl SessionHandle {
    pub fn spawn(
        config: SessionConfig,
        backend: Arc<dyn AudioBackend>,
        connector: Arc<dyn RemoteConnector>,
    ) -> Self {
        let (events, mut rx) = mpsc::unbounded_channel();
        let mut session = Session::new(config, backend, connector, events.clone());
        let view = session.view();
        let speaking = session.speaking();

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let shutdown = matches!(event, SessionEvent::Shutdown);
                session.handle_event(event);
                if shutdown {
                    break;
                }
            }
        });

        Self {
            events,
            view,
            speaking,
        }
    }

    pub fn start(&self) {
        let _ = self.events.send(SessionEvent::Start);
    }

    pub fn stop(&self) {
        let _ = self.events.send(SessionEvent::Stop);
    }

    pub fn view(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    pub fn speaking(&self) -> watch::Receiver<bool> {
        self.speaking.clone()
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        let _ = self.events.send(SessionEvent::Shutdown);
    }
}
