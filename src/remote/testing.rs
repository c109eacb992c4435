//! Test doubles for the remote endpoint boundary

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::{ConnectConfig, EventSink, RemoteConnector, RemoteEvent, RemoteStream};
use crate::error::RemoteError;

/// Remote stream that records outbound media and rejects sends after
/// close.
pub struct FakeRemote {
    sent: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl RemoteStream for FakeRemote {
    fn send_media(&self, media: &str) -> Result<(), RemoteError> {
        if self.is_closed() {
            return Err(RemoteError::SendFailed("stream closed".into()));
        }
        self.sent.lock().push(media.to_string());
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Connector that hands out [`FakeRemote`] streams and keeps each
/// connection's event sink so tests can fire remote callbacks.
pub struct FakeConnector {
    fail_connect: AtomicBool,
    connections: Mutex<Vec<FakeConnection>>,
}

pub struct FakeConnection {
    pub stream: Arc<FakeRemote>,
    pub sink: Arc<EventSink>,
    pub config: ConnectConfig,
}

impl FakeConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            fail_connect: AtomicBool::new(false),
            connections: Mutex::new(Vec::new()),
        })
    }

    pub fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Stream and sink of the most recent connection.
    pub fn last_connection(&self) -> Option<(Arc<FakeRemote>, Arc<EventSink>)> {
        self.connections
            .lock()
            .last()
            .map(|c| (Arc::clone(&c.stream), Arc::clone(&c.sink)))
    }

    pub fn last_config(&self) -> Option<ConnectConfig> {
        self.connections.lock().last().map(|c| c.config.clone())
    }

    /// Fire a remote event on the most recent connection's sink.
    pub fn fire(&self, event: RemoteEvent) {
        let sink = self
            .connections
            .lock()
            .last()
            .map(|c| Arc::clone(&c.sink));
        if let Some(sink) = sink {
            (*sink)(event);
        }
    }
}

impl RemoteConnector for FakeConnector {
    fn connect(
        &self,
        config: &ConnectConfig,
        events: EventSink,
    ) -> Result<Arc<dyn RemoteStream>, RemoteError> {
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(RemoteError::ConnectFailed("connection refused".into()));
        }

        let stream = Arc::new(FakeRemote::new());
        self.connections.lock().push(FakeConnection {
            stream: Arc::clone(&stream),
            sink: Arc::new(events),
            config: config.clone(),
        });
        Ok(stream)
    }
}
