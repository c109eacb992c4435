//! Outbound frame delivery to the remote stream
//!
//! A single consumer drains the capture pipeline's frame queue in
//! arrival order, wire-encodes each frame, and dispatches it. Running
//! on its own thread keeps the capture callback from ever waiting on
//! the transport.

use bytes::Bytes;
use crossbeam_channel::Receiver;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::codec;
use crate::remote::RemoteStream;

/// Orders and delivers encoded frames to the remote stream.
pub struct OutboundSender {
    worker: Option<JoinHandle<()>>,
}

impl OutboundSender {
    /// Spawn the delivery worker. It exits when every producer side of
    /// the frame channel has been dropped.
    pub fn spawn(
        frames: Receiver<Bytes>,
        remote: Arc<dyn RemoteStream>,
    ) -> std::io::Result<Self> {
        let worker = thread::Builder::new()
            .name("voice-outbound".into())
            .spawn(move || {
                for frame in frames.iter() {
                    let media = codec::wire_encode(&frame);
                    if let Err(e) = remote.send_media(&media) {
                        // Session-level errors arrive via the stream's
                        // own error callback; a rejected send is not
                        // one. Drop and keep draining.
                        tracing::warn!("dropping outbound frame: {}", e);
                    }
                }
                tracing::debug!("outbound sender drained");
            })?;

        Ok(Self {
            worker: Some(worker),
        })
    }

    /// Wait for the worker to finish draining. The frame channel must
    /// already be disconnected or this blocks until it is.
    pub fn join(mut self) {
        self.join_inner();
    }

    fn join_inner(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for OutboundSender {
    fn drop(&mut self) {
        self.join_inner();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::testing::FakeRemote;
    use std::time::Duration;

    fn wait_for_sent(remote: &FakeRemote, count: usize) {
        for _ in 0..200 {
            if remote.sent().len() >= count {
                return;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("remote never received {} frames", count);
    }

    #[test]
    fn test_frames_delivered_in_order() {
        let (tx, rx) = crossbeam_channel::bounded(8);
        let remote = Arc::new(FakeRemote::new());

        let sender = OutboundSender::spawn(rx, Arc::clone(&remote) as _).unwrap();

        tx.send(Bytes::from_static(&[1, 0])).unwrap();
        tx.send(Bytes::from_static(&[2, 0])).unwrap();
        tx.send(Bytes::from_static(&[3, 0])).unwrap();
        drop(tx);
        sender.join();

        let sent = remote.sent();
        assert_eq!(sent.len(), 3);
        assert_eq!(codec::wire_decode(&sent[0]).unwrap(), vec![1, 0]);
        assert_eq!(codec::wire_decode(&sent[1]).unwrap(), vec![2, 0]);
        assert_eq!(codec::wire_decode(&sent[2]).unwrap(), vec![3, 0]);
    }

    #[test]
    fn test_send_failures_are_swallowed() {
        let (tx, rx) = crossbeam_channel::bounded(8);
        let remote = Arc::new(FakeRemote::new());

        let sender = OutboundSender::spawn(rx, Arc::clone(&remote) as _).unwrap();

        tx.send(Bytes::from_static(&[1, 0])).unwrap();
        wait_for_sent(&remote, 1);

        remote.close();
        tx.send(Bytes::from_static(&[2, 0])).unwrap();
        tx.send(Bytes::from_static(&[3, 0])).unwrap();
        drop(tx);

        // Worker keeps draining despite the rejected sends.
        sender.join();
        assert_eq!(remote.sent().len(), 1);
    }
}
