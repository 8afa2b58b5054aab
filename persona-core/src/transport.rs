//! Transport seam between the media-stream session and whatever carries
//! the actual bytes (a WebSocket in production, a scripted fake in
//! tests). Split into a receiver half (owned by the ingest activity) and
//! a sender half (owned by the pacer), matching the single-ownership
//! design in the concurrency model: no shared write lock.

use async_trait::async_trait;
use persona_protocol::{ClientEnvelope, ServerEnvelope};

/// What the ingest activity sees when it asks for the next inbound
/// message.
pub enum Inbound {
    Envelope(ClientEnvelope),
    Closed,
}

#[async_trait]
pub trait TransportReceiver: Send {
    async fn recv(&mut self) -> Inbound;

    /// Non-blocking peek at whatever is already buffered, or `None` if
    /// nothing has arrived yet. Used while the pacer is speaking so the
    /// ingest side can keep feeding the turn detector (and so barge-in
    /// can be detected) without blocking on the next full message.
    fn try_recv(&mut self) -> Option<Inbound>;
}

#[async_trait]
pub trait TransportSender: Send {
    async fn send(&mut self, envelope: ServerEnvelope) -> Result<(), ()>;
}

#[cfg(any(test, feature = "test-support"))]
pub mod test_support {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use tokio::sync::Mutex;

    /// Feeds inbound envelopes over a channel rather than a fixed `Vec`,
    /// so a test can push additional messages (e.g. a barge-in
    /// utterance) while the session is mid-synthesis, not just before
    /// the session starts.
    pub struct ScriptedReceiver {
        rx: mpsc::UnboundedReceiver<ClientEnvelope>,
    }

    impl ScriptedReceiver {
        /// Build a receiver pre-loaded with `script`, plus a sender the
        /// caller can use to inject further envelopes later.
        pub fn new(script: Vec<ClientEnvelope>) -> (Self, mpsc::UnboundedSender<ClientEnvelope>) {
            let (tx, rx) = mpsc::unbounded_channel();
            for envelope in script {
                let _ = tx.send(envelope);
            }
            (Self { rx }, tx)
        }
    }

    #[async_trait]
    impl TransportReceiver for ScriptedReceiver {
        async fn recv(&mut self) -> Inbound {
            match self.rx.recv().await {
                Some(envelope) => Inbound::Envelope(envelope),
                None => Inbound::Closed,
            }
        }

        fn try_recv(&mut self) -> Option<Inbound> {
            match self.rx.try_recv() {
                Ok(envelope) => Some(Inbound::Envelope(envelope)),
                Err(mpsc::error::TryRecvError::Empty) => None,
                Err(mpsc::error::TryRecvError::Disconnected) => Some(Inbound::Closed),
            }
        }
    }

    /// Records every outbound envelope for later assertions.
    pub struct RecordingSender {
        sent: Arc<Mutex<Vec<ServerEnvelope>>>,
    }

    impl RecordingSender {
        pub fn new(sent: Arc<Mutex<Vec<ServerEnvelope>>>) -> Self {
            Self { sent }
        }
    }

    #[async_trait]
    impl TransportSender for RecordingSender {
        async fn send(&mut self, envelope: ServerEnvelope) -> Result<(), ()> {
            self.sent.lock().await.push(envelope);
            Ok(())
        }
    }
}
