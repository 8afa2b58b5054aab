//! Single-producer bounded queue of outbound frames, drained by one
//! consumer task at telephony cadence (one frame per ~20ms). The
//! consumer owns the transport write handle; the ingest side only ever
//! sends commands, never touches the transport directly — message
//! passing rather than a shared write lock. `Clear` rides the same
//! ordered queue as frames so it can never jump ahead of frames enqueued
//! before it, and nothing enqueued after it can either.

use crate::transport::TransportSender;
use persona_protocol::{Frame, ServerEnvelope, FRAME_MS};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Absorbs at least one full synthesized utterance (≈10s at 20ms/frame).
pub const QUEUE_CAPACITY: usize = 512;

enum PacerCommand {
    Frame(Frame),
    Clear,
    Shutdown,
}

pub struct OutboundPacer {
    tx: mpsc::Sender<PacerCommand>,
    task: JoinHandle<()>,
}

impl OutboundPacer {
    pub fn spawn(stream_sid: String, mut sender: Box<dyn TransportSender>) -> Self {
        let (tx, mut rx) = mpsc::channel::<PacerCommand>(QUEUE_CAPACITY);

        let task = tokio::spawn(async move {
            while let Some(cmd) = rx.recv().await {
                match cmd {
                    PacerCommand::Frame(frame) => {
                        let envelope = ServerEnvelope::media(stream_sid.clone(), &frame);
                        if sender.send(envelope).await.is_err() {
                            debug!("pacer transport write failed, exiting");
                            return;
                        }
                        tokio::time::sleep(Duration::from_millis(FRAME_MS)).await;
                    }
                    PacerCommand::Clear => {
                        let envelope = ServerEnvelope::clear(stream_sid.clone());
                        if sender.send(envelope).await.is_err() {
                            debug!("pacer transport write failed sending clear, exiting");
                            return;
                        }
                    }
                    PacerCommand::Shutdown => break,
                }
            }
        });

        Self { tx, task }
    }

    pub async fn enqueue(&self, frame: Frame) -> bool {
        self.tx.send(PacerCommand::Frame(frame)).await.is_ok()
    }

    /// Enqueue a `clear` control message behind whatever frames are
    /// already queued, guaranteeing it is never overtaken by a frame
    /// enqueued before it and never followed by one enqueued after.
    pub async fn enqueue_clear(&self) -> bool {
        self.tx.send(PacerCommand::Clear).await.is_ok()
    }

    /// Send the poison value and wait for the consumer to drain.
    pub async fn shutdown(self) {
        let _ = self.tx.send(PacerCommand::Shutdown).await;
        let _ = self.task.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::test_support::RecordingSender;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[tokio::test(start_paused = true)]
    async fn frames_are_sent_in_enqueue_order() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let sender = RecordingSender::new(sent.clone());
        let pacer = OutboundPacer::spawn("SD1".to_string(), Box::new(sender));

        for i in 0..3u8 {
            let mut bytes = [0u8; 160];
            bytes[0] = i;
            assert!(pacer.enqueue(Frame(bytes)).await);
        }
        pacer.shutdown().await;

        let sent = sent.lock().await;
        assert_eq!(sent.len(), 3);
        for (i, env) in sent.iter().enumerate() {
            if let ServerEnvelope::Media { media, .. } = env {
                use base64::Engine;
                let payload = base64::engine::general_purpose::STANDARD
                    .decode(&media.payload)
                    .unwrap();
                assert_eq!(payload[0], i as u8);
            } else {
                panic!("expected media envelope");
            }
        }
    }

    #[tokio::test]
    async fn clear_cannot_be_overtaken_by_earlier_frames() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let sender = RecordingSender::new(sent.clone());
        let pacer = OutboundPacer::spawn("SD1".to_string(), Box::new(sender));

        pacer.enqueue(Frame([0u8; 160])).await;
        pacer.enqueue(Frame([1u8; 160])).await;
        pacer.enqueue_clear().await;
        pacer.shutdown().await;

        let sent = sent.lock().await;
        assert_eq!(sent.len(), 3);
        assert!(matches!(sent[2], ServerEnvelope::Clear { .. }));
    }

    #[tokio::test]
    async fn shutdown_stops_the_consumer_promptly() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let sender = RecordingSender::new(sent.clone());
        let pacer = OutboundPacer::spawn("SD1".to_string(), Box::new(sender));
        pacer.shutdown().await;
    }
}
