//! Broadcast-channel-backed bus bridge.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;

use super::emitter::BusEmitter;
use super::BusEvent;
use crate::model::{CameraScore, Narration, SwitchDecision};

/// Forwards every emitted event to a `tokio::sync::broadcast` channel (for
/// WebSocket fan-out) and, if set, to one external emitter (used by tests to
/// assert on bus traffic without standing up a WebSocket connection).
pub struct BroadcastBusBridge {
    tx: broadcast::Sender<BusEvent>,
    external_emitter: RwLock<Option<Arc<dyn BusEmitter>>>,
}

impl BroadcastBusBridge {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self {
            tx,
            external_emitter: RwLock::new(None),
        }
    }

    pub fn with_sender(tx: broadcast::Sender<BusEvent>) -> Self {
        Self {
            tx,
            external_emitter: RwLock::new(None),
        }
    }

    pub fn set_external_emitter(&self, emitter: Arc<dyn BusEmitter>) {
        *self.external_emitter.write() = Some(emitter);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.tx.subscribe()
    }

    pub fn sender(&self) -> broadcast::Sender<BusEvent> {
        self.tx.clone()
    }

    fn publish(&self, event: BusEvent) {
        if let Some(emitter) = self.external_emitter.read().as_ref() {
            emitter.emit(event.clone());
        }
        if let Err(err) = self.tx.send(event) {
            log::trace!("bus event dropped, no subscribers: {err}");
        }
    }
}

impl BusEmitter for BroadcastBusBridge {
    fn emit_score(&self, score: CameraScore) {
        self.publish(BusEvent::Score(score));
    }

    fn emit_decision(&self, decision: SwitchDecision) {
        self.publish(BusEvent::from(decision));
    }

    fn emit_narration(&self, narration: Narration) {
        self.publish(BusEvent::Narration(narration));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CameraFeatures, CameraId};

    #[tokio::test]
    async fn subscribers_receive_published_scores() {
        let bridge = BroadcastBusBridge::new(16);
        let mut rx = bridge.subscribe();

        bridge.emit_score(CameraScore {
            cam_id: CameraId::new("cam-1"),
            ts: 1.0,
            score: 0.9,
            features: CameraFeatures::default(),
            reason: "test".into(),
        });

        let event = rx.recv().await.unwrap();
        match event {
            BusEvent::Score(score) => assert_eq!(score.cam_id, CameraId::new("cam-1")),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn publish_without_subscribers_does_not_panic() {
        let bridge = BroadcastBusBridge::new(4);
        bridge.emit_narration(Narration {
            text: "hello".into(),
            duration_ms: 500,
            timestamp: 0.0,
            audio_blob_ref: None,
        });
    }
}
