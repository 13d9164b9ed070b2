//! The [`BusEmitter`] trait and its trivial implementations.

use super::BusEvent;
use crate::model::{CameraScore, Narration, SwitchDecision};

/// Receives pipeline events as they are produced. Implemented by
/// [`super::BroadcastBusBridge`] for the real bus; [`NoopBusEmitter`] and
/// [`LoggingBusEmitter`] exist for tests and for components that run without
/// a bus attached (e.g. a bare ranker in a unit test).
pub trait BusEmitter: Send + Sync {
    fn emit_score(&self, score: CameraScore);
    fn emit_decision(&self, decision: SwitchDecision);
    fn emit_narration(&self, narration: Narration);

    /// Convenience wrapper dispatching on the already-tagged event.
    fn emit(&self, event: BusEvent) {
        match event {
            BusEvent::Score(score) => self.emit_score(score),
            BusEvent::Switch(decision) | BusEvent::Hold(decision) => self.emit_decision(decision),
            BusEvent::Narration(narration) => self.emit_narration(narration),
        }
    }
}

/// Discards every event. Used where a `BusEmitter` is required structurally
/// but the test does not care about bus traffic.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBusEmitter;

impl BusEmitter for NoopBusEmitter {
    fn emit_score(&self, _score: CameraScore) {}
    fn emit_decision(&self, _decision: SwitchDecision) {}
    fn emit_narration(&self, _narration: Narration) {}
}

/// Logs every event at debug level instead of publishing it anywhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingBusEmitter;

impl BusEmitter for LoggingBusEmitter {
    fn emit_score(&self, score: CameraScore) {
        tracing::debug!(cam_id = %score.cam_id, score = score.score, "camera_score");
    }

    fn emit_decision(&self, decision: SwitchDecision) {
        tracing::debug!(action = ?decision.action, rationale = %decision.rationale, "switch_decision");
    }

    fn emit_narration(&self, narration: Narration) {
        tracing::debug!(text = %narration.text, "narration");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingBusEmitter {
        scores: AtomicUsize,
        decisions: AtomicUsize,
        narrations: AtomicUsize,
    }

    impl BusEmitter for CountingBusEmitter {
        fn emit_score(&self, _score: CameraScore) {
            self.scores.fetch_add(1, Ordering::SeqCst);
        }
        fn emit_decision(&self, _decision: SwitchDecision) {
            self.decisions.fetch_add(1, Ordering::SeqCst);
        }
        fn emit_narration(&self, _narration: Narration) {
            self.narrations.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn emit_dispatches_by_variant() {
        use crate::model::{CameraFeatures, CameraId, DecisionAction};

        let emitter = CountingBusEmitter::default();
        emitter.emit(BusEvent::Score(CameraScore {
            cam_id: CameraId::new("a"),
            ts: 0.0,
            score: 0.5,
            features: CameraFeatures::default(),
            reason: "test".into(),
        }));
        emitter.emit(BusEvent::Hold(SwitchDecision {
            ts: 0.0,
            action: DecisionAction::Hold,
            from_cam: None,
            to_cam: None,
            delta_score: None,
            rationale: "test".into(),
            confidence: 0.0,
        }));

        assert_eq!(emitter.scores.load(Ordering::SeqCst), 1);
        assert_eq!(emitter.decisions.load(Ordering::SeqCst), 1);
        assert_eq!(emitter.narrations.load(Ordering::SeqCst), 0);
    }
}
