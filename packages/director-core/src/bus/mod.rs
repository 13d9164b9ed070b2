//! Event bus: the single fan-out point from the pipeline's internal tasks to
//! WebSocket clients and other external observers.
//!
//! Mirrors this codebase's event-bridge pattern: an internal
//! [`tokio::sync::broadcast`] channel wrapped by [`BroadcastBusBridge`], with
//! an `emit_*`-per-topic [`BusEmitter`] trait so producers never touch the
//! channel directly.

mod bridge;
mod emitter;

pub use bridge::BroadcastBusBridge;
pub use emitter::{BusEmitter, LoggingBusEmitter, NoopBusEmitter};

use serde::{Deserialize, Serialize};

use crate::model::{CameraScore, Narration, SwitchDecision};

/// Every event that can travel over the bus, tagged by `topic` for clients
/// that filter by kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "topic", rename_all = "camelCase")]
pub enum BusEvent {
    Score(CameraScore),
    Switch(SwitchDecision),
    Hold(SwitchDecision),
    Narration(Narration),
}

impl From<CameraScore> for BusEvent {
    fn from(score: CameraScore) -> Self {
        Self::Score(score)
    }
}

impl From<Narration> for BusEvent {
    fn from(narration: Narration) -> Self {
        Self::Narration(narration)
    }
}

impl From<SwitchDecision> for BusEvent {
    fn from(decision: SwitchDecision) -> Self {
        use crate::model::DecisionAction;
        match decision.action {
            DecisionAction::Switch => Self::Switch(decision),
            DecisionAction::Hold => Self::Hold(decision),
        }
    }
}
