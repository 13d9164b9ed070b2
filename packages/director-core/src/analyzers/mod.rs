//! C2: the four analyzer capability traits, their deterministic reference
//! implementations, and the startup registry that wires them.
//!
//! Each trait is a pure function modulo internal model state: no analyzer
//! reads the bus or mutates program state. The shipped implementations are
//! dependency-free heuristics standing in for a real ML model, hidden behind
//! the same capability-trait seam a real model would implement.

mod detector;
mod registry;
mod scene_describer;
mod speech_recognizer;
mod tracker;

pub use detector::{Detector, MotionThresholdDetector};
pub use registry::AnalyzerRegistry;
pub use scene_describer::{HeuristicSceneDescriber, SceneDescriber};
pub use speech_recognizer::{KeywordSpeechRecognizer, SpeechRecognizer};
pub use tracker::{CentroidTracker, Tracker};

/// Lifecycle state of one analyzer instance.
///
/// `Warming -> Ready` happens after the first successful call; any fatal init
/// failure lands in terminal `Dead`, reported once through a sideband error
/// channel rather than surfacing per-call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyzerState {
    Cold,
    Warming,
    Ready,
    Dead,
}

impl Default for AnalyzerState {
    fn default() -> Self {
        Self::Cold
    }
}

impl AnalyzerState {
    pub fn on_call_started(&mut self) {
        if *self == Self::Cold {
            *self = Self::Warming;
        }
    }

    pub fn on_call_succeeded(&mut self) {
        *self = Self::Ready;
    }

    pub fn on_fatal_error(&mut self) {
        *self = Self::Dead;
    }

    pub fn is_usable(&self) -> bool {
        !matches!(self, Self::Dead)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_transitions_cold_to_ready() {
        let mut state = AnalyzerState::default();
        assert_eq!(state, AnalyzerState::Cold);
        state.on_call_started();
        assert_eq!(state, AnalyzerState::Warming);
        state.on_call_succeeded();
        assert_eq!(state, AnalyzerState::Ready);
    }

    #[test]
    fn dead_state_is_not_usable() {
        let mut state = AnalyzerState::default();
        state.on_fatal_error();
        assert_eq!(state, AnalyzerState::Dead);
        assert!(!state.is_usable());
    }
}
