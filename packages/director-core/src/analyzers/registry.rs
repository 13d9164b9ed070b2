//! Startup registry wiring concrete analyzer implementations behind the four
//! capability traits.
//!
//! Mirrors this codebase's `bootstrap` composition root: the registry is the
//! single place analyzer instances are constructed, so swapping a reference
//! implementation for a real model touches one line here, not every call
//! site.

use std::sync::Arc;

use super::{
    CentroidTracker, Detector, HeuristicSceneDescriber, KeywordSpeechRecognizer,
    MotionThresholdDetector, SceneDescriber, SpeechRecognizer, Tracker,
};

/// Holds one instance of each analyzer trait object for the whole run.
pub struct AnalyzerRegistry {
    pub detector: Arc<dyn Detector>,
    pub tracker: Arc<dyn Tracker>,
    pub scene_describer: Arc<dyn SceneDescriber>,
    pub speech_recognizer: Arc<dyn SpeechRecognizer>,
}

impl AnalyzerRegistry {
    /// Builds a registry of the deterministic reference implementations.
    /// Production deployments wanting a real model implement the relevant
    /// trait and construct a registry with that field swapped in.
    pub fn reference(keywords: Vec<String>) -> Self {
        Self {
            detector: Arc::new(MotionThresholdDetector::default()),
            tracker: Arc::new(CentroidTracker::new()),
            scene_describer: Arc::new(HeuristicSceneDescriber),
            speech_recognizer: Arc::new(KeywordSpeechRecognizer::new(keywords)),
        }
    }
}
