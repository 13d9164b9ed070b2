//! The long-lived pipeline tasks: C1's sampler, C3's ranker, C4's decision
//! engine, and C5's narration orchestrator, plus the shared state each reads
//! or writes (`ObservationCache`, `ProgramCamTracker`).

pub mod decision_engine;
pub mod narration;
pub mod observation_cache;
pub mod program_cam_tracker;
pub mod ranker;
pub mod sampler;

pub use decision_engine::{
    CamScoreSnapshot, DecisionEngine, NoSpeechBoundary, ObservationSpeechBoundary,
    SpeechBoundarySource,
};
pub use narration::{
    AudioBlob, BusFeatureCache, FeatureSource, NarrationOrchestrator, SilentToneBackend, TtsBackend,
    TtsError,
};
pub use observation_cache::{CameraObservations, ObservationCache};
pub use program_cam_tracker::ProgramCamTracker;
pub use ranker::Ranker;
pub use sampler::Sampler;
