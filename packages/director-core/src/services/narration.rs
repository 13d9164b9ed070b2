//! C5: on each SWITCH, assembles a short narration from the switched-to
//! camera's last known features and hands it to a [`TtsBackend`].
//!
//! The backend is an abstraction-at-the-seam trait: production wires in a
//! real TTS provider at bootstrap; tests and hosts with none configured get
//! [`SilentToneBackend`], a deterministic stand-in.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::bus::BusEmitter;
use crate::director_constants::{DEFAULT_MAX_NARRATION_WORDS, DEFAULT_MAX_TTS_LATENCY_MS};
use crate::model::{CameraFeatures, CameraId, Narration, SwitchDecision};
use crate::utils::now_seconds;

/// Synthesized speech audio, referenced by an opaque blob id rather than
/// carried inline (the real backend would upload to blob storage and return
/// a reference; the reference core keeps bytes out of the bus entirely).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioBlob {
    pub blob_ref: String,
    pub duration_ms: u32,
}

#[derive(Debug, Error)]
pub enum TtsError {
    #[error("tts synthesis exceeded its deadline")]
    Timeout,
    #[error("tts backend unavailable: {0}")]
    Unavailable(String),
}

/// Synthesizes narration text into audio. Implemented once for a real
/// provider at bootstrap; `C5`'s logic never changes when the backend does.
#[async_trait]
pub trait TtsBackend: Send + Sync {
    async fn synthesize(&self, text: &str, deadline: Duration) -> Result<AudioBlob, TtsError>;
}

/// Deterministic backend producing a fixed-rate silent tone; used for tests
/// and any host with no TTS provider configured.
#[derive(Debug, Default)]
pub struct SilentToneBackend;

const MS_PER_WORD: u32 = 350;

#[async_trait]
impl TtsBackend for SilentToneBackend {
    async fn synthesize(&self, text: &str, _deadline: Duration) -> Result<AudioBlob, TtsError> {
        let word_count = text.split_whitespace().count().max(1) as u32;
        Ok(AudioBlob {
            blob_ref: format!("silent-tone://{}", text.len()),
            duration_ms: word_count * MS_PER_WORD,
        })
    }
}

/// Read-only access to the ranker's last feature snapshot per camera, so the
/// narration orchestrator can build context without depending on
/// [`super::observation_cache::ObservationCache`] (narration only ever needs
/// the fused, already-normalized feature vector, not raw observations).
pub trait FeatureSource: Send + Sync {
    fn last_features(&self, cam_id: &CameraId) -> Option<CameraFeatures>;

    /// Observes a published score. No-op by default; [`BusFeatureCache`] is
    /// the implementation that actually keeps itself current this way.
    fn record(&self, _score: &crate::model::CameraScore) {}
}

/// A [`FeatureSource`] that keeps itself up to date by observing `scores`
/// events on the same bus subscription the orchestrator already holds for
/// switches, rather than requiring a second wiring path from the ranker.
#[derive(Default)]
pub struct BusFeatureCache {
    latest: dashmap::DashMap<CameraId, CameraFeatures>,
}

impl FeatureSource for BusFeatureCache {
    fn last_features(&self, cam_id: &CameraId) -> Option<CameraFeatures> {
        self.latest.get(cam_id).map(|r| r.value().clone())
    }

    fn record(&self, score: &crate::model::CameraScore) {
        self.latest.insert(score.cam_id.clone(), score.features.clone());
    }
}

/// Picks a template branch deterministically: tags, then top objects, then
/// recent speech, then a generic fallback. Public so it can be unit tested
/// without a TTS backend.
pub fn compose_narration_text(cam_id: &CameraId, features: Option<&CameraFeatures>) -> String {
    let Some(features) = features else {
        return format!("Now on {cam_id}.");
    };

    if let Some(tag) = features.tags.first() {
        return format!("Now on {cam_id}: {tag}.");
    }
    if !features.top_objects.is_empty() {
        let objects = features.top_objects.join(", ");
        return format!("Now on {cam_id}, featuring {objects}.");
    }
    if let Some(speech) = &features.recent_speech_text {
        if !speech.trim().is_empty() {
            return format!("Now on {cam_id}: \"{}\"", speech.trim());
        }
    }
    format!("Now on {cam_id}.")
}

/// Truncates `text` to at most `max_words` words, preserving whole words.
fn cap_words(text: &str, max_words: usize) -> String {
    text.split_whitespace()
        .take(max_words)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extremely small safety filter: flags narrations containing raw digit
/// sequences long enough to look like a phone number or similar PII, and
/// nothing else. A placeholder for a real classifier; the contract (reject
/// before synthesis, never after) is what matters for testability.
fn passes_safety_filter(text: &str) -> bool {
    let mut digit_run = 0;
    for ch in text.chars() {
        if ch.is_ascii_digit() {
            digit_run += 1;
            if digit_run >= 7 {
                return false;
            }
        } else {
            digit_run = 0;
        }
    }
    true
}

struct InFlight {
    generation: u64,
}

/// Consumes SWITCH decisions and publishes at most one in-flight narration
/// at a time; a newer SWITCH cancels whatever synthesis is still running.
pub struct NarrationOrchestrator {
    backend: Arc<dyn TtsBackend>,
    features: Arc<dyn FeatureSource>,
    max_tts_latency_ms: u64,
    max_words: usize,
    in_flight: Mutex<InFlight>,
}

impl NarrationOrchestrator {
    pub fn new(
        backend: Arc<dyn TtsBackend>,
        features: Arc<dyn FeatureSource>,
        max_tts_latency_ms: u64,
        max_words: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            backend,
            features,
            max_tts_latency_ms,
            max_words,
            in_flight: Mutex::new(InFlight { generation: 0 }),
        })
    }

    pub fn defaults(backend: Arc<dyn TtsBackend>, features: Arc<dyn FeatureSource>) -> Arc<Self> {
        Self::new(
            backend,
            features,
            DEFAULT_MAX_TTS_LATENCY_MS,
            DEFAULT_MAX_NARRATION_WORDS,
        )
    }

    /// Spawns a task that listens to the bus for SWITCH decisions and
    /// narrates each one, cancelling any still-running synthesis from a
    /// stale switch.
    pub fn start_loop<S: crate::runtime::TaskSpawner>(
        self: &Arc<Self>,
        spawner: &S,
        emitter: Arc<dyn BusEmitter>,
        mut switches: tokio::sync::broadcast::Receiver<crate::bus::BusEvent>,
        cancel_token: CancellationToken,
    ) {
        let orchestrator = Arc::clone(self);
        spawner.spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        log::info!("narration orchestrator cancelled");
                        break;
                    }
                    event = switches.recv() => {
                        match event {
                            Ok(crate::bus::BusEvent::Switch(decision)) => {
                                orchestrator.on_switch(decision, emitter.as_ref()).await;
                            }
                            Ok(crate::bus::BusEvent::Score(score)) => {
                                orchestrator.features.record(&score);
                            }
                            Ok(_) => {}
                            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                                log::warn!("narration orchestrator lagged, skipped {skipped} bus events");
                            }
                            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                        }
                    }
                }
            }
        });
    }

    /// Handles one SWITCH: builds context, synthesizes, and publishes,
    /// unless superseded by a newer switch or the latency budget is blown.
    pub async fn on_switch(&self, decision: SwitchDecision, emitter: &dyn BusEmitter) {
        let Some(to_cam) = decision.to_cam.clone() else {
            return;
        };

        let generation = {
            let mut guard = self.in_flight.lock().await;
            guard.generation += 1;
            guard.generation
        };

        let features = self.features.last_features(&to_cam);
        let text = cap_words(&compose_narration_text(&to_cam, features.as_ref()), self.max_words);

        if !passes_safety_filter(&text) {
            log::warn!("narration text for {to_cam} failed safety filter, dropping");
            return;
        }

        let start = now_seconds();
        let deadline = Duration::from_millis(self.max_tts_latency_ms);
        let result = tokio::time::timeout(deadline, self.backend.synthesize(&text, deadline)).await;

        // If a newer switch arrived while we were synthesizing, this result
        // is stale; drop it rather than publish out-of-order narration.
        if self.in_flight.lock().await.generation != generation {
            log::debug!("narration for {to_cam} superseded by a newer switch, dropping");
            return;
        }

        let elapsed_ms = ((now_seconds() - start) * 1000.0) as u64;
        if elapsed_ms > self.max_tts_latency_ms {
            log::warn!("narration for {to_cam} exceeded latency budget ({elapsed_ms}ms), dropping");
            return;
        }

        let blob = match result {
            Ok(Ok(blob)) => blob,
            Ok(Err(err)) => {
                log::warn!("tts synthesis for {to_cam} failed, dropping narration: {err}");
                return;
            }
            Err(_) => {
                log::warn!("tts synthesis for {to_cam} timed out, dropping narration");
                return;
            }
        };

        emitter.emit_narration(Narration {
            text,
            duration_ms: blob.duration_ms,
            timestamp: now_seconds(),
            audio_blob_ref: Some(blob.blob_ref),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DecisionAction;
    use parking_lot::RwLock;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MapFeatureSource {
        map: RwLock<HashMap<CameraId, CameraFeatures>>,
    }

    impl MapFeatureSource {
        fn set(&self, cam_id: CameraId, features: CameraFeatures) {
            self.map.write().insert(cam_id, features);
        }
    }

    impl FeatureSource for MapFeatureSource {
        fn last_features(&self, cam_id: &CameraId) -> Option<CameraFeatures> {
            self.map.read().get(cam_id).cloned()
        }
    }

    struct RecordingEmitter {
        narrations: parking_lot::Mutex<Vec<Narration>>,
    }

    impl RecordingEmitter {
        fn new() -> Self {
            Self {
                narrations: parking_lot::Mutex::new(Vec::new()),
            }
        }
    }

    impl BusEmitter for RecordingEmitter {
        fn emit_score(&self, _score: crate::model::CameraScore) {}
        fn emit_decision(&self, _decision: SwitchDecision) {}
        fn emit_narration(&self, narration: Narration) {
            self.narrations.lock().push(narration);
        }
    }

    struct FailingBackend;

    #[async_trait]
    impl TtsBackend for FailingBackend {
        async fn synthesize(&self, _text: &str, _deadline: Duration) -> Result<AudioBlob, TtsError> {
            Err(TtsError::Unavailable("no provider configured".into()))
        }
    }

    struct SlowBackend {
        delay: Duration,
    }

    #[async_trait]
    impl TtsBackend for SlowBackend {
        async fn synthesize(&self, _text: &str, _deadline: Duration) -> Result<AudioBlob, TtsError> {
            tokio::time::sleep(self.delay).await;
            Ok(AudioBlob {
                blob_ref: "slow".into(),
                duration_ms: 100,
            })
        }
    }

    fn switch_to(cam: &str) -> SwitchDecision {
        SwitchDecision {
            ts: 1.0,
            action: DecisionAction::Switch,
            from_cam: None,
            to_cam: Some(CameraId::new(cam)),
            delta_score: Some(0.2),
            rationale: "initial".into(),
            confidence: 1.0,
        }
    }

    #[test]
    fn template_prefers_tags_over_objects_and_speech() {
        let mut features = CameraFeatures::default();
        features.tags = vec!["goal".to_string()];
        features.top_objects = vec!["ball".to_string()];
        features.recent_speech_text = Some("great shot".to_string());

        let text = compose_narration_text(&CameraId::new("cam-1"), Some(&features));
        assert!(text.contains("goal"));
    }

    #[test]
    fn template_falls_back_to_objects_when_no_tags() {
        let mut features = CameraFeatures::default();
        features.top_objects = vec!["person".to_string(), "ball".to_string()];
        let text = compose_narration_text(&CameraId::new("cam-1"), Some(&features));
        assert!(text.contains("person"));
    }

    #[test]
    fn template_falls_back_to_generic_with_no_features() {
        let text = compose_narration_text(&CameraId::new("cam-1"), None);
        assert_eq!(text, "Now on cam-1.");
    }

    #[test]
    fn cap_words_preserves_whole_words_only() {
        let capped = cap_words("one two three four five", 3);
        assert_eq!(capped, "one two three");
    }

    #[test]
    fn safety_filter_rejects_long_digit_runs() {
        assert!(!passes_safety_filter("call me at 5551234567"));
        assert!(passes_safety_filter("scored in the 90th minute"));
    }

    #[tokio::test]
    async fn on_switch_publishes_narration_for_silent_backend() {
        let emitter = RecordingEmitter::new();
        let features = Arc::new(MapFeatureSource::default());
        let mut cam_features = CameraFeatures::default();
        cam_features.tags = vec!["celebration".to_string()];
        features.set(CameraId::new("cam-1"), cam_features);

        let orchestrator = NarrationOrchestrator::defaults(Arc::new(SilentToneBackend), features);
        orchestrator.on_switch(switch_to("cam-1"), &emitter).await;

        let narrations = emitter.narrations.lock();
        assert_eq!(narrations.len(), 1);
        assert!(narrations[0].text.contains("celebration"));
    }

    #[tokio::test]
    async fn on_switch_drops_narration_when_backend_fails() {
        let emitter = RecordingEmitter::new();
        let features = Arc::new(MapFeatureSource::default());
        let orchestrator = NarrationOrchestrator::defaults(Arc::new(FailingBackend), features);

        orchestrator.on_switch(switch_to("cam-1"), &emitter).await;
        assert!(emitter.narrations.lock().is_empty());
    }

    #[tokio::test]
    async fn on_switch_drops_narration_exceeding_latency_budget() {
        let emitter = RecordingEmitter::new();
        let features = Arc::new(MapFeatureSource::default());
        let backend = Arc::new(SlowBackend {
            delay: Duration::from_millis(50),
        });
        let orchestrator = NarrationOrchestrator::new(backend, features, 10, DEFAULT_MAX_NARRATION_WORDS);

        orchestrator.on_switch(switch_to("cam-1"), &emitter).await;
        assert!(emitter.narrations.lock().is_empty());
    }

    #[tokio::test]
    async fn hold_decisions_never_produce_narration() {
        let emitter = RecordingEmitter::new();
        let features = Arc::new(MapFeatureSource::default());
        let orchestrator = NarrationOrchestrator::defaults(Arc::new(SilentToneBackend), features);

        let hold = SwitchDecision::hold(1.0, "same-best");
        orchestrator.on_switch(hold, &emitter).await;
        assert!(emitter.narrations.lock().is_empty());
    }
}
