//! Application bootstrap and dependency wiring.
//!
//! This module contains the composition root - the single place where all
//! services are instantiated and wired together. This pattern provides:
//!
//! - **Clarity**: All dependency relationships are visible in one place
//! - **Testability**: Easy to swap implementations for testing
//! - **Maintainability**: Service creation logic is isolated from usage

use std::sync::Arc;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use crate::analyzers::AnalyzerRegistry;
use crate::bus::{BroadcastBusBridge, BusEmitter, BusEvent};
use crate::error::{DirectorError, DirectorResult};
use crate::ingress::{CameraLifecycleEvent, MediaIngressAdapter, MediaRoom};
use crate::model::CameraId;
use crate::runtime::{TaskSpawner, TokioSpawner};
use crate::services::{
    BusFeatureCache, DecisionEngine, FeatureSource, NarrationOrchestrator, ObservationCache,
    ObservationSpeechBoundary, ProgramCamTracker, Ranker, Sampler, TtsBackend,
};
use crate::state::Config;

/// Container for all bootstrapped services.
///
/// This struct holds all the wired services created during bootstrap. It's
/// consumed by `AppState` to build the final application state, and is the
/// single handle needed to start or stop the whole pipeline.
pub struct BootstrappedServices {
    /// Per-camera observation cache written by the sampler, read by the ranker.
    pub cache: Arc<ObservationCache>,
    /// Media ingress adapter (lifecycle tracking, per-camera sampling).
    pub ingress: Arc<MediaIngressAdapter>,
    /// Analyzer dispatch / worker pool.
    pub sampler: Arc<Sampler>,
    /// "Which camera is program, and since when" snapshot shared with the ranker.
    pub program_tracker: Arc<ProgramCamTracker>,
    /// Per-camera feature fusion.
    pub ranker: Arc<Ranker>,
    /// Switching decision engine.
    pub decision_engine: Arc<DecisionEngine>,
    /// Narration orchestrator.
    pub narration: Arc<NarrationOrchestrator>,
    /// Event bus fanning pipeline events out to WebSocket clients.
    pub bus: Arc<BroadcastBusBridge>,
    /// Cameras currently known to the pipeline, read once per ranker tick.
    pub known_cameras: Arc<RwLock<Vec<CameraId>>>,
    /// Resolved configuration this run was bootstrapped with.
    pub config: Config,
    /// Task spawner for background operations.
    pub spawner: TokioSpawner,
    /// Cancellation token for graceful shutdown.
    pub cancel_token: CancellationToken,
}

impl BootstrappedServices {
    /// Starts every long-lived pipeline task. Safe to call once; calling it
    /// again spawns a second set of loops racing the first.
    pub fn start(&self) {
        self.ingress
            .start_sampling_loop(&self.spawner, self.cancel_token.clone());
        self.sampler.start_loop(&self.spawner, self.cancel_token.clone());

        self.ranker.start_loop(
            &self.spawner,
            Arc::clone(&self.bus) as Arc<dyn BusEmitter>,
            Arc::clone(&self.known_cameras),
            self.cancel_token.clone(),
        );

        self.decision_engine.start_loop(
            &self.spawner,
            Arc::clone(&self.bus) as Arc<dyn BusEmitter>,
            self.cancel_token.clone(),
        );

        self.narration.start_loop(
            &self.spawner,
            Arc::clone(&self.bus) as Arc<dyn BusEmitter>,
            self.bus.subscribe(),
            self.cancel_token.clone(),
        );

        self.spawn_score_forwarder();
        self.spawn_lifecycle_reconciler();
    }

    /// Bridges the bus's own `Score` events into the decision engine's score
    /// board, so the decision engine never has to depend on the ranker
    /// directly - it only ever reads what has actually gone out over the bus.
    fn spawn_score_forwarder(&self) {
        let mut rx = self.bus.subscribe();
        let decision_engine = Arc::clone(&self.decision_engine);
        let cancel_token = self.cancel_token.clone();
        self.spawner.spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => break,
                    event = rx.recv() => match event {
                        Ok(BusEvent::Score(score)) => decision_engine.record_score(&score),
                        Ok(_) => {}
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                            log::warn!("score forwarder lagged, skipped {skipped} bus events");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        });
    }

    /// Keeps the sampler's tracked-camera set and `known_cameras` (read by the
    /// ranker) in sync with the ingress adapter's join/leave notifications.
    fn spawn_lifecycle_reconciler(&self) {
        let Some(mut rx) = self.ingress.take_lifecycle_receiver() else {
            log::warn!("lifecycle receiver already taken, skipping reconciler");
            return;
        };
        let sampler = Arc::clone(&self.sampler);
        let known_cameras = Arc::clone(&self.known_cameras);
        let cancel_token = self.cancel_token.clone();
        self.spawner.spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => break,
                    event = rx.recv() => match event {
                        Some(CameraLifecycleEvent::Joined { cam_id }) => {
                            sampler.track_camera(cam_id.clone());
                            let mut known = known_cameras.write();
                            if !known.contains(&cam_id) {
                                known.push(cam_id);
                            }
                        }
                        Some(CameraLifecycleEvent::Left { cam_id }) => {
                            sampler.untrack_camera(&cam_id);
                            known_cameras.write().retain(|c| c != &cam_id);
                        }
                        Some(CameraLifecycleEvent::Degraded { .. }) => {}
                        None => break,
                    }
                }
            }
        });
    }

    /// Initiates graceful shutdown of all services.
    pub async fn shutdown(&self) {
        log::info!("beginning graceful shutdown");
        self.cancel_token.cancel();
        log::info!("shutdown complete");
    }
}

/// Bootstraps all application services with their dependencies.
///
/// This is the composition root where all services are instantiated and
/// wired together. The wiring order matters - services are created in
/// dependency order:
///
/// 1. Observation cache (no dependencies)
/// 2. Media ingress adapter (depends on the room, joins it)
/// 3. Analyzer registry + sampler (depends on ingress, cache)
/// 4. Program camera tracker (no dependencies)
/// 5. Event bus (no dependencies)
/// 6. Ranker (depends on cache, program tracker)
/// 7. Decision engine (depends on program tracker, a speech boundary source
///    backed by the cache)
/// 8. Narration orchestrator (depends on a TTS backend, a feature source
///    backed by the bus)
///
/// # Errors
///
/// Returns an error if `config` fails validation or the media room refuses
/// to be joined.
pub async fn bootstrap(
    room: Arc<dyn MediaRoom>,
    config: Config,
    tts_backend: Arc<dyn TtsBackend>,
    keywords: Vec<String>,
) -> DirectorResult<BootstrappedServices> {
    config.validate().map_err(DirectorError::Configuration)?;

    let cache = Arc::new(ObservationCache::new());

    let ingress = MediaIngressAdapter::new(room, config.analysis_rate_hz);
    ingress.start().await?;

    let analyzers = Arc::new(AnalyzerRegistry::reference(keywords));
    let sampler = Sampler::new(
        Arc::clone(&ingress),
        analyzers,
        Arc::clone(&cache),
        config.analysis_rate_hz,
    );

    let program_tracker = ProgramCamTracker::new();
    let bus = Arc::new(BroadcastBusBridge::new(config.event_channel_capacity));

    let ranker = Ranker::new(
        Arc::clone(&cache),
        Arc::clone(&program_tracker),
        config.weights,
        config.novelty_tau_sec,
        config.keyword_k,
        config.ranking_rate_hz,
    );

    let speech_boundary = ObservationSpeechBoundary::new(Arc::clone(&cache));
    let decision_engine = DecisionEngine::new(
        config.switch_policy,
        config.staleness_window_sec,
        Arc::clone(&program_tracker),
        speech_boundary,
        config.decision_rate_hz,
    );

    let feature_cache = Arc::new(BusFeatureCache::default());
    let narration = NarrationOrchestrator::new(
        tts_backend,
        Arc::clone(&feature_cache) as Arc<dyn FeatureSource>,
        config.max_tts_latency_ms,
        config.max_narration_words,
    );

    Ok(BootstrappedServices {
        cache,
        ingress,
        sampler,
        program_tracker,
        ranker,
        decision_engine,
        narration,
        bus,
        known_cameras: Arc::new(RwLock::new(Vec::new())),
        config,
        spawner: TokioSpawner::current(),
        cancel_token: CancellationToken::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingress::MockMediaRoom;
    use crate::services::SilentToneBackend;

    #[tokio::test]
    async fn bootstrap_wires_services_with_no_known_cameras() {
        let room = MockMediaRoom::new();
        let services = bootstrap(
            room,
            Config::default(),
            Arc::new(SilentToneBackend),
            vec!["goal".to_string()],
        )
        .await
        .unwrap();

        assert!(services.known_cameras.read().is_empty());
        assert!(services.program_tracker.current_cam().is_none());
    }

    #[tokio::test]
    async fn bootstrap_rejects_invalid_config() {
        let room = MockMediaRoom::new();
        let mut config = Config::default();
        config.analysis_rate_hz = -1.0;

        let result = bootstrap(
            room,
            config,
            Arc::new(SilentToneBackend),
            vec!["goal".to_string()],
        )
        .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn start_spawns_loops_and_shutdown_cancels_them() {
        let room = MockMediaRoom::new();
        let services = bootstrap(
            room,
            Config::default(),
            Arc::new(SilentToneBackend),
            vec!["goal".to_string()],
        )
        .await
        .unwrap();

        services.start();
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        services.shutdown().await;
        assert!(services.cancel_token.is_cancelled());
    }
}
