//! C1 dispatcher / worker pool: ticks at `analysisRate`, obtains the latest
//! frame and audio window per live camera, and dispatches analyzer calls
//! against deadlines, writing results into the [`ObservationCache`].
//!
//! The scene describer runs at its own, coarser cadence (`sceneDescribeInterval`)
//! rather than every tick, since it is the most expensive analyzer (SS4.2).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::analyzers::AnalyzerRegistry;
use crate::director_constants::DEFAULT_SCENE_DESCRIBE_INTERVAL_MS;
use crate::ingress::MediaIngressAdapter;
use crate::model::CameraId;
use crate::runtime::TaskSpawner;
use crate::utils::now_seconds;

use super::observation_cache::ObservationCache;

const AUDIO_WINDOW_SEC: f64 = 1.0;

/// Drives one tick of analyzer dispatch across every camera the ingress
/// adapter currently knows about.
pub struct Sampler {
    ingress: Arc<MediaIngressAdapter>,
    analyzers: Arc<AnalyzerRegistry>,
    cache: Arc<ObservationCache>,
    analysis_rate_hz: f64,
    scene_describe_interval_ms: u64,
    last_scene_ts: Mutex<HashMap<CameraId, f64>>,
    known_cameras: Mutex<Vec<CameraId>>,
}

impl Sampler {
    pub fn new(
        ingress: Arc<MediaIngressAdapter>,
        analyzers: Arc<AnalyzerRegistry>,
        cache: Arc<ObservationCache>,
        analysis_rate_hz: f64,
    ) -> Arc<Self> {
        Arc::new(Self {
            ingress,
            analyzers,
            cache,
            analysis_rate_hz,
            scene_describe_interval_ms: DEFAULT_SCENE_DESCRIBE_INTERVAL_MS,
            last_scene_ts: Mutex::new(HashMap::new()),
            known_cameras: Mutex::new(Vec::new()),
        })
    }

    pub fn track_camera(&self, cam_id: CameraId) {
        let mut known = self.known_cameras.lock();
        if !known.contains(&cam_id) {
            known.push(cam_id);
        }
    }

    pub fn untrack_camera(&self, cam_id: &CameraId) {
        self.known_cameras.lock().retain(|c| c != cam_id);
        self.cache.remove(cam_id);
        self.last_scene_ts.lock().remove(cam_id);
    }

    pub fn start_loop<S: TaskSpawner>(self: &Arc<Self>, spawner: &S, cancel_token: CancellationToken) {
        let sampler = Arc::clone(self);
        spawner.spawn(async move {
            sampler.run_loop(cancel_token).await;
        });
    }

    async fn run_loop(self: Arc<Self>, cancel_token: CancellationToken) {
        let period = Duration::from_secs_f64(1.0 / self.analysis_rate_hz.max(0.001));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    log::info!("sampler loop cancelled");
                    break;
                }
                _ = interval.tick() => {
                    self.tick().await;
                }
            }
        }
    }

    async fn tick(&self) {
        let cams: Vec<CameraId> = self.known_cameras.lock().clone();
        let now = now_seconds();
        for cam_id in cams {
            self.sample_camera(&cam_id, now).await;
        }
    }

    async fn sample_camera(&self, cam_id: &CameraId, now: f64) {
        self.cache
            .set_degraded(cam_id, self.ingress.is_degraded(cam_id));

        if let Some(frame) = self.ingress.sample(cam_id, now).await {
            self.cache.record_frame_seen(cam_id, frame.ts);

            let deadline = Duration::from_millis(self.analyzers.detector.deadline_ms());
            match tokio::time::timeout(deadline, self.analyzers.detector.detect(&frame)).await {
                Ok(Ok(detections)) => {
                    self.cache.record_detections(cam_id, detections.clone(), frame.ts);

                    let tracks = self.analyzers.tracker.update(cam_id, &detections).await;
                    let main_subject = self.analyzers.tracker.main_subject(cam_id).await;
                    self.cache
                        .record_tracks(cam_id, tracks, main_subject, frame.ts);

                    self.maybe_describe_scene(cam_id, &frame, &detections, frame.ts)
                        .await;
                }
                _ => {
                    self.cache.record_detections_unavailable(cam_id);
                }
            }
        }

        if let Some(chunk) = self.ingress.audio_window(cam_id, AUDIO_WINDOW_SEC).await {
            let deadline = Duration::from_millis(self.analyzers.speech_recognizer.deadline_ms());
            if let Ok(Ok(segments)) =
                tokio::time::timeout(deadline, self.analyzers.speech_recognizer.transcribe(&chunk))
                    .await
            {
                if let Some(segment) = segments.into_iter().next() {
                    self.cache.record_speech(cam_id, segment, chunk.end_ts);
                }
            }
        }
    }

    async fn maybe_describe_scene(
        &self,
        cam_id: &CameraId,
        frame: &crate::ingress::Frame,
        detections: &[crate::model::Detection],
        now: f64,
    ) {
        let due = {
            let last = self.last_scene_ts.lock();
            let last_ts = last.get(cam_id).copied().unwrap_or(f64::NEG_INFINITY);
            (now - last_ts) * 1000.0 >= self.scene_describe_interval_ms as f64
        };
        if !due {
            return;
        }

        let deadline = Duration::from_millis(self.analyzers.scene_describer.deadline_ms());
        if let Ok(Ok(scene)) = tokio::time::timeout(
            deadline,
            self.analyzers.scene_describer.describe(frame, detections),
        )
        .await
        {
            self.cache.record_scene(cam_id, scene, now);
            self.last_scene_ts.lock().insert(cam_id.clone(), now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingress::{AudioChunk, Frame, MockMediaRoom};

    fn registry() -> Arc<AnalyzerRegistry> {
        Arc::new(AnalyzerRegistry::reference(vec!["goal".to_string()]))
    }

    #[tokio::test]
    async fn sample_camera_populates_detections_and_tracks() {
        let room = MockMediaRoom::new();
        let cam = CameraId::new("cam-1");
        room.join(cam.clone());
        room.push_frame(Frame {
            cam_id: cam.clone(),
            ts: 1.0,
            width: 8,
            height: 8,
            rgb: {
                let mut data = vec![0u8; 8 * 8 * 3];
                for i in 0..3 {
                    data[i] = 255;
                }
                data
            },
        });

        let ingress = MediaIngressAdapter::new(room, 10.0);
        let cache = Arc::new(ObservationCache::new());
        let sampler = Sampler::new(ingress, registry(), cache.clone(), 10.0);
        sampler.track_camera(cam.clone());

        sampler.sample_camera(&cam, 1.0).await;

        let snapshot = cache.snapshot(&cam);
        assert!(snapshot.last_frame_ts.is_some());
    }

    #[tokio::test]
    async fn sample_camera_transcribes_loud_audio() {
        let room = MockMediaRoom::new();
        let cam = CameraId::new("cam-1");
        room.join(cam.clone());
        room.push_audio(AudioChunk {
            cam_id: cam.clone(),
            start_ts: 0.0,
            end_ts: 1.0,
            sample_rate: 16_000,
            samples: vec![i16::MAX / 2; 100],
        });

        let ingress = MediaIngressAdapter::new(room, 10.0);
        let cache = Arc::new(ObservationCache::new());
        let sampler = Sampler::new(ingress, registry(), cache.clone(), 10.0);
        sampler.track_camera(cam.clone());

        sampler.sample_camera(&cam, 1.0).await;

        let snapshot = cache.snapshot(&cam);
        assert!(snapshot.speech.is_available());
    }

    #[tokio::test]
    async fn untrack_camera_clears_cached_state() {
        let room = MockMediaRoom::new();
        let cam = CameraId::new("cam-1");
        let ingress = MediaIngressAdapter::new(room, 10.0);
        let cache = Arc::new(ObservationCache::new());
        let sampler = Sampler::new(ingress, registry(), cache.clone(), 10.0);

        sampler.track_camera(cam.clone());
        cache.record_frame_seen(&cam, 1.0);
        sampler.untrack_camera(&cam);

        assert!(cache.snapshot(&cam).last_frame_ts.is_none());
    }
}
