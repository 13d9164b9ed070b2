//! The shared map `camId -> latest observations`, written by analyzer
//! workers and read by the ranker.
//!
//! Backed by `dashmap`, a per-key concurrent map, so readers and writers
//! never block each other across different cameras.

use dashmap::DashMap;

use crate::model::{CameraId, Detection, Observation, SceneDescription, SpeechSegment, Track};

/// One camera's most recent output from each analyzer, each independently
/// timestamped so the ranker can judge staleness per modality.
#[derive(Debug, Clone, Default)]
pub struct CameraObservations {
    pub detections: Observation<Vec<Detection>>,
    pub detections_ts: f64,
    pub tracks: Observation<Vec<Track>>,
    pub tracks_ts: f64,
    pub main_subject_track_id: Option<u32>,
    pub scene: Observation<SceneDescription>,
    pub scene_ts: f64,
    pub speech: Observation<SpeechSegment>,
    pub speech_ts: f64,
    pub last_frame_ts: Option<f64>,
    pub degraded: bool,
}

impl Default for Observation<Vec<Detection>> {
    fn default() -> Self {
        Observation::Unavailable
    }
}

impl Default for Observation<Vec<Track>> {
    fn default() -> Self {
        Observation::Unavailable
    }
}

impl Default for Observation<SceneDescription> {
    fn default() -> Self {
        Observation::Unavailable
    }
}

impl Default for Observation<SpeechSegment> {
    fn default() -> Self {
        Observation::Unavailable
    }
}

/// Concurrent per-camera observation store.
#[derive(Default)]
pub struct ObservationCache {
    cams: DashMap<CameraId, CameraObservations>,
}

impl ObservationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_frame_seen(&self, cam_id: &CameraId, ts: f64) {
        self.cams.entry(cam_id.clone()).or_default().last_frame_ts = Some(ts);
    }

    pub fn record_detections(&self, cam_id: &CameraId, detections: Vec<Detection>, ts: f64) {
        let mut entry = self.cams.entry(cam_id.clone()).or_default();
        entry.detections = Observation::Present(detections);
        entry.detections_ts = ts;
    }

    pub fn record_detections_unavailable(&self, cam_id: &CameraId) {
        self.cams.entry(cam_id.clone()).or_default().detections = Observation::Unavailable;
    }

    pub fn record_tracks(
        &self,
        cam_id: &CameraId,
        tracks: Vec<Track>,
        main_subject_track_id: Option<u32>,
        ts: f64,
    ) {
        let mut entry = self.cams.entry(cam_id.clone()).or_default();
        entry.tracks = Observation::Present(tracks);
        entry.tracks_ts = ts;
        entry.main_subject_track_id = main_subject_track_id;
    }

    pub fn record_scene(&self, cam_id: &CameraId, scene: SceneDescription, ts: f64) {
        let mut entry = self.cams.entry(cam_id.clone()).or_default();
        entry.scene = Observation::Present(scene);
        entry.scene_ts = ts;
    }

    pub fn record_speech(&self, cam_id: &CameraId, speech: SpeechSegment, ts: f64) {
        let mut entry = self.cams.entry(cam_id.clone()).or_default();
        entry.speech = Observation::Present(speech);
        entry.speech_ts = ts;
    }

    pub fn set_degraded(&self, cam_id: &CameraId, degraded: bool) {
        self.cams.entry(cam_id.clone()).or_default().degraded = degraded;
    }

    /// Returns a cloned snapshot for `cam_id`, or a fresh all-`Unavailable`
    /// record if the camera has never reported anything.
    pub fn snapshot(&self, cam_id: &CameraId) -> CameraObservations {
        self.cams
            .get(cam_id)
            .map(|r| r.value().clone())
            .unwrap_or_default()
    }

    pub fn remove(&self, cam_id: &CameraId) {
        self.cams.remove(cam_id);
    }

    pub fn known_cameras(&self) -> Vec<CameraId> {
        self.cams.iter().map(|r| r.key().clone()).collect()
    }
}
