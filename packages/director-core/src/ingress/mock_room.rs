//! Deterministic in-memory [`MediaRoom`] for tests and local development
//! without a real SFU.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;

use super::{AudioChunk, Frame, MediaRoom};
use crate::error::DirectorResult;
use crate::model::CameraId;

/// Feeds frames/audio pushed onto it from a fixture, serving them back
/// exactly once per [`MediaRoom::sample`]/[`MediaRoom::audio_window`] call
/// (newer-than-last-sample semantics), never blocking.
#[derive(Default)]
pub struct MockMediaRoom {
    cameras: RwLock<Vec<CameraId>>,
    latest_frame: DashMap<CameraId, Frame>,
    delivered_frame_ts: DashMap<CameraId, f64>,
    latest_audio: DashMap<CameraId, AudioChunk>,
}

impl MockMediaRoom {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers a camera as joined, making it visible to `active_cameras`.
    pub fn join(&self, cam_id: CameraId) {
        let mut cameras = self.cameras.write();
        if !cameras.contains(&cam_id) {
            cameras.push(cam_id);
        }
    }

    pub fn leave(&self, cam_id: &CameraId) {
        self.cameras.write().retain(|c| c != cam_id);
        self.latest_frame.remove(cam_id);
        self.delivered_frame_ts.remove(cam_id);
        self.latest_audio.remove(cam_id);
    }

    /// Pushes a new frame as the most recent sample available for its camera.
    pub fn push_frame(&self, frame: Frame) {
        self.latest_frame.insert(frame.cam_id.clone(), frame);
    }

    pub fn push_audio(&self, chunk: AudioChunk) {
        self.latest_audio.insert(chunk.cam_id.clone(), chunk);
    }
}

#[async_trait::async_trait]
impl MediaRoom for MockMediaRoom {
    async fn start(&self) -> DirectorResult<()> {
        Ok(())
    }

    async fn active_cameras(&self) -> Vec<CameraId> {
        self.cameras.read().clone()
    }

    async fn sample(&self, cam_id: &CameraId) -> Option<Frame> {
        let frame = self.latest_frame.get(cam_id)?.clone();
        let already_delivered = self
            .delivered_frame_ts
            .get(cam_id)
            .map(|ts| *ts >= frame.ts)
            .unwrap_or(false);
        if already_delivered {
            return None;
        }
        self.delivered_frame_ts.insert(cam_id.clone(), frame.ts);
        Some(frame)
    }

    async fn audio_window(&self, cam_id: &CameraId, _window_sec: f64) -> Option<AudioChunk> {
        self.latest_audio.get(cam_id).map(|r| r.clone())
    }
}
