//! C1: samples the [`MediaRoom`] at a fixed rate and maintains per-camera
//! join/leave/degraded state.
//!
//! The tick-with-cancellation loop follows this codebase's periodic monitor
//! pattern: a `CancellationToken` plus a `tokio::time::interval`, selected
//! together so the task exits promptly on shutdown instead of waiting out a
//! whole tick period.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use super::{AudioChunk, CameraLifecycleEvent, Frame, MediaRoom};
use crate::error::{DirectorError, DirectorResult};
use crate::runtime::TaskSpawner;

const MAX_CONSECUTIVE_FAILURES: u32 = 5;
const BACKOFF_CAP_SEC: f64 = 30.0;
const BACKOFF_BASE_SEC: f64 = 0.5;

#[derive(Debug, Clone, Default)]
struct CameraIngressState {
    consecutive_failures: u32,
    degraded: bool,
    next_retry_ts: f64,
}

/// Owns the [`MediaRoom`] session and polls it at `analysisRate` Hz,
/// publishing lifecycle events and exposing the latest sample per camera to
/// the sampler task.
pub struct MediaIngressAdapter {
    room: Arc<dyn MediaRoom>,
    analysis_rate_hz: f64,
    camera_state: DashMap<crate::model::CameraId, CameraIngressState>,
    known_cameras: parking_lot::RwLock<Vec<crate::model::CameraId>>,
    lifecycle_tx: tokio::sync::mpsc::UnboundedSender<CameraLifecycleEvent>,
    lifecycle_rx: parking_lot::Mutex<Option<tokio::sync::mpsc::UnboundedReceiver<CameraLifecycleEvent>>>,
}

impl MediaIngressAdapter {
    pub fn new(room: Arc<dyn MediaRoom>, analysis_rate_hz: f64) -> Arc<Self> {
        let (lifecycle_tx, lifecycle_rx) = tokio::sync::mpsc::unbounded_channel();
        Arc::new(Self {
            room,
            analysis_rate_hz,
            camera_state: DashMap::new(),
            known_cameras: parking_lot::RwLock::new(Vec::new()),
            lifecycle_tx,
            lifecycle_rx: parking_lot::Mutex::new(Some(lifecycle_rx)),
        })
    }

    /// Takes ownership of the lifecycle event receiver; may only be called once.
    pub fn take_lifecycle_receiver(
        &self,
    ) -> Option<tokio::sync::mpsc::UnboundedReceiver<CameraLifecycleEvent>> {
        self.lifecycle_rx.lock().take()
    }

    pub async fn start(&self) -> DirectorResult<()> {
        self.room
            .start()
            .await
            .map_err(|_| DirectorError::Ingress("media room refused subscribe-only grant".into()))
    }

    /// Spawns the sampling loop via `spawner`, running until `cancel_token`
    /// is cancelled.
    pub fn start_sampling_loop<S: TaskSpawner>(
        self: &Arc<Self>,
        spawner: &S,
        cancel_token: CancellationToken,
    ) {
        let adapter = Arc::clone(self);
        spawner.spawn(async move {
            adapter.run_sampling_loop(cancel_token).await;
        });
    }

    async fn run_sampling_loop(self: Arc<Self>, cancel_token: CancellationToken) {
        let period = Duration::from_secs_f64(1.0 / self.analysis_rate_hz.max(0.001));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    log::info!("ingress sampling loop cancelled");
                    break;
                }
                _ = interval.tick() => {
                    self.reconcile_camera_lifecycle().await;
                }
            }
        }
    }

    async fn reconcile_camera_lifecycle(&self) {
        let active = self.room.active_cameras().await;
        let mut known = self.known_cameras.write();

        for cam in &active {
            if !known.contains(cam) {
                known.push(cam.clone());
                let _ = self
                    .lifecycle_tx
                    .send(CameraLifecycleEvent::Joined { cam_id: cam.clone() });
            }
        }
        let left: Vec<_> = known.iter().filter(|c| !active.contains(c)).cloned().collect();
        known.retain(|c| active.contains(c));
        drop(known);

        for cam in left {
            self.camera_state.remove(&cam);
            let _ = self
                .lifecycle_tx
                .send(CameraLifecycleEvent::Left { cam_id: cam });
        }
    }

    /// Samples the newest frame for `cam_id`, tracking consecutive-failure
    /// backoff and emitting a `Degraded` lifecycle event after
    /// [`MAX_CONSECUTIVE_FAILURES`] misses in a row.
    pub async fn sample(&self, cam_id: &crate::model::CameraId, now: f64) -> Option<Frame> {
        if self.is_backed_off(cam_id, now) {
            return None;
        }

        match self.room.sample(cam_id).await {
            Some(frame) => {
                self.record_success(cam_id);
                Some(frame)
            }
            None => {
                self.record_failure(cam_id, now);
                None
            }
        }
    }

    pub async fn audio_window(
        &self,
        cam_id: &crate::model::CameraId,
        window_sec: f64,
    ) -> Option<AudioChunk> {
        self.room.audio_window(cam_id, window_sec).await
    }

    pub fn is_degraded(&self, cam_id: &crate::model::CameraId) -> bool {
        self.camera_state
            .get(cam_id)
            .map(|s| s.degraded)
            .unwrap_or(false)
    }

    fn is_backed_off(&self, cam_id: &crate::model::CameraId, now: f64) -> bool {
        self.camera_state
            .get(cam_id)
            .map(|s| now < s.next_retry_ts)
            .unwrap_or(false)
    }

    fn record_success(&self, cam_id: &crate::model::CameraId) {
        self.camera_state.remove(cam_id);
    }

    fn record_failure(&self, cam_id: &crate::model::CameraId, now: f64) {
        let mut entry = self.camera_state.entry(cam_id.clone()).or_default();
        entry.consecutive_failures += 1;
        let backoff = (BACKOFF_BASE_SEC * 2f64.powi(entry.consecutive_failures as i32 - 1))
            .min(BACKOFF_CAP_SEC);
        entry.next_retry_ts = now + backoff;
        if entry.consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
            entry.degraded = true;
            let _ = self.lifecycle_tx.send(CameraLifecycleEvent::Degraded {
                cam_id: cam_id.clone(),
            });
        }
    }
}

/// Snapshot of per-camera degraded flags, surfaced to the ranker so a
/// degraded camera's score is forced to 0 rather than silently stale.
pub fn degraded_snapshot(
    adapter: &MediaIngressAdapter,
    cams: &[crate::model::CameraId],
) -> HashMap<crate::model::CameraId, bool> {
    cams.iter()
        .map(|c| (c.clone(), adapter.is_degraded(c)))
        .collect()
}
