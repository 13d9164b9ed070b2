//! Shared, lock-guarded snapshot of "which camera is program, and since when"
//! — written once per SWITCH by the decision engine, read by the ranker for
//! novelty decay and main-subject tie-breaking.
//!
//! This is the snapshot API the concurrency model calls for: `ProgramState`
//! itself stays exclusively owned by the decision engine; other components
//! only ever see this deep-copyable projection of it.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::model::CameraId;

#[derive(Debug, Default, Clone)]
struct Inner {
    current_cam: Option<CameraId>,
    last_active_ts: HashMap<CameraId, f64>,
}

#[derive(Default)]
pub struct ProgramCamTracker {
    inner: RwLock<Inner>,
}

impl ProgramCamTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_switch(&self, cam_id: CameraId, ts: f64) {
        let mut inner = self.inner.write();
        inner.last_active_ts.insert(cam_id.clone(), ts);
        inner.current_cam = Some(cam_id);
    }

    pub fn current_cam(&self) -> Option<CameraId> {
        self.inner.read().current_cam.clone()
    }

    /// Seconds since `cam_id` was last program, or `None` if it has never
    /// been selected (the ranker treats that as `noveltyDecay = 1`).
    pub fn seconds_since_active(&self, cam_id: &CameraId, now: f64) -> Option<f64> {
        self.inner
            .read()
            .last_active_ts
            .get(cam_id)
            .map(|ts| (now - ts).max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unswitched_camera_has_no_recorded_activity() {
        let tracker = ProgramCamTracker::default();
        assert_eq!(tracker.current_cam(), None);
        assert_eq!(tracker.seconds_since_active(&CameraId::new("a"), 10.0), None);
    }

    #[test]
    fn record_switch_updates_current_cam_and_history() {
        let tracker = ProgramCamTracker::default();
        tracker.record_switch(CameraId::new("a"), 1.0);
        assert_eq!(tracker.current_cam(), Some(CameraId::new("a")));

        tracker.record_switch(CameraId::new("b"), 5.0);
        assert_eq!(tracker.current_cam(), Some(CameraId::new("b")));
        assert_eq!(
            tracker.seconds_since_active(&CameraId::new("a"), 10.0),
            Some(9.0)
        );
    }
}
