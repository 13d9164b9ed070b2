//! Tracker capability: `update(camId, detections, frameMeta) -> [Track]`.
//!
//! Maintains one tracker instance per camId; tracks survive across frames of
//! the same cam only.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::model::{BBox, CameraId, Detection, Track, Velocity};

const MAIN_SUBJECT_LOOKBACK_TICKS: u32 = 30;
const MATCH_DISTANCE_THRESHOLD: f32 = 0.25;

#[async_trait::async_trait]
pub trait Tracker: Send + Sync {
    async fn update(&self, cam_id: &CameraId, detections: &[Detection]) -> Vec<Track>;

    /// The longest-lived track whose bbox centroid is nearest the frame
    /// center over the last `N=30` ticks, ties broken by bbox area.
    async fn main_subject(&self, cam_id: &CameraId) -> Option<u32>;
}

#[derive(Debug, Clone)]
struct TrackState {
    track_id: u32,
    bbox: BBox,
    class: String,
    age: u32,
    last_seen_tick: u64,
    center_distance_history: Vec<f32>,
}

/// Greedy nearest-centroid tracker: at each `update`, unmatched detections
/// spawn new tracks; existing tracks are matched to the nearest detection of
/// the same class within [`MATCH_DISTANCE_THRESHOLD`], else they age out.
pub struct CentroidTracker {
    state: Mutex<HashMap<CameraId, CamTrackState>>,
}

#[derive(Default)]
struct CamTrackState {
    tracks: HashMap<u32, TrackState>,
    next_id: u32,
    tick: u64,
}

impl Default for CentroidTracker {
    fn default() -> Self {
        Self {
            state: Mutex::new(HashMap::new()),
        }
    }
}

impl CentroidTracker {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl Tracker for CentroidTracker {
    async fn update(&self, cam_id: &CameraId, detections: &[Detection]) -> Vec<Track> {
        let mut guard = self.state.lock();
        let cam_state = guard.entry(cam_id.clone()).or_default();
        cam_state.tick += 1;
        let tick = cam_state.tick;

        let mut matched_track_ids = Vec::new();
        let mut remaining_detections: Vec<&Detection> = detections.iter().collect();

        let existing_ids: Vec<u32> = cam_state.tracks.keys().copied().collect();
        for track_id in existing_ids {
            let track_centroid = cam_state.tracks[&track_id].bbox.centroid();
            let track_class = cam_state.tracks[&track_id].class.clone();

            let mut best: Option<(usize, f32)> = None;
            for (idx, det) in remaining_detections.iter().enumerate() {
                if det.class != track_class {
                    continue;
                }
                let det_centroid = det.centroid.unwrap_or_else(|| det.bbox.centroid());
                let dist = distance(track_centroid, det_centroid);
                if dist <= MATCH_DISTANCE_THRESHOLD && best.map(|(_, d)| dist < d).unwrap_or(true) {
                    best = Some((idx, dist));
                }
            }

            if let Some((idx, _)) = best {
                let det = remaining_detections.remove(idx);
                let track = cam_state.tracks.get_mut(&track_id).unwrap();
                let velocity = Velocity {
                    dx: det.bbox.centroid().0 - track.bbox.centroid().0,
                    dy: det.bbox.centroid().1 - track.bbox.centroid().1,
                };
                track.bbox = det.bbox;
                track.age += 1;
                track.last_seen_tick = tick;
                track
                    .center_distance_history
                    .push(center_distance(track.bbox));
                if track.center_distance_history.len() > MAIN_SUBJECT_LOOKBACK_TICKS as usize {
                    track.center_distance_history.remove(0);
                }
                matched_track_ids.push((track_id, Some(velocity)));
            }
        }

        for det in remaining_detections {
            let track_id = cam_state.next_id;
            cam_state.next_id += 1;
            cam_state.tracks.insert(
                track_id,
                TrackState {
                    track_id,
                    bbox: det.bbox,
                    class: det.class.clone(),
                    age: 1,
                    last_seen_tick: tick,
                    center_distance_history: vec![center_distance(det.bbox)],
                },
            );
            matched_track_ids.push((track_id, None));
        }

        // Drop tracks not seen this tick.
        cam_state.tracks.retain(|_, t| t.last_seen_tick == tick);

        matched_track_ids
            .into_iter()
            .filter_map(|(id, velocity)| {
                cam_state.tracks.get(&id).map(|t| Track {
                    track_id: t.track_id,
                    bbox: t.bbox,
                    age: t.age,
                    score: (t.age as f32 / MAIN_SUBJECT_LOOKBACK_TICKS as f32).min(1.0),
                    velocity,
                    class: t.class.clone(),
                })
            })
            .collect()
    }

    async fn main_subject(&self, cam_id: &CameraId) -> Option<u32> {
        let guard = self.state.lock();
        let cam_state = guard.get(cam_id)?;

        cam_state
            .tracks
            .values()
            .max_by(|a, b| {
                let a_key = (a.age, std::cmp::Reverse(score_bits(latest_distance(a))), ordered_area(a));
                let b_key = (b.age, std::cmp::Reverse(score_bits(latest_distance(b))), ordered_area(b));
                a_key.cmp(&b_key)
            })
            .map(|t| t.track_id)
    }
}

fn latest_distance(track: &TrackState) -> f32 {
    *track.center_distance_history.last().unwrap_or(&1.0)
}

fn score_bits(distance: f32) -> u32 {
    // Smaller distance should sort as "greater" priority; invert into an
    // orderable integer since f32 has no total order.
    ((1.0 - distance).clamp(0.0, 1.0) * 1_000_000.0) as u32
}

fn ordered_area(track: &TrackState) -> u32 {
    (track.bbox.area().clamp(0.0, 1.0) * 1_000_000.0) as u32
}

fn center_distance(bbox: BBox) -> f32 {
    let (cx, cy) = bbox.centroid();
    (((cx - 0.5).powi(2) + (cy - 0.5).powi(2)).sqrt()).min(1.0)
}

fn distance(a: (f32, f32), b: (f32, f32)) -> f32 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}
