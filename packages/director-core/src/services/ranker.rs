//! C3: at a fixed tick rate, fuses each camera's observations into one
//! `CameraScore` and publishes it on the bus.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::bus::BusEmitter;
use crate::director_constants::{
    CONTINUITY_SATURATION_FRAMES, HOTTEST_SUBJECT_WINDOW_SEC, INTEREST_DECAY_WINDOW_SEC,
    MAX_RATIONALE_LEN, MOTION_MIN_TRACK_AGE,
};
use crate::model::{CameraFeatures, CameraId, CameraScore};
use crate::runtime::TaskSpawner;
use crate::state::WeightConfig;
use crate::utils::{clamp_unit, exp_decay, linear_decay, normalize_db, now_seconds, truncate_str};

use super::observation_cache::{CameraObservations, ObservationCache};
use super::program_cam_tracker::ProgramCamTracker;

const V_MAX: f32 = 1.0;
const SPEECH_FLOOR_DBFS: f32 = -60.0;
const SPEECH_CEILING_DBFS: f32 = -10.0;

/// Fuses observations into scores. Holds no per-camera mutable state beyond
/// what it needs to compute `mainSubjectOverlap` across cameras for one tick.
pub struct Ranker {
    cache: Arc<ObservationCache>,
    program_tracker: Arc<ProgramCamTracker>,
    weights: WeightConfig,
    novelty_tau_sec: f64,
    keyword_k: f32,
    ranking_rate_hz: f64,
}

impl Ranker {
    pub fn new(
        cache: Arc<ObservationCache>,
        program_tracker: Arc<ProgramCamTracker>,
        weights: WeightConfig,
        novelty_tau_sec: f64,
        keyword_k: f32,
        ranking_rate_hz: f64,
    ) -> Arc<Self> {
        Arc::new(Self {
            cache,
            program_tracker,
            weights,
            novelty_tau_sec,
            keyword_k,
            ranking_rate_hz,
        })
    }

    pub fn start_loop<S: TaskSpawner>(
        self: &Arc<Self>,
        spawner: &S,
        emitter: Arc<dyn BusEmitter>,
        cams: Arc<parking_lot::RwLock<Vec<CameraId>>>,
        cancel_token: CancellationToken,
    ) {
        let ranker = Arc::clone(self);
        spawner.spawn(async move {
            ranker.run_loop(emitter, cams, cancel_token).await;
        });
    }

    async fn run_loop(
        self: Arc<Self>,
        emitter: Arc<dyn BusEmitter>,
        cams: Arc<parking_lot::RwLock<Vec<CameraId>>>,
        cancel_token: CancellationToken,
    ) {
        let period = Duration::from_secs_f64(1.0 / self.ranking_rate_hz.max(0.001));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    log::info!("ranker loop cancelled");
                    break;
                }
                _ = interval.tick() => {
                    let live_cams = cams.read().clone();
                    let now = now_seconds();
                    for score in self.tick(&live_cams, now) {
                        emitter.emit_score(score);
                    }
                }
            }
        }
    }

    /// Computes and returns one `CameraScore` per camera in `cams`. Pure
    /// given the cache and program tracker's current contents, so it is
    /// exercised directly (without the loop) by unit tests.
    pub fn tick(&self, cams: &[CameraId], now: f64) -> Vec<CameraScore> {
        let hottest = self.hottest_subject(cams, now);

        cams.iter()
            .map(|cam_id| self.score_one(cam_id, now, hottest.as_ref()))
            .collect()
    }

    /// Identifies the single hottest individual subject across every camera
    /// this tick, by its own main-subject track's class and screen quadrant
    /// (used as a cheap proxy for "the same real-world subject", since tracks
    /// don't share ids across cameras).
    fn hottest_subject(&self, cams: &[CameraId], now: f64) -> Option<SubjectSignature> {
        let current = self.program_tracker.current_cam();
        let mut best: Option<(CameraId, SubjectSignature, f32)> = None;

        for cam_id in cams {
            let obs = self.cache.snapshot(cam_id);
            let fresh = (now - obs.tracks_ts) <= HOTTEST_SUBJECT_WINDOW_SEC;
            let Some((sig, activity)) = fresh.then(|| main_subject_signature(&obs)).flatten()
            else {
                continue;
            };

            let is_better = match &best {
                None => true,
                Some((best_cam, _, best_activity)) => {
                    if activity > *best_activity {
                        true
                    } else if (activity - *best_activity).abs() < f32::EPSILON {
                        // Ties resolved in favor of the current program cam.
                        current.as_ref() == Some(cam_id) && current.as_ref() != Some(best_cam)
                    } else {
                        false
                    }
                }
            };
            if is_better {
                best = Some((cam_id.clone(), sig, activity));
            }
        }
        best.map(|(_, sig, _)| sig)
    }

    fn score_one(&self, cam_id: &CameraId, now: f64, hottest: Option<&SubjectSignature>) -> CameraScore {
        let obs = self.cache.snapshot(cam_id);
        if !obs.detections.is_available()
            && !obs.tracks.is_available()
            && !obs.scene.is_available()
            && !obs.speech.is_available()
        {
            return CameraScore {
                cam_id: cam_id.clone(),
                ts: now,
                score: 0.0,
                features: CameraFeatures::default(),
                reason: "no-data".to_string(),
            };
        }

        if obs.degraded {
            return CameraScore {
                cam_id: cam_id.clone(),
                ts: now,
                score: 0.0,
                features: CameraFeatures::default(),
                reason: "degraded".to_string(),
            };
        }

        let mut terms: Vec<(&'static str, f32, f32)> = Vec::new(); // (name, weight, value)

        if let crate::model::Observation::Present(ref detections) = obs.detections {
            let face = face_salience(detections);
            terms.push(("faceSalience", self.weights.face_salience, face));
        }

        if let crate::model::Observation::Present(ref tracks) = obs.tracks {
            let motion = motion_salience(tracks);
            terms.push(("motionSalience", self.weights.motion_salience, motion));

            let continuity = continuity_bonus(tracks, obs.main_subject_track_id);
            terms.push(("continuityBonus", self.weights.continuity_bonus, continuity));

            let framing = framing_score(tracks);
            terms.push(("framingScore", self.weights.framing_score, framing));
        }

        if obs.detections.is_available() || obs.tracks.is_available() {
            let overlap = match (hottest, main_subject_signature(&obs)) {
                (Some(hot), Some((own, _))) if own == *hot => 1.0,
                _ => 0.0,
            };
            terms.push((
                "mainSubjectOverlap",
                self.weights.main_subject_overlap,
                overlap,
            ));
        }

        if let crate::model::Observation::Present(ref speech) = obs.speech {
            let fresh = (now - obs.speech_ts) <= 2.0;
            if fresh {
                let energy = normalize_db(speech.energy_db, SPEECH_FLOOR_DBFS, SPEECH_CEILING_DBFS);
                terms.push(("speechEnergy", self.weights.speech_energy, energy));

                let keyword_boost =
                    clamp_unit(speech.keywords.len() as f32 / self.keyword_k.max(1.0));
                terms.push(("keywordBoost", self.weights.keyword_boost, keyword_boost));
            }
        }

        // noveltyDecay is always computable (defaults to 1 for never-selected cams).
        let seconds_since_active = self.program_tracker.seconds_since_active(cam_id, now);
        let novelty = match seconds_since_active {
            Some(delta) => exp_decay(delta, self.novelty_tau_sec),
            None => 1.0,
        };
        terms.push(("noveltyDecay", self.weights.novelty_decay, novelty));

        if let crate::model::Observation::Present(ref scene) = obs.scene {
            let age = now - obs.scene_ts;
            let decayed = scene.normalized_interest() * linear_decay(age, INTEREST_DECAY_WINDOW_SEC);
            terms.push(("interest", self.weights.interest, decayed));
        }

        let total_weight: f32 = terms.iter().map(|(_, w, _)| w).sum();
        let score = if total_weight <= 0.0 {
            0.0
        } else {
            terms.iter().map(|(_, w, v)| w * v).sum::<f32>() / total_weight
        };

        let features = build_features(&terms, &obs);
        let reason = rationale(&terms);

        CameraScore {
            cam_id: cam_id.clone(),
            ts: now,
            score: clamp_unit(score),
            features,
            reason,
        }
    }
}

fn face_salience(detections: &[crate::model::Detection]) -> f32 {
    const FRAME_AREA: f32 = 1.0; // bbox coordinates are already frame-normalized.
    let sum: f32 = detections
        .iter()
        .filter(|d| d.class == "person" || d.class == "face" || d.class == "motion")
        .map(|d| (d.bbox.area() / FRAME_AREA) * d.confidence)
        .sum();
    clamp_unit(sum)
}

fn motion_salience(tracks: &[crate::model::Track]) -> f32 {
    let eligible: Vec<f32> = tracks
        .iter()
        .filter(|t| t.age >= MOTION_MIN_TRACK_AGE)
        .map(|t| t.velocity.map(|v| v.magnitude()).unwrap_or(0.0))
        .map(|mag| clamp_unit(mag / V_MAX))
        .collect();
    if eligible.is_empty() {
        0.0
    } else {
        eligible.iter().sum::<f32>() / eligible.len() as f32
    }
}

/// A camera's main subject, identified well enough to compare against another
/// camera's main subject without sharing track ids: the subject's class and
/// which screen quadrant it occupies.
#[derive(Debug, Clone, PartialEq)]
struct SubjectSignature {
    class: String,
    quadrant: u8,
}

/// Splits normalized centroid coordinates into one of four screen quadrants.
fn quadrant(cx: f32, cy: f32) -> u8 {
    match (cx >= 0.5, cy >= 0.5) {
        (false, false) => 0,
        (true, false) => 1,
        (false, true) => 2,
        (true, true) => 3,
    }
}

/// Looks up `obs`'s own main-subject track (via `main_subject_track_id`) and
/// returns its signature plus its tracker confidence, or `None` if this
/// camera has no tracked main subject this tick.
fn main_subject_signature(obs: &CameraObservations) -> Option<(SubjectSignature, f32)> {
    let id = obs.main_subject_track_id?;
    let crate::model::Observation::Present(ref tracks) = obs.tracks else {
        return None;
    };
    let track = tracks.iter().find(|t| t.track_id == id)?;
    let (cx, cy) = track.bbox.centroid();
    Some((
        SubjectSignature {
            class: track.class.clone(),
            quadrant: quadrant(cx, cy),
        },
        track.score,
    ))
}

fn continuity_bonus(tracks: &[crate::model::Track], main_subject: Option<u32>) -> f32 {
    let Some(id) = main_subject else { return 0.0 };
    tracks
        .iter()
        .find(|t| t.track_id == id)
        .map(|t| clamp_unit(t.age as f32 / CONTINUITY_SATURATION_FRAMES as f32))
        .unwrap_or(0.0)
}

/// Proximity of the largest bbox's center of mass to the nearest
/// rule-of-thirds intersection; 0 off-screen, 1 at the nearest intersection.
fn framing_score(tracks: &[crate::model::Track]) -> f32 {
    let largest = tracks.iter().max_by(|a, b| {
        a.bbox
            .area()
            .partial_cmp(&b.bbox.area())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let Some(track) = largest else { return 0.0 };
    let (cx, cy) = track.bbox.centroid();
    if !(0.0..=1.0).contains(&cx) || !(0.0..=1.0).contains(&cy) {
        return 0.0;
    }

    const THIRDS: [f32; 2] = [1.0 / 3.0, 2.0 / 3.0];
    let min_dist = THIRDS
        .iter()
        .flat_map(|tx| THIRDS.iter().map(move |ty| (*tx, *ty)))
        .map(|(tx, ty)| (((cx - tx).powi(2) + (cy - ty).powi(2)).sqrt()))
        .fold(f32::MAX, f32::min);

    // Normalize against the maximum possible distance to any thirds point
    // from a corner, so 0 distance -> 1.0 and worst-case -> 0.0.
    const MAX_DIST: f32 = 0.5 * std::f32::consts::SQRT_2;
    clamp_unit(1.0 - (min_dist / MAX_DIST))
}

fn build_features(
    terms: &[(&'static str, f32, f32)],
    obs: &CameraObservations,
) -> CameraFeatures {
    let get = |name: &str| terms.iter().find(|(n, _, _)| *n == name).map(|(_, _, v)| *v);

    let tags = if let crate::model::Observation::Present(ref scene) = obs.scene {
        scene.tags.clone()
    } else {
        Vec::new()
    };

    let top_objects = if let crate::model::Observation::Present(ref detections) = obs.detections {
        let mut classes: Vec<String> = detections.iter().map(|d| d.class.clone()).collect();
        classes.sort();
        classes.dedup();
        classes.truncate(3);
        classes
    } else {
        Vec::new()
    };

    let recent_speech_text = if let crate::model::Observation::Present(ref speech) = obs.speech {
        Some(speech.text.clone())
    } else {
        None
    };

    CameraFeatures {
        face_salience: get("faceSalience").unwrap_or(0.0),
        main_subject_overlap: get("mainSubjectOverlap").unwrap_or(0.0),
        motion_salience: get("motionSalience").unwrap_or(0.0),
        speech_energy: get("speechEnergy").unwrap_or(0.0),
        keyword_boost: get("keywordBoost").unwrap_or(0.0),
        framing_score: get("framingScore").unwrap_or(0.0),
        novelty_decay: get("noveltyDecay").unwrap_or(1.0),
        continuity_bonus: get("continuityBonus").unwrap_or(0.0),
        interest: get("interest").unwrap_or(0.0),
        tags,
        top_objects,
        recent_speech_text,
    }
}

fn rationale(terms: &[(&'static str, f32, f32)]) -> String {
    let mut contributions: Vec<(&str, f32)> = terms.iter().map(|(n, w, v)| (*n, w * v)).collect();
    contributions.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let formatted: Vec<String> = contributions
        .iter()
        .take(2)
        .map(|(name, contribution)| format!("{name} {contribution:.2}"))
        .collect();

    truncate_str(&formatted.join(", "), MAX_RATIONALE_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BBox, Detection, Observation, Track, Velocity};

    fn ranker() -> (Ranker, Arc<ObservationCache>, Arc<ProgramCamTracker>) {
        let cache = Arc::new(ObservationCache::new());
        let tracker = ProgramCamTracker::new();
        let ranker = Ranker {
            cache: cache.clone(),
            program_tracker: tracker.clone(),
            weights: WeightConfig::default(),
            novelty_tau_sec: 8.0,
            keyword_k: 3.0,
            ranking_rate_hz: 10.0,
        };
        (ranker, cache, tracker)
    }

    #[test]
    fn camera_with_no_observations_scores_zero_with_no_data_reason() {
        let (ranker, _, _) = ranker();
        let scores = ranker.tick(&[CameraId::new("cam-1")], 1.0);
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].score, 0.0);
        assert_eq!(scores[0].reason, "no-data");
    }

    #[test]
    fn degraded_camera_is_forced_to_zero() {
        let (ranker, cache, _) = ranker();
        let cam = CameraId::new("cam-1");
        cache.record_detections(&cam, vec![], 1.0);
        cache.set_degraded(&cam, true);

        let scores = ranker.tick(&[cam], 1.0);
        assert_eq!(scores[0].score, 0.0);
        assert_eq!(scores[0].reason, "degraded");
    }

    #[test]
    fn camera_with_large_centered_detection_scores_above_zero() {
        let (ranker, cache, _) = ranker();
        let cam = CameraId::new("cam-1");
        cache.record_detections(
            &cam,
            vec![Detection {
                class: "person".into(),
                confidence: 0.95,
                bbox: BBox {
                    x: 0.25,
                    y: 0.25,
                    width: 0.5,
                    height: 0.5,
                },
                centroid: None,
                frame_track_id: None,
                velocity: None,
            }],
            1.0,
        );

        let scores = ranker.tick(&[cam], 1.0);
        assert!(scores[0].score > 0.0);
    }

    #[test]
    fn unavailable_weights_are_not_counted_as_zero() {
        let (ranker, cache, _) = ranker();
        let cam_with_face = CameraId::new("face-cam");
        let cam_with_motion = CameraId::new("motion-cam");

        cache.record_detections(
            &cam_with_face,
            vec![Detection {
                class: "person".into(),
                confidence: 1.0,
                bbox: BBox {
                    x: 0.0,
                    y: 0.0,
                    width: 1.0,
                    height: 1.0,
                },
                centroid: None,
                frame_track_id: None,
                velocity: None,
            }],
            1.0,
        );

        cache.record_tracks(
            &cam_with_motion,
            vec![Track {
                track_id: 1,
                bbox: BBox {
                    x: 0.0,
                    y: 0.0,
                    width: 0.1,
                    height: 0.1,
                },
                age: 5,
                score: 0.5,
                velocity: Some(Velocity { dx: 1.0, dy: 0.0 }),
                class: "person".into(),
            }],
            Some(1),
            1.0,
        );

        let scores = ranker.tick(&[cam_with_face, cam_with_motion], 1.0);
        // Both cameras should score above zero even though each is missing
        // different modalities entirely (detections vs tracks).
        assert!(scores[0].score > 0.0);
        assert!(scores[1].score > 0.0);
    }

    #[test]
    fn novelty_decay_defaults_to_one_for_never_selected_camera() {
        let (ranker, cache, _) = ranker();
        let cam = CameraId::new("cam-1");
        cache.record_detections(&cam, vec![], 1.0);
        let scores = ranker.tick(&[cam], 1.0);
        assert_eq!(scores[0].features.novelty_decay, 1.0);
    }

    #[test]
    fn novelty_decay_falls_after_a_camera_was_recently_program() {
        let (ranker, cache, tracker) = ranker();
        let cam = CameraId::new("cam-1");
        cache.record_detections(&cam, vec![], 1.0);
        tracker.record_switch(cam.clone(), 0.0);

        let scores = ranker.tick(&[cam], 1.0);
        assert!(scores[0].features.novelty_decay < 1.0);
    }

    #[test]
    fn main_subject_overlap_prefers_current_program_cam_on_tie() {
        let (ranker, cache, tracker) = ranker();
        let cam_a = CameraId::new("a");
        let cam_b = CameraId::new("b");

        // Equal-confidence main subjects of different class/quadrant, so
        // only the tie-break (current program cam) decides which becomes
        // the hottest subject.
        cache.record_tracks(
            &cam_a,
            vec![Track {
                track_id: 1,
                bbox: BBox {
                    x: 0.0,
                    y: 0.0,
                    width: 0.2,
                    height: 0.2,
                },
                age: 5,
                score: 0.5,
                velocity: None,
                class: "person".into(),
            }],
            Some(1),
            1.0,
        );
        cache.record_tracks(
            &cam_b,
            vec![Track {
                track_id: 1,
                bbox: BBox {
                    x: 0.6,
                    y: 0.6,
                    width: 0.2,
                    height: 0.2,
                },
                age: 5,
                score: 0.5,
                velocity: None,
                class: "dog".into(),
            }],
            Some(1),
            1.0,
        );
        tracker.record_switch(cam_b.clone(), 0.5);

        let scores = ranker.tick(&[cam_a.clone(), cam_b.clone()], 1.0);
        let overlap = |cam: &CameraId| {
            scores
                .iter()
                .find(|s| &s.cam_id == cam)
                .unwrap()
                .features
                .main_subject_overlap
        };
        // cam_b wins the tie, so its own main subject matches the hottest
        // subject (itself) while cam_a's distinct class/quadrant does not.
        assert_eq!(overlap(&cam_b), 1.0);
        assert_eq!(overlap(&cam_a), 0.0);
    }

    #[test]
    fn rationale_is_within_length_cap() {
        let (ranker, cache, _) = ranker();
        let cam = CameraId::new("cam-1");
        cache.record_detections(&cam, vec![], 1.0);
        let scores = ranker.tick(&[cam], 1.0);
        assert!(scores[0].reason.len() <= MAX_RATIONALE_LEN);
    }

    #[test]
    fn observation_unavailable_variant_is_distinct_from_empty_vec() {
        let empty = Observation::Present(Vec::<crate::model::Detection>::new());
        let unavailable: Observation<Vec<crate::model::Detection>> = Observation::Unavailable;
        assert!(empty.is_available());
        assert!(!unavailable.is_available());
    }
}
