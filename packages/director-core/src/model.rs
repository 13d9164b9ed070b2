//! Core data model shared by every component: camera identity, analyzer
//! observations, the fused feature vector, and the score/decision types that
//! travel on the bus.
//!
//! See the ranker ([`crate::services::ranker`]) and decision engine
//! ([`crate::services::decision_engine`]) modules for how these types are
//! produced and consumed.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque, stable identifier for a participant acting as a camera.
///
/// Wrapping `String` rather than passing bare strings around keeps camera
/// identity distinct from arbitrary text at every call site and lets it be
/// used directly as a map key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CameraId(pub String);

impl CameraId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CameraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CameraId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for CameraId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Axis-aligned bounding box in normalized frame coordinates ([0,1] on both axes).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BBox {
    pub fn area(&self) -> f32 {
        (self.width * self.height).max(0.0)
    }

    pub fn centroid(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    pub dx: f32,
    pub dy: f32,
}

impl Velocity {
    pub fn magnitude(&self) -> f32 {
        (self.dx * self.dx + self.dy * self.dy).sqrt()
    }
}

/// A single object detection produced by the detector analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class: String,
    pub confidence: f32,
    pub bbox: BBox,
    pub centroid: Option<(f32, f32)>,
    pub frame_track_id: Option<u32>,
    pub velocity: Option<Velocity>,
}

/// A track maintained by the tracker analyzer; survives across frames of the
/// same camera only (see [`crate::analyzers::tracker`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub track_id: u32,
    pub bbox: BBox,
    pub age: u32,
    pub score: f32,
    pub velocity: Option<Velocity>,
    pub class: String,
}

/// High-level scene summary produced at a lower cadence than detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDescription {
    pub tags: Vec<String>,
    pub caption: String,
    /// Raw interest on a 1..=5 scale, as returned by the describer.
    pub interest: u8,
    pub confidence: f32,
}

impl SceneDescription {
    /// Normalizes `interest` from `1..=5` to `[0,1]`.
    pub fn normalized_interest(&self) -> f32 {
        ((self.interest.clamp(1, 5) as f32) - 1.0) / 4.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTiming {
    pub word: String,
    pub start_ts: f64,
    pub end_ts: f64,
}

/// One segment of recognized speech, with word-level timing when available.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechSegment {
    pub text: String,
    pub start_ts: f64,
    pub end_ts: f64,
    pub word_timings: Vec<WordTiming>,
    pub keywords: Vec<String>,
    pub energy_db: f32,
}

/// The output of any analyzer for one tick: either a value, or a first-class
/// "not available this tick" state (warming up, timed out, errored).
///
/// Never collapsed to a default before reaching the ranker — `Unavailable`
/// means "feature absent", not "feature zero" (see SPEC_FULL.md SS4.2).
#[derive(Debug, Clone, PartialEq)]
pub enum Observation<T> {
    Present(T),
    Unavailable,
}

impl<T> Observation<T> {
    pub fn as_ref(&self) -> Observation<&T> {
        match self {
            Observation::Present(v) => Observation::Present(v),
            Observation::Unavailable => Observation::Unavailable,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Observation::Present(_))
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Observation::Present(v) => Some(v),
            Observation::Unavailable => None,
        }
    }
}

/// One camera's fused feature vector for one ranker tick.
///
/// Every scalar field is normalized to `[0,1]`; see SPEC_FULL.md SS4.3 for the
/// exact derivation of each.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraFeatures {
    pub face_salience: f32,
    pub main_subject_overlap: f32,
    pub motion_salience: f32,
    pub speech_energy: f32,
    pub keyword_boost: f32,
    pub framing_score: f32,
    pub novelty_decay: f32,
    pub continuity_bonus: f32,
    pub interest: f32,
    pub tags: Vec<String>,
    pub top_objects: Vec<String>,
    pub recent_speech_text: Option<String>,
}

impl Default for CameraFeatures {
    fn default() -> Self {
        Self {
            face_salience: 0.0,
            main_subject_overlap: 0.0,
            motion_salience: 0.0,
            speech_energy: 0.0,
            keyword_boost: 0.0,
            framing_score: 0.0,
            novelty_decay: 1.0,
            continuity_bonus: 0.0,
            interest: 0.0,
            tags: Vec::new(),
            top_objects: Vec::new(),
            recent_speech_text: None,
        }
    }
}

/// A fused, published score for one camera at one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraScore {
    pub cam_id: CameraId,
    pub ts: f64,
    pub score: f32,
    pub features: CameraFeatures,
    pub reason: String,
}

/// Action taken (or not taken) by the decision engine on one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DecisionAction {
    Switch,
    Hold,
}

/// A single decision-engine output: a SWITCH or a HOLD, with rationale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchDecision {
    pub ts: f64,
    pub action: DecisionAction,
    pub from_cam: Option<CameraId>,
    pub to_cam: Option<CameraId>,
    pub delta_score: Option<f32>,
    pub rationale: String,
    pub confidence: f32,
}

impl SwitchDecision {
    pub fn hold(ts: f64, rationale: impl Into<String>) -> Self {
        Self {
            ts,
            action: DecisionAction::Hold,
            from_cam: None,
            to_cam: None,
            delta_score: None,
            rationale: rationale.into(),
            confidence: 0.0,
        }
    }

    pub fn switch(
        ts: f64,
        from_cam: Option<CameraId>,
        to_cam: CameraId,
        delta_score: Option<f32>,
        rationale: impl Into<String>,
        confidence: f32,
    ) -> Self {
        Self {
            ts,
            action: DecisionAction::Switch,
            from_cam,
            to_cam: Some(to_cam),
            delta_score,
            rationale: rationale.into(),
            confidence,
        }
    }
}

/// A narration emitted after a SWITCH, carrying the synthesized text and audio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Narration {
    pub text: String,
    pub duration_ms: u32,
    pub timestamp: f64,
    pub audio_blob_ref: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_id_equality_is_by_value() {
        assert_eq!(CameraId::new("cam-a"), CameraId::from("cam-a"));
        assert_ne!(CameraId::new("cam-a"), CameraId::new("cam-b"));
    }

    #[test]
    fn scene_description_interest_normalizes_to_unit_range() {
        let low = SceneDescription {
            tags: vec![],
            caption: String::new(),
            interest: 1,
            confidence: 1.0,
        };
        let high = SceneDescription {
            interest: 5,
            ..low.clone()
        };
        assert_eq!(low.normalized_interest(), 0.0);
        assert_eq!(high.normalized_interest(), 1.0);
    }

    #[test]
    fn bbox_area_and_centroid() {
        let bbox = BBox {
            x: 0.25,
            y: 0.25,
            width: 0.5,
            height: 0.5,
        };
        assert!((bbox.area() - 0.25).abs() < 1e-6);
        assert_eq!(bbox.centroid(), (0.5, 0.5));
    }

    #[test]
    fn switch_decision_disallows_equal_cams_by_construction_contract() {
        let from = CameraId::new("a");
        let to = CameraId::new("a");
        let decision = SwitchDecision::switch(1.0, Some(from.clone()), to.clone(), Some(0.2), "x", 0.5);
        // The decision engine is responsible for never calling switch() with
        // from == to; this test documents that the type itself does not forbid it.
        assert_eq!(decision.from_cam, Some(from));
        assert_eq!(decision.to_cam, Some(to));
    }
}
