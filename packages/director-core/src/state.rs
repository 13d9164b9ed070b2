//! Core application state types.
//!
//! Provides configuration ([`Config`], [`WeightConfig`], [`SwitchPolicy`]) and
//! the decision engine's runtime state ([`ProgramState`]).

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::director_constants::*;
use crate::model::CameraId;

// ─────────────────────────────────────────────────────────────────────────────
// Feature fusion weights
// ─────────────────────────────────────────────────────────────────────────────

/// Weights applied to each normalized feature before summation in the ranker.
///
/// Values need not sum to 1 on input; [`WeightConfig::normalized`] rescales
/// them. Kept separate from [`Config`] so a weight override (`W_*` env vars)
/// can be validated and normalized independently.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct WeightConfig {
    pub face_salience: f32,
    pub motion_salience: f32,
    pub main_subject_overlap: f32,
    pub speech_energy: f32,
    pub keyword_boost: f32,
    pub framing_score: f32,
    pub novelty_decay: f32,
    pub continuity_bonus: f32,
    pub interest: f32,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            face_salience: 0.25,
            motion_salience: 0.15,
            main_subject_overlap: 0.15,
            speech_energy: 0.15,
            keyword_boost: 0.10,
            framing_score: 0.10,
            novelty_decay: 0.05,
            continuity_bonus: 0.05,
            interest: 0.10,
        }
    }
}

impl WeightConfig {
    /// Returns the nine weights as `(name, weight)` pairs, in fusion order.
    pub fn as_pairs(&self) -> [(&'static str, f32); 9] {
        [
            ("faceSalience", self.face_salience),
            ("motionSalience", self.motion_salience),
            ("mainSubjectOverlap", self.main_subject_overlap),
            ("speechEnergy", self.speech_energy),
            ("keywordBoost", self.keyword_boost),
            ("framingScore", self.framing_score),
            ("noveltyDecay", self.novelty_decay),
            ("continuityBonus", self.continuity_bonus),
            ("interest", self.interest),
        ]
    }

    /// Total of all nine weights.
    pub fn sum(&self) -> f32 {
        self.as_pairs().iter().map(|(_, w)| w).sum()
    }

    /// Returns a copy rescaled so the weights sum to 1, or `None` if every
    /// weight is zero (nothing to normalize against).
    pub fn normalized(&self) -> Option<Self> {
        let total = self.sum();
        if total <= 0.0 {
            return None;
        }
        Some(Self {
            face_salience: self.face_salience / total,
            motion_salience: self.motion_salience / total,
            main_subject_overlap: self.main_subject_overlap / total,
            speech_energy: self.speech_energy / total,
            keyword_boost: self.keyword_boost / total,
            framing_score: self.framing_score / total,
            novelty_decay: self.novelty_decay / total,
            continuity_bonus: self.continuity_bonus / total,
            interest: self.interest / total,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Switch policy
// ─────────────────────────────────────────────────────────────────────────────

/// Decision engine switching policy. Immutable for the duration of a run
/// unless explicitly hot-reloaded through the control API.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SwitchPolicy {
    pub min_hold_sec: f64,
    pub cooldown_sec: f64,
    pub delta_s_threshold: f32,
    pub max_shot_duration_sec: f64,
    pub enable_hysteresis: bool,
    pub enable_cooldown: bool,
    pub enable_speech_align: bool,
    pub ping_pong_window: usize,
    pub ping_pong_max_revisits: usize,
    pub max_defer_ticks: u32,
}

impl Default for SwitchPolicy {
    fn default() -> Self {
        Self {
            min_hold_sec: DEFAULT_MIN_HOLD_SEC,
            cooldown_sec: DEFAULT_COOLDOWN_SEC,
            delta_s_threshold: DEFAULT_DELTA_S_THRESHOLD,
            max_shot_duration_sec: DEFAULT_MAX_SHOT_DURATION_SEC,
            enable_hysteresis: true,
            enable_cooldown: true,
            enable_speech_align: true,
            ping_pong_window: DEFAULT_PING_PONG_WINDOW,
            ping_pong_max_revisits: DEFAULT_PING_PONG_MAX_REVISITS,
            max_defer_ticks: DEFAULT_MAX_DEFER_TICKS,
        }
    }
}

impl SwitchPolicy {
    /// Validates the policy values.
    pub fn validate(&self) -> Result<(), String> {
        if self.min_hold_sec < 0.0 {
            return Err("min_hold_sec must be >= 0".to_string());
        }
        if self.cooldown_sec < 0.0 {
            return Err("cooldown_sec must be >= 0".to_string());
        }
        if self.max_shot_duration_sec <= 0.0 {
            return Err("max_shot_duration_sec must be > 0".to_string());
        }
        if self.ping_pong_window == 0 {
            return Err("ping_pong_window must be >= 1".to_string());
        }
        if !(0.0..=1.0).contains(&self.delta_s_threshold) {
            return Err("delta_s_threshold must be in [0, 1]".to_string());
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Top-level configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for the auto-director core library.
///
/// All fields have sensible defaults; the standalone server layers a YAML
/// file and `DIRECTOR_*` environment overrides on top of [`Config::default`].
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Video sampling rate for the ingress adapter (Hz).
    pub analysis_rate_hz: f64,
    /// Ranker tick rate (Hz).
    pub ranking_rate_hz: f64,
    /// Decision engine tick rate (Hz).
    pub decision_rate_hz: f64,

    /// Camera considered stale after this many seconds without a frame.
    pub staleness_window_sec: f64,
    /// Novelty decay time constant tau (seconds).
    pub novelty_tau_sec: f64,
    /// `K` in `keywordBoost = min(keywordsInLastWindow / K, 1)`.
    pub keyword_k: f32,

    /// Feature fusion weights.
    #[serde(default)]
    pub weights: WeightConfig,

    /// Switching policy.
    #[serde(default)]
    pub switch_policy: SwitchPolicy,

    /// Maximum end-to-end narration synthesis latency before it is dropped (ms).
    pub max_tts_latency_ms: u64,
    /// Maximum narration length (words).
    pub max_narration_words: usize,

    /// Capacity of the event broadcast channel.
    pub event_channel_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            analysis_rate_hz: DEFAULT_ANALYSIS_RATE_HZ,
            ranking_rate_hz: DEFAULT_RANKING_RATE_HZ,
            decision_rate_hz: DEFAULT_DECISION_RATE_HZ,
            staleness_window_sec: DEFAULT_STALENESS_WINDOW_SEC,
            novelty_tau_sec: DEFAULT_NOVELTY_TAU_SEC,
            keyword_k: DEFAULT_KEYWORD_K,
            weights: WeightConfig::default(),
            switch_policy: SwitchPolicy::default(),
            max_tts_latency_ms: DEFAULT_MAX_TTS_LATENCY_MS,
            max_narration_words: DEFAULT_MAX_NARRATION_WORDS,
            event_channel_capacity: EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl Config {
    /// Validates the configuration, returning the first violation found.
    pub fn validate(&self) -> Result<(), String> {
        if self.analysis_rate_hz <= 0.0 {
            return Err("analysis_rate_hz must be > 0".to_string());
        }
        if self.ranking_rate_hz <= 0.0 {
            return Err("ranking_rate_hz must be > 0".to_string());
        }
        if self.decision_rate_hz <= 0.0 {
            return Err("decision_rate_hz must be > 0".to_string());
        }
        if self.event_channel_capacity == 0 {
            return Err(
                "event_channel_capacity must be >= 1 (broadcast::channel panics on 0)"
                    .to_string(),
            );
        }
        self.switch_policy.validate()?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Decision engine runtime state
// ─────────────────────────────────────────────────────────────────────────────

/// Single-writer state owned exclusively by the decision engine.
///
/// # Concurrency design
///
/// This is not meant to be shared behind a lock: the decision engine task is
/// the sole owner and mutator. Readers
/// (the control API's `/state` endpoint) see a point-in-time snapshot
/// published alongside each `SwitchDecision` on the bus rather than reaching
/// into this struct directly.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramState {
    pub current_cam: Option<CameraId>,
    pub last_switch_ts: Option<f64>,
    pub shot_start_ts: Option<f64>,
    pub history: VecDeque<(CameraId, f64)>,
    pub cooldowns: std::collections::HashMap<CameraId, f64>,
    pub manual_cam: Option<CameraId>,
    pub defer_count: u32,
}

const HISTORY_CAPACITY: usize = 64;

impl ProgramState {
    /// Records a switch to `cam` at `ts`, trimming history to its bound.
    pub fn record_switch(&mut self, cam: CameraId, ts: f64) {
        self.current_cam = Some(cam.clone());
        self.last_switch_ts = Some(ts);
        self.shot_start_ts = Some(ts);
        self.defer_count = 0;
        self.history.push_back((cam, ts));
        while self.history.len() > HISTORY_CAPACITY {
            self.history.pop_front();
        }
    }

    /// Expires cooldown entries whose `notBeforeTs <= now`.
    pub fn expire_cooldowns(&mut self, now: f64) {
        self.cooldowns.retain(|_, not_before| *not_before > now);
    }

    pub fn is_in_cooldown(&self, cam: &CameraId, now: f64) -> bool {
        self.cooldowns
            .get(cam)
            .is_some_and(|not_before| *not_before > now)
    }

    /// Counts how many of the last `window` switches targeted `cam`.
    pub fn revisits_in_window(&self, cam: &CameraId, window: usize) -> usize {
        self.history
            .iter()
            .rev()
            .take(window)
            .filter(|(c, _)| c == cam)
            .count()
    }

    pub fn shot_duration(&self, now: f64) -> f64 {
        self.shot_start_ts.map_or(0.0, |start| now - start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_config_default_sums_to_one() {
        let weights = WeightConfig::default();
        assert!((weights.sum() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn weight_config_normalizes_arbitrary_weights() {
        let weights = WeightConfig {
            face_salience: 2.0,
            motion_salience: 2.0,
            main_subject_overlap: 0.0,
            speech_energy: 0.0,
            keyword_boost: 0.0,
            framing_score: 0.0,
            novelty_decay: 0.0,
            continuity_bonus: 0.0,
            interest: 0.0,
        };
        let normalized = weights.normalized().unwrap();
        assert!((normalized.sum() - 1.0).abs() < 1e-6);
        assert!((normalized.face_salience - 0.5).abs() < 1e-6);
    }

    #[test]
    fn weight_config_all_zero_has_no_normalization() {
        let weights = WeightConfig {
            face_salience: 0.0,
            motion_salience: 0.0,
            main_subject_overlap: 0.0,
            speech_energy: 0.0,
            keyword_boost: 0.0,
            framing_score: 0.0,
            novelty_decay: 0.0,
            continuity_bonus: 0.0,
            interest: 0.0,
        };
        assert!(weights.normalized().is_none());
    }

    #[test]
    fn switch_policy_default_is_valid() {
        assert!(SwitchPolicy::default().validate().is_ok());
    }

    #[test]
    fn switch_policy_rejects_negative_hold() {
        let mut policy = SwitchPolicy::default();
        policy.min_hold_sec = -1.0;
        assert!(policy.validate().is_err());
    }

    #[test]
    fn config_default_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn program_state_tracks_history_and_cooldowns() {
        let mut state = ProgramState::default();
        state.record_switch(CameraId::new("a"), 1.0);
        state.cooldowns.insert(CameraId::new("a"), 5.0);
        assert!(state.is_in_cooldown(&CameraId::new("a"), 2.0));

        state.expire_cooldowns(6.0);
        assert!(!state.is_in_cooldown(&CameraId::new("a"), 6.0));

        state.record_switch(CameraId::new("b"), 2.0);
        state.record_switch(CameraId::new("a"), 3.0);
        assert_eq!(state.revisits_in_window(&CameraId::new("a"), 5), 2);
    }

    #[test]
    fn program_state_bounds_history_length() {
        let mut state = ProgramState::default();
        for i in 0..(HISTORY_CAPACITY + 10) {
            state.record_switch(CameraId::new(format!("cam-{i}")), i as f64);
        }
        assert_eq!(state.history.len(), HISTORY_CAPACITY);
    }
}
