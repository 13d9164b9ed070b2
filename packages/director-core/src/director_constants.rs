//! Fixed defaults for tick rates, deadlines, and switching policy.
//!
//! These are the defaults layered under [`crate::state::Config`]; every one
//! of them is overridable via YAML or a `DIRECTOR_*` environment variable.

// ─────────────────────────────────────────────────────────────────────────────
// Tick rates
// ─────────────────────────────────────────────────────────────────────────────

/// Default video sampling rate for the ingress adapter (Hz).
pub const DEFAULT_ANALYSIS_RATE_HZ: f64 = 10.0;

/// Default ranker tick rate (Hz).
pub const DEFAULT_RANKING_RATE_HZ: f64 = 10.0;

/// Default decision engine tick rate (Hz).
pub const DEFAULT_DECISION_RATE_HZ: f64 = 10.0;

/// Scene describer cadence (ms); far more expensive than detection so it runs
/// at a lower rate.
pub const DEFAULT_SCENE_DESCRIBE_INTERVAL_MS: u64 = 700;

// ─────────────────────────────────────────────────────────────────────────────
// Per-analyzer deadlines
// ─────────────────────────────────────────────────────────────────────────────

/// Deadline for a single detector call (ms). Expiry marks the tick `Unavailable`.
pub const DETECTOR_DEADLINE_MS: u64 = 50;

/// Deadline for a single scene-describer call (ms).
pub const SCENE_DESCRIBER_DEADLINE_MS: u64 = 1000;

/// Deadline for a single speech-recognizer call (ms).
pub const SPEECH_RECOGNIZER_DEADLINE_MS: u64 = 800;

// ─────────────────────────────────────────────────────────────────────────────
// Switch policy defaults
// ─────────────────────────────────────────────────────────────────────────────

/// Minimum time a camera must remain program after being selected (seconds).
pub const DEFAULT_MIN_HOLD_SEC: f64 = 2.0;

/// Minimum interval between consecutive switches onto the same camera (seconds).
pub const DEFAULT_COOLDOWN_SEC: f64 = 4.0;

/// Minimum score delta required to justify a switch.
pub const DEFAULT_DELTA_S_THRESHOLD: f32 = 0.15;

/// Forced cut threshold: a shot older than this is cut regardless of policy (seconds).
pub const DEFAULT_MAX_SHOT_DURATION_SEC: f64 = 45.0;

/// Number of trailing switches considered by the ping-pong guard.
pub const DEFAULT_PING_PONG_WINDOW: usize = 5;

/// Revisits within the ping-pong window that trigger the guard.
pub const DEFAULT_PING_PONG_MAX_REVISITS: usize = 2;

/// Maximum consecutive ticks a speech-alignment deferral may hold a switch.
pub const DEFAULT_MAX_DEFER_TICKS: u32 = 3;

/// Grace period past a speech segment's end before a word is no longer
/// considered "in progress" for speech-boundary alignment (ms).
pub const SPEECH_ALIGN_GRACE_MS: f64 = 80.0;

/// Window after which a camera with no fresh frames is considered stale (seconds).
pub const DEFAULT_STALENESS_WINDOW_SEC: f64 = 3.0;

// ─────────────────────────────────────────────────────────────────────────────
// Feature fusion defaults
// ─────────────────────────────────────────────────────────────────────────────

/// Novelty decay time constant tau (seconds).
pub const DEFAULT_NOVELTY_TAU_SEC: f64 = 8.0;

/// `K` in `keywordBoost = min(keywordsInLastWindow / K, 1)`.
pub const DEFAULT_KEYWORD_K: f32 = 3.0;

/// Track age (frames) at which continuityBonus saturates.
pub const CONTINUITY_SATURATION_FRAMES: u32 = 30;

/// Track age (ticks) below which a track does not count toward motionSalience.
pub const MOTION_MIN_TRACK_AGE: u32 = 3;

/// Window over which "hottest subject across cams" is computed for
/// mainSubjectOverlap (seconds).
pub const HOTTEST_SUBJECT_WINDOW_SEC: f64 = 1.0;

/// `interest` linear decay window if not refreshed (seconds).
pub const INTEREST_DECAY_WINDOW_SEC: f64 = 2.0;

/// Maximum rationale string length.
pub const MAX_RATIONALE_LEN: usize = 140;

// ─────────────────────────────────────────────────────────────────────────────
// Narration defaults
// ─────────────────────────────────────────────────────────────────────────────

/// Maximum end-to-end narration synthesis latency before the narration is
/// dropped rather than published (ms).
pub const DEFAULT_MAX_TTS_LATENCY_MS: u64 = 600;

/// Maximum narration length (words).
pub const DEFAULT_MAX_NARRATION_WORDS: usize = 18;

// ─────────────────────────────────────────────────────────────────────────────
// Media ingress
// ─────────────────────────────────────────────────────────────────────────────

/// Canonical analysis frame width (pixels).
pub const ANALYSIS_FRAME_WIDTH: u32 = 640;

/// Canonical analysis frame height (pixels).
pub const ANALYSIS_FRAME_HEIGHT: u32 = 360;

/// Canonical analysis audio sample rate (Hz).
pub const ANALYSIS_AUDIO_SAMPLE_RATE: u32 = 16_000;

/// Analysis audio is downmixed to mono.
pub const ANALYSIS_AUDIO_CHANNELS: u16 = 1;

// ─────────────────────────────────────────────────────────────────────────────
// Bus and service identity
// ─────────────────────────────────────────────────────────────────────────────

/// Capacity of the event broadcast channel for WebSocket clients.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Application name reported by the control API's health endpoint.
pub const APP_NAME: &str = "Auto Director";

/// Service identifier used for discovery (health endpoint).
pub const SERVICE_ID: &str = "auto-director";
