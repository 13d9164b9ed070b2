//! General utilities shared across the application.

use std::time::{SystemTime, UNIX_EPOCH};

// ─────────────────────────────────────────────────────────────────────────────
// Time Utilities
// ─────────────────────────────────────────────────────────────────────────────

/// Returns the current Unix timestamp in milliseconds.
///
/// Returns 0 if the system clock is before the Unix epoch (shouldn't happen in practice).
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Returns the current Unix timestamp in fractional seconds.
///
/// The scoring and decision pipeline reasons in seconds throughout; this
/// avoids repeated `as f64 / 1000.0` conversions at call sites.
#[must_use]
pub fn now_seconds() -> f64 {
    now_millis() as f64 / 1000.0
}

// ─────────────────────────────────────────────────────────────────────────────
// Feature Math
// ─────────────────────────────────────────────────────────────────────────────

/// Clamps `value` into `[0, 1]`.
#[must_use]
pub fn clamp_unit(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}

/// Exponential decay: `exp(-delta_t / tau)`. Returns `1.0` when `tau <= 0`.
#[must_use]
pub fn exp_decay(delta_t: f64, tau: f64) -> f32 {
    if tau <= 0.0 {
        return 1.0;
    }
    (-delta_t / tau).exp() as f32
}

/// Linear decay from `1.0` to `0.0` over `window` seconds, floored at zero.
#[must_use]
pub fn linear_decay(delta_t: f64, window: f64) -> f32 {
    if window <= 0.0 {
        return 0.0;
    }
    clamp_unit((1.0 - (delta_t / window)) as f32)
}

/// Maps a dB level onto `[0, 1]` given a floor and ceiling, e.g. `-60dBFS -> 0`,
/// `-10dBFS -> 1`.
#[must_use]
pub fn normalize_db(db: f32, floor_db: f32, ceiling_db: f32) -> f32 {
    if ceiling_db <= floor_db {
        return 0.0;
    }
    clamp_unit((db - floor_db) / (ceiling_db - floor_db))
}

/// Truncates `s` to at most `max_len` bytes on a char boundary, used to keep
/// rationale strings within the configured size cap.
#[must_use]
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_unit_clamps_both_directions() {
        assert_eq!(clamp_unit(-0.5), 0.0);
        assert_eq!(clamp_unit(1.5), 1.0);
        assert_eq!(clamp_unit(0.3), 0.3);
    }

    #[test]
    fn exp_decay_is_one_at_zero_delta() {
        assert_eq!(exp_decay(0.0, 8.0), 1.0);
    }

    #[test]
    fn exp_decay_falls_off_with_time() {
        let near = exp_decay(1.0, 8.0);
        let far = exp_decay(16.0, 8.0);
        assert!(near > far);
        assert!(far >= 0.0);
    }

    #[test]
    fn linear_decay_reaches_zero_at_window_edge() {
        assert_eq!(linear_decay(2.0, 2.0), 0.0);
        assert_eq!(linear_decay(3.0, 2.0), 0.0);
        assert!((linear_decay(1.0, 2.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn normalize_db_maps_floor_and_ceiling() {
        assert_eq!(normalize_db(-60.0, -60.0, -10.0), 0.0);
        assert_eq!(normalize_db(-10.0, -60.0, -10.0), 1.0);
        assert_eq!(normalize_db(-100.0, -60.0, -10.0), 0.0);
    }

    #[test]
    fn truncate_str_respects_char_boundaries() {
        let s = "hello world";
        assert_eq!(truncate_str(s, 5), "hello");
        assert_eq!(truncate_str(s, 100), s);
    }
}
