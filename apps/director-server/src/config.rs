//! Server configuration.
//!
//! Supports loading from YAML files with environment variable overrides.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;

use anyhow::{Context, Result};
use director_core::Config;
use serde::Deserialize;

/// Server configuration loaded from YAML with `DIRECTOR_*` environment overrides.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind the control API to.
    /// Override: `DIRECTOR_BIND_HOST`
    pub bind_host: IpAddr,

    /// Port to bind the control API to.
    /// Override: `DIRECTOR_BIND_PORT`
    pub bind_port: u16,

    /// How long a graceful shutdown waits for in-flight work to drain before
    /// forcing termination (seconds).
    /// Override: `DIRECTOR_SHUTDOWN_GRACE_SEC`
    pub shutdown_grace_sec: u64,

    /// Keywords the reference speech recognizer treats as narration-worthy.
    /// Override: `DIRECTOR_KEYWORDS` (comma-separated)
    pub keywords: Vec<String>,

    /// Director core configuration (tick rates, switch policy, weights, ...).
    #[serde(flatten)]
    pub core: Config,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            bind_port: 8088,
            shutdown_grace_sec: 5,
            keywords: vec!["goal".into(), "wow".into(), "incredible".into()],
            core: Config::default(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file: {}", path.display()))?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Applies `DIRECTOR_*` environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        env_parse("DIRECTOR_BIND_HOST", &mut self.bind_host);
        env_parse("DIRECTOR_BIND_PORT", &mut self.bind_port);
        env_parse("DIRECTOR_SHUTDOWN_GRACE_SEC", &mut self.shutdown_grace_sec);

        env_parse("DIRECTOR_ANALYSIS_RATE_HZ", &mut self.core.analysis_rate_hz);
        env_parse("DIRECTOR_RANKING_RATE_HZ", &mut self.core.ranking_rate_hz);
        env_parse("DIRECTOR_DECISION_RATE_HZ", &mut self.core.decision_rate_hz);
        env_parse(
            "DIRECTOR_STALENESS_WINDOW_SEC",
            &mut self.core.staleness_window_sec,
        );
        env_parse("DIRECTOR_NOVELTY_TAU_SEC", &mut self.core.novelty_tau_sec);
        env_parse("DIRECTOR_KEYWORD_K", &mut self.core.keyword_k);

        env_parse(
            "DIRECTOR_MIN_HOLD_SEC",
            &mut self.core.switch_policy.min_hold_sec,
        );
        env_parse(
            "DIRECTOR_COOLDOWN_SEC",
            &mut self.core.switch_policy.cooldown_sec,
        );
        env_parse(
            "DIRECTOR_DELTA_S_THRESHOLD",
            &mut self.core.switch_policy.delta_s_threshold,
        );
        env_parse(
            "DIRECTOR_MAX_SHOT_DURATION_SEC",
            &mut self.core.switch_policy.max_shot_duration_sec,
        );
        env_parse(
            "DIRECTOR_PING_PONG_WINDOW",
            &mut self.core.switch_policy.ping_pong_window,
        );
        env_parse(
            "DIRECTOR_PING_PONG_MAX_REVISITS",
            &mut self.core.switch_policy.ping_pong_max_revisits,
        );
        env_parse(
            "DIRECTOR_MAX_DEFER_TICKS",
            &mut self.core.switch_policy.max_defer_ticks,
        );

        env_parse("DIRECTOR_MAX_TTS_LATENCY_MS", &mut self.core.max_tts_latency_ms);
        env_parse(
            "DIRECTOR_MAX_NARRATION_WORDS",
            &mut self.core.max_narration_words,
        );

        env_parse("DIRECTOR_W_FACE_SALIENCE", &mut self.core.weights.face_salience);
        env_parse(
            "DIRECTOR_W_MOTION_SALIENCE",
            &mut self.core.weights.motion_salience,
        );
        env_parse(
            "DIRECTOR_W_MAIN_SUBJECT_OVERLAP",
            &mut self.core.weights.main_subject_overlap,
        );
        env_parse("DIRECTOR_W_SPEECH_ENERGY", &mut self.core.weights.speech_energy);
        env_parse("DIRECTOR_W_KEYWORD_BOOST", &mut self.core.weights.keyword_boost);
        env_parse("DIRECTOR_W_FRAMING_SCORE", &mut self.core.weights.framing_score);
        env_parse("DIRECTOR_W_NOVELTY_DECAY", &mut self.core.weights.novelty_decay);
        env_parse(
            "DIRECTOR_W_CONTINUITY_BONUS",
            &mut self.core.weights.continuity_bonus,
        );
        env_parse("DIRECTOR_W_INTEREST", &mut self.core.weights.interest);

        if let Ok(val) = std::env::var("DIRECTOR_KEYWORDS") {
            self.keywords = val
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
    }

    /// The address the control API should bind to.
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_host, self.bind_port)
    }
}

/// Parses `key` from the environment into `slot`, leaving `slot` untouched if
/// the variable is unset or fails to parse.
fn env_parse<T: std::str::FromStr>(key: &str, slot: &mut T) {
    if let Ok(val) = std::env::var(key) {
        if let Ok(parsed) = val.parse() {
            *slot = parsed;
        }
    }
}
