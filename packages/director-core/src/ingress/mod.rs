//! Media ingress: maintains a hidden, subscribe-only session with the room,
//! converts tracks to the canonical analysis format, and samples them for the
//! analyzer tier.
//!
//! A small capability trait ([`MediaRoom`]) stands between the pipeline and
//! the real transport, so the whole pipeline is testable against
//! [`mock_room::MockMediaRoom`] without a real SFU.

mod adapter;
mod mock_room;

pub use adapter::MediaIngressAdapter;
pub use mock_room::MockMediaRoom;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DirectorResult;
use crate::model::CameraId;

/// A single canonical video frame: 8-bit BT.709, fixed analysis resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub cam_id: CameraId,
    pub ts: f64,
    pub width: u32,
    pub height: u32,
    /// Interleaved RGB8 pixel data, `width * height * 3` bytes.
    pub rgb: Vec<u8>,
}

impl Frame {
    /// Mean luma (0..=255) of the frame, used by the reference motion and
    /// scene analyzers instead of a real decoder.
    pub fn mean_luma(&self) -> f32 {
        if self.rgb.is_empty() {
            return 0.0;
        }
        let mut sum: u64 = 0;
        let mut n: u64 = 0;
        for px in self.rgb.chunks_exact(3) {
            let luma = 0.2126 * px[0] as f32 + 0.7152 * px[1] as f32 + 0.0722 * px[2] as f32;
            sum += luma as u64;
            n += 1;
        }
        if n == 0 {
            0.0
        } else {
            sum as f32 / n as f32
        }
    }
}

/// A window of canonical audio: 16-bit PCM mono at a fixed sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    pub cam_id: CameraId,
    pub start_ts: f64,
    pub end_ts: f64,
    pub sample_rate: u32,
    pub samples: Vec<i16>,
}

impl AudioChunk {
    /// RMS energy expressed in dBFS, floored at -90dB for silence.
    pub fn energy_dbfs(&self) -> f32 {
        if self.samples.is_empty() {
            return -90.0;
        }
        let sum_sq: f64 = self
            .samples
            .iter()
            .map(|s| {
                let norm = *s as f64 / i16::MAX as f64;
                norm * norm
            })
            .sum();
        let rms = (sum_sq / self.samples.len() as f64).sqrt();
        if rms <= 1e-9 {
            -90.0
        } else {
            (20.0 * rms.log10()).max(-90.0) as f32
        }
    }
}

/// Lifecycle + degraded-state notifications the adapter surfaces per camera.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CameraLifecycleEvent {
    Joined { cam_id: CameraId },
    Left { cam_id: CameraId },
    Degraded { cam_id: CameraId },
}

/// A camera's hidden, subscribe-only view into a video conferencing room.
///
/// Production implementations talk to a real SFU; [`MockMediaRoom`]
/// replays fixtures for tests.
#[async_trait]
pub trait MediaRoom: Send + Sync {
    /// Joins the room as a subscribe-only participant. Idempotent.
    async fn start(&self) -> DirectorResult<()>;

    /// Currently joined camera participant ids, in join order.
    async fn active_cameras(&self) -> Vec<CameraId>;

    /// Samples the most recent video frame for `cam_id`, or `None` if nothing
    /// newer than the last sample has arrived. Never blocks.
    async fn sample(&self, cam_id: &CameraId) -> Option<Frame>;

    /// Returns the most recent `window_sec` of audio for `cam_id`, or `None`.
    async fn audio_window(&self, cam_id: &CameraId, window_sec: f64) -> Option<AudioChunk>;
}
