//! Detector capability: `detect(frame) -> [Detection]`.

use async_trait::async_trait;

use crate::director_constants::DETECTOR_DEADLINE_MS;
use crate::error::DirectorResult;
use crate::ingress::Frame;
use crate::model::{BBox, Detection};

/// Confidence threshold and class filter are configuration, per spec.
#[async_trait]
pub trait Detector: Send + Sync {
    /// Runs detection on one frame. Implementations must respect
    /// [`Detector::deadline_ms`] internally or rely on the caller's
    /// `tokio::time::timeout` wrapper; either way exceeding the deadline
    /// must surface as `Err`, never a partial result.
    async fn detect(&self, frame: &Frame) -> DirectorResult<Vec<Detection>>;

    fn deadline_ms(&self) -> u64 {
        DETECTOR_DEADLINE_MS
    }
}

/// Reference detector: segments frames into coarse grid cells and reports a
/// synthetic "motion" detection wherever the cell's luma exceeds a threshold
/// relative to the frame mean. Stands in for a real object detector so the
/// rest of the pipeline is fully exercisable without an ML runtime.
pub struct MotionThresholdDetector {
    confidence_threshold: f32,
    grid_cols: u32,
    grid_rows: u32,
}

impl Default for MotionThresholdDetector {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.3,
            grid_cols: 4,
            grid_rows: 3,
        }
    }
}

impl MotionThresholdDetector {
    pub fn new(confidence_threshold: f32, grid_cols: u32, grid_rows: u32) -> Self {
        Self {
            confidence_threshold,
            grid_cols: grid_cols.max(1),
            grid_rows: grid_rows.max(1),
        }
    }
}

#[async_trait]
impl Detector for MotionThresholdDetector {
    async fn detect(&self, frame: &Frame) -> DirectorResult<Vec<Detection>> {
        if frame.width == 0 || frame.height == 0 || frame.rgb.is_empty() {
            return Ok(Vec::new());
        }

        let mean_luma = frame.mean_luma();
        let cell_w = (frame.width / self.grid_cols).max(1);
        let cell_h = (frame.height / self.grid_rows).max(1);

        let mut detections = Vec::new();
        for row in 0..self.grid_rows {
            for col in 0..self.grid_cols {
                let x0 = col * cell_w;
                let y0 = row * cell_h;
                let x1 = (x0 + cell_w).min(frame.width);
                let y1 = (y0 + cell_h).min(frame.height);
                let cell_luma = cell_mean_luma(frame, x0, y0, x1, y1);
                let deviation = (cell_luma - mean_luma).abs() / 255.0;
                if deviation < self.confidence_threshold {
                    continue;
                }

                let bbox = BBox {
                    x: x0 as f32 / frame.width as f32,
                    y: y0 as f32 / frame.height as f32,
                    width: (x1 - x0) as f32 / frame.width as f32,
                    height: (y1 - y0) as f32 / frame.height as f32,
                };
                detections.push(Detection {
                    class: "motion".into(),
                    confidence: deviation.min(1.0),
                    centroid: Some(bbox.centroid()),
                    bbox,
                    frame_track_id: Some(row * self.grid_cols + col),
                    velocity: None,
                });
            }
        }
        Ok(detections)
    }
}

fn cell_mean_luma(frame: &Frame, x0: u32, y0: u32, x1: u32, y1: u32) -> f32 {
    let mut sum = 0u64;
    let mut n = 0u64;
    for y in y0..y1 {
        for x in x0..x1 {
            let idx = ((y * frame.width + x) * 3) as usize;
            if idx + 2 >= frame.rgb.len() {
                continue;
            }
            let luma = 0.2126 * frame.rgb[idx] as f32
                + 0.7152 * frame.rgb[idx + 1] as f32
                + 0.0722 * frame.rgb[idx + 2] as f32;
            sum += luma as u64;
            n += 1;
        }
    }
    if n == 0 {
        0.0
    } else {
        sum as f32 / n as f32
    }
}
