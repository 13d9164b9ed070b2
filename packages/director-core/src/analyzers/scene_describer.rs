//! SceneDescriber capability: `describe(frame, detections) -> SceneDescription`.
//!
//! Called at a lower cadence than detection because a real model is
//! expensive; the reference implementation is cheap specifically so the
//! cadence gate in the sampler, not the describer itself, is what's under
//! test.

use async_trait::async_trait;

use crate::director_constants::SCENE_DESCRIBER_DEADLINE_MS;
use crate::error::DirectorResult;
use crate::ingress::Frame;
use crate::model::{Detection, SceneDescription};

#[async_trait]
pub trait SceneDescriber: Send + Sync {
    async fn describe(
        &self,
        frame: &Frame,
        detections: &[Detection],
    ) -> DirectorResult<SceneDescription>;

    fn deadline_ms(&self) -> u64 {
        SCENE_DESCRIBER_DEADLINE_MS
    }
}

/// Derives a caption and a 1..=5 interest score from detection density and
/// brightness, standing in for a captioning model.
#[derive(Default)]
pub struct HeuristicSceneDescriber;

#[async_trait]
impl SceneDescriber for HeuristicSceneDescriber {
    async fn describe(
        &self,
        frame: &Frame,
        detections: &[Detection],
    ) -> DirectorResult<SceneDescription> {
        let mean_luma = frame.mean_luma();
        let density = detections.len();

        let interest = match density {
            0 => 1,
            1 => 2,
            2..=3 => 3,
            4..=6 => 4,
            _ => 5,
        };

        let mut tags = Vec::new();
        if density > 0 {
            tags.push("activity".to_string());
        }
        if mean_luma > 180.0 {
            tags.push("bright".to_string());
        } else if mean_luma < 60.0 {
            tags.push("dim".to_string());
        }

        let caption = if density == 0 {
            "static scene".to_string()
        } else {
            format!("{density} subject(s) in frame")
        };

        Ok(SceneDescription {
            tags,
            caption,
            interest,
            confidence: 0.5,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BBox, CameraId};

    fn frame(luma: u8) -> Frame {
        Frame {
            cam_id: CameraId::new("cam-1"),
            ts: 0.0,
            width: 2,
            height: 1,
            rgb: vec![luma; 6],
        }
    }

    fn detection() -> Detection {
        Detection {
            class: "person".into(),
            confidence: 0.9,
            bbox: BBox {
                x: 0.0,
                y: 0.0,
                width: 0.1,
                height: 0.1,
            },
            centroid: None,
            frame_track_id: None,
            velocity: None,
        }
    }

    #[tokio::test]
    async fn empty_scene_has_low_interest() {
        let describer = HeuristicSceneDescriber;
        let desc = describer.describe(&frame(128), &[]).await.unwrap();
        assert_eq!(desc.interest, 1);
        assert!(desc.tags.is_empty());
    }

    #[tokio::test]
    async fn crowded_scene_has_high_interest() {
        let describer = HeuristicSceneDescriber;
        let detections: Vec<_> = (0..7).map(|_| detection()).collect();
        let desc = describer.describe(&frame(128), &detections).await.unwrap();
        assert_eq!(desc.interest, 5);
        assert!(desc.tags.contains(&"activity".to_string()));
    }

    #[tokio::test]
    async fn bright_frame_is_tagged() {
        let describer = HeuristicSceneDescriber;
        let desc = describer.describe(&frame(200), &[]).await.unwrap();
        assert!(desc.tags.contains(&"bright".to_string()));
    }
}
