//! Single-person pose landmark estimation (BlazePose-style ONNX model).
//!
//! Model contract:
//! - input: `[1, 256, 256, 3]` RGB, `[0, 1]` floats (NHWC)
//! - landmark output: 195 floats = 33 landmarks x (x, y, z, visibility,
//!   presence), coordinates in input-pixel units
//! - pose-flag output: one score in `[0, 1]`; below the threshold means no
//!   person was found, which is an empty result, never an error
//!
//! Landmark coordinates are normalized to `[0, 1]` of the source frame and
//! visibilities are squashed through a sigmoid before leaving this module.

use std::path::Path;
use std::sync::Mutex;

use image::DynamicImage;
use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::debug;

use crate::error::{VisionError, VisionResult};
use crate::registry::create_session;

/// Fixed landmark count of the pose model.
pub const LANDMARK_COUNT: usize = 33;

/// Values exported per landmark by the model.
const VALUES_PER_LANDMARK: usize = 5;

/// Skeleton edges over the 33-landmark topology, used by the overlay.
pub const POSE_CONNECTIONS: &[(usize, usize)] = &[
    (0, 1), (1, 2), (2, 3), (3, 7), (0, 4), (4, 5), (5, 6), (6, 8),
    (9, 10), (11, 12), (11, 13), (13, 15), (15, 17), (15, 19), (15, 21),
    (17, 19), (12, 14), (14, 16), (16, 18), (16, 20), (16, 22), (18, 20),
    (11, 23), (12, 24), (23, 24), (23, 25), (24, 26), (25, 27), (26, 28),
    (27, 29), (28, 30), (29, 31), (30, 32), (27, 31), (28, 32),
];

/// One body landmark in `[0, 1]` frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// Visibility in `[0, 1]`.
    pub visibility: f32,
}

/// A detected pose: 33 ordered landmarks plus the model's presence score.
#[derive(Debug, Clone, PartialEq)]
pub struct Landmarks {
    pub points: Vec<Landmark>,
    pub presence: f32,
}

/// Configuration for the pose estimator.
#[derive(Debug, Clone)]
pub struct PoseConfig {
    pub model_path: String,
    /// Square model input size.
    pub input_size: u32,
    /// Pose-flag scores below this mean "no pose detected".
    pub presence_threshold: f32,
}

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            model_path: "models/pose_landmark.onnx".to_string(),
            input_size: 256,
            presence_threshold: 0.5,
        }
    }
}

impl PoseConfig {
    /// Read overrides from the environment.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            model_path: std::env::var("POSE_MODEL_PATH").unwrap_or(defaults.model_path),
            input_size: defaults.input_size,
            presence_threshold: std::env::var("POSE_PRESENCE_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.presence_threshold),
        }
    }
}

/// ONNX Runtime wrapper for the pose landmark model.
pub struct PoseEstimator {
    session: Mutex<Session>,
    config: PoseConfig,
}

impl PoseEstimator {
    /// Load the pose model.
    pub fn new(config: PoseConfig) -> VisionResult<Self> {
        let session = create_session(Path::new(&config.model_path))?;
        Ok(Self {
            session: Mutex::new(session),
            config,
        })
    }

    /// Estimate landmarks for the most prominent person in the image.
    ///
    /// `Ok(None)` means the model ran and found no pose.
    pub fn estimate(&self, img: &DynamicImage) -> VisionResult<Option<Landmarks>> {
        let input = self.preprocess(img)?;
        let (raw_landmarks, presence) = self.run_inference(input)?;

        if presence < self.config.presence_threshold {
            debug!(presence, "no pose detected");
            return Ok(None);
        }

        let landmarks = decode_landmarks(&raw_landmarks, self.config.input_size, presence)?;
        Ok(Some(landmarks))
    }

    /// Resize to the square input and lay out as `[0, 1]` NHWC floats.
    fn preprocess(&self, img: &DynamicImage) -> VisionResult<Value> {
        let side = self.config.input_size;
        let rgb = img
            .resize_exact(side, side, image::imageops::FilterType::Triangle)
            .to_rgb8();

        let hwc: Vec<f32> = rgb.as_raw().iter().map(|&b| b as f32 / 255.0).collect();
        let shape = vec![1usize, side as usize, side as usize, 3];

        Tensor::from_array((shape, hwc.into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| VisionError::inference(format!("failed to create pose tensor: {e}")))
    }

    fn run_inference(&self, input: Value) -> VisionResult<(Vec<f32>, f32)> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| VisionError::inference("pose session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| VisionError::inference(format!("pose run failed: {e}")))?;

        // Converted models keep either the descriptive names or the TF
        // default "Identity*" names.
        let landmarks = outputs
            .get("landmarks")
            .or_else(|| outputs.get("Identity"))
            .ok_or_else(|| VisionError::inference("pose landmark tensor missing"))?
            .try_extract_tensor::<f32>()
            .map_err(|e| VisionError::inference(format!("failed to extract landmarks: {e}")))?
            .1
            .to_vec();

        let presence = outputs
            .get("output_poseflag")
            .or_else(|| outputs.get("Identity_1"))
            .ok_or_else(|| VisionError::inference("pose flag tensor missing"))?
            .try_extract_tensor::<f32>()
            .map_err(|e| VisionError::inference(format!("failed to extract pose flag: {e}")))?
            .1
            .first()
            .copied()
            .unwrap_or(0.0);

        Ok((landmarks, presence))
    }
}

/// Convert the raw 195-float tensor into normalized landmarks.
pub(crate) fn decode_landmarks(
    raw: &[f32],
    input_size: u32,
    presence: f32,
) -> VisionResult<Landmarks> {
    if raw.len() < LANDMARK_COUNT * VALUES_PER_LANDMARK {
        return Err(VisionError::inference(format!(
            "unexpected pose output size: {}",
            raw.len()
        )));
    }

    let scale = input_size as f32;
    let points = raw
        .chunks_exact(VALUES_PER_LANDMARK)
        .take(LANDMARK_COUNT)
        .map(|lm| Landmark {
            x: lm[0] / scale,
            y: lm[1] / scale,
            z: lm[2] / scale,
            // Raw visibility is a logit.
            visibility: sigmoid(lm[3]),
        })
        .collect();

    Ok(Landmarks { points, presence })
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connections_are_in_range() {
        for &(a, b) in POSE_CONNECTIONS {
            assert!(a < LANDMARK_COUNT);
            assert!(b < LANDMARK_COUNT);
        }
    }

    #[test]
    fn test_decode_normalizes_coordinates() {
        let mut raw = vec![0.0f32; LANDMARK_COUNT * VALUES_PER_LANDMARK];
        // First landmark at pixel (128, 64), depth 32, very visible.
        raw[0] = 128.0;
        raw[1] = 64.0;
        raw[2] = 32.0;
        raw[3] = 10.0;

        let lms = decode_landmarks(&raw, 256, 0.9).unwrap();
        assert_eq!(lms.points.len(), LANDMARK_COUNT);
        assert!((lms.points[0].x - 0.5).abs() < 1e-6);
        assert!((lms.points[0].y - 0.25).abs() < 1e-6);
        assert!(lms.points[0].visibility > 0.99);
        assert_eq!(lms.presence, 0.9);
    }

    #[test]
    fn test_decode_rejects_truncated_output() {
        assert!(decode_landmarks(&[0.0; 10], 256, 0.9).is_err());
    }

    #[test]
    fn test_sigmoid_bounds() {
        assert!(sigmoid(-20.0) < 1e-6);
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
        assert!(sigmoid(20.0) > 1.0 - 1e-6);
    }
}
