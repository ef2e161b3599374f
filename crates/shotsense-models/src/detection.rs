//! Normalized inference result items.
//!
//! Every model output is normalized into a tagged `DetectionItem` before it
//! crosses a protocol boundary, so callers never branch on raw model shapes.

use serde::{Deserialize, Serialize};

/// One normalized detection, tagged by kind on the wire (`"type"` field).
///
/// Ordering inside a result vector is the detection order reported by the
/// underlying model call. Confidences are in `[0, 1]`; box coordinates are
/// in source-image pixel space with `x1 <= x2` and `y1 <= y2`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DetectionItem {
    /// Object-detector bounding box.
    Box {
        class_id: usize,
        class_name: String,
        conf: f32,
        /// `[x1, y1, x2, y2]` in source-image pixels.
        xyxy: [f32; 4],
    },
    /// Pose instance with ordered 2-D keypoints in source-image pixels.
    Pose {
        conf: f32,
        keypoints: Vec<(f32, f32)>,
    },
    /// Classifier label, produced either by a classification head or by the
    /// pose-feature shot classifier.
    Classification {
        #[serde(skip_serializing_if = "Option::is_none")]
        class_id: Option<usize>,
        class_name: String,
        conf: f32,
    },
}

impl DetectionItem {
    /// Detection confidence, regardless of variant.
    pub fn conf(&self) -> f32 {
        match self {
            DetectionItem::Box { conf, .. }
            | DetectionItem::Pose { conf, .. }
            | DetectionItem::Classification { conf, .. } => *conf,
        }
    }

    /// True for `Box` items.
    pub fn is_box(&self) -> bool {
        matches!(self, DetectionItem::Box { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_wire_format() {
        let item = DetectionItem::Box {
            class_id: 0,
            class_name: "Batsman".to_string(),
            conf: 0.91,
            xyxy: [10.0, 20.0, 110.0, 220.0],
        };

        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["type"], "box");
        assert_eq!(json["class_name"], "Batsman");
        assert_eq!(json["xyxy"][2], 110.0);
    }

    #[test]
    fn test_pose_keypoints_as_pairs() {
        let item = DetectionItem::Pose {
            conf: 0.8,
            keypoints: vec![(1.0, 2.0), (3.0, 4.0)],
        };

        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["type"], "pose");
        assert_eq!(json["keypoints"][1][0], 3.0);
    }

    #[test]
    fn test_classification_omits_missing_class_id() {
        let item = DetectionItem::Classification {
            class_id: None,
            class_name: "Pull Shot".to_string(),
            conf: 0.75,
        };

        let json = serde_json::to_value(&item).unwrap();
        assert!(json.get("class_id").is_none());
        assert_eq!(json["type"], "classification");
    }

    #[test]
    fn test_round_trip() {
        let items = vec![
            DetectionItem::Box {
                class_id: 1,
                class_name: "Drive".to_string(),
                conf: 0.5,
                xyxy: [0.0, 0.0, 5.0, 5.0],
            },
            DetectionItem::Classification {
                class_id: Some(2),
                class_name: "Sweep".to_string(),
                conf: 1.0,
            },
        ];

        let json = serde_json::to_string(&items).unwrap();
        let parsed: Vec<DetectionItem> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, items);
    }
}
