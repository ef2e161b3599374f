//! Result normalization: raw model outputs -> tagged `DetectionItem`s.
//!
//! Pure functions with no state. The normalizer, not downstream consumers,
//! decides which tag a raw output gets.

use shotsense_models::DetectionItem;

use crate::classifier::FEATURE_LEN;
use crate::detector::RawDetection;
use crate::pose::Landmarks;

/// Normalize detector output into wire items.
///
/// Emits one `Box` per detection (names resolved through `class_names`,
/// falling back to the stringified id), followed by one `Pose` item per
/// keypoint-bearing detection, preserving detection order within each
/// group.
pub fn detector_items(raw: &[RawDetection], class_names: Option<&[String]>) -> Vec<DetectionItem> {
    let mut items: Vec<DetectionItem> = raw
        .iter()
        .map(|d| DetectionItem::Box {
            class_id: d.class_id,
            class_name: class_name_for(d.class_id, class_names),
            conf: d.confidence,
            xyxy: d.xyxy,
        })
        .collect();

    items.extend(raw.iter().filter_map(|d| {
        d.keypoints.as_ref().map(|kps| DetectionItem::Pose {
            conf: d.confidence,
            keypoints: kps.clone(),
        })
    }));

    items
}

/// Resolve a class name, falling back to the stringified numeric id when
/// the table is absent or does not cover the id.
pub fn class_name_for(class_id: usize, class_names: Option<&[String]>) -> String {
    class_names
        .and_then(|names| names.get(class_id))
        .cloned()
        .unwrap_or_else(|| class_id.to_string())
}

/// Flatten landmarks into the exact feature vector the shot classifier
/// expects: `(x, y, z, visibility)` per landmark, in landmark order.
pub fn feature_vector(landmarks: &Landmarks) -> Vec<f32> {
    let mut features = Vec::with_capacity(FEATURE_LEN);
    for lm in &landmarks.points {
        features.extend_from_slice(&[lm.x, lm.y, lm.z, lm.visibility]);
    }
    features
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::{Landmark, LANDMARK_COUNT};

    fn raw(class_id: usize, confidence: f32, keypoints: Option<Vec<(f32, f32)>>) -> RawDetection {
        RawDetection {
            class_id,
            confidence,
            xyxy: [0.0, 0.0, 10.0, 10.0],
            keypoints,
        }
    }

    #[test]
    fn test_class_name_fallbacks() {
        let table = vec!["Batsman".to_string(), "Drive".to_string()];
        assert_eq!(class_name_for(1, Some(&table)), "Drive");
        assert_eq!(class_name_for(7, Some(&table)), "7");
        assert_eq!(class_name_for(3, None), "3");
    }

    #[test]
    fn test_boxes_precede_poses_in_detection_order() {
        let table = vec!["Batsman".to_string()];
        let items = detector_items(
            &[
                raw(0, 0.9, Some(vec![(1.0, 2.0)])),
                raw(0, 0.6, None),
            ],
            Some(&table),
        );

        assert_eq!(items.len(), 3);
        assert!(items[0].is_box());
        assert!(items[1].is_box());
        assert!(matches!(&items[2], DetectionItem::Pose { keypoints, .. } if keypoints.len() == 1));
        assert_eq!(items[0].conf(), 0.9);
        assert_eq!(items[1].conf(), 0.6);
    }

    #[test]
    fn test_empty_input_yields_empty_output() {
        assert!(detector_items(&[], None).is_empty());
    }

    #[test]
    fn test_feature_vector_layout() {
        let mut points = vec![
            Landmark {
                x: 0.0,
                y: 0.0,
                z: 0.0,
                visibility: 0.0,
            };
            LANDMARK_COUNT
        ];
        points[0] = Landmark {
            x: 0.1,
            y: 0.2,
            z: 0.3,
            visibility: 0.4,
        };

        let features = feature_vector(&Landmarks {
            points,
            presence: 1.0,
        });
        assert_eq!(features.len(), FEATURE_LEN);
        assert_eq!(&features[..4], &[0.1, 0.2, 0.3, 0.4]);
    }
}
