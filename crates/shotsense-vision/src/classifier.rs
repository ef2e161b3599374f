//! Shot classification over flattened pose features.
//!
//! Model contract: input `[1, 132]` floats (33 landmarks x (x, y, z,
//! visibility)); output either a `[1, C]` score tensor (probabilities or
//! logits) or an int64 label index. When probabilities are available the
//! reported confidence is the maximum probability, otherwise it is fixed
//! at 1.0.

use std::path::Path;
use std::sync::Mutex;

use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::debug;

use crate::error::{VisionError, VisionResult};
use crate::labels::SHOT_CLASSES;
use crate::registry::create_session;

/// Expected feature-vector length (33 landmarks x 4 values).
pub const FEATURE_LEN: usize = 132;

/// Classifier output.
#[derive(Debug, Clone, PartialEq)]
pub struct ShotPrediction {
    pub class_id: usize,
    /// Raw model label, before canonicalization.
    pub label: String,
    /// Max class probability, or 1.0 when the model exposes none.
    pub confidence: f32,
}

/// Configuration for the shot classifier.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub model_path: String,
    /// Class labels in model output order.
    pub labels: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_path: "models/shot_classifier.onnx".to_string(),
            labels: SHOT_CLASSES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ClassifierConfig {
    /// Read overrides from the environment.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            model_path: std::env::var("CLASSIFIER_MODEL_PATH").unwrap_or(defaults.model_path),
            labels: std::env::var("SHOT_LABELS")
                .map(|s| s.split(',').map(|l| l.trim().to_string()).collect())
                .unwrap_or(defaults.labels),
        }
    }
}

/// ONNX Runtime wrapper for the shot classifier.
pub struct ShotClassifier {
    session: Mutex<Session>,
    config: ClassifierConfig,
}

impl ShotClassifier {
    /// Load the classifier.
    pub fn new(config: ClassifierConfig) -> VisionResult<Self> {
        let session = create_session(Path::new(&config.model_path))?;
        Ok(Self {
            session: Mutex::new(session),
            config,
        })
    }

    /// Classify a pose feature vector.
    pub fn classify(&self, features: &[f32]) -> VisionResult<ShotPrediction> {
        if features.len() != FEATURE_LEN {
            return Err(VisionError::inference(format!(
                "classifier expects {FEATURE_LEN} features, got {}",
                features.len()
            )));
        }

        let input: Value = Tensor::from_array((
            vec![1usize, FEATURE_LEN],
            features.to_vec().into_boxed_slice(),
        ))
        .map(Value::from)
        .map_err(|e| VisionError::inference(format!("failed to create classifier tensor: {e}")))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| VisionError::inference("classifier session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| VisionError::inference(format!("classifier run failed: {e}")))?;

        let scores_value = outputs
            .get("probabilities")
            .or_else(|| outputs.get("output0"))
            .ok_or_else(|| VisionError::inference("classifier output tensor missing"))?;

        // Score tensor when the model exposes probabilities; int64 label
        // index otherwise.
        let (class_id, confidence) = match scores_value.try_extract_tensor::<f32>() {
            Ok(scores) => {
                let probs = as_probabilities(scores.1);
                argmax(&probs).ok_or_else(|| {
                    VisionError::inference("classifier returned an empty score tensor")
                })?
            }
            Err(_) => {
                let label = scores_value
                    .try_extract_tensor::<i64>()
                    .map_err(|e| {
                        VisionError::inference(format!("failed to extract classifier output: {e}"))
                    })?
                    .1
                    .first()
                    .copied()
                    .unwrap_or(0);
                (label.max(0) as usize, 1.0)
            }
        };

        let label = self.label_for(class_id);
        debug!(class_id, %label, confidence, "shot classified");

        Ok(ShotPrediction {
            class_id,
            label,
            confidence,
        })
    }

    fn label_for(&self, class_id: usize) -> String {
        self.config
            .labels
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| class_id.to_string())
    }
}

/// Interpret raw scores as probabilities, applying softmax to logits.
pub(crate) fn as_probabilities(scores: &[f32]) -> Vec<f32> {
    let looks_like_probs = scores.iter().all(|&s| (0.0..=1.0).contains(&s))
        && (scores.iter().sum::<f32>() - 1.0).abs() < 0.01;
    if looks_like_probs {
        return scores.to_vec();
    }

    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|&s| (s - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

fn argmax(probs: &[f32]) -> Option<(usize, f32)> {
    probs
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, &p)| (i, p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probabilities_pass_through() {
        let probs = as_probabilities(&[0.1, 0.7, 0.2]);
        assert!((probs[1] - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_logits_are_softmaxed() {
        let probs = as_probabilities(&[2.0, 0.0, -2.0]);
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(probs[0] > probs[1] && probs[1] > probs[2]);
        assert!(probs.iter().all(|&p| (0.0..=1.0).contains(&p)));
    }

    #[test]
    fn test_argmax() {
        assert_eq!(argmax(&[0.2, 0.5, 0.3]), Some((1, 0.5)));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn test_default_labels_match_table() {
        let config = ClassifierConfig::default();
        assert_eq!(config.labels.len(), SHOT_CLASSES.len());
        assert_eq!(config.labels[0], "Batsman");
    }
}
