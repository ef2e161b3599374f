//! Inference mode selection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which pipeline path a request wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Object detection (bounding boxes). The service default.
    #[default]
    Detect,
    /// Pose landmarks plus shot classification.
    Pose,
}

impl Mode {
    /// Parse a mode string, falling back to `Detect` for anything
    /// unrecognized. Matches the historical wire behavior where unknown
    /// modes run the detector path.
    pub fn parse_or_default(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // "yolo" and "mediapipe" are the legacy wire values.
        match s.trim().to_ascii_lowercase().as_str() {
            "detect" | "yolo" => Ok(Mode::Detect),
            "pose" | "mediapipe" => Ok(Mode::Pose),
            other => Err(format!("unknown mode: {other}")),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Detect => write!(f, "detect"),
            Mode::Pose => write!(f, "pose"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_canonical() {
        assert_eq!("detect".parse::<Mode>().unwrap(), Mode::Detect);
        assert_eq!("pose".parse::<Mode>().unwrap(), Mode::Pose);
    }

    #[test]
    fn test_parse_legacy_aliases() {
        assert_eq!("yolo".parse::<Mode>().unwrap(), Mode::Detect);
        assert_eq!("mediapipe".parse::<Mode>().unwrap(), Mode::Pose);
        assert_eq!("POSE".parse::<Mode>().unwrap(), Mode::Pose);
    }

    #[test]
    fn test_unknown_falls_back_to_detect() {
        assert!("segment".parse::<Mode>().is_err());
        assert_eq!(Mode::parse_or_default("segment"), Mode::Detect);
        assert_eq!(Mode::default(), Mode::Detect);
    }
}
