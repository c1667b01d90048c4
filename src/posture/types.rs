use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Error};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum PostureClass {
    Good,
    Bad,
    LeaningForward,
}

impl PostureClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostureClass::Good => "good",
            PostureClass::Bad => "bad",
            PostureClass::LeaningForward => "leaning_forward",
        }
    }
}

impl fmt::Display for PostureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts the label spellings emitted by the classifier heads we have seen
/// ("Good Posture", "bad_posture", "leaning-forward", ...).
impl FromStr for PostureClass {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized: String = value
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();

        match normalized.as_str() {
            "good" | "goodposture" => Ok(PostureClass::Good),
            "bad" | "badposture" | "slouching" => Ok(PostureClass::Bad),
            "leaningforward" | "leaning" | "forward" => Ok(PostureClass::LeaningForward),
            _ => Err(anyhow!("unknown posture class '{value}'")),
        }
    }
}

/// One classified frame.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    pub posture_class: PostureClass,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StabilizedPrediction {
    pub posture_class: PostureClass,
    pub confidence: f64,
    pub is_stable: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Keypoint {
    pub x: f64,
    pub y: f64,
    pub score: f64,
}

/// Raw estimator output for a single camera frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PoseFrame {
    #[serde(default)]
    pub keypoints: Vec<Keypoint>,
    #[serde(rename = "class")]
    pub class_label: String,
    pub confidence: f64,
}

impl PoseFrame {
    pub fn posture_class(&self) -> anyhow::Result<PostureClass> {
        self.class_label.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_classifier_label_variants() {
        assert_eq!("Good".parse::<PostureClass>().unwrap(), PostureClass::Good);
        assert_eq!(
            "bad_posture".parse::<PostureClass>().unwrap(),
            PostureClass::Bad
        );
        assert_eq!(
            "Leaning Forward".parse::<PostureClass>().unwrap(),
            PostureClass::LeaningForward
        );
        assert_eq!(
            "leaning-forward".parse::<PostureClass>().unwrap(),
            PostureClass::LeaningForward
        );
        assert!("standing".parse::<PostureClass>().is_err());
    }

    #[test]
    fn pose_frame_reads_class_field() {
        let frame: PoseFrame = serde_json::from_str(
            r#"{"keypoints":[{"x":1.0,"y":2.0,"score":0.9}],"class":"good","confidence":0.8}"#,
        )
        .unwrap();

        assert_eq!(frame.posture_class().unwrap(), PostureClass::Good);
        assert_eq!(frame.keypoints.len(), 1);
    }
}
