//! Keypoints and the 17-point body schema.
//!
//! The schema follows the documented output order of MoveNet / COCO
//! single-person models. Downstream lookups (angles, skeleton lines) are
//! by name, so a filtered set never needs to keep positional indices.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::geometry::Point;

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Named keypoints of the 17-point body schema, in model output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(usize)]
pub enum KeypointName {
    Nose = 0,
    LeftEye = 1,
    RightEye = 2,
    LeftEar = 3,
    RightEar = 4,
    LeftShoulder = 5,
    RightShoulder = 6,
    LeftElbow = 7,
    RightElbow = 8,
    LeftWrist = 9,
    RightWrist = 10,
    LeftHip = 11,
    RightHip = 12,
    LeftKnee = 13,
    RightKnee = 14,
    LeftAnkle = 15,
    RightAnkle = 16,
}

impl KeypointName {
    pub const COUNT: usize = 17;

    /// Every schema entry, indexed by model output position.
    pub const ALL: [KeypointName; Self::COUNT] = [
        Self::Nose,
        Self::LeftEye,
        Self::RightEye,
        Self::LeftEar,
        Self::RightEar,
        Self::LeftShoulder,
        Self::RightShoulder,
        Self::LeftElbow,
        Self::RightElbow,
        Self::LeftWrist,
        Self::RightWrist,
        Self::LeftHip,
        Self::RightHip,
        Self::LeftKnee,
        Self::RightKnee,
        Self::LeftAnkle,
        Self::RightAnkle,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Wire name emitted by the pose model, e.g. `"left_shoulder"`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Nose => "nose",
            Self::LeftEye => "left_eye",
            Self::RightEye => "right_eye",
            Self::LeftEar => "left_ear",
            Self::RightEar => "right_ear",
            Self::LeftShoulder => "left_shoulder",
            Self::RightShoulder => "right_shoulder",
            Self::LeftElbow => "left_elbow",
            Self::RightElbow => "right_elbow",
            Self::LeftWrist => "left_wrist",
            Self::RightWrist => "right_wrist",
            Self::LeftHip => "left_hip",
            Self::RightHip => "right_hip",
            Self::LeftKnee => "left_knee",
            Self::RightKnee => "right_knee",
            Self::LeftAnkle => "left_ankle",
            Self::RightAnkle => "right_ankle",
        }
    }
}

impl fmt::Display for KeypointName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeypointName {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("unknown keypoint name '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// Keypoint
// ---------------------------------------------------------------------------

/// A single detected keypoint in pixel coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub name: String,
    pub x: f32,
    pub y: f32,
    /// Detector confidence in `0.0..=1.0`.
    pub score: f32,
}

/// Keypoints for one detected body in one frame. May be empty.
pub type KeypointSet = Vec<Keypoint>;

impl Keypoint {
    pub fn new(name: impl Into<String>, x: f32, y: f32, score: f32) -> Self {
        Self {
            name: name.into(),
            x,
            y,
            score,
        }
    }

    pub fn point(&self) -> Point {
        Point::new(self.x as f64, self.y as f64)
    }

    pub fn is_named(&self, name: KeypointName) -> bool {
        self.name == name.as_str()
    }
}

/// First keypoint carrying `name`. Duplicates are tolerated, not rejected.
pub fn find_keypoint(keypoints: &[Keypoint], name: KeypointName) -> Option<&Keypoint> {
    keypoints.iter().find(|kp| kp.is_named(name))
}

/// Reject keypoint sets whose names fall outside the 17-point schema.
///
/// A mismatch means the estimator is configured with a different model
/// layout; drawing or measuring against it would silently mislabel joints.
pub fn check_schema(keypoints: &[Keypoint]) -> Result<(), CoreError> {
    let unknown: Vec<&str> = keypoints
        .iter()
        .filter(|kp| kp.name.parse::<KeypointName>().is_err())
        .map(|kp| kp.name.as_str())
        .collect();

    if unknown.is_empty() {
        Ok(())
    } else {
        Err(CoreError::SchemaMismatch(format!(
            "keypoints outside the 17-point schema: {}",
            unknown.join(", ")
        )))
    }
}
