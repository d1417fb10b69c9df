//! Joint-angle evaluation over a filtered keypoint set.
//!
//! Eight fixed joints are measured. A joint is reported only when all
//! three of its defining keypoints are present; partial results are the
//! normal case for side-on or cropped frames.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::geometry::angle_at;
use crate::keypoint::{find_keypoint, Keypoint, KeypointName};

// ---------------------------------------------------------------------------
// JointAngle
// ---------------------------------------------------------------------------

/// The measured joints, serialized with their public JSON keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum JointAngle {
    #[serde(rename = "leftElbowAngle")]
    LeftElbow,
    #[serde(rename = "rightElbowAngle")]
    RightElbow,
    #[serde(rename = "leftShoulderAngle")]
    LeftShoulder,
    #[serde(rename = "rightShoulderAngle")]
    RightShoulder,
    #[serde(rename = "leftHipAngle")]
    LeftHip,
    #[serde(rename = "rightHipAngle")]
    RightHip,
    #[serde(rename = "leftKneeAngle")]
    LeftKnee,
    #[serde(rename = "rightKneeAngle")]
    RightKnee,
}

impl JointAngle {
    pub const ALL: [JointAngle; 8] = [
        Self::LeftElbow,
        Self::RightElbow,
        Self::LeftShoulder,
        Self::RightShoulder,
        Self::LeftHip,
        Self::RightHip,
        Self::LeftKnee,
        Self::RightKnee,
    ];

    /// `(a, vertex, c)` keypoints defining the joint.
    pub fn triple(self) -> (KeypointName, KeypointName, KeypointName) {
        use KeypointName::*;
        match self {
            Self::LeftElbow => (LeftShoulder, LeftElbow, LeftWrist),
            Self::RightElbow => (RightShoulder, RightElbow, RightWrist),
            Self::LeftShoulder => (LeftHip, LeftShoulder, LeftElbow),
            Self::RightShoulder => (RightHip, RightShoulder, RightElbow),
            Self::LeftHip => (LeftShoulder, LeftHip, LeftKnee),
            Self::RightHip => (RightShoulder, RightHip, RightKnee),
            Self::LeftKnee => (LeftHip, LeftKnee, LeftAnkle),
            Self::RightKnee => (RightHip, RightKnee, RightAnkle),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::LeftElbow => "leftElbowAngle",
            Self::RightElbow => "rightElbowAngle",
            Self::LeftShoulder => "leftShoulderAngle",
            Self::RightShoulder => "rightShoulderAngle",
            Self::LeftHip => "leftHipAngle",
            Self::RightHip => "rightHipAngle",
            Self::LeftKnee => "leftKneeAngle",
            Self::RightKnee => "rightKneeAngle",
        }
    }
}

// ---------------------------------------------------------------------------
// AngleSet
// ---------------------------------------------------------------------------

/// Joint angles in degrees, keyed by joint. Absent joints are omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AngleSet(BTreeMap<JointAngle, f64>);

impl AngleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, joint: JointAngle) -> Option<f64> {
        self.0.get(&joint).copied()
    }

    pub fn contains(&self, joint: JointAngle) -> bool {
        self.0.contains_key(&joint)
    }

    pub fn insert(&mut self, joint: JointAngle, degrees: f64) {
        self.0.insert(joint, degrees);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (JointAngle, f64)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }
}

impl FromIterator<(JointAngle, f64)> for AngleSet {
    fn from_iter<I: IntoIterator<Item = (JointAngle, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Angles measured on one video frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameResult {
    /// 1-based frame index as embedded in the extracted file name.
    #[serde(rename = "frame")]
    pub frame_index: u64,
    pub angles: AngleSet,
}

impl FrameResult {
    pub fn empty(frame_index: u64) -> Self {
        Self {
            frame_index,
            angles: AngleSet::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Measure every joint whose three keypoints are present in `keypoints`.
///
/// Keypoints are matched by exact name, first match wins. A joint whose
/// keypoints coincide (zero-length ray) is omitted like a missing one.
pub fn evaluate_angles(keypoints: &[Keypoint]) -> AngleSet {
    JointAngle::ALL
        .iter()
        .filter_map(|&joint| {
            let (a, b, c) = joint.triple();
            let a = find_keypoint(keypoints, a)?;
            let b = find_keypoint(keypoints, b)?;
            let c = find_keypoint(keypoints, c)?;
            angle_at(a.point(), b.point(), c.point())
                .ok()
                .map(|deg| (joint, deg))
        })
        .collect()
}
