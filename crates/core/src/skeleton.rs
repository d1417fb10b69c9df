//! Skeleton adjacency and overlay confidence thresholds.

use crate::keypoint::KeypointName;

/// Keypoints at or below this score are not drawn.
pub const KEYPOINT_SCORE_THRESHOLD: f32 = 0.1;

/// A bone is drawn only when both endpoints score above this.
pub const SKELETON_SCORE_THRESHOLD: f32 = 0.2;

/// Radius of a drawn keypoint disc, in pixels.
pub const KEYPOINT_RADIUS_PX: i32 = 5;

/// Width of a drawn skeleton line, in pixels.
pub const SKELETON_LINE_WIDTH_PX: u32 = 2;

/// Bones of the 17-point schema (model indices 0-1, 1-3, 3-5, 0-2, 2-4,
/// 4-6, 5-7, 7-9, 6-8, 8-10, 5-11, 6-12, 11-13, 13-15, 12-14, 14-16).
pub const SKELETON_CONNECTIONS: [(KeypointName, KeypointName); 16] = [
    // head, left side down to the shoulder
    (KeypointName::Nose, KeypointName::LeftEye),
    (KeypointName::LeftEye, KeypointName::LeftEar),
    (KeypointName::LeftEar, KeypointName::LeftShoulder),
    // head, right side
    (KeypointName::Nose, KeypointName::RightEye),
    (KeypointName::RightEye, KeypointName::RightEar),
    (KeypointName::RightEar, KeypointName::RightShoulder),
    // arms
    (KeypointName::LeftShoulder, KeypointName::LeftElbow),
    (KeypointName::LeftElbow, KeypointName::LeftWrist),
    (KeypointName::RightShoulder, KeypointName::RightElbow),
    (KeypointName::RightElbow, KeypointName::RightWrist),
    // torso
    (KeypointName::LeftShoulder, KeypointName::LeftHip),
    (KeypointName::RightShoulder, KeypointName::RightHip),
    // legs
    (KeypointName::LeftHip, KeypointName::LeftKnee),
    (KeypointName::LeftKnee, KeypointName::LeftAnkle),
    (KeypointName::RightHip, KeypointName::RightKnee),
    (KeypointName::RightKnee, KeypointName::RightAnkle),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connections_match_model_index_pairs() {
        let expected: [(usize, usize); 16] = [
            (0, 1),
            (1, 3),
            (3, 5),
            (0, 2),
            (2, 4),
            (4, 6),
            (5, 7),
            (7, 9),
            (6, 8),
            (8, 10),
            (5, 11),
            (6, 12),
            (11, 13),
            (13, 15),
            (12, 14),
            (14, 16),
        ];
        let actual: Vec<(usize, usize)> = SKELETON_CONNECTIONS
            .iter()
            .map(|(a, b)| (a.index(), b.index()))
            .collect();
        assert_eq!(actual, expected);
    }
}
