//! Comparison of measured joint angles against a reference pose.

use serde::{Deserialize, Serialize};

use crate::angles::{AngleSet, JointAngle};

/// Default allowed deviation from the reference angle, in degrees.
pub const DEFAULT_ANGLE_TOLERANCE_DEG: f64 = 10.0;

/// Outcome of comparing one joint angle with its reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AngleVerdict {
    WithinTolerance,
    NeedsAdjustment,
}

/// Per-joint comparison row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AngleComparison {
    pub joint: JointAngle,
    pub actual: f64,
    pub expected: f64,
    /// `actual - expected`; negative means the joint is more closed.
    pub deviation: f64,
    pub verdict: AngleVerdict,
}

/// Classify `actual` against `expected` with an inclusive `tolerance`.
pub fn compare_angle(actual: f64, expected: f64, tolerance: f64) -> AngleVerdict {
    if (actual - expected).abs() <= tolerance {
        AngleVerdict::WithinTolerance
    } else {
        AngleVerdict::NeedsAdjustment
    }
}

/// Compare every joint present in both `actual` and `reference`.
///
/// Joints missing from either side are skipped. Rows come out in
/// [`JointAngle::ALL`] order.
pub fn compare_angle_sets(
    actual: &AngleSet,
    reference: &AngleSet,
    tolerance: f64,
) -> Vec<AngleComparison> {
    JointAngle::ALL
        .iter()
        .filter_map(|&joint| {
            let a = actual.get(joint)?;
            let e = reference.get(joint)?;
            Some(AngleComparison {
                joint,
                actual: a,
                expected: e,
                deviation: a - e,
                verdict: compare_angle(a, e, tolerance),
            })
        })
        .collect()
}

/// `true` when every compared joint is within tolerance.
pub fn all_within_tolerance(rows: &[AngleComparison]) -> bool {
    rows.iter()
        .all(|row| row.verdict == AngleVerdict::WithinTolerance)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tolerance_is_inclusive() {
        assert_eq!(compare_angle(100.0, 90.0, 10.0), AngleVerdict::WithinTolerance);
        assert_eq!(compare_angle(80.0, 90.0, 10.0), AngleVerdict::WithinTolerance);
        assert_eq!(compare_angle(100.5, 90.0, 10.0), AngleVerdict::NeedsAdjustment);
    }

    #[test]
    fn test_compare_sets_skips_unshared_joints() {
        let actual: AngleSet = [
            (JointAngle::LeftElbow, 95.0),
            (JointAngle::RightKnee, 150.0),
        ]
        .into_iter()
        .collect();
        let reference: AngleSet = [
            (JointAngle::LeftElbow, 90.0),
            (JointAngle::LeftKnee, 170.0),
        ]
        .into_iter()
        .collect();

        let rows = compare_angle_sets(&actual, &reference, DEFAULT_ANGLE_TOLERANCE_DEG);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].joint, JointAngle::LeftElbow);
        assert!((rows[0].deviation - 5.0).abs() < 1e-9);
        assert_eq!(rows[0].verdict, AngleVerdict::WithinTolerance);
    }

    #[test]
    fn test_compare_sets_flags_large_deviation() {
        let actual: AngleSet = [(JointAngle::RightElbow, 60.0)].into_iter().collect();
        let reference: AngleSet = [(JointAngle::RightElbow, 90.0)].into_iter().collect();
        let rows = compare_angle_sets(&actual, &reference, DEFAULT_ANGLE_TOLERANCE_DEG);
        assert_eq!(rows[0].verdict, AngleVerdict::NeedsAdjustment);
        assert!((rows[0].deviation + 30.0).abs() < 1e-9);
        assert!(!all_within_tolerance(&rows));
    }

    #[test]
    fn test_all_within_tolerance_on_empty() {
        assert!(all_within_tolerance(&[]));
    }

    #[test]
    fn test_reference_deserializes_from_public_keys() {
        let reference: AngleSet =
            serde_json::from_str(r#"{"leftElbowAngle": 90.0, "rightKneeAngle": 175.5}"#).unwrap();
        assert_eq!(reference.get(JointAngle::LeftElbow), Some(90.0));
        assert_eq!(reference.get(JointAngle::RightKnee), Some(175.5));
    }
}
