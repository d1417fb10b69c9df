//! Keypoint blocklist filtering.

use std::collections::BTreeSet;

use crate::error::CoreError;
use crate::keypoint::{Keypoint, KeypointName};

/// Face points dropped before measuring and drawing.
pub const DEFAULT_BLOCKLIST: &[KeypointName] = &[
    KeypointName::LeftEye,
    KeypointName::RightEye,
    KeypointName::LeftEar,
    KeypointName::RightEar,
];

/// Set of keypoint names removed by [`filter_keypoints`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blocklist {
    names: BTreeSet<KeypointName>,
}

impl Default for Blocklist {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCKLIST.iter().copied())
    }
}

impl Blocklist {
    pub fn new(names: impl IntoIterator<Item = KeypointName>) -> Self {
        Self {
            names: names.into_iter().collect(),
        }
    }

    /// A blocklist that keeps every keypoint.
    pub fn empty() -> Self {
        Self {
            names: BTreeSet::new(),
        }
    }

    /// Parse a comma-separated list such as `"left_eye, right_eye"`.
    ///
    /// Blank entries are ignored; names outside the 17-point schema are
    /// rejected so a typo cannot silently disable filtering.
    pub fn parse(list: &str) -> Result<Self, CoreError> {
        let names = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse::<KeypointName>)
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(Self { names })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n.as_str() == name)
    }

    pub fn names(&self) -> impl Iterator<Item = KeypointName> + '_ {
        self.names.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Drop every keypoint whose name is in `blocklist`.
///
/// Order and field values of the surviving keypoints are unchanged.
pub fn filter_keypoints(raw: &[Keypoint], blocklist: &Blocklist) -> Vec<Keypoint> {
    if raw.is_empty() {
        return Vec::new();
    }
    raw.iter()
        .filter(|kp| !blocklist.contains(&kp.name))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn full_set() -> Vec<Keypoint> {
        KeypointName::ALL
            .iter()
            .enumerate()
            .map(|(i, n)| Keypoint::new(n.as_str(), i as f32, i as f32 * 2.0, 0.5))
            .collect()
    }

    #[test]
    fn test_default_removes_face_points_only() {
        let filtered = filter_keypoints(&full_set(), &Blocklist::default());
        assert_eq!(filtered.len(), 13);
        assert!(filtered.iter().all(|kp| !kp.name.ends_with("_eye")));
        assert!(filtered.iter().all(|kp| !kp.name.ends_with("_ear")));
        assert_eq!(filtered[0].name, "nose");
    }

    #[test]
    fn test_preserves_order_and_fields() {
        let raw = full_set();
        let filtered = filter_keypoints(&raw, &Blocklist::default());
        let expected: Vec<Keypoint> = raw
            .iter()
            .filter(|kp| !matches!(kp.name.as_str(), "left_eye" | "right_eye" | "left_ear" | "right_ear"))
            .cloned()
            .collect();
        assert_eq!(filtered, expected);
    }

    #[test]
    fn test_empty_input_yields_empty() {
        assert!(filter_keypoints(&[], &Blocklist::default()).is_empty());
    }

    #[test]
    fn test_idempotent() {
        let blocklist = Blocklist::default();
        let once = filter_keypoints(&full_set(), &blocklist);
        let twice = filter_keypoints(&once, &blocklist);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_empty_blocklist_keeps_everything() {
        let raw = full_set();
        assert_eq!(filter_keypoints(&raw, &Blocklist::empty()), raw);
    }

    #[test]
    fn test_parse_trims_and_skips_blanks() {
        let list = Blocklist::parse(" nose , ,left_ankle").unwrap();
        assert!(list.contains("nose"));
        assert!(list.contains("left_ankle"));
        assert_eq!(list.names().count(), 2);
    }

    #[test]
    fn test_parse_empty_string_is_empty_blocklist() {
        assert!(Blocklist::parse("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_unknown_name() {
        assert_matches!(
            Blocklist::parse("left_eye,left_eyebrow"),
            Err(CoreError::Validation(_))
        );
    }
}
