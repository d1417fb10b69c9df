//! Planar joint-angle geometry.

use crate::error::CoreError;

/// A point in image pixel space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Angle in degrees at vertex `b` between the rays `b -> a` and `b -> c`.
///
/// Computed as the difference of the two `atan2` bearings, folded into
/// `0.0..=180.0` by reflecting anything above 180 to `360 - angle`.
///
/// Returns [`CoreError::DegenerateGeometry`] when either ray has zero
/// length or a coordinate is not finite, so NaN never reaches callers.
pub fn angle_at(a: Point, b: Point, c: Point) -> Result<f64, CoreError> {
    if !(a.is_finite() && b.is_finite() && c.is_finite()) {
        return Err(CoreError::DegenerateGeometry(
            "non-finite coordinate".to_string(),
        ));
    }
    if a == b || c == b {
        return Err(CoreError::DegenerateGeometry(
            "ray endpoint coincides with vertex".to_string(),
        ));
    }

    let radians = (c.y - b.y).atan2(c.x - b.x) - (a.y - b.y).atan2(a.x - b.x);
    let mut angle = radians.to_degrees().abs();
    if angle > 180.0 {
        angle = 360.0 - angle;
    }
    Ok(angle)
}
