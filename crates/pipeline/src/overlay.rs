//! Keypoint and skeleton overlay on RGB frames.
//!
//! Drawing is purely additive and clipped to the frame; nothing here
//! fails. Keypoints and bones below their confidence thresholds, or with
//! non-finite coordinates, are skipped.

use image::{Rgb, RgbImage};
use posemark_core::keypoint::{find_keypoint, Keypoint};
use posemark_core::skeleton::{
    KEYPOINT_RADIUS_PX, KEYPOINT_SCORE_THRESHOLD, SKELETON_CONNECTIONS, SKELETON_LINE_WIDTH_PX,
    SKELETON_SCORE_THRESHOLD,
};

pub const RED: Rgb<u8> = Rgb([255, 0, 0]);
pub const BLUE: Rgb<u8> = Rgb([0, 0, 255]);

/// Default keypoint colour.
pub const DEFAULT_KEYPOINT_COLOR: Rgb<u8> = RED;

/// Default skeleton colour for still images.
pub const DEFAULT_SKELETON_COLOR: Rgb<u8> = BLUE;

/// Skeleton colour used on video frames.
pub const VIDEO_SKELETON_COLOR: Rgb<u8> = RED;

/// Draw a filled disc at every keypoint scoring above the keypoint threshold.
pub fn draw_keypoints(frame: &mut RgbImage, keypoints: &[Keypoint], color: Rgb<u8>) {
    for kp in keypoints {
        if !(kp.score > KEYPOINT_SCORE_THRESHOLD) {
            continue;
        }
        if let Some((x, y)) = pixel(frame, kp) {
            draw_disc(frame, x, y, KEYPOINT_RADIUS_PX, color);
        }
    }
}

/// Draw every skeleton bone whose endpoints both score above the
/// skeleton threshold. Endpoints are looked up by name.
pub fn draw_skeleton(frame: &mut RgbImage, keypoints: &[Keypoint], color: Rgb<u8>) {
    for (from, to) in SKELETON_CONNECTIONS {
        let (Some(a), Some(b)) = (find_keypoint(keypoints, from), find_keypoint(keypoints, to))
        else {
            continue;
        };
        if !(a.score > SKELETON_SCORE_THRESHOLD && b.score > SKELETON_SCORE_THRESHOLD) {
            continue;
        }
        if let (Some(start), Some(end)) = (pixel(frame, a), pixel(frame, b)) {
            draw_line(frame, start, end, SKELETON_LINE_WIDTH_PX, color);
        }
    }
}

/// Rounded pixel position, or `None` for non-finite coordinates and for
/// points more than one frame size outside the frame.
fn pixel(frame: &RgbImage, kp: &Keypoint) -> Option<(i32, i32)> {
    if !(kp.x.is_finite() && kp.y.is_finite()) {
        return None;
    }
    let (w, h) = (frame.width() as f32, frame.height() as f32);
    if kp.x < -w || kp.x > 2.0 * w || kp.y < -h || kp.y > 2.0 * h {
        return None;
    }
    Some((kp.x.round() as i32, kp.y.round() as i32))
}

fn put(frame: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && x < i64::from(frame.width()) && y < i64::from(frame.height()) {
        frame.put_pixel(x as u32, y as u32, color);
    }
}

fn draw_disc(frame: &mut RgbImage, cx: i32, cy: i32, radius: i32, color: Rgb<u8>) {
    let (cx, cy, r) = (i64::from(cx), i64::from(cy), i64::from(radius));
    for dy in -r..=r {
        for dx in -r..=r {
            if dx * dx + dy * dy <= r * r {
                put(frame, cx + dx, cy + dy, color);
            }
        }
    }
}

/// Bresenham line stamped with a `width`-pixel square brush.
fn draw_line(frame: &mut RgbImage, start: (i32, i32), end: (i32, i32), width: u32, color: Rgb<u8>) {
    let (mut x, mut y) = (i64::from(start.0), i64::from(start.1));
    let (x1, y1) = (i64::from(end.0), i64::from(end.1));
    let dx = (x1 - x).abs();
    let dy = -(y1 - y).abs();
    let sx = if x < x1 { 1 } else { -1 };
    let sy = if y < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    let width = i64::from(width.max(1));
    let lo = -(width - 1) / 2;
    let hi = width / 2;

    loop {
        for oy in lo..=hi {
            for ox in lo..=hi {
                put(frame, x + ox, y + oy, color);
            }
        }

        if x == x1 && y == y1 {
            break;
        }

        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}
