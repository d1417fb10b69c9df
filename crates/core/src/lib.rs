//! `posemark-core` -- pure domain logic for pose annotation.
//!
//! Keypoint schema, joint-angle geometry, keypoint filtering, angle
//! comparison, frame naming and the ffmpeg/ffprobe wrappers. Nothing in
//! this crate logs; conditions worth reporting are returned to the caller.

pub mod angles;
pub mod comparison;
pub mod error;
pub mod ffmpeg;
pub mod filter;
pub mod frames;
pub mod geometry;
pub mod keypoint;
pub mod skeleton;
mod subprocess;
