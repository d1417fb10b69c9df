//! `posemark-pipeline` -- pose annotation jobs for images and videos.
//!
//! Wires the pure logic of `posemark_core` to the outside world: the pose
//! estimator capability, frame overlay drawing, the ffmpeg codec seam and
//! per-job scratch directories. All observability is `tracing` events.

pub mod config;
pub mod error;
pub mod estimator;
pub mod job;
pub mod media;
pub mod orchestrator;
pub mod overlay;

pub use config::PipelineConfig;
pub use error::{ErrorBody, PipelineError, PipelineResult};
pub use estimator::{EstimatorError, HttpPoseEstimator, Pose, PoseEstimator};
pub use media::{FfmpegCodec, MediaCodec};
pub use orchestrator::{ImageOutcome, PosePipeline, VideoOutcome};
