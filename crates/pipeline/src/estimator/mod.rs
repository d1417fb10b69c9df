//! Pose inference capability.
//!
//! The model itself lives outside this workspace. [`PoseEstimator`] is the
//! seam: the pipeline holds one `Arc<dyn PoseEstimator>` for the life of
//! the process and shares it across jobs and frames.

use async_trait::async_trait;
use image::RgbImage;
use posemark_core::keypoint::KeypointSet;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

pub mod http;

pub use http::HttpPoseEstimator;

/// One detected body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub keypoints: KeypointSet,
}

/// Errors from a pose estimator.
#[derive(Debug, thiserror::Error)]
pub enum EstimatorError {
    /// The estimator is not reachable or not ready.
    #[error("pose estimator unavailable: {0}")]
    Unavailable(String),

    /// The HTTP request itself failed (network, DNS, TLS, timeout, decode).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service returned a non-2xx status code.
    #[error("pose estimator API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The frame could not be encoded for upload.
    #[error("failed to encode frame: {0}")]
    Encode(String),
}

impl From<EstimatorError> for PipelineError {
    fn from(err: EstimatorError) -> Self {
        match err {
            EstimatorError::Encode(msg) => PipelineError::Internal(msg),
            other => PipelineError::InferenceUnavailable(other.to_string()),
        }
    }
}

/// Detects human poses in a single RGB image.
#[async_trait]
pub trait PoseEstimator: Send + Sync {
    /// Every pose found in `image`, most confident first. An empty vector
    /// means nobody was detected and is not an error.
    async fn estimate_poses(&self, image: &RgbImage) -> Result<Vec<Pose>, EstimatorError>;
}
