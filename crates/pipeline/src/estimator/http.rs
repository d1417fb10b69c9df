//! REST client for an external pose inference service.
//!
//! The service exposes `GET /health` and `POST /estimate`; the latter takes
//! a JPEG body and answers
//! `{"poses": [{"keypoints": [{"name", "x", "y", "score"}]}]}`.

use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use serde::Deserialize;

use super::{EstimatorError, Pose, PoseEstimator};

/// JPEG quality used when uploading frames.
const UPLOAD_JPEG_QUALITY: u8 = 90;

/// HTTP client for a single inference service instance.
#[derive(Debug, Clone)]
pub struct HttpPoseEstimator {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct EstimateResponse {
    #[serde(default)]
    poses: Vec<Pose>,
}

impl HttpPoseEstimator {
    /// Create a client whose requests time out after `timeout`.
    ///
    /// * `base_url` - Base HTTP URL, e.g. `http://host:8500`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, EstimatorError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Create an estimator reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create a client and verify the service answers its health check.
    pub async fn connect(base_url: &str, timeout: Duration) -> Result<Self, EstimatorError> {
        let estimator = Self::new(base_url, timeout)?;
        estimator
            .health_check()
            .await
            .map_err(|e| EstimatorError::Unavailable(e.to_string()))?;
        Ok(estimator)
    }

    /// Sends `GET /health` and succeeds on any 2xx status.
    pub async fn health_check(&self) -> Result<(), EstimatorError> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;

        Self::ensure_success(response).await?;
        Ok(())
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or an [`EstimatorError::Api`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, EstimatorError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(EstimatorError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

fn encode_jpeg(image: &RgbImage) -> Result<Vec<u8>, EstimatorError> {
    let mut buf = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buf, UPLOAD_JPEG_QUALITY)
        .encode_image(image)
        .map_err(|e| EstimatorError::Encode(e.to_string()))?;
    Ok(buf.into_inner())
}

#[async_trait]
impl PoseEstimator for HttpPoseEstimator {
    async fn estimate_poses(&self, image: &RgbImage) -> Result<Vec<Pose>, EstimatorError> {
        let frame = image.clone();
        let body = tokio::task::spawn_blocking(move || encode_jpeg(&frame))
            .await
            .map_err(|e| EstimatorError::Encode(format!("encode task failed: {e}")))??;

        let response = self
            .client
            .post(format!("{}/estimate", self.base_url))
            .header(reqwest::header::CONTENT_TYPE, "image/jpeg")
            .body(body)
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        let parsed: EstimateResponse = response.json().await?;
        Ok(parsed.poses)
    }
}
