use posemark_core::error::CoreError;
use posemark_core::ffmpeg::FfmpegError;
use serde::Serialize;

/// Pipeline-level error type.
///
/// Wraps [`CoreError`] and [`FfmpegError`] and adds job-lifecycle variants.
/// [`PipelineError::to_error_body`] turns any variant into a message that is
/// safe to show to a client.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A domain-level error from `posemark_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The upload could not be decoded as an image or video.
    #[error("Invalid media: {0}")]
    InvalidMedia(String),

    /// The pose estimator could not be reached or rejected the request.
    #[error("Pose inference unavailable: {0}")]
    InferenceUnavailable(String),

    /// ffmpeg or ffprobe failed.
    #[error("Codec failure: {0}")]
    Codec(#[from] FfmpegError),

    /// Invalid pipeline wiring, such as an unusable service URL.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Job timed out after {0} seconds")]
    TimedOut(u64),

    #[error("Job cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience type alias for pipeline results.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Client-facing error payload, serialized as `{"error": ..., "code": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
}

const INTERNAL_MESSAGE: &str = "An internal error occurred";

impl PipelineError {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::Core(core) => match core {
                CoreError::Validation(_) | CoreError::SchemaMismatch(_) => "CONFIG_ERROR",
                CoreError::DegenerateGeometry(_) | CoreError::Internal(_) => "INTERNAL_ERROR",
            },
            PipelineError::InvalidMedia(_) => "INVALID_MEDIA",
            PipelineError::InferenceUnavailable(_) => "INFERENCE_UNAVAILABLE",
            PipelineError::Codec(_) => "CODEC_FAILURE",
            PipelineError::Config(_) => "CONFIG_ERROR",
            PipelineError::TimedOut(_) => "TIMEOUT",
            PipelineError::Cancelled => "CANCELLED",
            PipelineError::Io(_) | PipelineError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Build the sanitized client payload.
    ///
    /// Paths, ffmpeg stderr and service responses never reach the message;
    /// they are logged here instead.
    pub fn to_error_body(&self) -> ErrorBody {
        let error = match self {
            PipelineError::Core(core) => match core {
                CoreError::Validation(msg) | CoreError::SchemaMismatch(msg) => msg.clone(),
                CoreError::DegenerateGeometry(msg) | CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    INTERNAL_MESSAGE.to_string()
                }
            },
            PipelineError::InvalidMedia(msg) => msg.clone(),
            PipelineError::InferenceUnavailable(msg) => {
                tracing::error!(error = %msg, "Pose inference unavailable");
                "Pose inference service is unavailable".to_string()
            }
            PipelineError::Codec(err) => {
                tracing::error!(error = %err, "Video codec failure");
                "Video could not be processed".to_string()
            }
            PipelineError::Config(msg) => {
                tracing::error!(error = %msg, "Pipeline configuration error");
                "Pipeline is misconfigured".to_string()
            }
            PipelineError::TimedOut(secs) => {
                format!("Processing exceeded the {secs} second time limit")
            }
            PipelineError::Cancelled => "Processing was cancelled".to_string(),
            PipelineError::Io(err) => {
                tracing::error!(error = %err, "I/O error");
                INTERNAL_MESSAGE.to_string()
            }
            PipelineError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                INTERNAL_MESSAGE.to_string()
            }
        };

        ErrorBody {
            error,
            code: self.code(),
        }
    }
}
