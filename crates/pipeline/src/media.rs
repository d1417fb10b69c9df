//! Frame extraction and video reassembly behind a codec seam.
//!
//! [`MediaCodec`] is what the orchestrator talks to; [`FfmpegCodec`] is the
//! production implementation. The free functions here add the policy on
//! top: frame-rate fallback, numeric frame ordering and error mapping.

use std::future::Future;
use std::path::{Path, PathBuf};

use posemark_core::ffmpeg::{self, FfmpegBinaries, FfmpegError, FrameRate, FALLBACK_FPS};
use posemark_core::frames::{list_frames, FrameFile};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};

/// Video probing, decoding and encoding.
pub trait MediaCodec: Send + Sync {
    /// Raw `r_frame_rate` of the primary video stream, if reported.
    fn probe_frame_rate(
        &self,
        video: &Path,
    ) -> impl Future<Output = Result<Option<String>, FfmpegError>> + Send;

    /// Decode `video` at `fps` into numbered frames inside `out_dir`.
    fn extract_frames(
        &self,
        video: &Path,
        out_dir: &Path,
        fps: f64,
    ) -> impl Future<Output = Result<(), FfmpegError>> + Send;

    /// Encode `frames`, in order, into `output` at `fps`.
    fn encode_frames(
        &self,
        frames: &[PathBuf],
        output: &Path,
        fps: f64,
    ) -> impl Future<Output = Result<(), FfmpegError>> + Send;
}

/// [`MediaCodec`] backed by the ffmpeg and ffprobe executables.
#[derive(Debug, Clone)]
pub struct FfmpegCodec {
    binaries: FfmpegBinaries,
    video_codec: String,
}

impl FfmpegCodec {
    pub fn new(binaries: FfmpegBinaries, video_codec: impl Into<String>) -> Self {
        Self {
            binaries,
            video_codec: video_codec.into(),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.binaries.clone(), config.video_codec.clone())
    }
}

impl MediaCodec for FfmpegCodec {
    async fn probe_frame_rate(&self, video: &Path) -> Result<Option<String>, FfmpegError> {
        ffmpeg::probe_frame_rate(&self.binaries, video).await
    }

    async fn extract_frames(
        &self,
        video: &Path,
        out_dir: &Path,
        fps: f64,
    ) -> Result<(), FfmpegError> {
        ffmpeg::extract_frames(&self.binaries, video, out_dir, fps).await
    }

    async fn encode_frames(
        &self,
        frames: &[PathBuf],
        output: &Path,
        fps: f64,
    ) -> Result<(), FfmpegError> {
        ffmpeg::encode_frames(&self.binaries, frames, output, fps, &self.video_codec).await
    }
}

/// Frames written by [`extract_frames`], in numeric order.
#[derive(Debug, Clone)]
pub struct ExtractedFrames {
    pub frames: Vec<FrameFile>,
    pub frame_rate: FrameRate,
}

/// Split `video` into `frame-%04d.jpg` files at its native frame rate.
///
/// An unknown or unusable source rate falls back to 1 fps with a warning.
/// A decoder failure or an empty result means the upload is not a usable
/// video.
pub async fn extract_frames<C: MediaCodec>(
    codec: &C,
    video: &Path,
    out_dir: &Path,
) -> PipelineResult<ExtractedFrames> {
    let frame_rate = FrameRate::resolve(codec.probe_frame_rate(video).await);
    if let Some(reason) = &frame_rate.fallback {
        tracing::warn!(
            fallback_fps = FALLBACK_FPS,
            reason = %reason,
            "Source frame rate unavailable, extracting at fallback rate",
        );
    }

    match codec.extract_frames(video, out_dir, frame_rate.fps).await {
        Ok(()) => {}
        Err(FfmpegError::ExecutionFailed { exit_code, stderr }) => {
            tracing::warn!(?exit_code, stderr = %stderr, "Frame extraction failed");
            return Err(PipelineError::InvalidMedia(
                "Uploaded file is not a decodable video".into(),
            ));
        }
        Err(e) => return Err(e.into()),
    }

    let frames = list_frames(out_dir).await?;
    if frames.is_empty() {
        return Err(PipelineError::InvalidMedia(
            "Uploaded video contains no frames".into(),
        ));
    }

    tracing::info!(
        count = frames.len(),
        fps = frame_rate.fps,
        fallback = frame_rate.is_fallback(),
        "Frames extracted",
    );
    Ok(ExtractedFrames { frames, frame_rate })
}

/// Encode every frame in `frame_dir`, in numeric order, into `output`.
pub async fn reassemble_video<C: MediaCodec>(
    codec: &C,
    frame_dir: &Path,
    output: &Path,
    fps: f64,
) -> PipelineResult<PathBuf> {
    let frames = list_frames(frame_dir).await?;
    if frames.is_empty() {
        return Err(FfmpegError::NoFrames.into());
    }

    let paths: Vec<PathBuf> = frames.into_iter().map(|f| f.path).collect();
    codec.encode_frames(&paths, output, fps).await?;

    tracing::info!(count = paths.len(), fps, "Video reassembled");
    Ok(output.to_path_buf())
}
