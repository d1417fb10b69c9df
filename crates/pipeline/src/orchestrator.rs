//! Image and video annotation jobs.
//!
//! A video job runs inside its own [`JobWorkspace`]: write the upload,
//! extract frames, annotate them concurrently, reassemble, read the result
//! back, remove the workspace. Frames fan out on a [`JoinSet`] bounded by a
//! semaphore; results are keyed by frame index so completion order never
//! leaks into the output. Blocking frame work is tracked per job and drained
//! before the workspace is removed, since dropping the job future does not
//! stop closures already running on the blocking pool.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Cursor};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, RgbImage};
use posemark_core::angles::{evaluate_angles, AngleSet, FrameResult};
use posemark_core::error::CoreError;
use posemark_core::filter::{filter_keypoints, Blocklist};
use posemark_core::frames::FrameFile;
use posemark_core::keypoint::check_schema;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::estimator::PoseEstimator;
use crate::job::JobWorkspace;
use crate::media::{self, FfmpegCodec, MediaCodec};
use crate::overlay::{
    draw_keypoints, draw_skeleton, DEFAULT_KEYPOINT_COLOR, DEFAULT_SKELETON_COLOR,
    VIDEO_SKELETON_COLOR,
};

/// Quality of annotated frames written back to disk.
const FRAME_JPEG_QUALITY: u8 = 95;

/// Result of annotating a still image.
#[derive(Debug, Clone)]
pub struct ImageOutcome {
    /// Annotated image, PNG encoded.
    pub image_png: Vec<u8>,
    pub angles: AngleSet,
    /// `false` when no pose was found and the image is returned as-is.
    pub detected: bool,
}

/// Result of annotating a video.
#[derive(Debug, Clone)]
pub struct VideoOutcome {
    /// Reassembled video bytes.
    pub video: Vec<u8>,
    /// One entry per extracted frame, ascending by frame index.
    pub frames: Vec<FrameResult>,
    /// Rate the source was sampled at.
    pub source_fps: f64,
    /// `true` when `source_fps` is the fallback rate.
    pub frame_rate_fallback: bool,
    /// Rate of the reassembled video.
    pub output_fps: f64,
}

/// Pose annotation pipeline.
///
/// Cheap to clone; the estimator, codec and config are shared.
pub struct PosePipeline<C = FfmpegCodec> {
    estimator: Arc<dyn PoseEstimator>,
    codec: Arc<C>,
    config: Arc<PipelineConfig>,
}

impl<C> Clone for PosePipeline<C> {
    fn clone(&self) -> Self {
        Self {
            estimator: Arc::clone(&self.estimator),
            codec: Arc::clone(&self.codec),
            config: Arc::clone(&self.config),
        }
    }
}

impl PosePipeline<FfmpegCodec> {
    /// Pipeline using the ffmpeg binaries named in `config`.
    pub fn with_ffmpeg(estimator: Arc<dyn PoseEstimator>, config: PipelineConfig) -> Self {
        let codec = FfmpegCodec::from_config(&config);
        Self::new(estimator, codec, config)
    }
}

impl<C: MediaCodec> PosePipeline<C> {
    pub fn new(estimator: Arc<dyn PoseEstimator>, codec: C, config: PipelineConfig) -> Self {
        Self {
            estimator,
            codec: Arc::new(codec),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Still images
    // -----------------------------------------------------------------------

    /// Detect, measure and annotate the first pose in an uploaded image.
    ///
    /// The result is PNG encoded regardless of the input format. With no
    /// pose found, the original image comes back with empty angles.
    pub async fn process_image(&self, bytes: &[u8]) -> PipelineResult<ImageOutcome> {
        let owned = bytes.to_vec();
        let mut image = run_blocking(move || decode_image(&owned)).await??;

        let poses = self.estimator.estimate_poses(&image).await?;
        let Some(pose) = poses.into_iter().next() else {
            tracing::info!("No pose detected in image");
            let image_png = run_blocking(move || encode_png(&image)).await??;
            return Ok(ImageOutcome {
                image_png,
                angles: AngleSet::new(),
                detected: false,
            });
        };

        check_schema(&pose.keypoints)?;
        let keypoints = filter_keypoints(&pose.keypoints, &self.config.blocklist);
        let angles = evaluate_angles(&keypoints);

        let image_png = run_blocking(move || {
            draw_keypoints(&mut image, &keypoints, DEFAULT_KEYPOINT_COLOR);
            draw_skeleton(&mut image, &keypoints, DEFAULT_SKELETON_COLOR);
            encode_png(&image)
        })
        .await??;

        tracing::info!(angles = angles.len(), "Image annotated");
        Ok(ImageOutcome {
            image_png,
            angles,
            detected: true,
        })
    }

    // -----------------------------------------------------------------------
    // Videos
    // -----------------------------------------------------------------------

    /// Annotate every frame of an uploaded video and reassemble it.
    ///
    /// Bounded by the configured job timeout and abandoned as soon as
    /// `cancel` fires. The job workspace is removed on every exit path.
    pub async fn process_video(
        &self,
        bytes: &[u8],
        cancel: &CancellationToken,
    ) -> PipelineResult<VideoOutcome> {
        if bytes.is_empty() {
            return Err(PipelineError::InvalidMedia("Uploaded video is empty".into()));
        }

        let workspace = JobWorkspace::create(&self.config.work_dir).await?;
        let job_id = workspace.id();
        let timeout = self.config.job_timeout;
        tracing::info!(job_id = %job_id, size = bytes.len(), "Video job started");

        let blocking = TaskTracker::new();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PipelineError::Cancelled),
            outcome = tokio::time::timeout(
                timeout,
                self.run_video_job(&workspace, bytes, &blocking),
            ) => {
                outcome.unwrap_or_else(|_| Err(PipelineError::TimedOut(timeout.as_secs())))
            }
        };

        blocking.close();
        blocking.wait().await;

        if let Err(e) = workspace.cleanup().await {
            tracing::warn!(job_id = %job_id, error = %e, "Failed to remove job workspace");
        }

        match &result {
            Ok(outcome) => tracing::info!(
                job_id = %job_id,
                frames = outcome.frames.len(),
                source_fps = outcome.source_fps,
                output_fps = outcome.output_fps,
                "Video job finished",
            ),
            Err(e) => tracing::warn!(job_id = %job_id, error = %e, "Video job failed"),
        }
        result
    }

    async fn run_video_job(
        &self,
        workspace: &JobWorkspace,
        bytes: &[u8],
        blocking: &TaskTracker,
    ) -> PipelineResult<VideoOutcome> {
        let input = workspace.input_path();
        tokio::fs::write(&input, bytes).await?;

        let extracted =
            media::extract_frames(self.codec.as_ref(), &input, &workspace.frames_dir()).await?;
        let frames = self.annotate_tracked(extracted.frames, blocking).await?;

        let output_fps = self.config.output_fps;
        let output = media::reassemble_video(
            self.codec.as_ref(),
            &workspace.frames_dir(),
            &workspace.output_path(),
            output_fps,
        )
        .await?;
        let video = tokio::fs::read(&output).await?;

        Ok(VideoOutcome {
            video,
            frames,
            source_fps: extracted.frame_rate.fps,
            frame_rate_fallback: extracted.frame_rate.is_fallback(),
            output_fps,
        })
    }

    /// Annotate `frames` in place and measure their angles.
    ///
    /// Returns one result per input frame in ascending index order. A frame
    /// that cannot be read, inferred or written back keeps its original
    /// pixels and gets an empty angle set; only a keypoint schema mismatch
    /// aborts the whole batch.
    pub async fn annotate_frames(&self, frames: Vec<FrameFile>) -> PipelineResult<Vec<FrameResult>> {
        let blocking = TaskTracker::new();
        let result = self.annotate_tracked(frames, &blocking).await;
        blocking.close();
        blocking.wait().await;
        result
    }

    async fn annotate_tracked(
        &self,
        frames: Vec<FrameFile>,
        blocking: &TaskTracker,
    ) -> PipelineResult<Vec<FrameResult>> {
        let mut results: BTreeMap<u64, FrameResult> = frames
            .iter()
            .map(|f| (f.index, FrameResult::empty(f.index)))
            .collect();

        let semaphore = Arc::new(Semaphore::new(self.config.frame_concurrency.max(1)));
        let blocklist = Arc::new(self.config.blocklist.clone());
        let mut tasks = JoinSet::new();

        for frame in frames {
            let semaphore = Arc::clone(&semaphore);
            let estimator = Arc::clone(&self.estimator);
            let blocklist = Arc::clone(&blocklist);
            let blocking = blocking.clone();
            tasks.spawn(async move {
                let index = frame.index;
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (index, Err(PipelineError::Internal("frame semaphore closed".into())));
                };
                (index, annotate_frame(estimator.as_ref(), &blocklist, &blocking, frame).await)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Ok(angles))) => {
                    results.insert(index, FrameResult { frame_index: index, angles });
                }
                Ok((index, Err(PipelineError::Core(CoreError::SchemaMismatch(msg))))) => {
                    tracing::error!(frame = index, error = %msg, "Estimator keypoint schema mismatch");
                    tasks.abort_all();
                    return Err(CoreError::SchemaMismatch(msg).into());
                }
                Ok((index, Err(e))) => {
                    tracing::warn!(frame = index, error = %e, "Frame annotation failed, leaving frame as extracted");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Frame task did not complete, leaving frame as extracted");
                }
            }
        }

        Ok(results.into_values().collect())
    }
}

/// Infer, measure and annotate one frame, overwriting it on success.
async fn annotate_frame(
    estimator: &dyn PoseEstimator,
    blocklist: &Blocklist,
    blocking: &TaskTracker,
    frame: FrameFile,
) -> PipelineResult<AngleSet> {
    let path = frame.path.clone();
    let mut image = run_tracked(blocking, move || read_frame(&path)).await??;

    let poses = estimator.estimate_poses(&image).await?;
    let Some(pose) = poses.into_iter().next() else {
        tracing::info!(frame = frame.index, "No pose detected");
        return Ok(AngleSet::new());
    };

    check_schema(&pose.keypoints)?;
    let keypoints = filter_keypoints(&pose.keypoints, blocklist);
    let angles = evaluate_angles(&keypoints);

    let path = frame.path;
    run_tracked(blocking, move || {
        draw_keypoints(&mut image, &keypoints, DEFAULT_KEYPOINT_COLOR);
        draw_skeleton(&mut image, &keypoints, VIDEO_SKELETON_COLOR);
        write_frame(&image, &path)
    })
    .await??;

    tracing::debug!(frame = frame.index, angles = angles.len(), "Frame annotated");
    Ok(angles)
}

// ---------------------------------------------------------------------------
// Blocking image helpers
// ---------------------------------------------------------------------------

async fn run_blocking<T, F>(f: F) -> PipelineResult<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PipelineError::Internal(format!("blocking task failed: {e}")))
}

/// Like [`run_blocking`], but holds a token of `tracker` until the closure
/// returns, even if the awaiting task is aborted first.
async fn run_tracked<T, F>(tracker: &TaskTracker, f: F) -> PipelineResult<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let token = tracker.token();
    run_blocking(move || {
        let _token = token;
        f()
    })
    .await
}

fn decode_image(bytes: &[u8]) -> PipelineResult<RgbImage> {
    let image = image::load_from_memory(bytes).map_err(|e| {
        tracing::debug!(error = %e, "Image decode failed");
        PipelineError::InvalidMedia("Uploaded file is not a decodable image".into())
    })?;
    if image.width() == 0 || image.height() == 0 {
        return Err(PipelineError::InvalidMedia("Uploaded image has no pixels".into()));
    }
    Ok(image.to_rgb8())
}

fn encode_png(image: &RgbImage) -> PipelineResult<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    image
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| PipelineError::Internal(format!("PNG encode failed: {e}")))?;
    Ok(buf.into_inner())
}

fn read_frame(path: &Path) -> PipelineResult<RgbImage> {
    let image = image::open(path)
        .map_err(|e| PipelineError::InvalidMedia(format!("frame could not be decoded: {e}")))?;
    Ok(image.to_rgb8())
}

/// Replace the frame at `path` atomically: write a sibling temp file, then
/// rename over the original.
fn write_frame(image: &RgbImage, path: &Path) -> PipelineResult<()> {
    let tmp = temp_sibling(path);
    let written =
        write_jpeg(image, &tmp).and_then(|()| std::fs::rename(&tmp, path).map_err(PipelineError::from));
    if written.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    written
}

fn write_jpeg(image: &RgbImage, path: &Path) -> PipelineResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    JpegEncoder::new_with_quality(&mut writer, FRAME_JPEG_QUALITY)
        .encode_image(image)
        .map_err(|e| PipelineError::Internal(format!("JPEG encode failed: {e}")))?;
    writer.into_inner().map_err(|e| e.into_error())?.sync_all()?;
    Ok(())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
