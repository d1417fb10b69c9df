//! Shared fakes for pipeline integration tests.
//!
//! `FakeCodec` stands in for ffmpeg: it writes solid-grey JPEG frames whose
//! grey level encodes the frame index, and records what it is asked to
//! encode. The estimators are deterministic stand-ins for the inference
//! service.

#![allow(dead_code)]

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::{ImageFormat, Rgb, RgbImage};
use posemark_core::ffmpeg::FfmpegError;
use posemark_core::frames::{frame_file_name, frame_index};
use posemark_core::keypoint::{Keypoint, KeypointName};
use posemark_pipeline::config::PipelineConfig;
use posemark_pipeline::estimator::{EstimatorError, Pose, PoseEstimator};
use posemark_pipeline::media::MediaCodec;
use posemark_pipeline::orchestrator::PosePipeline;

pub const FRAME_SIZE: u32 = 64;

/// Grey level step between consecutive frames.
const GREY_STEP: u32 = 20;

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct CodecLog {
    /// Rate passed to `extract_frames`.
    pub extract_fps: Option<f64>,
    /// Rate passed to `encode_frames`.
    pub encode_fps: Option<f64>,
    /// Frame indices in the order they were handed to the encoder.
    pub encode_order: Vec<u64>,
    /// Bytes of every frame as extracted, by index.
    pub extracted: Vec<(u64, Vec<u8>)>,
    /// Bytes of every frame as handed to the encoder.
    pub encoded: Vec<(u64, Vec<u8>)>,
}

#[derive(Clone)]
pub struct FakeCodec {
    pub frame_count: u64,
    /// What probing reports; `None` simulates a probe error.
    pub raw_rate: Option<Option<String>>,
    pub extract_delay: Option<Duration>,
    pub fail_extract: bool,
    pub fail_encode: bool,
    pub log: Arc<Mutex<CodecLog>>,
}

impl FakeCodec {
    pub fn new(frame_count: u64) -> Self {
        Self {
            frame_count,
            raw_rate: Some(Some("25/1".to_string())),
            extract_delay: None,
            fail_extract: false,
            fail_encode: false,
            log: Arc::new(Mutex::new(CodecLog::default())),
        }
    }

    pub fn with_rate(mut self, raw: Option<&str>) -> Self {
        self.raw_rate = Some(raw.map(str::to_string));
        self
    }

    pub fn with_probe_error(mut self) -> Self {
        self.raw_rate = None;
        self
    }

    pub fn with_extract_delay(mut self, delay: Duration) -> Self {
        self.extract_delay = Some(delay);
        self
    }

    pub fn failing_extract(mut self) -> Self {
        self.fail_extract = true;
        self
    }

    pub fn failing_encode(mut self) -> Self {
        self.fail_encode = true;
        self
    }
}

/// Solid grey frame identifying `index`.
pub fn frame_image(index: u64) -> RgbImage {
    let level = (index as u32 * GREY_STEP).min(255) as u8;
    RgbImage::from_pixel(FRAME_SIZE, FRAME_SIZE, Rgb([level, level, level]))
}

/// Recover the frame index from a frame produced by [`frame_image`].
pub fn index_of(image: &RgbImage) -> u64 {
    let level = image.get_pixel(1, 1)[0] as f64;
    (level / GREY_STEP as f64).round() as u64
}

fn jpeg_bytes(image: &RgbImage) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Jpeg).unwrap();
    buf.into_inner()
}

impl MediaCodec for FakeCodec {
    async fn probe_frame_rate(&self, video: &Path) -> Result<Option<String>, FfmpegError> {
        assert!(video.exists(), "upload must be written before probing");
        match &self.raw_rate {
            Some(raw) => Ok(raw.clone()),
            None => Err(FfmpegError::ExecutionFailed {
                exit_code: Some(1),
                stderr: "moov atom not found".into(),
            }),
        }
    }

    async fn extract_frames(
        &self,
        _video: &Path,
        out_dir: &Path,
        fps: f64,
    ) -> Result<(), FfmpegError> {
        self.log.lock().unwrap().extract_fps = Some(fps);
        if let Some(delay) = self.extract_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_extract {
            return Err(FfmpegError::ExecutionFailed {
                exit_code: Some(1),
                stderr: "Invalid data found when processing input".into(),
            });
        }
        for index in 1..=self.frame_count {
            let bytes = jpeg_bytes(&frame_image(index));
            tokio::fs::write(out_dir.join(frame_file_name(index)), &bytes).await?;
            self.log.lock().unwrap().extracted.push((index, bytes));
        }
        Ok(())
    }

    async fn encode_frames(
        &self,
        frames: &[PathBuf],
        output: &Path,
        fps: f64,
    ) -> Result<(), FfmpegError> {
        if self.fail_encode {
            return Err(FfmpegError::ExecutionFailed {
                exit_code: Some(1),
                stderr: format!("{}: Invalid argument", output.display()),
            });
        }
        let mut encoded = Vec::new();
        for path in frames {
            let name = path.file_name().unwrap().to_string_lossy().to_string();
            let index = frame_index(&name).unwrap();
            encoded.push((index, tokio::fs::read(path).await?));
        }
        {
            let mut log = self.log.lock().unwrap();
            log.encode_fps = Some(fps);
            log.encode_order = encoded.iter().map(|(i, _)| *i).collect();
            log.encoded = encoded;
        }
        tokio::fs::write(output, b"FAKEVIDEO").await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Estimators
// ---------------------------------------------------------------------------

/// Frontal standing pose, every keypoint confident, scaled by `scale`.
pub fn full_pose(scale: f32) -> Vec<Keypoint> {
    let coords: [(f32, f32); 17] = [
        (100.0, 40.0),
        (95.0, 35.0),
        (105.0, 35.0),
        (90.0, 38.0),
        (110.0, 38.0),
        (80.0, 70.0),
        (120.0, 70.0),
        (55.0, 95.0),
        (145.0, 95.0),
        (45.0, 130.0),
        (155.0, 130.0),
        (88.0, 150.0),
        (112.0, 150.0),
        (86.0, 200.0),
        (114.0, 200.0),
        (87.0, 250.0),
        (113.0, 250.0),
    ];
    KeypointName::ALL
        .iter()
        .zip(coords)
        .map(|(name, (x, y))| Keypoint::new(name.as_str(), x * scale, y * scale, 0.9))
        .collect()
}

/// Never detects anyone.
pub struct NoPoseEstimator;

#[async_trait]
impl PoseEstimator for NoPoseEstimator {
    async fn estimate_poses(&self, _image: &RgbImage) -> Result<Vec<Pose>, EstimatorError> {
        Ok(Vec::new())
    }
}

/// Always returns the same keypoints, optionally after a delay that
/// shrinks with the frame index so later frames finish first.
pub struct FixedPoseEstimator {
    pub keypoints: Vec<Keypoint>,
    pub reverse_delay: bool,
}

impl FixedPoseEstimator {
    pub fn new(keypoints: Vec<Keypoint>) -> Self {
        Self {
            keypoints,
            reverse_delay: false,
        }
    }

    pub fn finishing_in_reverse(mut self) -> Self {
        self.reverse_delay = true;
        self
    }
}

#[async_trait]
impl PoseEstimator for FixedPoseEstimator {
    async fn estimate_poses(&self, image: &RgbImage) -> Result<Vec<Pose>, EstimatorError> {
        if self.reverse_delay {
            let index = index_of(image);
            tokio::time::sleep(Duration::from_millis(15u64.saturating_sub(index) * 5)).await;
        }
        Ok(vec![Pose {
            keypoints: self.keypoints.clone(),
        }])
    }
}

/// Fails on odd frames and returns a full pose on even ones.
pub struct FlakyEstimator;

#[async_trait]
impl PoseEstimator for FlakyEstimator {
    async fn estimate_poses(&self, image: &RgbImage) -> Result<Vec<Pose>, EstimatorError> {
        if index_of(image) % 2 == 1 {
            return Err(EstimatorError::Api {
                status: 503,
                body: "model busy".into(),
            });
        }
        Ok(vec![Pose {
            keypoints: full_pose(0.25),
        }])
    }
}

/// Service is down.
pub struct FailingEstimator;

#[async_trait]
impl PoseEstimator for FailingEstimator {
    async fn estimate_poses(&self, _image: &RgbImage) -> Result<Vec<Pose>, EstimatorError> {
        Err(EstimatorError::Unavailable("connection refused".into()))
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub fn test_config(work_dir: &Path) -> PipelineConfig {
    PipelineConfig {
        work_dir: work_dir.to_path_buf(),
        frame_concurrency: 4,
        ..PipelineConfig::default()
    }
}

pub fn pipeline<E: PoseEstimator + 'static>(
    estimator: E,
    codec: FakeCodec,
    work_dir: &Path,
) -> PosePipeline<FakeCodec> {
    PosePipeline::new(Arc::new(estimator), codec, test_config(work_dir))
}

/// Number of entries left in `dir`.
pub fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}
