use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use posemark_core::error::CoreError;
use posemark_core::ffmpeg::FfmpegBinaries;
use posemark_core::filter::Blocklist;

/// Default output video frame rate.
pub const DEFAULT_OUTPUT_FPS: f64 = 30.0;

/// Default encoder handed to ffmpeg's `-c:v`.
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";

/// Default wall-clock limit for one video job.
pub const DEFAULT_JOB_TIMEOUT_SECS: u64 = 600;

/// Pipeline configuration loaded from environment variables.
///
/// All fields have defaults suitable for local use; override via the
/// environment in deployment.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Frame rate of the reassembled video (default: `30`).
    pub output_fps: f64,
    /// ffmpeg encoder for the output video (default: `libx264`).
    pub video_codec: String,
    /// Parent directory for per-job workspaces (default: system temp dir).
    pub work_dir: PathBuf,
    /// Maximum frames annotated at once (default: available parallelism).
    pub frame_concurrency: usize,
    /// Wall-clock limit for one video job (default: `600` s).
    pub job_timeout: Duration,
    /// Keypoints removed before angle evaluation and drawing.
    pub blocklist: Blocklist,
    /// ffmpeg and ffprobe executables.
    pub binaries: FfmpegBinaries,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_fps: DEFAULT_OUTPUT_FPS,
            video_codec: DEFAULT_VIDEO_CODEC.to_string(),
            work_dir: std::env::temp_dir(),
            frame_concurrency: default_concurrency(),
            job_timeout: Duration::from_secs(DEFAULT_JOB_TIMEOUT_SECS),
            blocklist: Blocklist::default(),
            binaries: FfmpegBinaries::default(),
        }
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl PipelineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                                  |
    /// |---------------------------|------------------------------------------|
    /// | `POSE_OUTPUT_FPS`         | `30`                                     |
    /// | `POSE_VIDEO_CODEC`        | `libx264`                                |
    /// | `POSE_WORK_DIR`           | system temp dir                          |
    /// | `POSE_FRAME_CONCURRENCY`  | available parallelism                    |
    /// | `POSE_JOB_TIMEOUT_SECS`   | `600`                                    |
    /// | `POSE_KEYPOINT_BLOCKLIST` | `left_eye,right_eye,left_ear,right_ear`  |
    /// | `FFMPEG_PATH`             | `ffmpeg`                                 |
    /// | `FFPROBE_PATH`            | `ffprobe`                                |
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to
    /// its value. Unset and blank variables take the default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let output_fps = match get("POSE_OUTPUT_FPS") {
            Some(raw) => {
                let fps: f64 = parse_value("POSE_OUTPUT_FPS", &raw)?;
                if !(fps.is_finite() && fps > 0.0) {
                    return Err(CoreError::Validation(
                        "POSE_OUTPUT_FPS must be a positive number".into(),
                    ));
                }
                fps
            }
            None => defaults.output_fps,
        };

        let video_codec = get("POSE_VIDEO_CODEC").unwrap_or(defaults.video_codec);
        if video_codec.chars().any(char::is_whitespace) {
            return Err(CoreError::Validation(
                "POSE_VIDEO_CODEC must be a single encoder name".into(),
            ));
        }

        let work_dir = get("POSE_WORK_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.work_dir);

        let frame_concurrency = match get("POSE_FRAME_CONCURRENCY") {
            Some(raw) => {
                let n: usize = parse_value("POSE_FRAME_CONCURRENCY", &raw)?;
                positive("POSE_FRAME_CONCURRENCY", n)?
            }
            None => defaults.frame_concurrency,
        };

        let job_timeout = match get("POSE_JOB_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = parse_value("POSE_JOB_TIMEOUT_SECS", &raw)?;
                Duration::from_secs(positive("POSE_JOB_TIMEOUT_SECS", secs)?)
            }
            None => defaults.job_timeout,
        };

        // An explicitly empty value disables filtering.
        let blocklist = match lookup("POSE_KEYPOINT_BLOCKLIST") {
            Some(raw) => Blocklist::parse(&raw)?,
            None => defaults.blocklist,
        };

        let binaries = FfmpegBinaries {
            ffmpeg: get("FFMPEG_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.binaries.ffmpeg),
            ffprobe: get("FFPROBE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.binaries.ffprobe),
        };

        Ok(Self {
            output_fps,
            video_codec,
            work_dir,
            frame_concurrency,
            job_timeout,
            blocklist,
            binaries,
        })
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T, CoreError> {
    raw.parse()
        .map_err(|_| CoreError::Validation(format!("{key} has an invalid value: {raw:?}")))
}

fn positive<T: PartialOrd + Default>(key: &str, value: T) -> Result<T, CoreError> {
    if value > T::default() {
        Ok(value)
    } else {
        Err(CoreError::Validation(format!("{key} must be greater than zero")))
    }
}
