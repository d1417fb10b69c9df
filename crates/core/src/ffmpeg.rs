//! FFmpeg/FFprobe wrappers for frame extraction and video reassembly.
//!
//! Frame-rate probing never fails the caller: [`FrameRate::resolve`] turns
//! any probe problem into the 1 fps fallback and records why, so the
//! pipeline can log it.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tokio::process::Command;

use crate::frames::FRAME_PATTERN;
use crate::subprocess;

/// Error type for FFmpeg/FFprobe operations.
#[derive(Debug, thiserror::Error)]
pub enum FfmpegError {
    #[error("ffprobe/ffmpeg binary not found: {0}")]
    NotFound(std::io::Error),

    #[error("ffprobe/ffmpeg execution failed (exit code {exit_code:?}): {stderr}")]
    ExecutionFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("failed to parse ffprobe output: {0}")]
    ParseError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("video file not found: {0}")]
    VideoNotFound(String),

    #[error("no frames to encode")]
    NoFrames,
}

/// Locations of the ffmpeg and ffprobe executables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FfmpegBinaries {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl Default for FfmpegBinaries {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

// ---------------------------------------------------------------------------
// ffprobe JSON output structures
// ---------------------------------------------------------------------------

/// Top-level ffprobe JSON output (`-print_format json -show_streams`).
#[derive(Debug, Deserialize)]
pub struct FfprobeOutput {
    #[serde(default)]
    pub streams: Vec<FfprobeStream>,
}

/// A single stream from ffprobe output.
#[derive(Debug, Deserialize)]
pub struct FfprobeStream {
    pub codec_type: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    /// e.g. "30/1" or "24000/1001"
    pub r_frame_rate: Option<String>,
}

// ---------------------------------------------------------------------------
// Frame rate
// ---------------------------------------------------------------------------

/// Extraction rate used when the source rate cannot be determined.
pub const FALLBACK_FPS: f64 = 1.0;

/// Why the probed frame rate was not used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameRateFallback {
    /// ffprobe could not be run or its output could not be read.
    ProbeFailed(String),
    /// The video stream carries no `r_frame_rate`.
    Missing,
    /// The rate was non-numeric, non-finite or non-positive.
    Unparsable(String),
}

impl fmt::Display for FrameRateFallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProbeFailed(reason) => write!(f, "probe failed: {reason}"),
            Self::Missing => f.write_str("no frame rate reported"),
            Self::Unparsable(raw) => write!(f, "unparsable frame rate {raw:?}"),
        }
    }
}

/// The rate frames are extracted at.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRate {
    pub fps: f64,
    /// Set when `fps` is [`FALLBACK_FPS`] rather than the probed rate.
    pub fallback: Option<FrameRateFallback>,
}

impl FrameRate {
    pub fn probed(fps: f64) -> Self {
        Self {
            fps,
            fallback: None,
        }
    }

    pub fn fallback(reason: FrameRateFallback) -> Self {
        Self {
            fps: FALLBACK_FPS,
            fallback: Some(reason),
        }
    }

    /// Resolve the outcome of [`probe_frame_rate`] into a usable rate.
    pub fn resolve(probe: Result<Option<String>, FfmpegError>) -> Self {
        match probe {
            Err(e) => Self::fallback(FrameRateFallback::ProbeFailed(e.to_string())),
            Ok(None) => Self::fallback(FrameRateFallback::Missing),
            Ok(Some(raw)) => match parse_frame_rate(&raw) {
                Some(fps) => Self::probed(fps),
                None => Self::fallback(FrameRateFallback::Unparsable(raw)),
            },
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback.is_some()
    }
}

/// Parse an ffprobe rate like `"30/1"`, `"24000/1001"` or `"25"`.
///
/// Returns `None` unless the result is finite and strictly positive.
pub fn parse_frame_rate(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let fps = match raw.split_once('/') {
        Some((num, den)) => {
            let num = num.trim().parse::<f64>().ok()?;
            let den = den.trim().parse::<f64>().ok()?;
            num / den
        }
        None => raw.parse::<f64>().ok()?,
    };
    (fps.is_finite() && fps > 0.0).then_some(fps)
}

/// Find the first video stream in the ffprobe output.
fn first_video_stream(probe: &FfprobeOutput) -> Option<&FfprobeStream> {
    probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
}

/// The raw `r_frame_rate` of the primary video stream, if reported.
pub fn raw_frame_rate(probe: &FfprobeOutput) -> Option<String> {
    first_video_stream(probe).and_then(|s| s.r_frame_rate.clone())
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

fn ensure_exists(path: &Path) -> Result<(), FfmpegError> {
    if path.exists() {
        Ok(())
    } else {
        Err(FfmpegError::VideoNotFound(
            path.to_string_lossy().to_string(),
        ))
    }
}

/// Format a rate for an ffmpeg argument.
fn rate_arg(fps: f64) -> Result<String, FfmpegError> {
    if fps.is_finite() && fps > 0.0 {
        Ok(format!("{fps}"))
    } else {
        Err(FfmpegError::ParseError(format!("invalid frame rate {fps}")))
    }
}

/// Run `ffprobe` on a video file and return the parsed JSON output.
pub async fn probe_video(bins: &FfmpegBinaries, path: &Path) -> Result<FfprobeOutput, FfmpegError> {
    ensure_exists(path)?;

    let stdout = subprocess::run(
        Command::new(&bins.ffprobe)
            .args(["-v", "quiet", "-print_format", "json", "-show_streams"])
            .arg(path),
    )
    .await?;

    let stdout = String::from_utf8_lossy(&stdout);
    serde_json::from_str::<FfprobeOutput>(&stdout)
        .map_err(|e| FfmpegError::ParseError(e.to_string()))
}

/// Probe the primary video stream's raw `r_frame_rate`.
pub async fn probe_frame_rate(
    bins: &FfmpegBinaries,
    path: &Path,
) -> Result<Option<String>, FfmpegError> {
    let probe = probe_video(bins, path).await?;
    Ok(raw_frame_rate(&probe))
}

/// Decode `video` at `fps` into `out_dir/frame-%04d.jpg`, numbered from 1.
pub async fn extract_frames(
    bins: &FfmpegBinaries,
    video: &Path,
    out_dir: &Path,
    fps: f64,
) -> Result<(), FfmpegError> {
    ensure_exists(video)?;
    let rate = rate_arg(fps)?;
    tokio::fs::create_dir_all(out_dir).await?;

    subprocess::run(
        Command::new(&bins.ffmpeg)
            .args(["-hide_banner", "-loglevel", "error", "-y", "-i"])
            .arg(video)
            .args(["-vf", &format!("fps={rate}"), "-q:v", "2", "-start_number", "1"])
            .arg(out_dir.join(FRAME_PATTERN)),
    )
    .await?;

    Ok(())
}

/// Encode `frames`, in the given order, into `output` at `fps`.
///
/// Frames are piped to a single ffmpeg process as an MJPEG stream.
/// Odd dimensions are padded to even ones, which `yuv420p` requires.
pub async fn encode_frames(
    bins: &FfmpegBinaries,
    frames: &[PathBuf],
    output: &Path,
    fps: f64,
    codec: &str,
) -> Result<(), FfmpegError> {
    if frames.is_empty() {
        return Err(FfmpegError::NoFrames);
    }
    let rate = rate_arg(fps)?;

    subprocess::run_with_file_stdin(
        Command::new(&bins.ffmpeg)
            .args(["-hide_banner", "-loglevel", "error", "-y"])
            .args(["-f", "image2pipe", "-c:v", "mjpeg", "-framerate", &rate])
            .args(["-i", "pipe:0"])
            .args(["-vf", "pad=ceil(iw/2)*2:ceil(ih/2)*2"])
            .args(["-c:v", codec, "-pix_fmt", "yuv420p"])
            .arg(output),
        frames,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const PROBE_JSON: &str = r#"{
        "streams": [
            {"index": 0, "codec_type": "audio", "r_frame_rate": "0/0"},
            {"index": 1, "codec_type": "video", "width": 1280, "height": 720,
             "r_frame_rate": "24000/1001"}
        ]
    }"#;

    #[test]
    fn test_parse_frame_rate_fraction() {
        assert!((parse_frame_rate("30/1").unwrap() - 30.0).abs() < 0.001);
        assert!((parse_frame_rate("24000/1001").unwrap() - 23.976).abs() < 0.01);
    }

    #[test]
    fn test_parse_frame_rate_plain_number() {
        assert!((parse_frame_rate("25").unwrap() - 25.0).abs() < 0.001);
        assert!((parse_frame_rate(" 12.5 ").unwrap() - 12.5).abs() < 0.001);
    }

    #[test]
    fn test_parse_frame_rate_rejects_bad_values() {
        for raw in ["30/0", "0/0", "0", "-24", "abc", "", "NaN", "inf", "30/x"] {
            assert_eq!(parse_frame_rate(raw), None, "{raw:?}");
        }
    }

    #[test]
    fn test_raw_frame_rate_uses_first_video_stream() {
        let probe: FfprobeOutput = serde_json::from_str(PROBE_JSON).unwrap();
        assert_eq!(raw_frame_rate(&probe).as_deref(), Some("24000/1001"));
    }

    #[test]
    fn test_raw_frame_rate_without_video_stream() {
        let probe: FfprobeOutput =
            serde_json::from_str(r#"{"streams":[{"index":0,"codec_type":"audio"}]}"#).unwrap();
        assert_eq!(raw_frame_rate(&probe), None);
    }

    #[test]
    fn test_resolve_uses_probed_rate() {
        let rate = FrameRate::resolve(Ok(Some("30/1".into())));
        assert!((rate.fps - 30.0).abs() < 0.001);
        assert!(!rate.is_fallback());
    }

    #[test]
    fn test_resolve_falls_back_on_unparsable_rate() {
        let rate = FrameRate::resolve(Ok(Some("garbage".into())));
        assert_eq!(rate.fps, FALLBACK_FPS);
        assert_matches!(rate.fallback, Some(FrameRateFallback::Unparsable(raw)) if raw == "garbage");
    }

    #[test]
    fn test_resolve_falls_back_on_missing_rate() {
        let rate = FrameRate::resolve(Ok(None));
        assert_eq!(rate.fps, FALLBACK_FPS);
        assert_eq!(rate.fallback, Some(FrameRateFallback::Missing));
    }

    #[test]
    fn test_resolve_falls_back_on_probe_error() {
        let rate = FrameRate::resolve(Err(FfmpegError::ParseError("bad json".into())));
        assert_eq!(rate.fps, FALLBACK_FPS);
        assert_matches!(rate.fallback, Some(FrameRateFallback::ProbeFailed(_)));
    }

    #[tokio::test]
    async fn test_probe_missing_video() {
        let bins = FfmpegBinaries::default();
        let result = probe_video(&bins, Path::new("/nonexistent/clip.mp4")).await;
        assert_matches!(result, Err(FfmpegError::VideoNotFound(_)));
    }

    #[tokio::test]
    async fn test_probe_with_missing_binary() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let bins = FfmpegBinaries {
            ffmpeg: PathBuf::from("/nonexistent/ffmpeg"),
            ffprobe: PathBuf::from("/nonexistent/ffprobe"),
        };
        let result = probe_video(&bins, file.path()).await;
        assert_matches!(result, Err(FfmpegError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_encode_without_frames() {
        let dir = tempfile::tempdir().unwrap();
        let result = encode_frames(
            &FfmpegBinaries::default(),
            &[],
            &dir.path().join("out.mp4"),
            30.0,
            "libx264",
        )
        .await;
        assert_matches!(result, Err(FfmpegError::NoFrames));
    }

    fn ffmpeg_available() -> bool {
        ["ffmpeg", "ffprobe"].iter().all(|bin| {
            std::process::Command::new(bin)
                .arg("-version")
                .output()
                .is_ok_and(|out| out.status.success())
        })
    }

    #[tokio::test]
    async fn test_extract_and_encode_with_real_ffmpeg() {
        if !ffmpeg_available() {
            eprintln!("ffmpeg not on PATH, skipping");
            return;
        }
        let bins = FfmpegBinaries::default();
        let dir = tempfile::tempdir().unwrap();

        // Two seconds at 4 fps with odd dimensions.
        let source = dir.path().join("source.avi");
        subprocess::run(
            Command::new(&bins.ffmpeg)
                .args(["-hide_banner", "-loglevel", "error", "-y"])
                .args(["-f", "lavfi", "-i", "testsrc=size=65x49:rate=4:duration=2"])
                .args(["-c:v", "mjpeg"])
                .arg(&source),
        )
        .await
        .unwrap();

        let frames_dir = dir.path().join("frames");
        extract_frames(&bins, &source, &frames_dir, 4.0).await.unwrap();
        let frames = crate::frames::list_frames(&frames_dir).await.unwrap();

        assert!((7..=9).contains(&frames.len()), "{} frames", frames.len());
        assert!(frames_dir.join("frame-0001.jpg").is_file());
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(frame.index, i as u64 + 1);
        }

        let output = dir.path().join("out.mp4");
        let paths: Vec<PathBuf> = frames.iter().map(|f| f.path.clone()).collect();
        encode_frames(&bins, &paths, &output, 10.0, "mpeg4").await.unwrap();

        let probe = probe_video(&bins, &output).await.unwrap();
        let stream = first_video_stream(&probe).unwrap();
        assert_eq!((stream.width, stream.height), (Some(66), Some(50)));
        assert_eq!(stream.r_frame_rate.as_deref(), Some("10/1"));
    }

    #[tokio::test]
    async fn test_extract_rejects_invalid_rate() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let result =
            extract_frames(&FfmpegBinaries::default(), file.path(), dir.path(), 0.0).await;
        assert_matches!(result, Err(FfmpegError::ParseError(_)));
    }
}
