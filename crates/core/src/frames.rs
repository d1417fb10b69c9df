//! Extracted frame naming and numeric ordering.
//!
//! Frames are written as `frame-0001.jpg`, `frame-0002.jpg`, ... (1-based).
//! Ordering always compares the embedded integer, so it stays correct if
//! the zero padding is ever narrower than the frame count.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

/// Output pattern handed to ffmpeg's image2 muxer.
pub const FRAME_PATTERN: &str = "frame-%04d.jpg";

/// File extension of extracted frames.
pub const FRAME_EXTENSION: &str = "jpg";

static FRAME_INDEX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("valid regex"));

/// An extracted frame on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameFile {
    /// 1-based position in the video.
    pub index: u64,
    pub path: PathBuf,
}

/// File name of the frame at `index`, matching [`FRAME_PATTERN`].
pub fn frame_file_name(index: u64) -> String {
    format!("frame-{index:04}.{FRAME_EXTENSION}")
}

/// The first run of digits in `file_name`, parsed as an integer.
pub fn frame_index(file_name: &str) -> Option<u64> {
    FRAME_INDEX_RE
        .find(file_name)
        .and_then(|m| m.as_str().parse().ok())
}

/// Sort frames by embedded index (not lexically).
pub fn sort_frames(frames: &mut [FrameFile]) {
    frames.sort_by(|a, b| a.index.cmp(&b.index).then_with(|| a.path.cmp(&b.path)));
}

/// Keep the paths that look like extracted frames, ordered by index.
///
/// Only files with the frame extension and a numeric component survive;
/// temporary files and stray inputs are ignored.
pub fn collect_frames<I>(paths: I) -> Vec<FrameFile>
where
    I: IntoIterator<Item = PathBuf>,
{
    let mut frames: Vec<FrameFile> = paths
        .into_iter()
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case(FRAME_EXTENSION))
        })
        .filter_map(|path| {
            let index = path.file_name()?.to_str().and_then(frame_index)?;
            Some(FrameFile { index, path })
        })
        .collect();
    sort_frames(&mut frames);
    frames
}

/// List the extracted frames in `dir`, ordered by embedded index.
pub async fn list_frames(dir: &Path) -> std::io::Result<Vec<FrameFile>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            paths.push(entry.path());
        }
    }
    Ok(collect_frames(paths))
}
