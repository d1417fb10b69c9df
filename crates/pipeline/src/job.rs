//! Per-job scratch directory.
//!
//! Layout: `<work_dir>/posemark-job-<uuid>/{input, frames/, output.mp4}`.
//! Names never derive from the upload. The directory is removed by
//! [`JobWorkspace::cleanup`], or by `Drop` if the job future is dropped
//! first (timeout, cancellation, panic).

use std::io;
use std::path::{Path, PathBuf};

use uuid::Uuid;

const DIR_PREFIX: &str = "posemark-job-";
const FRAMES_DIR: &str = "frames";
const INPUT_FILE: &str = "input";
const OUTPUT_FILE: &str = "output.mp4";

/// Exclusively owned working directory for one video job.
#[derive(Debug)]
pub struct JobWorkspace {
    id: Uuid,
    root: PathBuf,
    removed: bool,
}

impl JobWorkspace {
    /// Create a fresh workspace under `work_dir`.
    pub async fn create(work_dir: &Path) -> io::Result<Self> {
        tokio::fs::create_dir_all(work_dir).await?;

        let id = Uuid::new_v4();
        let root = work_dir.join(format!("{DIR_PREFIX}{id}"));
        tokio::fs::create_dir(&root).await?;

        let workspace = Self {
            id,
            root,
            removed: false,
        };
        tokio::fs::create_dir(workspace.frames_dir()).await?;
        Ok(workspace)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn frames_dir(&self) -> PathBuf {
        self.root.join(FRAMES_DIR)
    }

    pub fn input_path(&self) -> PathBuf {
        self.root.join(INPUT_FILE)
    }

    pub fn output_path(&self) -> PathBuf {
        self.root.join(OUTPUT_FILE)
    }

    /// Remove the workspace and everything in it.
    ///
    /// On failure the workspace stays marked for removal, so `Drop` tries
    /// once more.
    pub async fn cleanup(mut self) -> io::Result<()> {
        match tokio::fs::remove_dir_all(&self.root).await {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => {
                self.removed = true;
                Ok(())
            }
        }
    }
}

impl Drop for JobWorkspace {
    fn drop(&mut self) {
        if !self.removed {
            let _ = std::fs::remove_dir_all(&self.root);
        }
    }
}
