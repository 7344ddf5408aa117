//! Ephemeral, exclusively-owned working directories.

use std::io;
use std::path::{Path, PathBuf};

use pipeline::IssueNumber;
use tracing::{debug, warn};

/// A uniquely-named temporary directory, removed when dropped.
///
/// Holding the guard is the only way to reach the path, so the directory
/// cannot outlive the run that created it.
#[derive(Debug)]
pub struct Workspace {
    dir: Option<tempfile::TempDir>,
    path: PathBuf,
}

impl Workspace {
    /// Creates `repo-<issue>-XXXXXX` under `root`, or under the system temp
    /// directory when `root` is `None`.
    pub fn create(root: Option<&Path>, issue: IssueNumber) -> io::Result<Self> {
        let prefix = format!("repo-{issue}-");
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);
        let dir = match root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        let path = dir.path().to_path_buf();
        debug!(path = %path.display(), "created workspace");
        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            match dir.close() {
                Ok(()) => debug!(path = %self.path.display(), "removed workspace"),
                Err(err) => {
                    warn!(path = %self.path.display(), error = %err, "failed to remove workspace")
                }
            }
        }
    }
}
