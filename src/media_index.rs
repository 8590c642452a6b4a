//! Notifying the platform's media library about finished downloads
//!
//! After a task completes, its file is handed to a [`MediaIndexer`] so that
//! gallery or music apps pick it up. Failures are logged by the caller and
//! never affect the task.

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Registers a downloaded file with an external media index
#[async_trait]
pub trait MediaIndexer: Send + Sync {
    /// Register `path` with the index
    async fn index(&self, path: &Path) -> io::Result<()>;

    /// Name used in logs
    fn name(&self) -> &str;
}

/// Indexer that does nothing
///
/// Used when no media index integration is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpMediaIndexer;

#[async_trait]
impl MediaIndexer for NoOpMediaIndexer {
    async fn index(&self, _path: &Path) -> io::Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "noop"
    }
}

/// Indexer that runs an external program with the file path as its last argument
///
/// # Examples
///
/// ```no_run
/// use video_dl::media_index::{CommandMediaIndexer, MediaIndexer};
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() -> std::io::Result<()> {
/// let indexer = CommandMediaIndexer::new("termux-media-scan");
/// indexer.index(Path::new("/sdcard/Download/video.mp4")).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct CommandMediaIndexer {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandMediaIndexer {
    /// Create an indexer running `program <path>`
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Add arguments placed before the file path
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

#[async_trait]
impl MediaIndexer for CommandMediaIndexer {
    async fn index(&self, path: &Path) -> io::Result<()> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .output()
            .await?;

        if output.status.success() {
            Ok(())
        } else {
            Err(io::Error::other(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }

    fn name(&self) -> &str {
        "command"
    }
}
