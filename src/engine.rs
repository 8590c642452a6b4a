//! Download engine abstraction
//!
//! The orchestration layer never talks to the network itself. It hands URLs to a
//! [`DownloadEngine`] implementation (typically a wrapper around an extractor
//! such as yt-dlp) and consumes its progress reports through a [`ProgressSink`].

use crate::config::QualityPreset;
use crate::error::EngineError;
use crate::telemetry::ProgressSample;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Metadata reported by the engine
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Metadata {
    /// Video title
    pub title: String,
    /// Duration text (e.g. "3:45")
    pub duration: String,
    /// Final output file, if the engine chose a different path than requested
    pub output_path: Option<PathBuf>,
    /// Size in bytes, when known
    pub file_size: Option<u64>,
}

/// Everything the engine needs for one download
#[derive(Clone, Debug, PartialEq)]
pub struct DownloadRequest {
    /// Source URL
    pub url: String,
    /// Path the engine should write to; partial data goes to `<path>.part`
    pub output_path: PathBuf,
    /// Quality preset
    pub quality: QualityPreset,
}

/// Non-blocking handle the engine uses to report progress
///
/// Samples are dropped rather than blocking the engine when the consumer lags.
#[derive(Clone, Debug)]
pub struct ProgressSink {
    tx: mpsc::Sender<ProgressSample>,
}

impl ProgressSink {
    pub(crate) fn new(tx: mpsc::Sender<ProgressSample>) -> Self {
        Self { tx }
    }

    /// Report cumulative bytes downloaded
    pub fn report(&self, downloaded: u64, total: Option<u64>) {
        let sample = ProgressSample {
            downloaded,
            total,
            at: Instant::now(),
        };
        if let Err(e) = self.tx.try_send(sample) {
            tracing::trace!(error = %e, downloaded, "dropping progress sample");
        }
    }
}

/// External engine that resolves and downloads videos
///
/// Implementations must observe `cancel` and return [`EngineError::Cancelled`]
/// promptly once it fires, leaving any partial data in place.
#[async_trait]
pub trait DownloadEngine: Send + Sync {
    /// Fetch title, duration and size without downloading
    async fn resolve_url(
        &self,
        cancel: CancellationToken,
        url: &str,
    ) -> Result<Metadata, EngineError>;

    /// Download to `request.output_path`, resuming from a partial file if one exists
    async fn download(
        &self,
        cancel: CancellationToken,
        request: DownloadRequest,
        progress: ProgressSink,
    ) -> Result<Metadata, EngineError>;

    /// Name used in logs
    fn name(&self) -> &str {
        "engine"
    }
}
