//! Engine fixtures implemented purely against the public `DownloadEngine` trait

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use video_dl::{DownloadEngine, DownloadRequest, EngineError, Metadata, ProgressSink};

/// Size of every file written by [`FileEngine`]
pub const FILE_SIZE: u64 = 64 * 1024;

/// Engine that "downloads" by writing `FILE_SIZE` bytes in a few chunks
///
/// URLs containing `fail` are rejected with a network error.
#[derive(Default)]
pub struct FileEngine {
    pub downloads: AtomicUsize,
    pub running: AtomicUsize,
    pub peak: AtomicUsize,
    pub urls: Mutex<HashSet<String>>,
}

impl FileEngine {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DownloadEngine for FileEngine {
    async fn resolve_url(
        &self,
        _cancel: CancellationToken,
        url: &str,
    ) -> Result<Metadata, EngineError> {
        Ok(Metadata {
            title: format!("Video at {url}"),
            duration: "1:00".to_string(),
            output_path: None,
            file_size: Some(FILE_SIZE),
        })
    }

    async fn download(
        &self,
        cancel: CancellationToken,
        request: DownloadRequest,
        progress: ProgressSink,
    ) -> Result<Metadata, EngineError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);
        self.urls.lock().unwrap().insert(request.url.clone());

        let result = write_in_chunks(&cancel, &request, &progress).await;
        self.running.fetch_sub(1, Ordering::SeqCst);
        result?;

        Ok(Metadata {
            title: format!("Video at {}", request.url),
            duration: "1:00".to_string(),
            output_path: Some(request.output_path),
            file_size: Some(FILE_SIZE),
        })
    }

    fn name(&self) -> &str {
        "file"
    }
}

async fn write_in_chunks(
    cancel: &CancellationToken,
    request: &DownloadRequest,
    progress: &ProgressSink,
) -> Result<(), EngineError> {
    if request.url.contains("fail") {
        return Err(EngineError::Download(
            "ERROR: Unable to download webpage: connection reset by peer".to_string(),
        ));
    }

    const CHUNKS: u64 = 4;
    for i in 0..=CHUNKS {
        progress.report(FILE_SIZE * i / CHUNKS, Some(FILE_SIZE));
        tokio::select! {
            _ = cancel.cancelled() => return Err(EngineError::Cancelled),
            _ = tokio::time::sleep(Duration::from_millis(10)) => {}
        }
    }

    tokio::fs::write(&request.output_path, vec![7u8; FILE_SIZE as usize])
        .await
        .map_err(|e| EngineError::Download(e.to_string()))
}
