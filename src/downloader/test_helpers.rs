//! Shared test helpers: a scripted download engine and downloader factories.

use crate::config::Config;
use crate::downloader::VideoDownloader;
use crate::engine::{DownloadEngine, DownloadRequest, Metadata, ProgressSink};
use crate::error::EngineError;
use crate::media_index::MediaIndexer;
use crate::types::{PlaylistId, PlaylistStatus, Task, TaskId, TaskStatus};
use crate::utils::partial_path;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Bytes written by every successful mock download
pub(crate) const MOCK_FILE_SIZE: u64 = 1024;

/// Behaviour of the mock engine for one URL
#[derive(Clone, Debug)]
pub(crate) enum Script {
    /// Report each `(downloaded, total)` sample `step` apart, then write the file
    Succeed {
        samples: Vec<(u64, Option<u64>)>,
        step: Duration,
    },
    /// Fail the download with this raw message
    Fail(String),
    /// Fail metadata resolution with this raw message
    FailResolve(String),
    /// Report half the file, then wait for cancellation or [`MockEngine::release`]
    Hold,
}

impl Script {
    pub(crate) fn quick() -> Self {
        Script::Succeed {
            samples: vec![(0, Some(MOCK_FILE_SIZE)), (MOCK_FILE_SIZE, Some(MOCK_FILE_SIZE))],
            step: Duration::from_millis(5),
        }
    }
}

/// Scripted [`DownloadEngine`] that writes small files into the requested path
pub(crate) struct MockEngine {
    scripts: Mutex<HashMap<String, Script>>,
    released: watch::Sender<HashSet<String>>,
    pub(crate) resolve_calls: AtomicUsize,
    pub(crate) download_calls: AtomicUsize,
    active: AtomicUsize,
    pub(crate) max_active: AtomicUsize,
    pub(crate) requests: Mutex<Vec<DownloadRequest>>,
    /// URLs in the order their downloads started
    pub(crate) starts: Mutex<Vec<String>>,
}

impl MockEngine {
    pub(crate) fn new() -> Arc<Self> {
        let (released, _rx) = watch::channel(HashSet::new());
        Arc::new(Self {
            scripts: Mutex::new(HashMap::new()),
            released,
            resolve_calls: AtomicUsize::new(0),
            download_calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            starts: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn script(&self, url: &str, script: Script) {
        self.scripts.lock().unwrap().insert(url.to_string(), script);
    }

    /// Let a held download for `url` complete successfully
    pub(crate) fn release(&self, url: &str) {
        self.released.send_modify(|set| {
            set.insert(url.to_string());
        });
    }

    pub(crate) fn download_calls(&self) -> usize {
        self.download_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub(crate) fn started_urls(&self) -> Vec<String> {
        self.starts.lock().unwrap().clone()
    }

    fn script_for(&self, url: &str) -> Script {
        self.scripts
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or_else(Script::quick)
    }

    async fn wait_for_release(&self, cancel: &CancellationToken, url: &str) -> bool {
        let mut rx = self.released.subscribe();
        loop {
            if rx.borrow_and_update().contains(url) {
                return true;
            }
            tokio::select! {
                _ = cancel.cancelled() => return false,
                changed = rx.changed() => {
                    if changed.is_err() {
                        cancel.cancelled().await;
                        return false;
                    }
                }
            }
        }
    }

    async fn run_script(
        &self,
        cancel: &CancellationToken,
        request: &DownloadRequest,
        progress: &ProgressSink,
    ) -> Result<(), EngineError> {
        let partial = partial_path(&request.output_path);
        tokio::fs::write(&partial, b"partial")
            .await
            .map_err(|e| EngineError::Download(e.to_string()))?;

        match self.script_for(&request.url) {
            Script::Succeed { samples, step } => {
                for (downloaded, total) in samples {
                    if cancel.is_cancelled() {
                        return Err(EngineError::Cancelled);
                    }
                    progress.report(downloaded, total);
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(EngineError::Cancelled),
                        _ = tokio::time::sleep(step) => {}
                    }
                }
            }
            Script::Fail(message) => return Err(EngineError::Download(message)),
            Script::FailResolve(_) => {}
            Script::Hold => {
                progress.report(MOCK_FILE_SIZE / 2, Some(MOCK_FILE_SIZE));
                if !self.wait_for_release(cancel, &request.url).await {
                    return Err(EngineError::Cancelled);
                }
            }
        }

        tokio::fs::write(&request.output_path, vec![0u8; MOCK_FILE_SIZE as usize])
            .await
            .map_err(|e| EngineError::Download(e.to_string()))?;
        tokio::fs::remove_file(&partial).await.ok();
        Ok(())
    }
}

#[async_trait]
impl DownloadEngine for MockEngine {
    async fn resolve_url(
        &self,
        _cancel: CancellationToken,
        url: &str,
    ) -> Result<Metadata, EngineError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        if let Script::FailResolve(message) = self.script_for(url) {
            return Err(EngineError::Resolve(message));
        }
        Ok(Metadata {
            title: format!("Title of {url}"),
            duration: "3:32".to_string(),
            output_path: None,
            file_size: Some(MOCK_FILE_SIZE),
        })
    }

    async fn download(
        &self,
        cancel: CancellationToken,
        request: DownloadRequest,
        progress: ProgressSink,
    ) -> Result<Metadata, EngineError> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        self.starts.lock().unwrap().push(request.url.clone());

        let result = self.run_script(&cancel, &request, &progress).await;
        self.active.fetch_sub(1, Ordering::SeqCst);

        result.map(|()| Metadata {
            title: format!("Title of {}", request.url),
            duration: "3:32".to_string(),
            output_path: Some(request.output_path.clone()),
            file_size: None,
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Media indexer that records every path it is asked to index
#[derive(Default)]
pub(crate) struct RecordingIndexer {
    pub(crate) indexed: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl MediaIndexer for RecordingIndexer {
    async fn index(&self, path: &Path) -> std::io::Result<()> {
        self.indexed.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Config pointing at a temp directory with fast telemetry intervals
pub(crate) fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.download.download_dir = root.join("downloads");
    config.telemetry.publish_interval = Duration::from_millis(20);
    config.telemetry.status_poll_interval = Duration::from_millis(10);
    config.telemetry.shutdown_timeout = Duration::from_secs(2);
    config
}

/// Helper to create a test VideoDownloader backed by `engine`.
/// Returns the downloader and the tempdir (which must be kept alive).
pub(crate) async fn create_test_downloader(
    engine: Arc<MockEngine>,
) -> (VideoDownloader, tempfile::TempDir) {
    create_test_downloader_with(engine, |_| {}).await
}

/// Like [`create_test_downloader`], with a hook to adjust the config
pub(crate) async fn create_test_downloader_with<F>(
    engine: Arc<MockEngine>,
    adjust: F,
) -> (VideoDownloader, tempfile::TempDir)
where
    F: FnOnce(&mut Config),
{
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = test_config(temp_dir.path());
    adjust(&mut config);

    let downloader = VideoDownloader::new(config, engine).await.unwrap();
    (downloader, temp_dir)
}

/// Poll until the task reaches `status`, panicking after five seconds
pub(crate) async fn wait_for_status(
    downloader: &VideoDownloader,
    id: &TaskId,
    status: TaskStatus,
) -> Task {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let task = downloader.get_task(id).await;
        if let Some(task) = &task
            && task.status == status
        {
            return task.clone();
        }
        if tokio::time::Instant::now() > deadline {
            panic!("task {id} did not reach {status}, last seen: {task:?}");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Poll until the playlist reaches `status`, panicking after five seconds
pub(crate) async fn wait_for_playlist_status(
    downloader: &VideoDownloader,
    id: &PlaylistId,
    status: PlaylistStatus,
) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let playlist = downloader.get_playlist(id).await;
        if playlist.as_ref().is_some_and(|p| p.status == status) {
            return;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("playlist {id} did not reach {status}, last seen: {playlist:?}");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Poll until the engine reports `count` running downloads
pub(crate) async fn wait_for_active(engine: &MockEngine, count: usize) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while engine.active() != count {
        if tokio::time::Instant::now() > deadline {
            panic!("engine never reached {count} active downloads (at {})", engine.active());
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
