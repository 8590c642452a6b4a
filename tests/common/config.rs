//! Test configuration helpers for creating downloaders in temp directories

use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use video_dl::{Config, DownloadEngine, VideoDownloader};

/// Config rooted in `dir` with fast publish and poll intervals
pub fn fast_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.download.download_dir = dir.path().join("downloads");
    config.telemetry.publish_interval = Duration::from_millis(25);
    config.telemetry.status_poll_interval = Duration::from_millis(10);
    config.telemetry.shutdown_timeout = Duration::from_secs(2);
    config
}

/// Create a downloader backed by `engine` in a fresh temp directory
///
/// The returned `TempDir` must be kept alive for the duration of the test.
pub async fn create_downloader(
    engine: Arc<dyn DownloadEngine>,
) -> Result<(VideoDownloader, TempDir), Box<dyn std::error::Error>> {
    let temp_dir = tempfile::tempdir()?;
    let config = fast_config(&temp_dir);
    let downloader = VideoDownloader::new(config, engine).await?;
    Ok((downloader, temp_dir))
}
