//! Runtime configuration updates for parallelism, download directory and quality.

use crate::config::{QualityPreset, clamp_max_parallel};
use crate::error::{Error, Result};
use std::path::PathBuf;

use super::VideoDownloader;

impl VideoDownloader {
    /// Set the maximum number of concurrent downloads
    ///
    /// The value is clamped to `1..=10`. Lowering the limit lets running
    /// downloads finish; raising it admits waiting tasks right away.
    /// Returns the value actually applied.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use video_dl::VideoDownloader;
    /// # async fn example(downloader: VideoDownloader) {
    /// assert_eq!(downloader.set_max_parallel_downloads(15).await, 10);
    /// # }
    /// ```
    pub async fn set_max_parallel_downloads(&self, max: usize) -> usize {
        let applied = clamp_max_parallel(max);
        {
            let mut table = self.queue_state.table.lock().await;
            table.max_parallel = applied;
        }

        tracing::info!(requested = max, applied, "max parallel downloads changed");
        self.admit_pending().await;
        applied
    }

    /// Current bound on concurrent downloads
    pub async fn max_parallel_downloads(&self) -> usize {
        self.queue_state.table.lock().await.max_parallel
    }

    /// Change where new downloads are written
    ///
    /// The directory is created if needed. Tasks that already have an output
    /// path keep it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the directory cannot be created.
    pub async fn set_download_directory(&self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        tokio::fs::create_dir_all(&path).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create download directory '{}': {}",
                    path.display(),
                    e
                ),
            ))
        })?;

        tracing::info!(download_dir = %path.display(), "download directory changed");
        self.runtime_config.settings.write().await.download_dir = path;
        Ok(())
    }

    /// Directory new downloads are written to
    pub async fn download_directory(&self) -> PathBuf {
        self.runtime_config.settings.read().await.download_dir.clone()
    }

    /// Select the quality preset by name (`best`, `medium` or `audio`)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for any other name; the current preset is kept.
    pub async fn set_quality_preset(&self, name: &str) -> Result<QualityPreset> {
        let preset: QualityPreset = name.parse()?;
        self.set_quality(preset).await;
        Ok(preset)
    }

    /// Select the quality preset for downloads started afterwards
    pub async fn set_quality(&self, preset: QualityPreset) {
        self.runtime_config.settings.write().await.quality = preset;
        tracing::info!(quality = %preset, "quality preset changed");
    }

    /// Current quality preset
    pub async fn quality_preset(&self) -> QualityPreset {
        self.runtime_config.settings.read().await.quality
    }
}
