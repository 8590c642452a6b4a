//! Configuration types for video-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, str::FromStr, time::Duration};

/// Lower bound for concurrently running downloads
pub const MIN_PARALLEL_DOWNLOADS: usize = 1;

/// Upper bound for concurrently running downloads
pub const MAX_PARALLEL_DOWNLOADS: usize = 10;

/// Clamp a requested download parallelism into the supported range
pub fn clamp_max_parallel(requested: usize) -> usize {
    requested.clamp(MIN_PARALLEL_DOWNLOADS, MAX_PARALLEL_DOWNLOADS)
}

/// Main configuration for [`VideoDownloader`](crate::VideoDownloader)
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Download behavior settings (directory, concurrency, quality)
    #[serde(flatten)]
    pub download: DownloadConfig,

    /// Progress publishing cadence and shutdown timing
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl Config {
    /// Download directory
    pub fn download_dir(&self) -> &PathBuf {
        &self.download.download_dir
    }

    /// Normalize out-of-range values in place
    ///
    /// Parallelism is clamped to `[1, 10]`, the playlist chunk size and the
    /// smoothing window to at least 1. Zero durations are rejected.
    pub fn validate(&mut self) -> Result<()> {
        self.download.max_parallel_downloads = clamp_max_parallel(self.download.max_parallel_downloads);
        self.download.max_playlist_parallel = self.download.max_playlist_parallel.max(1);
        self.telemetry.smoothing_window = self.telemetry.smoothing_window.max(1);

        if self.telemetry.publish_interval.is_zero() {
            return Err(Error::config(
                "publish_interval",
                "publish interval must be greater than zero",
            ));
        }
        if self.telemetry.status_poll_interval.is_zero() {
            return Err(Error::config(
                "status_poll_interval",
                "status poll interval must be greater than zero",
            ));
        }

        Ok(())
    }
}

/// Download behavior configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Download directory (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Maximum concurrent downloads (default: 2, clamped to 1..=10)
    #[serde(default = "default_max_parallel")]
    pub max_parallel_downloads: usize,

    /// Number of playlist videos started per chunk (default: 3)
    #[serde(default = "default_max_playlist_parallel")]
    pub max_playlist_parallel: usize,

    /// Quality preset handed to the engine
    #[serde(default)]
    pub quality: QualityPreset,

    /// Remove the engine's `.part` file when a task is hard-stopped
    #[serde(default = "default_true")]
    pub cleanup_partial_on_stop: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            max_parallel_downloads: default_max_parallel(),
            max_playlist_parallel: default_max_playlist_parallel(),
            quality: QualityPreset::default(),
            cleanup_partial_on_stop: true,
        }
    }
}

/// Telemetry and timing configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// How often smoothed progress is written to the task (default: 1s)
    #[serde(default = "default_publish_interval", with = "duration_millis")]
    pub publish_interval: Duration,

    /// How often the playlist coordinator polls its tasks (default: 100ms)
    #[serde(default = "default_status_poll_interval", with = "duration_millis")]
    pub status_poll_interval: Duration,

    /// Capacity of the smoothing ring buffer (default: 10 samples)
    #[serde(default = "default_smoothing_window")]
    pub smoothing_window: usize,

    /// Maximum time `shutdown()` waits for active tasks to wind down (default: 30s)
    #[serde(default = "default_shutdown_timeout", with = "duration_millis")]
    pub shutdown_timeout: Duration,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            publish_interval: default_publish_interval(),
            status_poll_interval: default_status_poll_interval(),
            smoothing_window: default_smoothing_window(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

/// Quality preset selecting the format requested from the engine
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityPreset {
    /// Best available video and audio
    #[default]
    Best,
    /// Up to 720p
    Medium,
    /// Audio only
    Audio,
}

impl QualityPreset {
    /// Every supported preset, in display order
    pub const ALL: [QualityPreset; 3] = [
        QualityPreset::Best,
        QualityPreset::Medium,
        QualityPreset::Audio,
    ];

    /// Canonical lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityPreset::Best => "best",
            QualityPreset::Medium => "medium",
            QualityPreset::Audio => "audio",
        }
    }

    /// File extension of the container the engine produces for this preset
    pub fn container_extension(&self) -> &'static str {
        match self {
            QualityPreset::Best | QualityPreset::Medium => "mp4",
            QualityPreset::Audio => "m4a",
        }
    }

    /// Format selection expression for yt-dlp style engines
    pub fn format_selector(&self) -> &'static str {
        match self {
            QualityPreset::Best => "bestvideo*+bestaudio/best",
            QualityPreset::Medium => "bestvideo*[height<=720]+bestaudio/best[height<=720]",
            QualityPreset::Audio => "bestaudio[ext=m4a]/bestaudio",
        }
    }
}

impl std::fmt::Display for QualityPreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityPreset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "best" => Ok(QualityPreset::Best),
            "medium" => Ok(QualityPreset::Medium),
            "audio" => Ok(QualityPreset::Audio),
            other => Err(Error::config(
                "quality",
                format!("unknown quality preset '{other}' (expected best, medium or audio)"),
            )),
        }
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_max_parallel() -> usize {
    2
}

fn default_max_playlist_parallel() -> usize {
    3
}

fn default_true() -> bool {
    true
}

fn default_publish_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_status_poll_interval() -> Duration {
    Duration::from_millis(100)
}

fn default_smoothing_window() -> usize {
    10
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

// Duration serialization helper (milliseconds)
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
