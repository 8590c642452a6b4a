//! # video-dl
//!
//! Download orchestration library for video and playlist downloaders.
//!
//! video-dl owns everything between "the user pasted a URL" and "the file is on
//! disk": the per-task lifecycle state machine, a bounded admission scheduler,
//! smoothed progress telemetry and chunked playlist downloads. Fetching bytes is
//! delegated to a pluggable [`DownloadEngine`].
//!
//! ## Design Philosophy
//!
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers register a callback or subscribe to events, no polling required
//! - **Engine-agnostic** - Any extractor can be plugged in behind [`DownloadEngine`]
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use video_dl::{Config, VideoDownloader};
//! # use video_dl::engine::{DownloadEngine, DownloadRequest, Metadata, ProgressSink};
//! # use video_dl::error::EngineError;
//! # use tokio_util::sync::CancellationToken;
//! # struct MyEngine;
//! # #[async_trait::async_trait]
//! # impl DownloadEngine for MyEngine {
//! #     async fn resolve_url(&self, _: CancellationToken, _: &str) -> Result<Metadata, EngineError> { todo!() }
//! #     async fn download(&self, _: CancellationToken, _: DownloadRequest, _: ProgressSink) -> Result<Metadata, EngineError> { todo!() }
//! # }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let downloader = VideoDownloader::new(Config::default(), Arc::new(MyEngine)).await?;
//!
//!     // Subscribe to events
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let task = downloader.add_task("https://youtu.be/dQw4w9WgXcQ").await?;
//!     println!("queued {}", task.id);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Error classification for user-facing messages
pub mod classify;
/// Configuration types
pub mod config;
/// Core downloader implementation (decomposed into focused submodules)
pub mod downloader;
/// Download engine abstraction
pub mod engine;
/// Error types
pub mod error;
/// Media library notification
pub mod media_index;
/// Progress estimation and smoothing
pub mod telemetry;
/// Core types and events
pub mod types;
/// URL and path helpers
pub mod utils;

// Re-export commonly used types
pub use classify::{ErrorCategory, classify_error};
pub use config::{Config, DownloadConfig, QualityPreset, TelemetryConfig};
pub use downloader::VideoDownloader;
pub use engine::{DownloadEngine, DownloadRequest, Metadata, ProgressSink};
pub use error::{EngineError, Error, PlaylistError, Result, TaskError};
pub use media_index::{CommandMediaIndexer, MediaIndexer, NoOpMediaIndexer};
pub use types::{
    Event, Playlist, PlaylistId, PlaylistStatus, PlaylistVideo, StopMode, Task, TaskId,
    TaskStatus, VideoStatus,
};

/// Run the downloader until a termination signal arrives, then shut it down gracefully.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// Active downloads are paused rather than stopped, so their partial files
/// survive for a later resume.
pub async fn run_with_shutdown(downloader: VideoDownloader) -> Result<()> {
    wait_for_signal().await;
    downloader.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in restricted environments (containers, tests)
    match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("received SIGTERM"),
                _ = sigint.recv() => tracing::info!("received SIGINT"),
            }
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("received SIGTERM");
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!("received SIGINT");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "could not register any signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("received Ctrl+C"),
        Err(e) => tracing::error!(error = %e, "failed to listen for Ctrl+C"),
    }
}
