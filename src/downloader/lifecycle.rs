//! Shutdown coordination.

use crate::error::Result;
use crate::types::Event;
use std::sync::atomic::Ordering;
use std::time::Duration;

use super::VideoDownloader;

/// How often shutdown re-checks the number of running units
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

impl VideoDownloader {
    /// Gracefully shut down the downloader
    ///
    /// This method performs a graceful shutdown sequence:
    /// 1. Stops accepting new tasks
    /// 2. Pauses every running task so its partial file can be resumed later
    /// 3. Waits for running units to drain, bounded by `shutdown_timeout`
    /// 4. Emits [`Event::Shutdown`]
    ///
    /// Timing out is not an error; units still running are left to finish on
    /// their own.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("initiating graceful shutdown");

        self.queue_state.accepting_new.store(false, Ordering::SeqCst);

        let paused = self.pause_active_tasks().await;
        tracing::info!(paused, "signalled pause to active downloads");

        let timeout = self.config.telemetry.shutdown_timeout;
        match tokio::time::timeout(timeout, self.wait_for_drain()).await {
            Ok(()) => tracing::info!("all downloads wound down"),
            Err(_) => tracing::warn!(
                timeout_ms = timeout.as_millis() as u64,
                remaining = self.active_count().await,
                "timeout waiting for downloads to wind down, proceeding with shutdown"
            ),
        }

        self.emit_event(Event::Shutdown);
        tracing::info!("shutdown complete");
        Ok(())
    }

    async fn wait_for_drain(&self) {
        while self.active_count().await > 0 {
            tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
        }
    }
}
