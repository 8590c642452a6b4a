//! Custom assertions and waiters for integration tests

use std::time::Duration;
use video_dl::{Event, PlaylistId, PlaylistStatus, Task, TaskId, VideoDownloader};

/// Result of waiting for a task to finish
#[derive(Debug)]
pub enum WaitResult {
    /// Task reached a finished state
    Finished(Task),
    /// Timeout waiting for the task
    Timeout,
    /// Event channel closed or lagged
    ChannelClosed,
}

/// Wait for a task to reach Completed, Stopped or Error
///
/// Checks the current snapshot first, then follows `TaskUpdated` events.
pub async fn wait_for_finished(
    downloader: &VideoDownloader,
    id: &TaskId,
    timeout: Duration,
) -> WaitResult {
    let mut events = downloader.subscribe();
    if let Some(task) = downloader.get_task(id).await
        && task.status.is_finished()
    {
        return WaitResult::Finished(task);
    }

    let result = tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(Event::TaskUpdated { task }) if &task.id == id && task.status.is_finished() => {
                    return WaitResult::Finished(task);
                }
                Ok(_) => continue,
                Err(_) => return WaitResult::ChannelClosed,
            }
        }
    })
    .await;

    result.unwrap_or(WaitResult::Timeout)
}

/// Poll until the playlist reaches `status`
pub async fn wait_for_playlist(
    downloader: &VideoDownloader,
    id: &PlaylistId,
    status: PlaylistStatus,
    timeout: Duration,
) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if downloader
            .get_playlist(id)
            .await
            .is_some_and(|p| p.status == status)
        {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
