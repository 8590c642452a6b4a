//! Downloader tests driven through the public `VideoDownloader` API with a
//! scripted engine.

use super::test_helpers::*;
use super::*;
use crate::error::{Error, PlaylistError, TaskError};
use crate::types::{
    Event, Playlist, PlaylistId, PlaylistStatus, PlaylistVideo, Task, TaskId, TaskStatus,
    VideoStatus,
};
use std::sync::atomic::Ordering;
use std::time::Duration;

mod queue;
mod tasks;

/// Poll until the task's published progress is above zero
async fn wait_for_progress(downloader: &VideoDownloader, id: &TaskId) -> Task {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if let Some(task) = downloader.get_task(id).await
            && task.progress > 0.0
        {
            return task;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "task {id} never published progress"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Collect events already buffered in `rx`
fn drain_events(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
