//! Download task context -- per-run state shared by the lifecycle phases.

use crate::types::{StopMode, Task, TaskId};
use tokio::sync::watch;

use super::super::{TaskEntry, VideoDownloader};

/// State for one admitted run of a task
pub(crate) struct DownloadTaskContext {
    pub(crate) id: TaskId,
    /// Admission number this unit was launched with
    pub(crate) attempt: u64,
    pub(crate) stop_rx: watch::Receiver<Option<StopMode>>,
    pub(crate) downloader: VideoDownloader,
}

impl DownloadTaskContext {
    /// Apply `update` to the task if this run is still current, returning a snapshot
    ///
    /// `update` returns whether it changed anything; unchanged tasks yield `None`.
    pub(super) async fn update_current<F>(&self, update: F) -> Option<Task>
    where
        F: FnOnce(&mut TaskEntry) -> bool,
    {
        let mut table = self.downloader.queue_state.table.lock().await;
        let entry = table.current_run_mut(&self.id, self.attempt)?;
        update(&mut *entry).then(|| entry.task.clone())
    }

    /// Stop mode requested so far, if any
    pub(super) fn requested_stop(&self) -> Option<StopMode> {
        *self.stop_rx.borrow()
    }
}

/// Resolve once a stop or pause has been requested
///
/// Never resolves if the sender is dropped without a request.
pub(super) async fn stop_requested(stop_rx: &mut watch::Receiver<Option<StopMode>>) -> StopMode {
    loop {
        if let Some(mode) = *stop_rx.borrow_and_update() {
            return mode;
        }
        if stop_rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
