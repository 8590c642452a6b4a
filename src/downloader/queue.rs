//! Admission of pending tasks under the parallelism bound.
//!
//! A slot is reserved under the task table lock at the moment a task is
//! admitted, so `active_count` can never exceed `max_parallel` no matter how
//! many callers race. Admission order among pending tasks is not guaranteed.

use crate::types::{StopMode, TaskId, TaskStatus};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::sync::watch;

use super::download_task::{DownloadTaskContext, run_download_task};
use super::{RunHandle, TaskTable, VideoDownloader};

/// An admitted task whose download unit still has to be spawned
pub(crate) struct Launch {
    pub(crate) id: TaskId,
    pub(crate) attempt: u64,
    pub(crate) stop_rx: watch::Receiver<Option<StopMode>>,
}

impl TaskTable {
    pub(crate) fn has_capacity(&self) -> bool {
        self.active_count < self.max_parallel
    }

    /// Reserve a slot for `id` if it is Pending, not yet launched, and capacity remains
    pub(crate) fn try_admit(&mut self, id: &TaskId) -> Option<Launch> {
        if !self.has_capacity() {
            return None;
        }

        let entry = self.tasks.get_mut(id)?;
        if entry.task.status != TaskStatus::Pending || entry.run.is_some() {
            return None;
        }

        self.next_attempt += 1;
        let attempt = self.next_attempt;
        let (stop_tx, stop_rx) = watch::channel(None);
        entry.run = Some(RunHandle {
            attempt,
            stop_tx: Arc::new(stop_tx),
        });
        self.active_count += 1;

        Some(Launch {
            id: id.clone(),
            attempt,
            stop_rx,
        })
    }

    /// Admit as many waiting tasks as capacity allows
    pub(crate) fn admit_waiting(&mut self) -> Vec<Launch> {
        let mut waiting: Vec<TaskId> = self
            .tasks
            .iter()
            .filter(|(_, entry)| entry.task.status == TaskStatus::Pending && entry.run.is_none())
            .map(|(id, _)| id.clone())
            .collect();
        waiting.sort();

        let mut launches = Vec::new();
        for id in waiting {
            if !self.has_capacity() {
                break;
            }
            if let Some(launch) = self.try_admit(&id) {
                launches.push(launch);
            }
        }
        launches
    }

    /// Give back a slot reserved by `try_admit`
    pub(crate) fn release_slot(&mut self) {
        self.active_count = self.active_count.saturating_sub(1);
    }
}

impl VideoDownloader {
    /// Spawn the download unit for an admitted task
    pub(crate) fn launch(&self, launch: Launch) {
        tracing::debug!(
            task_id = %launch.id,
            attempt = launch.attempt,
            "admitted task"
        );

        let ctx = DownloadTaskContext {
            id: launch.id,
            attempt: launch.attempt,
            stop_rx: launch.stop_rx,
            downloader: self.clone(),
        };
        tokio::spawn(run_download_task(ctx));
    }

    /// Admit pending tasks until the parallelism bound is reached
    ///
    /// Nothing new is admitted once shutdown has started.
    pub(crate) async fn admit_pending(&self) {
        if !self.queue_state.accepting_new.load(Ordering::SeqCst) {
            return;
        }
        let launches = {
            let mut table = self.queue_state.table.lock().await;
            table.admit_waiting()
        };
        for launch in launches {
            self.launch(launch);
        }
    }

    /// Number of currently reserved download slots
    pub async fn active_count(&self) -> usize {
        self.queue_state.table.lock().await.active_count
    }
}
