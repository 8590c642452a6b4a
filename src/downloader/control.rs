//! Task lifecycle control -- stop, pause, resume, restart, remove.
//!
//! Every operation validates and mutates the task under the table lock, then
//! fires notifications after the lock is released. A running unit is signalled
//! only after its Stopping update went out, so its terminal update is always
//! the last one delivered.

use crate::error::{Error, Result, TaskError};
use crate::types::{Event, StopMode, Task, TaskId, TaskStatus};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::watch;

use super::VideoDownloader;
use super::queue::Launch;

type StopSender = Arc<watch::Sender<Option<StopMode>>>;

fn invalid_state(id: &TaskId, operation: &str, status: TaskStatus) -> Error {
    Error::Task(TaskError::InvalidState {
        id: id.to_string(),
        operation: operation.to_string(),
        current_state: status.to_string(),
    })
}

/// Ask the unit to pause unless a stop already reached it
fn request_pause(stop_tx: &watch::Sender<Option<StopMode>>) {
    stop_tx.send_if_modified(|mode| {
        if mode.is_some() {
            return false;
        }
        *mode = Some(StopMode::Pause);
        true
    });
}

impl VideoDownloader {
    /// Stop a task
    ///
    /// A Pending, Paused or failed task becomes Stopped immediately and its
    /// error is cleared. A running task moves to Stopping; its unit cancels the
    /// engine and the task ends up Stopped, with the partial file removed when
    /// `cleanup_partial_on_stop` is set. Stopping a task that is already
    /// pausing turns the pause into a stop. Finished tasks are left alone.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::NotFound`] if no task has this ID.
    pub async fn stop_task(&self, id: &TaskId) -> Result<()> {
        let (signal, snapshot) = {
            let mut table = self.queue_state.table.lock().await;
            let entry = table.entry_mut(id)?;

            match entry.task.status {
                TaskStatus::Pending | TaskStatus::Paused | TaskStatus::Error => {
                    let task = &mut entry.task;
                    task.status = TaskStatus::Stopped;
                    task.last_error.clear();
                    task.speed.clear();
                    task.eta_secs = -1;
                    task.finished_at = Some(Utc::now());
                    // A unit admitted but not yet running sees itself as stale
                    entry.run = None;
                    (None, Some(entry.task.clone()))
                }
                TaskStatus::Starting | TaskStatus::Downloading => {
                    entry.task.status = TaskStatus::Stopping;
                    let signal = entry.run.as_ref().map(|run| Arc::clone(&run.stop_tx));
                    (signal, Some(entry.task.clone()))
                }
                TaskStatus::Stopping => {
                    // Upgrade under the lock so finalization sees it
                    if let Some(run) = entry.run.as_ref() {
                        run.stop_tx.send_replace(Some(StopMode::Stop));
                    }
                    (None, None)
                }
                TaskStatus::Stopped | TaskStatus::Completed => (None, None),
            }
        };

        if let Some(task) = snapshot {
            self.notify_update(&task).await;
        }
        if let Some(stop_tx) = signal {
            tracing::info!(task_id = %id, "stopping task");
            stop_tx.send_replace(Some(StopMode::Stop));
        }
        Ok(())
    }

    /// Pause a running task
    ///
    /// The task moves to Stopping and ends up Paused once the engine has
    /// returned. Its partial file is kept so [`resume_task`](Self::resume_task)
    /// can continue where it left off. Tasks that are not running are left alone.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::NotFound`] if no task has this ID.
    pub async fn pause_task(&self, id: &TaskId) -> Result<()> {
        let (stop_tx, snapshot) = {
            let mut table = self.queue_state.table.lock().await;
            let entry = table.entry_mut(id)?;

            if !matches!(
                entry.task.status,
                TaskStatus::Starting | TaskStatus::Downloading
            ) {
                return Ok(());
            }
            let Some(run) = entry.run.as_ref() else {
                return Ok(());
            };
            let stop_tx = Arc::clone(&run.stop_tx);
            entry.task.status = TaskStatus::Stopping;
            (stop_tx, entry.task.clone())
        };

        self.notify_update(&snapshot).await;
        tracing::info!(task_id = %id, "pausing task");
        request_pause(&stop_tx);
        Ok(())
    }

    /// Resume a paused task
    ///
    /// The task goes back to Pending and is admitted as soon as a slot is
    /// free. Progress is kept; the engine continues from the partial file.
    ///
    /// # Errors
    ///
    /// - [`TaskError::NotFound`] if no task has this ID
    /// - [`TaskError::InvalidState`] if the task is not Paused
    pub async fn resume_task(&self, id: &TaskId) -> Result<()> {
        let (snapshot, launch) = {
            let mut table = self.queue_state.table.lock().await;
            let entry = table.entry_mut(id)?;

            if entry.task.status != TaskStatus::Paused {
                return Err(invalid_state(id, "resume", entry.task.status));
            }
            entry.task.status = TaskStatus::Pending;
            entry.task.started_at = Utc::now();
            entry.task.finished_at = None;
            entry.run = None;
            let snapshot = entry.task.clone();
            (snapshot, table.try_admit(id))
        };

        tracing::info!(task_id = %id, admitted = launch.is_some(), "resuming task");
        self.requeue(&snapshot, launch).await;
        Ok(())
    }

    /// Restart a task from scratch
    ///
    /// Progress, speed, ETA and the last error are reset and the task is
    /// queued again. Allowed from Error, Stopped, Paused and Pending.
    ///
    /// # Errors
    ///
    /// - [`TaskError::NotFound`] if no task has this ID
    /// - [`TaskError::InvalidState`] if the task is running or completed
    pub async fn restart_task(&self, id: &TaskId) -> Result<()> {
        let (snapshot, launch) = {
            let mut table = self.queue_state.table.lock().await;
            let entry = table.entry_mut(id)?;

            if !entry.task.status.is_restartable() {
                return Err(invalid_state(id, "restart", entry.task.status));
            }
            entry.task.reset_progress();
            entry.task.status = TaskStatus::Pending;
            entry.task.started_at = Utc::now();
            // Any unit still holding the old attempt becomes stale
            entry.run = None;
            let snapshot = entry.task.clone();
            (snapshot, table.try_admit(id))
        };

        tracing::info!(task_id = %id, admitted = launch.is_some(), "restarting task");
        self.requeue(&snapshot, launch).await;
        Ok(())
    }

    /// Remove a task from the registry
    ///
    /// A running task is stopped first; its unit winds down in the background
    /// and gives its slot back when the engine returns.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::NotFound`] if no task has this ID.
    pub async fn remove_task(&self, id: &TaskId) -> Result<()> {
        let (stopping, stop_tx) = {
            let mut table = self.queue_state.table.lock().await;
            let Some(mut entry) = table.tasks.remove(id) else {
                return Err(Error::Task(TaskError::NotFound { id: id.to_string() }));
            };

            let stop_tx: Option<StopSender> = entry.run.as_ref().map(|run| Arc::clone(&run.stop_tx));
            if entry.task.status.is_active() {
                entry.task.status = TaskStatus::Stopping;
                (Some(entry.task), stop_tx)
            } else {
                (None, stop_tx)
            }
        };

        if let Some(task) = stopping {
            self.notify_update(&task).await;
        }
        if let Some(stop_tx) = stop_tx {
            stop_tx.send_replace(Some(StopMode::Stop));
        }

        tracing::info!(task_id = %id, "task removed");
        self.emit_event(Event::TaskRemoved { id: id.clone() });
        Ok(())
    }

    /// Pause every running task, returning how many were signalled
    pub(crate) async fn pause_active_tasks(&self) -> usize {
        let signalled: Vec<(StopSender, Task)> = {
            let mut table = self.queue_state.table.lock().await;
            table
                .tasks
                .values_mut()
                .filter(|entry| {
                    matches!(
                        entry.task.status,
                        TaskStatus::Starting | TaskStatus::Downloading
                    )
                })
                .filter_map(|entry| {
                    let stop_tx = Arc::clone(&entry.run.as_ref()?.stop_tx);
                    entry.task.status = TaskStatus::Stopping;
                    Some((stop_tx, entry.task.clone()))
                })
                .collect()
        };

        for (stop_tx, task) in &signalled {
            self.notify_update(task).await;
            request_pause(stop_tx);
        }
        signalled.len()
    }

    async fn requeue(&self, snapshot: &Task, launch: Option<Launch>) {
        self.notify_update(snapshot).await;
        if let Some(launch) = launch {
            self.launch(launch);
        }
    }
}
