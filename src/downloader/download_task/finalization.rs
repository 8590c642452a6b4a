//! Download finalization -- terminal status, slot release and side effects.

use crate::classify::classify_error;
use crate::types::{StopMode, TaskStatus};
use crate::utils::{absolute_path, remove_partial_artifact};
use chrono::Utc;
use std::path::{Path, PathBuf};

use super::context::DownloadTaskContext;
use super::orchestration::Outcome;

/// Record the outcome of a run and hand its slot to the next pending task.
///
/// Runs that lost ownership of their task (removed, or re-admitted under a new
/// attempt) only release their slot.
pub(super) async fn finalize(ctx: DownloadTaskContext, planned_path: PathBuf, outcome: Outcome) {
    let id = ctx.id.clone();

    // Gather filesystem facts before taking the lock
    let completed = match &outcome {
        Outcome::AlreadyPresent { size } => Some((planned_path.clone(), Some(*size))),
        Outcome::Finished(metadata) => {
            let path = absolute_path(metadata.output_path.as_deref().unwrap_or(&planned_path));
            let size = match metadata.file_size {
                Some(size) => Some(size),
                None => file_size_on_disk(&path).await,
            };
            Some((path, size))
        }
        _ => None,
    };

    let snapshot = {
        let mut table = ctx.downloader.queue_state.table.lock().await;

        // Stop upgrades are sent under this lock, so the mode read here is final
        let outcome = settle_stop_mode(&ctx, outcome);

        // A stopped task never shows up as Stopped while its partial file remains
        if matches!(outcome, Outcome::Interrupted(StopMode::Stop))
            && ctx.downloader.config.download.cleanup_partial_on_stop
        {
            remove_partial_artifact(&planned_path).await;
        }
        let snapshot = table.current_run_mut(&id, ctx.attempt).map(|entry| {
            let task = &mut entry.task;
            task.speed.clear();

            match &outcome {
                Outcome::AlreadyPresent { .. } | Outcome::Finished(_) => {
                    task.status = TaskStatus::Completed;
                    task.progress = 1.0;
                    task.percent = 100;
                    task.eta_secs = 0;
                    if let Some((path, size)) = &completed {
                        task.output_path = Some(path.clone());
                        if size.is_some() {
                            task.file_size = *size;
                        }
                    }
                    if let Outcome::Finished(metadata) = &outcome {
                        if !metadata.title.is_empty() {
                            task.title = metadata.title.clone();
                        }
                        if !metadata.duration.is_empty() {
                            task.duration = metadata.duration.clone();
                        }
                    }
                }
                Outcome::Interrupted(StopMode::Pause) => {
                    task.status = TaskStatus::Paused;
                    task.eta_secs = -1;
                }
                Outcome::Interrupted(StopMode::Stop) => {
                    task.status = TaskStatus::Stopped;
                    task.eta_secs = -1;
                }
                Outcome::Failed(e) => {
                    task.status = TaskStatus::Error;
                    task.last_error = classify_error(&e.to_string());
                    task.eta_secs = -1;
                }
            }

            if task.status.is_finished() {
                task.finished_at = Some(Utc::now());
            }
            entry.run = None;
            entry.task.clone()
        });
        table.release_slot();
        snapshot
    };

    match &snapshot {
        Some(task) => {
            match task.status {
                TaskStatus::Error => tracing::warn!(
                    task_id = %id,
                    error = %task.last_error,
                    "download failed"
                ),
                status => tracing::info!(task_id = %id, status = %status, "download finished"),
            }
            ctx.downloader.notify_update(task).await;
        }
        None => tracing::debug!(task_id = %id, attempt = ctx.attempt, "run no longer current"),
    }

    if let Some(task) = snapshot.filter(|t| t.status == TaskStatus::Completed)
        && let Some(path) = task.output_path.filter(|p| p.is_absolute())
    {
        spawn_media_index(&ctx, path);
    }

    ctx.downloader.admit_pending().await;
}

/// A pause that was upgraded to a stop after the engine returned ends as a stop
fn settle_stop_mode(ctx: &DownloadTaskContext, outcome: Outcome) -> Outcome {
    match outcome {
        Outcome::Interrupted(StopMode::Pause)
            if ctx.requested_stop() == Some(StopMode::Stop) =>
        {
            Outcome::Interrupted(StopMode::Stop)
        }
        other => other,
    }
}

async fn file_size_on_disk(path: &Path) -> Option<u64> {
    tokio::fs::metadata(path).await.ok().map(|m| m.len())
}

/// Register a completed file with the media index in the background
fn spawn_media_index(ctx: &DownloadTaskContext, path: PathBuf) {
    let indexer = ctx.downloader.collaborators.media_indexer.clone();
    let id = ctx.id.clone();
    tokio::spawn(async move {
        if let Err(e) = indexer.index(&path).await {
            tracing::warn!(
                task_id = %id,
                indexer = indexer.name(),
                path = %path.display(),
                error = %e,
                "media index notification failed"
            );
        }
    });
}
