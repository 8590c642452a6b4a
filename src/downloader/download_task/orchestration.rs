//! Download task orchestration -- top-level lifecycle for a single admitted task.

use crate::engine::{DownloadRequest, Metadata, ProgressSink};
use crate::error::EngineError;
use crate::telemetry::{SAMPLE_CHANNEL_BUFFER, TaskTelemetry};
use crate::types::{StopMode, TaskStatus};
use crate::utils::{absolute_path, planned_output_path};
use std::path::Path;
use std::sync::atomic::Ordering;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::context::{DownloadTaskContext, stop_requested};
use super::finalization::finalize;

/// How a run ended
pub(super) enum Outcome {
    /// The output file already existed; the engine was never called
    AlreadyPresent { size: u64 },
    /// The engine finished the download
    Finished(Metadata),
    /// A stop or pause request was honored
    Interrupted(StopMode),
    /// The engine failed
    Failed(EngineError),
}

/// Core download task -- drives one admitted run to a terminal state.
///
/// Phases:
/// 1. Confirm the run is still current and the task is Pending
/// 2. Skip the engine if the output file already exists
/// 3. Starting: resolve metadata
/// 4. Downloading: run the engine while publishing smoothed progress
/// 5. Finalize status, release the slot and admit waiting tasks
pub(crate) async fn run_download_task(ctx: DownloadTaskContext) {
    let id = ctx.id.clone();

    // Phase 1: begin
    let begin = {
        let mut table = ctx.downloader.queue_state.table.lock().await;
        table
            .current_run_mut(&ctx.id, ctx.attempt)
            .filter(|entry| entry.task.status == TaskStatus::Pending)
            .map(|entry| (entry.task.url.clone(), entry.task.output_path.clone()))
    };
    let Some((url, previous_path)) = begin else {
        tracing::debug!(task_id = %id, attempt = ctx.attempt, "stale run, releasing slot");
        release_stale(&ctx).await;
        return;
    };
    if !ctx.downloader.queue_state.accepting_new.load(Ordering::SeqCst) {
        tracing::debug!(task_id = %id, "shutting down, leaving task pending");
        release_stale(&ctx).await;
        return;
    }

    let output_path = match previous_path {
        Some(path) => path,
        None => {
            let settings = ctx.downloader.runtime_config.settings.read().await;
            absolute_path(&planned_output_path(
                &settings.download_dir,
                &url,
                settings.quality,
            ))
        }
    };

    // Phase 2: idempotence
    if let Ok(meta) = tokio::fs::metadata(&output_path).await
        && meta.is_file()
        && meta.len() > 0
    {
        tracing::info!(
            task_id = %id,
            path = %output_path.display(),
            "output already exists, skipping download"
        );
        finalize(ctx, output_path, Outcome::AlreadyPresent { size: meta.len() }).await;
        return;
    }

    // Phase 3: Starting
    let path_for_task = output_path.clone();
    let started = ctx
        .update_current(|entry| {
            if entry.task.status != TaskStatus::Pending {
                return false;
            }
            entry.task.status = TaskStatus::Starting;
            entry.task.output_path = Some(path_for_task);
            true
        })
        .await;
    let Some(snapshot) = started else {
        release_stale(&ctx).await;
        return;
    };
    ctx.downloader.notify_update(&snapshot).await;
    tracing::info!(task_id = %id, url = %url, "starting download");

    let outcome = run_engine(&ctx, &url, &output_path).await;
    finalize(ctx, output_path, outcome).await;
}

/// Resolve and download, honoring stop requests at every await point
async fn run_engine(ctx: &DownloadTaskContext, url: &str, output_path: &Path) -> Outcome {
    let engine = ctx.downloader.collaborators.engine.clone();
    let cancel = CancellationToken::new();
    let mut stop_rx = ctx.stop_rx.clone();

    let resolved = tokio::select! {
        biased;
        mode = stop_requested(&mut stop_rx) => {
            cancel.cancel();
            return Outcome::Interrupted(mode);
        }
        result = engine.resolve_url(cancel.clone(), url) => result,
    };
    let metadata = match resolved {
        Ok(metadata) => metadata,
        Err(e) => return resolve_failure(ctx, e),
    };

    // Downloading
    let title = metadata.title.clone();
    let transitioned = ctx
        .update_current(|entry| {
            if entry.task.status != TaskStatus::Starting {
                return false;
            }
            entry.task.status = TaskStatus::Downloading;
            if !metadata.title.is_empty() {
                entry.task.title = metadata.title.clone();
            }
            if !metadata.duration.is_empty() {
                entry.task.duration = metadata.duration.clone();
            }
            if metadata.file_size.is_some() {
                entry.task.file_size = metadata.file_size;
            }
            true
        })
        .await;
    if let Some(snapshot) = transitioned {
        ctx.downloader.notify_update(&snapshot).await;
        tracing::debug!(task_id = %ctx.id, title = %title, "resolved, downloading");
    }
    if let Some(mode) = ctx.requested_stop() {
        return Outcome::Interrupted(mode);
    }

    let quality = ctx.downloader.runtime_config.settings.read().await.quality;
    let request = DownloadRequest {
        url: url.to_string(),
        output_path: output_path.to_path_buf(),
        quality,
    };

    let (sample_tx, mut sample_rx) = mpsc::channel(SAMPLE_CHANNEL_BUFFER);
    let mut download = engine.download(cancel.clone(), request, ProgressSink::new(sample_tx));

    let telemetry_config = &ctx.downloader.config.telemetry;
    let mut telemetry = TaskTelemetry::new(telemetry_config.smoothing_window);
    let period = telemetry_config.publish_interval;
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut stop_seen = false;
    let mut samples_open = true;

    let result = loop {
        tokio::select! {
            result = &mut download => break result,
            mode = stop_requested(&mut stop_rx), if !stop_seen => {
                stop_seen = true;
                tracing::info!(task_id = %ctx.id, mode = ?mode, "stop requested, cancelling engine");
                cancel.cancel();
            }
            sample = sample_rx.recv(), if samples_open => match sample {
                Some(sample) => telemetry.record(sample),
                None => samples_open = false,
            },
            _ = ticker.tick() => publish_progress(ctx, &mut telemetry).await,
        }
    };

    match (result, ctx.requested_stop()) {
        (Ok(metadata), _) => Outcome::Finished(metadata),
        (Err(_), Some(mode)) => Outcome::Interrupted(mode),
        (Err(e), None) if e.is_cancelled() => Outcome::Interrupted(StopMode::Stop),
        (Err(e), None) => Outcome::Failed(e),
    }
}

fn resolve_failure(ctx: &DownloadTaskContext, error: EngineError) -> Outcome {
    match ctx.requested_stop() {
        Some(mode) => Outcome::Interrupted(mode),
        None if error.is_cancelled() => Outcome::Interrupted(StopMode::Stop),
        None => Outcome::Failed(error),
    }
}

/// Write the smoothed telemetry into the task while it is still Downloading
async fn publish_progress(ctx: &DownloadTaskContext, telemetry: &mut TaskTelemetry) {
    let Some(publication) = telemetry.publish() else {
        return;
    };

    let snapshot = ctx
        .update_current(|entry| {
            if entry.task.status != TaskStatus::Downloading {
                return false;
            }
            let task = &mut entry.task;
            task.percent = publication.percent;
            task.progress = publication.progress;
            if let Some(speed) = publication.speed {
                task.speed = speed;
            }
            task.eta_secs = publication.eta_secs;
            if publication.total_bytes.is_some() {
                task.file_size = publication.total_bytes;
            }
            true
        })
        .await;

    if let Some(task) = snapshot {
        ctx.downloader.notify_update(&task).await;
    }
}

/// Give back the slot of a run that no longer owns its task
async fn release_stale(ctx: &DownloadTaskContext) {
    {
        let mut table = ctx.downloader.queue_state.table.lock().await;
        if let Some(entry) = table.current_run_mut(&ctx.id, ctx.attempt) {
            entry.run = None;
        }
        table.release_slot();
    }
    ctx.downloader.admit_pending().await;
}
