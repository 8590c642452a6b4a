//! Task submission and queries.

use crate::error::{Error, Result, TaskError};
use crate::types::{Task, TaskId};
use crate::utils::extract_video_id;
use std::sync::atomic::Ordering;

use super::{TaskEntry, VideoDownloader};

impl VideoDownloader {
    /// Add a download task for `url`
    ///
    /// The task is registered as Pending and admitted right away if a download
    /// slot is free; otherwise it waits until one is released.
    ///
    /// # Errors
    ///
    /// - [`Error::ShuttingDown`] once [`shutdown`](Self::shutdown) has been called
    /// - [`TaskError::Duplicate`] if a task for the same URL is not finished yet
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use video_dl::*;
    /// # async fn example(downloader: VideoDownloader) -> Result<()> {
    /// let task = downloader.add_task("https://youtu.be/dQw4w9WgXcQ").await?;
    /// println!("queued {}", task.id);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn add_task(&self, url: impl Into<String>) -> Result<Task> {
        if !self.queue_state.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let url = url.into();
        let (task, launch) = {
            let mut table = self.queue_state.table.lock().await;

            if let Some(existing) = table
                .tasks
                .values()
                .find(|entry| entry.task.url == url && !entry.task.status.is_finished())
            {
                return Err(Error::Task(TaskError::Duplicate {
                    url,
                    existing_id: existing.task.id.to_string(),
                }));
            }

            let task = Task::new(url);
            table.tasks.insert(
                task.id.clone(),
                TaskEntry {
                    task: task.clone(),
                    run: None,
                },
            );
            let launch = table.try_admit(&task.id);
            (task, launch)
        };

        tracing::info!(
            task_id = %task.id,
            url = %task.url,
            admitted = launch.is_some(),
            "task added"
        );

        self.notify_update(&task).await;
        if let Some(launch) = launch {
            self.launch(launch);
        }

        Ok(task)
    }

    /// Get a snapshot of a task
    pub async fn get_task(&self, id: &TaskId) -> Option<Task> {
        let table = self.queue_state.table.lock().await;
        table.tasks.get(id).map(|entry| entry.task.clone())
    }

    /// Snapshots of all tasks, in creation order
    pub async fn get_all_tasks(&self) -> Vec<Task> {
        let table = self.queue_state.table.lock().await;
        let mut tasks: Vec<Task> = table.tasks.values().map(|e| e.task.clone()).collect();
        tasks.sort_by(|a, b| a.id.cmp(&b.id));
        tasks
    }

    /// Find the task whose URL resolves to `video_id`
    ///
    /// IDs are derived with [`extract_video_id`], so `vimeo_…` and hashed
    /// `video_…` IDs can be looked up as well as plain YouTube IDs. When several
    /// tasks match, the oldest wins.
    pub async fn get_task_by_video_id(&self, video_id: &str) -> Option<Task> {
        self.get_all_tasks()
            .await
            .into_iter()
            .find(|task| extract_video_id(&task.url) == video_id)
    }
}
