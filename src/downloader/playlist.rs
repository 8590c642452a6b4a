//! Playlist coordination -- chunked downloads of registered playlists.
//!
//! Videos are downloaded in chunks of `max_playlist_parallel`. Each video goes
//! through the regular task pipeline (and therefore the admission bound); a
//! chunk must finish completely before the next one starts.

use crate::error::{Error, PlaylistError, Result};
use crate::types::{
    Event, Playlist, PlaylistId, PlaylistStatus, PlaylistVideo, Task, TaskId, TaskStatus,
    VideoStatus,
};
use futures::future::join_all;
use std::sync::atomic::Ordering;
use tokio::time::MissedTickBehavior;

use super::VideoDownloader;

fn playlist_not_found(id: &PlaylistId) -> Error {
    Error::Playlist(PlaylistError::NotFound { id: id.to_string() })
}

fn playlist_event(playlist: &Playlist) -> Event {
    Event::PlaylistUpdated {
        id: playlist.id.clone(),
        status: playlist.status,
        downloaded: playlist.downloaded,
        total_videos: playlist.total_videos,
    }
}

fn video_event(playlist_id: &PlaylistId, video: &PlaylistVideo) -> Event {
    Event::PlaylistVideoUpdated {
        playlist_id: playlist_id.clone(),
        video_id: video.id.clone(),
        status: video.status,
    }
}

/// What a poll of the underlying task decided
enum Mirror {
    /// Keep polling
    Continue,
    /// The video reached a final state (or was skipped)
    Done,
}

impl VideoDownloader {
    /// Register a playlist
    ///
    /// Registration does not start any download; call
    /// [`download_playlist`](Self::download_playlist) once the playlist is Ready.
    ///
    /// # Errors
    ///
    /// Returns [`PlaylistError::AlreadyExists`] if a playlist with the same ID is registered.
    pub async fn add_playlist(&self, playlist: Playlist) -> Result<()> {
        let event = {
            let mut playlists = self.playlist_state.playlists.write().await;
            if playlists.contains_key(&playlist.id) {
                return Err(Error::Playlist(PlaylistError::AlreadyExists {
                    id: playlist.id.to_string(),
                }));
            }
            let event = playlist_event(&playlist);
            tracing::info!(
                playlist_id = %playlist.id,
                videos = playlist.total_videos,
                "playlist added"
            );
            playlists.insert(playlist.id.clone(), playlist);
            event
        };

        self.emit_event(event);
        Ok(())
    }

    /// Get a snapshot of a playlist
    pub async fn get_playlist(&self, id: &PlaylistId) -> Option<Playlist> {
        self.playlist_state.playlists.read().await.get(id).cloned()
    }

    /// Snapshots of all playlists, oldest first
    pub async fn get_all_playlists(&self) -> Vec<Playlist> {
        let playlists = self.playlist_state.playlists.read().await;
        let mut all: Vec<Playlist> = playlists.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        all
    }

    /// Start downloading a Ready playlist in the background
    ///
    /// The playlist moves to Downloading immediately. Its pending videos are
    /// processed in chunks; the playlist ends up Completed unless it is
    /// cancelled with [`cancel_playlist`](Self::cancel_playlist) first.
    ///
    /// # Errors
    ///
    /// - [`PlaylistError::NotFound`] if no playlist has this ID
    /// - [`PlaylistError::NotReady`] if it is not Ready or has no videos
    pub async fn download_playlist(&self, id: &PlaylistId) -> Result<()> {
        let event = {
            let mut playlists = self.playlist_state.playlists.write().await;
            let playlist = playlists.get_mut(id).ok_or_else(|| playlist_not_found(id))?;
            if !playlist.is_ready_for_download() {
                return Err(Error::Playlist(PlaylistError::NotReady {
                    id: id.to_string(),
                    status: playlist.status.to_string(),
                }));
            }
            playlist.update_status(PlaylistStatus::Downloading);
            playlist_event(playlist)
        };
        self.emit_event(event);

        tokio::spawn(self.clone().run_playlist(id.clone()));
        Ok(())
    }

    /// Cancel a playlist download
    ///
    /// The playlist is marked Error and its downloading videos Skipped, so no
    /// further chunk starts. Tasks that were already added keep running.
    ///
    /// # Errors
    ///
    /// Returns [`PlaylistError::NotFound`] if no playlist has this ID.
    pub async fn cancel_playlist(&self, id: &PlaylistId) -> Result<()> {
        let events = {
            let mut playlists = self.playlist_state.playlists.write().await;
            let playlist = playlists.get_mut(id).ok_or_else(|| playlist_not_found(id))?;

            playlist.update_status(PlaylistStatus::Error);
            playlist.error = Some("cancelled".to_string());

            let downloading: Vec<String> = playlist
                .downloading_videos()
                .into_iter()
                .map(|v| v.id.clone())
                .collect();
            let mut events = vec![playlist_event(playlist)];
            for video_id in downloading {
                playlist.update_video(&video_id, |v| v.status = VideoStatus::Skipped);
                if let Some(video) = playlist.video(&video_id) {
                    events.push(video_event(id, video));
                }
            }
            events
        };

        tracing::info!(playlist_id = %id, skipped = events.len() - 1, "playlist cancelled");
        for event in events {
            self.emit_event(event);
        }
        Ok(())
    }

    /// Set how many playlist videos are downloaded per chunk
    ///
    /// Values below 1 are raised to 1. Takes effect for playlist downloads
    /// started afterwards. Returns the value actually applied.
    pub fn set_max_playlist_parallel(&self, max: usize) -> usize {
        let applied = max.max(1);
        self.runtime_config
            .max_playlist_parallel
            .store(applied, Ordering::SeqCst);
        tracing::info!(max_playlist_parallel = applied, "playlist chunk size updated");
        applied
    }

    /// Current playlist chunk size
    pub fn max_playlist_parallel(&self) -> usize {
        self.runtime_config
            .max_playlist_parallel
            .load(Ordering::SeqCst)
    }

    async fn run_playlist(self, id: PlaylistId) {
        let chunk_size = self.max_playlist_parallel().max(1);
        let pending: Vec<(String, String)> = match self.get_playlist(&id).await {
            Some(playlist) => playlist
                .pending_videos()
                .into_iter()
                .map(|v| (v.id.clone(), v.url.clone()))
                .collect(),
            None => return,
        };

        tracing::info!(
            playlist_id = %id,
            videos = pending.len(),
            chunk_size,
            "playlist download started"
        );

        for (index, chunk) in pending.chunks(chunk_size).enumerate() {
            tracing::debug!(playlist_id = %id, chunk = index, size = chunk.len(), "starting chunk");
            join_all(
                chunk
                    .iter()
                    .map(|(video_id, url)| self.download_playlist_video(&id, video_id, url)),
            )
            .await;

            let status = self.get_playlist(&id).await.map(|p| p.status);
            if status != Some(PlaylistStatus::Downloading) {
                tracing::info!(playlist_id = %id, chunk = index, "playlist aborted");
                return;
            }
        }

        let event = {
            let mut playlists = self.playlist_state.playlists.write().await;
            playlists
                .get_mut(&id)
                .filter(|p| p.status == PlaylistStatus::Downloading)
                .map(|playlist| {
                    playlist.update_status(PlaylistStatus::Completed);
                    playlist_event(playlist)
                })
        };
        if let Some(event) = event {
            tracing::info!(playlist_id = %id, "playlist download completed");
            self.emit_event(event);
        }
    }

    /// Add a task for one video and mirror it onto the video until it finishes
    async fn download_playlist_video(&self, playlist_id: &PlaylistId, video_id: &str, url: &str) {
        self.update_video(playlist_id, video_id, |video| {
            video.status = VideoStatus::Downloading;
            Mirror::Continue
        })
        .await;

        let task = match self.add_task(url).await {
            Ok(task) => task,
            Err(e) => {
                tracing::warn!(
                    playlist_id = %playlist_id,
                    video_id,
                    error = %e,
                    "could not add playlist video"
                );
                let message = e.to_string();
                self.update_video(playlist_id, video_id, |video| {
                    video.status = VideoStatus::Error;
                    video.error = Some(message);
                    Mirror::Done
                })
                .await;
                return;
            }
        };

        self.mirror_task(playlist_id, video_id, &task.id).await;
    }

    async fn mirror_task(&self, playlist_id: &PlaylistId, video_id: &str, task_id: &TaskId) {
        let mut ticker = tokio::time::interval(self.config.telemetry.status_poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let task = self.get_task(task_id).await;
            let step = self
                .update_video(playlist_id, video_id, |video| mirror_onto(video, task.as_ref()))
                .await;
            if matches!(step, Mirror::Done) {
                return;
            }
        }
    }

    /// Apply `update` to a video that has not been skipped, emitting the
    /// resulting events
    ///
    /// Missing playlists or videos and skipped videos yield [`Mirror::Done`].
    async fn update_video<F>(&self, playlist_id: &PlaylistId, video_id: &str, update: F) -> Mirror
    where
        F: FnOnce(&mut PlaylistVideo) -> Mirror,
    {
        let (step, events) = {
            let mut playlists = self.playlist_state.playlists.write().await;
            let Some(playlist) = playlists.get_mut(playlist_id) else {
                return Mirror::Done;
            };
            let Some(before) = playlist.video(video_id).map(|v| v.status) else {
                return Mirror::Done;
            };
            if before == VideoStatus::Skipped {
                return Mirror::Done;
            }

            let mut step = Mirror::Done;
            playlist.update_video(video_id, |video| step = update(video));

            let mut events = Vec::new();
            if let Some(video) = playlist.video(video_id)
                && video.status != before
            {
                events.push(video_event(playlist_id, video));
                if video.status == VideoStatus::Completed {
                    playlist.downloaded += 1;
                    events.push(playlist_event(playlist));
                }
            }
            (step, events)
        };

        for event in events {
            self.emit_event(event);
        }
        step
    }
}

/// Copy the task's state onto its playlist video
fn mirror_onto(video: &mut PlaylistVideo, task: Option<&Task>) -> Mirror {
    let Some(task) = task else {
        video.status = VideoStatus::Error;
        video.error = Some("task removed".to_string());
        return Mirror::Done;
    };

    video.speed = task.speed.clone();
    video.eta_secs = task.eta_secs;
    if task.output_path.is_some() {
        video.output_path = task.output_path.clone();
    }
    if task.file_size.is_some() {
        video.file_size = task.file_size;
    }

    match task.status {
        TaskStatus::Completed => {
            video.status = VideoStatus::Completed;
            video.progress = 1.0;
            video.speed.clear();
            video.eta_secs = 0;
            Mirror::Done
        }
        TaskStatus::Error | TaskStatus::Stopped => {
            video.status = VideoStatus::Error;
            video.error = Some(if task.last_error.is_empty() {
                "stopped".to_string()
            } else {
                task.last_error.clone()
            });
            Mirror::Done
        }
        TaskStatus::Paused => {
            video.status = VideoStatus::Paused;
            video.progress = task.progress;
            Mirror::Continue
        }
        _ => {
            video.status = VideoStatus::Downloading;
            video.progress = task.progress;
            Mirror::Continue
        }
    }
}
