//! Core types for video-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Prefix of every generated task identifier
const TASK_ID_PREFIX: &str = "task-";

/// Unique, time-ordered identifier for a download task
///
/// Generated as `task-<UUIDv7>`, so lexicographic order follows creation order.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// Generate a fresh time-ordered task ID
    pub fn generate() -> Self {
        Self(format!("{}{}", TASK_ID_PREFIX, uuid::Uuid::now_v7()))
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Task lifecycle status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Queued, waiting for an admission slot
    Pending,
    /// Admitted; resolving metadata
    Starting,
    /// Transfer in progress
    Downloading,
    /// Stop or pause requested; waiting for the engine to wind down
    Stopping,
    /// Stopped by the user
    Stopped,
    /// Paused by the user; can be resumed from the partial artifact
    Paused,
    /// Finished successfully
    Completed,
    /// Failed with an error
    Error,
}

impl TaskStatus {
    /// Starting, Downloading or Stopping
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            TaskStatus::Starting | TaskStatus::Downloading | TaskStatus::Stopping
        )
    }

    /// Completed, Stopped or Error
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Stopped | TaskStatus::Error
        )
    }

    /// States from which a task may be restarted
    pub fn is_restartable(&self) -> bool {
        matches!(
            self,
            TaskStatus::Error | TaskStatus::Stopped | TaskStatus::Paused | TaskStatus::Pending
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::Starting => "Starting",
            TaskStatus::Downloading => "Downloading",
            TaskStatus::Stopping => "Stopping",
            TaskStatus::Stopped => "Stopped",
            TaskStatus::Paused => "Paused",
            TaskStatus::Completed => "Completed",
            TaskStatus::Error => "Error",
        };
        f.write_str(s)
    }
}

/// Intent behind a cancellation request, resolved once the engine actually stops
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopMode {
    /// Keep the partial artifact; the task ends as Paused
    Pause,
    /// Hard stop; the task ends as Stopped
    Stop,
}

/// A single video's download lifecycle record
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique, time-ordered identifier
    pub id: TaskId,
    /// Source URL
    pub url: String,
    /// Current lifecycle status
    pub status: TaskStatus,
    /// Progress fraction (0.0 to 1.0)
    pub progress: f64,
    /// Progress percentage (0 to 100)
    pub percent: u8,
    /// Human readable speed (e.g. "1.2MB/s"), empty when unknown
    pub speed: String,
    /// Estimated seconds remaining, -1 if unknown
    pub eta_secs: i64,
    /// Last (classified) error message, empty when none
    pub last_error: String,
    /// Absolute path of the downloaded file once known
    pub output_path: Option<PathBuf>,
    /// When the current attempt was created or (re)started
    pub started_at: DateTime<Utc>,
    /// When the task reached a finished state
    pub finished_at: Option<DateTime<Utc>>,
    /// Video title, empty until resolved
    pub title: String,
    /// Video duration as reported by the engine
    pub duration: String,
    /// File size in bytes, when known
    pub file_size: Option<u64>,
}

impl Task {
    /// Create a new Pending task for a URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            id: TaskId::generate(),
            url: url.into(),
            status: TaskStatus::Pending,
            progress: 0.0,
            percent: 0,
            speed: String::new(),
            eta_secs: -1,
            last_error: String::new(),
            output_path: None,
            started_at: Utc::now(),
            finished_at: None,
            title: String::new(),
            duration: String::new(),
            file_size: None,
        }
    }

    /// Title, or the URL while the title is not yet known
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            &self.url
        } else {
            &self.title
        }
    }

    /// ETA formatted as `mm:ss` or `hh:mm:ss`, or "—" if unknown
    pub fn eta_display(&self) -> String {
        if self.eta_secs <= 0 {
            return "—".to_string();
        }

        let hours = self.eta_secs / 3600;
        let minutes = (self.eta_secs % 3600) / 60;
        let seconds = self.eta_secs % 60;

        if hours > 0 {
            format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
        } else {
            format!("{:02}:{:02}", minutes, seconds)
        }
    }

    /// Reset transfer telemetry and error for a fresh attempt
    pub(crate) fn reset_progress(&mut self) {
        self.progress = 0.0;
        self.percent = 0;
        self.last_error.clear();
        self.speed.clear();
        self.eta_secs = -1;
        self.finished_at = None;
    }
}

/// Identifier of a playlist (the site's list ID)
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaylistId(pub String);

impl From<&str> for PlaylistId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for PlaylistId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for PlaylistId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Playlist status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaylistStatus {
    /// Being parsed by the external parser
    Parsing,
    /// Parsed and ready to download
    Ready,
    /// Coordinator is running
    Downloading,
    /// All chunks processed
    Completed,
    /// Parsing failed or the playlist was cancelled
    Error,
}

impl std::fmt::Display for PlaylistStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PlaylistStatus::Parsing => "parsing",
            PlaylistStatus::Ready => "ready",
            PlaylistStatus::Downloading => "downloading",
            PlaylistStatus::Completed => "completed",
            PlaylistStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Status of a single video in a playlist
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    /// Not yet started
    Pending,
    /// Its task is running
    Downloading,
    /// Its task was paused by the user
    Paused,
    /// Downloaded
    Completed,
    /// Its task failed or could not be created
    Error,
    /// Dropped from the playlist's bookkeeping by a cancellation
    Skipped,
}

/// A single video in a playlist, mirroring the task it spawns
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlaylistVideo {
    /// Video ID
    pub id: String,
    /// Video title
    pub title: String,
    /// Duration text
    pub duration: String,
    /// Video URL
    pub url: String,
    /// Current status
    pub status: VideoStatus,
    /// Progress fraction (0.0 to 1.0)
    pub progress: f64,
    /// Error message, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Path to the downloaded file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    /// File size in bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    /// Human readable speed mirrored from the task
    #[serde(default)]
    pub speed: String,
    /// ETA in seconds, -1 if unknown
    pub eta_secs: i64,
    /// When the video was added
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl PlaylistVideo {
    /// Create a Pending video entry
    pub fn new(id: impl Into<String>, title: impl Into<String>, url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.into(),
            duration: String::new(),
            url: url.into(),
            status: VideoStatus::Pending,
            progress: 0.0,
            error: None,
            output_path: None,
            file_size: None,
            speed: String::new(),
            eta_secs: -1,
            created_at: now,
            updated_at: now,
        }
    }
}

/// An ordered batch of videos downloaded as a coordinated unit
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    /// Playlist ID
    pub id: PlaylistId,
    /// Playlist title
    pub title: String,
    /// Playlist URL
    pub url: String,
    /// Videos in playlist order
    pub videos: Vec<PlaylistVideo>,
    /// Current status
    pub status: PlaylistStatus,
    /// Number of videos
    pub total_videos: usize,
    /// Number of videos downloaded by the coordinator
    pub downloaded: usize,
    /// Error message, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the playlist was created
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl Playlist {
    /// Create an empty playlist in Parsing state
    pub fn new(id: impl Into<PlaylistId>, url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: String::new(),
            url: url.into(),
            videos: Vec::new(),
            status: PlaylistStatus::Parsing,
            total_videos: 0,
            downloaded: 0,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a video
    pub fn add_video(&mut self, video: PlaylistVideo) {
        self.videos.push(video);
        self.total_videos = self.videos.len();
        self.updated_at = Utc::now();
    }

    /// Remove a video by ID
    pub fn remove_video(&mut self, video_id: &str) {
        if let Some(pos) = self.videos.iter().position(|v| v.id == video_id) {
            self.videos.remove(pos);
            self.total_videos = self.videos.len();
            self.updated_at = Utc::now();
        }
    }

    /// Update the playlist status
    pub fn update_status(&mut self, status: PlaylistStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    /// Apply a mutation to one video, returning whether the video exists
    pub fn update_video<F>(&mut self, video_id: &str, update: F) -> bool
    where
        F: FnOnce(&mut PlaylistVideo),
    {
        match self.videos.iter_mut().find(|v| v.id == video_id) {
            Some(video) => {
                update(video);
                let now = Utc::now();
                video.updated_at = now;
                self.updated_at = now;
                true
            }
            None => false,
        }
    }

    /// Look up a video by ID
    pub fn video(&self, video_id: &str) -> Option<&PlaylistVideo> {
        self.videos.iter().find(|v| v.id == video_id)
    }

    /// Videos still waiting to be downloaded
    pub fn pending_videos(&self) -> Vec<&PlaylistVideo> {
        self.videos_with_status(VideoStatus::Pending)
    }

    /// Videos currently downloading
    pub fn downloading_videos(&self) -> Vec<&PlaylistVideo> {
        self.videos_with_status(VideoStatus::Downloading)
    }

    /// Videos downloaded successfully
    pub fn completed_videos(&self) -> Vec<&PlaylistVideo> {
        self.videos_with_status(VideoStatus::Completed)
    }

    fn videos_with_status(&self, status: VideoStatus) -> Vec<&PlaylistVideo> {
        self.videos.iter().filter(|v| v.status == status).collect()
    }

    /// Overall progress as a percentage of completed videos
    pub fn download_progress(&self) -> f64 {
        if self.total_videos == 0 {
            return 0.0;
        }
        self.completed_videos().len() as f64 / self.total_videos as f64 * 100.0
    }

    /// Ready and non-empty
    pub fn is_ready_for_download(&self) -> bool {
        self.status == PlaylistStatus::Ready && self.total_videos > 0
    }

    /// Whether any video failed
    pub fn has_errors(&self) -> bool {
        self.videos.iter().any(|v| v.status == VideoStatus::Error)
    }
}

/// Event emitted to subscribers on every observable change
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A task's status, progress, speed, ETA, path or error changed
    TaskUpdated {
        /// Snapshot of the task after the change
        task: Task,
    },

    /// A task was removed from the registry
    TaskRemoved {
        /// Task ID
        id: TaskId,
    },

    /// A playlist's status or completed count changed
    PlaylistUpdated {
        /// Playlist ID
        id: PlaylistId,
        /// New status
        status: PlaylistStatus,
        /// Videos downloaded so far
        downloaded: usize,
        /// Total videos in the playlist
        total_videos: usize,
    },

    /// A playlist video changed status
    PlaylistVideoUpdated {
        /// Playlist ID
        playlist_id: PlaylistId,
        /// Video ID
        video_id: String,
        /// New status
        status: VideoStatus,
    },

    /// Graceful shutdown completed
    Shutdown,
}
