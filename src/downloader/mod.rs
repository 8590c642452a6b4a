//! Core downloader implementation split into focused submodules.
//!
//! The `VideoDownloader` struct and its methods are organized by domain:
//! - [`tasks`] - Adding and querying tasks
//! - [`control`] - Task lifecycle control (stop/pause/resume/restart/remove)
//! - [`queue`] - Admission of pending tasks under the parallelism bound
//! - [`download_task`] - Execution of a single admitted task
//! - [`playlist`] - Chunked playlist downloads
//! - [`config_ops`] - Runtime configuration updates
//! - [`lifecycle`] - Graceful shutdown

mod config_ops;
mod control;
mod download_task;
mod lifecycle;
mod playlist;
mod queue;
mod tasks;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::config::{Config, QualityPreset};
use crate::engine::DownloadEngine;
use crate::error::{Error, Result, TaskError};
use crate::media_index::{MediaIndexer, NoOpMediaIndexer};
use crate::types::{Event, Playlist, PlaylistId, StopMode, Task, TaskId};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize};
use tokio::sync::{Mutex, RwLock, broadcast, watch};

/// Number of events buffered per subscriber before it starts lagging
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Callback invoked with a snapshot of a task after every observable change
pub type UpdateCallback = Arc<dyn Fn(&Task) + Send + Sync>;

/// Handle to the running download unit of an admitted task
pub(crate) struct RunHandle {
    /// Admission number; a unit whose attempt no longer matches is stale
    pub(crate) attempt: u64,
    /// Stop signal carrying the requested stop mode
    pub(crate) stop_tx: Arc<watch::Sender<Option<StopMode>>>,
}

/// A task and, once admitted, the handle to its running unit
pub(crate) struct TaskEntry {
    pub(crate) task: Task,
    pub(crate) run: Option<RunHandle>,
}

/// Task registry and admission bookkeeping, guarded by a single lock
pub(crate) struct TaskTable {
    pub(crate) tasks: HashMap<TaskId, TaskEntry>,
    /// Number of reserved admission slots
    pub(crate) active_count: usize,
    pub(crate) max_parallel: usize,
    pub(crate) next_attempt: u64,
}

impl TaskTable {
    pub(crate) fn new(max_parallel: usize) -> Self {
        Self {
            tasks: HashMap::new(),
            active_count: 0,
            max_parallel,
            next_attempt: 0,
        }
    }

    pub(crate) fn entry_mut(&mut self, id: &TaskId) -> Result<&mut TaskEntry> {
        self.tasks.get_mut(id).ok_or_else(|| {
            Error::Task(TaskError::NotFound {
                id: id.to_string(),
            })
        })
    }

    /// The entry for `id` if `attempt` is still its current admission
    pub(crate) fn current_run_mut(&mut self, id: &TaskId, attempt: u64) -> Option<&mut TaskEntry> {
        self.tasks
            .get_mut(id)
            .filter(|entry| entry.run.as_ref().is_some_and(|run| run.attempt == attempt))
    }
}

/// Task table and shutdown flag
#[derive(Clone)]
pub(crate) struct QueueState {
    /// Task registry including admission counters
    pub(crate) table: Arc<Mutex<TaskTable>>,
    /// Flag to indicate whether new tasks are accepted (set to false during shutdown)
    pub(crate) accepting_new: Arc<AtomicBool>,
}

/// Settings that can change while the downloader runs
pub(crate) struct RuntimeSettings {
    pub(crate) download_dir: PathBuf,
    pub(crate) quality: QualityPreset,
}

/// Runtime-mutable configuration (separate from static config)
#[derive(Clone)]
pub(crate) struct RuntimeConfig {
    pub(crate) settings: Arc<RwLock<RuntimeSettings>>,
    /// Chunk size for playlist downloads
    pub(crate) max_playlist_parallel: Arc<AtomicUsize>,
}

/// Registered playlists
#[derive(Clone)]
pub(crate) struct PlaylistState {
    pub(crate) playlists: Arc<RwLock<HashMap<PlaylistId, Playlist>>>,
}

/// External collaborators
#[derive(Clone)]
pub(crate) struct Collaborators {
    pub(crate) engine: Arc<dyn DownloadEngine>,
    pub(crate) media_indexer: Arc<dyn MediaIndexer>,
}

/// Main downloader instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct VideoDownloader {
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Configuration as validated at construction
    pub(crate) config: Arc<Config>,
    /// Download engine and media indexer
    pub(crate) collaborators: Collaborators,
    /// Task table and admission state
    pub(crate) queue_state: QueueState,
    /// Runtime-mutable configuration
    pub(crate) runtime_config: RuntimeConfig,
    /// Playlist table
    pub(crate) playlist_state: PlaylistState,
    /// Optional per-change callback
    pub(crate) update_callback: Arc<RwLock<Option<UpdateCallback>>>,
}

impl VideoDownloader {
    /// Create a new VideoDownloader instance
    ///
    /// Validates the configuration (clamping parallelism into range), creates the
    /// download directory and sets up the event broadcast channel.
    pub async fn new(mut config: Config, engine: Arc<dyn DownloadEngine>) -> Result<Self> {
        config.validate()?;

        tokio::fs::create_dir_all(&config.download.download_dir)
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create download directory '{}': {}",
                        config.download.download_dir.display(),
                        e
                    ),
                ))
            })?;

        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let queue_state = QueueState {
            table: Arc::new(Mutex::new(TaskTable::new(
                config.download.max_parallel_downloads,
            ))),
            accepting_new: Arc::new(AtomicBool::new(true)),
        };

        let runtime_config = RuntimeConfig {
            settings: Arc::new(RwLock::new(RuntimeSettings {
                download_dir: config.download.download_dir.clone(),
                quality: config.download.quality,
            })),
            max_playlist_parallel: Arc::new(AtomicUsize::new(
                config.download.max_playlist_parallel,
            )),
        };

        tracing::info!(
            engine = engine.name(),
            download_dir = %config.download.download_dir.display(),
            max_parallel = config.download.max_parallel_downloads,
            quality = %config.download.quality,
            "video downloader initialized"
        );

        Ok(Self {
            event_tx,
            config: Arc::new(config),
            collaborators: Collaborators {
                engine,
                media_indexer: Arc::new(NoOpMediaIndexer),
            },
            queue_state,
            runtime_config,
            playlist_state: PlaylistState {
                playlists: Arc::new(RwLock::new(HashMap::new())),
            },
            update_callback: Arc::new(RwLock::new(None)),
        })
    }

    /// Use `indexer` to register completed downloads with the platform's media library
    pub fn with_media_indexer(mut self, indexer: Arc<dyn MediaIndexer>) -> Self {
        self.collaborators.media_indexer = indexer;
        self
    }

    /// Subscribe to download events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events independently.
    /// Events are buffered, but if a subscriber falls behind by more than 1000 events,
    /// it will receive a `RecvError::Lagged` error.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Register a callback fired with a task snapshot after every change
    ///
    /// Replaces any previous callback. Updates for one task arrive in order;
    /// updates for different tasks may be delivered concurrently.
    pub async fn set_update_callback<F>(&self, callback: F)
    where
        F: Fn(&Task) + Send + Sync + 'static,
    {
        *self.update_callback.write().await = Some(Arc::new(callback));
    }

    /// Remove the update callback
    pub async fn clear_update_callback(&self) {
        *self.update_callback.write().await = None;
    }

    /// Get the configuration the downloader was created with
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no active subscribers, the event is silently dropped.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Fire the update callback and a `TaskUpdated` event for a task snapshot
    ///
    /// Must be called without holding the task table lock.
    pub(crate) async fn notify_update(&self, task: &Task) {
        let callback = self.update_callback.read().await.clone();
        if let Some(callback) = callback {
            callback(task);
        }
        self.emit_event(Event::TaskUpdated { task: task.clone() });
    }
}
