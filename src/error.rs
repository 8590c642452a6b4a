//! Error types for video-dl
//!
//! This module separates the error families the library deals with:
//! - Validation errors returned synchronously by the public API ([`TaskError`], [`PlaylistError`])
//! - Engine errors reported by the external download engine ([`EngineError`])
//! - Configuration and I/O errors

use thiserror::Error;

/// Result type alias for video-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for video-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "quality")
        key: Option<String>,
    },

    /// Task registry error (unknown task, duplicate URL, illegal transition)
    #[error("task error: {0}")]
    Task(#[from] TaskError),

    /// Playlist coordinator error
    #[error("playlist error: {0}")]
    Playlist(#[from] PlaylistError),

    /// Error reported by the download engine
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Shutdown in progress - not accepting new tasks
    #[error("shutdown in progress: not accepting new tasks")]
    ShuttingDown,
}

/// Task-related validation errors
#[derive(Debug, Error)]
pub enum TaskError {
    /// No task with this ID exists in the registry
    #[error("task {id} not found")]
    NotFound {
        /// The task ID that was not found
        id: String,
    },

    /// A non-finished task already exists for this URL
    #[error("task already exists for URL: {url}")]
    Duplicate {
        /// The URL that is already being handled
        url: String,
        /// ID of the existing task
        existing_id: String,
    },

    /// Cannot perform operation in current state
    #[error("cannot {operation} task {id} in state {current_state}")]
    InvalidState {
        /// The task ID that is in an invalid state for the operation
        id: String,
        /// The operation that was attempted (e.g., "resume", "restart")
        operation: String,
        /// The current state that prevents the operation
        current_state: String,
    },
}

/// Playlist-related validation errors
#[derive(Debug, Error)]
pub enum PlaylistError {
    /// No playlist with this ID is registered
    #[error("playlist {id} not found")]
    NotFound {
        /// The playlist ID that was not found
        id: String,
    },

    /// A playlist with this ID is already registered
    #[error("playlist already exists: {id}")]
    AlreadyExists {
        /// The duplicated playlist ID
        id: String,
    },

    /// Playlist is not Ready or has no videos
    #[error("playlist {id} is not ready for download (status: {status})")]
    NotReady {
        /// The playlist ID
        id: String,
        /// Current playlist status
        status: String,
    },
}

/// Errors reported by a [`DownloadEngine`](crate::engine::DownloadEngine)
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// The operation observed its cancellation token and stopped
    #[error("operation cancelled")]
    Cancelled,

    /// Metadata resolution failed
    #[error("{0}")]
    Resolve(String),

    /// Download failed; the message is the engine's raw error text
    #[error("{0}")]
    Download(String),
}

impl EngineError {
    /// Whether this error is the engine acknowledging cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, EngineError::Cancelled)
    }
}

impl Error {
    /// Build a configuration error for a specific key
    pub(crate) fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}
