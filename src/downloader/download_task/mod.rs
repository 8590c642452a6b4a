//! Download task execution -- the lifecycle of one admitted task.
//!
//! Split into focused submodules:
//! - [`context`] - Per-run state and stop signal handling
//! - [`orchestration`] - Begin, resolve and download phases
//! - [`finalization`] - Terminal status, slot release and side effects

mod context;
mod finalization;
mod orchestration;


pub(crate) use context::DownloadTaskContext;
pub(crate) use orchestration::run_download_task;
