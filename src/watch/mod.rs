// src/watch/mod.rs

//! Dependency tracking and file watching.
//!
//! This module is responsible for:
//! - Keeping the reverse dependency index (`dependency -> parents`) and
//!   computing watch/unwatch deltas per compile ([`index`]).
//! - Wiring up a cross-platform filesystem watcher (`notify`) for literal
//!   file paths ([`watcher`]).
//! - Deciding which watch events should re-run the host ([`event_handler`]).
//! - Deciding which source files are eligible for watching ([`patterns`]).
//!
//! It does **not** run transforms; the preprocessor engine drives it.

pub mod event_handler;
pub mod index;
pub mod path_utils;
pub mod patterns;
pub mod watcher;

pub use event_handler::{UnlinkedTracker, handle_watch_event};
pub use index::{DependencyIndex, WatchDelta};
pub use patterns::{collect_matching_files, is_watch_eligible};
pub use watcher::{BackendFactory, FileWatcher, NotifyBackend, WatchBackend, WatchEvent};
