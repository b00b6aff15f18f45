// src/watch/mod.rs

//! Watch mode: turns filesystem events under the project root into
//! [`crate::driver::DriverEvent::UnitsChanged`] reports.

pub mod path_utils;
pub mod watcher;

pub use path_utils::{changed_units, event_unit_path};
pub use watcher::{WatcherHandle, spawn_watcher};
