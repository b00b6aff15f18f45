// src/watch/watcher.rs

use std::path::PathBuf;

use anyhow::Result;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::driver::DriverEvent;
use crate::project::UnitMatcher;
use crate::watch::path_utils::changed_units;

/// Keeps the underlying `RecommendedWatcher` alive; dropping it stops
/// watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Watch `root` recursively and send [`DriverEvent::UnitsChanged`] for every
/// notify event touching files accepted by `matcher`.
pub fn spawn_watcher(
    root: impl Into<PathBuf>,
    matcher: UnitMatcher,
    driver_tx: mpsc::Sender<DriverEvent>,
) -> Result<WatcherHandle> {
    let root = root.into();
    // Canonical root so events for deleted files still relativize.
    let root = root.canonicalize().unwrap_or(root);

    // notify calls back on its own thread; bridge into the async world.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Err(err) = event_tx.send(event) {
                    eprintln!("incbuild: failed to forward notify event: {err}");
                }
            }
            Err(err) => {
                eprintln!("incbuild: file watch error: {err}");
            }
        },
        Config::default(),
    )?;

    watcher.watch(&root, RecursiveMode::Recursive)?;
    info!(root = ?root, "file watcher started");

    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            if matches!(event.kind, EventKind::Access(_)) {
                continue;
            }
            let units = changed_units(&root, &event.paths, &matcher);
            if units.is_empty() {
                continue;
            }
            debug!(?units, kind = ?event.kind, "units changed on disk");
            if driver_tx.send(DriverEvent::UnitsChanged(units)).await.is_err() {
                warn!("driver channel closed; stopping watcher loop");
                break;
            }
        }
        debug!("watcher event loop finished");
    });

    Ok(WatcherHandle { _inner: watcher })
}
