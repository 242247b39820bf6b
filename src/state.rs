use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Shared between the watcher callback, the startup sweep and the worker.
#[derive(Debug, Default)]
pub struct WatchState {
    queued: Mutex<HashSet<PathBuf>>,
    /// Only ever set. A stopped watch is not restarted.
    stop_flag: AtomicBool,
}

impl WatchState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the path is already waiting or being processed.
    pub fn mark_queued(&self, path: &Path) -> bool {
        let mut queued = self
            .queued
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        queued.insert(path.to_path_buf())
    }

    pub fn finish(&self, path: &Path) {
        let mut queued = self
            .queued
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        queued.remove(path);
    }

    pub fn queued_len(&self) -> usize {
        self.queued
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn request_stop(&self) {
        self.stop_flag.store(true, Ordering::Relaxed);
    }

    pub fn should_stop(&self) -> bool {
        self.stop_flag.load(Ordering::Relaxed)
    }
}
