use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};

use chrono::Local;
use notify_debouncer_mini::notify;
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, DebouncedEventKind};
use tracing::{debug, error, info, warn};

use crate::config::FolderSettings;
use crate::error::AppError;
use crate::models::processing::DailyStats;
use crate::services::file_service;
use crate::services::pipeline_service::Pipeline;
use crate::state::WatchState;

/// Files younger than this are assumed to still be syncing.
pub const SWEEP_MIN_AGE: Duration = Duration::from_secs(5);
const WORKER_POLL: Duration = Duration::from_millis(250);

pub struct WatchHandle {
    _debouncer: notify_debouncer_mini::Debouncer<notify::RecommendedWatcher>,
}

/// The scan folder itself plus every sibling whose name starts with the same
/// prefix (dated overflow folders).
pub fn monitored_dirs(folders: &FolderSettings) -> Result<Vec<PathBuf>, AppError> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(&folders.sync_root)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with(&folders.scans_prefix) && entry.path().is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    if dirs.is_empty() {
        return Err(AppError::Watcher(format!(
            "no scan folder found: {}",
            folders.scans_dir().display()
        )));
    }
    Ok(dirs)
}

/// A PDF that exists and is not an editor or sync temp file.
pub fn is_candidate(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .is_some_and(|n| n.starts_with('.') || n.starts_with("~$"));
    !hidden && file_service::is_pdf(path) && path.is_file()
}

/// A zero-byte file is a placeholder the sync client has not filled yet.
/// Its next write raises another event.
pub fn has_content(path: &Path) -> bool {
    fs::metadata(path).is_ok_and(|m| m.len() > 0)
}

/// PDFs already sitting in the monitored folders. Skips empty files and
/// anything modified within `min_age`.
pub fn sweep(dirs: &[PathBuf], min_age: Duration) -> Vec<PathBuf> {
    let now = SystemTime::now();
    let mut found = Vec::new();

    for dir in dirs {
        for entry in walkdir::WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !is_candidate(path) {
                continue;
            }
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            if metadata.len() == 0 {
                debug!(file = %path.display(), "skipping empty file");
                continue;
            }
            let settled = metadata
                .modified()
                .ok()
                .and_then(|m| now.duration_since(m).ok())
                .is_some_and(|age| age >= min_age);
            if !settled {
                debug!(file = %path.display(), "skipping recently modified file");
                continue;
            }
            found.push(path.to_path_buf());
        }
    }

    found.sort();
    found
}

pub fn start_watching(
    dirs: &[PathBuf],
    settle_delay: Duration,
    state: Arc<WatchState>,
    tx: Sender<PathBuf>,
) -> Result<WatchHandle, AppError> {
    let mut debouncer = new_debouncer(settle_delay, move |result: DebounceEventResult| match result {
        Ok(events) => {
            for event in events {
                if matches!(
                    event.kind,
                    DebouncedEventKind::Any | DebouncedEventKind::AnyContinuous
                ) && is_candidate(&event.path)
                {
                    if has_content(&event.path) {
                        enqueue(&state, &tx, event.path);
                    } else {
                        debug!(file = %event.path.display(), "skipping empty file");
                    }
                }
            }
        }
        Err(e) => {
            error!(error = ?e, "watcher error");
        }
    })
    .map_err(|e| AppError::Watcher(e.to_string()))?;

    for dir in dirs {
        if !dir.is_dir() {
            return Err(AppError::Watcher(format!(
                "not a directory: {}",
                dir.display()
            )));
        }
        debouncer
            .watcher()
            .watch(dir, notify::RecursiveMode::NonRecursive)
            .map_err(|e| AppError::Watcher(e.to_string()))?;
        info!(dir = %dir.display(), "watching");
    }

    Ok(WatchHandle {
        _debouncer: debouncer,
    })
}

/// Hand a path to the worker unless it is already queued.
pub fn enqueue(state: &WatchState, tx: &Sender<PathBuf>, path: PathBuf) -> bool {
    if !state.mark_queued(&path) {
        debug!(file = %path.display(), "already queued");
        return false;
    }
    if tx.send(path.clone()).is_err() {
        state.finish(&path);
        return false;
    }
    true
}

/// Single consumer. Processes one file at a time and checks for shutdown
/// between files. Returns the stats of the day in progress.
pub fn run_worker(pipeline: &Pipeline, rx: Receiver<PathBuf>, state: &WatchState) -> DailyStats {
    let mut stats = DailyStats::new(Local::now().date_naive());

    while !state.should_stop() {
        let path = match rx.recv_timeout(WORKER_POLL) {
            Ok(path) => path,
            Err(RecvTimeoutError::Timeout) => {
                roll_over(&mut stats);
                continue;
            }
            Err(RecvTimeoutError::Disconnected) => break,
        };

        roll_over(&mut stats);
        if path.is_file() {
            pipeline.process_file(&path, &mut stats);
        } else {
            debug!(file = %path.display(), "gone before processing");
        }
        state.finish(&path);
    }

    stats
}

fn roll_over(stats: &mut DailyStats) {
    let today = Local::now().date_naive();
    if stats.date != today {
        info!("daily summary: {}", stats.summary_line());
        *stats = DailyStats::new(today);
    }
}

/// A running watcher plus its worker thread.
pub struct WatchSession {
    handle: Option<WatchHandle>,
    worker: JoinHandle<DailyStats>,
    state: Arc<WatchState>,
}

impl WatchSession {
    /// Starts the worker, sweeps what is already in `dirs`, then begins
    /// watching for new files.
    pub fn start(
        pipeline: Pipeline,
        dirs: &[PathBuf],
        settle_delay: Duration,
    ) -> Result<Self, AppError> {
        let state = Arc::new(WatchState::new());
        let (tx, rx) = mpsc::channel();

        let worker_state = state.clone();
        let worker = thread::Builder::new()
            .name("mailroom-worker".into())
            .spawn(move || run_worker(&pipeline, rx, &worker_state))?;

        let pending = sweep(dirs, SWEEP_MIN_AGE);
        info!(count = pending.len(), "startup sweep");
        for path in pending {
            enqueue(&state, &tx, path);
        }

        let handle = match start_watching(dirs, settle_delay, state.clone(), tx) {
            Ok(handle) => handle,
            Err(e) => {
                state.request_stop();
                let _ = worker.join();
                return Err(e);
            }
        };

        Ok(Self {
            handle: Some(handle),
            worker,
            state,
        })
    }

    /// Stops watching, lets the current file finish and returns the day's
    /// stats.
    pub fn shutdown(mut self) -> Result<DailyStats, AppError> {
        self.handle.take();
        self.state.request_stop();
        let pending = self.state.queued_len();
        if pending > 0 {
            warn!(pending, "shutting down with files still queued");
        }
        self.worker
            .join()
            .map_err(|_| AppError::General("worker thread panicked".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, RecordStoreError};
    use crate::models::record::{ClientRecord, HistoryPolicy, RecordUpdate};
    use crate::services::file_service::LocalFiles;
    use crate::services::ocr_service::TextSource;
    use crate::services::pipeline_service::PipelineSettings;
    use crate::services::record_service::RecordStore;

    struct StaticText(&'static str);

    impl TextSource for StaticText {
        fn extract_text(&self, _path: &Path) -> Result<Option<String>, AppError> {
            Ok(Some(self.0.to_string()))
        }
    }

    struct NoRecords;

    impl RecordStore for NoRecords {
        fn find_by_name(&self, _name: &str) -> Result<Option<ClientRecord>, RecordStoreError> {
            Ok(None)
        }

        fn update(&self, _id: &str, _update: &RecordUpdate) -> Result<(), RecordStoreError> {
            Ok(())
        }
    }

    fn pipeline(text: &'static str) -> Pipeline {
        Pipeline::new(
            Box::new(StaticText(text)),
            Box::new(NoRecords),
            Box::new(LocalFiles),
            PipelineSettings {
                clients_root: PathBuf::from("/nonexistent"),
                letters_subfolder: "DOL Letters".into(),
                history_policy: HistoryPolicy::AlwaysAppend,
                date_override: None,
            },
        )
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mailroom_watch_{name}"));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_monitored_dirs_include_prefixed_siblings() {
        let root = temp_dir("monitored");
        fs::create_dir_all(root.join("1. Daily Temp Scans")).unwrap();
        fs::create_dir_all(root.join("1. Daily Temp Scans 2025-08-04")).unwrap();
        fs::create_dir_all(root.join("2. Active Clients")).unwrap();
        fs::write(root.join("1. Daily Temp Scans.txt"), "not a dir").unwrap();

        let folders = FolderSettings {
            sync_root: root.clone(),
            scans_prefix: "1. Daily Temp Scans".into(),
            clients_folder: "2. Active Clients".into(),
            letters_subfolder: "DOL Letters".into(),
        };
        let dirs = monitored_dirs(&folders).unwrap();
        assert_eq!(
            dirs,
            vec![
                root.join("1. Daily Temp Scans"),
                root.join("1. Daily Temp Scans 2025-08-04"),
            ]
        );
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_monitored_dirs_missing_scan_folder() {
        let root = temp_dir("monitored_missing");
        let folders = FolderSettings {
            sync_root: root.clone(),
            scans_prefix: "1. Daily Temp Scans".into(),
            clients_folder: "2. Active Clients".into(),
            letters_subfolder: "DOL Letters".into(),
        };
        assert!(matches!(monitored_dirs(&folders), Err(AppError::Watcher(_))));
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_is_candidate() {
        let dir = temp_dir("candidate");
        fs::write(dir.join("scan.PDF"), "%PDF").unwrap();
        fs::write(dir.join(".scan.pdf"), "%PDF").unwrap();
        fs::write(dir.join("notes.txt"), "hi").unwrap();

        assert!(is_candidate(&dir.join("scan.PDF")));
        assert!(!is_candidate(&dir.join(".scan.pdf")));
        assert!(!is_candidate(&dir.join("notes.txt")));
        assert!(!is_candidate(&dir.join("missing.pdf")));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_has_content() {
        let dir = temp_dir("content");
        fs::write(dir.join("empty.pdf"), "").unwrap();
        fs::write(dir.join("scan.pdf"), "%PDF").unwrap();

        assert!(is_candidate(&dir.join("empty.pdf")));
        assert!(!has_content(&dir.join("empty.pdf")));
        assert!(has_content(&dir.join("scan.pdf")));
        assert!(!has_content(&dir.join("missing.pdf")));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_sweep_skips_empty_and_recent_files() {
        let dir = temp_dir("sweep");
        fs::write(dir.join("a.pdf"), "%PDF").unwrap();
        fs::write(dir.join("empty.pdf"), "").unwrap();
        fs::write(dir.join("b.txt"), "text").unwrap();
        fs::create_dir_all(dir.join("nested")).unwrap();
        fs::write(dir.join("nested").join("deep.pdf"), "%PDF").unwrap();

        let dirs = vec![dir.clone()];
        assert_eq!(sweep(&dirs, Duration::ZERO), vec![dir.join("a.pdf")]);
        assert!(sweep(&dirs, Duration::from_secs(3600)).is_empty());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_enqueue_suppresses_duplicates() {
        let state = WatchState::new();
        let (tx, rx) = mpsc::channel();
        assert!(enqueue(&state, &tx, PathBuf::from("/scans/a.pdf")));
        assert!(!enqueue(&state, &tx, PathBuf::from("/scans/a.pdf")));
        assert_eq!(rx.try_iter().count(), 1);
    }

    #[test]
    fn test_worker_processes_queue_until_disconnected() {
        let dir = temp_dir("worker");
        let scan = dir.join("scan.pdf");
        fs::write(&scan, "%PDF").unwrap();

        let state = WatchState::new();
        let (tx, rx) = mpsc::channel();
        enqueue(&state, &tx, scan.clone());
        enqueue(&state, &tx, dir.join("vanished.pdf"));
        drop(tx);

        let stats = run_worker(&pipeline("nothing recognisable here"), rx, &state);
        assert_eq!(stats.ignored, 1);
        assert_eq!(stats.total, 1);
        assert_eq!(state.queued_len(), 0);
        assert!(scan.exists());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_worker_stops_on_flag() {
        let state = WatchState::new();
        state.request_stop();
        let (_tx, rx) = mpsc::channel();
        let stats = run_worker(&pipeline(""), rx, &state);
        assert_eq!(stats.total, 0);
    }

    #[test]
    fn test_watcher_enqueues_new_pdf() {
        let dir = temp_dir("live");
        let state = Arc::new(WatchState::new());
        let (tx, rx) = mpsc::channel();
        let handle =
            start_watching(&[dir.clone()], Duration::from_millis(200), state, tx).unwrap();

        let file = dir.join("incoming.pdf");
        fs::write(&file, "%PDF-1.4").unwrap();

        let received = rx.recv_timeout(Duration::from_secs(5));
        drop(handle);
        let _ = fs::remove_dir_all(&dir);

        let received = received.expect("watcher should report the new pdf");
        assert_eq!(received.file_name(), file.file_name());
    }

    #[test]
    fn test_watcher_waits_for_empty_pdf_to_fill() {
        let dir = temp_dir("live_empty");
        let state = Arc::new(WatchState::new());
        let (tx, rx) = mpsc::channel();
        let handle = start_watching(
            &[dir.clone()],
            Duration::from_millis(200),
            state.clone(),
            tx,
        )
        .unwrap();

        let file = dir.join("placeholder.pdf");
        fs::write(&file, "").unwrap();
        let early = rx.recv_timeout(Duration::from_secs(1));
        assert_eq!(state.queued_len(), 0);

        fs::write(&file, "%PDF-1.4").unwrap();
        let filled = rx.recv_timeout(Duration::from_secs(5));
        drop(handle);
        let _ = fs::remove_dir_all(&dir);

        assert!(early.is_err(), "empty pdf must not be queued");
        let filled = filled.expect("filled pdf should be queued");
        assert_eq!(filled.file_name(), file.file_name());
    }

    #[test]
    fn test_watcher_invalid_directory() {
        let state = Arc::new(WatchState::new());
        let (tx, _rx) = mpsc::channel();
        let result = start_watching(
            &[PathBuf::from("/nonexistent/mailroom_watch")],
            Duration::from_millis(200),
            state,
            tx,
        );
        assert!(result.is_err());
    }
}
