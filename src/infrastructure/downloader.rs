//! Media download pool.
//!
//! A bounded worker pool for (source locator, destination path, priority)
//! media tasks. One pool is created per exported account and never reused:
//! the coordinator enqueues tasks while it renders, then drains the pool
//! before moving to the next account. Cancellation is cooperative: queued
//! tasks are dropped, in-flight tasks finish.

use std::collections::{BinaryHeap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use crate::domain::{AppError, MediaSink, Result};

/// Fetches one media item to a destination path.
///
/// The pool is transport-agnostic; HTTP or any other remote transport plugs
/// in through this trait.
pub trait MediaFetcher: Send + Sync {
    /// Fetch `source` into `dest`. `user_agent` identifies the client to
    /// transports that care; the local fetcher ignores it.
    ///
    /// # Errors
    /// Fails when the source cannot be read or the destination written.
    fn fetch(&self, source: &str, dest: &Path, user_agent: &str) -> Result<()>;
}

/// Fetcher for media that already lives on the local filesystem: the source
/// locator is a path and the task is a copy.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalMediaFetcher;

impl MediaFetcher for LocalMediaFetcher {
    fn fetch(&self, source: &str, dest: &Path, _user_agent: &str) -> Result<()> {
        let source_path = Path::new(source);
        if !source_path.is_file() {
            return Err(AppError::InvalidData {
                message: format!("media source not found: {source}"),
            });
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| AppError::io("Failed to create media directory", e))?;
        }
        fs::copy(source_path, dest)
            .map_err(|e| AppError::io(format!("Failed to copy media to {}", dest.display()), e))?;
        Ok(())
    }
}

#[derive(Debug)]
struct Task {
    priority: u32,
    seq: u64,
    source: String,
    dest: PathBuf,
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for Task {}

impl PartialOrd for Task {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Task {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Max-heap: higher priority first, FIFO within a priority.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Debug, Default)]
struct TaskQueue {
    heap: BinaryHeap<Task>,
    seen_dests: HashSet<PathBuf>,
    next_seq: u64,
    closed: bool,
}

struct Shared {
    queue: Mutex<TaskQueue>,
    available: Condvar,
    cancelled: AtomicBool,
    pending: AtomicUsize,
    fetcher: Arc<dyn MediaFetcher>,
    user_agent: String,
}

fn lock_queue(shared: &Shared) -> MutexGuard<'_, TaskQueue> {
    shared.queue.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Bounded-concurrency pool with three operations: enqueue, request-cancel
/// and drain.
pub struct DownloadPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl DownloadPool {
    /// Spawn `workers` download threads (at least one).
    #[must_use]
    pub fn new(workers: usize, fetcher: Arc<dyn MediaFetcher>, user_agent: String) -> Self {
        let shared = Arc::new(Shared {
            queue: Mutex::new(TaskQueue::default()),
            available: Condvar::new(),
            cancelled: AtomicBool::new(false),
            pending: AtomicUsize::new(0),
            fetcher,
            user_agent,
        });

        let workers = (0..workers.max(1))
            .map(|idx| {
                let shared = Arc::clone(&shared);
                std::thread::Builder::new()
                    .name(format!("media-dl-{idx}"))
                    .spawn(move || worker_loop(&shared))
            })
            .filter_map(|spawned| match spawned {
                Ok(handle) => Some(handle),
                Err(err) => {
                    tracing::warn!(error = %err, "failed to spawn download worker");
                    None
                }
            })
            .collect();

        Self { shared, workers }
    }

    /// Enqueue a media task. Empty sources and destinations already queued
    /// in this pool are ignored; so is everything after cancellation.
    pub fn add_task(&self, source: &str, dest: &Path, priority: u32) {
        if source.is_empty() || self.shared.cancelled.load(Ordering::Relaxed) {
            return;
        }

        let mut queue = lock_queue(&self.shared);
        if queue.closed || !queue.seen_dests.insert(dest.to_path_buf()) {
            return;
        }
        let seq = queue.next_seq;
        queue.next_seq += 1;
        queue.heap.push(Task {
            priority,
            seq,
            source: source.to_string(),
            dest: dest.to_path_buf(),
        });
        self.shared.pending.fetch_add(1, Ordering::Relaxed);
        drop(queue);
        self.shared.available.notify_one();
    }

    /// Number of tasks queued or in flight.
    #[must_use]
    pub fn running_count(&self) -> usize {
        self.shared.pending.load(Ordering::Relaxed)
    }

    /// Cooperative cancellation: queued tasks are dropped, the task each
    /// worker is currently running finishes normally.
    pub fn request_cancel(&self) {
        self.shared.cancelled.store(true, Ordering::Relaxed);
        let mut queue = lock_queue(&self.shared);
        let dropped = queue.heap.len();
        queue.heap.clear();
        drop(queue);
        if dropped > 0 {
            self.shared.pending.fetch_sub(dropped, Ordering::Relaxed);
            tracing::debug!(dropped, "dropped queued media tasks on cancel");
        }
        self.shared.available.notify_all();
    }

    /// Close the queue and block until every worker has exited. Pending
    /// writes complete before this returns.
    pub fn drain(mut self) {
        {
            let mut queue = lock_queue(&self.shared);
            queue.closed = true;
        }
        self.shared.available.notify_all();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                tracing::error!("download worker panicked");
            }
        }
    }
}

impl MediaSink for DownloadPool {
    fn enqueue(&self, source: &str, dest: &Path, priority: u32) {
        self.add_task(source, dest, priority);
    }
}

fn worker_loop(shared: &Shared) {
    loop {
        let task = {
            let mut queue = lock_queue(shared);
            loop {
                if let Some(task) = queue.heap.pop() {
                    break Some(task);
                }
                if queue.closed {
                    break None;
                }
                queue = shared
                    .available
                    .wait(queue)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        };

        let Some(task) = task else {
            return;
        };

        if !shared.cancelled.load(Ordering::Relaxed) {
            match shared.fetcher.fetch(&task.source, &task.dest, &shared.user_agent) {
                Ok(()) => {
                    tracing::trace!(dest = %task.dest.display(), "media task done");
                }
                Err(err) => {
                    tracing::warn!(
                        source = %task.source,
                        dest = %task.dest.display(),
                        error = %err,
                        "media task failed"
                    );
                }
            }
        }
        shared.pending.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;
    use tempfile::tempdir;

    /// Records fetched (source, dest) pairs without touching the disk.
    #[derive(Default)]
    struct RecordingFetcher {
        log: Mutex<Vec<(String, PathBuf)>>,
    }

    impl MediaFetcher for RecordingFetcher {
        fn fetch(&self, source: &str, dest: &Path, _user_agent: &str) -> Result<()> {
            self.log
                .lock()
                .unwrap()
                .push((source.to_string(), dest.to_path_buf()));
            Ok(())
        }
    }

    /// Blocks the first fetch until released, records the rest.
    struct GatedFetcher {
        gate: Mutex<Option<mpsc::Receiver<()>>>,
        log: Mutex<Vec<String>>,
    }

    impl MediaFetcher for GatedFetcher {
        fn fetch(&self, source: &str, _dest: &Path, _user_agent: &str) -> Result<()> {
            // Take the receiver out first; the lock must not be held while
            // waiting, the test thread polls the same mutex.
            let gate = self.gate.lock().unwrap().take();
            if let Some(gate) = gate {
                let _ = gate.recv_timeout(Duration::from_secs(5));
            }
            self.log.lock().unwrap().push(source.to_string());
            Ok(())
        }
    }

    #[test]
    fn test_all_tasks_run_before_drain_returns() {
        let fetcher = Arc::new(RecordingFetcher::default());
        let pool = DownloadPool::new(2, fetcher.clone(), String::new());

        pool.add_task("a", Path::new("/tmp/out/a"), 0);
        pool.add_task("b", Path::new("/tmp/out/b"), 0);
        pool.add_task("c", Path::new("/tmp/out/c"), 1);
        pool.drain();

        let log = fetcher.log.lock().unwrap();
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_duplicate_destinations_and_empty_sources_ignored() {
        let fetcher = Arc::new(RecordingFetcher::default());
        let pool = DownloadPool::new(1, fetcher.clone(), String::new());

        pool.add_task("a", Path::new("/tmp/out/same"), 0);
        pool.add_task("b", Path::new("/tmp/out/same"), 0);
        pool.add_task("", Path::new("/tmp/out/other"), 0);
        pool.drain();

        let log = fetcher.log.lock().unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].0, "a");
    }

    #[test]
    fn test_cancel_drops_queued_tasks_but_finishes_in_flight() {
        let (release, gate) = mpsc::channel();
        let fetcher = Arc::new(GatedFetcher {
            gate: Mutex::new(Some(gate)),
            log: Mutex::new(Vec::new()),
        });
        let pool = DownloadPool::new(1, fetcher.clone(), String::new());

        pool.add_task("first", Path::new("/tmp/out/1"), 0);
        // Wait until the single worker has picked the first task up.
        for _ in 0..100 {
            if fetcher.gate.lock().unwrap().is_none() {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        pool.add_task("second", Path::new("/tmp/out/2"), 0);
        pool.add_task("third", Path::new("/tmp/out/3"), 0);

        pool.request_cancel();
        release.send(()).unwrap();
        pool.drain();

        let log = fetcher.log.lock().unwrap();
        assert_eq!(*log, vec!["first".to_string()]);
    }

    #[test]
    fn test_higher_priority_runs_first() {
        let (release, gate) = mpsc::channel();
        let fetcher = Arc::new(GatedFetcher {
            gate: Mutex::new(Some(gate)),
            log: Mutex::new(Vec::new()),
        });
        let pool = DownloadPool::new(1, fetcher.clone(), String::new());

        // The gate task occupies the only worker while we queue behind it.
        pool.add_task("gate", Path::new("/tmp/out/g"), 0);
        for _ in 0..100 {
            if fetcher.gate.lock().unwrap().is_none() {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        pool.add_task("low", Path::new("/tmp/out/low"), 0);
        pool.add_task("high", Path::new("/tmp/out/high"), 5);

        release.send(()).unwrap();
        pool.drain();

        let log = fetcher.log.lock().unwrap();
        assert_eq!(*log, vec!["gate".to_string(), "high".to_string(), "low".to_string()]);
    }

    #[test]
    fn test_drain_waits_for_pending_task() {
        let fetcher = Arc::new(RecordingFetcher::default());
        let pool = DownloadPool::new(2, fetcher.clone(), String::new());
        pool.add_task("a", Path::new("/tmp/out/a"), 0);
        assert!(pool.running_count() <= 1);
        pool.drain();
        assert_eq!(fetcher.log.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_local_fetcher_copies_file() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("src.bin");
        fs::write(&source, b"payload").unwrap();
        let dest = dir.path().join("nested/dst.bin");

        let fetcher = LocalMediaFetcher;
        fetcher
            .fetch(source.to_str().unwrap(), &dest, "test-agent")
            .unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"payload");
    }

    #[test]
    fn test_local_fetcher_missing_source_errors() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("dst.bin");
        let err = LocalMediaFetcher
            .fetch("/definitely/not/here", &dest, "")
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
