//! Poll scheduler
//!
//! Active object owning the watch set. The first registration spawns a
//! dedicated worker thread that wakes on a fixed delay and runs one
//! tick: snapshot the watch set, diff each record, write the advanced
//! baselines back, then dispatch notifications. Removing the last watch
//! shuts the worker down; registration never blocks on a tick in flight.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime};

use tracing::{debug, warn};

use super::record::Watch;
use super::ResourceListener;
use crate::error::TroveResult;
use crate::notification::ResourceNotification;
use crate::path;
use crate::store::FileStore;

/// Default delay between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Polling change watcher for a [`FileStore`].
pub struct PollWatcher {
    store: FileStore,
    watches: Arc<Mutex<Vec<Watch>>>,
    suppressed: Arc<AtomicUsize>,
    control: Mutex<Control>,
}

struct Control {
    interval: Duration,
    worker: Option<Worker>,
}

struct Worker {
    tx: Sender<Ctl>,
    handle: Option<JoinHandle<()>>,
}

enum Ctl {
    Reschedule(Duration),
    Shutdown,
}

impl Worker {
    /// Ask the worker to exit without waiting for it; an in-flight tick
    /// finishes on its own.
    fn detach(mut self) {
        let _ = self.tx.send(Ctl::Shutdown);
        self.handle.take();
    }

    fn shutdown_and_join(mut self) {
        let _ = self.tx.send(Ctl::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl PollWatcher {
    /// Watcher with the default 30 second poll interval.
    pub fn new(store: FileStore) -> Self {
        Self::with_interval(store, DEFAULT_POLL_INTERVAL)
    }

    /// Watcher with an explicit poll interval.
    pub fn with_interval(store: FileStore, interval: Duration) -> Self {
        Self {
            store,
            watches: Arc::new(Mutex::new(Vec::new())),
            suppressed: Arc::new(AtomicUsize::new(0)),
            control: Mutex::new(Control {
                interval,
                worker: None,
            }),
        }
    }

    /// Register a listener for a store path.
    ///
    /// The baseline (existence, and the child listing for a directory)
    /// is captured now. Registering an already-present (path, listener)
    /// pair is a no-op. The poll worker starts with the first watch.
    pub fn add_listener(
        &self,
        watch_path: &str,
        listener: Arc<dyn ResourceListener>,
    ) -> TroveResult<()> {
        let normalized = path::valid(watch_path)?;
        let mut control = self.control.lock().unwrap();
        {
            let mut watches = self.watches.lock().unwrap();
            if watches.iter().any(|w| w.matches(&normalized, &listener)) {
                return Ok(());
            }
            watches.push(Watch::new(self.store.base(), normalized, listener));
        }
        if control.worker.is_none() {
            control.worker = Some(self.spawn_worker(control.interval)?);
        }
        Ok(())
    }

    /// Remove the watch matching exactly this (path, listener) pair.
    ///
    /// Returns whether a watch was removed. Removing the last watch
    /// stops the poll worker; a tick already in progress is not
    /// interrupted.
    pub fn remove_listener(&self, watch_path: &str, listener: &Arc<dyn ResourceListener>) -> bool {
        let normalized = path::normalize(watch_path);
        let mut control = self.control.lock().unwrap();
        let empty = {
            let mut watches = self.watches.lock().unwrap();
            let before = watches.len();
            watches.retain(|w| !w.matches(&normalized, listener));
            if watches.len() == before {
                return false;
            }
            watches.is_empty()
        };
        if empty {
            if let Some(worker) = control.worker.take() {
                debug!("last watch removed, stopping poll worker");
                worker.detach();
            }
        }
        true
    }

    /// Reconfigure the poll interval.
    ///
    /// Takes effect immediately for a running worker and is remembered
    /// for workers started later.
    pub fn schedule(&self, interval: Duration) {
        let mut control = self.control.lock().unwrap();
        control.interval = interval;
        if let Some(worker) = &control.worker {
            let _ = worker.tx.send(Ctl::Reschedule(interval));
        }
    }

    /// Number of active watches.
    pub fn watch_count(&self) -> usize {
        self.watches.lock().unwrap().len()
    }

    /// Listener failures caught and discarded at the dispatch boundary.
    pub fn suppressed_failures(&self) -> usize {
        self.suppressed.load(Ordering::Relaxed)
    }

    /// Run a single poll synchronously on the calling thread.
    #[cfg(test)]
    pub(crate) fn poll_once(&self) {
        run_tick(&self.store, &self.watches, &self.suppressed);
    }

    fn spawn_worker(&self, interval: Duration) -> TroveResult<Worker> {
        let (tx, rx) = mpsc::channel();
        let store = self.store.clone();
        let watches = Arc::clone(&self.watches);
        let suppressed = Arc::clone(&self.suppressed);

        let handle = std::thread::Builder::new()
            .name("trove-poll".to_string())
            .spawn(move || {
                let mut delay = interval;
                loop {
                    match rx.recv_timeout(delay) {
                        Err(RecvTimeoutError::Timeout) => {
                            run_tick(&store, &watches, &suppressed);
                        }
                        Ok(Ctl::Reschedule(new_delay)) => delay = new_delay,
                        Ok(Ctl::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })?;

        Ok(Worker {
            tx,
            handle: Some(handle),
        })
    }
}

impl Drop for PollWatcher {
    fn drop(&mut self) {
        let worker = match self.control.lock() {
            Ok(mut control) => control.worker.take(),
            Err(poisoned) => poisoned.into_inner().worker.take(),
        };
        if let Some(worker) = worker {
            worker.shutdown_and_join();
        }
    }
}

/// One poll: diff every watch, write baselines back, dispatch.
///
/// All filesystem probing and listener dispatch happen outside the watch
/// set lock, on the calling (worker) thread.
fn run_tick(store: &FileStore, watches: &Mutex<Vec<Watch>>, suppressed: &AtomicUsize) {
    let now = SystemTime::now();

    let mut snapshot: Vec<Watch> = watches.lock().unwrap().clone();

    let mut pending: Vec<(Arc<dyn ResourceListener>, Vec<std::path::PathBuf>)> = Vec::new();
    for watch in &mut snapshot {
        let changed = watch.changed(now);
        if !changed.is_empty() {
            pending.push((Arc::clone(&watch.listener), changed));
        }
    }

    // Baselines advanced on the snapshot; copy them back to records still
    // registered. A record removed mid-tick stays gone.
    {
        let mut live = watches.lock().unwrap();
        for polled in &snapshot {
            if let Some(record) = live
                .iter_mut()
                .find(|w| w.matches(&polled.path, &polled.listener))
            {
                record.adopt_baseline(polled);
            }
        }
    }

    for (listener, changed) in pending {
        let notification = ResourceNotification::from_items(store, store.base(), &changed);
        let outcome = catch_unwind(AssertUnwindSafe(|| listener.changed(&notification)));
        if outcome.is_err() {
            // Best-effort delivery: one misbehaving observer must not
            // destabilize the poll loop.
            suppressed.fetch_add(1, Ordering::Relaxed);
            warn!("resource listener panicked, notification discarded");
        }
    }
}
