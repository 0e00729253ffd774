//! End-to-end watch scenario over the public API
//!
//! Exercises the background worker for real: short poll interval, real
//! filesystem changes, notification delivery asserted with a deadline.

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime};

use filetime::{set_file_mtime, FileTime};
use trove::{FileStore, PollWatcher, ResourceListener, ResourceNotification};

struct Collector {
    deltas: Mutex<Vec<Vec<String>>>,
}

impl ResourceListener for Collector {
    fn changed(&self, notification: &ResourceNotification) {
        self.deltas
            .lock()
            .unwrap()
            .push(notification.delta().to_vec());
    }
}

fn wait_for<F: Fn() -> bool>(condition: F) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn background_poll_delivers_file_change() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path()).unwrap();

    // Seed the file through the crash-safe writer.
    let resource = store.get("config.txt").unwrap();
    let mut out = resource.writer().unwrap();
    out.write_all(b"version = 1").unwrap();
    out.commit().unwrap();

    let watcher = PollWatcher::with_interval(store.clone(), Duration::from_millis(25));
    let collector = Arc::new(Collector {
        deltas: Mutex::new(Vec::new()),
    });
    watcher.add_listener("config.txt", collector.clone()).unwrap();

    // Let at least one baseline poll pass before changing anything.
    std::thread::sleep(Duration::from_millis(80));

    let mut out = resource.writer().unwrap();
    out.write_all(b"version = 2").unwrap();
    out.commit().unwrap();
    // Past any baseline regardless of filesystem timestamp granularity.
    let future = FileTime::from_system_time(SystemTime::now() + Duration::from_secs(1));
    set_file_mtime(store.base().join("config.txt"), future).unwrap();

    wait_for(|| !collector.deltas.lock().unwrap().is_empty());

    let deltas = collector.deltas.lock().unwrap().clone();
    assert!(!deltas.is_empty(), "no notification within deadline");
    assert_eq!(deltas[0], vec!["config.txt".to_string()]);

    let listener: Arc<dyn ResourceListener> = collector.clone();
    assert!(watcher.remove_listener("config.txt", &listener));
    assert_eq!(watcher.watch_count(), 0);
}

#[test]
fn background_poll_watches_directory_tree() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path()).unwrap();
    std::fs::create_dir(store.base().join("styles")).unwrap();

    let watcher = PollWatcher::with_interval(store.clone(), Duration::from_millis(25));
    let collector = Arc::new(Collector {
        deltas: Mutex::new(Vec::new()),
    });
    watcher.add_listener("styles", collector.clone()).unwrap();

    std::thread::sleep(Duration::from_millis(80));
    std::fs::write(store.base().join("styles/new.css"), "body {}").unwrap();

    wait_for(|| {
        collector
            .deltas
            .lock()
            .unwrap()
            .iter()
            .any(|delta| delta.iter().any(|p| p == "styles/new.css"))
    });

    let deltas = collector.deltas.lock().unwrap().clone();
    assert!(
        deltas
            .iter()
            .any(|delta| delta.iter().any(|p| p == "styles/new.css")),
        "added child was not reported: {deltas:?}"
    );
}
