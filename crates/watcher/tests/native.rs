//! Tests against the platform notifier
//!
//! Timing on real file systems varies, so these wait generously and only
//! assert on what every backend reports.

use crossbeam_channel::unbounded;
use fswatch::{ErrorKind, Event, EventType, Watcher, WatcherState};
use std::fs;
use std::time::{Duration, Instant};
use tempfile::TempDir;

const TIMEOUT: Duration = Duration::from_secs(5);

/// Collect events until one matches or the timeout passes
fn wait_for(rx: &crossbeam_channel::Receiver<Vec<Event>>, pred: impl Fn(&Event) -> bool) -> bool {
    let deadline = Instant::now() + TIMEOUT;
    while let Some(left) = deadline.checked_duration_since(Instant::now()) {
        match rx.recv_timeout(left) {
            Ok(events) if events.iter().any(&pred) => return true,
            Ok(_) => continue,
            Err(_) => return false,
        }
    }
    false
}

#[test]
fn write_in_watched_dir_is_reported() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().canonicalize().unwrap();
    let file = root.join("a.txt");
    fs::write(&file, b"").unwrap();

    let (tx, rx) = unbounded();
    let watcher = fswatch::watch(
        &root,
        move |events| {
            let _ = tx.send(events);
        },
        None,
    )
    .unwrap();

    fs::write(&file, b"hello").unwrap();

    assert!(wait_for(&rx, |e| {
        e.event_type() == EventType::Write && e.path() == file
    }));
    watcher.close().unwrap();
}

#[test]
fn create_in_watched_dir_is_reported() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().canonicalize().unwrap();

    let (tx, rx) = unbounded();
    let watcher = fswatch::watch(
        &root,
        move |events| {
            let _ = tx.send(events);
        },
        None,
    )
    .unwrap();

    let file = root.join("new.txt");
    fs::write(&file, b"x").unwrap();

    assert!(wait_for(&rx, |e| {
        e.event_type() == EventType::Create && e.path() == file
    }));
    watcher.close().unwrap();
}

#[test]
fn recursive_registers_subdirectories() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().canonicalize().unwrap();
    let child = root.join("child");
    fs::create_dir(&child).unwrap();

    let (tx, rx) = unbounded();
    let watcher = fswatch::watch_recursive(
        &root,
        move |events| {
            let _ = tx.send(events);
        },
        None,
    )
    .unwrap();
    assert_eq!(watcher.watched_count(), 2);
    assert!(watcher.is_watching(&child));
    assert_eq!(watcher.stats().dirs_watched, 2);

    let nested = child.join("deep.txt");
    fs::write(&nested, b"x").unwrap();
    assert!(wait_for(&rx, |e| e.path() == nested));

    watcher.close().unwrap();
    assert_eq!(watcher.state(), WatcherState::Stopped);
}

#[test]
fn duplicate_add_is_rejected() {
    let temp = TempDir::new().unwrap();
    let watcher = Watcher::new();
    watcher.add(temp.path()).unwrap();
    let err = watcher.add(temp.path()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyWatching);
    assert_eq!(watcher.watched_count(), 1);
}

#[test]
fn restart_keeps_delivering() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().canonicalize().unwrap();

    let watcher = Watcher::new();
    watcher.add(&root).unwrap();
    watcher.start().unwrap();
    watcher.stop().unwrap();
    watcher.start().unwrap();

    let file = root.join("again.txt");
    fs::write(&file, b"x").unwrap();

    let deadline = Instant::now() + TIMEOUT;
    let mut found = false;
    while let Some(left) = deadline.checked_duration_since(Instant::now()) {
        match watcher.event_timeout(left) {
            Some(event) if event.path() == file => {
                found = true;
                break;
            }
            Some(_) => continue,
            None => break,
        }
    }
    assert!(found);
    watcher.close().unwrap();
}
