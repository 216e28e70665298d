//! Many writers, one directory.

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};

use nx_connector_fs::{DispatchSink, ExecutionFailure, FsDispatchSink};
use nx_policy::resolve_within;
use serde_json::{json, Map, Value};
use tempfile::tempdir;

fn payload(writer: usize) -> Map<String, Value> {
    match json!({ "writer": writer, "body": "x".repeat(64 * 1024) }) {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

#[test]
fn racing_writers_on_one_name_get_exactly_one_winner() {
    let dir = tempdir().unwrap();
    let path = resolve_within(dir.path(), "shared.json").unwrap();
    let sink = FsDispatchSink::new();
    let wins = AtomicUsize::new(0);
    let conflicts = AtomicUsize::new(0);

    std::thread::scope(|scope| {
        for writer in 0..16 {
            let (sink, path, wins, conflicts) = (&sink, &path, &wins, &conflicts);
            scope.spawn(move || match sink.write(path, payload(writer)) {
                Ok(_) => {
                    wins.fetch_add(1, Ordering::SeqCst);
                }
                Err(ExecutionFailure::AlreadyExists { .. }) => {
                    conflicts.fetch_add(1, Ordering::SeqCst);
                }
                Err(other) => panic!("unexpected failure: {other}"),
            });
        }
    });

    assert_eq!(wins.load(Ordering::SeqCst), 1);
    assert_eq!(conflicts.load(Ordering::SeqCst), 15);

    // The survivor is one complete record, and no temp files remain.
    let content = fs::read_to_string(path.as_path()).unwrap();
    let parsed: Value = serde_json::from_str(&content).unwrap();
    assert_eq!(parsed["payload"]["body"].as_str().unwrap().len(), 64 * 1024);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn writers_on_different_names_are_independent() {
    let dir = tempdir().unwrap();
    let sink = FsDispatchSink::new();

    std::thread::scope(|scope| {
        for writer in 0..8 {
            let (sink, root) = (&sink, dir.path());
            scope.spawn(move || {
                let path = resolve_within(root, &format!("dispatch_{writer}.json")).unwrap();
                sink.write(&path, payload(writer)).unwrap();
            });
        }
    });

    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 8);
}
