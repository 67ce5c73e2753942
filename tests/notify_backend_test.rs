//! Exercises the platform watcher end to end. Timing depends on the OS, so
//! assertions poll the merged view instead of matching exact event sequences.

use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use confwatch::{ChangeEvent, ConfigSource, FileSource, SharedListener, WatchState};
use serde_json::{Value, json};
use tempfile::TempDir;

const WAIT: Duration = Duration::from_secs(10);

fn wait_for_value(source: &FileSource, key: &str, expected: &Value) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if source.get_configuration_by_key(key).ok().as_ref() == Some(expected) {
            return true;
        }
        thread::sleep(Duration::from_millis(50));
    }
    false
}

#[test]
fn test_edits_on_disk_are_merged() {
    let temp_dir = TempDir::new().unwrap();
    let root = fs::canonicalize(temp_dir.path()).unwrap();
    let file = root.join("app.conf");
    fs::write(&file, "mode=dev\n").unwrap();

    let source = FileSource::new();
    source.add_file(&root, 0, None).unwrap();

    let (tx, rx) = crossbeam_channel::unbounded();
    let listener: SharedListener = Arc::new(move |event: &ChangeEvent| {
        let _ = tx.send(event.clone());
    });
    source.dynamic_config_handler(Some(listener)).unwrap();
    assert_eq!(source.watch_state(), WatchState::Watching);

    fs::write(&file, "mode=prod\n").unwrap();
    assert!(wait_for_value(&source, "mode", &json!("prod")));
    let reported = std::iter::from_fn(|| rx.recv_timeout(WAIT).ok())
        .any(|event| event.key == "mode" && event.value == json!("prod"));
    assert!(reported);

    fs::write(root.join("extra.conf"), "level=3\n").unwrap();
    assert!(wait_for_value(&source, "level", &json!("3")));

    source.cleanup().unwrap();
    assert_eq!(source.watch_state(), WatchState::Idle);
}

#[cfg(target_os = "linux")]
#[test]
fn test_symlink_swap_is_picked_up() {
    use std::os::unix::fs::symlink;

    let temp_dir = TempDir::new().unwrap();
    let root = fs::canonicalize(temp_dir.path()).unwrap();
    fs::create_dir(root.join("..v1")).unwrap();
    fs::write(root.join("..v1").join("app.conf"), "mode=dev\n").unwrap();
    symlink("..v1", root.join("..data")).unwrap();
    symlink("..data/app.conf", root.join("app.conf")).unwrap();

    let source = FileSource::new();
    source.add_file(root.join("app.conf"), 0, None).unwrap();
    let listener: SharedListener = Arc::new(|_event: &ChangeEvent| {});
    source.dynamic_config_handler(Some(listener)).unwrap();

    fs::create_dir(root.join("..v2")).unwrap();
    fs::write(root.join("..v2").join("app.conf"), "mode=prod\n").unwrap();
    symlink("..v2", root.join("..data_tmp")).unwrap();
    fs::rename(root.join("..data_tmp"), root.join("..data")).unwrap();
    // Unlinking the old target changes its link count, which is reported on
    // the watched symlink path.
    fs::remove_dir_all(root.join("..v1")).unwrap();

    assert!(wait_for_value(&source, "mode", &json!("prod")));
    source.cleanup().unwrap();
}
