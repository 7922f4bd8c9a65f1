//! Atomic writer integration tests.

use std::{
    fs,
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};

use vidthumb::{CancellationToken, ErrorKind, write_atomic, write_atomic_with_cancellation};

fn temporary_files(directory: &Path) -> Vec<String> {
    fs::read_dir(directory)
        .unwrap()
        .filter_map(Result::ok)
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".tmp"))
        .collect()
}

#[test]
fn readers_never_observe_partial_content() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let destination = directory.path().join("thumb.jpg");
    let payload: Vec<u8> = (0..4 * 1024 * 1024).map(|index| (index % 251) as u8).collect();

    let done = Arc::new(AtomicBool::new(false));
    let watcher = {
        let destination = destination.clone();
        let done = Arc::clone(&done);
        let expected = payload.len();
        thread::spawn(move || {
            let mut observed = 0;
            while !done.load(Ordering::Acquire) || observed == 0 {
                if let Ok(bytes) = fs::read(&destination) {
                    assert_eq!(bytes.len(), expected, "Observed a partial file");
                    observed += 1;
                }
                if done.load(Ordering::Acquire) && !destination.exists() {
                    break;
                }
            }
        })
    };

    write_atomic(&destination, &payload).expect("Atomic write failed");
    done.store(true, Ordering::Release);
    watcher.join().expect("Watcher thread panicked");

    assert_eq!(fs::read(&destination).unwrap(), payload);
    assert!(temporary_files(directory.path()).is_empty());
}

#[test]
fn cancellation_before_rename_leaves_no_trace() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let destination = directory.path().join("thumb.jpg");
    let token = CancellationToken::new();
    token.cancel();

    let error = write_atomic_with_cancellation(&destination, b"jpeg bytes", &token).unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Cancelled);
    assert!(!destination.exists());
    assert!(temporary_files(directory.path()).is_empty());
}

#[test]
fn overwrite_replaces_whole_file() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let destination = directory.path().join("thumb.jpg");

    write_atomic(&destination, &[1u8; 4096]).unwrap();
    write_atomic(&destination, &[2u8; 16]).unwrap();

    assert_eq!(fs::read(&destination).unwrap(), vec![2u8; 16]);
    assert!(temporary_files(directory.path()).is_empty());
}

#[test]
fn nested_destination_directories_are_created() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let destination = directory.path().join("a").join("b").join("c.jpg");

    write_atomic(&destination, b"bytes").unwrap();

    assert!(destination.exists());
}
