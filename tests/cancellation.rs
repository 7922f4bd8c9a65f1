//! Cancellation and timeout integration tests.
//!
//! Tests require fixture files from `tests/fixtures/generate_fixtures.sh`.

use std::{
    path::Path,
    sync::{Arc, Mutex},
    time::Duration,
};

use vidthumb::{
    CancellationToken, ErrorKind, ProgressCallback, ProgressInfo, Stage, ThumbnailOptions,
    ThumbnailRequest, Thumbnailer,
};

fn sample_video_path() -> &'static str {
    "tests/fixtures/sample_video.mp4"
}

/// Cancels a token once a given stage completes.
struct CancelAfter {
    stage: Stage,
    token: CancellationToken,
    seen: Mutex<Vec<Stage>>,
}

impl ProgressCallback for CancelAfter {
    fn on_progress(&self, info: &ProgressInfo) {
        self.seen.lock().unwrap().push(info.stage);
        if info.stage == self.stage {
            self.token.cancel();
        }
    }
}

fn cancel_after(stage: Stage) -> (Arc<CancelAfter>, Thumbnailer) {
    let token = CancellationToken::new();
    let hook = Arc::new(CancelAfter {
        stage,
        token: token.clone(),
        seen: Mutex::new(Vec::new()),
    });
    let thumbnailer = Thumbnailer::new(
        ThumbnailOptions::new()
            .with_progress(hook.clone())
            .with_cancellation(token),
    );
    (hook, thumbnailer)
}

#[test]
fn cancelled_before_start_never_probes() {
    let temporary_directory = tempfile::tempdir().unwrap();
    let destination = temporary_directory.path().join("thumb.jpg");
    let token = CancellationToken::new();
    token.cancel();

    // A missing source would be an I/O error if the request had started.
    let error = Thumbnailer::default()
        .generate_with_cancellation(&ThumbnailRequest::new("missing.mp4", &destination), &token)
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Cancelled);
    assert!(!destination.exists());
}

#[test]
fn cancelled_after_probe_stops_before_decoding() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let (hook, thumbnailer) = cancel_after(Stage::Probed);
    let temporary_directory = tempfile::tempdir().unwrap();
    let destination = temporary_directory.path().join("thumb.jpg");

    let error = thumbnailer
        .generate(&ThumbnailRequest::new(path, &destination))
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Cancelled);
    assert_eq!(*hook.seen.lock().unwrap(), vec![Stage::Probed]);
    assert!(!destination.exists());
}

#[test]
fn cancelled_after_encode_never_exposes_destination() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let (hook, thumbnailer) = cancel_after(Stage::Encoded);
    let temporary_directory = tempfile::tempdir().unwrap();
    let destination = temporary_directory.path().join("thumb.jpg");

    let error = thumbnailer
        .generate(&ThumbnailRequest::new(path, &destination))
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Cancelled);
    assert!(!hook.seen.lock().unwrap().contains(&Stage::Written));
    assert!(!destination.exists());
    let leftovers: Vec<_> = std::fs::read_dir(temporary_directory.path())
        .unwrap()
        .filter_map(Result::ok)
        .collect();
    assert!(leftovers.is_empty(), "Temporary files left: {leftovers:?}");
}

#[test]
fn tiny_timeout_is_timeout_error() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let thumbnailer =
        Thumbnailer::new(ThumbnailOptions::new().with_timeout(Some(Duration::from_nanos(1))));
    let temporary_directory = tempfile::tempdir().unwrap();
    let destination = temporary_directory.path().join("thumb.jpg");

    let error = thumbnailer
        .generate(&ThumbnailRequest::new(path, &destination))
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Timeout);
    assert!(!destination.exists());
}

#[test]
fn generous_timeout_succeeds() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let thumbnailer =
        Thumbnailer::new(ThumbnailOptions::new().with_timeout(Some(Duration::from_secs(120))));
    let temporary_directory = tempfile::tempdir().unwrap();
    let result = thumbnailer.generate(&ThumbnailRequest::new(
        path,
        temporary_directory.path().join("thumb.jpg"),
    ));

    assert!(result.is_ok(), "Unexpected failure: {result:?}");
}

#[test]
fn unrepresentable_timeout_means_no_deadline() {
    let temporary_directory = tempfile::tempdir().unwrap();
    let thumbnailer =
        Thumbnailer::new(ThumbnailOptions::new().with_timeout(Some(Duration::MAX)));

    let error = thumbnailer
        .generate(&ThumbnailRequest::new(
            "missing.mp4",
            temporary_directory.path().join("thumb.jpg"),
        ))
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Io);

    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }
    let thumbnail = thumbnailer
        .generate(&ThumbnailRequest::new(
            path,
            temporary_directory.path().join("sample.jpg"),
        ))
        .expect("Failed to generate thumbnail");
    assert!(thumbnail.destination.exists());
}
