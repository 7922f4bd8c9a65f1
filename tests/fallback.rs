//! Frame selection on damaged input.
//!
//! Tests require fixture files from `tests/fixtures/generate_fixtures.sh`.

use std::{path::Path, time::Duration};

use vidthumb::{
    DecodeSession, ErrorKind, MediaProbe, SelectionPolicy, ThumbnailOptions, ThumbnailRequest,
    Thumbnailer,
};

fn truncated_video_path() -> &'static str {
    "tests/fixtures/truncated.mp4"
}

#[test]
fn truncated_file_falls_back_to_first_frame() {
    let path = truncated_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let destination = temporary_directory.path().join("thumb.jpg");
    let thumbnail = Thumbnailer::default()
        .generate(&ThumbnailRequest::new(path, &destination))
        .expect("Fallback tier should recover the first frame");

    assert!(thumbnail.timestamp < Duration::from_secs(1));
    assert!(destination.exists());
    assert_eq!((thumbnail.width, thumbnail.height), (256, 144));
}

#[test]
fn truncated_file_without_fallback_is_frame_unavailable() {
    let path = truncated_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let thumbnailer = Thumbnailer::new(
        ThumbnailOptions::new()
            .with_selection_policy(SelectionPolicy::default().with_fallback_to_start(false)),
    );
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let destination = temporary_directory.path().join("thumb.jpg");

    let error = thumbnailer
        .generate(&ThumbnailRequest::new(path, &destination))
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::FrameUnavailable);
    assert!(!destination.exists());
}

#[test]
fn container_still_reports_full_duration() {
    let path = truncated_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let source = MediaProbe::probe(path).expect("Index is intact, probing should work");
    assert!(source.duration > Duration::from_secs(5));
}

#[test]
fn session_reaches_end_of_stream_cleanly() {
    let path = truncated_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let source = MediaProbe::probe(path).unwrap();
    let mut session = DecodeSession::open(&source).unwrap();

    let mut frames = 0;
    loop {
        match session.decode_next_frame() {
            Ok(Some(frame)) => {
                assert_eq!((frame.width(), frame.height()), (640, 360));
                frames += 1;
                assert!(frames < 250, "Decoder should stop at the cut");
            }
            Ok(None) => break,
            // Reads past the cut may be reported as errors, but only ever as
            // a bounded, request-scoped decode failure.
            Err(error) => {
                assert_eq!(error.kind(), ErrorKind::Decode);
                break;
            }
        }
    }
    assert!(frames > 0);
}
