//! End-to-end thumbnail generation tests.
//!
//! Tests require fixture files from `tests/fixtures/generate_fixtures.sh`.

use std::{
    path::Path,
    sync::{Arc, Mutex},
};

use vidthumb::{
    MediaProbe, ProgressCallback, ProgressInfo, Stage, StreamKind, ThumbnailOptions,
    ThumbnailRequest, Thumbnailer,
};

fn sample_video_path() -> &'static str {
    "tests/fixtures/sample_video.mp4"
}

fn generate(path: &str, max_dimension: u32) -> (tempfile::TempDir, vidthumb::Thumbnail) {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let destination = temporary_directory.path().join("thumb.jpg");
    let request = ThumbnailRequest::new(path, &destination).with_max_dimension(max_dimension);
    let thumbnail = Thumbnailer::default()
        .generate(&request)
        .expect("Failed to generate thumbnail");
    (temporary_directory, thumbnail)
}

// ── Probing ────────────────────────────────────────────────────────

#[test]
fn probe_lists_streams() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let source = MediaProbe::probe(path).expect("Failed to probe");
    let video = source.video_stream().expect("No video stream");
    assert_eq!(video.kind, StreamKind::Video);
    assert_eq!((video.width, video.height), (1280, 720));
    assert_eq!(video.codec, "h264");
    assert!(source.streams.iter().any(|stream| stream.kind == StreamKind::Audio));

    let seconds = source.duration.as_secs_f64();
    assert!((seconds - 5.0).abs() < 0.2, "Unexpected duration {seconds}");
}

// ── Dimensions ─────────────────────────────────────────────────────

#[test]
fn landscape_fits_bounding_box() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let (_directory, thumbnail) = generate(path, 256);
    assert_eq!((thumbnail.width, thumbnail.height), (256, 144));

    let image = image::open(&thumbnail.destination).expect("Output is not a readable image");
    assert_eq!((image.width(), image.height()), (256, 144));
    assert_eq!(
        image::ImageFormat::from_path(&thumbnail.destination).unwrap(),
        image::ImageFormat::Jpeg
    );
}

#[test]
fn portrait_fits_bounding_box() {
    let path = "tests/fixtures/portrait.mp4";
    if !Path::new(path).exists() {
        return;
    }

    let (_directory, thumbnail) = generate(path, 256);
    assert_eq!((thumbnail.width, thumbnail.height), (144, 256));
}

#[test]
fn anamorphic_uses_display_aspect() {
    let path = "tests/fixtures/anamorphic.mkv";
    if !Path::new(path).exists() {
        return;
    }

    let (_directory, thumbnail) = generate(path, 256);
    assert_eq!((thumbnail.width, thumbnail.height), (256, 144));
}

#[test]
fn small_sources_are_not_upscaled() {
    let path = "tests/fixtures/small.mp4";
    if !Path::new(path).exists() {
        return;
    }

    let (_directory, thumbnail) = generate(path, 1024);
    assert_eq!((thumbnail.width, thumbnail.height), (160, 90));
}

#[test]
fn repeated_requests_are_consistent() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let (_first_directory, first) = generate(path, 200);
    let (_second_directory, second) = generate(path, 200);
    assert_eq!((first.width, first.height), (second.width, second.height));
    assert_eq!(first.timestamp, second.timestamp);
}

#[test]
fn selects_frame_near_start() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    // 10% of 5 s.
    let (_directory, thumbnail) = generate(path, 128);
    assert!(thumbnail.timestamp.as_secs_f64() >= 0.5);
    assert!(thumbnail.timestamp.as_secs_f64() < 1.0);
}

#[test]
fn picture_is_not_blank() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let (_directory, thumbnail) = generate(path, 256);
    let image = image::open(&thumbnail.destination).unwrap().to_rgb8();
    let first = *image.get_pixel(0, 0);
    assert!(
        image.pixels().any(|pixel| *pixel != first),
        "Thumbnail should not be a flat colour"
    );
}

// ── Progress ───────────────────────────────────────────────────────

#[derive(Default)]
struct RecordingProgress {
    stages: Mutex<Vec<Stage>>,
}

impl ProgressCallback for RecordingProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.stages.lock().unwrap().push(info.stage);
    }
}

#[test]
fn progress_reports_every_stage_in_order() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let recorder = Arc::new(RecordingProgress::default());
    let thumbnailer = Thumbnailer::new(ThumbnailOptions::new().with_progress(recorder.clone()));
    let temporary_directory = tempfile::tempdir().unwrap();
    thumbnailer
        .generate(&ThumbnailRequest::new(
            path,
            temporary_directory.path().join("thumb.jpg"),
        ))
        .expect("Failed to generate thumbnail");

    assert_eq!(
        *recorder.stages.lock().unwrap(),
        vec![
            Stage::Probed,
            Stage::FrameSelected,
            Stage::Converted,
            Stage::Encoded,
            Stage::Written,
        ]
    );
}
