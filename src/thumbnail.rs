//! The pipeline coordinator.
//!
//! [`Thumbnailer::generate`] runs one [`ThumbnailRequest`] through probing,
//! frame selection, conversion, encoding, and the atomic write. It is a
//! self-contained blocking unit of work: dispatch it onto a worker pool
//! (see [`ThumbnailPool`](crate::ThumbnailPool)) rather than calling it on an
//! interactive thread.
//!
//! The decode session is scoped to a block, so it is torn down on every
//! path out of the pipeline: success, any stage error, a timeout, or
//! cancellation.

use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use crate::{
    configuration::ThumbnailOptions,
    conversion::FrameConverter,
    encode::encode_jpeg,
    error::ThumbnailError,
    probe::MediaProbe,
    progress::{CancellationToken, Checkpoint, ProgressInfo, Stage},
    selector::FrameSelector,
    session::DecodeSession,
    writer::write_with_checkpoint,
};

/// Outcome of one thumbnail request.
pub type ThumbnailResult = Result<Thumbnail, ThumbnailError>;

/// One unit of work: which video to preview and where to put the image.
///
/// # Example
///
/// ```
/// use vidthumb::ThumbnailRequest;
///
/// let request = ThumbnailRequest::new("clips/holiday.mp4", "thumbs/holiday.jpg")
///     .with_max_dimension(320)
///     .with_quality(90);
/// assert_eq!(request.max_dimension, 320);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct ThumbnailRequest {
    /// Video to preview.
    pub source: PathBuf,
    /// Where the JPEG is written. Parent directories are created.
    pub destination: PathBuf,
    /// Bounding box for the longer side, in pixels (default 256).
    pub max_dimension: u32,
    /// JPEG quality, `0..=100` (default 80).
    pub quality: u8,
}

impl ThumbnailRequest {
    /// Create a request with the default size and quality.
    pub fn new<S: AsRef<Path>, D: AsRef<Path>>(source: S, destination: D) -> Self {
        Self {
            source: source.as_ref().to_path_buf(),
            destination: destination.as_ref().to_path_buf(),
            max_dimension: 256,
            quality: 80,
        }
    }

    /// Set the bounding box. Clamped to a minimum of 1.
    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension.max(1);
        self
    }

    /// Set the JPEG quality. Clamped to `0..=100`.
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality.min(100);
        self
    }
}

/// A thumbnail that has been written to its destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    /// Path the image now lives at.
    pub destination: PathBuf,
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Presentation timestamp of the frame that was used.
    pub timestamp: Duration,
    /// Size of the encoded file.
    pub bytes: usize,
}

/// Runs thumbnail requests with a fixed set of [`ThumbnailOptions`].
///
/// Cheap to clone and safe to share between worker threads; every request
/// opens its own decode session.
///
/// # Example
///
/// ```no_run
/// use vidthumb::{ThumbnailRequest, Thumbnailer};
///
/// let thumbnailer = Thumbnailer::default();
/// let thumbnail = thumbnailer.generate(&ThumbnailRequest::new("input.mp4", "input.jpg"))?;
/// println!("{}x{}", thumbnail.width, thumbnail.height);
/// # Ok::<(), vidthumb::ThumbnailError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct Thumbnailer {
    options: ThumbnailOptions,
}

impl Thumbnailer {
    /// Create a thumbnailer.
    pub fn new(options: ThumbnailOptions) -> Self {
        Self { options }
    }

    /// The options every request runs with.
    pub fn options(&self) -> &ThumbnailOptions {
        &self.options
    }

    /// Generate one thumbnail, honouring the cancellation token from the
    /// options, if any.
    ///
    /// # Errors
    ///
    /// Every stage failure surfaces as exactly one [`ThumbnailError`]
    /// variant. Nothing is written to `request.destination` on failure.
    pub fn generate(&self, request: &ThumbnailRequest) -> ThumbnailResult {
        self.run(request, self.options.cancellation.clone())
    }

    /// Generate one thumbnail with a per-request cancellation token.
    ///
    /// A token cancelled before the call returns
    /// [`ThumbnailError::Cancelled`] without touching the source.
    ///
    /// # Errors
    ///
    /// See [`generate`](Thumbnailer::generate).
    pub fn generate_with_cancellation(
        &self,
        request: &ThumbnailRequest,
        token: &CancellationToken,
    ) -> ThumbnailResult {
        self.run(request, Some(token.clone()))
    }

    fn run(
        &self,
        request: &ThumbnailRequest,
        cancellation: Option<CancellationToken>,
    ) -> ThumbnailResult {
        let started = Instant::now();
        let checkpoint = Checkpoint::new(cancellation, self.options.timeout);

        let result = self.execute(request, &checkpoint, started);
        match &result {
            Ok(thumbnail) => log::info!(
                "Generated {}x{} thumbnail for {} in {:.1?}",
                thumbnail.width,
                thumbnail.height,
                request.source.display(),
                started.elapsed(),
            ),
            Err(error) if error.is_interruption() => log::debug!(
                "Thumbnail for {} interrupted: {error}",
                request.source.display()
            ),
            Err(error) => log::warn!(
                "Thumbnail for {} failed: {error}",
                request.source.display()
            ),
        }
        result
    }

    fn execute(
        &self,
        request: &ThumbnailRequest,
        checkpoint: &Checkpoint,
        started: Instant,
    ) -> ThumbnailResult {
        checkpoint.check()?;

        let source = MediaProbe::probe(&request.source)?;
        self.report(Stage::Probed, request, started);
        checkpoint.check()?;

        let (image, timestamp) = {
            let mut session = DecodeSession::open_with(
                &source,
                checkpoint.clone(),
                self.options.max_packet_errors,
            )?;

            let selector = FrameSelector::new(&self.options.selection, checkpoint);
            selector.select(&mut session, source.duration, &source.path)?;
            let frame = session
                .current_frame()
                .ok_or_else(|| ThumbnailError::FrameUnavailable {
                    path: source.path.clone(),
                })?;
            let timestamp = frame.timestamp();
            self.report(Stage::FrameSelected, request, started);

            let image = FrameConverter::new(self.options.scaling_filter)
                .convert(&frame, request.max_dimension)?;
            session.close();
            (image, timestamp)
        };
        self.report(Stage::Converted, request, started);
        checkpoint.check()?;

        let bytes = encode_jpeg(&image, request.quality)?;
        self.report(Stage::Encoded, request, started);
        checkpoint.check()?;

        write_with_checkpoint(&request.destination, &bytes, checkpoint)?;
        self.report(Stage::Written, request, started);

        Ok(Thumbnail {
            destination: request.destination.clone(),
            width: image.width(),
            height: image.height(),
            timestamp,
            bytes: bytes.len(),
        })
    }

    fn report(&self, stage: Stage, request: &ThumbnailRequest, started: Instant) {
        self.options.progress.on_progress(&ProgressInfo {
            stage,
            source: request.source.clone(),
            elapsed: started.elapsed(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_defaults() {
        let request = ThumbnailRequest::new("a.mp4", "a.jpg");
        assert_eq!(request.max_dimension, 256);
        assert_eq!(request.quality, 80);
    }

    #[test]
    fn request_builders_clamp() {
        let request = ThumbnailRequest::new("a.mp4", "a.jpg")
            .with_max_dimension(0)
            .with_quality(250);
        assert_eq!(request.max_dimension, 1);
        assert_eq!(request.quality, 100);
    }

    #[test]
    fn cancelled_request_never_starts() {
        let directory = tempfile::tempdir().unwrap();
        let destination = directory.path().join("out.jpg");
        let token = CancellationToken::new();
        token.cancel();

        let result = Thumbnailer::default().generate_with_cancellation(
            &ThumbnailRequest::new("does-not-exist.mp4", &destination),
            &token,
        );

        // Cancellation wins over the missing source: nothing was touched.
        assert!(matches!(result, Err(ThumbnailError::Cancelled)));
        assert!(!destination.exists());
    }
}
