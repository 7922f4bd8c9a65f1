//! Progress reporting, cancellation, and request deadlines.
//!
//! This module provides [`ProgressCallback`] for observing a request as it
//! moves through the pipeline, [`CancellationToken`] for cooperative
//! cancellation, and the crate-internal `Checkpoint` that combines a token
//! with a wall-clock deadline.
//!
//! Cancellation is best-effort: it is observed before a request starts,
//! between pipeline stages, after every decode attempt, and by FFmpeg's
//! interrupt callback during blocking demuxer I/O. It never tears a single
//! native call in half.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use vidthumb::{
//!     CancellationToken, ProgressCallback, ProgressInfo, ThumbnailOptions, ThumbnailRequest,
//!     Thumbnailer,
//! };
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("{}: {:?} after {:?}", info.source.display(), info.stage, info.elapsed);
//!     }
//! }
//!
//! let token = CancellationToken::new();
//! let thumbnailer = Thumbnailer::new(
//!     ThumbnailOptions::new()
//!         .with_progress(Arc::new(PrintProgress))
//!         .with_cancellation(token.clone()),
//! );
//! let request = ThumbnailRequest::new("input.mp4", "thumbs/input.jpg");
//! let _result = thumbnailer.generate(&request);
//! ```

use std::path::PathBuf;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::{Duration, Instant};

use crate::error::ThumbnailError;

/// A pipeline stage that has just completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Stage {
    /// The container was identified and a video stream chosen.
    Probed,
    /// A representative frame was decoded.
    FrameSelected,
    /// The frame was converted to RGB and scaled.
    Converted,
    /// The converted frame was encoded.
    Encoded,
    /// The encoded bytes were atomically moved into place.
    Written,
}

/// A snapshot delivered after each completed [`Stage`].
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// The stage that just finished.
    pub stage: Stage,
    /// Source file of the request.
    pub source: PathBuf,
    /// Wall-clock time since the request started.
    pub elapsed: Duration,
}

/// Trait for receiving per-stage progress updates.
///
/// Implementations must be [`Send`] and [`Sync`] because callbacks are
/// invoked from worker threads.
///
/// Progress callbacks are **infallible**: they observe but cannot halt
/// the operation. Use [`CancellationToken`] for cooperative cancellation.
pub trait ProgressCallback: Send + Sync {
    /// Called once per completed stage.
    fn on_progress(&self, info: &ProgressInfo);
}

/// Discards all progress notifications. Default when nothing is configured.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Cooperative cancellation token backed by an [`AtomicBool`].
///
/// Clone this token and share it between threads; call
/// [`cancel`](CancellationToken::cancel) from any thread to withdraw
/// interest in the associated request(s).
///
/// # Example
///
/// ```
/// use vidthumb::CancellationToken;
///
/// let token = CancellationToken::new();
/// assert!(!token.is_cancelled());
///
/// token.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    parent: Option<Arc<CancellationToken>>,
}

impl CancellationToken {
    /// Create a new, non-cancelled token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            parent: None,
        }
    }

    /// Create a token that is cancelled when `self` is, but whose own
    /// [`cancel`](CancellationToken::cancel) leaves `self` untouched.
    ///
    /// ```
    /// use vidthumb::CancellationToken;
    ///
    /// let batch = CancellationToken::new();
    /// let request = batch.child_token();
    ///
    /// request.cancel();
    /// assert!(!batch.is_cancelled());
    ///
    /// let other = batch.child_token();
    /// batch.cancel();
    /// assert!(other.is_cancelled());
    /// ```
    pub fn child_token(&self) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            parent: Some(Arc::new(self.clone())),
        }
    }

    /// Request cancellation.
    ///
    /// All clones of this token will observe the cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check whether cancellation has been requested on this token or
    /// any token it was derived from.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
            || self
                .parent
                .as_ref()
                .is_some_and(|parent| parent.is_cancelled())
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Cancellation token plus optional deadline for one request.
///
/// Cheap to clone; a clone is moved into FFmpeg's interrupt callback.
#[derive(Debug, Clone)]
pub(crate) struct Checkpoint {
    cancellation: Option<CancellationToken>,
    deadline: Option<Instant>,
    timeout: Duration,
}

impl Checkpoint {
    /// Start the clock for a request.
    ///
    /// A timeout too large to express as an [`Instant`] means no deadline.
    pub(crate) fn new(cancellation: Option<CancellationToken>, timeout: Option<Duration>) -> Self {
        Self {
            cancellation,
            deadline: timeout.and_then(|timeout| Instant::now().checked_add(timeout)),
            timeout: timeout.unwrap_or_default(),
        }
    }

    /// A checkpoint that never fires.
    #[cfg(test)]
    pub(crate) fn unbounded() -> Self {
        Self::new(None, None)
    }

    /// Fail with [`ThumbnailError::Cancelled`] or [`ThumbnailError::Timeout`]
    /// if the request should stop.
    pub(crate) fn check(&self) -> Result<(), ThumbnailError> {
        if self
            .cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
        {
            return Err(ThumbnailError::Cancelled);
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(ThumbnailError::Timeout(self.timeout));
        }
        Ok(())
    }

    /// `true` when blocking native I/O should be aborted.
    pub(crate) fn should_interrupt(&self) -> bool {
        self.check().is_err()
    }
}
