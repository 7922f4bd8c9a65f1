//! Error types for the `vidthumb` crate.
//!
//! This module defines [`ThumbnailError`], the unified error type returned by
//! every fallible stage of the pipeline. Each variant is request-scoped: a
//! failure for one file never poisons the process or other requests in
//! flight. Errors carry the offending path or the upstream FFmpeg message so
//! they can be diagnosed without extra logging at the call site.

use std::{io::Error as IoError, path::PathBuf, time::Duration};

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use thiserror::Error;

/// The unified error type for all `vidthumb` operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ThumbnailError {
    /// The source could not be read, or the destination directory could not
    /// be written.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path the failing operation touched.
        path: PathBuf,
        /// Underlying operating-system error.
        #[source]
        source: IoError,
    },

    /// The container was not recognised, or it holds no decodable video
    /// stream.
    #[error("Failed to probe {path}: {reason}")]
    Probe {
        /// Source path that was probed.
        path: PathBuf,
        /// Why probing failed.
        reason: String,
    },

    /// The native demux/decode context could not be opened.
    #[error("Failed to open decode session for {path}: {reason}")]
    Open {
        /// Source path of the session.
        path: PathBuf,
        /// Why the open failed.
        reason: String,
    },

    /// Decoding failed after the bounded number of retries.
    #[error("Failed to decode video frame: {0}")]
    Decode(String),

    /// The requested timestamp could not be reached.
    #[error("Failed to seek to {timestamp:?}: {reason}")]
    Seek {
        /// The requested presentation timestamp.
        timestamp: Duration,
        /// Upstream reason.
        reason: String,
    },

    /// Every frame selection tier was exhausted without producing a frame.
    #[error("No representative frame could be decoded from {path}")]
    FrameUnavailable {
        /// Source path.
        path: PathBuf,
    },

    /// The decoded pixel format has no defined RGB conversion.
    #[error("Unsupported pixel format: {0}")]
    UnsupportedFormat(String),

    /// The image encoder rejected its input.
    #[error("Failed to encode thumbnail: {0}")]
    Encode(String),

    /// The per-request deadline elapsed.
    #[error("Thumbnail generation timed out after {0:?}")]
    Timeout(Duration),

    /// The caller withdrew interest via a
    /// [`CancellationToken`](crate::CancellationToken).
    #[error("Operation cancelled")]
    Cancelled,
}

/// Fieldless discriminant of a [`ThumbnailError`].
///
/// Handy for matching on the failure category without destructuring, e.g.
/// to pick a fallback icon or to assert on the variant in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// See [`ThumbnailError::Io`].
    Io,
    /// See [`ThumbnailError::Probe`].
    Probe,
    /// See [`ThumbnailError::Open`].
    Open,
    /// See [`ThumbnailError::Decode`].
    Decode,
    /// See [`ThumbnailError::Seek`].
    Seek,
    /// See [`ThumbnailError::FrameUnavailable`].
    FrameUnavailable,
    /// See [`ThumbnailError::UnsupportedFormat`].
    UnsupportedFormat,
    /// See [`ThumbnailError::Encode`].
    Encode,
    /// See [`ThumbnailError::Timeout`].
    Timeout,
    /// See [`ThumbnailError::Cancelled`].
    Cancelled,
}

impl ThumbnailError {
    /// The category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ThumbnailError::Io { .. } => ErrorKind::Io,
            ThumbnailError::Probe { .. } => ErrorKind::Probe,
            ThumbnailError::Open { .. } => ErrorKind::Open,
            ThumbnailError::Decode(_) => ErrorKind::Decode,
            ThumbnailError::Seek { .. } => ErrorKind::Seek,
            ThumbnailError::FrameUnavailable { .. } => ErrorKind::FrameUnavailable,
            ThumbnailError::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            ThumbnailError::Encode(_) => ErrorKind::Encode,
            ThumbnailError::Timeout(_) => ErrorKind::Timeout,
            ThumbnailError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Returns `true` for [`Cancelled`](ThumbnailError::Cancelled) and
    /// [`Timeout`](ThumbnailError::Timeout).
    ///
    /// Interruptions abort the whole request; retry tiers never swallow them.
    pub fn is_interruption(&self) -> bool {
        matches!(self, ThumbnailError::Cancelled | ThumbnailError::Timeout(_))
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: IoError) -> Self {
        ThumbnailError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<FfmpegError> for ThumbnailError {
    fn from(error: FfmpegError) -> Self {
        ThumbnailError::Decode(error.to_string())
    }
}

impl From<ImageError> for ThumbnailError {
    fn from(error: ImageError) -> Self {
        ThumbnailError::Encode(error.to_string())
    }
}
