//! Thumbnail generation configuration.
//!
//! [`ThumbnailOptions`] is a builder that threads the frame selection
//! policy, decode retry budgets, the per-request timeout, the scaling
//! filter, and the progress/cancellation hooks through the pipeline
//! without polluting every function signature.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use vidthumb::{ScalingFilter, SelectionPolicy, ThumbnailOptions};
//!
//! let options = ThumbnailOptions::new()
//!     .with_timeout(Some(Duration::from_secs(10)))
//!     .with_scaling_filter(ScalingFilter::Bilinear)
//!     .with_selection_policy(SelectionPolicy::default().with_seek_fraction(0.25));
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;
use std::time::Duration;

use ffmpeg_next::software::scaling::Flags as ScalingFlags;

use crate::progress::{CancellationToken, NoOpProgress, ProgressCallback};

/// Resampling filter used when downscaling a decoded frame.
///
/// Only area- and interpolation-class filters are offered; nearest-neighbour
/// aliases badly on downscaled previews.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScalingFilter {
    /// Bilinear interpolation.
    Bilinear,
    /// Area averaging. This is the default and the best choice for large
    /// reduction ratios.
    #[default]
    Area,
    /// Bicubic interpolation.
    Bicubic,
}

impl ScalingFilter {
    pub(crate) fn to_ffmpeg_flags(self) -> ScalingFlags {
        let filter = match self {
            ScalingFilter::Bilinear => ScalingFlags::BILINEAR,
            ScalingFilter::Area => ScalingFlags::AREA,
            ScalingFilter::Bicubic => ScalingFlags::BICUBIC,
        };
        filter | ScalingFlags::ACCURATE_RND
    }
}

/// Policy for choosing which frame becomes the preview.
///
/// The primary target is `min(duration × seek_fraction, duration −
/// end_margin)`. When that tier fails (seek error, too many decode errors,
/// end of stream, or the frame budget is spent) and `fallback_to_start` is
/// set, a second tier targets the first frame.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct SelectionPolicy {
    /// Fraction of the duration to seek to. Clamped to `0.0..=1.0`.
    pub seek_fraction: f64,
    /// Distance kept from the end of the stream so short clips do not
    /// target a timestamp past their last frame.
    pub end_margin: Duration,
    /// Frames that may be decoded per tier while advancing from the
    /// keyframe the seek landed on to the target.
    pub max_frames_per_attempt: u32,
    /// Decode errors tolerated per tier before it is abandoned.
    pub max_decode_errors: u32,
    /// Retry from timestamp zero when the primary tier fails.
    pub fallback_to_start: bool,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            seek_fraction: 0.1,
            end_margin: Duration::from_millis(500),
            max_frames_per_attempt: 512,
            max_decode_errors: 8,
            fallback_to_start: true,
        }
    }
}

impl SelectionPolicy {
    /// Set the seek fraction (clamped to `0.0..=1.0`; NaN becomes `0.0`).
    pub fn with_seek_fraction(mut self, fraction: f64) -> Self {
        self.seek_fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        self
    }

    /// Set the end-of-stream margin.
    pub fn with_end_margin(mut self, margin: Duration) -> Self {
        self.end_margin = margin;
        self
    }

    /// Set the per-tier frame budget. Clamped to a minimum of 1.
    pub fn with_max_frames_per_attempt(mut self, frames: u32) -> Self {
        self.max_frames_per_attempt = frames.max(1);
        self
    }

    /// Set the per-tier decode error budget. Clamped to a minimum of 1.
    pub fn with_max_decode_errors(mut self, errors: u32) -> Self {
        self.max_decode_errors = errors.max(1);
        self
    }

    /// Enable or disable the first-frame fallback tier.
    pub fn with_fallback_to_start(mut self, enabled: bool) -> Self {
        self.fallback_to_start = enabled;
        self
    }
}

/// Configuration for a [`Thumbnailer`](crate::Thumbnailer).
///
/// All fields have defaults; a default-constructed value is what most
/// callers want.
#[derive(Clone)]
#[must_use]
pub struct ThumbnailOptions {
    pub(crate) selection: SelectionPolicy,
    /// Malformed packets a decode session skips before giving up.
    pub(crate) max_packet_errors: u32,
    /// Per-request wall-clock limit. `None` disables it.
    pub(crate) timeout: Option<Duration>,
    pub(crate) scaling_filter: ScalingFilter,
    pub(crate) progress: Arc<dyn ProgressCallback>,
    /// Token applied by [`Thumbnailer::generate`](crate::Thumbnailer::generate).
    pub(crate) cancellation: Option<CancellationToken>,
}

impl Debug for ThumbnailOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ThumbnailOptions")
            .field("selection", &self.selection)
            .field("max_packet_errors", &self.max_packet_errors)
            .field("timeout", &self.timeout)
            .field("scaling_filter", &self.scaling_filter)
            .field("has_cancellation", &self.cancellation.is_some())
            .finish()
    }
}

impl Default for ThumbnailOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ThumbnailOptions {
    /// Create options with default settings.
    ///
    /// Defaults: [`SelectionPolicy::default`], 32 skippable malformed
    /// packets, a 30 second timeout, [`ScalingFilter::Area`], no progress
    /// callback, no cancellation.
    pub fn new() -> Self {
        Self {
            selection: SelectionPolicy::default(),
            max_packet_errors: 32,
            timeout: Some(Duration::from_secs(30)),
            scaling_filter: ScalingFilter::default(),
            progress: Arc::new(NoOpProgress),
            cancellation: None,
        }
    }

    /// Replace the frame selection policy.
    pub fn with_selection_policy(mut self, policy: SelectionPolicy) -> Self {
        self.selection = policy;
        self
    }

    /// Set how many malformed packets a session may skip. Clamped to a
    /// minimum of 1.
    pub fn with_max_packet_errors(mut self, errors: u32) -> Self {
        self.max_packet_errors = errors.max(1);
        self
    }

    /// Set the per-request timeout. `None` disables it.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the downscaling filter.
    pub fn with_scaling_filter(mut self, filter: ScalingFilter) -> Self {
        self.scaling_filter = filter;
        self
    }

    /// Attach a progress callback.
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Attach a cancellation token used by
    /// [`Thumbnailer::generate`](crate::Thumbnailer::generate).
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// The frame selection policy.
    pub fn selection_policy(&self) -> &SelectionPolicy {
        &self.selection
    }

    /// The per-request timeout.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// The downscaling filter.
    pub fn scaling_filter(&self) -> ScalingFilter {
        self.scaling_filter
    }

    /// Malformed packets a session may skip.
    pub fn max_packet_errors(&self) -> u32 {
        self.max_packet_errors
    }
}
