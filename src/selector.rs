//! Representative frame selection.
//!
//! The selector picks a target presentation timestamp near the start of the
//! video and drives a frame source until it produces the first frame at or
//! after that target. Truncated and corrupt files are handled with a second
//! tier that retries from the very first frame; when both tiers fail the
//! request fails with [`ThumbnailError::FrameUnavailable`] instead of
//! returning an empty or black picture.
//!
//! Every loop here is bounded by the [`SelectionPolicy`] budgets, so an
//! adversarial file cannot stall a worker.

use std::{path::Path, time::Duration};

use crate::{
    configuration::SelectionPolicy, error::ThumbnailError, progress::Checkpoint,
    session::DecodeSession,
};

/// Compute the primary target timestamp for a video of `duration`.
///
/// `min(duration × seek_fraction, duration − end_margin)`, saturating at
/// zero. A zero duration (unknown length) targets the first frame.
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use vidthumb::{SelectionPolicy, target_timestamp};
///
/// let policy = SelectionPolicy::default();
/// assert_eq!(target_timestamp(Duration::from_secs(60), &policy), Duration::from_secs(6));
/// assert_eq!(target_timestamp(Duration::from_millis(300), &policy), Duration::ZERO);
/// ```
pub fn target_timestamp(duration: Duration, policy: &SelectionPolicy) -> Duration {
    if duration.is_zero() {
        return Duration::ZERO;
    }
    let fraction = if policy.seek_fraction.is_finite() {
        policy.seek_fraction.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let proportional = duration.mul_f64(fraction);
    let latest = duration.saturating_sub(policy.end_margin);
    proportional.min(latest)
}

/// Something that can seek and decode frames, one at a time.
///
/// Implemented by [`DecodeSession`]; tests substitute scripted sources.
pub(crate) trait FrameSource {
    fn seek_to(&mut self, timestamp: Duration) -> Result<(), ThumbnailError>;

    /// Decode the next frame and return its timestamp, or `None` at end of
    /// stream.
    fn next_frame_timestamp(&mut self) -> Result<Option<Duration>, ThumbnailError>;
}

impl FrameSource for DecodeSession {
    fn seek_to(&mut self, timestamp: Duration) -> Result<(), ThumbnailError> {
        DecodeSession::seek_to(self, timestamp)
    }

    fn next_frame_timestamp(&mut self) -> Result<Option<Duration>, ThumbnailError> {
        self.advance()
    }
}

/// Why a single tier did not yield a frame.
#[derive(Debug)]
enum TierFailure {
    Exhausted,
    Failed(ThumbnailError),
}

/// Drives a [`FrameSource`] according to a [`SelectionPolicy`].
pub(crate) struct FrameSelector<'a> {
    policy: &'a SelectionPolicy,
    checkpoint: &'a Checkpoint,
}

impl<'a> FrameSelector<'a> {
    pub(crate) fn new(policy: &'a SelectionPolicy, checkpoint: &'a Checkpoint) -> Self {
        Self { policy, checkpoint }
    }

    /// Leave `source` positioned on a representative frame and return its
    /// timestamp.
    ///
    /// Cancellation and timeouts abort immediately; every other failure
    /// moves on to the next tier.
    pub(crate) fn select<S: FrameSource>(
        &self,
        source: &mut S,
        duration: Duration,
        path: &Path,
    ) -> Result<Duration, ThumbnailError> {
        let primary = target_timestamp(duration, self.policy);
        let mut tiers = vec![primary];
        if self.policy.fallback_to_start && !primary.is_zero() {
            tiers.push(Duration::ZERO);
        }

        for (tier, &target) in tiers.iter().enumerate() {
            self.checkpoint.check()?;
            match self.attempt(source, target) {
                Ok(timestamp) => {
                    log::debug!(
                        "Selected frame at {:?} in {} (target={:?}, tier={})",
                        timestamp,
                        path.display(),
                        target,
                        tier,
                    );
                    return Ok(timestamp);
                }
                Err(TierFailure::Failed(error)) if error.is_interruption() => return Err(error),
                Err(TierFailure::Failed(error)) => {
                    log::warn!(
                        "Frame selection at {:?} failed for {}: {error}",
                        target,
                        path.display(),
                    );
                }
                Err(TierFailure::Exhausted) => {
                    log::warn!(
                        "No frame at or after {:?} in {}",
                        target,
                        path.display(),
                    );
                }
            }
        }

        Err(ThumbnailError::FrameUnavailable {
            path: path.to_path_buf(),
        })
    }

    fn attempt<S: FrameSource>(
        &self,
        source: &mut S,
        target: Duration,
    ) -> Result<Duration, TierFailure> {
        source.seek_to(target).map_err(TierFailure::Failed)?;

        let mut frames = 0u32;
        let mut errors = 0u32;
        while frames < self.policy.max_frames_per_attempt {
            self.checkpoint.check().map_err(TierFailure::Failed)?;
            match source.next_frame_timestamp() {
                Ok(Some(timestamp)) => {
                    frames += 1;
                    if timestamp >= target {
                        return Ok(timestamp);
                    }
                }
                Ok(None) => return Err(TierFailure::Exhausted),
                Err(error) if error.is_interruption() => return Err(TierFailure::Failed(error)),
                Err(error) => {
                    errors += 1;
                    if errors >= self.policy.max_decode_errors {
                        return Err(TierFailure::Failed(error));
                    }
                }
            }
        }
        Err(TierFailure::Exhausted)
    }
}
