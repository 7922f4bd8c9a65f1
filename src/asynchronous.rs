//! Async front-end for thumbnail generation (requires the `async` feature).
//!
//! [`AsyncThumbnailer`] moves every request onto tokio's blocking thread
//! pool with `spawn_blocking`, admitting at most `size` of them at a time
//! through a [`Semaphore`]. The async task awaiting the result is never
//! blocked by native decode calls.
//!
//! Dropping the returned future withdraws interest in that request only:
//! each request runs under a [child](CancellationToken::child_token) of the
//! caller's token, and the child is cancelled. A request still waiting for a
//! permit never starts and one already running stops at its next stage
//! boundary. Cancelling the caller's token stops every request sharing it.
//!
//! # Example
//!
//! ```no_run
//! use vidthumb::{AsyncThumbnailer, CancellationToken, ThumbnailRequest, Thumbnailer};
//!
//! # async fn example() -> Result<(), vidthumb::ThumbnailError> {
//! let thumbnailer = AsyncThumbnailer::new(Thumbnailer::default(), 4);
//! let request = ThumbnailRequest::new("input.mp4", "thumbs/input.jpg");
//! let thumbnail = thumbnailer.generate(request, CancellationToken::new()).await?;
//! println!("{}", thumbnail.destination.display());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::{
    error::ThumbnailError,
    progress::CancellationToken,
    thumbnail::{ThumbnailRequest, ThumbnailResult, Thumbnailer},
};

/// Cancels its token unless disarmed.
struct CancelOnDrop {
    token: CancellationToken,
    armed: bool,
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if self.armed {
            self.token.cancel();
        }
    }
}

/// Runs requests on tokio's blocking pool with bounded concurrency.
#[derive(Clone)]
pub struct AsyncThumbnailer {
    thumbnailer: Arc<Thumbnailer>,
    permits: Arc<Semaphore>,
    size: usize,
}

impl AsyncThumbnailer {
    /// Create a front-end admitting at most `size` concurrent requests
    /// (minimum 1).
    pub fn new(thumbnailer: Thumbnailer, size: usize) -> Self {
        let size = size.max(1);
        Self {
            thumbnailer: Arc::new(thumbnailer),
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// Maximum number of concurrent requests.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Requests that could start right now without waiting.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Generate one thumbnail.
    ///
    /// # Errors
    ///
    /// Same as [`Thumbnailer::generate`]. A worker that panics is reported
    /// as [`ThumbnailError::Decode`].
    pub async fn generate(
        &self,
        request: ThumbnailRequest,
        token: CancellationToken,
    ) -> ThumbnailResult {
        let token = token.child_token();
        let mut guard = CancelOnDrop {
            token: token.clone(),
            armed: true,
        };

        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| ThumbnailError::Cancelled)?;
        if token.is_cancelled() {
            guard.armed = false;
            return Err(ThumbnailError::Cancelled);
        }

        let thumbnailer = Arc::clone(&self.thumbnailer);
        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            thumbnailer.generate_with_cancellation(&request, &token)
        });

        let result = handle
            .await
            .map_err(|error| ThumbnailError::Decode(format!("thumbnail worker failed: {error}")))?;
        guard.armed = false;
        result
    }
}
