//! Bounded worker pool for thumbnail requests.
//!
//! [`ThumbnailPool`] owns a dedicated [`rayon`] thread pool, sized near the
//! host's core count by default. Requests only ever run on those threads,
//! so the caller's thread (typically the one serving an interactive UI)
//! never decodes, and the number of live decode sessions, and with it
//! the peak memory held in native frame buffers, never exceeds the pool
//! size.
//!
//! # Example
//!
//! ```no_run
//! use vidthumb::{PoolOptions, ThumbnailPool, ThumbnailRequest, Thumbnailer};
//!
//! let pool = ThumbnailPool::new(Thumbnailer::default(), PoolOptions::default())?;
//! let requests = vec![
//!     ThumbnailRequest::new("a.mp4", "thumbs/a.jpg"),
//!     ThumbnailRequest::new("b.mkv", "thumbs/b.jpg"),
//! ];
//! for (request, result) in requests.iter().zip(pool.generate_all(&requests)) {
//!     match result {
//!         Ok(thumbnail) => println!("{} -> {}", request.source.display(), thumbnail.destination.display()),
//!         Err(error) => eprintln!("{}: {error}", request.source.display()),
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use ::rayon::{
    ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder,
    iter::{IntoParallelIterator, ParallelIterator},
};

use crate::{
    progress::CancellationToken,
    thumbnail::{ThumbnailRequest, ThumbnailResult, Thumbnailer},
};

/// Worker pool configuration.
#[derive(Debug, Clone)]
#[must_use]
pub struct PoolOptions {
    /// Worker count. `None` uses one worker per logical CPU.
    pub size: Option<usize>,
    /// Prefix for worker thread names.
    pub thread_name: String,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            size: None,
            thread_name: "vidthumb-worker".to_string(),
        }
    }
}

impl PoolOptions {
    /// Set the worker count. Clamped to a minimum of 1.
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = Some(size.max(1));
        self
    }

    /// Set the worker thread name prefix.
    pub fn with_thread_name<S: Into<String>>(mut self, name: S) -> Self {
        self.thread_name = name.into();
        self
    }
}

/// Tracks how many requests are executing right now.
#[derive(Debug, Default)]
struct Admission {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl Admission {
    fn enter(self: &Arc<Self>) -> AdmissionPass {
        let now = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak.fetch_max(now, Ordering::AcqRel);
        AdmissionPass(Arc::clone(self))
    }
}

/// Held for the duration of one request.
struct AdmissionPass(Arc<Admission>);

impl Drop for AdmissionPass {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

/// A fixed-size pool that runs [`Thumbnailer`] requests off the caller's
/// thread.
pub struct ThumbnailPool {
    pool: ThreadPool,
    thumbnailer: Arc<Thumbnailer>,
    admission: Arc<Admission>,
}

impl ThumbnailPool {
    /// Build the pool and its worker threads.
    ///
    /// # Errors
    ///
    /// Returns the [`ThreadPoolBuildError`] if the threads cannot be spawned.
    pub fn new(
        thumbnailer: Thumbnailer,
        options: PoolOptions,
    ) -> Result<Self, ThreadPoolBuildError> {
        let prefix = options.thread_name;
        let mut builder =
            ThreadPoolBuilder::new().thread_name(move |index| format!("{prefix}-{index}"));
        if let Some(size) = options.size {
            builder = builder.num_threads(size.max(1));
        }
        let pool = builder.build()?;

        log::debug!(
            "Started thumbnail pool with {} workers",
            pool.current_num_threads()
        );

        Ok(Self {
            pool,
            thumbnailer: Arc::new(thumbnailer),
            admission: Arc::new(Admission::default()),
        })
    }

    /// Number of worker threads, which is also the maximum number of
    /// concurrently open decode sessions.
    pub fn size(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Requests executing at this moment.
    pub fn in_flight(&self) -> usize {
        self.admission.in_flight.load(Ordering::Acquire)
    }

    /// Highest number of simultaneously executing requests observed so far.
    pub fn peak_in_flight(&self) -> usize {
        self.admission.peak.load(Ordering::Acquire)
    }

    /// Run one request on a worker and wait for it.
    pub fn generate(&self, request: &ThumbnailRequest) -> ThumbnailResult {
        self.pool.install(|| {
            let _pass = self.admission.enter();
            self.thumbnailer.generate(request)
        })
    }

    /// Run many requests and wait for all of them.
    ///
    /// Results are returned in request order. One failure never affects the
    /// others.
    pub fn generate_all(&self, requests: &[ThumbnailRequest]) -> Vec<ThumbnailResult> {
        self.execute_all(requests.iter().collect::<Vec<_>>(), |request| {
            self.thumbnailer.generate(request)
        })
    }

    /// Like [`generate_all`](ThumbnailPool::generate_all), but every request
    /// observes `token`. Requests that have not started when it is cancelled
    /// fail with [`ThumbnailError::Cancelled`](crate::ThumbnailError::Cancelled)
    /// without opening their source.
    pub fn generate_all_with_cancellation(
        &self,
        requests: &[ThumbnailRequest],
        token: &CancellationToken,
    ) -> Vec<ThumbnailResult> {
        self.execute_all(requests.iter().collect::<Vec<_>>(), |request| {
            self.thumbnailer.generate_with_cancellation(request, token)
        })
    }

    /// Queue a request and return immediately.
    ///
    /// `on_complete` runs on the worker thread with the request's result.
    pub fn spawn<F>(
        &self,
        request: ThumbnailRequest,
        token: Option<CancellationToken>,
        on_complete: F,
    ) where
        F: FnOnce(ThumbnailResult) + Send + 'static,
    {
        let thumbnailer = Arc::clone(&self.thumbnailer);
        let admission = Arc::clone(&self.admission);
        self.pool.spawn(move || {
            let result = {
                let _pass = admission.enter();
                match token {
                    Some(token) => thumbnailer.generate_with_cancellation(&request, &token),
                    None => thumbnailer.generate(&request),
                }
            };
            on_complete(result);
        });
    }

    /// Run `work` over `items` on the pool, preserving order.
    pub(crate) fn execute_all<T, R, F>(&self, items: Vec<T>, work: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Sync + Send,
    {
        self.pool.install(|| {
            items
                .into_par_iter()
                .map(|item| {
                    let _pass = self.admission.enter();
                    work(item)
                })
                .collect()
        })
    }
}
