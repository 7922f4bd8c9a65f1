//! # vidthumb
//!
//! Generate still preview images for video files, off the interactive path.
//!
//! `vidthumb` wraps FFmpeg (via the
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate) to probe a
//! container, seek to a representative frame, convert it to RGB with the
//! correct colour matrix, downscale it, encode it as JPEG, and atomically
//! move it into place. It is built for file browsers that need previews for
//! whole directories without ever blocking their UI thread.
//!
//! ## Quick Start
//!
//! ### One thumbnail
//!
//! ```no_run
//! use vidthumb::{ThumbnailRequest, Thumbnailer};
//!
//! let request = ThumbnailRequest::new("input.mp4", "thumbs/input.jpg").with_max_dimension(320);
//! let thumbnail = Thumbnailer::default().generate(&request).unwrap();
//! println!("{}x{} from {:?}", thumbnail.width, thumbnail.height, thumbnail.timestamp);
//! ```
//!
//! ### A directory's worth
//!
//! ```no_run
//! use vidthumb::{PoolOptions, ThumbnailPool, ThumbnailRequest, Thumbnailer};
//!
//! let pool = ThumbnailPool::new(Thumbnailer::default(), PoolOptions::default()).unwrap();
//! let requests: Vec<_> = ["a.mp4", "b.mkv", "c.webm"]
//!     .iter()
//!     .map(|name| ThumbnailRequest::new(name, format!("thumbs/{name}.jpg")))
//!     .collect();
//! for result in pool.generate_all(&requests) {
//!     if let Err(error) = result {
//!         // Show a generic fallback preview; every failure is request-scoped.
//!         eprintln!("{error}");
//!     }
//! }
//! ```
//!
//! ### Timeouts and cancellation
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use vidthumb::{CancellationToken, ThumbnailOptions, ThumbnailRequest, Thumbnailer};
//!
//! let thumbnailer =
//!     Thumbnailer::new(ThumbnailOptions::new().with_timeout(Some(Duration::from_secs(5))));
//! let token = CancellationToken::new();
//! let request = ThumbnailRequest::new("input.mp4", "input.jpg");
//! let _result = thumbnailer.generate_with_cancellation(&request, &token);
//! ```
//!
//! ## Guarantees
//!
//! - Every request owns exactly one decode session, released on every exit
//!   path. [`live_sessions`] returns to its baseline after any mix of
//!   successes and failures.
//! - Nothing is ever visible at a destination path until the complete JPEG
//!   has been renamed into place.
//! - Frame selection, packet skipping, and decode retries are all bounded,
//!   so corrupt or adversarial files terminate.
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `rayon` | [`ThumbnailPool`], a bounded worker pool (enabled by default) |
//! | `async` | [`AsyncThumbnailer`], a Tokio front-end using `spawn_blocking` |
//! | `full` | Enables all of the above |
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system.

#[cfg(feature = "async")]
pub mod asynchronous;
pub mod configuration;
pub mod conversion;
pub mod encode;
pub mod error;
pub mod ffmpeg;
#[cfg(feature = "rayon")]
pub mod pool;
pub mod probe;
pub mod progress;
pub mod selector;
pub mod session;
pub mod thumbnail;
mod utilities;
pub mod writer;

#[cfg(feature = "async")]
pub use asynchronous::AsyncThumbnailer;
pub use configuration::{ScalingFilter, SelectionPolicy, ThumbnailOptions};
pub use conversion::fit_dimensions;
pub use encode::encode_jpeg;
pub use error::{ErrorKind, ThumbnailError};
pub use ffmpeg::{FfmpegLogLevel, get_ffmpeg_log_level, set_ffmpeg_log_level};
#[cfg(feature = "rayon")]
pub use pool::{PoolOptions, ThumbnailPool};
pub use probe::{MediaProbe, MediaSource, StreamDescriptor, StreamKind};
pub use progress::{CancellationToken, ProgressCallback, ProgressInfo, Stage};
pub use selector::target_timestamp;
pub use session::{DecodeSession, Frame, live_sessions};
pub use thumbnail::{Thumbnail, ThumbnailRequest, ThumbnailResult, Thumbnailer};
pub use writer::{write_atomic, write_atomic_with_cancellation};
