//! FFmpeg backend initialisation and log level configuration.
//!
//! The native libraries are initialised exactly once per process by
//! [`ensure_initialized`], no matter how many workers race to open their
//! first file. FFmpeg also has its own internal logging, separate from the
//! Rust [`log`](https://crates.io/crates/log) crate; by default it prints
//! warnings for every slightly damaged file it meets, which is noisy when
//! previewing whole directories. Initialisation therefore lowers the native
//! level to [`FfmpegLogLevel::Error`] unless the caller has already picked a
//! level through [`set_ffmpeg_log_level`].
//!
//! # Example
//!
//! ```no_run
//! use vidthumb::FfmpegLogLevel;
//!
//! // Silence FFmpeg completely.
//! vidthumb::set_ffmpeg_log_level(FfmpegLogLevel::Quiet);
//! ```

use std::sync::{
    OnceLock,
    atomic::{AtomicBool, Ordering},
};

use ffmpeg_next::util::log::Level;

static INITIALIZATION: OnceLock<Result<(), String>> = OnceLock::new();
static LEVEL_CHOSEN: AtomicBool = AtomicBool::new(false);

/// FFmpeg internal log verbosity level.
///
/// Maps directly to FFmpeg's `AV_LOG_*` constants. Setting a level causes
/// FFmpeg to suppress all messages below that severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FfmpegLogLevel {
    /// Print no output at all.
    Quiet,
    /// Only log conditions that abort the process.
    Panic,
    /// Only log unrecoverable errors.
    Fatal,
    /// Log recoverable errors.
    Error,
    /// Log warnings (FFmpeg's own default).
    Warning,
    /// Log informational messages.
    Info,
    /// Log verbose informational messages.
    Verbose,
    /// Log debugging messages.
    Debug,
    /// Extremely verbose tracing output.
    Trace,
}

impl FfmpegLogLevel {
    fn to_ffmpeg_level(self) -> Level {
        match self {
            FfmpegLogLevel::Quiet => Level::Quiet,
            FfmpegLogLevel::Panic => Level::Panic,
            FfmpegLogLevel::Fatal => Level::Fatal,
            FfmpegLogLevel::Error => Level::Error,
            FfmpegLogLevel::Warning => Level::Warning,
            FfmpegLogLevel::Info => Level::Info,
            FfmpegLogLevel::Verbose => Level::Verbose,
            FfmpegLogLevel::Debug => Level::Debug,
            FfmpegLogLevel::Trace => Level::Trace,
        }
    }

    fn from_ffmpeg_level(level: Level) -> Self {
        match level {
            Level::Quiet => FfmpegLogLevel::Quiet,
            Level::Panic => FfmpegLogLevel::Panic,
            Level::Fatal => FfmpegLogLevel::Fatal,
            Level::Error => FfmpegLogLevel::Error,
            Level::Warning => FfmpegLogLevel::Warning,
            Level::Info => FfmpegLogLevel::Info,
            Level::Verbose => FfmpegLogLevel::Verbose,
            Level::Debug => FfmpegLogLevel::Debug,
            Level::Trace => FfmpegLogLevel::Trace,
        }
    }
}

/// Set the FFmpeg internal log verbosity level.
///
/// This controls what FFmpeg prints to stderr. It does **not** affect
/// Rust-side `log` crate output. A level set here is never overridden by
/// [`ensure_initialized`].
pub fn set_ffmpeg_log_level(level: FfmpegLogLevel) {
    LEVEL_CHOSEN.store(true, Ordering::Release);
    ffmpeg_next::util::log::set_level(level.to_ffmpeg_level());
}

/// Get the current FFmpeg internal log verbosity level.
///
/// Returns `None` if the current level does not map to a known variant.
pub fn get_ffmpeg_log_level() -> Option<FfmpegLogLevel> {
    ffmpeg_next::util::log::get_level()
        .ok()
        .map(FfmpegLogLevel::from_ffmpeg_level)
}

/// Initialise the FFmpeg libraries once for the whole process.
///
/// Safe to call from any number of threads concurrently; the first caller
/// runs the native setup and everyone else observes its cached outcome.
/// Called implicitly by probing and session opening, so calling it
/// yourself is only useful to surface a broken installation early.
///
/// # Errors
///
/// Returns the FFmpeg error message if the native initialisation failed.
pub fn ensure_initialized() -> Result<(), String> {
    INITIALIZATION
        .get_or_init(|| {
            ffmpeg_next::init().map_err(|error| error.to_string())?;
            if !LEVEL_CHOSEN.load(Ordering::Acquire) {
                ffmpeg_next::util::log::set_level(Level::Error);
            }
            log::debug!("FFmpeg backend initialised");
            Ok(())
        })
        .clone()
}
