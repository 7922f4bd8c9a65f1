//! Decode sessions.
//!
//! A [`DecodeSession`] exclusively owns the FFmpeg demuxer and decoder for
//! one request. It is never shared between requests or threads. The native
//! state is released by [`close`](DecodeSession::close), which is idempotent,
//! and by `Drop`, so every exit path of the caller (success, error, or an
//! early `?` return after cancellation) tears the session down exactly once.
//!
//! Decoded pictures live in a scratch buffer owned by the session and are
//! handed out as borrowed [`Frame`]s, so a frame can never be read after its
//! session has closed.

use std::{
    path::PathBuf,
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use ffmpeg_next::{
    Error as FfmpegError, Packet, Rational, codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder, format::context::Input, frame::Video as VideoFrame,
};

use crate::{error::ThumbnailError, probe::MediaSource, progress::Checkpoint};

static LIVE_SESSIONS: AtomicUsize = AtomicUsize::new(0);

/// Number of decode sessions currently holding native resources in this
/// process.
///
/// Diagnostic only. After every request has returned this is back to the
/// value it had before they started.
pub fn live_sessions() -> usize {
    LIVE_SESSIONS.load(Ordering::Acquire)
}

/// A decoded picture borrowed from its [`DecodeSession`].
pub struct Frame<'a> {
    raw: &'a VideoFrame,
    timestamp: Duration,
}

impl<'a> Frame<'a> {
    pub(crate) fn new(raw: &'a VideoFrame, timestamp: Duration) -> Self {
        Self { raw, timestamp }
    }

    /// Presentation timestamp relative to the start of the stream.
    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }

    /// Coded width in pixels.
    pub fn width(&self) -> u32 {
        self.raw.width()
    }

    /// Coded height in pixels.
    pub fn height(&self) -> u32 {
        self.raw.height()
    }

    /// FFmpeg name of the native pixel format (e.g. `"YUV420P"`).
    pub fn pixel_format_name(&self) -> String {
        format!("{:?}", self.raw.format())
    }

    pub(crate) fn raw(&self) -> &'a VideoFrame {
        self.raw
    }
}

/// Native state; present only between a successful open and teardown.
struct SessionState {
    input_context: Input,
    decoder: VideoDecoder,
    stream_index: usize,
    time_base: Rational,
    /// Stream start time in `time_base` units.
    stream_start: i64,
    /// Container start time in AV_TIME_BASE units.
    container_start: i64,
    scratch: VideoFrame,
    current: Option<Duration>,
    eof_sent: bool,
}

/// Single-owner demux/decode context for one file.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
///
/// use vidthumb::{DecodeSession, MediaProbe};
///
/// let source = MediaProbe::probe("input.mp4")?;
/// let mut session = DecodeSession::open(&source)?;
/// session.seek_to(Duration::from_secs(2))?;
/// if let Some(frame) = session.decode_next_frame()? {
///     println!("{}x{} at {:?}", frame.width(), frame.height(), frame.timestamp());
/// }
/// session.close();
/// # Ok::<(), vidthumb::ThumbnailError>(())
/// ```
pub struct DecodeSession {
    path: PathBuf,
    state: Option<SessionState>,
    max_packet_errors: u32,
    checkpoint: Checkpoint,
}

impl DecodeSession {
    /// Open a session on the video stream chosen by the prober.
    ///
    /// Uses no deadline, no cancellation, and the default malformed-packet
    /// budget of 32.
    ///
    /// # Errors
    ///
    /// Returns [`ThumbnailError::Open`] if the demuxer or decoder cannot be
    /// created.
    pub fn open(source: &MediaSource) -> Result<Self, ThumbnailError> {
        Self::open_with(source, Checkpoint::new(None, None), 32)
    }

    pub(crate) fn open_with(
        source: &MediaSource,
        checkpoint: Checkpoint,
        max_packet_errors: u32,
    ) -> Result<Self, ThumbnailError> {
        let path = source.path.clone();
        let open_error = |reason: String| ThumbnailError::Open {
            path: path.clone(),
            reason,
        };

        crate::ffmpeg::ensure_initialized()
            .map_err(|reason| open_error(format!("FFmpeg initialisation failed: {reason}")))?;
        checkpoint.check()?;

        // Blocking demuxer I/O aborts once the request is cancelled or late.
        let interrupt = checkpoint.clone();
        let input_context =
            ffmpeg_next::format::input_with_interrupt(&path, move || interrupt.should_interrupt())
                .map_err(|error| {
                    checkpoint
                        .check()
                        .err()
                        .unwrap_or_else(|| open_error(error.to_string()))
                })?;

        let stream = input_context
            .stream(source.video_stream_index)
            .ok_or_else(|| {
                open_error(format!(
                    "video stream {} disappeared after probing",
                    source.video_stream_index
                ))
            })?;
        let stream_index = stream.index();
        let time_base = stream.time_base();
        let stream_start = match stream.start_time() {
            start if crate::utilities::is_unset_timestamp(start) => 0,
            start => start,
        };
        let decoder = CodecContext::from_parameters(stream.parameters())
            .and_then(|context| context.decoder().video())
            .map_err(|error| open_error(format!("failed to create video decoder: {error}")))?;

        let container_start = match unsafe { (*input_context.as_ptr()).start_time } {
            start if crate::utilities::is_unset_timestamp(start) => 0,
            start => start,
        };

        LIVE_SESSIONS.fetch_add(1, Ordering::AcqRel);
        log::debug!(
            "Opened decode session for {} (stream={}, {}x{}, {:?})",
            path.display(),
            stream_index,
            decoder.width(),
            decoder.height(),
            decoder.format(),
        );

        Ok(Self {
            path,
            state: Some(SessionState {
                input_context,
                decoder,
                stream_index,
                time_base,
                stream_start,
                container_start,
                scratch: VideoFrame::empty(),
                current: None,
                eof_sent: false,
            }),
            max_packet_errors: max_packet_errors.max(1),
            checkpoint,
        })
    }

    /// `true` until [`close`](DecodeSession::close) has run.
    pub fn is_open(&self) -> bool {
        self.state.is_some()
    }

    /// Reposition the demuxer at the nearest keyframe at or before
    /// `timestamp` and reset the decoder.
    ///
    /// Subsequent [`decode_next_frame`](DecodeSession::decode_next_frame)
    /// calls advance from that keyframe; callers skip frames whose timestamp
    /// is still before the target.
    ///
    /// # Errors
    ///
    /// Returns [`ThumbnailError::Seek`] if the container rejects the seek or
    /// the session is closed.
    pub fn seek_to(&mut self, timestamp: Duration) -> Result<(), ThumbnailError> {
        self.checkpoint.check()?;
        let state = self.state.as_mut().ok_or_else(|| ThumbnailError::Seek {
            timestamp,
            reason: "session is closed".to_string(),
        })?;

        let target = crate::utilities::duration_to_seek_timestamp(timestamp)
            .saturating_add(state.container_start);
        log::trace!("Seeking {} to {:?}", self.path.display(), timestamp);

        if let Err(error) = state.input_context.seek(target, ..target) {
            if let Err(interrupted) = self.checkpoint.check() {
                return Err(interrupted);
            }
            return Err(ThumbnailError::Seek {
                timestamp,
                reason: error.to_string(),
            });
        }

        state.decoder.flush();
        state.current = None;
        state.eof_sent = false;
        Ok(())
    }

    /// Decode the next frame of the video stream.
    ///
    /// Returns `Ok(None)` at end of stream. Malformed packets are skipped,
    /// up to the session's packet error budget.
    ///
    /// # Errors
    ///
    /// - [`ThumbnailError::Decode`] once the packet error budget is spent or
    ///   if the session is closed.
    /// - [`ThumbnailError::Cancelled`] / [`ThumbnailError::Timeout`] when
    ///   the request is interrupted.
    pub fn decode_next_frame(&mut self) -> Result<Option<Frame<'_>>, ThumbnailError> {
        if self.advance()?.is_none() {
            return Ok(None);
        }
        Ok(self.current_frame())
    }

    /// The most recently decoded frame, if any since the last seek.
    pub fn current_frame(&self) -> Option<Frame<'_>> {
        let state = self.state.as_ref()?;
        state
            .current
            .map(|timestamp| Frame::new(&state.scratch, timestamp))
    }

    /// Decode into the scratch frame and return its timestamp.
    pub(crate) fn advance(&mut self) -> Result<Option<Duration>, ThumbnailError> {
        let state = self
            .state
            .as_mut()
            .ok_or_else(|| ThumbnailError::Decode("session is closed".to_string()))?;

        let mut packet_errors = 0u32;
        let mut packet = Packet::empty();

        loop {
            self.checkpoint.check()?;

            // Drain frames the decoder has already produced.
            if state.decoder.receive_frame(&mut state.scratch).is_ok() {
                let ticks = state
                    .scratch
                    .timestamp()
                    .or_else(|| state.scratch.pts())
                    .unwrap_or(state.stream_start);
                let timestamp = crate::utilities::pts_to_duration(
                    ticks.saturating_sub(state.stream_start),
                    state.time_base,
                );
                state.current = Some(timestamp);
                return Ok(Some(timestamp));
            }

            if state.eof_sent {
                state.current = None;
                return Ok(None);
            }

            match packet.read(&mut state.input_context) {
                Ok(()) => {
                    if packet.stream() != state.stream_index {
                        continue;
                    }
                    if let Err(error) = state.decoder.send_packet(&packet) {
                        packet_errors += 1;
                        log::debug!(
                            "Skipping malformed packet in {} ({packet_errors}/{}): {error}",
                            self.path.display(),
                            self.max_packet_errors,
                        );
                        if packet_errors >= self.max_packet_errors {
                            return Err(ThumbnailError::Decode(format!(
                                "gave up after {packet_errors} malformed packets: {error}"
                            )));
                        }
                    }
                }
                Err(FfmpegError::Eof) => {
                    // Flush so frames still buffered for reordering come out.
                    state.decoder.send_eof().map_err(ThumbnailError::from)?;
                    state.eof_sent = true;
                }
                Err(error) => {
                    self.checkpoint.check()?;
                    packet_errors += 1;
                    log::debug!(
                        "Demuxer read error in {} ({packet_errors}/{}): {error}",
                        self.path.display(),
                        self.max_packet_errors,
                    );
                    if packet_errors >= self.max_packet_errors {
                        return Err(ThumbnailError::Decode(format!(
                            "gave up after {packet_errors} read errors: {error}"
                        )));
                    }
                }
            }
        }
    }

    /// Release the native demuxer and decoder.
    ///
    /// Idempotent: safe to call repeatedly and after any earlier failure.
    pub fn close(&mut self) {
        if let Some(state) = self.state.take() {
            drop(state);
            LIVE_SESSIONS.fetch_sub(1, Ordering::AcqRel);
            log::trace!("Closed decode session for {}", self.path.display());
        }
    }
}

impl Drop for DecodeSession {
    fn drop(&mut self) {
        self.close();
    }
}
