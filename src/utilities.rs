//! Internal utility functions.
//!
//! Helpers for pixel-data copying and timestamp conversion shared by the
//! prober, the decode session, and the converter.

use std::time::Duration;

use ffmpeg_next::{Rational, frame::Video as VideoFrame};

/// Copy pixel data from an FFmpeg video frame into a tightly-packed buffer.
///
/// FFmpeg frames frequently carry per-row padding (stride > width × bpp).
/// `bytes_per_pixel` is the output pixel size (3 for RGB24).
pub(crate) fn frame_to_buffer(
    video_frame: &VideoFrame,
    width: u32,
    height: u32,
    bytes_per_pixel: usize,
) -> Vec<u8> {
    let stride = video_frame.stride(0);
    let expected_stride = (width as usize) * bytes_per_pixel;
    let data = video_frame.data(0);

    if stride == expected_stride {
        data[..expected_stride * (height as usize)].to_vec()
    } else {
        let mut buffer = Vec::with_capacity(expected_stride * (height as usize));
        for row in 0..(height as usize) {
            let row_start = row * stride;
            buffer.extend_from_slice(&data[row_start..row_start + expected_stride]);
        }
        buffer
    }
}

/// Rescale a timestamp in `time_base` units to a [`Duration`].
///
/// Negative values and degenerate time bases clamp to zero; values past
/// what a [`Duration`] can hold saturate to [`Duration::MAX`].
pub(crate) fn pts_to_duration(pts: i64, time_base: Rational) -> Duration {
    if time_base.denominator() == 0 {
        return Duration::ZERO;
    }
    let seconds =
        pts as f64 * time_base.numerator() as f64 / time_base.denominator() as f64;
    if seconds.is_finite() && seconds > 0.0 {
        Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
    } else {
        Duration::ZERO
    }
}

/// Convert a [`Duration`] to a seek timestamp in AV_TIME_BASE (microseconds).
///
/// `input_context.seek()` (via `avformat_seek_file` with `stream_index = -1`)
/// expects container-level timestamps in AV_TIME_BASE.
pub(crate) fn duration_to_seek_timestamp(duration: Duration) -> i64 {
    i64::try_from(duration.as_micros()).unwrap_or(i64::MAX)
}

/// `true` when `value` is FFmpeg's "no timestamp" sentinel.
pub(crate) fn is_unset_timestamp(value: i64) -> bool {
    value == ffmpeg_sys_next::AV_NOPTS_VALUE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pts_rescales_by_time_base() {
        let time_base = Rational::new(1, 90_000);
        assert_eq!(pts_to_duration(90_000, time_base), Duration::from_secs(1));
        assert_eq!(pts_to_duration(45_000, time_base), Duration::from_millis(500));
    }

    #[test]
    fn negative_and_degenerate_pts_clamp_to_zero() {
        assert_eq!(pts_to_duration(-10, Rational::new(1, 1000)), Duration::ZERO);
        assert_eq!(pts_to_duration(10, Rational::new(1, 0)), Duration::ZERO);
    }

    #[test]
    fn oversized_pts_saturates() {
        assert_eq!(pts_to_duration(i64::MAX / 2, Rational::new(1000, 1)), Duration::MAX);
        assert_eq!(pts_to_duration(i64::MAX, Rational::new(i32::MAX, 1)), Duration::MAX);
    }

    #[test]
    fn seek_timestamps_are_microseconds() {
        assert_eq!(duration_to_seek_timestamp(Duration::from_millis(1500)), 1_500_000);
        assert_eq!(duration_to_seek_timestamp(Duration::ZERO), 0);
    }
}
