//! Frame conversion.
//!
//! Converts a decoded [`Frame`] in its native pixel format into a packed
//! 8-bit RGB image no larger than a bounding box, preserving the display
//! aspect ratio. Colour conversion honours the frame's YUV matrix and range
//! so limited-range BT.601 and BT.709 material both come out with correct
//! black and white levels.

use std::os::raw::c_int;

use ffmpeg_next::{
    color::{Range as ColorRange, Space as ColorSpace},
    format::Pixel,
    frame::Video as VideoFrame,
    software::scaling::Context as ScalingContext,
};
use image::RgbImage;

use crate::{configuration::ScalingFilter, error::ThumbnailError, session::Frame};

/// Fit `width × height` inside a `max_dimension` square.
///
/// The longer side becomes `max_dimension`, the shorter side is scaled
/// proportionally and rounded to nearest (never below 1). Images already
/// inside the box are returned unchanged; thumbnails are never upscaled.
///
/// # Example
///
/// ```
/// use vidthumb::fit_dimensions;
///
/// assert_eq!(fit_dimensions(1920, 1080, 256), (256, 144));
/// assert_eq!(fit_dimensions(1080, 1920, 256), (144, 256));
/// assert_eq!(fit_dimensions(100, 50, 256), (100, 50));
/// ```
pub fn fit_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let max_dimension = max_dimension.max(1);
    if width == 0 || height == 0 {
        return (0, 0);
    }
    let longer = width.max(height);
    if longer <= max_dimension {
        return (width, height);
    }

    let scale = |side: u32| -> u32 {
        let numerator = u64::from(side) * u64::from(max_dimension) * 2 + u64::from(longer);
        let scaled = numerator / (2 * u64::from(longer));
        (scaled as u32).max(1)
    };

    if width >= height {
        (max_dimension, scale(height))
    } else {
        (scale(width), max_dimension)
    }
}

/// How a native pixel format maps onto RGB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PixelFamily {
    /// Planar or packed YUV whose range comes from the frame.
    Yuv,
    /// The deprecated `YUVJ*` formats, always full range.
    YuvFullRange,
    /// Already RGB; no matrix involved.
    Rgb,
    /// Luma only.
    Gray,
}

/// Pixel formats with a defined RGB conversion.
///
/// Palettised, Bayer, and hardware surface formats are rejected rather than
/// passed to swscale, which would produce garbage or fail obscurely.
fn pixel_family(format: Pixel) -> Option<PixelFamily> {
    match format {
        Pixel::YUV420P
        | Pixel::YUV422P
        | Pixel::YUV444P
        | Pixel::YUV410P
        | Pixel::YUV411P
        | Pixel::YUV440P
        | Pixel::YUYV422
        | Pixel::UYVY422
        | Pixel::NV12
        | Pixel::NV21
        | Pixel::YUVA420P
        | Pixel::YUV420P10LE
        | Pixel::YUV422P10LE
        | Pixel::YUV444P10LE
        | Pixel::YUV420P12LE
        | Pixel::YUV422P12LE
        | Pixel::YUV444P12LE
        | Pixel::P010LE => Some(PixelFamily::Yuv),
        Pixel::YUVJ420P | Pixel::YUVJ422P | Pixel::YUVJ444P | Pixel::YUVJ440P => {
            Some(PixelFamily::YuvFullRange)
        }
        Pixel::RGB24
        | Pixel::BGR24
        | Pixel::RGBA
        | Pixel::BGRA
        | Pixel::ARGB
        | Pixel::ABGR
        | Pixel::RGB48LE
        | Pixel::GBRP
        | Pixel::GBRP10LE => Some(PixelFamily::Rgb),
        Pixel::GRAY8 | Pixel::GRAY16LE => Some(PixelFamily::Gray),
        _ => None,
    }
}

/// swscale coefficient table for a frame's colour matrix.
///
/// Untagged material follows the usual convention: HD and larger is BT.709,
/// everything else BT.601.
fn sws_colorspace(space: ColorSpace, height: u32) -> c_int {
    let table = match space {
        ColorSpace::BT709 => ffmpeg_sys_next::SWS_CS_ITU709,
        ColorSpace::FCC => ffmpeg_sys_next::SWS_CS_FCC,
        ColorSpace::BT470BG | ColorSpace::SMPTE170M => ffmpeg_sys_next::SWS_CS_ITU601,
        ColorSpace::SMPTE240M => ffmpeg_sys_next::SWS_CS_SMPTE240M,
        ColorSpace::BT2020NCL | ColorSpace::BT2020CL => ffmpeg_sys_next::SWS_CS_BT2020,
        _ if height >= 720 => ffmpeg_sys_next::SWS_CS_ITU709,
        _ => ffmpeg_sys_next::SWS_CS_ITU601,
    };
    table as c_int
}

/// Converts decoded frames to bounded RGB images.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct FrameConverter {
    filter: ScalingFilter,
}

impl FrameConverter {
    pub(crate) fn new(filter: ScalingFilter) -> Self {
        Self { filter }
    }

    /// Convert `frame` to RGB, fitting it inside `max_dimension` square.
    ///
    /// Non-square sample aspect ratios are applied to the width so the
    /// thumbnail shows the picture as a player would display it.
    pub(crate) fn convert(
        &self,
        frame: &Frame<'_>,
        max_dimension: u32,
    ) -> Result<RgbImage, ThumbnailError> {
        let raw = frame.raw();
        let format = raw.format();
        let family = pixel_family(format)
            .ok_or_else(|| ThumbnailError::UnsupportedFormat(frame.pixel_format_name()))?;

        let (source_width, source_height) = (raw.width(), raw.height());
        if source_width == 0 || source_height == 0 {
            return Err(ThumbnailError::Encode(format!(
                "decoded frame has zero area ({source_width}x{source_height})"
            )));
        }

        let display_width = display_width(raw, source_width);
        let (width, height) = fit_dimensions(display_width, source_height, max_dimension);

        let mut scaler = ScalingContext::get(
            format,
            source_width,
            source_height,
            Pixel::RGB24,
            width,
            height,
            self.filter.to_ffmpeg_flags(),
        )
        .map_err(|error| ThumbnailError::UnsupportedFormat(format!("{format:?}: {error}")))?;

        if matches!(family, PixelFamily::Yuv | PixelFamily::YuvFullRange) {
            let full_range =
                family == PixelFamily::YuvFullRange || raw.color_range() == ColorRange::JPEG;
            let colorspace = sws_colorspace(raw.color_space(), source_height);
            // Output is always full-range RGB.
            unsafe {
                let source_table = ffmpeg_sys_next::sws_getCoefficients(colorspace);
                let destination_table =
                    ffmpeg_sys_next::sws_getCoefficients(ffmpeg_sys_next::SWS_CS_DEFAULT as c_int);
                ffmpeg_sys_next::sws_setColorspaceDetails(
                    scaler.as_mut_ptr(),
                    source_table,
                    c_int::from(full_range),
                    destination_table,
                    1,
                    0,
                    1 << 16,
                    1 << 16,
                );
            }
        }

        let mut rgb_frame = VideoFrame::empty();
        scaler.run(raw, &mut rgb_frame)?;

        let buffer = crate::utilities::frame_to_buffer(&rgb_frame, width, height, 3);
        log::trace!(
            "Converted {format:?} {source_width}x{source_height} to RGB24 {width}x{height}"
        );
        RgbImage::from_raw(width, height, buffer).ok_or_else(|| {
            ThumbnailError::Encode(format!("RGB buffer does not match {width}x{height}"))
        })
    }
}

/// Width of the frame as displayed, after applying its sample aspect ratio.
fn display_width(raw: &VideoFrame, coded_width: u32) -> u32 {
    let sample_aspect = raw.aspect_ratio();
    let (numerator, denominator) = (sample_aspect.numerator(), sample_aspect.denominator());
    if numerator <= 0 || denominator <= 0 || numerator == denominator {
        return coded_width;
    }
    let scaled = (u64::from(coded_width) * numerator as u64 + denominator as u64 / 2)
        / denominator as u64;
    u32::try_from(scaled).unwrap_or(u32::MAX).max(1)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use ffmpeg_next::Rational;

    use super::*;

    fn yuv_frame(format: Pixel, width: u32, height: u32, luma: u8) -> VideoFrame {
        let mut frame = VideoFrame::new(format, width, height);
        frame.data_mut(0).fill(luma);
        frame.data_mut(1).fill(128);
        frame.data_mut(2).fill(128);
        frame
    }

    fn convert(raw: &VideoFrame, max_dimension: u32) -> Result<RgbImage, ThumbnailError> {
        FrameConverter::default().convert(&Frame::new(raw, Duration::ZERO), max_dimension)
    }

    fn assert_near(actual: u8, expected: u8) {
        assert!(
            actual.abs_diff(expected) <= 3,
            "expected ~{expected}, got {actual}"
        );
    }

    #[test]
    fn fits_landscape_and_portrait() {
        assert_eq!(fit_dimensions(1280, 720, 256), (256, 144));
        assert_eq!(fit_dimensions(720, 1280, 256), (144, 256));
        assert_eq!(fit_dimensions(1000, 1000, 256), (256, 256));
    }

    #[test]
    fn never_upscales() {
        assert_eq!(fit_dimensions(120, 80, 256), (120, 80));
        assert_eq!(fit_dimensions(256, 10, 256), (256, 10));
    }

    #[test]
    fn extreme_aspect_keeps_at_least_one_pixel() {
        assert_eq!(fit_dimensions(10_000, 2, 100), (100, 1));
        assert_eq!(fit_dimensions(3, 9_000, 90), (1, 90));
    }

    #[test]
    fn shorter_side_rounds_to_nearest() {
        // 480 * 100 / 640 = 75 exactly; 481 * 100 / 640 = 75.16.
        assert_eq!(fit_dimensions(640, 480, 100), (100, 75));
        assert_eq!(fit_dimensions(640, 481, 100), (100, 75));
        // 486 * 100 / 640 = 75.94
        assert_eq!(fit_dimensions(640, 486, 100), (100, 76));
    }

    #[test]
    fn limited_range_white_and_black() {
        let white = convert(&yuv_frame(Pixel::YUV420P, 64, 48, 235), 32).unwrap();
        assert_eq!(white.dimensions(), (32, 24));
        for channel in white.get_pixel(10, 10).0 {
            assert_near(channel, 255);
        }

        let black = convert(&yuv_frame(Pixel::YUV420P, 64, 48, 16), 32).unwrap();
        for channel in black.get_pixel(10, 10).0 {
            assert_near(channel, 0);
        }
    }

    #[test]
    fn full_range_formats_are_not_expanded() {
        let grey = convert(&yuv_frame(Pixel::YUVJ420P, 64, 48, 128), 64).unwrap();
        for channel in grey.get_pixel(5, 5).0 {
            assert_near(channel, 128);
        }
    }

    #[test]
    fn tagged_full_range_is_honoured() {
        let mut raw = yuv_frame(Pixel::YUV420P, 64, 48, 128);
        raw.set_color_range(ColorRange::JPEG);
        let grey = convert(&raw, 64).unwrap();
        for channel in grey.get_pixel(5, 5).0 {
            assert_near(channel, 128);
        }
    }

    #[test]
    fn anamorphic_frames_use_display_width() {
        let mut raw = yuv_frame(Pixel::YUV420P, 64, 64, 128);
        raw.set_aspect_ratio(Rational::new(2, 1));
        let image = convert(&raw, 64).unwrap();
        assert_eq!(image.dimensions(), (64, 32));
    }

    #[test]
    fn palettised_frames_are_unsupported() {
        let raw = VideoFrame::new(Pixel::PAL8, 16, 16);
        let result = convert(&raw, 16);
        assert!(matches!(result, Err(ThumbnailError::UnsupportedFormat(_))));
    }

    #[test]
    fn hd_material_defaults_to_bt709() {
        assert_eq!(
            sws_colorspace(ColorSpace::Unspecified, 1080),
            ffmpeg_sys_next::SWS_CS_ITU709 as c_int
        );
        assert_eq!(
            sws_colorspace(ColorSpace::Unspecified, 480),
            ffmpeg_sys_next::SWS_CS_ITU601 as c_int
        );
        assert_eq!(
            sws_colorspace(ColorSpace::BT470BG, 1080),
            ffmpeg_sys_next::SWS_CS_ITU601 as c_int
        );
    }
}
