//! JPEG encoding of converted thumbnails.

use image::{ExtendedColorType, RgbImage, codecs::jpeg::JpegEncoder};

use crate::error::ThumbnailError;

/// Encode an RGB image as baseline JPEG.
///
/// `quality` is clamped to `1..=100`; 0 is treated as 1.
///
/// # Errors
///
/// Returns [`ThumbnailError::Encode`] for a zero-area image or if the
/// encoder rejects the buffer. Encoding never touches the filesystem.
///
/// # Example
///
/// ```
/// use image::{Rgb, RgbImage};
/// use vidthumb::encode_jpeg;
///
/// let image = RgbImage::from_pixel(8, 8, Rgb([200, 40, 40]));
/// let bytes = encode_jpeg(&image, 85)?;
/// assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
/// # Ok::<(), vidthumb::ThumbnailError>(())
/// ```
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, ThumbnailError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(ThumbnailError::Encode(format!(
            "cannot encode a zero-area image ({width}x{height})"
        )));
    }

    let quality = quality.clamp(1, 100);
    let mut bytes = Vec::with_capacity((width as usize) * (height as usize) / 4);
    JpegEncoder::new_with_quality(&mut bytes, quality).encode(
        image.as_raw(),
        width,
        height,
        ExtendedColorType::Rgb8,
    )?;

    log::trace!(
        "Encoded {width}x{height} JPEG at quality {quality} ({} bytes)",
        bytes.len()
    );
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use image::Rgb;

    use super::*;

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 255 / width) as u8, (y * 255 / height) as u8, 96])
        })
    }

    #[test]
    fn output_decodes_to_same_dimensions() {
        let bytes = encode_jpeg(&gradient(40, 30), 80).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (40, 30));
    }

    #[test]
    fn zero_area_is_an_encode_error() {
        let result = encode_jpeg(&RgbImage::new(0, 10), 80);
        assert!(matches!(result, Err(ThumbnailError::Encode(_))));
    }

    #[test]
    fn higher_quality_is_not_smaller() {
        let image = gradient(128, 128);
        let low = encode_jpeg(&image, 10).unwrap();
        let high = encode_jpeg(&image, 95).unwrap();
        assert!(high.len() >= low.len());
    }

    #[test]
    fn quality_zero_is_clamped() {
        assert!(encode_jpeg(&gradient(16, 16), 0).is_ok());
    }
}
