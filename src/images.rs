use image::{ImageFormat, imageops::FilterType};
use std::io::Cursor;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("encode failed: {0}")]
    Encode(String),
}

/// Converts a WebP buffer into PNG, optionally bounded to `max_edge` pixels
/// on the longest side. Pure transform, no I/O.
pub fn webp_to_png(bytes: &[u8], max_edge: Option<u32>) -> Result<Vec<u8>, NormalizeError> {
    transcode(bytes, ImageFormat::WebP, max_edge)
}

fn transcode(
    bytes: &[u8],
    source: ImageFormat,
    max_edge: Option<u32>,
) -> Result<Vec<u8>, NormalizeError> {
    let decoded = image::load_from_memory_with_format(bytes, source)
        .map_err(|err| NormalizeError::Decode(err.to_string()))?;
    let decoded = match max_edge {
        Some(edge) => decoded.resize(edge, edge, FilterType::Lanczos3),
        None => decoded,
    };
    let mut buffer = Cursor::new(Vec::new());
    decoded
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|err| NormalizeError::Encode(err.to_string()))?;
    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn png_fixture(width: u32, height: u32) -> Vec<u8> {
        let pixels = RgbaImage::from_fn(width, height, |x, y| {
            image::Rgba([(x % 256) as u8, (y % 256) as u8, 64, 255])
        });
        let mut buffer = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(pixels)
            .write_to(&mut buffer, ImageFormat::Png)
            .expect("encode fixture");
        buffer.into_inner()
    }

    #[test]
    fn transcode_reencodes_as_png() {
        let source = png_fixture(8, 8);
        let output = transcode(&source, ImageFormat::Png, None).expect("transcode");
        let decoded = image::load_from_memory_with_format(&output, ImageFormat::Png)
            .expect("decode output");
        assert_eq!(decoded.width(), 8);
        assert_eq!(decoded.height(), 8);
    }

    #[test]
    fn resize_bounds_the_longest_edge() {
        let source = png_fixture(16, 8);
        let output = transcode(&source, ImageFormat::Png, Some(4)).expect("transcode");
        let decoded = image::load_from_memory_with_format(&output, ImageFormat::Png)
            .expect("decode output");
        assert_eq!(decoded.width(), 4);
        assert_eq!(decoded.height(), 2);
    }

    #[test]
    fn garbage_input_is_a_decode_error() {
        let err = webp_to_png(b"not an image", None).expect_err("should fail");
        assert!(matches!(err, NormalizeError::Decode(_)));
    }
}
