//! Cutting a candidate's region out of a frame for verification.

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageBuffer, Rgb, RgbImage, imageops};

use crate::error::{CropError, OracleError};
use crate::frame::Frame;
use crate::geometry::{Orientation, Rect};

/// An upright RGB24 crop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CroppedImage {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl CroppedImage {
    pub fn to_jpeg(&self, quality: u8) -> Result<Vec<u8>, OracleError> {
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
            .encode(&self.data, self.width, self.height, ExtendedColorType::Rgb8)
            .map_err(|e| OracleError::Encode(e.to_string()))?;
        Ok(out)
    }
}

/// Crop the upright region `bbox` (grown by `padding` on each side) out of
/// `frame` and rotate it upright.
pub fn crop_region(
    frame: &Frame,
    bbox: &Rect,
    orientation: Orientation,
    padding: f32,
) -> Result<CroppedImage, CropError> {
    let expected = frame.width as usize * frame.height as usize * Frame::CHANNELS;
    let buffer: ImageBuffer<Rgb<u8>, &[u8]> =
        ImageBuffer::from_raw(frame.width, frame.height, frame.data.as_slice()).ok_or(
            CropError::BufferSize {
                width: frame.width,
                height: frame.height,
                expected,
                actual: frame.data.len(),
            },
        )?;

    let region = orientation.rect_to_buffer(&bbox.padded(padding).clamped());
    let (x, width) = pixel_span(region.x, region.width, frame.width);
    let (y, height) = pixel_span(region.y, region.height, frame.height);
    if width == 0 || height == 0 {
        return Err(CropError::EmptyRegion);
    }

    // Copied out pixel by pixel: `SubImage::to_image` needs a `'static`
    // container and the frame is only borrowed.
    let sensor: RgbImage = ImageBuffer::from_fn(width, height, |px, py| *buffer.get_pixel(x + px, y + py));
    let upright = match orientation {
        Orientation::Up => sensor,
        Orientation::Down => imageops::rotate180(&sensor),
        Orientation::Right => imageops::rotate90(&sensor),
        Orientation::Left => imageops::rotate270(&sensor),
    };

    Ok(CroppedImage {
        width: upright.width(),
        height: upright.height(),
        data: upright.into_raw(),
    })
}

/// Normalized `[start, start + len]` to a pixel offset and length within `extent`.
fn pixel_span(start: f32, len: f32, extent: u32) -> (u32, u32) {
    let extent_f = extent as f32;
    let first = (start * extent_f).floor().clamp(0.0, extent_f) as u32;
    let last = ((start + len) * extent_f).ceil().clamp(0.0, extent_f) as u32;
    (first, last.saturating_sub(first))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Frame whose red channel encodes the pixel's x and green its y.
    fn gradient(width: u32, height: u32) -> Frame {
        let mut data = Vec::new();
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[x as u8, y as u8, 0]);
            }
        }
        Frame::from_rgb(width, height, data).unwrap()
    }

    #[test]
    fn crop_upright_region() {
        let frame = gradient(4, 2);
        let crop = crop_region(&frame, &Rect::new(0.5, 0.0, 0.5, 1.0), Orientation::Up, 0.0).unwrap();
        assert_eq!((crop.width, crop.height), (2, 2));
        assert_eq!(&crop.data[0..3], &[2, 0, 0]);
    }

    #[test]
    fn crop_offset_in_both_axes() {
        let frame = gradient(4, 4);
        let crop = crop_region(&frame, &Rect::new(0.5, 0.75, 0.25, 0.25), Orientation::Up, 0.0).unwrap();
        assert_eq!((crop.width, crop.height), (1, 1));
        assert_eq!(crop.data, vec![2, 3, 0]);

        // The frame is free again once the crop is taken.
        let mut frame = frame;
        frame.data[0] = 9;
        let whole = crop_region(&frame, &Rect::new(0.0, 0.0, 1.0, 1.0), Orientation::Up, 0.0).unwrap();
        assert_eq!(whole.data[0], 9);
    }

    #[test]
    fn crop_is_rotated_upright() {
        let frame = gradient(4, 2);
        let crop = crop_region(&frame, &Rect::new(0.0, 0.0, 1.0, 1.0), Orientation::Right, 0.0).unwrap();
        // A 4x2 sensor buffer is 2x4 upright.
        assert_eq!((crop.width, crop.height), (2, 4));
    }

    #[test]
    fn empty_region_is_rejected() {
        let frame = gradient(4, 2);
        let err = crop_region(&frame, &Rect::new(2.0, 2.0, 0.1, 0.1), Orientation::Up, 0.0).unwrap_err();
        assert_eq!(err, CropError::EmptyRegion);
    }

    #[test]
    fn bad_buffer_is_rejected() {
        let frame = Frame {
            width: 4,
            height: 4,
            data: vec![0; 3],
        };
        let err = crop_region(&frame, &Rect::new(0.0, 0.0, 1.0, 1.0), Orientation::Up, 0.0).unwrap_err();
        assert!(matches!(err, CropError::BufferSize { .. }));
    }

    #[test]
    fn jpeg_encoding_produces_jfif() {
        let frame = Frame::blank(16, 16);
        let crop = crop_region(&frame, &Rect::new(0.25, 0.25, 0.5, 0.5), Orientation::Up, 0.1).unwrap();
        let jpeg = crop.to_jpeg(80).unwrap();
        assert_eq!(&jpeg[0..2], &[0xFF, 0xD8]);
    }
}
