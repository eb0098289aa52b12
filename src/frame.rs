//! Frame buffers delivered by the capture source.

use crate::error::CropError;

/// A raw RGB24 frame as delivered by the camera session.
///
/// Pixels are stored row-major in sensor orientation; pair the frame with an
/// [`Orientation`](crate::geometry::Orientation) to interpret it upright.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Raw pixel data, 3 bytes per pixel.
    pub data: Vec<u8>,
}

impl Frame {
    pub const CHANNELS: usize = 3;

    /// Wrap an RGB24 buffer, checking its length against the dimensions.
    pub fn from_rgb(width: u32, height: u32, data: Vec<u8>) -> Result<Self, CropError> {
        let expected = width as usize * height as usize * Self::CHANNELS;
        if data.len() != expected {
            return Err(CropError::BufferSize {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// A black frame, mostly useful for tests and warm-up.
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * Self::CHANNELS],
        }
    }
}
