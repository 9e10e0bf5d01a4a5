use crate::error::{Result, SpeedReaderError};
use image::RgbImage;

/// A 2-D grid of 8-bit RGB pixels with known width and height.
///
/// Created by external loaders (out of scope for this core); owned by the
/// pipeline from receipt to result emission. Backed by `image::RgbImage` so
/// that callers can hand in anything the `image` crate can decode.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    inner: RgbImage,
}

impl Image {
    /// Builds an image from raw, row-major RGB8 bytes. Fails if `data`'s
    /// length doesn't match `width * height * 3`.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(SpeedReaderError::preprocessing(format!(
                "image buffer has {} bytes, expected {} for {}x{}",
                data.len(),
                expected,
                width,
                height
            )));
        }
        let inner = RgbImage::from_raw(width, height, data)
            .ok_or_else(|| SpeedReaderError::preprocessing("invalid image dimensions"))?;
        Ok(Self { inner })
    }

    pub fn from_rgb_image(inner: RgbImage) -> Self {
        Self { inner }
    }

    pub fn width(&self) -> u32 {
        self.inner.width()
    }

    pub fn height(&self) -> u32 {
        self.inner.height()
    }

    pub fn as_raw(&self) -> &[u8] {
        self.inner.as_raw()
    }

    pub fn as_rgb_image(&self) -> &RgbImage {
        &self.inner
    }

    pub fn into_rgb_image(self) -> RgbImage {
        self.inner
    }

    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 3] {
        self.inner.get_pixel(x, y).0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_buffer_length() {
        let err = Image::new(4, 4, vec![0u8; 10]).unwrap_err();
        assert!(matches!(err, SpeedReaderError::PreprocessingFault(_)));
    }

    #[test]
    fn round_trips_pixel_data() {
        let data = vec![255u8; 2 * 2 * 3];
        let img = Image::new(2, 2, data).unwrap();
        assert_eq!(img.width(), 2);
        assert_eq!(img.height(), 2);
        assert_eq!(img.get_pixel(0, 0), [255, 255, 255]);
    }
}
