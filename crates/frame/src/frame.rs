//! Video frame types and processing

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, RgbImage};

use crate::FrameError;

/// Decoded RGB video frame
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    /// RGB pixel data (width * height * 3)
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
}

impl VideoFrame {
    /// Create a frame from raw RGB data, checking the buffer length
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Result<Self, FrameError> {
        if width == 0 || height == 0 {
            return Err(FrameError::Empty);
        }
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(FrameError::Dimensions {
                width,
                height,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Build a frame by evaluating `f` for every pixel
    pub fn from_fn<F>(width: u32, height: u32, mut f: F) -> Self
    where
        F: FnMut(u32, u32) -> [u8; 3],
    {
        let mut data = Vec::with_capacity(width as usize * height as usize * 3);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&f(x, y));
            }
        }
        Self {
            data,
            width,
            height,
        }
    }

    /// Wrap an `image` RGB buffer
    pub fn from_rgb_image(img: RgbImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            data: img.into_raw(),
            width,
            height,
        }
    }

    /// Copy into an `image` RGB buffer
    pub fn to_rgb_image(&self) -> Result<RgbImage, FrameError> {
        RgbImage::from_raw(self.width, self.height, self.data.clone()).ok_or(
            FrameError::Dimensions {
                width: self.width,
                height: self.height,
                actual: self.data.len(),
            },
        )
    }

    /// Get pixel at (x, y)
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 3;
        let px = self.data.get(idx..idx + 3)?;
        Some([px[0], px[1], px[2]])
    }

    /// Total pixel count
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Largest of width and height
    pub fn max_dimension(&self) -> u32 {
        self.width.max(self.height)
    }

    /// Convert to grayscale
    pub fn to_grayscale(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            let [r, g, b] = self.get_pixel(x, y).unwrap_or([0, 0, 0]);
            // Luminance formula: 0.299*R + 0.587*G + 0.114*B
            let luma = r as f32 * 0.299 + g as f32 * 0.587 + b as f32 * 0.114;
            Luma([luma.round().min(255.0) as u8])
        })
    }

    /// Mean grayscale intensity in [0, 255]
    pub fn mean_brightness(&self) -> f32 {
        let gray = self.to_grayscale();
        let pixels = gray.as_raw();
        if pixels.is_empty() {
            return 0.0;
        }
        let sum: u64 = pixels.iter().map(|&p| p as u64).sum();
        (sum as f64 / pixels.len() as f64) as f32
    }

    /// Crop a region of the frame
    pub fn crop(&self, x: u32, y: u32, w: u32, h: u32) -> Option<VideoFrame> {
        if w == 0 || h == 0 || x + w > self.width || y + h > self.height {
            return None;
        }

        let mut cropped = Vec::with_capacity((w * h * 3) as usize);
        for row in y..(y + h) {
            let start = ((row * self.width + x) * 3) as usize;
            let end = start + (w * 3) as usize;
            cropped.extend_from_slice(self.data.get(start..end)?);
        }

        Some(VideoFrame {
            data: cropped,
            width: w,
            height: h,
        })
    }

    /// Resize frame with a triangle (area-like) filter
    pub fn resize(&self, new_width: u32, new_height: u32) -> Result<VideoFrame, FrameError> {
        let img = self.to_rgb_image()?;
        let resized =
            imageops::resize(&img, new_width.max(1), new_height.max(1), FilterType::Triangle);
        Ok(VideoFrame::from_rgb_image(resized))
    }

    /// Downscale so the largest side is at most `max_dim`, keeping aspect ratio
    pub fn fit_within(&self, max_dim: u32) -> Result<VideoFrame, FrameError> {
        let current = self.max_dimension();
        if current <= max_dim {
            return Ok(self.clone());
        }
        let scale = max_dim as f32 / current as f32;
        let target_w = ((self.width as f32 * scale) as u32).max(1);
        let target_h = ((self.height as f32 * scale) as u32).max(1);
        self.resize(target_w, target_h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, rgb: [u8; 3]) -> VideoFrame {
        VideoFrame::from_fn(width, height, |_, _| rgb)
    }

    #[test]
    fn test_new_rejects_wrong_buffer_length() {
        let err = VideoFrame::new(vec![0; 10], 2, 2).unwrap_err();
        assert!(matches!(err, FrameError::Dimensions { actual: 10, .. }));
        assert!(matches!(VideoFrame::new(vec![], 0, 0), Err(FrameError::Empty)));
    }

    #[test]
    fn test_grayscale_weights() {
        let frame = solid(4, 4, [255, 0, 0]);
        let gray = frame.to_grayscale();
        assert_eq!(gray.get_pixel(0, 0)[0], 76);

        let white = solid(4, 4, [255, 255, 255]);
        assert_eq!(white.to_grayscale().get_pixel(3, 3)[0], 255);
    }

    #[test]
    fn test_mean_brightness() {
        let frame =
            VideoFrame::from_fn(2, 1, |x, _| if x == 0 { [0, 0, 0] } else { [200, 200, 200] });
        assert!((frame.mean_brightness() - 100.0).abs() < 1e-3);
    }

    #[test]
    fn test_crop_bounds() {
        let frame = VideoFrame::from_fn(10, 8, |x, y| [x as u8, y as u8, 0]);
        let crop = frame.crop(2, 3, 4, 2).unwrap();
        assert_eq!((crop.width, crop.height), (4, 2));
        assert_eq!(crop.get_pixel(0, 0), Some([2, 3, 0]));
        assert_eq!(crop.get_pixel(3, 1), Some([5, 4, 0]));

        assert!(frame.crop(8, 0, 4, 2).is_none());
        assert!(frame.crop(0, 0, 0, 2).is_none());
    }

    #[test]
    fn test_fit_within_keeps_aspect() {
        let frame = solid(400, 200, [10, 20, 30]);
        let small = frame.fit_within(100).unwrap();
        assert_eq!((small.width, small.height), (100, 50));

        let untouched = frame.fit_within(400).unwrap();
        assert_eq!((untouched.width, untouched.height), (400, 200));
    }
}
