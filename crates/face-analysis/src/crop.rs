//! Single-face crop extraction

use frame::VideoFrame;

use crate::{FaceBox, FaceError, FaceGeometryProvider};

/// Pixel region `[x1, x2) x [y1, y2)` inside a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl CropRegion {
    /// Expand a relative face box by `pad_ratio` on each side and clip it to the frame
    pub fn padded(face: &FaceBox, frame_width: u32, frame_height: u32, pad_ratio: f32) -> Self {
        let fw = frame_width as i64;
        let fh = frame_height as i64;

        let x = (face.xmin * frame_width as f32) as i64;
        let y = (face.ymin * frame_height as f32) as i64;
        let w = (face.width * frame_width as f32) as i64;
        let h = (face.height * frame_height as f32) as i64;

        let pad_x = (w as f32 * pad_ratio) as i64;
        let pad_y = (h as f32 * pad_ratio) as i64;

        let x1 = (x - pad_x).clamp(0, fw);
        let y1 = (y - pad_y).clamp(0, fh);
        let x2 = (x + w + pad_x).clamp(0, fw);
        let y2 = (y + h + pad_y).clamp(0, fh);

        Self {
            x1: x1 as u32,
            y1: y1 as u32,
            x2: x2.max(x1) as u32,
            y2: y2.max(y1) as u32,
        }
    }

    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }
}

/// Cropped face plus where it came from
#[derive(Debug, Clone)]
pub struct FaceCrop {
    pub image: VideoFrame,
    pub region: CropRegion,
    /// Padded crop area over frame area
    pub area_ratio: f32,
}

/// Detect faces and require exactly one
pub fn single_face(
    provider: &dyn FaceGeometryProvider,
    frame: &VideoFrame,
) -> Result<FaceBox, FaceError> {
    let faces = provider.detect_faces(frame)?;
    match faces.as_slice() {
        [] => Err(FaceError::NoFace),
        [face] => Ok(*face),
        many => Err(FaceError::MultipleFaces(many.len())),
    }
}

/// Crop the only face in the frame with padding
pub fn extract_single_face_crop(
    provider: &dyn FaceGeometryProvider,
    frame: &VideoFrame,
    pad_ratio: f32,
) -> Result<FaceCrop, FaceError> {
    let face = single_face(provider, frame)?;
    let region = CropRegion::padded(&face, frame.width, frame.height, pad_ratio);
    let image = frame
        .crop(region.x1, region.y1, region.width(), region.height())
        .ok_or(FaceError::CropFailed)?;

    Ok(FaceCrop {
        image,
        region,
        area_ratio: area_ratio(&region, frame),
    })
}

/// How much of the frame the padded face box covers
pub fn face_area_ratio(
    provider: &dyn FaceGeometryProvider,
    frame: &VideoFrame,
    pad_ratio: f32,
) -> Result<f32, FaceError> {
    let face = single_face(provider, frame)?;
    let region = CropRegion::padded(&face, frame.width, frame.height, pad_ratio);
    Ok(area_ratio(&region, frame))
}

fn area_ratio(region: &CropRegion, frame: &VideoFrame) -> f32 {
    (region.area() as f64 / frame.area().max(1) as f64) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FaceLandmarks;

    struct FixedFaces(Vec<FaceBox>);

    impl FaceGeometryProvider for FixedFaces {
        fn detect_faces(&self, _frame: &VideoFrame) -> Result<Vec<FaceBox>, FaceError> {
            Ok(self.0.clone())
        }

        fn detect_landmarks(
            &self,
            _frame: &VideoFrame,
        ) -> Result<Option<FaceLandmarks>, FaceError> {
            Ok(None)
        }
    }

    fn face(xmin: f32, ymin: f32, width: f32, height: f32) -> FaceBox {
        FaceBox {
            xmin,
            ymin,
            width,
            height,
            confidence: 0.9,
        }
    }

    fn frame() -> VideoFrame {
        VideoFrame::from_fn(100, 50, |x, y| [x as u8, y as u8, 0])
    }

    #[test]
    fn test_padding_applied_inside_frame() {
        let region = CropRegion::padded(&face(0.4, 0.4, 0.2, 0.2), 100, 50, 0.2);
        // x=40 w=20 pad=4, y=20 h=10 pad=2
        assert_eq!(region, CropRegion { x1: 36, y1: 18, x2: 64, y2: 32 });
    }

    #[test]
    fn test_padding_clipped_to_frame() {
        let region = CropRegion::padded(&face(0.0, 0.0, 0.95, 0.9), 100, 50, 0.2);
        assert_eq!(region.x1, 0);
        assert_eq!(region.y1, 0);
        assert_eq!(region.x2, 100);
        assert_eq!(region.y2, 50);
    }

    #[test]
    fn test_crop_requires_exactly_one_face() {
        let none = FixedFaces(vec![]);
        assert_eq!(
            extract_single_face_crop(&none, &frame(), 0.2).unwrap_err(),
            FaceError::NoFace
        );

        let two = FixedFaces(vec![face(0.1, 0.1, 0.2, 0.2), face(0.6, 0.1, 0.2, 0.2)]);
        assert_eq!(
            extract_single_face_crop(&two, &frame(), 0.2).unwrap_err(),
            FaceError::MultipleFaces(2)
        );
    }

    #[test]
    fn test_crop_pixels_and_area_ratio() {
        let one = FixedFaces(vec![face(0.4, 0.4, 0.2, 0.2)]);
        let crop = extract_single_face_crop(&one, &frame(), 0.2).unwrap();
        assert_eq!((crop.image.width, crop.image.height), (28, 14));
        assert_eq!(crop.image.get_pixel(0, 0), Some([36, 18, 0]));
        let expected = (28.0 * 14.0) / (100.0 * 50.0);
        assert!((crop.area_ratio - expected).abs() < 1e-6);

        let ratio = face_area_ratio(&one, &frame(), 0.2).unwrap();
        assert!((ratio - expected).abs() < 1e-6);
    }

    #[test]
    fn test_degenerate_box_fails_crop() {
        let outside = FixedFaces(vec![face(1.2, 0.1, 0.1, 0.1)]);
        assert_eq!(
            extract_single_face_crop(&outside, &frame(), 0.2).unwrap_err(),
            FaceError::CropFailed
        );
    }
}
