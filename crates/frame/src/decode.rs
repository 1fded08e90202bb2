//! Browser snapshot decoding
//!
//! Clients post `data:image/jpeg;base64,...` strings captured from a canvas.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::debug;

use crate::{FrameError, VideoFrame};

/// Decode a `data:<mime>;base64,<payload>` URL into an RGB frame
pub fn decode_data_url(data_url: &str) -> Result<VideoFrame, FrameError> {
    let (_, encoded) = data_url
        .split_once(',')
        .ok_or(FrameError::InvalidPayload)?;

    let encoded = encoded.trim();
    if encoded.is_empty() {
        return Err(FrameError::InvalidPayload);
    }

    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| FrameError::Decode(e.to_string()))?;
    decode_bytes(&bytes)
}

/// Decode encoded image bytes (any format `image` understands) into RGB
pub fn decode_bytes(bytes: &[u8]) -> Result<VideoFrame, FrameError> {
    if bytes.is_empty() {
        return Err(FrameError::InvalidPayload);
    }
    let img = image::load_from_memory(bytes).map_err(|e| FrameError::Decode(e.to_string()))?;
    let rgb = img.to_rgb8();
    if rgb.width() == 0 || rgb.height() == 0 {
        return Err(FrameError::Empty);
    }
    debug!(width = rgb.width(), height = rgb.height(), "Decoded frame");
    Ok(VideoFrame::from_rgb_image(rgb))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};
    use std::io::Cursor;

    fn png_data_url(img: &RgbImage) -> String {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
        format!("data:image/png;base64,{}", STANDARD.encode(&buf))
    }

    #[test]
    fn test_decode_png_data_url() {
        let img = RgbImage::from_fn(6, 4, |x, y| image::Rgb([x as u8 * 10, y as u8 * 20, 7]));
        let frame = decode_data_url(&png_data_url(&img)).unwrap();
        assert_eq!((frame.width, frame.height), (6, 4));
        assert_eq!(frame.get_pixel(5, 3), Some([50, 60, 7]));
    }

    #[test]
    fn test_rejects_missing_separator() {
        assert!(matches!(decode_data_url(""), Err(FrameError::InvalidPayload)));
        assert!(matches!(
            decode_data_url("data:image/png;base64"),
            Err(FrameError::InvalidPayload)
        ));
        assert!(matches!(
            decode_data_url("data:image/png;base64,"),
            Err(FrameError::InvalidPayload)
        ));
    }

    #[test]
    fn test_rejects_garbage_bytes() {
        let url = format!("data:image/png;base64,{}", STANDARD.encode(b"not an image"));
        assert!(matches!(decode_data_url(&url), Err(FrameError::Decode(_))));
        assert!(matches!(
            decode_data_url("data:image/png;base64,@@@"),
            Err(FrameError::Decode(_))
        ));
    }
}
