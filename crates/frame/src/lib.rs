//! Frame Ingestion for Exam Proctoring
//!
//! Turns webcam snapshots posted by the browser into RGB frames and provides
//! the pixel helpers every analyzer shares:
//! - Data-URL / raw byte decoding (JPEG, PNG, WebP, ...)
//! - Grayscale conversion and mean brightness
//! - Cropping and resizing

pub mod decode;
pub mod frame;

pub use decode::{decode_bytes, decode_data_url};
pub use frame::VideoFrame;

use thiserror::Error;

/// Frame error types
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("Invalid image payload")]
    InvalidPayload,

    #[error("Could not decode frame: {0}")]
    Decode(String),

    #[error("Buffer size {actual} does not match {width}x{height} RGB frame")]
    Dimensions {
        width: u32,
        height: u32,
        actual: usize,
    },

    #[error("Empty frame")]
    Empty,
}
