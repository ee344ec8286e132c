//! Camera access for the capture loop.
//!
//! A [`CameraDevice`] hands out [`FrameStream`]s; the stream owns the device
//! for as long as it lives, and dropping it releases the device.

mod directory;
pub mod frame;

pub use directory::FrameDirectoryCamera;

use image::DynamicImage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CameraError {
    #[error("camera permission denied: {0}")]
    PermissionDenied(String),
    #[error("no camera available: {0}")]
    NotFound(String),
    #[error("camera i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame could not be decoded: {0}")]
    Decode(#[from] image::ImageError),
}

pub trait CameraDevice: Send + Sync {
    fn open(&self) -> Result<Box<dyn FrameStream>, CameraError>;
}

pub trait FrameStream: Send {
    /// Grabs the current still from the stream.
    fn grab(&mut self) -> Result<DynamicImage, CameraError>;
}
