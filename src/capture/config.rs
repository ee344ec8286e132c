use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("capture interval must be greater than zero")]
    ZeroInterval,
    #[error("dwell time must be greater than zero")]
    ZeroDwell,
    #[error("history capacity must be at least one")]
    ZeroHistory,
    #[error("jpeg quality {0} is outside 1..=100")]
    JpegQuality(u8),
    #[error("frame size {0}x{1} must be non-zero")]
    FrameSize(u32, u32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfig {
    pub capture_interval: Duration,
    pub dwell: Duration,
    pub history_capacity: usize,
    pub jpeg_quality: u8,
    pub frame_width: u32,
    pub frame_height: u32,
    /// Base URL of the web front end, used to build end-session links.
    pub frontend_base_url: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            capture_interval: Duration::from_millis(1_000),
            dwell: Duration::from_millis(30_000),
            history_capacity: 5,
            jpeg_quality: 80,
            frame_width: 640,
            frame_height: 480,
            frontend_base_url: "http://localhost:3000".into(),
        }
    }
}

impl CaptureConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capture_interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        if self.dwell.is_zero() {
            return Err(ConfigError::ZeroDwell);
        }
        if self.history_capacity == 0 {
            return Err(ConfigError::ZeroHistory);
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ConfigError::JpegQuality(self.jpeg_quality));
        }
        if self.frame_width == 0 || self.frame_height == 0 {
            return Err(ConfigError::FrameSize(self.frame_width, self.frame_height));
        }
        Ok(())
    }
}
