use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use image::DynamicImage;

use super::{CameraDevice, CameraError, FrameStream};

const ENABLE_LOGS: bool = true;

use crate::log_debug;

const FRAME_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Replays the still images of a directory, in file-name order, as a video
/// source. Useful on kiosks fed by an external grabber that drops frames
/// into a folder, and for dry runs without hardware.
pub struct FrameDirectoryCamera {
    dir: PathBuf,
    open_streams: Arc<AtomicUsize>,
}

impl FrameDirectoryCamera {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            open_streams: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of streams currently holding the device.
    pub fn open_streams(&self) -> usize {
        self.open_streams.load(Ordering::SeqCst)
    }

    fn list_frames(&self) -> Result<Vec<PathBuf>, CameraError> {
        let entries = fs::read_dir(&self.dir).map_err(|err| match err.kind() {
            ErrorKind::NotFound => CameraError::NotFound(self.dir.display().to_string()),
            ErrorKind::PermissionDenied => {
                CameraError::PermissionDenied(self.dir.display().to_string())
            }
            _ => CameraError::Io(err),
        })?;

        let mut frames = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && has_frame_extension(&path) {
                frames.push(path);
            }
        }
        frames.sort();

        if frames.is_empty() {
            return Err(CameraError::NotFound(format!(
                "{} contains no frames",
                self.dir.display()
            )));
        }
        Ok(frames)
    }
}

fn has_frame_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            FRAME_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

impl CameraDevice for FrameDirectoryCamera {
    fn open(&self) -> Result<Box<dyn FrameStream>, CameraError> {
        let frames = self.list_frames()?;
        self.open_streams.fetch_add(1, Ordering::SeqCst);
        log_debug!(
            "camera opened on {} ({} frames)",
            self.dir.display(),
            frames.len()
        );
        Ok(Box::new(DirectoryStream {
            frames,
            next: 0,
            open_streams: Arc::clone(&self.open_streams),
        }))
    }
}

struct DirectoryStream {
    frames: Vec<PathBuf>,
    next: usize,
    open_streams: Arc<AtomicUsize>,
}

impl FrameStream for DirectoryStream {
    fn grab(&mut self) -> Result<DynamicImage, CameraError> {
        let path = &self.frames[self.next % self.frames.len()];
        self.next = (self.next + 1) % self.frames.len();
        Ok(image::open(path)?)
    }
}

impl Drop for DirectoryStream {
    fn drop(&mut self) {
        self.open_streams.fetch_sub(1, Ordering::SeqCst);
        log_debug!("camera released");
    }
}
