use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::DynamicImage;

use crate::errors::{DeskPilotError, DeskPilotResult};
use crate::perception::preprocess;
use crate::perception::types::Dimensions;

/// A captured frame plus the logical size of the screen it came from.
pub struct Screenshot {
    pub image: DynamicImage,
    /// `None` when the frame did not come from a live display.
    pub screen_dimensions: Option<Dimensions>,
}

impl Screenshot {
    pub fn image_dimensions(&self) -> Dimensions {
        Dimensions::new(self.image.width(), self.image.height())
    }

    pub fn encode_png(&self) -> DeskPilotResult<Vec<u8>> {
        let mut buf = Cursor::new(Vec::new());
        self.image
            .write_to(&mut buf, image::ImageFormat::Png)
            .map_err(|e| DeskPilotError::Capture(format!("PNG encode: {e}")))?;
        Ok(buf.into_inner())
    }
}

/// Where cycle frames come from.
pub trait ScreenSource {
    fn describe(&self) -> String;

    fn capture(&self) -> DeskPilotResult<Screenshot>;
}

/// The primary monitor via xcap. Falls back to the first monitor when none
/// reports itself as primary.
#[derive(Debug, Default)]
pub struct PrimaryMonitor;

impl ScreenSource for PrimaryMonitor {
    fn describe(&self) -> String {
        "primary monitor".into()
    }

    fn capture(&self) -> DeskPilotResult<Screenshot> {
        let monitors = xcap::Monitor::all()
            .map_err(|e| DeskPilotError::Capture(format!("enumerate monitors: {e}")))?;
        let monitor = monitors
            .iter()
            .find(|m| m.is_primary())
            .or_else(|| monitors.first())
            .ok_or_else(|| DeskPilotError::Capture("no monitors found".into()))?;

        let frame = monitor
            .capture_image()
            .map_err(|e| DeskPilotError::Capture(format!("capture: {e}")))?;
        let screen = Dimensions::new(monitor.width(), monitor.height());

        tracing::info!(
            monitor = %monitor.name(),
            screen_w = screen.width,
            screen_h = screen.height,
            image_w = frame.width(),
            image_h = frame.height(),
            "screenshot captured"
        );

        // xcap links an older `image` crate; rebuild the buffer in our version.
        let (frame_w, frame_h) = (frame.width(), frame.height());
        let frame = image::RgbaImage::from_raw(frame_w, frame_h, frame.into_raw())
            .ok_or_else(|| DeskPilotError::Capture("capture: invalid frame buffer".into()))?;

        Ok(Screenshot {
            image: DynamicImage::ImageRgba8(frame),
            screen_dimensions: Some(screen),
        })
    }
}

/// A screenshot read from disk; coordinates are taken to be in image space.
#[derive(Debug, Clone)]
pub struct ImageFile {
    path: PathBuf,
}

impl ImageFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ScreenSource for ImageFile {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn capture(&self) -> DeskPilotResult<Screenshot> {
        let image = preprocess::load(&self.path)?;
        tracing::info!(
            path = %self.path.display(),
            width = image.width(),
            height = image.height(),
            "screenshot loaded from file"
        );
        Ok(Screenshot {
            image,
            screen_dimensions: None,
        })
    }
}
