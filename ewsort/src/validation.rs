//! Image quality checks run against a stored upload before it is sent for classification.
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. header decode, then minimum width/height
//! 2. format must be JPEG or PNG
//! 3. file size must not exceed the configured limit
//!
//! Only the image header is read, so a large file is rejected for its size without ever being
//! decoded in full. The probe never modifies or deletes the file.

use std::path::{Path, PathBuf};

use image::{ImageFormat, ImageReader};
use tracing::{debug, instrument};

use crate::config::ValidationConfig;
use crate::errors::{Error, Result};

/// What the probe learned about an accepted image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageReport {
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
    pub size: u64,
}

impl ImageReport {
    /// MIME type matching the decoded format
    pub fn mime_type(&self) -> &'static str {
        self.format.to_mime_type()
    }
}

/// Run the checks on the blocking thread pool.
pub async fn inspect_file(path: PathBuf, config: ValidationConfig) -> Result<ImageReport> {
    tokio::task::spawn_blocking(move || inspect(&path, &config))
        .await
        .map_err(|e| Error::io("inspect uploaded image")(std::io::Error::other(e)))?
}

/// Probe an image file and apply the quality policy.
#[instrument(skip(config), fields(path = %path.display()))]
pub fn inspect(path: &Path, config: &ValidationConfig) -> Result<ImageReport> {
    let reader = ImageReader::open(path)
        .map_err(Error::io("open uploaded image"))?
        .with_guessed_format()
        .map_err(Error::io("read uploaded image"))?;

    let format = reader.format().ok_or_else(|| Error::DecodeFailure {
        message: "unrecognized image data".to_string(),
    })?;

    let (width, height) = reader.into_dimensions().map_err(|e| Error::DecodeFailure { message: e.to_string() })?;

    debug!(width, height, ?format, "Decoded image header");

    if width < config.min_width || height < config.min_height {
        return Err(Error::ImageTooSmall {
            width,
            height,
            min_width: config.min_width,
            min_height: config.min_height,
        });
    }

    if !matches!(format, ImageFormat::Jpeg | ImageFormat::Png) {
        return Err(Error::UnsupportedFormat {
            format: format!("{format:?}").to_lowercase(),
        });
    }

    let size = std::fs::metadata(path).map_err(Error::io("read uploaded image"))?.len();
    if size > config.max_file_size {
        return Err(Error::FileTooLarge {
            size,
            limit: config.max_file_size,
        });
    }

    Ok(ImageReport {
        width,
        height,
        format,
        size,
    })
}
