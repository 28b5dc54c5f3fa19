//! Upload intake: moves the `image` field of a multipart body into a uniquely named file in the
//! upload directory.
//!
//! The stored file is owned by an [`UploadedImage`], which removes it when dropped. Handlers can
//! therefore bail out with `?` at any point after intake without leaking files into the upload
//! directory.

use std::path::{Path, PathBuf};

use axum::extract::{Multipart, multipart::Field};
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::config::{UploadConfig, UploadMode};
use crate::errors::{Error, Result};

/// Name of the multipart field carrying the image
pub const IMAGE_FIELD: &str = "image";

/// A single request's image, persisted to disk for the lifetime of this value.
#[derive(Debug)]
pub struct UploadedImage {
    id: Uuid,
    path: TempPath,
    size: u64,
    declared_mime: Option<String>,
    original_name: Option<String>,
}

impl UploadedImage {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes written to disk
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Content type sent by the client for the part, if any
    pub fn declared_mime(&self) -> Option<&str> {
        self.declared_mime.as_deref()
    }

    /// Client-supplied filename. Only used for logging, never for paths.
    pub fn original_name(&self) -> Option<&str> {
        self.original_name.as_deref()
    }

    /// Delete the file now, reporting failures. Dropping the value also deletes it, but silently.
    pub fn remove(self) -> Result<()> {
        let id = self.id;
        self.path.close().map_err(Error::io("remove uploaded image"))?;
        debug!(upload_id = %id, "Removed uploaded image");
        Ok(())
    }
}

/// Create the upload directory if it does not exist yet.
pub async fn ensure_upload_dir(dir: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create upload directory {}: {}", dir.display(), e))?;
    Ok(())
}

/// Find the `image` file part and persist it.
///
/// Parts with other names, and `image` parts without a filename (plain form values), are
/// skipped. A second `image` file part is rejected.
#[instrument(skip_all)]
pub async fn receive_image(multipart: &mut Multipart, config: &UploadConfig) -> Result<UploadedImage> {
    let mut upload = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| Error::BadRequest {
        message: format!("Failed to parse multipart data: {}", e),
    })? {
        if field.name() != Some(IMAGE_FIELD) || field.file_name().is_none() {
            debug!(field = ?field.name(), "Skipping multipart field");
            continue;
        }

        if upload.is_some() {
            return Err(Error::BadRequest {
                message: "Only one image may be uploaded per request".to_string(),
            });
        }

        upload = Some(store_field(field, config).await?);
    }

    upload.ok_or(Error::MissingUpload)
}

async fn store_field(field: Field<'_>, config: &UploadConfig) -> Result<UploadedImage> {
    let id = Uuid::new_v4();
    let declared_mime = field.content_type().map(str::to_owned);
    let original_name = field.file_name().map(str::to_owned);

    // Take ownership of the path before anything is written so partial files are removed too
    let path = TempPath::from_path(upload_path(&config.dir, id));

    info!(
        upload_id = %id,
        original_name = ?original_name,
        declared_mime = ?declared_mime,
        mode = ?config.mode,
        "Receiving image upload"
    );

    let size = match config.mode {
        UploadMode::Buffered => write_buffered(field, &path).await?,
        UploadMode::Streaming => write_streaming(field, &path).await?,
    };

    debug!(upload_id = %id, size, path = %path.display(), "Stored image upload");

    Ok(UploadedImage {
        id,
        path,
        size,
        declared_mime,
        original_name,
    })
}

fn upload_path(dir: &Path, id: Uuid) -> PathBuf {
    dir.join(format!("{id}.upload"))
}

async fn write_buffered(field: Field<'_>, path: &Path) -> Result<u64> {
    let data = field.bytes().await.map_err(|e| Error::BadRequest {
        message: format!("Failed to read uploaded file: {}", e),
    })?;

    tokio::fs::write(path, &data).await.map_err(Error::io("store uploaded image"))?;
    Ok(data.len() as u64)
}

async fn write_streaming(mut field: Field<'_>, path: &Path) -> Result<u64> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
        .map_err(Error::io("store uploaded image"))?;

    let mut total_size = 0u64;
    while let Some(chunk) = field.chunk().await.map_err(|e| Error::BadRequest {
        message: format!("Failed to read file chunk: {}", e),
    })? {
        total_size += chunk.len() as u64;
        file.write_all(&chunk).await.map_err(Error::io("store uploaded image"))?;
    }

    file.flush().await.map_err(Error::io("store uploaded image"))?;
    Ok(total_size)
}
