use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// The multipart form had no `image` field
    #[error("No file uploaded")]
    MissingUpload,

    /// Either dimension is below the configured minimum
    #[error("Image resolution is too low. Minimum {min_width}x{min_height} required.")]
    ImageTooSmall {
        width: u32,
        height: u32,
        min_width: u32,
        min_height: u32,
    },

    /// Decoded format is not JPEG or PNG
    #[error("Invalid image format. Only JPEG and PNG are supported.")]
    UnsupportedFormat { format: String },

    /// File on disk is larger than the configured limit
    #[error("File size exceeds {} limit.", display_size(.limit))]
    FileTooLarge { size: u64, limit: u64 },

    /// The stored upload could not be parsed as an image
    #[error("Failed to decode image: {message}")]
    DecodeFailure { message: String },

    /// The classification service returned an error or could not be reached
    #[error("Classification request failed: {message}")]
    UpstreamFailure { message: String },

    /// The classification service did not answer within the configured timeout
    #[error("Classification request timed out after {}s", .timeout.as_secs())]
    UpstreamTimeout { timeout: std::time::Duration },

    /// Malformed request, e.g. an unparseable multipart body
    #[error("{message}")]
    BadRequest { message: String },

    /// Local file handling for the temp upload failed
    #[error("Failed to {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Every failure surfaces as a client error with its message text.
    pub fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }

    /// Short label used for metrics and structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            Error::MissingUpload => "missing_upload",
            Error::ImageTooSmall { .. } => "image_too_small",
            Error::UnsupportedFormat { .. } => "unsupported_format",
            Error::FileTooLarge { .. } => "file_too_large",
            Error::DecodeFailure { .. } => "decode_failure",
            Error::UpstreamFailure { .. } => "upstream_failure",
            Error::UpstreamTimeout { .. } => "upstream_timeout",
            Error::BadRequest { .. } => "bad_request",
            Error::Io { .. } => "io",
        }
    }

    /// Returns a user-safe error message, without leaking local paths or OS errors
    pub fn user_message(&self) -> String {
        match self {
            Error::Io { operation, .. } => format!("Failed to {operation}"),
            other => other.to_string(),
        }
    }

    pub(crate) fn io(operation: impl Into<String>) -> impl FnOnce(std::io::Error) -> Self {
        let operation = operation.into();
        move |source| Error::Io { operation, source }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match &self {
            Error::Io { .. } => {
                tracing::error!(kind = self.kind(), "Internal error while handling upload: {:#}", self);
            }
            Error::UpstreamFailure { .. } | Error::UpstreamTimeout { .. } => {
                tracing::warn!(kind = self.kind(), "Upstream classification error: {}", self);
            }
            _ => {
                tracing::debug!(kind = self.kind(), "Client error: {}", self);
            }
        }

        let status = self.status_code();
        (status, Json(json!({ "error": self.user_message() }))).into_response()
    }
}

/// Whole mebibytes render as `15MB`, anything else as an exact byte count.
fn display_size(bytes: &u64) -> String {
    const MIB: u64 = 1024 * 1024;
    if bytes % MIB == 0 {
        format!("{}MB", bytes / MIB)
    } else {
        format!("{bytes} byte")
    }
}

/// Type alias for request handling results
pub type Result<T> = std::result::Result<T, Error>;
