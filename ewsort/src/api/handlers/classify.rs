use std::path::Path;
use std::time::Instant;

use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartRejection},
};
use tracing::{info, instrument};

use crate::AppState;
use crate::api::models::classify::{ClassificationResponse, ClassifyUpload, ErrorResponse};
use crate::classifier::ClassifyImage;
use crate::config::ValidationConfig;
use crate::errors::{Error, Result};
use crate::{metrics, upload, validation};

#[utoipa::path(
    post,
    path = "/classify",
    tag = "classification",
    summary = "Classify e-waste photo",
    description = "Upload a photo of a discarded electronic item as the `image` field of a multipart form. \
The photo is checked (JPEG or PNG, at least 100x100 pixels, at most 15 MiB) and then classified as \
sellable, repairable, recyclable or hazardous, with a short rationale.",
    request_body(content = ClassifyUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Image classified", body = ClassificationResponse),
        (status = 400, description = "Missing upload, image rejected by quality checks, or classification failed", body = ErrorResponse),
    )
)]
pub async fn classify_image(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<ClassificationResponse>> {
    let outcome = match multipart {
        Ok(mut multipart) => handle_upload(&state, &mut multipart).await,
        // Not a multipart body at all, so there is no file either
        Err(rejection) => {
            tracing::debug!("Rejected non-multipart body: {}", rejection);
            Err(Error::MissingUpload)
        }
    };

    metrics::record_classification(match &outcome {
        Ok(_) => "success",
        Err(e) => e.kind(),
    });

    outcome.map(Json)
}

#[instrument(skip_all, fields(upload_id = tracing::field::Empty))]
async fn handle_upload(state: &AppState, multipart: &mut Multipart) -> Result<ClassificationResponse> {
    let upload = upload::receive_image(multipart, &state.config.upload).await?;
    tracing::Span::current().record("upload_id", tracing::field::display(upload.id()));

    let classification = classify_stored_image(
        state.classifier.as_ref(),
        &state.config.validation,
        upload.path(),
        upload.declared_mime(),
    )
    .await?;

    info!(
        size = upload.size(),
        original_name = upload.original_name().unwrap_or_default(),
        "Upload classified"
    );

    // Removed before responding; earlier returns rely on the guard's drop
    upload.remove()?;

    Ok(ClassificationResponse { classification })
}

/// Validate a stored image, then send it for classification.
///
/// `declared_mime` is forwarded when it names an image type; otherwise the MIME type of the
/// decoded format is used.
pub async fn classify_stored_image(
    classifier: &dyn ClassifyImage,
    config: &ValidationConfig,
    path: &Path,
    declared_mime: Option<&str>,
) -> Result<String> {
    let report = validation::inspect_file(path.to_path_buf(), config.clone()).await?;

    let bytes = tokio::fs::read(path).await.map_err(Error::io("read uploaded image"))?;
    let mime_type = declared_mime
        .filter(|mime| mime.starts_with("image/"))
        .unwrap_or_else(|| report.mime_type());

    info!(
        width = report.width,
        height = report.height,
        size = report.size,
        mime_type,
        "Image passed quality checks"
    );

    let started = Instant::now();
    let result = classifier.classify(&bytes, mime_type).await;
    metrics::record_upstream_latency(started.elapsed());

    result
}
