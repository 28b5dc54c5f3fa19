use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Successful classification result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ClassificationResponse {
    /// Free-text category and rationale from the model, or `No response from AI`
    #[schema(example = "Recyclable: the casing is cracked but the copper and aluminium can be recovered.")]
    pub classification: String,
}

/// Body returned with every 400 response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(example = "Image resolution is too low. Minimum 100x100 required.")]
    pub error: String,
}

/// Multipart form accepted by `POST /classify` (documentation only)
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct ClassifyUpload {
    /// JPEG or PNG photo, at least 100x100 pixels and at most 15 MiB
    #[schema(value_type = String, format = Binary)]
    pub image: Vec<u8>,
}
