//! OpenAPI documentation for the classification API.
//!
//! Served as JSON at `/api-docs/openapi.json` and rendered with Scalar at `/docs`.

use utoipa::OpenApi;

use crate::api;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "ewsort",
        description = "Quality-check and classify photos of electronic waste as sellable, repairable, recyclable or hazardous."
    ),
    paths(api::handlers::classify::classify_image),
    components(schemas(
        api::models::classify::ClassificationResponse,
        api::models::classify::ErrorResponse,
        api::models::classify::ClassifyUpload,
    )),
    tags((name = "classification", description = "E-waste image classification"))
)]
pub struct ApiDoc;
