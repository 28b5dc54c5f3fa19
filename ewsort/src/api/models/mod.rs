//! API request and response data models.
//!
//! These define the public JSON contract and are annotated with `utoipa` for the OpenAPI
//! document served at `/api-docs/openapi.json`.

pub mod classify;
