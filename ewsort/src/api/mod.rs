//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers
//! - **[`models`]**: Request/response data structures
//!
//! API documentation is available at `/docs` when the server is running.

pub mod handlers;
pub mod models;
