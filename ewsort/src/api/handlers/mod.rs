//! HTTP request handlers.
//!
//! - [`classify`]: image upload, quality checks and classification

pub mod classify;
