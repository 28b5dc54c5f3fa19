//! # ewsort: e-waste photo classification service
//!
//! `ewsort` is a small HTTP service that takes a photo of a discarded electronic item, checks
//! that the photo is usable, and asks a generative-AI model whether the item is best sold,
//! repaired, recycled or treated as hazardous waste.
//!
//! ## Request Flow
//!
//! A `POST /classify` request moves through five steps, strictly in order:
//!
//! 1. **Upload intake** ([`upload`]): the `image` field of the multipart body is written to a
//!    uniquely named file in the upload directory, either buffered in memory first or streamed
//!    chunk by chunk ([`config::UploadMode`]).
//! 2. **Validation** ([`validation`]): the image header is probed for width, height and format,
//!    and the file size is checked. Rejections carry a human-readable reason.
//! 3. **Classification** ([`classifier`]): the bytes are base64-encoded and sent inline, together
//!    with a fixed prompt, to Gemini's `generateContent`.
//! 4. **Extraction**: the first text part of the first candidate becomes the classification, or a
//!    placeholder if the model returned none.
//! 5. **Cleanup**: the stored file is removed before the JSON response is sent. On failure paths
//!    the [`upload::UploadedImage`] guard removes it when dropped.
//!
//! Every failure becomes `400 {"error": "<message>"}` (see [`errors`]).
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use ewsort::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = ewsort::config::Args::parse();
//!     let config = Config::load(&args)?;
//!     ewsort::telemetry::init_telemetry(config.log_format)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await
//! }
//! ```
pub mod api;
pub mod classifier;
pub mod config;
pub mod errors;
mod metrics;
mod openapi;
pub mod telemetry;
pub mod upload;
pub mod validation;

#[cfg(test)]
pub mod test_utils;

use std::path::Path;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::{Json, Router, routing::get, routing::post};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
pub use config::Config;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::classifier::{ClassifyImage, GeminiClassifier};
use crate::openapi::ApiDoc;

/// Application state shared across all request handlers.
///
/// The classifier is built once at startup from configuration and handed to handlers through
/// this struct rather than living in a global.
///
/// ```ignore
/// let state = AppState::builder()
///     .config(config)
///     .classifier(Arc::new(GeminiClassifier::new(&config.gemini)?))
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub classifier: Arc<dyn ClassifyImage>,
}

/// Build the application router.
///
/// - `POST /classify` with the body limit from `upload.max_body_size` (none by default)
/// - `GET /healthz`
/// - OpenAPI document and Scalar UI
/// - Prometheus metrics at `/internal/metrics` when enabled
/// - Tracing middleware
#[instrument(skip_all)]
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let body_limit = match state.config.upload.max_body_size {
        Some(limit) => DefaultBodyLimit::max(limit),
        None => DefaultBodyLimit::disable(),
    };

    let enable_metrics = state.config.enable_metrics;

    let mut router = Router::new()
        .route("/classify", post(api::handlers::classify::classify_image).layer(body_limit))
        .route("/healthz", get(|| async { "OK" }))
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .with_state(state);

    if enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/internal/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// Build the shared state for a validated configuration.
async fn build_state(config: Config) -> anyhow::Result<AppState> {
    upload::ensure_upload_dir(&config.upload.dir).await?;
    let classifier = GeminiClassifier::new(&config.gemini)?;

    Ok(AppState::builder().classifier(Arc::new(classifier)).config(config).build())
}

/// Classify a single image from the local filesystem, bypassing HTTP.
///
/// The same quality checks apply as for uploads. The file is only read, never removed.
pub async fn classify_local_file(config: Config, path: &Path) -> anyhow::Result<String> {
    let classifier = GeminiClassifier::new(&config.gemini)?;
    let text = api::handlers::classify::classify_stored_image(&classifier, &config.validation, path, None).await?;
    Ok(text)
}

/// Main application struct owning the router and its state.
///
/// 1. **Create**: [`Application::new`] prepares the upload directory and the classifier
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and starts handling requests
/// 3. **Shutdown**: When the shutdown signal is received, in-flight requests finish and the
///    server stops
pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!(
            upload_dir = %config.upload.dir.display(),
            upload_mode = ?config.upload.mode,
            model = %config.gemini.model,
            "Starting classification service"
        );

        let state = build_state(config.clone()).await?;
        let router = build_router(state)?;

        Ok(Self { router, config })
    }

    /// Build an application around a caller-supplied classifier
    pub async fn with_classifier(config: Config, classifier: Arc<dyn ClassifyImage>) -> anyhow::Result<Self> {
        upload::ensure_upload_dir(&config.upload.dir).await?;
        let state = AppState::builder().classifier(classifier).config(config.clone()).build();
        let router = build_router(state)?;

        Ok(Self { router, config })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "Classification service listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Server stopped");
        Ok(())
    }
}
