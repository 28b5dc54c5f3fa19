//! Test utilities shared by unit and integration tests.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use axum_test::TestServer;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use url::Url;

use crate::classifier::ClassifyImage;
use crate::config::{Config, GeminiConfig, UploadConfig, UploadMode};
use crate::errors::Result;

/// reqwest is built without a default TLS provider; install one once per test binary.
fn install_crypto_provider() {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

pub fn test_gemini_config(base_url: Url) -> GeminiConfig {
    install_crypto_provider();
    GeminiConfig {
        api_key: Some("test-key".to_string()),
        base_url,
        request_timeout: Duration::from_secs(5),
        ..Default::default()
    }
}

pub fn create_test_config(gemini_base_url: &str, upload_dir: &Path) -> Config {
    Config {
        enable_metrics: false,
        upload: UploadConfig {
            dir: upload_dir.to_path_buf(),
            mode: UploadMode::Buffered,
            max_body_size: None,
        },
        gemini: test_gemini_config(Url::parse(gemini_base_url).expect("mock server uri is a valid URL")),
        ..Default::default()
    }
}

pub async fn create_test_app(config: Config) -> TestServer {
    crate::Application::new(config)
        .await
        .expect("Failed to create application")
        .into_test_server()
}

/// A `generateContent` response with a single text candidate
pub fn gemini_response(text: &str) -> serde_json::Value {
    serde_json::json!({
        "candidates": [{
            "content": {
                "parts": [{ "text": text }],
                "role": "model"
            },
            "finishReason": "STOP",
            "index": 0
        }],
        "usageMetadata": {
            "promptTokenCount": 350,
            "candidatesTokenCount": 42,
            "totalTokenCount": 392
        },
        "modelVersion": "gemini-2.0-flash"
    })
}

/// Encode a flat-colour image of the given size
pub fn encode_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let rgb = RgbImage::from_pixel(width, height, Rgb([90, 140, 60]));
    let image = match format {
        ImageFormat::Gif => DynamicImage::ImageRgba8(DynamicImage::ImageRgb8(rgb).to_rgba8()),
        _ => DynamicImage::ImageRgb8(rgb),
    };

    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, format).expect("Failed to encode test image");
    buf.into_inner()
}

pub fn write_fixture(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).expect("Failed to write fixture");
    path
}

/// Number of entries left in a directory
pub fn dir_entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

/// Classifier returning a fixed answer and recording the MIME types it was called with
pub struct StaticClassifier {
    answer: String,
    seen: Mutex<Vec<String>>,
}

impl StaticClassifier {
    pub fn new(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn seen_mime_types(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClassifyImage for StaticClassifier {
    async fn classify(&self, _image: &[u8], mime_type: &str) -> Result<String> {
        self.seen.lock().unwrap().push(mime_type.to_string());
        Ok(self.answer.clone())
    }
}
