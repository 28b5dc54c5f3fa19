//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `EWSORT_CONFIG`
//! environment variable. A missing file is not an error: every field has a default except the
//! Gemini API key.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `EWSORT_` override YAML values
//! 3. **GOOGLE_API_KEY** - Special case: sets `gemini.api_key` if present
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `EWSORT_UPLOAD__MODE=streaming` sets the `upload.mode` field.
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! # The only required value
//! GOOGLE_API_KEY="AIza..."
//!
//! # Override server port
//! EWSORT_PORT=8080
//!
//! # Stream uploads straight to disk instead of buffering them in memory
//! EWSORT_UPLOAD__MODE=streaming
//!
//! # Give the model less time to answer
//! EWSORT_GEMINI__REQUEST_TIMEOUT=20s
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};
use url::Url;

/// CLI args: config file location plus two one-shot modes
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "EWSORT_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,

    /// Classify a single local image, print the result and exit without starting the server.
    #[arg(long, value_name = "PATH")]
    pub classify: Option<PathBuf>,
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Console log output format
    pub log_format: LogFormat,
    /// Expose Prometheus metrics at `/internal/metrics`
    pub enable_metrics: bool,
    /// Where and how uploads are written to disk
    pub upload: UploadConfig,
    /// Image quality thresholds
    pub validation: ValidationConfig,
    /// Generative-AI service used for classification
    pub gemini: GeminiConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// How the `image` field of the multipart body reaches the disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadMode {
    /// Read the whole field into memory, then write it out in one go
    #[default]
    Buffered,
    /// Write each chunk to disk as it arrives
    Streaming,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadConfig {
    /// Directory holding in-flight uploads. Created on startup if missing.
    pub dir: PathBuf,
    pub mode: UploadMode,
    /// Optional cap on the request body in bytes. Unset means no limit at intake; size policy
    /// is enforced by the validator once the file is on disk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_body_size: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidationConfig {
    /// Minimum accepted width in pixels
    pub min_width: u32,
    /// Minimum accepted height in pixels
    pub min_height: u32,
    /// Maximum accepted file size in bytes
    pub max_file_size: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeminiConfig {
    /// API key for the Generative Language API. Usually supplied through `GOOGLE_API_KEY`.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Base URL of the Generative Language API
    pub base_url: Url,
    /// Model used for `generateContent`
    pub model: String,
    /// Upper bound on a single classification call
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_format: LogFormat::default(),
            enable_metrics: true,
            upload: UploadConfig::default(),
            validation: ValidationConfig::default(),
            gemini: GeminiConfig::default(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("uploads"),
            mode: UploadMode::default(),
            max_body_size: None,
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_width: 100,
            min_height: 100,
            max_file_size: 15 * 1024 * 1024, // 15 MiB
        }
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: Url::parse("https://generativelanguage.googleapis.com").expect("static URL is valid"),
            model: "gemini-2.0-flash".to_string(),
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl GeminiConfig {
    /// Configured API key; an empty string counts as unset
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|key| !key.is_empty())
    }
}

impl Config {
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(figment::Error::from)?;
        Ok(config)
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values
            .merge(Env::prefixed("EWSORT_").ignore(&["config"]).split("__"))
            // The conventional variable name for Google AI keys
            .merge(Env::raw().only(&["GOOGLE_API_KEY"]).map(|_| "gemini.api_key".into()))
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), String> {
        if self.gemini.api_key().is_none() {
            return Err("Config validation: no Gemini API key configured. \
                 Please set the GOOGLE_API_KEY environment variable or add gemini.api_key to the config file."
                .to_string());
        }

        if self.gemini.model.trim().is_empty() {
            return Err("Config validation: gemini.model cannot be empty".to_string());
        }

        if self.gemini.request_timeout.is_zero() {
            return Err("Config validation: gemini.request_timeout must be greater than zero".to_string());
        }

        if self.validation.min_width == 0 || self.validation.min_height == 0 {
            return Err("Config validation: validation.min_width and validation.min_height must be at least 1".to_string());
        }

        if self.validation.max_file_size == 0 {
            return Err("Config validation: validation.max_file_size must be greater than zero".to_string());
        }

        if let Some(limit) = self.upload.max_body_size
            && (limit as u64) < self.validation.max_file_size
        {
            return Err(format!(
                "Config validation: upload.max_body_size ({limit}) is smaller than validation.max_file_size ({}); \
                 oversized files would be cut off before they can be rejected with a clear message",
                self.validation.max_file_size
            ));
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
