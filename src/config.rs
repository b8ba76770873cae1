//! Configuration management for the image relay.
//!
//! This module provides a configuration system that supports:
//! - Command-line arguments via clap
//! - Environment variables with `RELAY_` prefix
//! - Sensible defaults for all optional settings
//!
//! # Environment Variables
//!
//! - `RELAY_HOST` - Server bind address (default: 0.0.0.0)
//! - `RELAY_PORT` - Server port (default: 5000)
//! - `RELAY_STORAGE_URL` - Storage project URL (required)
//! - `RELAY_STORAGE_API_KEY` - Storage project API key (required)
//! - `RELAY_STORAGE_BUCKET` - Bucket for per-user images (default: user-images)
//! - `RELAY_UPLOAD_CACHE_MAX_AGE` - Cache-Control max-age for stored images (default: 3600)
//! - `RELAY_REPLICATE_API_TOKEN` - Replicate API token (required)
//! - `RELAY_GEMINI_API_KEY` - Gemini API key (required)
//! - `RELAY_GOOGLE_CLIENT_ID` / `RELAY_GOOGLE_CLIENT_SECRET` - Enable the OAuth relay
//! - `RELAY_BACKEND_URL` / `RELAY_FRONTEND_URL` - Public URLs used by the OAuth relay
//! - `RELAY_PROBE_TIMEOUT`, `RELAY_GENERATION_TIMEOUT`, `RELAY_PUBLISH_TIMEOUT` - Stage deadlines in seconds

use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use url::Url;

use crate::generation::{
    DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL, DEFAULT_REPLICATE_BASE_URL,
    DEFAULT_REPLICATE_MODEL,
};
use crate::photos::DEFAULT_PHOTOS_BASE_URL;
use crate::pipeline::StageTimeouts;
use crate::publish::DEFAULT_UPLOAD_CACHE_MAX_AGE;
use crate::server::DEFAULT_BODY_LIMIT;

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 5000;

/// Default storage bucket.
pub const DEFAULT_BUCKET: &str = "user-images";

/// Default public URL of this backend.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:5000";

/// Default frontend URL.
pub const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";

/// Default outbound connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Image relay - authenticated image transformation backend.
///
/// Relays prompts to image generation providers and publishes the results
/// into per-user object storage.
#[derive(Parser, Debug, Clone)]
#[command(name = "image-relay")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Consume the CLI and return the selected command.
    pub fn into_command(self) -> Command {
        self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the HTTP server.
    Serve(ServeConfig),

    /// Check storage configuration and connectivity.
    Check(CheckConfig),
}

/// Options for the `serve` command.
#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "RELAY_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "RELAY_PORT")]
    pub port: u16,

    /// Maximum request body size in bytes.
    #[arg(long, default_value_t = DEFAULT_BODY_LIMIT, env = "RELAY_BODY_LIMIT")]
    pub body_limit: usize,

    // =========================================================================
    // Storage Configuration
    // =========================================================================
    /// Storage project URL.
    #[arg(long, env = "RELAY_STORAGE_URL")]
    pub storage_url: Url,

    /// Storage project API key (sent alongside the caller's token).
    #[arg(long, env = "RELAY_STORAGE_API_KEY", hide_env_values = true)]
    pub storage_api_key: String,

    /// Bucket holding per-user images.
    #[arg(long, default_value = DEFAULT_BUCKET, env = "RELAY_STORAGE_BUCKET")]
    pub storage_bucket: String,

    /// Cache-Control max-age in seconds for stored images.
    #[arg(long, default_value_t = DEFAULT_UPLOAD_CACHE_MAX_AGE, env = "RELAY_UPLOAD_CACHE_MAX_AGE")]
    pub upload_cache_max_age: u32,

    // =========================================================================
    // Provider Configuration
    // =========================================================================
    /// Replicate API token.
    #[arg(long, env = "RELAY_REPLICATE_API_TOKEN", hide_env_values = true)]
    pub replicate_api_token: Option<String>,

    /// Replicate model used for image transformation.
    #[arg(long, default_value = DEFAULT_REPLICATE_MODEL, env = "RELAY_REPLICATE_MODEL")]
    pub replicate_model: String,

    /// Replicate API base URL.
    #[arg(long, default_value = DEFAULT_REPLICATE_BASE_URL, env = "RELAY_REPLICATE_BASE_URL")]
    pub replicate_base_url: Url,

    /// Gemini API key.
    #[arg(long, env = "RELAY_GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    /// Gemini model used for text-to-image generation.
    #[arg(long, default_value = DEFAULT_GEMINI_MODEL, env = "RELAY_GEMINI_MODEL")]
    pub gemini_model: String,

    /// Gemini API base URL.
    #[arg(long, default_value = DEFAULT_GEMINI_BASE_URL, env = "RELAY_GEMINI_BASE_URL")]
    pub gemini_base_url: Url,

    // =========================================================================
    // Google Photos / OAuth Configuration
    // =========================================================================
    /// Photos Library API base URL.
    #[arg(long, default_value = DEFAULT_PHOTOS_BASE_URL, env = "RELAY_PHOTOS_BASE_URL")]
    pub photos_base_url: Url,

    /// Google OAuth client id. The OAuth relay is disabled without it.
    #[arg(long, env = "RELAY_GOOGLE_CLIENT_ID")]
    pub google_client_id: Option<String>,

    /// Google OAuth client secret.
    #[arg(long, env = "RELAY_GOOGLE_CLIENT_SECRET", hide_env_values = true)]
    pub google_client_secret: Option<String>,

    /// Public URL of this backend, used to build the OAuth callback URL.
    #[arg(long, default_value = DEFAULT_BACKEND_URL, env = "RELAY_BACKEND_URL")]
    pub backend_url: Url,

    /// Frontend URL the OAuth callback redirects to.
    #[arg(long, default_value = DEFAULT_FRONTEND_URL, env = "RELAY_FRONTEND_URL")]
    pub frontend_url: Url,

    // =========================================================================
    // Timeouts
    // =========================================================================
    /// Storage probe deadline in seconds.
    #[arg(long, default_value_t = 10, env = "RELAY_PROBE_TIMEOUT")]
    pub probe_timeout: u64,

    /// Generation deadline in seconds (provider call, polling and download).
    #[arg(long, default_value_t = 120, env = "RELAY_GENERATION_TIMEOUT")]
    pub generation_timeout: u64,

    /// Storage write deadline in seconds.
    #[arg(long, default_value_t = 30, env = "RELAY_PUBLISH_TIMEOUT")]
    pub publish_timeout: u64,

    /// Outbound connect timeout in seconds.
    #[arg(long, default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS, env = "RELAY_CONNECT_TIMEOUT")]
    pub connect_timeout: u64,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "RELAY_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.storage_api_key.is_empty() {
            return Err(
                "Storage API key is required. Set --storage-api-key or RELAY_STORAGE_API_KEY"
                    .to_string(),
            );
        }

        if self.storage_bucket.is_empty() {
            return Err(
                "Storage bucket name is required. Set --storage-bucket or RELAY_STORAGE_BUCKET"
                    .to_string(),
            );
        }

        if self.replicate_api_token.as_deref().map_or(true, str::is_empty) {
            return Err(
                "Replicate API token is required. Set --replicate-api-token or RELAY_REPLICATE_API_TOKEN"
                    .to_string(),
            );
        }

        if self.gemini_api_key.as_deref().map_or(true, str::is_empty) {
            return Err(
                "Gemini API key is required. Set --gemini-api-key or RELAY_GEMINI_API_KEY"
                    .to_string(),
            );
        }

        if self.google_client_id.is_some() != self.google_client_secret.is_some() {
            return Err(
                "Google OAuth needs both --google-client-id and --google-client-secret".to_string(),
            );
        }

        if self.probe_timeout == 0 || self.generation_timeout == 0 || self.publish_timeout == 0 {
            return Err("Stage timeouts must be greater than 0".to_string());
        }

        if self.body_limit < 1024 {
            return Err("body_limit must be at least 1KB".to_string());
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Per-stage deadlines.
    pub fn stage_timeouts(&self) -> StageTimeouts {
        StageTimeouts {
            probe: Duration::from_secs(self.probe_timeout),
            generation: Duration::from_secs(self.generation_timeout),
            publish: Duration::from_secs(self.publish_timeout),
        }
    }

    /// Client id and secret, when the OAuth relay is configured.
    pub fn google_credentials(&self) -> Option<(&str, &str)> {
        match (&self.google_client_id, &self.google_client_secret) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => {
                Some((id.as_str(), secret.as_str()))
            }
            _ => None,
        }
    }
}

/// Options for the `check` command.
#[derive(Args, Debug, Clone)]
pub struct CheckConfig {
    /// Storage project URL.
    #[arg(long, env = "RELAY_STORAGE_URL")]
    pub storage_url: Url,

    /// Storage project API key.
    #[arg(long, env = "RELAY_STORAGE_API_KEY", hide_env_values = true)]
    pub storage_api_key: String,

    /// Bucket holding per-user images.
    #[arg(long, default_value = DEFAULT_BUCKET, env = "RELAY_STORAGE_BUCKET")]
    pub storage_bucket: String,

    /// Enable verbose logging.
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

// =============================================================================
// Tests
// =============================================================================
