//! Router configuration for the image relay.
//!
//! # Route Structure
//!
//! ```text
//! /health                   - Health check
//! /api/transform            - Transform and publish (bearer token required)
//! /api/generate-image       - Text-to-image, raw bytes
//! /create-album             - Google Photos album creation
//! /upload                   - Google Photos upload (multipart)
//! /auth/google              - OAuth consent redirect
//! /auth/google/callback     - OAuth code exchange
//! ```
//!
//! # Example
//!
//! ```ignore
//! use image_relay::server::{create_router, AppState, RouterConfig};
//!
//! let state = AppState::new(pipeline).with_photos(photos);
//! let config = RouterConfig::new()
//!     .with_cors_origins(vec!["https://gallery.example".to_string()]);
//!
//! let router = create_router(state, config);
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:5000").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use super::handlers::{generate_image_handler, health_handler, transform_handler, AppState};
use super::photos::{
    create_album_handler, google_auth_handler, google_callback_handler, upload_handler,
};
use crate::storage::StorageFactory;

/// Default request body limit (20 MB), large enough for data-URI images.
pub const DEFAULT_BODY_LIMIT: usize = 20 * 1024 * 1024;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Clone, Debug)]
pub struct RouterConfig {
    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Maximum request body size in bytes
    pub body_limit: usize,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterConfig {
    /// Create a router configuration.
    ///
    /// By default CORS allows any origin, the body limit is 20 MB and
    /// tracing is enabled.
    pub fn new() -> Self {
        Self {
            cors_origins: None,
            body_limit: DEFAULT_BODY_LIMIT,
            enable_tracing: true,
        }
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Set the maximum request body size.
    pub fn with_body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the application router.
pub fn create_router<S>(state: AppState<S>, config: RouterConfig) -> Router
where
    S: StorageFactory + 'static,
{
    let cors = build_cors_layer(&config);

    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/api/transform", post(transform_handler::<S>))
        .route("/api/generate-image", post(generate_image_handler::<S>))
        .route("/create-album", post(create_album_handler::<S>))
        .route("/upload", post(upload_handler::<S>))
        .route("/auth/google", get(google_auth_handler::<S>))
        .route("/auth/google/callback", get(google_callback_handler::<S>))
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.body_limit))
        .layer(cors);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .max_age(Duration::from_secs(86400));

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| match origin.parse() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        warn!(origin = %origin, "Ignoring invalid CORS origin");
                        None
                    }
                })
                .collect();
            cors.allow_origin(origins)
        }
    }
}
