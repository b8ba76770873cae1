//! HTTP server layer for the image relay.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │      POST /api/transform        POST /api/generate-image        │
//! │                                                                 │
//! │  ┌─────────────┐  ┌─────────────────┐  ┌─────────────────────┐  │
//! │  │  handlers   │  │     photos      │  │       routes        │  │
//! │  │ (pipeline,  │  │ (Photos upload, │  │  (router config,    │  │
//! │  │  generate)  │  │  OAuth relay)   │  │   CORS, tracing)    │  │
//! │  └─────────────┘  └─────────────────┘  └─────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod photos;
pub mod routes;

pub use handlers::{
    generate_image_handler, health_handler, transform_handler, AppState, ErrorResponse,
    GenerateImageBody, GenerateImageError, HealthResponse, TransformResponse,
};
pub use photos::{
    create_album_handler, google_auth_handler, google_callback_handler, upload_handler,
    AlbumResponse, CallbackParams, CreateAlbumBody,
};
pub use routes::{create_router, RouterConfig, DEFAULT_BODY_LIMIT};
