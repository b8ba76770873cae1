//! Per-caller object storage.
//!
//! Storage access is split in two so that authorization context can never
//! leak between requests:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            StorageFactory               │
//! │  (shared, built once at startup:        │
//! │   base URL, API key, bucket, HTTP pool) │
//! └────────────────────┬────────────────────┘
//!                      │ for_caller(credential)
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │          ObjectStore (scoped)           │
//! │  (one per request, carries the caller's │
//! │   own bearer token on every call)       │
//! └─────────────────────────────────────────┘
//! ```
//!
//! The scoped client is a plain value handed to the publisher; it is never
//! stored in shared state.

mod rest;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StorageError;
use crate::identity::Credential;

pub use rest::{RestStorage, ScopedStorageClient};

/// An object about to be written.
#[derive(Debug, Clone)]
pub struct StorageObject {
    /// Object path inside the bucket, `<owner>/<name>`
    pub path: String,

    /// Object contents
    pub bytes: Bytes,

    /// MIME type stored with the object
    pub content_type: String,

    /// `Cache-Control` max-age in seconds applied when the object is served
    pub cache_max_age: u32,
}

/// Storage operations available to a single caller.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Minimal listing call used to check that storage is reachable and the
    /// caller's credential is accepted.
    async fn probe(&self) -> Result<(), StorageError>;

    /// Write an object. Never overwrites: an existing object at the same path
    /// is reported as [`StorageError::AlreadyExists`].
    async fn put_object(&self, object: StorageObject) -> Result<(), StorageError>;

    /// Public URL for an object path.
    fn public_url(&self, path: &str) -> String;
}

/// Builds storage clients bound to a caller's credential.
pub trait StorageFactory: Send + Sync {
    /// The scoped client type this factory creates.
    type Client: ObjectStore + 'static;

    /// Build a client whose every call runs with the caller's authorization.
    ///
    /// Construction is pure configuration; failures surface on first use.
    fn for_caller(&self, credential: &Credential) -> Self::Client;
}
