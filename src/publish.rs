//! Artifact publishing into per-user storage.
//!
//! Objects are written under `<owner>/transform-<unix_millis>-<uuid>.jpg`.
//! The owner prefix comes from the resolved caller identity, and the UUID
//! suffix is drawn per call so concurrent writes from one owner never collide
//! even within the same millisecond.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::error::PublishError;
use crate::generation::GeneratedArtifact;
use crate::identity::CallerIdentity;
use crate::storage::{ObjectStore, StorageObject};

/// Default `Cache-Control` max-age for published objects (1 hour).
pub const DEFAULT_UPLOAD_CACHE_MAX_AGE: u32 = 3600;

/// A durable, publicly resolvable URL for a stored artifact.
///
/// Only constructed after a successful write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PublicReference(String);

impl PublicReference {
    /// The URL.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PublicReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Build the storage path for an artifact.
pub fn object_path(owner: &str, timestamp_millis: u128, suffix: &Uuid) -> String {
    format!("{}/transform-{}-{}.jpg", owner, timestamp_millis, suffix)
}

/// Writes artifacts through a caller-scoped storage client.
#[derive(Debug, Clone)]
pub struct ArtifactPublisher {
    cache_max_age: u32,
}

impl Default for ArtifactPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_UPLOAD_CACHE_MAX_AGE)
    }
}

impl ArtifactPublisher {
    /// Create a publisher applying the given `Cache-Control` max-age.
    pub fn new(cache_max_age: u32) -> Self {
        Self { cache_max_age }
    }

    /// Write the artifact and resolve its public reference.
    ///
    /// The artifact is consumed. Upsert is disabled, so a path collision is
    /// reported as a failure rather than replacing the existing object.
    pub async fn publish<C: ObjectStore + ?Sized>(
        &self,
        client: &C,
        artifact: GeneratedArtifact,
        owner: &CallerIdentity,
    ) -> Result<PublicReference, PublishError> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let path = object_path(owner.user_id(), timestamp, &Uuid::new_v4());
        let size = artifact.len();

        client
            .put_object(StorageObject {
                path: path.clone(),
                bytes: artifact.bytes,
                content_type: artifact.content_type,
                cache_max_age: self.cache_max_age,
            })
            .await?;

        let reference = PublicReference(client.public_url(&path));
        info!(path = %path, size, "Artifact published");
        Ok(reference)
    }
}
