//! services/api/src/adapters/storage.rs
//!
//! This module contains the object-storage adapter for generated chapter
//! audio. It implements the `AudioStorageService` port against a
//! Supabase-compatible storage REST API over `reqwest`.

use async_trait::async_trait;
use coursegen_core::ports::{AudioStorageService, PortError, PortResult};
use reqwest::header::CONTENT_TYPE;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that upserts audio objects into a storage bucket and hands
/// back their public URLs.
#[derive(Clone)]
pub struct BucketStorageAdapter {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    bucket: String,
}

impl BucketStorageAdapter {
    /// Creates a new `BucketStorageAdapter`. `base_url` is the storage
    /// service root, without a trailing slash.
    pub fn new(http: reqwest::Client, base_url: String, api_key: String, bucket: String) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            bucket,
        }
    }

    fn object_url(&self, path: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, path)
    }

    fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, self.bucket, path
        )
    }
}

//=========================================================================================
// `AudioStorageService` Trait Implementation
//=========================================================================================

#[async_trait]
impl AudioStorageService for BucketStorageAdapter {
    /// Uploads MP3 bytes with upsert semantics, so re-running a chapter's
    /// audio generation overwrites the same object.
    async fn upload_audio(&self, path: &str, bytes: Vec<u8>) -> PortResult<String> {
        self.http
            .post(self.object_url(path))
            .bearer_auth(&self.api_key)
            .header("x-upsert", "true")
            .header(CONTENT_TYPE, "audio/mpeg")
            .body(bytes)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("Audio upload failed: {}", e)))?
            .error_for_status()
            .map_err(|e| PortError::Unexpected(format!("Audio upload rejected: {}", e)))?;

        Ok(self.public_url(path))
    }
}
