//! Image storage.
//!
//! Uploads go to Cloudinary when credentials are configured, otherwise to a
//! local directory served under `/uploads`. The backend is picked once at boot.

mod cloudinary;
mod local;

pub use cloudinary::{CloudinaryCredentials, CloudinaryStore};
pub use local::LocalStore;

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

use crate::config::Config;

/// Logical folders uploads are grouped under.
pub mod folders {
    pub const BLOG_COVERS: &str = "blog-covers";
    pub const AVATARS: &str = "avatars";
}

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream rejected request: {0}")]
    Upstream(String),

    #[error("Invalid media id: {0}")]
    InvalidId(String),
}

pub type MediaResult<T> = Result<T, MediaError>;

/// Where an uploaded object ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMedia {
    /// URL clients load the image from
    pub url: String,
    /// Opaque id used to delete the object later
    pub public_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Store `data` under `folder`. `content_type` is the client-declared MIME type.
    async fn upload(
        &self,
        data: Bytes,
        folder: &str,
        content_type: Option<&str>,
    ) -> MediaResult<StoredMedia>;

    /// Remove an object. A missing object is `NotFound`, not an error.
    async fn delete(&self, public_id: &str) -> MediaResult<DeleteOutcome>;

    /// Short name for logs
    fn backend_name(&self) -> &'static str;
}

/// Pick the media backend from configuration.
pub fn build(config: &Config) -> anyhow::Result<Arc<dyn MediaStore>> {
    if let Some((cloud_name, api_key, api_secret)) = config.media.cloudinary.credentials() {
        tracing::info!("Media uploads go to Cloudinary cloud '{}'", cloud_name);
        let store = CloudinaryStore::new(CloudinaryCredentials {
            cloud_name: cloud_name.to_string(),
            api_key: api_key.to_string(),
            api_secret: api_secret.to_string(),
        })?;
        return Ok(Arc::new(store));
    }

    let dir = config.uploads_path();
    std::fs::create_dir_all(&dir)?;
    tracing::info!(
        "Cloudinary not configured, storing uploads in {}",
        dir.display()
    );
    Ok(Arc::new(LocalStore::new(
        dir,
        format!("{}/uploads", config.public_url()),
    )))
}

/// Delete an object, logging instead of failing. Used after the database
/// change it belongs to has already committed.
pub async fn delete_best_effort(store: &dyn MediaStore, public_id: &str) {
    match store.delete(public_id).await {
        Ok(DeleteOutcome::Deleted) => {
            tracing::info!("Deleted media {} from {}", public_id, store.backend_name())
        }
        Ok(DeleteOutcome::NotFound) => {
            tracing::warn!("Media {} not found in {}", public_id, store.backend_name())
        }
        Err(e) => tracing::error!("Failed to delete media {}: {}", public_id, e),
    }
}

/// File extension for an uploaded image, from its declared MIME type.
pub(crate) fn image_extension(content_type: Option<&str>) -> &'static str {
    let exts = content_type
        .and_then(mime_guess::get_mime_extensions_str)
        .unwrap_or(&[]);
    ["png", "gif", "webp"]
        .into_iter()
        .find(|ext| exts.contains(ext))
        .unwrap_or("jpg")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_follows_content_type() {
        assert_eq!(image_extension(Some("image/png")), "png");
        assert_eq!(image_extension(Some("image/jpeg")), "jpg");
        assert_eq!(image_extension(None), "jpg");
        assert_eq!(image_extension(Some("application/x-unknown")), "jpg");
    }

    #[test]
    fn build_falls_back_to_local_storage() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.path = Some(tmp.path().join("uploads"));
        let store = build(&config).unwrap();
        assert_eq!(store.backend_name(), "local");
        assert!(tmp.path().join("uploads").is_dir());
    }

    #[test]
    fn build_uses_cloudinary_when_configured() {
        let mut config = Config::default();
        config.media.cloudinary.cloud_name = Some("mycloud".into());
        config.media.cloudinary.api_key = Some("key".into());
        config.media.cloudinary.api_secret = Some("secret".into());
        let store = build(&config).unwrap();
        assert_eq!(store.backend_name(), "cloudinary");
    }
}
