use async_trait::async_trait;
use bytes::Bytes;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::path::PathBuf;
use tokio::fs;

use super::{image_extension, DeleteOutcome, MediaError, MediaResult, MediaStore, StoredMedia};

/// Stores uploads as flat files in one directory.
///
/// File names are `<unix millis>-<random>.<ext>` and double as the public id.
/// The folder name is not part of the path; all folders share the directory.
pub struct LocalStore {
    dir: PathBuf,
    base_url: String,
}

impl LocalStore {
    /// `base_url` is the URL prefix the directory is served under.
    pub fn new(dir: PathBuf, base_url: String) -> Self {
        Self {
            dir,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn generate_file_name(content_type: Option<&str>) -> String {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(8)
            .map(|c| char::from(c).to_ascii_lowercase())
            .collect();
        format!(
            "{}-{}.{}",
            chrono::Utc::now().timestamp_millis(),
            suffix,
            image_extension(content_type)
        )
    }

    fn validate_id(public_id: &str) -> MediaResult<()> {
        let ok = !public_id.is_empty()
            && !public_id.contains(['/', '\\'])
            && public_id != "."
            && public_id != "..";
        if ok {
            Ok(())
        } else {
            Err(MediaError::InvalidId(public_id.to_string()))
        }
    }
}

#[async_trait]
impl MediaStore for LocalStore {
    async fn upload(
        &self,
        data: Bytes,
        folder: &str,
        content_type: Option<&str>,
    ) -> MediaResult<StoredMedia> {
        fs::create_dir_all(&self.dir).await?;
        let file_name = Self::generate_file_name(content_type);
        fs::write(self.dir.join(&file_name), &data).await?;

        tracing::debug!(
            "Saved {} bytes for folder '{}' as {}",
            data.len(),
            folder,
            file_name
        );
        Ok(StoredMedia {
            url: format!("{}/{}", self.base_url, file_name),
            public_id: file_name,
        })
    }

    async fn delete(&self, public_id: &str) -> MediaResult<DeleteOutcome> {
        Self::validate_id(public_id)?;
        match fs::remove_file(self.dir.join(public_id)).await {
            Ok(()) => Ok(DeleteOutcome::Deleted),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(DeleteOutcome::NotFound),
            Err(e) => Err(MediaError::Io(e)),
        }
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}
