use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use sha1::{Digest, Sha1};

use super::{folders, image_extension, DeleteOutcome, MediaError, MediaResult, MediaStore, StoredMedia};

const API_BASE: &str = "https://api.cloudinary.com/v1_1";

/// Cover images are cropped to a social-card size on upload.
const COVER_TRANSFORMATION: &str = "c_fill,h_630,q_auto,w_1200";

#[derive(Clone)]
pub struct CloudinaryCredentials {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

/// Cloudinary image storage via the signed upload API.
pub struct CloudinaryStore {
    client: Client,
    credentials: CloudinaryCredentials,
}

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
}

#[derive(Deserialize)]
struct DestroyResponse {
    result: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl CloudinaryStore {
    pub fn new(credentials: CloudinaryCredentials) -> MediaResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            credentials,
        })
    }

    fn endpoint(&self, action: &str) -> String {
        format!("{}/{}/image/{}", API_BASE, self.credentials.cloud_name, action)
    }

    async fn read_error(response: reqwest::Response) -> MediaError {
        let status = response.status();
        match response.json::<ErrorResponse>().await {
            Ok(body) => MediaError::Upstream(format!("{}: {}", status, body.error.message)),
            Err(_) => MediaError::Upstream(status.to_string()),
        }
    }
}

/// Cloudinary request signature: params sorted by name, joined as
/// `k=v&k=v`, secret appended, SHA-1 hex digest.
pub(crate) fn sign_params(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted: Vec<&(&str, &str)> = params.iter().filter(|(_, v)| !v.is_empty()).collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let to_sign = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha1::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait]
impl MediaStore for CloudinaryStore {
    async fn upload(
        &self,
        data: Bytes,
        folder: &str,
        content_type: Option<&str>,
    ) -> MediaResult<StoredMedia> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let transformation = if folder == folders::BLOG_COVERS {
            COVER_TRANSFORMATION
        } else {
            ""
        };
        let signature = sign_params(
            &[
                ("folder", folder),
                ("timestamp", timestamp.as_str()),
                ("transformation", transformation),
            ],
            &self.credentials.api_secret,
        );

        let mut file = Part::bytes(data.to_vec())
            .file_name(format!("upload.{}", image_extension(content_type)));
        if let Some(ct) = content_type {
            file = file.mime_str(ct)?;
        }
        let mut form = Form::new()
            .text("api_key", self.credentials.api_key.clone())
            .text("timestamp", timestamp)
            .text("folder", folder.to_string())
            .text("signature", signature)
            .part("file", file);
        if !transformation.is_empty() {
            form = form.text("transformation", transformation);
        }

        let response = self
            .client
            .post(self.endpoint("upload"))
            .multipart(form)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::read_error(response).await);
        }

        let body: UploadResponse = response.json().await?;
        tracing::info!("Uploaded to Cloudinary: {}", body.public_id);
        Ok(StoredMedia {
            url: body.secure_url,
            public_id: body.public_id,
        })
    }

    async fn delete(&self, public_id: &str) -> MediaResult<DeleteOutcome> {
        if public_id.is_empty() {
            return Err(MediaError::InvalidId(public_id.to_string()));
        }
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign_params(
            &[("public_id", public_id), ("timestamp", timestamp.as_str())],
            &self.credentials.api_secret,
        );

        let response = self
            .client
            .post(self.endpoint("destroy"))
            .form(&[
                ("public_id", public_id),
                ("timestamp", timestamp.as_str()),
                ("api_key", self.credentials.api_key.as_str()),
                ("signature", signature.as_str()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::read_error(response).await);
        }

        let body: DestroyResponse = response.json().await?;
        match body.result.as_str() {
            "ok" => Ok(DeleteOutcome::Deleted),
            "not found" => Ok(DeleteOutcome::NotFound),
            other => Err(MediaError::Upstream(format!("destroy returned '{}'", other))),
        }
    }

    fn backend_name(&self) -> &'static str {
        "cloudinary"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_matches_documented_example() {
        // Example from Cloudinary's signed-upload documentation
        let sig = sign_params(
            &[
                ("timestamp", "1315060510"),
                ("public_id", "sample_image"),
                ("eager", "w_400,h_300,c_pad|w_260,h_200,c_crop"),
            ],
            "abcd",
        );
        assert_eq!(sig, "bfd09f95f331f558cbd1320e67aa8d488770583e");
    }

    #[test]
    fn signature_ignores_empty_params_and_order() {
        let a = sign_params(&[("timestamp", "1"), ("folder", "x"), ("transformation", "")], "s");
        let b = sign_params(&[("folder", "x"), ("timestamp", "1")], "s");
        assert_eq!(a, b);
    }

    #[test]
    fn endpoint_includes_cloud_name() {
        let store = CloudinaryStore::new(CloudinaryCredentials {
            cloud_name: "mycloud".into(),
            api_key: "k".into(),
            api_secret: "s".into(),
        })
        .unwrap();
        assert_eq!(
            store.endpoint("upload"),
            "https://api.cloudinary.com/v1_1/mycloud/image/upload"
        );
    }
}
