//! Request bodies that may arrive as JSON, urlencoded or multipart forms.
//!
//! Blog and profile writes accept any of the three, with an optional image
//! file in the multipart case. [`FormInput`] collects the text fields into a
//! JSON object so handlers deserialize a typed struct regardless of encoding.

use std::collections::HashMap;

use axum::extract::{FromRequest, Multipart, Request};
use axum::http::{header, StatusCode};
use axum::Form;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::AppError;

pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// An image file received in a multipart body.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub bytes: Bytes,
    pub content_type: Option<String>,
    pub file_name: Option<String>,
}

impl UploadedFile {
    fn validate(&self) -> Result<(), AppError> {
        let is_image = self
            .content_type
            .as_deref()
            .map(|ct| ct.starts_with("image/"))
            .unwrap_or(false);
        if !is_image {
            return Err(AppError::validation("Only image files are allowed"));
        }
        if self.bytes.len() > MAX_IMAGE_BYTES {
            return Err(AppError::validation("Image must be 5MB or smaller"));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct FormInput {
    fields: Map<String, Value>,
    files: HashMap<String, UploadedFile>,
}

impl FormInput {
    /// Deserialize the text fields into `T`.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, AppError> {
        serde_json::from_value(Value::Object(self.fields.clone())).map_err(|e| {
            tracing::debug!("Rejected request body: {}", e);
            AppError::validation("Invalid request body")
        })
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }

    async fn from_multipart(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut input = FormInput::default();
        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            if field.file_name().is_some() {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(multipart_error)?;
                // Browsers send an empty part when no file was picked
                if bytes.is_empty() {
                    continue;
                }
                let file = UploadedFile {
                    bytes,
                    content_type,
                    file_name,
                };
                file.validate()?;
                input.files.insert(name, file);
            } else {
                let text = field.text().await.map_err(multipart_error)?;
                input.fields.insert(name, Value::String(text));
            }
        }
        Ok(input)
    }

    fn from_json(body: &[u8]) -> Result<Self, AppError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(FormInput::default());
        }
        match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(fields)) => Ok(FormInput {
                fields,
                files: HashMap::new(),
            }),
            Ok(_) => Err(AppError::validation("Request body must be a JSON object")),
            Err(e) => {
                tracing::debug!("Malformed JSON body: {}", e);
                Err(AppError::validation("Malformed JSON body"))
            }
        }
    }
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> AppError {
    tracing::debug!("Multipart error: {}", e.body_text());
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::validation("Image must be 5MB or smaller")
    } else {
        AppError::validation("Malformed multipart body")
    }
}

impl<S: Send + Sync> FromRequest<S> for FormInput {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| {
                    tracing::debug!("Multipart rejection: {}", e.body_text());
                    AppError::validation("Malformed multipart body")
                })?;
            FormInput::from_multipart(multipart).await
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(pairs) = Form::<HashMap<String, String>>::from_request(req, state)
                .await
                .map_err(|e| {
                    tracing::debug!("Form rejection: {}", e.body_text());
                    AppError::validation("Malformed form body")
                })?;
            Ok(FormInput {
                fields: pairs
                    .into_iter()
                    .map(|(k, v)| (k, Value::String(v)))
                    .collect(),
                files: HashMap::new(),
            })
        } else {
            let body = Bytes::from_request(req, state).await.map_err(|e| {
                tracing::debug!("Body rejection: {}", e.body_text());
                AppError::validation("Invalid request body")
            })?;
            FormInput::from_json(&body)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Sample {
        title: Option<String>,
        content: Option<String>,
    }

    async fn extract(content_type: &str, body: impl Into<Body>) -> Result<FormInput, AppError> {
        let req = Request::builder()
            .method("POST")
            .uri("/")
            .header(header::CONTENT_TYPE, content_type)
            .body(body.into())
            .unwrap();
        FormInput::from_request(req, &()).await
    }

    fn multipart_body(boundary: &str, parts: &[(&str, Option<(&str, &str)>, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, file, data) in parts {
            body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
            match file {
                Some((file_name, ct)) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                        name, file_name, ct
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                ),
            }
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
        body
    }

    #[tokio::test]
    async fn json_fields_parse_into_struct() {
        let input = extract("application/json", r#"{"title":"Hi"}"#).await.unwrap();
        let sample: Sample = input.parse().unwrap();
        assert_eq!(sample.title.as_deref(), Some("Hi"));
        assert!(sample.content.is_none());
    }

    #[tokio::test]
    async fn empty_body_is_an_empty_form() {
        let input = extract("application/json", "").await.unwrap();
        let sample: Sample = input.parse().unwrap();
        assert!(sample.title.is_none());
    }

    #[tokio::test]
    async fn malformed_json_is_a_validation_error() {
        let err = extract("application/json", "{nope").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        let err = extract("application/json", "[1,2]").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn urlencoded_fields_are_read() {
        let input = extract("application/x-www-form-urlencoded", "title=A+b&content=c")
            .await
            .unwrap();
        let sample: Sample = input.parse().unwrap();
        assert_eq!(sample.title.as_deref(), Some("A b"));
        assert_eq!(sample.content.as_deref(), Some("c"));
    }

    #[tokio::test]
    async fn multipart_collects_text_and_image() {
        let body = multipart_body(
            "XYZ",
            &[
                ("title", None, &b"Hello"[..]),
                ("coverImage", Some(("a.png", "image/png")), &b"\x89PNG"[..]),
            ],
        );
        let mut input = extract("multipart/form-data; boundary=XYZ", body)
            .await
            .unwrap();
        let sample: Sample = input.parse().unwrap();
        assert_eq!(sample.title.as_deref(), Some("Hello"));

        let file = input.take_file("coverImage").unwrap();
        assert_eq!(file.content_type.as_deref(), Some("image/png"));
        assert_eq!(file.file_name.as_deref(), Some("a.png"));
        assert_eq!(&file.bytes[..], b"\x89PNG");
        assert!(input.take_file("coverImage").is_none());
    }

    #[tokio::test]
    async fn multipart_rejects_non_images() {
        let body = multipart_body(
            "XYZ",
            &[("coverImage", Some(("a.txt", "text/plain")), &b"hello"[..])],
        );
        let err = extract("multipart/form-data; boundary=XYZ", body)
            .await
            .unwrap_err();
        match err {
            AppError::Validation(msg) => assert_eq!(msg, "Only image files are allowed"),
            other => panic!("expected Validation, got {:?}", other),
        }
    }

    #[test]
    fn oversized_images_are_rejected() {
        let file = UploadedFile {
            bytes: Bytes::from(vec![0u8; MAX_IMAGE_BYTES + 1]),
            content_type: Some("image/jpeg".into()),
            file_name: None,
        };
        assert!(file.validate().is_err());
    }
}
