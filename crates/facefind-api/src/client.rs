use crate::error::ApiError;
use crate::wire::{DetectResponse, RecognizeRequest, RecognizeResponse, RootResponse};
use facefind_core::{Embedding, UploadedImage};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

/// Transport settings. Both timeouts are off unless configured.
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    pub connect_timeout: Option<Duration>,
    pub request_timeout: Option<Duration>,
}

/// HTTP client for the face backend.
///
/// The base URL is passed per call rather than stored, since each image
/// remembers the backend it was opened against.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http_client: Client,
}

impl BackendClient {
    /// Create a client.
    ///
    /// # Errors
    /// If the TLS backend cannot be initialised.
    pub fn new(options: &ClientOptions) -> Result<Self, ApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = options.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(timeout) = options.request_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http_client: builder.build()?,
        })
    }

    /// Fetch the backend's service descriptor.
    ///
    /// # Errors
    /// * If the base URL is invalid.
    /// * If the GET request fails or returns a non-success status.
    /// * If the body is not a valid descriptor.
    pub async fn status(&self, base_url: &str) -> Result<RootResponse, ApiError> {
        let url = endpoint(base_url, "")?;
        let response = self.http_client.get(url).send().await?;
        read_json(response).await
    }

    /// Upload an image for face detection.
    ///
    /// The file goes out as multipart field `file`, with its original name
    /// and declared content type.
    ///
    /// # Errors
    /// * If the image's backend URL is invalid.
    /// * If the POST request fails or returns a non-success status.
    /// * If the body is not a valid detect response.
    pub async fn detect(&self, image: &UploadedImage) -> Result<DetectResponse, ApiError> {
        let url = endpoint(&image.backend_url, "detect")?;
        let part = Part::bytes(image.bytes.clone())
            .file_name(image.file_name.clone())
            .mime_str(&image.content_type)?;
        let form = Form::new().part("file", part);

        tracing::debug!(%url, image = %image.id, bytes = image.bytes.len(), "POST detect");
        let response = self.http_client.post(url).multipart(form).send().await?;
        read_json(response).await
    }

    /// Look up reference faces similar to `embedding`.
    ///
    /// # Errors
    /// * If the base URL is invalid.
    /// * If the POST request fails or returns a non-success status.
    /// * If the body is not a valid recognize response.
    pub async fn recognize(
        &self,
        base_url: &str,
        embedding: &Embedding,
    ) -> Result<RecognizeResponse, ApiError> {
        let url = endpoint(base_url, "recognize")?;
        tracing::debug!(%url, dimension = ?embedding.dimension(), "POST recognize");
        let response = self
            .http_client
            .post(url)
            .json(&RecognizeRequest { embedding })
            .send()
            .await?;
        read_json(response).await
    }
}

/// Resolve `path` under the base URL, keeping any path prefix the base has.
pub fn endpoint(base_url: &str, path: &str) -> Result<Url, ApiError> {
    let invalid = |reason: String| ApiError::InvalidBaseUrl {
        url: base_url.to_string(),
        reason,
    };

    let mut url = Url::parse(base_url.trim()).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {}", url.scheme())));
    }

    let joined = format!("{}/{}", url.path().trim_end_matches('/'), path);
    url.set_path(&joined);
    url.set_query(None);
    Ok(url)
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    if !status.is_success() {
        let body = match response.text().await {
            Ok(body) => body,
            Err(err) => {
                tracing::debug!(%status, error = %err, "failed to read error body");
                String::new()
            }
        };
        return Err(ApiError::UnexpectedStatus { status, body });
    }
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_from_default_base() {
        let url = endpoint("http://localhost:8001", "detect").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8001/detect");
    }

    #[test]
    fn test_endpoint_trailing_slash_and_prefix() {
        let url = endpoint("https://faces.example/api/", "recognize").unwrap();
        assert_eq!(url.as_str(), "https://faces.example/api/recognize");
    }

    #[test]
    fn test_endpoint_root() {
        let url = endpoint("http://localhost:8001", "").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8001/");
    }

    #[test]
    fn test_endpoint_rejects_garbage() {
        assert!(matches!(
            endpoint("localhost:8001", "detect"),
            Err(ApiError::InvalidBaseUrl { .. })
        ));
        assert!(matches!(
            endpoint("not a url", "detect"),
            Err(ApiError::InvalidBaseUrl { .. })
        ));
    }
}
