use crate::client::BackendClient;
use crate::error::ApiError;
use crate::wire::{DetectResponse, RecognizeResponse};
use async_trait::async_trait;
use facefind_core::{Embedding, UploadedImage};

/// The remote face service, as seen by the session controller.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    async fn detect(&self, image: &UploadedImage) -> Result<DetectResponse, ApiError>;

    async fn recognize(
        &self,
        base_url: &str,
        embedding: &Embedding,
    ) -> Result<RecognizeResponse, ApiError>;
}

#[async_trait]
impl Backend for BackendClient {
    async fn detect(&self, image: &UploadedImage) -> Result<DetectResponse, ApiError> {
        BackendClient::detect(self, image).await
    }

    async fn recognize(
        &self,
        base_url: &str,
        embedding: &Embedding,
    ) -> Result<RecognizeResponse, ApiError> {
        BackendClient::recognize(self, base_url, embedding).await
    }
}
