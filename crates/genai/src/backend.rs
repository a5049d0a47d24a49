//! Backend traits the orchestrator and the analysis calls are written
//! against.
//!
//! [`GenAiApi`] implements both for production; tests supply in-memory
//! fakes that script the remote responses.

use async_trait::async_trait;
use reframe_core::generation::OUTPUT_COUNT;

use crate::api::{GenAiApi, GenAiApiError};
use crate::messages::{GenerateContentRequest, GenerateContentResponse, Operation};

/// Remote asynchronous video generation.
#[async_trait]
pub trait VideoGenerationBackend: Send + Sync {
    /// Start a job for `prompt` requesting exactly one output asset.
    async fn submit(&self, prompt: &str) -> Result<Operation, GenAiApiError>;

    /// Check the status of `operation`, returning the updated handle.
    async fn poll(&self, operation: &Operation) -> Result<Operation, GenAiApiError>;

    /// Download the bytes behind a generated asset reference.
    async fn fetch_asset(&self, asset_uri: &str) -> Result<Vec<u8>, GenAiApiError>;
}

/// Structured content generation from multi-part prompts.
#[async_trait]
pub trait ContentModel: Send + Sync {
    async fn generate_content(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GenAiApiError>;
}

#[async_trait]
impl VideoGenerationBackend for GenAiApi {
    async fn submit(&self, prompt: &str) -> Result<Operation, GenAiApiError> {
        let operation = self.submit_video_generation(prompt, OUTPUT_COUNT).await?;
        tracing::info!(
            model = %self.video_model(),
            operation = %operation.name,
            done = operation.done,
            "Video generation submitted",
        );
        Ok(operation)
    }

    async fn poll(&self, operation: &Operation) -> Result<Operation, GenAiApiError> {
        let updated = self.get_operation(&operation.name).await?;
        tracing::debug!(
            operation = %updated.name,
            done = updated.done,
            "Operation status checked",
        );
        Ok(updated)
    }

    async fn fetch_asset(&self, asset_uri: &str) -> Result<Vec<u8>, GenAiApiError> {
        let bytes = self.download_asset(asset_uri).await?;
        tracing::info!(bytes = bytes.len(), "Generated asset downloaded");
        Ok(bytes)
    }
}

#[async_trait]
impl ContentModel for GenAiApi {
    async fn generate_content(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GenAiApiError> {
        GenAiApi::generate_content(self, request).await
    }
}
