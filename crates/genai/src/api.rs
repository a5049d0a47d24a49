//! REST API client for the generative model endpoints.
//!
//! Wraps video submission, operation polling, asset download, and
//! content generation using [`reqwest`].  One [`GenAiApi`] is built at
//! startup and shared by reference; it owns the connection pool and
//! the API key.

use reframe_core::generation::{DEFAULT_ANALYSIS_MODEL, DEFAULT_VIDEO_MODEL};

use crate::messages::{
    GenerateContentRequest, GenerateContentResponse, GenerateVideosRequest, Operation,
};

/// Public endpoint of the Gemini API.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Header carrying the API key on model calls.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// HTTP client for the generative model API.
pub struct GenAiApi {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    video_model: String,
    analysis_model: String,
}

/// Errors from the REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum GenAiApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// A model endpoint returned a non-2xx status code.
    #[error("API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The asset download returned a non-2xx status code.
    #[error("Failed to download the generated video: {status_text}")]
    Download {
        status: u16,
        /// Canonical reason phrase, e.g. `Forbidden`.
        status_text: String,
    },
}

impl GenAiApi {
    /// Create a client for the public endpoint with the default models.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), DEFAULT_BASE_URL, api_key)
    }

    /// Create a client reusing an existing [`reqwest::Client`] against
    /// an arbitrary base URL.
    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            video_model: DEFAULT_VIDEO_MODEL.to_string(),
            analysis_model: DEFAULT_ANALYSIS_MODEL.to_string(),
        }
    }

    /// Override the video and analysis model identifiers.
    pub fn with_models(
        mut self,
        video_model: impl Into<String>,
        analysis_model: impl Into<String>,
    ) -> Self {
        self.video_model = video_model.into();
        self.analysis_model = analysis_model.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn video_model(&self) -> &str {
        &self.video_model
    }

    pub fn analysis_model(&self) -> &str {
        &self.analysis_model
    }

    /// Start a video generation job.
    ///
    /// Sends `POST /models/{video_model}:predictLongRunning`.
    pub async fn submit_video_generation(
        &self,
        prompt: &str,
        sample_count: u32,
    ) -> Result<Operation, GenAiApiError> {
        let body = GenerateVideosRequest::new(prompt, sample_count);

        let response = self
            .client
            .post(format!(
                "{}/models/{}:predictLongRunning",
                self.base_url, self.video_model
            ))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Re-read a long-running operation.
    ///
    /// Sends `GET /{operation_name}`.
    pub async fn get_operation(&self, operation_name: &str) -> Result<Operation, GenAiApiError> {
        let response = self
            .client
            .get(format!("{}/{}", self.base_url, operation_name))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Generate content with the analysis model.
    ///
    /// Sends `POST /models/{analysis_model}:generateContent`.
    pub async fn generate_content(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GenAiApiError> {
        let response = self
            .client
            .post(format!(
                "{}/models/{}:generateContent",
                self.base_url, self.analysis_model
            ))
            .header(API_KEY_HEADER, &self.api_key)
            .json(request)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Download a generated asset.
    ///
    /// Asset URIs only accept the key as a `key` query parameter.
    pub async fn download_asset(&self, uri: &str) -> Result<Vec<u8>, GenAiApiError> {
        let response = self
            .client
            .get(append_key(uri, &self.api_key))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GenAiApiError::Download {
                status: status.as_u16(),
                status_text: status
                    .canonical_reason()
                    .unwrap_or("Unknown status")
                    .to_string(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`GenAiApiError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, GenAiApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(GenAiApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, GenAiApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

// The key must never end up in logs.
impl std::fmt::Debug for GenAiApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenAiApi")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("video_model", &self.video_model)
            .field("analysis_model", &self.analysis_model)
            .finish()
    }
}

/// Append `key=<api_key>` to `uri`, respecting an existing query string.
pub fn append_key(uri: &str, api_key: &str) -> String {
    let separator = if uri.contains('?') { '&' } else { '?' };
    format!("{uri}{separator}key={api_key}")
}
