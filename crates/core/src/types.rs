//! Shared value types passed between the analysis client, the
//! orchestrator, and the session layer.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Every generation job is identified by a random UUID.
pub type JobId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Structured description of a video frame produced by the analysis model.
///
/// Field names serialize in camelCase so the struct matches the JSON
/// schema the model is asked to fill in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// Short, catchy title for the scene.
    pub title: String,
    /// Paragraph describing subjects, setting, and action.
    pub description: String,
    /// A handful of keywords, in the order the model returned them.
    pub tags: Vec<String>,
    /// Text prompt suitable for generating a new video in the same style.
    pub cinematic_prompt: String,
}

/// How well a text prompt matches a frame, as judged by the analysis model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyResult {
    /// 0 (unrelated) to 100 (perfect match).
    pub score: u8,
    /// One-sentence justification for the score.
    pub explanation: String,
}

/// A still image held in memory, ready to be sent inline to a model.
#[derive(Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl ImagePayload {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Base64 (standard alphabet, padded) encoding of the image bytes.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.data)
    }

    /// Parse a `data:<mime>;base64,<payload>` URL.
    pub fn from_data_url(url: &str) -> Result<Self, CoreError> {
        let (header, payload) = url
            .split_once(',')
            .ok_or_else(|| CoreError::Validation("Invalid data URL".into()))?;

        let mime_type = header
            .strip_prefix("data:")
            .and_then(|rest| rest.split(';').next())
            .filter(|mime| !mime.is_empty())
            .ok_or_else(|| {
                CoreError::Validation("Could not parse MIME type from data URL".into())
            })?;

        let data = STANDARD
            .decode(payload.trim())
            .map_err(|e| CoreError::Validation(format!("Invalid base64 payload: {e}")))?;

        Ok(Self::new(mime_type, data))
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }
}

// Image bytes are noise in logs; print the size instead.
impl std::fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImagePayload")
            .field("mime_type", &self.mime_type)
            .field("len", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn analysis_result_uses_camel_case_keys() {
        let json = r#"{
            "title": "Orbit",
            "description": "An astronaut drifts above Earth.",
            "tags": ["space", "astronaut", "cinematic"],
            "cinematicPrompt": "An astronaut floating in the silent void"
        }"#;
        let result: AnalysisResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.title, "Orbit");
        assert_eq!(result.tags, vec!["space", "astronaut", "cinematic"]);
        assert_eq!(
            result.cinematic_prompt,
            "An astronaut floating in the silent void"
        );
    }

    #[test]
    fn analysis_result_rejects_missing_fields() {
        let json = r#"{"title": "Orbit", "description": "x", "tags": []}"#;
        assert!(serde_json::from_str::<AnalysisResult>(json).is_err());
    }

    #[test]
    fn data_url_parses_mime_and_payload() {
        let image = ImagePayload::from_data_url("data:image/jpeg;base64,AAEC").unwrap();
        assert_eq!(image.mime_type, "image/jpeg");
        assert_eq!(image.data, vec![0x00, 0x01, 0x02]);
        assert_eq!(image.to_data_url(), "data:image/jpeg;base64,AAEC");
    }

    #[test]
    fn data_url_without_comma_is_rejected() {
        assert_matches!(
            ImagePayload::from_data_url("data:image/png;base64"),
            Err(CoreError::Validation(msg)) if msg == "Invalid data URL"
        );
    }

    #[test]
    fn data_url_without_mime_is_rejected() {
        assert_matches!(
            ImagePayload::from_data_url("data:;base64,AAEC"),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn debug_output_hides_bytes() {
        let image = ImagePayload::new("image/png", vec![7; 64]);
        let debug = format!("{image:?}");
        assert!(debug.contains("len: 64"));
        assert!(!debug.contains("7, 7"));
    }
}
