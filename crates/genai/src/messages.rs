//! Request and response messages for the generative model REST API.
//!
//! Two endpoints are covered:
//!
//! * `models/{model}:predictLongRunning` starts a video generation and
//!   returns a long-running [`Operation`], which is re-read via
//!   `GET /{operation.name}` until `done` is set.
//! * `models/{model}:generateContent` sends inline image + text parts and
//!   returns JSON text constrained by a response schema.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Video generation
// ---------------------------------------------------------------------------

/// Body of a `predictLongRunning` call.
#[derive(Debug, Serialize)]
pub struct GenerateVideosRequest {
    pub instances: Vec<VideoInstance>,
    pub parameters: VideoParameters,
}

#[derive(Debug, Serialize)]
pub struct VideoInstance {
    pub prompt: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoParameters {
    /// Number of videos to produce.
    pub sample_count: u32,
}

impl GenerateVideosRequest {
    pub fn new(prompt: impl Into<String>, sample_count: u32) -> Self {
        Self {
            instances: vec![VideoInstance {
                prompt: prompt.into(),
            }],
            parameters: VideoParameters { sample_count },
        }
    }
}

/// A long-running operation handle as returned by submission and by
/// every status check.
///
/// Treated as an immutable value: each status check returns a fresh
/// `Operation` that replaces the previous one.
#[derive(Debug, Clone, Deserialize)]
pub struct Operation {
    /// Resource name used to re-read the operation, e.g.
    /// `models/veo-2.0-generate-001/operations/abc123`.
    pub name: String,
    #[serde(default)]
    pub done: bool,
    pub error: Option<OperationError>,
    pub response: Option<OperationResponse>,
}

/// Terminal error reported by the remote job.
#[derive(Debug, Clone, Deserialize)]
pub struct OperationError {
    pub code: Option<i32>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResponse {
    pub generate_video_response: Option<GenerateVideoResponse>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateVideoResponse {
    #[serde(default)]
    pub generated_samples: Vec<GeneratedSample>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedSample {
    pub video: Option<VideoRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoRef {
    pub uri: Option<String>,
}

/// What an [`Operation`] says about the job, with the optional fields
/// already resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    /// `done` is not set yet.
    Pending,
    /// The job finished with an error. The message may be empty.
    Failed(String),
    /// The job finished; the first generated asset, if any.
    Completed { asset_uri: Option<String> },
}

impl Operation {
    /// Reference to the first generated video, if the response has one.
    pub fn first_asset_uri(&self) -> Option<&str> {
        self.response
            .as_ref()?
            .generate_video_response
            .as_ref()?
            .generated_samples
            .first()?
            .video
            .as_ref()?
            .uri
            .as_deref()
            .filter(|uri| !uri.is_empty())
    }

    pub fn outcome(&self) -> OperationOutcome {
        if !self.done {
            return OperationOutcome::Pending;
        }
        if let Some(error) = &self.error {
            return OperationOutcome::Failed(error.message.clone());
        }
        OperationOutcome::Completed {
            asset_uri: self.first_asset_uri().map(str::to_string),
        }
    }
}

// ---------------------------------------------------------------------------
// Content generation
// ---------------------------------------------------------------------------

/// Body of a `generateContent` call.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
pub struct Content {
    pub parts: Vec<Part>,
}

/// One part of a multi-part prompt.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    /// Base64-encoded bytes.
    pub data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_mime_type: String,
    pub response_schema: serde_json::Value,
}

impl GenerationConfig {
    /// Ask for JSON text matching `schema`.
    pub fn json(schema: serde_json::Value) -> Self {
        Self {
            response_mime_type: "application/json".to_string(),
            response_schema: schema,
        }
    }
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn inline(mime_type: impl Into<String>, base64_data: impl Into<String>) -> Self {
        Self::InlineData {
            inline_data: InlineData {
                mime_type: mime_type.into(),
                data: base64_data.into(),
            },
        }
    }
}

/// Response of a `generateContent` call.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<TextPart>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextPart {
    pub text: Option<String>,
}

/// Set when the request was rejected by content policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    pub block_reason: Option<String>,
    pub block_reason_message: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate, trimmed.  `None` when
    /// there is no text at all.
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }

    /// `(reason, message)` when the request was blocked.
    pub fn block(&self) -> Option<(&str, Option<&str>)> {
        let feedback = self.prompt_feedback.as_ref()?;
        let reason = feedback.block_reason.as_deref()?;
        Some((reason, feedback.block_reason_message.as_deref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submission_body_shape() {
        let body = serde_json::to_value(GenerateVideosRequest::new("a cat in space", 1)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "instances": [{"prompt": "a cat in space"}],
                "parameters": {"sampleCount": 1}
            })
        );
    }

    #[test]
    fn pending_operation() {
        let op: Operation =
            serde_json::from_str(r#"{"name":"models/veo/operations/1"}"#).unwrap();
        assert!(!op.done);
        assert_eq!(op.outcome(), OperationOutcome::Pending);
    }

    #[test]
    fn completed_operation_with_asset() {
        let json = r#"{
            "name": "models/veo/operations/1",
            "done": true,
            "response": {
                "generateVideoResponse": {
                    "generatedSamples": [
                        {"video": {"uri": "https://x/vid?alt=media"}},
                        {"video": {"uri": "https://x/other"}}
                    ]
                }
            }
        }"#;
        let op: Operation = serde_json::from_str(json).unwrap();
        assert_eq!(
            op.outcome(),
            OperationOutcome::Completed {
                asset_uri: Some("https://x/vid?alt=media".into())
            }
        );
    }

    #[test]
    fn completed_operation_without_samples() {
        let json = r#"{"name":"op","done":true,"response":{"generateVideoResponse":{}}}"#;
        let op: Operation = serde_json::from_str(json).unwrap();
        assert_eq!(op.outcome(), OperationOutcome::Completed { asset_uri: None });
    }

    #[test]
    fn empty_uri_counts_as_missing() {
        let json = r#"{"name":"op","done":true,"response":{"generateVideoResponse":{"generatedSamples":[{"video":{"uri":""}}]}}}"#;
        let op: Operation = serde_json::from_str(json).unwrap();
        assert!(op.first_asset_uri().is_none());
    }

    #[test]
    fn error_wins_over_response() {
        let json = r#"{
            "name": "op",
            "done": true,
            "error": {"code": 3, "message": "prompt rejected"},
            "response": {"generateVideoResponse": {"generatedSamples": [{"video": {"uri": "u"}}]}}
        }"#;
        let op: Operation = serde_json::from_str(json).unwrap();
        assert_eq!(
            op.outcome(),
            OperationOutcome::Failed("prompt rejected".into())
        );
    }

    #[test]
    fn error_without_message_is_empty_string() {
        let op: Operation =
            serde_json::from_str(r#"{"name":"op","done":true,"error":{"code":13}}"#).unwrap();
        assert_eq!(op.outcome(), OperationOutcome::Failed(String::new()));
    }

    #[test]
    fn content_request_serializes_parts() {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part::inline("image/jpeg", "AAEC"), Part::text("describe")],
            }],
            system_instruction: None,
            generation_config: GenerationConfig::json(serde_json::json!({"type": "OBJECT"})),
        };
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(
            body["contents"][0]["parts"][0],
            serde_json::json!({"inlineData": {"mimeType": "image/jpeg", "data": "AAEC"}})
        );
        assert_eq!(body["contents"][0]["parts"][1]["text"], "describe");
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert!(body.get("systemInstruction").is_none());
    }

    #[test]
    fn response_text_joins_parts() {
        let json = r#"{"candidates":[{"content":{"parts":[{"text":" {\"a\":"},{"text":"1} "}]}}]}"#;
        let response: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.text().as_deref(), Some(r#"{"a":1}"#));
        assert!(response.block().is_none());
    }

    #[test]
    fn blocked_response() {
        let json = r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#;
        let response: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.block(), Some(("SAFETY", None)));
        assert!(response.text().is_none());
    }
}
