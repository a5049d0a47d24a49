//! Frame analysis calls built on a [`ContentModel`].
//!
//! [`analyze_frame`] turns a still image into an [`AnalysisResult`]
//! whose `cinematic_prompt` seeds video generation.
//! [`check_prompt_consistency`] scores how well an edited prompt still
//! describes the frame.

use reframe_core::types::{AnalysisResult, ConsistencyResult, ImagePayload};
use serde::Deserialize;
use serde_json::json;

use crate::api::GenAiApiError;
use crate::backend::ContentModel;
use crate::messages::{Content, GenerateContentRequest, GenerationConfig, Part};

const ANALYSIS_INSTRUCTION: &str = "You are a creative assistant for a video editor. \
Analyze the provided image, which is a frame from a video. Generate a structured JSON \
object describing the frame. The JSON object should contain:
- \"title\": A short, catchy title for the scene.
- \"description\": A detailed paragraph describing the scene, subjects, and actions.
- \"tags\": An array of 3-5 relevant keywords (e.g., \"sci-fi\", \"astronaut\", \"space\", \"cinematic\").
- \"cinematicPrompt\": A creative, cinematic, and evocative text prompt that could be used \
to generate a new video with a similar style and theme. This prompt should be a single, \
compelling sentence or two. Example: \"An astronaut floating in the vast, silent expanse \
of space, with the Earth glowing in the distance, cinematic lighting.\"";

const CONSISTENCY_INSTRUCTION: &str = "You are an expert film critic and AI assistant. \
Your task is to evaluate how well a given text prompt describes the provided image.
- Analyze the image carefully, noting the subject, setting, mood, and key visual elements.
- Analyze the text prompt.
- Compare the prompt to the image and provide a consistency score from 0 to 100, where 100 \
is a perfect match and 0 is completely unrelated.
- Provide a brief, one-sentence explanation for your score.
- Respond ONLY with a valid JSON object.";

/// Which model call an [`AnalysisError`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelCall {
    Analysis,
    ConsistencyCheck,
}

impl std::fmt::Display for ModelCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Analysis => f.write_str("Analysis"),
            Self::ConsistencyCheck => f.write_str("Consistency check"),
        }
    }
}

/// Errors from the analysis calls.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// The request was rejected by content policy.
    #[error("{call} request was blocked. Reason: {reason}. {}", .message.as_deref().unwrap_or(""))]
    Blocked {
        call: ModelCall,
        reason: String,
        message: Option<String>,
    },

    /// The model answered, but not with the expected JSON structure.
    #[error("{call} failed: {detail}")]
    Malformed { call: ModelCall, detail: String },

    /// The call never produced a model answer.
    #[error(transparent)]
    Request(#[from] GenAiApiError),
}

/// Describe a frame as title, description, tags, and a cinematic prompt.
pub async fn analyze_frame(
    model: &dyn ContentModel,
    image: &ImagePayload,
) -> Result<AnalysisResult, AnalysisError> {
    let request = GenerateContentRequest {
        contents: vec![Content {
            parts: vec![
                Part::inline(&image.mime_type, image.to_base64()),
                Part::text(ANALYSIS_INSTRUCTION),
            ],
        }],
        system_instruction: None,
        generation_config: GenerationConfig::json(analysis_schema()),
    };

    tracing::info!(image_bytes = image.data.len(), "Sending frame for analysis");
    let text = request_json_text(model, &request, ModelCall::Analysis).await?;

    let result: AnalysisResult = serde_json::from_str(&text).map_err(|e| {
        tracing::warn!(error = %e, raw = %text, "Unparseable analysis response");
        AnalysisError::invalid_json(ModelCall::Analysis)
    })?;

    tracing::info!(title = %result.title, tags = result.tags.len(), "Frame analysed");
    Ok(result)
}

/// Score how consistent `prompt` is with `image`, from 0 to 100.
pub async fn check_prompt_consistency(
    model: &dyn ContentModel,
    image: &ImagePayload,
    prompt: &str,
) -> Result<ConsistencyResult, AnalysisError> {
    let request = GenerateContentRequest {
        contents: vec![Content {
            parts: vec![
                Part::inline(&image.mime_type, image.to_base64()),
                Part::text(format!(
                    "Image is provided. Text prompt to evaluate: \"{prompt}\""
                )),
            ],
        }],
        system_instruction: Some(Content {
            parts: vec![Part::text(CONSISTENCY_INSTRUCTION)],
        }),
        generation_config: GenerationConfig::json(consistency_schema()),
    };

    let text = request_json_text(model, &request, ModelCall::ConsistencyCheck).await?;

    let raw: RawConsistency = serde_json::from_str(&text).map_err(|e| {
        tracing::warn!(error = %e, raw = %text, "Unparseable consistency response");
        AnalysisError::invalid_json(ModelCall::ConsistencyCheck)
    })?;

    Ok(ConsistencyResult {
        score: clamp_score(raw.score),
        explanation: raw.explanation,
    })
}

/// Round to the nearest integer and clamp into `0..=100`.
pub fn clamp_score(score: f64) -> u8 {
    if score.is_nan() {
        return 0;
    }
    score.round().clamp(0.0, 100.0) as u8
}

#[derive(Debug, Deserialize)]
struct RawConsistency {
    score: f64,
    explanation: String,
}

/// Send `request`, surface policy blocks, and return the answer text.
async fn request_json_text(
    model: &dyn ContentModel,
    request: &GenerateContentRequest,
    call: ModelCall,
) -> Result<String, AnalysisError> {
    let response = model.generate_content(request).await?;

    if let Some((reason, message)) = response.block() {
        tracing::warn!(reason, %call, "Model request blocked");
        return Err(AnalysisError::Blocked {
            call,
            reason: reason.to_string(),
            message: message.map(str::to_string),
        });
    }

    response.text().ok_or_else(|| AnalysisError::Malformed {
        call,
        detail: "The model did not return a valid JSON object.".into(),
    })
}

impl AnalysisError {
    fn invalid_json(call: ModelCall) -> Self {
        Self::Malformed {
            call,
            detail: "The model returned an invalid JSON format.".into(),
        }
    }
}

fn analysis_schema() -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "title": { "type": "STRING" },
            "description": { "type": "STRING" },
            "tags": { "type": "ARRAY", "items": { "type": "STRING" } },
            "cinematicPrompt": { "type": "STRING" }
        },
        "required": ["title", "description", "tags", "cinematicPrompt"]
    })
}

fn consistency_schema() -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "score": { "type": "NUMBER", "description": "A consistency score from 0 to 100." },
            "explanation": {
                "type": "STRING",
                "description": "A brief, one-sentence explanation for the score."
            }
        },
        "required": ["score", "explanation"]
    })
}
