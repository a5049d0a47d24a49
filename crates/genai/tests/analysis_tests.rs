//! Integration tests for frame analysis and prompt consistency scoring.
//!
//! A scripted [`ContentModel`] stands in for the remote endpoint so the
//! parsing and error mapping can be checked without network access.

use std::sync::Mutex;

use assert_matches::assert_matches;
use async_trait::async_trait;
use reframe_core::types::ImagePayload;
use reframe_genai::analysis::{
    analyze_frame, check_prompt_consistency, AnalysisError, ModelCall,
};
use reframe_genai::api::GenAiApiError;
use reframe_genai::backend::ContentModel;
use reframe_genai::messages::{GenerateContentRequest, GenerateContentResponse};

// ---------------------------------------------------------------------------
// Fake model
// ---------------------------------------------------------------------------

/// Returns one canned response and records the serialized request.
struct ScriptedModel {
    response: Mutex<Option<Result<GenerateContentResponse, GenAiApiError>>>,
    requests: Mutex<Vec<serde_json::Value>>,
}

impl ScriptedModel {
    fn replying(json: &str) -> Self {
        let response = serde_json::from_str(json).expect("fixture should parse");
        Self {
            response: Mutex::new(Some(Ok(response))),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn failing(error: GenAiApiError) -> Self {
        Self {
            response: Mutex::new(Some(Err(error))),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn last_request(&self) -> serde_json::Value {
        self.requests
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("a request should have been sent")
    }
}

#[async_trait]
impl ContentModel for ScriptedModel {
    async fn generate_content(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GenAiApiError> {
        self.requests
            .lock()
            .unwrap()
            .push(serde_json::to_value(request).unwrap());
        self.response
            .lock()
            .unwrap()
            .take()
            .expect("model called more than once")
    }
}

fn text_response(text: &str) -> String {
    serde_json::json!({
        "candidates": [{ "content": { "parts": [{ "text": text }] } }]
    })
    .to_string()
}

fn frame() -> ImagePayload {
    ImagePayload::new("image/jpeg", vec![0xff, 0xd8, 0xff])
}

// ---------------------------------------------------------------------------
// analyze_frame
// ---------------------------------------------------------------------------

#[tokio::test]
async fn analysis_parses_structured_result() {
    let body = r#"{
        "title": "Lunar Drift",
        "description": "An astronaut floats above a grey plain.",
        "tags": ["space", "astronaut", "cinematic"],
        "cinematicPrompt": "A lone astronaut drifts over the moon at dawn."
    }"#;
    let model = ScriptedModel::replying(&text_response(body));

    let result = analyze_frame(&model, &frame()).await.unwrap();

    assert_eq!(result.title, "Lunar Drift");
    assert_eq!(result.tags, vec!["space", "astronaut", "cinematic"]);
    assert_eq!(
        result.cinematic_prompt,
        "A lone astronaut drifts over the moon at dawn."
    );
}

#[tokio::test]
async fn analysis_sends_image_inline_with_schema() {
    let body = r#"{"title":"t","description":"d","tags":[],"cinematicPrompt":"p"}"#;
    let model = ScriptedModel::replying(&text_response(body));

    analyze_frame(&model, &frame()).await.unwrap();

    let request = model.last_request();
    let parts = &request["contents"][0]["parts"];
    assert_eq!(parts[0]["inlineData"]["mimeType"], "image/jpeg");
    assert_eq!(parts[0]["inlineData"]["data"], "/9j/");
    assert!(parts[1]["text"].as_str().unwrap().contains("cinematicPrompt"));
    assert_eq!(
        request["generationConfig"]["responseMimeType"],
        "application/json"
    );
    assert_eq!(
        request["generationConfig"]["responseSchema"]["required"][3],
        "cinematicPrompt"
    );
}

#[tokio::test]
async fn analysis_without_text_is_malformed() {
    let model = ScriptedModel::replying(r#"{"candidates":[]}"#);

    let err = analyze_frame(&model, &frame()).await.unwrap_err();

    assert_eq!(
        err.to_string(),
        "Analysis failed: The model did not return a valid JSON object."
    );
}

#[tokio::test]
async fn analysis_with_invalid_json_is_malformed() {
    let model = ScriptedModel::replying(&text_response("here is your scene: a cat"));

    let err = analyze_frame(&model, &frame()).await.unwrap_err();

    assert_matches!(
        err,
        AnalysisError::Malformed { call: ModelCall::Analysis, ref detail }
            if detail.contains("invalid JSON format")
    );
}

#[tokio::test]
async fn analysis_surfaces_block_reason() {
    let model = ScriptedModel::replying(
        r#"{"promptFeedback":{"blockReason":"SAFETY","blockReasonMessage":"Unsafe frame"}}"#,
    );

    let err = analyze_frame(&model, &frame()).await.unwrap_err();

    assert_matches!(
        err,
        AnalysisError::Blocked { call: ModelCall::Analysis, ref reason, ref message }
            if reason == "SAFETY" && message.as_deref() == Some("Unsafe frame")
    );
}

#[tokio::test]
async fn analysis_propagates_api_errors() {
    let model = ScriptedModel::failing(GenAiApiError::ApiError {
        status: 500,
        body: "boom".into(),
    });

    let err = analyze_frame(&model, &frame()).await.unwrap_err();

    assert_matches!(err, AnalysisError::Request(GenAiApiError::ApiError { status: 500, .. }));
}

// ---------------------------------------------------------------------------
// check_prompt_consistency
// ---------------------------------------------------------------------------

#[tokio::test]
async fn consistency_score_is_rounded_and_clamped() {
    let model = ScriptedModel::replying(&text_response(
        r#"{"score": 112.6, "explanation": "Matches perfectly."}"#,
    ));

    let result = check_prompt_consistency(&model, &frame(), "a cat in space")
        .await
        .unwrap();

    assert_eq!(result.score, 100);
    assert_eq!(result.explanation, "Matches perfectly.");
}

#[tokio::test]
async fn consistency_request_carries_prompt_and_system_instruction() {
    let model = ScriptedModel::replying(&text_response(
        r#"{"score": 41.4, "explanation": "Different subject."}"#,
    ));

    let result = check_prompt_consistency(&model, &frame(), "a cat in space")
        .await
        .unwrap();
    assert_eq!(result.score, 41);

    let request = model.last_request();
    let prompt_part = request["contents"][0]["parts"][1]["text"].as_str().unwrap();
    assert!(prompt_part.contains("\"a cat in space\""));
    assert!(request["systemInstruction"]["parts"][0]["text"]
        .as_str()
        .unwrap()
        .contains("film critic"));
}

#[tokio::test]
async fn consistency_missing_fields_is_malformed() {
    let model = ScriptedModel::replying(&text_response(r#"{"score": 50}"#));

    let err = check_prompt_consistency(&model, &frame(), "x")
        .await
        .unwrap_err();

    assert_matches!(
        err,
        AnalysisError::Malformed { call: ModelCall::ConsistencyCheck, .. }
    );
    assert_eq!(
        err.to_string(),
        "Consistency check failed: The model returned an invalid JSON format."
    );
}

#[tokio::test]
async fn consistency_block_names_the_consistency_check() {
    let model = ScriptedModel::replying(
        r#"{"promptFeedback":{"blockReason":"SAFETY","blockReasonMessage":"Unsafe prompt"}}"#,
    );

    let err = check_prompt_consistency(&model, &frame(), "x")
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Consistency check request was blocked. Reason: SAFETY. Unsafe prompt"
    );
}

#[tokio::test]
async fn analysis_instruction_ends_with_example_prompt() {
    let model = ScriptedModel::replying(&text_response(
        r#"{"title":"t","description":"d","tags":[],"cinematicPrompt":"p"}"#,
    ));

    analyze_frame(&model, &frame()).await.unwrap();

    let request = model.last_request();
    let instruction = request["contents"][0]["parts"][1]["text"].as_str().unwrap();
    assert!(instruction.ends_with(
        "Example: \"An astronaut floating in the vast, silent expanse of space, \
         with the Earth glowing in the distance, cinematic lighting.\""
    ));
}
