// src/services/llm_service.rs
use crate::errors::{EcoVisionError, TransportKind};
use crate::models::*;
use crate::services::image_processor::{EncodedImage, ImageProcessor, RawImage};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::sync::Arc;

pub const MAX_TOKENS: u32 = 1500;
pub const TEMPERATURE: f64 = 0.1;
const SUMMARY_PREVIEW_CHARS: usize = 200;

const SCENE_PROMPT: &str = r#"Analyze this environmental image and provide detailed insights in JSON format.

Pay special attention to:
- Individual trees, forest areas, canopy coverage
- Vegetation types (moss, ferns, undergrowth, grass, saplings, young trees)
- Water features (streams, rivers, lakes)
- Soil and ground coverage
- Human activities (tree planting, farming, conservation work, gardening)
- People engaged in environmental activities
- Tools or evidence of environmental work (shovels, seedlings, planted areas)
- Any human-made structures or impacts

Detect ALL visible elements including people, activities, and environmental objects.

Return your response as valid JSON with this exact structure:
{
  "summary": "Detailed description of the environmental scene including forest density, ecosystem type, and any human activities",
  "objects_detected": [
    {
      "name": "specific object, organism, or activity name (be detailed: 'people planting trees', 'tree saplings', 'reforestation activity', 'environmental workers', etc.)",
      "type": "living or non-living",
      "confidence": 0.9,
      "environmental_impact": "positive, negative, or neutral",
      "sustainability_score": 8,
      "description": "detailed description including size, density, health, or activity purpose",
      "recommended_action": "specific recommended action"
    }
  ],
  "overall_analysis": {
    "environmental_health_score": 8.5,
    "biodiversity_level": "high",
    "key_concerns": ["list of environmental concerns"],
    "positive_aspects": ["list of positive environmental aspects"],
    "recommendations": ["list of actionable recommendations"]
  }
}

Please ensure your response is valid JSON only. Detect as many distinct environmental elements AND human activities as possible."#;

const ASSISTANT_PERSONA: &str = r#"You are EcoVision AI, an expert environmental analyst. You can analyze any environmental image and answer questions about it comprehensively and accurately.

You excel at:
- Identifying all objects, people, animals, plants, and environmental features. Be sure to correctly distinguish between living things (like humans, plants, and animals) and non-living things (like equipment, fire, or rocks).
- Assessing environmental health and sustainability.
- Providing conservation recommendations.
- Answering specific questions about what you observe.
- Explaining ecological processes and relationships.

Always provide detailed, accurate, and helpful responses. If asked about specific counts (like "how many people"), be precise. Maintain a logical and factual tone. Answer naturally as if you're having a conversation."#;

pub const GREETING: &str = "Hello there! I'm EcoVision AI, your environmental intelligence assistant. You can upload an image or take a picture with your camera, then ask me anything you'd like to know about the environment it depicts!";
pub const POLITE_REPLY: &str =
    "You're very welcome! Feel free to ask me anything else about the image.";
pub const NO_IMAGE_REPLY: &str = "Please upload an image or take a picture with your camera first!";
pub const ENCODING_FAILED_REPLY: &str = "Sorry, I couldn't process the image. Please try again.";

const POLITE_PHRASES: [&str; 5] = [
    "thank you",
    "thanks",
    "thanks a lot",
    "thank you so much",
    "cheers",
];

/// One completion request: optional system instruction, user text and image.
#[derive(Debug, Clone)]
pub struct VisionRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub image: EncodedImage,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl VisionRequest {
    pub fn new(prompt: impl Into<String>, image: EncodedImage) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            image,
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// Sends a single vision request and returns the model's text.
#[async_trait]
pub trait VisionClient: Send + Sync {
    async fn complete(&self, request: &VisionRequest) -> Result<String, EcoVisionError>;
}

pub struct OpenAIVisionClient {
    api_key: String,
    base_url: String,
    model: String,
    client: Client,
}

impl OpenAIVisionClient {
    pub fn new(api_key: String, base_url: String, model: String) -> Self {
        Self {
            api_key,
            base_url,
            model,
            client: Client::new(),
        }
    }

    fn payload(&self, request: &VisionRequest) -> Value {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(json!({
                "role": "system",
                "content": system
            }));
        }
        messages.push(json!({
            "role": "user",
            "content": [
                {
                    "type": "text",
                    "text": request.prompt
                },
                {
                    "type": "image_url",
                    "image_url": {
                        "url": request.image.as_data_uri(),
                        "detail": "high"
                    }
                }
            ]
        }));

        json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature
        })
    }
}

#[async_trait]
impl VisionClient for OpenAIVisionClient {
    async fn complete(&self, request: &VisionRequest) -> Result<String, EcoVisionError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&self.payload(request))
            .send()
            .await
            .map_err(|e| {
                EcoVisionError::transport(
                    TransportKind::from_reqwest(&e),
                    format!("OpenAI request failed: {}", e),
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(EcoVisionError::transport(
                TransportKind::from_status(status),
                format!("OpenAI error ({}): {}", status.as_u16(), error_text),
            ));
        }

        let result: Value = response.json().await.map_err(|e| {
            EcoVisionError::transport(
                TransportKind::MalformedResponse,
                format!("Failed to parse OpenAI response: {}", e),
            )
        })?;

        result["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| {
                EcoVisionError::transport(
                    TransportKind::MalformedResponse,
                    "No content in OpenAI response",
                )
            })
    }
}

/// Produces structured scene analyses. Never fails: every problem is folded
/// into an [`AnalysisResult`].
pub struct SceneDescriber {
    client: Arc<dyn VisionClient>,
    image_processor: Arc<ImageProcessor>,
}

impl SceneDescriber {
    pub fn new(client: Arc<dyn VisionClient>, image_processor: Arc<ImageProcessor>) -> Self {
        Self {
            client,
            image_processor,
        }
    }

    pub async fn describe(&self, image: &RawImage, mode: AnalysisMode) -> AnalysisResult {
        let (width, height) = image.dimensions();
        log::info!(
            "Starting scene analysis (mode: {}, size: {}x{})",
            mode.as_str(),
            width,
            height
        );

        let encoded = match self.image_processor.encode(image) {
            Ok(encoded) => encoded,
            Err(e) => {
                log::error!("Image encoding failed: {}", e);
                return AnalysisResult::Error {
                    error: format!("Failed to encode image: {}", e),
                    debug_info: format!("Error type: {}", e.type_name()),
                };
            }
        };

        let request = VisionRequest::new(SCENE_PROMPT, encoded);
        match self.client.complete(&request).await {
            Ok(text) => parse_analysis(&text),
            Err(e) => {
                log::error!("Scene analysis failed: {}", e);
                AnalysisResult::Error {
                    error: format!("Analysis failed: {}", e),
                    debug_info: format!("Error type: {}", e.type_name()),
                }
            }
        }
    }
}

/// Answers free-form questions about an image.
pub struct ConversationalDescriber {
    client: Arc<dyn VisionClient>,
    image_processor: Arc<ImageProcessor>,
}

impl ConversationalDescriber {
    pub fn new(client: Arc<dyn VisionClient>, image_processor: Arc<ImageProcessor>) -> Self {
        Self {
            client,
            image_processor,
        }
    }

    pub async fn ask(&self, image: Option<&RawImage>, question: &str) -> String {
        if is_polite(question) {
            return POLITE_REPLY.to_string();
        }
        let Some(image) = image else {
            return NO_IMAGE_REPLY.to_string();
        };

        let encoded = match self.image_processor.encode(image) {
            Ok(encoded) => encoded,
            Err(e) => {
                log::error!("Image encoding failed: {}", e);
                return ENCODING_FAILED_REPLY.to_string();
            }
        };

        let request = VisionRequest::new(
            format!(
                "Please analyze this environmental image and answer my question: {}",
                question
            ),
            encoded,
        )
        .with_system(ASSISTANT_PERSONA);

        match self.client.complete(&request).await {
            Ok(answer) => answer,
            Err(e) => {
                log::error!("Question answering failed: {}", e);
                format!(
                    "I encountered an error while analyzing the image: {}. Please try again.",
                    e
                )
            }
        }
    }
}

pub fn is_polite(text: &str) -> bool {
    let normalized = text.trim().to_lowercase();
    POLITE_PHRASES.iter().any(|phrase| normalized.contains(phrase))
}

/// Removes a leading ```` ```json ```` / ```` ``` ```` marker and a trailing fence.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let body = body.trim();
    body.strip_suffix("```").unwrap_or(body).trim()
}

pub fn parse_analysis(text: &str) -> AnalysisResult {
    let cleaned = strip_code_fences(text);

    match serde_json::from_str::<Value>(cleaned) {
        Ok(value) if value.is_object() => {
            log::info!("Model response parsed as JSON");
            AnalysisResult::Structured(parse_scene_report(&value))
        }
        Ok(_) => {
            log::warn!("Model response is JSON but not an object, using fallback");
            fallback_analysis(cleaned)
        }
        Err(e) => {
            log::warn!("Model response is not valid JSON ({}), using fallback", e);
            fallback_analysis(cleaned)
        }
    }
}

fn fallback_analysis(text: &str) -> AnalysisResult {
    let summary = if text.chars().count() > SUMMARY_PREVIEW_CHARS {
        let preview: String = text.chars().take(SUMMARY_PREVIEW_CHARS).collect();
        format!("{}...", preview)
    } else {
        text.to_string()
    };

    AnalysisResult::Fallback {
        summary,
        raw_analysis: text.to_string(),
        objects_detected: vec![DetectedObject {
            name: Some("Environmental Scene Analysis".to_string()),
            kind: Some("comprehensive".to_string()),
            confidence: Some(0.85),
            environmental_impact: Some("positive".to_string()),
            sustainability_score: Some(7),
            description: Some("AI analysis completed successfully".to_string()),
            recommended_action: Some("Review detailed analysis below".to_string()),
        }],
        overall_analysis: OverallAnalysis {
            environmental_health_score: Some(7.5),
            biodiversity_level: Some("medium".to_string()),
            key_concerns: vec!["See detailed analysis".to_string()],
            positive_aspects: vec!["Natural environment detected".to_string()],
            recommendations: vec!["Continue environmental monitoring".to_string()],
        },
    }
}

fn parse_scene_report(data: &Value) -> SceneReport {
    SceneReport {
        summary: data["summary"].as_str().map(|s| s.to_string()),
        objects_detected: data["objects_detected"]
            .as_array()
            .map(|arr| arr.iter().filter(|o| o.is_object()).map(parse_object).collect()),
        overall_analysis: data["overall_analysis"]
            .as_object()
            .map(|_| parse_overall(&data["overall_analysis"])),
    }
}

fn parse_object(obj: &Value) -> DetectedObject {
    let text = |key: &str| obj[key].as_str().map(|s| s.to_string());
    DetectedObject {
        name: text("name"),
        kind: text("type"),
        confidence: obj["confidence"].as_f64(),
        environmental_impact: text("environmental_impact"),
        sustainability_score: obj["sustainability_score"]
            .as_i64()
            .or_else(|| obj["sustainability_score"].as_f64().map(|f| f.round() as i64)),
        description: text("description"),
        recommended_action: text("recommended_action"),
    }
}

fn parse_overall(overall: &Value) -> OverallAnalysis {
    let strings = |key: &str| -> Vec<String> {
        overall[key]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|s| s.as_str().map(|s| s.to_string()))
                    .collect()
            })
            .unwrap_or_default()
    };
    OverallAnalysis {
        environmental_health_score: overall["environmental_health_score"].as_f64(),
        biodiversity_level: overall["biodiversity_level"].as_str().map(|s| s.to_string()),
        key_concerns: strings("key_concerns"),
        positive_aspects: strings("positive_aspects"),
        recommendations: strings("recommendations"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{FailingVision, StaticVision, raw_fixture};
    use httpmock::prelude::*;

    fn describer(client: Arc<dyn VisionClient>) -> SceneDescriber {
        SceneDescriber::new(client, Arc::new(ImageProcessor::new()))
    }

    fn assistant(client: Arc<dyn VisionClient>) -> ConversationalDescriber {
        ConversationalDescriber::new(client, Arc::new(ImageProcessor::new()))
    }

    #[test]
    fn strips_json_and_plain_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("  ```\n{}\n```  "), "{}");
        assert_eq!(strip_code_fences("{\"b\": 2}"), "{\"b\": 2}");
    }

    #[test]
    fn prose_falls_back_with_verbatim_text() {
        let result = parse_analysis("The image shows a river.");
        match result {
            AnalysisResult::Fallback {
                summary,
                raw_analysis,
                objects_detected,
                overall_analysis,
            } => {
                assert_eq!(summary, "The image shows a river.");
                assert_eq!(raw_analysis, "The image shows a river.");
                assert_eq!(objects_detected.len(), 1);
                assert_eq!(objects_detected[0].sustainability_score, Some(7));
                assert_eq!(overall_analysis.environmental_health_score, Some(7.5));
                assert_eq!(overall_analysis.biodiversity_level.as_deref(), Some("medium"));
            }
            other => panic!("expected fallback, got {:?}", other),
        }
    }

    #[test]
    fn long_prose_summary_is_truncated() {
        let text = "é".repeat(250);
        let result = parse_analysis(&text);
        let summary = result.summary().unwrap();
        assert_eq!(summary.chars().count(), 203);
        assert!(summary.ends_with("..."));
        assert_eq!(result.raw_analysis().unwrap(), text);
    }

    #[test]
    fn non_object_json_falls_back() {
        assert_eq!(parse_analysis("[1, 2, 3]").variant_name(), "fallback");
        assert_eq!(parse_analysis("42").variant_name(), "fallback");
    }

    #[test]
    fn structured_reply_keeps_fields_and_drops_wrong_types() {
        let text = r#"```json
{
  "summary": "A creek through pines",
  "objects_detected": [
    {"name": "pine tree", "type": "living", "confidence": 0.93,
     "environmental_impact": "positive", "sustainability_score": 9,
     "description": "tall", "recommended_action": "protect"},
    {"name": "bottle", "confidence": "high", "sustainability_score": 2.6}
  ],
  "overall_analysis": {
    "environmental_health_score": 8.5,
    "biodiversity_level": "high",
    "key_concerns": ["litter", 7],
    "recommendations": ["Pick up litter"]
  }
}
```"#;
        let result = parse_analysis(text);
        let AnalysisResult::Structured(report) = &result else {
            panic!("expected structured, got {:?}", result);
        };
        assert_eq!(report.summary.as_deref(), Some("A creek through pines"));

        let objects = report.objects_detected.as_ref().unwrap();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].kind.as_deref(), Some("living"));
        assert_eq!(objects[1].confidence, None);
        assert_eq!(objects[1].kind, None);
        assert_eq!(objects[1].sustainability_score, Some(3));

        let overall = report.overall_analysis.as_ref().unwrap();
        assert_eq!(overall.key_concerns, vec!["litter".to_string()]);
        assert!(overall.positive_aspects.is_empty());
    }

    #[tokio::test]
    async fn transport_failure_becomes_error_variant() {
        let client = Arc::new(FailingVision::new(TransportKind::RateLimit, "rate limit"));
        let result = describer(client.clone())
            .describe(&raw_fixture(), AnalysisMode::Comprehensive)
            .await;
        assert_eq!(
            result,
            AnalysisResult::Error {
                error: "Analysis failed: rate limit".into(),
                debug_info: "Error type: RateLimitError".into(),
            }
        );
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn encoding_failure_skips_network() {
        let client = Arc::new(StaticVision::new("{}"));
        let empty = RawImage::new(image::DynamicImage::new_rgb8(0, 0));
        let result = describer(client.clone())
            .describe(&empty, AnalysisMode::Biodiversity)
            .await;
        match result {
            AnalysisResult::Error { debug_info, .. } => {
                assert_eq!(debug_info, "Error type: EncodingError")
            }
            other => panic!("expected error, got {:?}", other),
        }
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn describe_sends_schema_prompt_without_system() {
        let client = Arc::new(StaticVision::new("{\"summary\": \"ok\"}"));
        let result = describer(client.clone())
            .describe(&raw_fixture(), AnalysisMode::WasteDetection)
            .await;
        assert_eq!(result.summary(), Some("ok"));

        let request = client.last_request().unwrap();
        assert!(request.system.is_none());
        assert!(request.prompt.contains("\"objects_detected\""));
        assert_eq!(request.max_tokens, 1500);
        assert_eq!(request.temperature, 0.1);
    }

    #[test]
    fn polite_phrases_match_case_insensitively() {
        assert!(is_polite("Thanks!"));
        assert!(is_polite("  THANK YOU so much "));
        assert!(is_polite("cheers mate"));
        assert!(!is_polite("How many trees are there?"));
    }

    #[tokio::test]
    async fn thanks_without_image_makes_no_call() {
        let client = Arc::new(StaticVision::new("unused"));
        let answer = assistant(client.clone()).ask(None, "Thanks!").await;
        assert_eq!(answer, POLITE_REPLY);
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn question_without_image_asks_for_one() {
        let client = Arc::new(StaticVision::new("unused"));
        let answer = assistant(client.clone())
            .ask(None, "What is in the picture?")
            .await;
        assert_eq!(answer, NO_IMAGE_REPLY);
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn question_with_image_returns_reply_verbatim() {
        let reply = "There are **three** people planting saplings.";
        let client = Arc::new(StaticVision::new(reply));
        let answer = assistant(client.clone())
            .ask(Some(&raw_fixture()), "How many people are there?")
            .await;
        assert_eq!(answer, reply);
        assert_eq!(client.calls(), 1);

        let request = client.last_request().unwrap();
        assert!(request.system.as_deref().unwrap().starts_with("You are EcoVision AI"));
        assert!(request.prompt.ends_with("How many people are there?"));
    }

    #[tokio::test]
    async fn question_failure_is_apologetic() {
        let client = Arc::new(FailingVision::new(TransportKind::Connection, "connection refused"));
        let answer = assistant(client)
            .ask(Some(&raw_fixture()), "Is this healthy?")
            .await;
        assert_eq!(
            answer,
            "I encountered an error while analyzing the image: connection refused. Please try again."
        );
    }

    fn encoded_fixture() -> EncodedImage {
        ImageProcessor::new().encode(&raw_fixture()).unwrap()
    }

    #[tokio::test]
    async fn openai_client_posts_vision_payload() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/chat/completions")
                    .header("authorization", "Bearer sk-test")
                    .json_body_partial(r#"{"model": "gpt-4o", "max_tokens": 1500}"#);
                then.status(200).json_body(serde_json::json!({
                    "choices": [{"message": {"role": "assistant", "content": "A quiet pond."}}]
                }));
            })
            .await;

        let client = OpenAIVisionClient::new(
            "sk-test".into(),
            server.url("/v1"),
            "gpt-4o".into(),
        );
        let request = VisionRequest::new("describe", encoded_fixture()).with_system("persona");
        let text = client.complete(&request).await.unwrap();

        assert_eq!(text, "A quiet pond.");
        mock.assert_async().await;
    }

    #[test]
    fn payload_places_system_first_and_requests_high_detail() {
        let client = OpenAIVisionClient::new("k".into(), "http://x".into(), "gpt-4o".into());
        let request = VisionRequest::new("q", encoded_fixture()).with_system("persona");
        let payload = client.payload(&request);

        assert_eq!(payload["messages"][0]["role"], "system");
        assert_eq!(payload["messages"][1]["content"][1]["image_url"]["detail"], "high");
        assert!(
            payload["messages"][1]["content"][1]["image_url"]["url"]
                .as_str()
                .unwrap()
                .starts_with("data:image/jpeg;base64,")
        );
    }

    #[tokio::test]
    async fn openai_client_classifies_rate_limit() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(429).body("slow down");
            })
            .await;

        let client = OpenAIVisionClient::new("k".into(), server.base_url(), "gpt-4o".into());
        let err = client
            .complete(&VisionRequest::new("q", encoded_fixture()))
            .await
            .unwrap_err();

        assert_eq!(err.type_name(), "RateLimitError");
        assert!(err.to_string().contains("slow down"));
    }

    #[tokio::test]
    async fn openai_client_rejects_missing_content() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(200).json_body(serde_json::json!({"choices": []}));
            })
            .await;

        let client = OpenAIVisionClient::new("k".into(), server.base_url(), "gpt-4o".into());
        let err = client
            .complete(&VisionRequest::new("q", encoded_fixture()))
            .await
            .unwrap_err();
        assert_eq!(err.type_name(), "MalformedResponse");
    }
}
