use std::time::Duration;

use serde_json::{Value, json};
use tracing::{debug, warn};

use async_trait::async_trait;
use tandem_types::models::Lane;

use crate::Narrator;
use crate::types::{
    AdventureConcept, DmReply, GatewayError, GenerateContentResponse, ModelConfig, Turn,
};

/// Base URL for the Gemini REST API.
const API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Upper bound on one completion round-trip. A timeout maps to the same
/// degraded placeholder as any other provider failure.
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// HTTP client for the Gemini `generateContent` endpoint.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: API_BASE_URL.to_string(),
        })
    }

    /// Overrides the base URL (self-hosted proxies, wiremock tests).
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    async fn post_generate(&self, model: &str, body: &Value) -> Result<String, GatewayError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, model);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        debug!(status = %status, model, "generateContent response received");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateContentResponse = response.json().await?;
        parsed.into_text()
    }
}

#[async_trait]
impl Narrator for GeminiClient {
    async fn narrate(
        &self,
        lane: Lane,
        system_prompt: &str,
        history: &[Turn],
        input: &str,
    ) -> DmReply {
        let config = ModelConfig::for_lane(lane);
        let body = build_generate_body(system_prompt, history, input, config.thinking_budget);

        match self.post_generate(&config.model, &body).await {
            Ok(text) => DmReply::Text(text),
            Err(e) => {
                warn!(model = %config.model, dm_version = lane.dm_version(), error = %e,
                    "narration failed, committing placeholder");
                DmReply::Degraded {
                    model: config.model,
                }
            }
        }
    }

    async fn improvise(&self) -> Result<AdventureConcept, GatewayError> {
        let body = build_improvise_body();
        let text = self
            .post_generate(&ModelConfig::for_lane(Lane::One).model, &body)
            .await?;

        serde_json::from_str(&text)
            .map_err(|e| GatewayError::BadPayload(format!("concept JSON: {}", e)))
    }
}

/// Request body for one narration call.
///
/// Gemini's casing is mixed: `system_instruction` is snake_case while
/// `generationConfig` and `thinkingConfig` are camelCase.
fn build_generate_body(
    system_prompt: &str,
    history: &[Turn],
    input: &str,
    thinking_budget: u32,
) -> Value {
    let mut contents: Vec<Value> = history
        .iter()
        .map(|turn| {
            json!({
                "role": turn.role.as_str(),
                "parts": [{ "text": turn.text }]
            })
        })
        .collect();

    contents.push(json!({
        "role": "user",
        "parts": [{ "text": input }]
    }));

    let mut gen_config = serde_json::Map::new();
    if thinking_budget > 0 {
        gen_config.insert(
            "thinkingConfig".into(),
            json!({ "thinkingBudget": thinking_budget }),
        );
    }

    json!({
        "contents": contents,
        "system_instruction": {
            "parts": [{ "text": system_prompt }]
        },
        "generationConfig": Value::Object(gen_config),
    })
}

/// Request body for the one-shot adventure-concept call: plain prompt plus
/// a response schema forcing `{title, prompt}` JSON output.
fn build_improvise_body() -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [{ "text": "Generate a concept for a short Dungeons & Dragons adventure. \
                Provide a creative title and a detailed system prompt for a Dungeon Master. \
                The prompt must describe the opening scene, the player character (invent a \
                name and a class), and the adventure's initial hook. Respond only in JSON \
                format." }]
        }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": {
                "type": "OBJECT",
                "properties": {
                    "title": {
                        "type": "STRING",
                        "description": "A creative, evocative title for the adventure."
                    },
                    "prompt": {
                        "type": "STRING",
                        "description": "A detailed system prompt for an AI Dungeon Master to use."
                    }
                },
                "required": ["title", "prompt"]
            }
        }
    })
}
