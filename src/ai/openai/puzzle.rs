use super::client::{OpenAiHttpClient, DEFAULT_BASE_URL};
use super::types::{ChatCompletionRequest, ChatMessage, JsonSchema, ResponseFormat};
use crate::ai::{require_topic, PuzzleService};
use crate::models::PuzzleDraft;
use crate::{prompts, Error, Result};
use async_trait::async_trait;
use std::time::Duration;

/// JSON schema for the puzzle reply in OpenAI's strict structured-output dialect.
fn puzzle_json_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "answer": { "type": "string" },
            "image_prompts": { "type": "array", "items": { "type": "string" } },
            "image_paths": { "type": "array", "items": { "type": "string" } },
            "educational_fact": { "type": "string" }
        },
        "required": ["answer", "image_prompts", "image_paths", "educational_fact"],
        "additionalProperties": false
    })
}

pub struct OpenAiPuzzleClient {
    http: OpenAiHttpClient,
    model: String,
}

impl OpenAiPuzzleClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self::new_with_client(
            api_key,
            model,
            DEFAULT_BASE_URL.to_string(),
            Duration::from_secs(30),
            reqwest::Client::new(),
        )
    }

    pub fn new_with_client(
        api_key: String,
        model: String,
        base_url: String,
        timeout: Duration,
        client: reqwest::Client,
    ) -> Self {
        Self {
            http: OpenAiHttpClient::new(api_key, base_url, timeout, client),
            model,
        }
    }
}

#[async_trait]
impl PuzzleService for OpenAiPuzzleClient {
    async fn generate_puzzle(&self, topic: &str, difficulty: &str) -> Result<PuzzleDraft> {
        let topic = require_topic(topic)?;

        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::new("system", prompts::PUZZLE_SYSTEM),
                ChatMessage::new("user", prompts::build_prompt(topic, difficulty)),
            ],
            response_format: Some(ResponseFormat {
                format_type: "json_schema".to_string(),
                json_schema: JsonSchema {
                    name: "puzzle".to_string(),
                    schema: puzzle_json_schema(),
                    strict: true,
                },
            }),
        };

        tracing::debug!("Requesting puzzle from model {}", self.model);
        let response = self.http.chat_completion(request).await?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(Error::EmptyContent)?;

        PuzzleDraft::from_json(&content).inspect_err(|e| {
            tracing::error!("Rejected puzzle reply: {}\nReply: {}", e, content);
        })
    }
}
