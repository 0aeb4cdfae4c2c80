use super::client::GeminiHttpClient;
use super::types::{Content, GenerateContentResponse, Part};
use crate::ai::{require_topic, PuzzleService};
use crate::models::PuzzleDraft;
use crate::{prompts, Error, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Serialize)]
struct PuzzleRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: PuzzleGenerationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PuzzleGenerationConfig {
    response_mime_type: String,
    response_schema: serde_json::Value,
}

/// Gemini's OpenAPI-subset schema for the puzzle reply.
fn response_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "OBJECT",
        "properties": {
            "answer": { "type": "STRING" },
            "image_prompts": { "type": "ARRAY", "items": { "type": "STRING" } },
            "image_paths": { "type": "ARRAY", "items": { "type": "STRING" } },
            "educational_fact": { "type": "STRING" }
        },
        "required": ["answer", "image_prompts", "educational_fact"],
        "propertyOrdering": ["answer", "image_prompts", "image_paths", "educational_fact"]
    })
}

pub struct GeminiPuzzleClient {
    http: GeminiHttpClient,
}

impl GeminiPuzzleClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self::new_with_client(api_key, model, Duration::from_secs(30), reqwest::Client::new())
    }

    pub fn new_with_client(
        api_key: String,
        model: String,
        timeout: Duration,
        client: reqwest::Client,
    ) -> Self {
        Self {
            http: GeminiHttpClient::new_with_client(api_key, model, timeout, client),
        }
    }

    fn extract_text(response: &GenerateContentResponse) -> Option<String> {
        let text: String = response
            .first_parts()?
            .iter()
            .filter_map(|p| match p {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();

        Some(text).filter(|t| !t.trim().is_empty())
    }
}

#[cfg(test)]
super::impl_with_gemini_base_url!(GeminiPuzzleClient);

#[async_trait]
impl PuzzleService for GeminiPuzzleClient {
    async fn generate_puzzle(&self, topic: &str, difficulty: &str) -> Result<PuzzleDraft> {
        let topic = require_topic(topic)?;

        let request = PuzzleRequest {
            system_instruction: Content::text(None, prompts::PUZZLE_SYSTEM),
            contents: vec![Content::text(
                Some("user"),
                prompts::build_prompt(topic, difficulty),
            )],
            generation_config: PuzzleGenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: response_schema(),
            },
        };

        tracing::debug!("Requesting puzzle from Gemini model {}", self.http.model());
        let response: GenerateContentResponse = self.http.generate_content(&request).await?;

        let text = Self::extract_text(&response).ok_or(Error::EmptyContent)?;
        PuzzleDraft::from_json(&text).inspect_err(|e| {
            tracing::error!("Rejected Gemini puzzle reply: {}\nReply: {}", e, text);
        })
    }
}
