//! Data models and structures
//!
//! Defines the puzzle records exchanged with the text-generation service and
//! returned to HTTP clients, plus runtime configuration.

use crate::fanout::MAX_CONCURRENCY;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Number of image hints in every puzzle.
pub const PROMPT_COUNT: usize = 4;

/// Reply shape as the model produces it, before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPuzzle {
    pub answer: Option<String>,
    pub image_prompts: Option<Vec<String>>,
    pub educational_fact: Option<String>,
}

/// Validated output of the text-generation step.
///
/// Deserializing always goes through [`RawPuzzle`] validation, so a value of
/// this type holds a non-empty answer and exactly [`PROMPT_COUNT`] prompts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "RawPuzzle")]
pub struct PuzzleDraft {
    answer: String,
    image_prompts: Vec<String>,
    educational_fact: String,
}

impl PuzzleDraft {
    pub fn new(
        answer: impl Into<String>,
        image_prompts: Vec<String>,
        educational_fact: impl Into<String>,
    ) -> Result<Self> {
        Self::try_from(RawPuzzle {
            answer: Some(answer.into()),
            image_prompts: Some(image_prompts),
            educational_fact: Some(educational_fact.into()),
        })
    }

    /// Parse and validate a model reply.
    pub fn from_json(text: &str) -> Result<Self> {
        let raw: RawPuzzle = serde_json::from_str(text)
            .map_err(|e| Error::InvalidPuzzle(format!("reply is not valid JSON: {}", e)))?;
        let draft = Self::try_from(raw)?;

        let answer = draft.answer.to_lowercase();
        for (i, prompt) in draft.image_prompts.iter().enumerate() {
            if prompt.to_lowercase().contains(&answer) {
                warn!("Image prompt {} names the answer '{}'", i + 1, draft.answer);
            }
        }

        Ok(draft)
    }

    pub fn answer(&self) -> &str {
        &self.answer
    }

    pub fn image_prompts(&self) -> &[String] {
        &self.image_prompts
    }

    pub fn educational_fact(&self) -> &str {
        &self.educational_fact
    }
}

impl TryFrom<RawPuzzle> for PuzzleDraft {
    type Error = Error;

    fn try_from(raw: RawPuzzle) -> Result<Self> {
        let answer = raw
            .answer
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .ok_or_else(|| Error::InvalidPuzzle("missing or empty 'answer'".to_string()))?;

        let image_prompts = raw
            .image_prompts
            .ok_or_else(|| Error::InvalidPuzzle("missing 'image_prompts'".to_string()))?;
        if image_prompts.len() != PROMPT_COUNT {
            return Err(Error::InvalidPuzzle(format!(
                "expected {} image prompts, got {}",
                PROMPT_COUNT,
                image_prompts.len()
            )));
        }
        if let Some(i) = image_prompts.iter().position(|p| p.trim().is_empty()) {
            return Err(Error::InvalidPuzzle(format!("image prompt {} is empty", i + 1)));
        }

        let educational_fact = raw
            .educational_fact
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .ok_or_else(|| {
                Error::InvalidPuzzle("missing or empty 'educational_fact'".to_string())
            })?;

        Ok(Self {
            answer,
            image_prompts,
            educational_fact,
        })
    }
}

/// Final response body: the draft plus whichever images were produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PuzzleResult {
    #[serde(flatten)]
    pub draft: PuzzleDraft,
    pub image_paths: Vec<String>,
}

impl PuzzleResult {
    pub fn new(draft: PuzzleDraft, image_paths: Vec<String>) -> Self {
        Self { draft, image_paths }
    }
}

/// Incoming `POST /generation` body. Both fields are optional on the wire so
/// a missing topic is reported as a validation error rather than a parse error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationRequest {
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
}

impl GenerationRequest {
    /// Read a request body leniently. A body that is not JSON yields no topic.
    /// A non-string `topic` is treated as absent. A scalar `difficulty` is
    /// taken as its text form, and any other kind is treated as absent.
    pub fn from_body(body: &[u8]) -> Self {
        let value: serde_json::Value = match serde_json::from_slice(body) {
            Ok(value) => value,
            Err(e) => {
                warn!("Unreadable generation request: {}", e);
                return Self::default();
            }
        };

        let topic = value
            .get("topic")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string);
        let difficulty = match value.get("difficulty") {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(v @ (serde_json::Value::Number(_) | serde_json::Value::Bool(_))) => {
                Some(v.to_string())
            }
            _ => None,
        };

        Self { topic, difficulty }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiProvider {
    Gemini,
    OpenAi,
}

impl AiProvider {
    pub fn default_puzzle_model(self) -> &'static str {
        match self {
            AiProvider::Gemini => "gemini-2.5-flash",
            AiProvider::OpenAi => "moonshotai/kimi-k2-instruct",
        }
    }
}

impl FromStr for AiProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(AiProvider::Gemini),
            "openai" => Ok(AiProvider::OpenAi),
            other => Err(Error::Config(format!(
                "Unknown AI provider '{}' (expected 'gemini' or 'openai')",
                other
            ))),
        }
    }
}

// Configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub puzzle_provider: AiProvider,
    pub puzzle_model: String,
    pub image_model: String,
    pub gemini_api_key: String,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub output_dir: PathBuf,
    pub bind_addr: String,
    pub max_concurrent_images: usize,
    pub image_timeout: Duration,
    pub puzzle_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let puzzle_provider = match get("PUZZLE_PROVIDER") {
            Some(value) => value.parse()?,
            None => AiProvider::Gemini,
        };

        let gemini_api_key =
            get("GEMINI_API_KEY").ok_or_else(|| Error::Config("GEMINI_API_KEY not set".to_string()))?;

        let openai_api_key = get("OPENAI_API_KEY");
        if puzzle_provider == AiProvider::OpenAi && openai_api_key.is_none() {
            return Err(Error::Config(
                "OPENAI_API_KEY must be set when PUZZLE_PROVIDER=openai".to_string(),
            ));
        }

        let max_concurrent_images = parse_number(&get, "MAX_CONCURRENT_IMAGES", 4)?;
        if !(1..=MAX_CONCURRENCY).contains(&max_concurrent_images) {
            return Err(Error::Config(format!(
                "MAX_CONCURRENT_IMAGES must be between 1 and {}, got {}",
                MAX_CONCURRENCY, max_concurrent_images
            )));
        }

        Ok(Self {
            puzzle_provider,
            puzzle_model: get("PUZZLE_MODEL")
                .unwrap_or_else(|| puzzle_provider.default_puzzle_model().to_string()),
            image_model: get("IMAGE_MODEL")
                .unwrap_or_else(|| "gemini-2.0-flash-preview-image-generation".to_string()),
            gemini_api_key,
            openai_api_key,
            openai_base_url: get("OPENAI_BASE_URL")
                .unwrap_or_else(|| "https://api.openai.com".to_string()),
            output_dir: get("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("public/generated_images")),
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "127.0.0.1:5000".to_string()),
            max_concurrent_images,
            image_timeout: Duration::from_secs(parse_number(&get, "IMAGE_TIMEOUT_SECS", 120)?),
            puzzle_timeout: Duration::from_secs(parse_number(&get, "PUZZLE_TIMEOUT_SECS", 30)?),
        })
    }
}

fn parse_number<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{} must be a number, got '{}'", key, value))),
        None => Ok(default),
    }
}
