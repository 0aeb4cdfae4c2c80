//! AI service integration for puzzle and image generation
//!
//! Provides interfaces to a text-generation service that invents the puzzle
//! and an image-generation service that renders each hint.

pub mod gemini;
pub mod mock;
pub mod openai;

pub use gemini::{GeminiImageClient, GeminiPuzzleClient};
pub use mock::{MockImageGenerationClient, MockPuzzleClient};
pub use openai::OpenAiPuzzleClient;

use crate::models::PuzzleDraft;
use crate::{Error, Result};
use async_trait::async_trait;

#[async_trait]
pub trait PuzzleService: Send + Sync {
    /// Ask the text model for a validated puzzle. Fails before any network
    /// call when `topic` is blank.
    async fn generate_puzzle(&self, topic: &str, difficulty: &str) -> Result<PuzzleDraft>;
}

#[async_trait]
pub trait ImageGenerationService: Send + Sync {
    /// Render one prompt and return the raw image bytes.
    async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>>;
}

/// Trimmed topic, or the validation error surfaced to HTTP callers.
pub fn require_topic(topic: &str) -> Result<&str> {
    match topic.trim() {
        "" => Err(Error::Validation("Topic required".to_string())),
        t => Ok(t),
    }
}
