//! Request orchestration: topic -> puzzle draft -> images -> result.

use crate::ai::{
    require_topic, GeminiImageClient, GeminiPuzzleClient, ImageGenerationService,
    OpenAiPuzzleClient, PuzzleService,
};
use crate::fanout::ImageFanOut;
use crate::image::{ImageProcessor, ImageService};
use crate::models::{AiProvider, Config, GenerationRequest, PuzzleResult};
use crate::prompts::DEFAULT_DIFFICULTY;
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

/// Coordinates puzzle generation and image fan-out for one request.
pub struct App {
    puzzles: Box<dyn PuzzleService>,
    fan_out: ImageFanOut,
}

/// Injectable service bundle used to construct [`App`] in tests/harnesses.
pub struct AppServices {
    pub puzzles: Box<dyn PuzzleService>,
    pub image_gen: Arc<dyn ImageGenerationService>,
    pub image: Arc<dyn ImageService>,
}

/// Fan-out limits applied to every request.
#[derive(Debug, Clone, Copy)]
pub struct FanOutSettings {
    pub max_concurrency: usize,
    pub image_timeout: Duration,
}

impl Default for FanOutSettings {
    fn default() -> Self {
        Self {
            max_concurrency: crate::fanout::DEFAULT_MAX_CONCURRENCY,
            image_timeout: crate::fanout::DEFAULT_IMAGE_TIMEOUT,
        }
    }
}

impl App {
    /// Build an app from concrete service dependencies.
    ///
    /// This is primarily useful for integration tests and local harnesses that
    /// need to inject mocks.
    pub fn with_services(services: AppServices, settings: FanOutSettings) -> Self {
        let fan_out = ImageFanOut::new(services.image_gen, services.image)
            .with_max_concurrency(settings.max_concurrency)
            .with_timeout(settings.image_timeout);

        Self {
            puzzles: services.puzzles,
            fan_out,
        }
    }

    /// Construct an app wired to the real providers named in `config`.
    pub fn new(config: &Config) -> Result<Self> {
        // Reuse one HTTP connection pool across provider clients.
        let http_client = reqwest::Client::new();

        let puzzles: Box<dyn PuzzleService> = match config.puzzle_provider {
            AiProvider::Gemini => {
                info!("Puzzle provider: Gemini (model: {})", config.puzzle_model);
                Box::new(GeminiPuzzleClient::new_with_client(
                    config.gemini_api_key.clone(),
                    config.puzzle_model.clone(),
                    config.puzzle_timeout,
                    http_client.clone(),
                ))
            }
            AiProvider::OpenAi => {
                let api_key = config.openai_api_key.clone().ok_or_else(|| {
                    Error::Config("OPENAI_API_KEY must be set when PUZZLE_PROVIDER=openai".to_string())
                })?;
                info!(
                    "Puzzle provider: OpenAI-compatible at {} (model: {})",
                    config.openai_base_url, config.puzzle_model
                );
                Box::new(OpenAiPuzzleClient::new_with_client(
                    api_key,
                    config.puzzle_model.clone(),
                    config.openai_base_url.clone(),
                    config.puzzle_timeout,
                    http_client.clone(),
                ))
            }
        };

        info!("Image provider: Gemini (model: {})", config.image_model);
        let image_gen = Arc::new(GeminiImageClient::new_with_client(
            config.gemini_api_key.clone(),
            config.image_model.clone(),
            config.image_timeout,
            http_client,
        ));

        let image = Arc::new(ImageProcessor::new(&config.output_dir)?);
        info!("Writing images to {}", config.output_dir.display());

        Ok(Self::with_services(
            AppServices {
                puzzles,
                image_gen,
                image,
            },
            FanOutSettings {
                max_concurrency: config.max_concurrent_images,
                image_timeout: config.image_timeout,
            },
        ))
    }

    /// Handle one generation request end to end.
    ///
    /// Image failures never fail the request; the result simply carries
    /// fewer `image_paths`.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<PuzzleResult> {
        let topic = require_topic(request.topic.as_deref().unwrap_or_default())?;
        let difficulty = request
            .difficulty
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(DEFAULT_DIFFICULTY);

        let request_id = Uuid::new_v4();
        let span = info_span!("generation", %request_id, topic, difficulty);

        async move {
            info!("Generating puzzle");
            let draft = self.puzzles.generate_puzzle(topic, difficulty).await?;
            info!("Puzzle answer chosen: {}", draft.answer());

            let image_paths = self
                .fan_out
                .generate_all(draft.answer(), draft.image_prompts())
                .await;

            Ok(PuzzleResult::new(draft, image_paths))
        }
        .instrument(span)
        .await
    }
}
