//! Concurrent image generation for one puzzle.
//!
//! [`ImageFanOut::generate_image`] renders and stores a single prompt.
//! [`ImageFanOut::generate_all`] runs one such task per prompt on a bounded
//! `JoinSet`, waits for every task, and keeps only the successes.

use crate::ai::ImageGenerationService;
use crate::image::ImageService;
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

pub const DEFAULT_MAX_CONCURRENCY: usize = 4;
/// Upper bound on simultaneous image tasks per request.
pub const MAX_CONCURRENCY: usize = 64;
pub const DEFAULT_IMAGE_TIMEOUT: Duration = Duration::from_secs(120);
pub const IMAGE_EXTENSION: &str = "png";

const LOG_PROMPT_CHARS: usize = 50;

#[derive(Clone)]
pub struct ImageFanOut {
    image_gen: Arc<dyn ImageGenerationService>,
    image: Arc<dyn ImageService>,
    max_concurrency: usize,
    timeout: Duration,
}

impl ImageFanOut {
    pub fn new(image_gen: Arc<dyn ImageGenerationService>, image: Arc<dyn ImageService>) -> Self {
        Self {
            image_gen,
            image,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            timeout: DEFAULT_IMAGE_TIMEOUT,
        }
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.clamp(1, MAX_CONCURRENCY);
        self
    }

    /// Deadline for one generate-and-save task.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Render `prompt` and persist it as `target_name`, returning the stored
    /// identifier.
    pub async fn generate_image(&self, prompt: &str, target_name: &str) -> Result<String> {
        let work = async {
            let image_data = self.image_gen.generate_image(prompt).await?;
            if image_data.is_empty() {
                return Err(Error::AiProvider("Empty image payload".to_string()));
            }
            self.image.save_image(&image_data, target_name).await
        };

        tokio::time::timeout(self.timeout, work)
            .await
            .map_err(|_| Error::Timeout(format!("image {} after {:?}", target_name, self.timeout)))?
    }

    /// Generate one image per prompt and return the identifiers of those that
    /// succeeded, in completion order. Failed prompts are logged and skipped,
    /// so an empty result is a normal outcome.
    pub async fn generate_all(&self, answer: &str, prompts: &[String]) -> Vec<String> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut join_set = JoinSet::new();

        for (i, prompt) in prompts.iter().enumerate() {
            let engine = self.clone();
            let semaphore = Arc::clone(&semaphore);
            let prompt = prompt.clone();
            let target_name = target_file_name(answer, i + 1);

            join_set.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => engine.generate_image(&prompt, &target_name).await,
                    Err(e) => Err(Error::Invariant(format!("Semaphore closed: {}", e))),
                };
                (target_name, prompt, result)
            });
        }

        let mut image_paths = Vec::with_capacity(prompts.len());

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((target_name, prompt, Ok(id))) => {
                    info!(
                        "Generated {} for prompt: {}",
                        target_name,
                        truncate_for_log(&prompt)
                    );
                    image_paths.push(id);
                }
                Ok((target_name, prompt, Err(e))) => {
                    warn!(
                        "Failed to generate {} for prompt '{}': {}",
                        target_name,
                        truncate_for_log(&prompt),
                        e
                    );
                }
                Err(e) => {
                    warn!("Image task join error: {}", e);
                }
            }
        }

        info!(
            "Generated {}/{} images for '{}'",
            image_paths.len(),
            prompts.len(),
            answer
        );
        image_paths
    }
}

/// `"<answer>_<position>.png"`, with the answer reduced to `[A-Za-z0-9_-]`.
pub fn target_file_name(answer: &str, position: usize) -> String {
    let stem: String = answer
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let stem = if stem.is_empty() { "image".to_string() } else { stem };
    format!("{}_{}.{}", stem, position, IMAGE_EXTENSION)
}

fn truncate_for_log(prompt: &str) -> String {
    match prompt.char_indices().nth(LOG_PROMPT_CHARS) {
        Some((end, _)) => format!("{}...", &prompt[..end]),
        None => prompt.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockImageGenerationClient;
    use crate::image::{ImageProcessor, MockImageProcessor};
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    fn prompts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn four_prompts() -> Vec<String> {
        prompts(&[
            "a red fruit on a branch",
            "a pie on a windowsill",
            "a teacher's desk",
            "a bitten logo on a laptop",
        ])
    }

    fn engine(image_gen: MockImageGenerationClient, store: MockImageProcessor) -> ImageFanOut {
        ImageFanOut::new(Arc::new(image_gen), Arc::new(store))
    }

    fn sorted(mut v: Vec<String>) -> Vec<String> {
        v.sort();
        v
    }

    #[test]
    fn test_target_file_name() {
        assert_eq!(target_file_name("apple", 1), "apple_1.png");
        assert_eq!(target_file_name("ice cream", 4), "ice_cream_4.png");
        assert_eq!(target_file_name("../etc/passwd", 2), "___etc_passwd_2.png");
        assert_eq!(target_file_name("  ", 3), "image_3.png");
    }

    #[test]
    fn test_truncate_for_log() {
        assert_eq!(truncate_for_log("short"), "short");
        let long = "é".repeat(80);
        let truncated = truncate_for_log(&long);
        assert_eq!(truncated.chars().count(), LOG_PROMPT_CHARS + 3);
    }

    #[tokio::test]
    async fn test_all_succeed_returns_one_id_per_prompt() {
        let fan_out = engine(MockImageGenerationClient::new(), MockImageProcessor::new());

        let ids = fan_out.generate_all("apple", &four_prompts()).await;

        assert_eq!(
            sorted(ids),
            vec!["apple_1.png", "apple_2.png", "apple_3.png", "apple_4.png"]
        );
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_successes() {
        let image_gen = MockImageGenerationClient::new()
            .with_failing_prompt("pie")
            .with_failing_prompt("logo");
        let fan_out = engine(image_gen.clone(), MockImageProcessor::new());

        let ids = fan_out.generate_all("apple", &four_prompts()).await;

        assert_eq!(sorted(ids), vec!["apple_1.png", "apple_3.png"]);
        assert_eq!(image_gen.get_call_count(), 4);
    }

    #[tokio::test]
    async fn test_all_fail_returns_empty() {
        let image_gen = MockImageGenerationClient::new().with_failing_prompt("a");
        let fan_out = engine(image_gen, MockImageProcessor::new());

        let ids = fan_out.generate_all("apple", &four_prompts()).await;
        assert!(ids.is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_is_skipped() {
        let fan_out = engine(
            MockImageGenerationClient::new(),
            MockImageProcessor::new().with_failure(true),
        );

        let ids = fan_out.generate_all("apple", &four_prompts()).await;
        assert!(ids.is_empty());
    }

    #[tokio::test]
    async fn test_empty_payload_is_failure() {
        let fan_out = engine(
            MockImageGenerationClient::new().with_image_response(Vec::new()),
            MockImageProcessor::new(),
        );

        let err = fan_out
            .generate_image("anything", "apple_1.png")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AiProvider(_)));
    }

    #[tokio::test]
    async fn test_undecodable_payload_is_skipped() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let fan_out = ImageFanOut::new(
            Arc::new(MockImageGenerationClient::new().with_image_response(b"junk".to_vec())),
            Arc::new(ImageProcessor::new(temp_dir.path()).unwrap()),
        );

        let ids = fan_out.generate_all("apple", &four_prompts()).await;
        assert!(ids.is_empty());
    }

    #[tokio::test]
    async fn test_writes_real_files() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let fan_out = ImageFanOut::new(
            Arc::new(MockImageGenerationClient::new()),
            Arc::new(ImageProcessor::new(temp_dir.path()).unwrap()),
        );

        let ids = fan_out.generate_all("apple", &four_prompts()).await;

        assert_eq!(ids.len(), 4);
        for id in ids {
            assert!(temp_dir.path().join(id).exists());
        }
    }

    #[tokio::test]
    async fn test_slow_image_times_out() {
        let fan_out = engine(
            MockImageGenerationClient::new().with_delay(Duration::from_millis(500)),
            MockImageProcessor::new(),
        )
        .with_timeout(Duration::from_millis(20));

        let err = fan_out
            .generate_image("slow", "apple_1.png")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));

        let ids = fan_out.generate_all("apple", &four_prompts()).await;
        assert!(ids.is_empty());
    }

    #[tokio::test]
    async fn test_concurrency_is_capped() {
        let image_gen =
            MockImageGenerationClient::new().with_delay(Duration::from_millis(30));
        let fan_out = engine(image_gen.clone(), MockImageProcessor::new()).with_max_concurrency(2);

        let many: Vec<String> = (0..8).map(|i| format!("prompt {}", i)).collect();
        let ids = fan_out.generate_all("apple", &many).await;

        assert_eq!(ids.len(), 8);
        assert!(image_gen.get_peak_in_flight() <= 2);
        assert_eq!(image_gen.get_call_count(), 8);
    }

    #[tokio::test]
    async fn test_prompts_run_in_parallel() {
        let image_gen =
            MockImageGenerationClient::new().with_delay(Duration::from_millis(50));
        let fan_out = engine(image_gen.clone(), MockImageProcessor::new());

        fan_out.generate_all("apple", &four_prompts()).await;
        assert!(image_gen.get_peak_in_flight() > 1);
    }

    #[test]
    fn test_zero_concurrency_clamped() {
        let fan_out = engine(MockImageGenerationClient::new(), MockImageProcessor::new())
            .with_max_concurrency(0);
        assert_eq!(fan_out.max_concurrency(), 1);
    }

    #[tokio::test]
    async fn test_oversized_concurrency_clamped() {
        let fan_out = engine(MockImageGenerationClient::new(), MockImageProcessor::new())
            .with_max_concurrency(usize::MAX);
        assert_eq!(fan_out.max_concurrency(), MAX_CONCURRENCY);

        let ids = fan_out.generate_all("apple", &four_prompts()).await;
        assert_eq!(ids.len(), 4);
    }

    #[tokio::test]
    async fn test_concurrent_batches_do_not_mix() {
        let image_gen = MockImageGenerationClient::new()
            .with_delay(Duration::from_millis(10))
            .with_failing_prompt("pie");
        let store = MockImageProcessor::new();
        let fan_out = engine(image_gen, store.clone());

        let first_prompts = four_prompts();
        let other_prompts = prompts(&["w", "x", "y", "z"]);
        let (first, second) = tokio::join!(
            fan_out.generate_all("apple", &first_prompts),
            fan_out.generate_all("apple", &other_prompts),
        );

        assert_eq!(first.len(), 3);
        assert_eq!(second.len(), 4);
        let unique: HashSet<_> = second.iter().collect();
        assert_eq!(unique.len(), 4);
        assert_eq!(store.get_process_count(), 7);
    }
}
