use super::{require_topic, ImageGenerationService, PuzzleService};
use crate::models::PuzzleDraft;
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scripted text model. Replies are raw JSON strings run through the same
/// validation as real upstream output.
#[derive(Clone)]
pub struct MockPuzzleClient {
    replies: Arc<Mutex<Vec<String>>>,
    failure: Arc<Mutex<Option<String>>>,
    call_count: Arc<Mutex<usize>>,
}

impl MockPuzzleClient {
    pub fn new() -> Self {
        Self {
            replies: Arc::new(Mutex::new(Vec::new())),
            failure: Arc::new(Mutex::new(None)),
            call_count: Arc::new(Mutex::new(0)),
        }
    }

    pub fn with_reply(self, reply: String) -> Self {
        self.replies.lock().unwrap().push(reply);
        self
    }

    /// Every call fails with an upstream error carrying `message`.
    pub fn with_failure(self, message: &str) -> Self {
        *self.failure.lock().unwrap() = Some(message.to_string());
        self
    }

    pub fn get_call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    fn default_reply(topic: &str) -> String {
        serde_json::json!({
            "answer": "lantern",
            "image_prompts": [
                format!("A glowing paper light floating above {}", topic),
                "A miner's light hanging in a dark tunnel",
                "A festival of floating lights on a river",
                "A ship's light swinging in a storm"
            ],
            "image_paths": [],
            "educational_fact": "Paper versions were used in China over two thousand years ago."
        })
        .to_string()
    }
}

impl Default for MockPuzzleClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PuzzleService for MockPuzzleClient {
    async fn generate_puzzle(&self, topic: &str, _difficulty: &str) -> Result<PuzzleDraft> {
        let topic = require_topic(topic)?;

        let count = {
            let mut count = self.call_count.lock().unwrap();
            *count += 1;
            *count
        };

        if let Some(message) = self.failure.lock().unwrap().clone() {
            return Err(Error::AiProvider(message));
        }

        let reply = {
            let replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                Self::default_reply(topic)
            } else {
                replies[(count - 1) % replies.len()].clone()
            }
        };

        if reply.trim().is_empty() {
            return Err(Error::EmptyContent);
        }
        PuzzleDraft::from_json(&reply)
    }
}

/// Scripted image model. Prompts containing any registered failure marker
/// fail; everything else returns a small valid PNG (or the configured bytes).
#[derive(Clone)]
pub struct MockImageGenerationClient {
    image_response: Arc<Mutex<Option<Vec<u8>>>>,
    failing_markers: Arc<Mutex<Vec<String>>>,
    delay: Option<Duration>,
    call_count: Arc<Mutex<usize>>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

impl MockImageGenerationClient {
    pub fn new() -> Self {
        Self {
            image_response: Arc::new(Mutex::new(None)),
            failing_markers: Arc::new(Mutex::new(Vec::new())),
            delay: None,
            call_count: Arc::new(Mutex::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_image_response(self, response: Vec<u8>) -> Self {
        *self.image_response.lock().unwrap() = Some(response);
        self
    }

    pub fn with_failing_prompt(self, marker: &str) -> Self {
        self.failing_markers.lock().unwrap().push(marker.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn get_call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    /// Highest number of calls observed running at once.
    pub fn get_peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Encode a tiny solid-colour PNG.
    pub fn sample_png() -> Result<Vec<u8>> {
        let img = image::RgbaImage::from_pixel(4, 4, image::Rgba([30, 144, 255, 255]));
        let mut bytes = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)?;
        Ok(bytes)
    }
}

impl Default for MockImageGenerationClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageGenerationService for MockImageGenerationClient {
    async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>> {
        *self.call_count.lock().unwrap() += 1;

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let should_fail = self
            .failing_markers
            .lock()
            .unwrap()
            .iter()
            .any(|marker| prompt.contains(marker.as_str()));
        if should_fail {
            return Err(Error::AiProvider("Mock image failure".to_string()));
        }

        let configured = self.image_response.lock().unwrap().clone();
        match configured {
            Some(bytes) => Ok(bytes),
            None => Self::sample_png(),
        }
    }
}
