//! Image persistence
//!
//! Decodes generated image bytes and writes them as PNG files into the
//! public directory the frontend serves.

pub mod mock;
pub mod processor;

pub use mock::MockImageProcessor;
pub use processor::ImageProcessor;

use crate::Result;
use async_trait::async_trait;

#[async_trait]
pub trait ImageService: Send + Sync {
    /// Decode `image_data` and persist it as `file_name`, returning the
    /// storage identifier clients use to fetch it.
    async fn save_image(&self, image_data: &[u8], file_name: &str) -> Result<String>;
}
