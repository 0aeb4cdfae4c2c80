use super::ImageService;
use crate::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// In-memory image store that records every file name it is asked to save.
#[derive(Clone)]
pub struct MockImageProcessor {
    saved: Arc<Mutex<Vec<String>>>,
    should_fail: Arc<Mutex<bool>>,
}

impl MockImageProcessor {
    pub fn new() -> Self {
        Self {
            saved: Arc::new(Mutex::new(Vec::new())),
            should_fail: Arc::new(Mutex::new(false)),
        }
    }

    pub fn with_failure(self, should_fail: bool) -> Self {
        *self.should_fail.lock().unwrap() = should_fail;
        self
    }

    pub fn get_saved(&self) -> Vec<String> {
        self.saved.lock().unwrap().clone()
    }

    pub fn get_process_count(&self) -> usize {
        self.saved.lock().unwrap().len()
    }
}

impl Default for MockImageProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageService for MockImageProcessor {
    async fn save_image(&self, _image_data: &[u8], file_name: &str) -> Result<String> {
        if *self.should_fail.lock().unwrap() {
            return Err(crate::Error::Image(image::ImageError::IoError(
                std::io::Error::other("Mock failure"),
            )));
        }

        self.saved.lock().unwrap().push(file_name.to_string());
        Ok(file_name.to_string())
    }
}
