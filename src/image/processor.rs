use super::ImageService;
use crate::{Error, Result};
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

pub struct ImageProcessor {
    output_dir: PathBuf,
}

impl ImageProcessor {
    pub fn new(output_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(output_dir)?;
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    async fn save_png(&self, image: DynamicImage, path: &Path) -> Result<()> {
        tokio::task::spawn_blocking({
            let path = path.to_path_buf();
            move || image.save_with_format(path, ImageFormat::Png)
        })
        .await
        .map_err(|e| Error::Invariant(format!("Image save task join error: {}", e)))??;
        Ok(())
    }
}

#[async_trait]
impl ImageService for ImageProcessor {
    async fn save_image(&self, image_data: &[u8], file_name: &str) -> Result<String> {
        // Only bare file names land in the shared directory.
        if Path::new(file_name).file_name() != Some(OsStr::new(file_name)) {
            return Err(Error::Invariant(format!(
                "Refusing to write image outside output dir: {:?}",
                file_name
            )));
        }

        let img = image::load_from_memory(image_data)?;
        let path = self.output_dir.join(file_name);

        self.save_png(img, &path).await?;
        tracing::info!("Image saved to: {}", path.display());

        Ok(file_name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // JPEG input, so saving has to re-encode.
    fn create_test_image() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(10, 10, image::Rgb([255, 0, 0]));
        let mut bytes = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut bytes), ImageFormat::Jpeg)
            .unwrap();
        bytes
    }

    #[tokio::test]
    async fn test_save_image_writes_png() {
        let temp_dir = TempDir::new().unwrap();
        let processor = ImageProcessor::new(temp_dir.path()).unwrap();

        let id = processor
            .save_image(&create_test_image(), "apple_1.png")
            .await
            .unwrap();

        assert_eq!(id, "apple_1.png");
        let path = temp_dir.path().join("apple_1.png");
        assert!(path.exists());

        let saved = std::fs::read(&path).unwrap();
        assert_eq!(image::guess_format(&saved).unwrap(), ImageFormat::Png);
        let decoded = image::load_from_memory(&saved).unwrap();
        assert_eq!(decoded.width(), 10);
    }

    #[tokio::test]
    async fn test_new_creates_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("public").join("generated_images");

        let processor = ImageProcessor::new(&nested).unwrap();
        assert!(processor.output_dir().is_dir());
    }

    #[tokio::test]
    async fn test_undecodable_bytes_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let processor = ImageProcessor::new(temp_dir.path()).unwrap();

        let err = processor
            .save_image(b"definitely not an image", "bad_1.png")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Image(_)));
        assert!(!temp_dir.path().join("bad_1.png").exists());
    }

    #[tokio::test]
    async fn test_path_components_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let processor = ImageProcessor::new(temp_dir.path()).unwrap();

        for name in ["../escape.png", "nested/dir.png", ""] {
            let err = processor
                .save_image(&create_test_image(), name)
                .await
                .unwrap_err();
            assert!(matches!(err, Error::Invariant(_)));
        }
    }

    #[tokio::test]
    async fn test_same_name_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let processor = ImageProcessor::new(temp_dir.path()).unwrap();

        processor.save_image(&create_test_image(), "x_1.png").await.unwrap();
        processor.save_image(&create_test_image(), "x_1.png").await.unwrap();

        let count = std::fs::read_dir(temp_dir.path()).unwrap().count();
        assert_eq!(count, 1);
    }
}
