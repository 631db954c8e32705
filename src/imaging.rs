//! Image preprocessing and temp caching.
//!
//! Uploaded images are resized to a fixed width before anything else sees
//! them, then written as JPEG to a shared per-process cache directory under
//! uniquely generated names. Cached files are read once when a multimodal
//! request is built and are never deleted: the cache grows unboundedly and
//! its lifecycle ends with process teardown. That is an accepted leak, not
//! an oversight.

use std::fs;
use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use uuid::Uuid;

use crate::error::PlaygroundError;

/// Fixed target width every uploaded image is resized to.
pub const IMAGE_WIDTH: u32 = 512;

/// The shared temp cache directory for preprocessed images.
pub fn cache_dir() -> PathBuf {
    std::env::temp_dir().join("gemini-playground")
}

/// Decodes an image from a file on disk.
pub fn load(path: &Path) -> Result<DynamicImage, PlaygroundError> {
    image::open(path).map_err(|e| {
        PlaygroundError::InputError(format!("failed to open image {}: {}", path.display(), e))
    })
}

/// Decodes an image from in-memory bytes (browser uploads arrive this way).
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, PlaygroundError> {
    image::load_from_memory(bytes)
        .map_err(|e| PlaygroundError::InputError(format!("failed to decode image: {}", e)))
}

/// Resizes an image to exactly [`IMAGE_WIDTH`] wide, preserving aspect
/// ratio: the new height is `round(h * IMAGE_WIDTH / w)`.
///
/// A zero-width source is a fatal input error, not recovered.
pub fn preprocess(image: &DynamicImage) -> Result<DynamicImage, PlaygroundError> {
    if image.width() == 0 {
        return Err(PlaygroundError::InputError(
            "image has zero width".to_string(),
        ));
    }
    let height =
        (image.height() as f64 * IMAGE_WIDTH as f64 / image.width() as f64).round() as u32;
    Ok(image.resize_exact(IMAGE_WIDTH, height, FilterType::Triangle))
}

/// Writes an image as RGB JPEG to the cache directory under a unique
/// filename and returns its path, creating the directory on demand.
/// Collisions are treated as negligible. Nothing ever cleans the cache up.
pub fn cache(image: &DynamicImage) -> Result<PathBuf, PlaygroundError> {
    let dir = cache_dir();
    fs::create_dir_all(&dir)?;
    let path = dir.join(format!("{}.jpeg", Uuid::new_v4()));
    image.to_rgb8().save_with_format(&path, ImageFormat::Jpeg)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_hits_target_width_and_rounds_height() {
        let image = DynamicImage::new_rgb8(100, 40);
        let resized = preprocess(&image).unwrap();
        assert_eq!(resized.width(), IMAGE_WIDTH);
        // round(40 * 512 / 100) = round(204.8)
        assert_eq!(resized.height(), 205);
    }

    #[test]
    fn resize_is_exact_for_even_ratios() {
        let image = DynamicImage::new_rgb8(1024, 768);
        let resized = preprocess(&image).unwrap();
        assert_eq!((resized.width(), resized.height()), (512, 384));
    }

    #[test]
    fn zero_width_image_is_input_error() {
        let image = DynamicImage::new_rgb8(0, 10);
        match preprocess(&image) {
            Err(PlaygroundError::InputError(_)) => {}
            other => panic!("expected InputError, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn cache_writes_unique_jpegs() {
        let image = DynamicImage::new_rgb8(4, 4);
        let first = cache(&image).unwrap();
        let second = cache(&image).unwrap();

        assert_ne!(first, second);
        assert!(first.starts_with(cache_dir()));
        assert_eq!(first.extension().and_then(|e| e.to_str()), Some("jpeg"));
        // the cached file decodes back as JPEG
        let bytes = fs::read(&first).unwrap();
        assert!(bytes.starts_with(&[0xFF, 0xD8, 0xFF]));
    }

    #[test]
    fn decode_rejects_garbage() {
        match decode(b"not an image") {
            Err(PlaygroundError::InputError(_)) => {}
            other => panic!("expected InputError, got {:?}", other.map(|_| ())),
        }
    }
}
