//! Image preprocessing: bound the payload sent to the model.
//!
//! A 300-DPI letter page is about 2550 × 3300 px, far more than a vision
//! model needs to read text and large enough to trip request-size limits
//! once base64-encoded. Pages whose longest edge exceeds the limit are
//! downscaled with Lanczos3, keeping the aspect ratio.

use image::imageops::FilterType;
use image::DynamicImage;
use tracing::debug;

/// Deterministic resize policy applied before transcription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImagePreprocessor {
    max_dimension: u32,
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl ImagePreprocessor {
    pub fn new(max_dimension: u32) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
        }
    }

    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    /// Target size for a `width × height` image, or `None` if it fits.
    pub fn target_size(&self, width: u32, height: u32) -> Option<(u32, u32)> {
        if width <= self.max_dimension && height <= self.max_dimension {
            return None;
        }
        let max = self.max_dimension as f64;
        let ratio = (max / width as f64).min(max / height as f64);
        let w = ((width as f64 * ratio).round() as u32).max(1);
        let h = ((height as f64 * ratio).round() as u32).max(1);
        Some((w, h))
    }

    /// Return the image resized to fit, or an unchanged copy.
    pub fn apply(&self, image: &DynamicImage) -> DynamicImage {
        match self.target_size(image.width(), image.height()) {
            Some((w, h)) => {
                debug!(
                    "Resizing {}x{} → {}x{}",
                    image.width(),
                    image.height(),
                    w,
                    h
                );
                image.resize_exact(w, h, FilterType::Lanczos3)
            }
            None => image.clone(),
        }
    }
}
