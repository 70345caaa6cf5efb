//! PDF rasterisation: render every page to a `DynamicImage`.
//!
//! The [`Rasterizer`] trait is the seam the pipeline depends on;
//! [`PdfiumRasterizer`] is the production implementation.
//!
//! ## Threading
//!
//! pdfium is a C++ library with thread-local state and CPU-heavy rendering.
//! [`rasterize`] moves the work onto tokio's blocking pool so async worker
//! threads never stall while pages render.

use crate::error::PdflatteError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::sync::Arc;
use tracing::{debug, info};

/// Converts PDF bytes into one image per page, in page order.
pub trait Rasterizer: Send + Sync {
    /// Render every page of `pdf` at `dpi`.
    ///
    /// `name` is only used in error messages.
    fn rasterize(
        &self,
        name: &str,
        pdf: &[u8],
        dpi: u32,
    ) -> Result<Vec<DynamicImage>, PdflatteError>;
}

/// Run `rasterizer` on tokio's blocking thread pool.
pub async fn rasterize(
    rasterizer: Arc<dyn Rasterizer>,
    name: &str,
    pdf: Vec<u8>,
    dpi: u32,
) -> Result<Vec<DynamicImage>, PdflatteError> {
    let name = name.to_string();
    tokio::task::spawn_blocking(move || rasterizer.rasterize(&name, &pdf, dpi))
        .await
        .map_err(|e| PdflatteError::Internal(format!("Render task panicked: {}", e)))?
}

/// pdfium-backed rasterizer.
///
/// The library is bound on every call: from `PDFIUM_LIB_PATH` when set,
/// otherwise from the system library search path.
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    password: Option<String>,
    max_pixels: u32,
}

impl PdfiumRasterizer {
    pub fn new(password: Option<String>, max_pixels: u32) -> Self {
        Self {
            password,
            max_pixels,
        }
    }

    fn bind() -> Result<Pdfium, PdflatteError> {
        let bindings = match std::env::var("PDFIUM_LIB_PATH") {
            Ok(path) if !path.is_empty() => Pdfium::bind_to_library(&path),
            _ => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| PdflatteError::PdfiumBindingFailed(format!("{:?}", e)))?;
        Ok(Pdfium::new(bindings))
    }
}

impl Default for PdfiumRasterizer {
    fn default() -> Self {
        Self::new(None, 4000)
    }
}

impl Rasterizer for PdfiumRasterizer {
    fn rasterize(
        &self,
        name: &str,
        pdf: &[u8],
        dpi: u32,
    ) -> Result<Vec<DynamicImage>, PdflatteError> {
        let pdfium = Self::bind()?;
        let password = self.password.as_deref();

        let document = pdfium.load_pdf_from_byte_slice(pdf, password).map_err(|e| {
            let err_str = format!("{:?}", e);
            if err_str.contains("Password") || err_str.contains("password") {
                if password.is_some() {
                    PdflatteError::WrongPassword {
                        name: name.to_string(),
                    }
                } else {
                    PdflatteError::PasswordRequired {
                        name: name.to_string(),
                    }
                }
            } else {
                PdflatteError::CorruptPdf {
                    name: name.to_string(),
                    detail: err_str,
                }
            }
        })?;

        let pages = document.pages();
        let total_pages = pages.len() as usize;
        info!("PDF loaded: {} pages, rendering at {} DPI", total_pages, dpi);

        // PDF user space is 72 units per inch.
        let render_config = PdfRenderConfig::new()
            .scale_page_by_factor(dpi as f32 / 72.0)
            .set_maximum_width(self.max_pixels as i32)
            .set_maximum_height(self.max_pixels as i32);

        let mut images = Vec::with_capacity(total_pages);
        for (idx, page) in pages.iter().enumerate() {
            let bitmap = page.render_with_config(&render_config).map_err(|e| {
                PdflatteError::RasterisationFailed {
                    page: idx + 1,
                    detail: format!("{:?}", e),
                }
            })?;

            let image = bitmap.as_image();
            debug!(
                "Rendered page {} → {}x{} px",
                idx + 1,
                image.width(),
                image.height()
            );
            images.push(image);
        }

        Ok(images)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    struct Blank(usize);

    impl Rasterizer for Blank {
        fn rasterize(
            &self,
            _name: &str,
            _pdf: &[u8],
            dpi: u32,
        ) -> Result<Vec<DynamicImage>, PdflatteError> {
            Ok((0..self.0)
                .map(|_| DynamicImage::ImageRgb8(RgbImage::from_pixel(dpi, dpi, Rgb([0, 0, 0]))))
                .collect())
        }
    }

    #[tokio::test]
    async fn rasterize_runs_on_blocking_pool() {
        let images = rasterize(Arc::new(Blank(3)), "doc.pdf", b"%PDF".to_vec(), 72)
            .await
            .unwrap();
        assert_eq!(images.len(), 3);
        assert_eq!(images[0].width(), 72);
    }

    #[test]
    fn default_rasterizer_caps_pixels() {
        let r = PdfiumRasterizer::default();
        assert_eq!(r.max_pixels, 4000);
        assert!(r.password.is_none());
    }
}
