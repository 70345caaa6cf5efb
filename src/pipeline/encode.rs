//! Page images to the inline form vision models take.
//!
//! Vision APIs accept images as base64 data embedded in the JSON request
//! body. PNG keeps rendered glyph edges and thin fraction bars intact, which
//! matters more for formula transcription than payload size.

use crate::error::RemoteError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// PNG-encode a page image into raw bytes.
pub fn png_bytes(img: &DynamicImage) -> Result<Vec<u8>, RemoteError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| RemoteError::Encoding {
            detail: e.to_string(),
        })?;
    Ok(buf)
}

/// Encode a page as a base64 PNG ready for the vision API.
pub fn encode_page(img: &DynamicImage) -> Result<ImageData, RemoteError> {
    let png = png_bytes(img)?;
    let b64 = STANDARD.encode(&png);
    debug!(
        "Encoded {}x{} image → {} PNG bytes, {} bytes base64",
        img.width(),
        img.height(),
        png.len(),
        b64.len()
    );

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn page_becomes_inline_png() {
        let page = DynamicImage::ImageLuma8(GrayImage::from_pixel(12, 7, Luma([200])));
        let data = encode_page(&page).expect("page encodes");
        assert_eq!(data.mime_type, "image/png");
        let raw = STANDARD.decode(&data.data).expect("base64 payload");
        assert_eq!(raw, png_bytes(&page).expect("png bytes"));
        assert!(raw.starts_with(b"\x89PNG"));
    }
}
