//! Pipeline stages for PDF transcription.
//!
//! Each submodule implements one transformation step and is testable on its
//! own; [`crate::document::DocumentPipeline`] sequences them.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ preprocess ──▶ llm (encode + call) ──▶ postprocess
//! (path/URL) (pdfium)   (≤1000 px)    (vision / text model)   (cleanup)
//! ```
//!
//! 1. [`input`]: read a local file or download a URL into PDF bytes
//! 2. [`render`]: rasterise every page; runs in `spawn_blocking`
//! 3. [`preprocess`]: bound the image size sent to the model
//! 4. [`encode`]: PNG-encode and base64-wrap a page for the request body
//! 5. [`llm`]: the remote transcription and translation adapters
//! 6. [`postprocess`]: deterministic cleanup of model replies

pub mod encode;
pub mod input;
pub mod llm;
pub mod postprocess;
pub mod preprocess;
pub mod render;
