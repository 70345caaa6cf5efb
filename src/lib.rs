//! # pdflatte
//!
//! Transcribe PDF documents into Markdown with LaTeX math using a vision
//! language model, optionally translate the result, and export it as a
//! styled PDF with the math rendered as MathML.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input      resolve local file or download from URL
//!  ├─ 2. Render     rasterise pages via pdfium (spawn_blocking)
//!  ├─ 3. Resize     longest edge ≤ 1000 px (Lanczos3)
//!  ├─ 4. Transcribe one vision call per page, bounded concurrency
//!  ├─ 5. Assemble   page texts in page order, `--- PAGE n ---` headers
//!  ├─ 6. Translate  optional; per page or whole document
//!  └─ 7. Export     optional; Markdown + MathML → HTML → PDF
//! ```
//!
//! Steps 4 and 6 run through [`PageJobScheduler`]: at most `max_workers`
//! remote calls in flight, results placed by page index whatever order they
//! finish in, and a failed page becomes an error placeholder instead of
//! failing the document.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdflatte::{transcribe, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from GEMINI_API_KEY / OPENAI_API_KEY / ...
//!     let config = PipelineConfig::default();
//!     let session = transcribe("paper.pdf", &config).await?;
//!     println!("{}", session.transcription_download()?.contents);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdflatte` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdflatte = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod document;
pub mod error;
pub mod export;
pub mod math;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod scheduler;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PageDelimiter, PipelineConfig, PipelineConfigBuilder, TranslationMode};
pub use convert::{transcribe, transcribe_bytes, transcribe_sync, write_output};
pub use document::DocumentPipeline;
pub use error::{PdflatteError, RemoteError};
pub use export::{CommandPdfRenderer, ExportStyle, PdfExport, PdfRenderer};
pub use math::{LatexToMathml, MathConverter, MathDisplay};
pub use output::{
    AssembledDocument, Job, JobKind, JobResult, JobStatus, Page, ResultSet, TranscribeJob,
    TranslateJob,
};
pub use pipeline::llm::{LlmTranscriber, LlmTranslator, Transcriber, Translator};
pub use pipeline::preprocess::ImagePreprocessor;
pub use pipeline::render::{PdfiumRasterizer, Rasterizer};
pub use progress::{NoopProgress, ProgressCallback, ProgressHandle};
pub use scheduler::PageJobScheduler;
pub use session::{
    DocumentSession, DocumentStage, ExportSource, TextDownload, Transcription, Translation,
};
