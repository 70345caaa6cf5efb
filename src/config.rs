//! Configuration for a transcription run.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built via
//! its [`PipelineConfigBuilder`].

use crate::error::PdflatteError;
use crate::progress::ProgressHandle;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for a [`crate::document::DocumentPipeline`].
///
/// # Example
/// ```rust
/// use pdflatte::{PipelineConfig, TranslationMode};
///
/// let config = PipelineConfig::builder()
///     .max_workers(4)
///     .target_language("French")
///     .translation_mode(TranslationMode::PerPage)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_workers, 4);
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Rasterisation DPI. Range: 72–600. Default: 300.
    pub dpi: u32,

    /// Hard cap on either rendered dimension, applied by the rasterizer
    /// before preprocessing. Default: 4000.
    ///
    /// Keeps an A0 poster at 300 DPI from allocating hundreds of megabytes.
    pub max_rendered_pixels: u32,

    /// Longest edge sent to the model; larger pages are downscaled.
    /// Default: 1000.
    pub max_image_dimension: u32,

    /// Maximum number of remote calls in flight. Default: 3.
    ///
    /// `1` selects sequential mode: pages go out strictly in order with
    /// [`Self::request_pause`] between them.
    pub max_workers: usize,

    /// Pause between consecutive requests in sequential mode. Default: 1 s.
    ///
    /// Reduces the chance of hitting a rate limit; it does not retry.
    pub request_pause: Duration,

    /// LLM model identifier, e.g. "gemini-2.0-flash". If None, the provider
    /// default is used.
    pub model: Option<String>,

    /// LLM provider name (e.g. "gemini", "openai", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.1.
    pub temperature: f32,

    /// Maximum output tokens per call. Default: 8192.
    pub max_tokens: usize,

    /// Custom transcription instruction. If None, uses
    /// [`crate::prompts::TRANSCRIPTION_PROMPT`].
    pub transcription_prompt: Option<String>,

    /// Target language for the optional translation round.
    pub target_language: Option<String>,

    /// How the translation round splits the document. Default: per page.
    pub translation_mode: TranslationMode,

    /// Block placed before each page in the assembled document.
    pub page_delimiter: PageDelimiter,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Receives scheduler progress events.
    pub progress: Option<ProgressHandle>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            max_rendered_pixels: 4000,
            max_image_dimension: 1000,
            max_workers: 3,
            request_pause: Duration::from_secs(1),
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 8192,
            transcription_prompt: None,
            target_language: None,
            translation_mode: TranslationMode::default(),
            page_delimiter: PageDelimiter::default(),
            password: None,
            download_timeout_secs: 120,
            progress: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("max_image_dimension", &self.max_image_dimension)
            .field("max_workers", &self.max_workers)
            .field("request_pause", &self.request_pause)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("target_language", &self.target_language)
            .field("translation_mode", &self.translation_mode)
            .field("page_delimiter", &self.page_delimiter)
            .field("progress", &self.progress.as_ref().map(|_| "<dyn ProgressCallback>"))
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// Whether the scheduler runs in sequential mode.
    pub fn is_sequential(&self) -> bool {
        self.max_workers <= 1
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn max_image_dimension(mut self, px: u32) -> Self {
        self.config.max_image_dimension = px;
        self
    }

    pub fn max_workers(mut self, n: usize) -> Self {
        self.config.max_workers = n.max(1);
        self
    }

    pub fn request_pause(mut self, pause: Duration) -> Self {
        self.config.request_pause = pause;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn transcription_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.transcription_prompt = Some(prompt.into());
        self
    }

    pub fn target_language(mut self, language: impl Into<String>) -> Self {
        self.config.target_language = Some(language.into());
        self
    }

    pub fn translation_mode(mut self, mode: TranslationMode) -> Self {
        self.config.translation_mode = mode;
        self
    }

    pub fn page_delimiter(mut self, delimiter: PageDelimiter) -> Self {
        self.config.page_delimiter = delimiter;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress(mut self, progress: ProgressHandle) -> Self {
        self.config.progress = Some(progress);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, PdflatteError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 600 {
            return Err(PdflatteError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.dpi
            )));
        }
        if c.max_workers == 0 {
            return Err(PdflatteError::InvalidConfig(
                "max_workers must be ≥ 1".into(),
            ));
        }
        if c.max_image_dimension < 16 {
            return Err(PdflatteError::InvalidConfig(format!(
                "max_image_dimension must be ≥ 16, got {}",
                c.max_image_dimension
            )));
        }
        if let Some(lang) = &c.target_language {
            if lang.trim().is_empty() {
                return Err(PdflatteError::InvalidConfig(
                    "target_language must not be empty".into(),
                ));
            }
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How the translation round splits its input.
///
/// Per-page keeps each request's context window bounded and reuses the
/// page ordering of the transcription; whole-document gives the model all
/// the context at once at the cost of one very large request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TranslationMode {
    /// One translation job per transcribed page. (default)
    #[default]
    PerPage,
    /// A single translation job over the assembled document.
    WholeDocument,
}

/// Block inserted before each page in an assembled document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageDelimiter {
    /// `--- PAGE n ---` header before every page. (default)
    #[default]
    PageHeader,
    /// Horizontal rule between pages.
    HorizontalRule,
    /// Custom string between pages.
    Custom(String),
}

impl PageDelimiter {
    /// The block placed before page `page_num` (1-indexed).
    ///
    /// `first` is true for the first page of the document; separators that
    /// only go *between* pages render as an empty string there.
    pub fn render(&self, page_num: usize, first: bool) -> String {
        match self {
            PageDelimiter::PageHeader => format!("\n\n--- PAGE {} ---\n\n", page_num),
            PageDelimiter::HorizontalRule if first => String::new(),
            PageDelimiter::HorizontalRule => "\n\n---\n\n".to_string(),
            PageDelimiter::Custom(_) if first => String::new(),
            PageDelimiter::Custom(s) => format!("\n\n{}\n\n", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let c = PipelineConfig::default();
        assert_eq!(c.dpi, 300);
        assert_eq!(c.max_image_dimension, 1000);
        assert_eq!(c.max_workers, 3);
        assert_eq!(c.request_pause, Duration::from_secs(1));
        assert_eq!(c.translation_mode, TranslationMode::PerPage);
        assert_eq!(c.page_delimiter, PageDelimiter::PageHeader);
    }

    #[test]
    fn builder_clamps_workers_to_one() {
        let c = PipelineConfig::builder().max_workers(0).build().unwrap();
        assert_eq!(c.max_workers, 1);
        assert!(c.is_sequential());
    }

    #[test]
    fn builder_rejects_blank_language() {
        let err = PipelineConfig::builder()
            .target_language("  ")
            .build()
            .unwrap_err();
        assert!(matches!(err, PdflatteError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_tiny_image_dimension() {
        assert!(PipelineConfig::builder()
            .max_image_dimension(4)
            .build()
            .is_err());
    }

    #[test]
    fn page_header_precedes_every_page() {
        let d = PageDelimiter::PageHeader;
        assert_eq!(d.render(1, true), "\n\n--- PAGE 1 ---\n\n");
        assert_eq!(d.render(2, false), "\n\n--- PAGE 2 ---\n\n");
    }

    #[test]
    fn between_page_delimiters_skip_first_page() {
        assert_eq!(PageDelimiter::HorizontalRule.render(1, true), "");
        assert_eq!(PageDelimiter::HorizontalRule.render(2, false), "\n\n---\n\n");
        let custom = PageDelimiter::Custom("* * *".into());
        assert_eq!(custom.render(3, false), "\n\n* * *\n\n");
    }
}
