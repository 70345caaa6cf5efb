//! Top-level entry points and provider resolution.
//!
//! [`transcribe`] is the one-call API: resolve the input, build a
//! [`DocumentPipeline`] from the config, rasterise, transcribe, and
//! translate when a target language is configured. Use
//! [`DocumentPipeline`] directly to drive the stages one at a time.

use crate::config::PipelineConfig;
use crate::document::DocumentPipeline;
use crate::error::PdflatteError;
use crate::pipeline::input;
use crate::session::DocumentSession;
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Model used when Gemini is picked without an explicit model.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Model used for any other named provider without an explicit model.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4.1-nano";

/// Transcribe a PDF file or URL.
///
/// # Returns
/// `Ok(DocumentSession)` once every page has a result, even if some pages
/// failed (their text is an error placeholder).
///
/// # Errors
/// Only fatal problems: unreadable input, not a PDF, rasterisation failure,
/// no LLM provider.
///
/// # Example
/// ```rust,no_run
/// use pdflatte::{transcribe, PipelineConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = PipelineConfig::builder().target_language("French").build()?;
/// let session = transcribe("paper.pdf", &config).await?;
/// println!("{}", session.transcription_download()?.contents);
/// # Ok(())
/// # }
/// ```
pub async fn transcribe(
    input_str: impl AsRef<str>,
    config: &PipelineConfig,
) -> Result<DocumentSession, PdflatteError> {
    let start = Instant::now();
    let input_str = input_str.as_ref();
    info!("Starting transcription: {}", input_str);

    let source = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let pipeline = DocumentPipeline::from_config(config.clone()).await?;
    let session = pipeline.open_source(source).await?;
    let session = pipeline.process_session(session).await?;

    info!("Finished '{}' in {:?}", session.name, start.elapsed());
    Ok(session)
}

/// Transcribe PDF bytes already in memory.
pub async fn transcribe_bytes(
    name: impl Into<String>,
    bytes: Vec<u8>,
    config: &PipelineConfig,
) -> Result<DocumentSession, PdflatteError> {
    let pipeline = DocumentPipeline::from_config(config.clone()).await?;
    pipeline.process(name, bytes).await
}

/// Synchronous wrapper around [`transcribe`].
///
/// Creates a temporary tokio runtime internally.
pub fn transcribe_sync(
    input_str: impl AsRef<str>,
    config: &PipelineConfig,
) -> Result<DocumentSession, PdflatteError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| PdflatteError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(transcribe(input_str, config))
}

/// Write `contents` to `path`, creating parent directories.
///
/// Writes to a sibling temp file and renames it into place so a crash never
/// leaves a truncated download behind.
pub async fn write_output(path: impl AsRef<Path>, contents: &[u8]) -> Result<(), PdflatteError> {
    let path = path.as_ref();
    let fail = |source| PdflatteError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(fail)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = std::path::PathBuf::from(tmp_name);
    tokio::fs::write(&tmp_path, contents).await.map_err(fail)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(fail)?;
    Ok(())
}

// ── Provider resolution ──────────────────────────────────────────────────

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, PdflatteError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        PdflatteError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Default model for a named provider.
fn default_model(provider_name: &str) -> &'static str {
    match provider_name.to_ascii_lowercase().as_str() {
        "gemini" | "google" | "vertexai" => DEFAULT_GEMINI_MODEL,
        _ => DEFAULT_OPENAI_MODEL,
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Resolve the LLM provider, from most-specific to least-specific:
///
/// 1. `config.provider`, used as-is.
/// 2. `config.provider_name` with `config.model` (or that provider's
///    default model).
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when both are set.
/// 4. Gemini when `GEMINI_API_KEY` or `GOOGLE_API_KEY` is present.
/// 5. Whatever `ProviderFactory::from_env` detects.
pub(crate) async fn resolve_provider(
    config: &PipelineConfig,
) -> Result<Arc<dyn LLMProvider>, PdflatteError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or_else(|| default_model(name));
        return create_vision_provider(name, model);
    }

    if let (Some(prov), Some(model)) = (
        env_non_empty("EDGEQUAKE_LLM_PROVIDER"),
        env_non_empty("EDGEQUAKE_MODEL"),
    ) {
        return create_vision_provider(&prov, &model);
    }

    if env_non_empty("GEMINI_API_KEY").is_some() || env_non_empty("GOOGLE_API_KEY").is_some() {
        let model = config.model.as_deref().unwrap_or(DEFAULT_GEMINI_MODEL);
        return create_vision_provider("gemini", model);
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| PdflatteError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY, OPENAI_API_KEY, or ANTHROPIC_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gemini_defaults_to_flash() {
        assert_eq!(default_model("gemini"), "gemini-2.0-flash");
        assert_eq!(default_model("Google"), "gemini-2.0-flash");
        assert_eq!(default_model("openai"), "gpt-4.1-nano");
    }

    #[tokio::test]
    async fn write_output_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out/report_transcription.txt");
        write_output(&path, b"hello").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello");
        assert!(!dir.path().join("nested/out/report_transcription.txt.tmp").exists());
    }

    #[tokio::test]
    async fn missing_input_is_fatal() {
        let config = PipelineConfig::default();
        let err = transcribe("/definitely/not/here.pdf", &config)
            .await
            .unwrap_err();
        assert!(matches!(err, PdflatteError::FileNotFound { .. }), "got: {err:?}");
    }
}
