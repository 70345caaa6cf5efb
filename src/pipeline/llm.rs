//! Remote model adapters: one page image → text, one text → translation.
//!
//! [`Transcriber`] and [`Translator`] are the seams the pipeline depends on.
//! [`LlmTranscriber`] and [`LlmTranslator`] implement them over an
//! `edgequake_llm` provider.
//!
//! ## Statelessness
//!
//! Each call builds a fresh message list from the fixed instruction and its
//! own input, and nothing about a call is remembered afterwards. Page `n`
//! never sees the content of page `n - 1`.
//!
//! No retries: a failed call fails that page.

use crate::config::PipelineConfig;
use crate::error::RemoteError;
use crate::pipeline::{encode, postprocess};
use crate::prompts::{translation_prompt, TRANSCRIPTION_PROMPT};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use image::DynamicImage;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Transcribes one page image into Markdown with LaTeX math.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, image: DynamicImage) -> Result<String, RemoteError>;
}

/// Translates one text blob, keeping LaTeX spans verbatim.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String, RemoteError>;
}

/// Vision-model transcription over an `edgequake_llm` provider.
pub struct LlmTranscriber {
    provider: Arc<dyn LLMProvider>,
    prompt: String,
    options: CompletionOptions,
}

impl LlmTranscriber {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &PipelineConfig) -> Self {
        Self {
            provider,
            prompt: config
                .transcription_prompt
                .clone()
                .unwrap_or_else(|| TRANSCRIPTION_PROMPT.to_string()),
            options: build_options(config),
        }
    }
}

#[async_trait]
impl Transcriber for LlmTranscriber {
    async fn transcribe(&self, image: DynamicImage) -> Result<String, RemoteError> {
        let start = Instant::now();
        let image_data = encode::encode_page(&image)?;
        drop(image);

        let messages = vec![ChatMessage::user_with_images(
            self.prompt.as_str(),
            vec![image_data],
        )];

        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| RemoteError::classify(e.to_string()))?;

        debug!(
            "Transcription: {} input tokens, {} output tokens, {:?}",
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );
        finish(&response.content)
    }
}

/// Text-model translation over an `edgequake_llm` provider.
pub struct LlmTranslator {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
}

impl LlmTranslator {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &PipelineConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
        }
    }
}

#[async_trait]
impl Translator for LlmTranslator {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String, RemoteError> {
        let start = Instant::now();
        let messages = vec![
            ChatMessage::system(translation_prompt(target_language)),
            ChatMessage::user(text),
        ];

        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| RemoteError::classify(e.to_string()))?;

        debug!(
            "Translation to {}: {} chars in, {} chars out, {:?}",
            target_language,
            text.len(),
            response.content.len(),
            start.elapsed()
        );
        finish(&response.content)
    }
}

/// Clean a raw model reply; an empty reply is an error.
fn finish(raw: &str) -> Result<String, RemoteError> {
    let cleaned = postprocess::clean_response(raw);
    if cleaned.is_empty() {
        return Err(RemoteError::EmptyResponse);
    }
    Ok(cleaned)
}

/// Build `CompletionOptions` from the pipeline config.
fn build_options(config: &PipelineConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_options_defaults() {
        let config = PipelineConfig::default();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.1));
        assert_eq!(opts.max_tokens, Some(8192));
    }

    #[test]
    fn finish_strips_fences_and_rejects_blank() {
        assert_eq!(finish("```markdown\n$x$\n```").unwrap(), "$x$");
        assert_eq!(finish("  \n ").unwrap_err(), RemoteError::EmptyResponse);
    }
}
