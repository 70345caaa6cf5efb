//! Instructions sent to the remote models.
//!
//! Every prompt lives here so a wording change touches one place and unit
//! tests can inspect the text without a model. Callers can override the
//! transcription instruction via
//! [`crate::config::PipelineConfig::transcription_prompt`].

/// Fixed instruction sent alongside every page image.
pub const TRANSCRIPTION_PROMPT: &str = "Please transcribe all the text content from this image accurately. \
Preserve paragraphs, bullet points, and overall formatting. \
For ALL mathematical expressions and equations, provide them in proper LaTeX format \
surrounded by $ for inline math or $$ for display math. This is critical for proper rendering. \
Do not add any explanatory text or commentary to your transcription. \
Do not wrap the output in code fences.";

/// Build the translation instruction for `target_language`.
///
/// LaTeX spans must survive untouched: the export step converts them to
/// MathML and a translated formula no longer parses.
pub fn translation_prompt(target_language: &str) -> String {
    format!(
        "Translate the following text into {target_language}. \
Preserve all LaTeX math expressions enclosed in $...$ or $$...$$ exactly as they are, \
without translating or modifying them. Translate only the surrounding prose. \
Keep the Markdown structure (headings, lists, tables, emphasis) intact. \
Do not add any explanatory text or commentary, and do not wrap the output in code fences."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcription_prompt_demands_latex_delimiters() {
        assert!(TRANSCRIPTION_PROMPT.contains("$$ for display math"));
        assert!(TRANSCRIPTION_PROMPT.contains("code fences"));
    }

    #[test]
    fn translation_prompt_names_language_and_preserves_math() {
        let p = translation_prompt("Arabic");
        assert!(p.contains("into Arabic"));
        assert!(p.contains("$...$"));
        assert!(p.contains("$$...$$"));
    }
}
