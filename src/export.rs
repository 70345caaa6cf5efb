//! Document export: Markdown + LaTeX → HTML with MathML → PDF.
//!
//! HTML rendering is pure and infallible. Turning HTML into a PDF is
//! delegated to a [`PdfRenderer`]; the default [`CommandPdfRenderer`] pipes
//! the page through an external command (`weasyprint - -`).
//!
//! A failed export leaves the session untouched, so it can be retried with
//! a different renderer.

use crate::error::PdflatteError;
use crate::math::{escape_html, protect_math_spans, MathConverter};
use async_trait::async_trait;
use pulldown_cmark::{html, Options, Parser};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

/// Style sheet selection for an exported document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportStyle {
    /// Left-to-right layout. (default)
    #[default]
    Default,
    /// Right-to-left layout for Arabic-script and Hebrew text.
    RightToLeft,
}

/// Languages whose translations export with [`ExportStyle::RightToLeft`].
const RTL_LANGUAGES: [&str; 10] = [
    "arabic", "ar", "hebrew", "he", "persian", "farsi", "fa", "urdu", "ur", "العربية",
];

impl ExportStyle {
    /// RTL for right-to-left target languages, default otherwise.
    pub fn for_language(language: Option<&str>) -> Self {
        match language {
            Some(lang) if RTL_LANGUAGES.contains(&lang.trim().to_lowercase().as_str()) => {
                ExportStyle::RightToLeft
            }
            _ => ExportStyle::Default,
        }
    }

    pub fn stylesheet(self) -> &'static str {
        match self {
            ExportStyle::Default => DEFAULT_CSS,
            ExportStyle::RightToLeft => RTL_CSS,
        }
    }

    fn dir(self) -> &'static str {
        match self {
            ExportStyle::Default => "ltr",
            ExportStyle::RightToLeft => "rtl",
        }
    }
}

const DEFAULT_CSS: &str = r#"@page { size: A4; margin: 2cm; }
body { font-family: "DejaVu Serif", Georgia, serif; font-size: 11pt; line-height: 1.5; color: #222; }
h1, h2, h3, h4 { font-family: "DejaVu Sans", Helvetica, sans-serif; color: #111; margin-top: 1.2em; }
p { margin: 0.5em 0; text-align: justify; }
math[display="block"] { display: block; margin: 0.8em auto; text-align: center; }
table { border-collapse: collapse; margin: 0.8em 0; }
th, td { border: 1px solid #999; padding: 4px 8px; }
pre, code { font-family: "DejaVu Sans Mono", monospace; font-size: 9.5pt; }
hr { border: none; border-top: 1px solid #bbb; margin: 1.5em 0; }
"#;

const RTL_CSS: &str = r#"@page { size: A4; margin: 2cm; }
body { direction: rtl; text-align: right; font-family: "Amiri", "Noto Naskh Arabic", "DejaVu Sans", serif; font-size: 13pt; line-height: 1.8; color: #222; }
h1, h2, h3, h4 { font-family: "Noto Kufi Arabic", "DejaVu Sans", sans-serif; color: #111; margin-top: 1.2em; }
p { margin: 0.5em 0; }
ul, ol { padding-right: 1.5em; padding-left: 0; }
math { direction: ltr; }
math[display="block"] { display: block; margin: 0.8em auto; text-align: center; }
table { border-collapse: collapse; margin: 0.8em 0; direction: rtl; }
th, td { border: 1px solid #999; padding: 4px 8px; }
pre, code { direction: ltr; text-align: left; font-family: "DejaVu Sans Mono", monospace; font-size: 10pt; }
hr { border: none; border-top: 1px solid #bbb; margin: 1.5em 0; }
"#;

/// Render Markdown with LaTeX spans into a standalone HTML document.
pub fn render_html(
    markdown: &str,
    title: &str,
    style: ExportStyle,
    math: &dyn MathConverter,
) -> String {
    // Math is swapped out first so emphasis and table syntax cannot split it.
    let protected = protect_math_spans(markdown, math);

    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    let parser = Parser::new_ext(&protected.text, options);

    let mut rendered = String::with_capacity(protected.text.len() * 3 / 2);
    html::push_html(&mut rendered, parser);
    let body = protected.restore(&rendered);

    format!(
        "<!DOCTYPE html>\n<html dir=\"{dir}\">\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n<style>\n{css}</style>\n</head>\n<body>\n{body}</body>\n</html>\n",
        dir = style.dir(),
        title = escape_html(title),
        css = style.stylesheet(),
        body = body,
    )
}

/// A rendered PDF together with its download file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfExport {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Turns a standalone HTML document into PDF bytes.
#[async_trait]
pub trait PdfRenderer: Send + Sync {
    async fn render(&self, html: &str) -> Result<Vec<u8>, PdflatteError>;
}

/// Runs an external HTML-to-PDF command that reads HTML on stdin and writes
/// the PDF to stdout.
#[derive(Debug, Clone)]
pub struct CommandPdfRenderer {
    program: String,
    args: Vec<String>,
}

impl CommandPdfRenderer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Parse a whitespace-separated command line such as `"weasyprint - -"`.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }
}

impl Default for CommandPdfRenderer {
    fn default() -> Self {
        Self::new("weasyprint", vec!["-".into(), "-".into()])
    }
}

#[async_trait]
impl PdfRenderer for CommandPdfRenderer {
    async fn render(&self, html: &str) -> Result<Vec<u8>, PdflatteError> {
        info!("Rendering PDF with '{}'", self.program);
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| PdflatteError::RendererUnavailable {
                program: self.program.clone(),
                source,
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| PdflatteError::Internal("renderer stdin not captured".into()))?;
        let input = html.as_bytes().to_vec();
        // Feed stdin concurrently so a renderer that streams output cannot
        // deadlock against a full stdout pipe.
        let writer = tokio::spawn(async move {
            let res = stdin.write_all(&input).await;
            drop(stdin);
            res
        });

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| PdflatteError::ExportFailed {
                detail: format!("waiting for '{}': {}", self.program, e),
            })?;

        if let Ok(Err(e)) = writer.await {
            debug!("Renderer closed stdin early: {}", e);
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PdflatteError::ExportFailed {
                detail: format!("'{}' exited with {}: {}", self.program, output.status, stderr.trim()),
            });
        }
        if !output.stdout.starts_with(b"%PDF") {
            return Err(PdflatteError::ExportFailed {
                detail: format!("'{}' did not produce a PDF", self.program),
            });
        }

        debug!("Renderer produced {} bytes", output.stdout.len());
        Ok(output.stdout)
    }
}
