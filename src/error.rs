//! Error types for the pdflatte library.
//!
//! There are two failure scopes, one type each:
//!
//! * [`PdflatteError`]: **Fatal**: a pipeline stage cannot proceed at all
//!   (bad input file, corrupt PDF, provider not configured, PDF export
//!   failed). Returned as `Err(PdflatteError)` from the pipeline methods.
//!
//! * [`RemoteError`]: **Per-job**: one transcription or translation call
//!   failed. It never leaves the scheduler: the scheduler turns it into a
//!   failed [`crate::output::JobResult`] whose text replaces the page in the
//!   assembled document.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdflatte library.
#[derive(Debug, Error)]
pub enum PdflatteError {
    // ── Reading the input ────────────────────────────────────────────────
    /// Nothing exists at the local path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// The local file exists but cannot be read.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// Neither a path nor an http(s) URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// The URL parsed, but fetching it failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Fetching the URL took longer than `download_timeout_secs`.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The bytes were read, but they are not a PDF.
    #[error("'{name}' is not a valid PDF\nFirst bytes: {magic:?}")]
    NotAPdf { name: String, magic: Vec<u8> },

    // ── Rasterisation errors ──────────────────────────────────────────────
    /// pdfium could not parse the document structure.
    #[error("PDF '{name}' is corrupt: {detail}")]
    CorruptPdf { name: String, detail: String },

    /// Encrypted document, no password given.
    #[error("PDF '{name}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { name: String },

    /// Encrypted document, password rejected.
    #[error("Wrong password for PDF '{name}'")]
    WrongPassword { name: String },

    /// The rasterizer produced no pages.
    #[error("PDF '{name}' contains no pages")]
    EmptyDocument { name: String },

    /// pdfium returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// No usable libpdfium was found.
    #[error(
        "Could not load libpdfium: {0}\n\n\
Install pdfium system-wide, or set PDFIUM_LIB_PATH=/path/to/libpdfium\n\
to load a specific copy."
    )]
    PdfiumBindingFailed(String),

    // ── Provider ─────────────────────────────────────────────────────────
    /// No provider could be built, usually for lack of an API key.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Session errors ────────────────────────────────────────────────────
    /// A stage was requested before the stage it depends on ran.
    #[error("Cannot {action}: document is {stage}")]
    InvalidStage {
        action: &'static str,
        stage: crate::session::DocumentStage,
    },

    /// Page number outside the document.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    // ── Export errors ─────────────────────────────────────────────────────
    /// The external PDF renderer could not be started.
    #[error("Failed to start PDF renderer '{program}': {source}")]
    RendererUnavailable {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The PDF renderer ran but failed or produced something that is not a PDF.
    #[error("PDF export failed: {detail}")]
    ExportFailed { detail: String },

    // ── Writing results ──────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Rejected by `PipelineConfigBuilder::build` or a pipeline argument check.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A background task died or another should-not-happen condition.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A failure of one remote transcription or translation call.
///
/// The scheduler renders it as `"<kind> error: <this error>"` in place of
/// the page text, so every variant's message is written for an end user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// 401/403 or an invalid key. Retrying will not help.
    #[error(
        "authentication failed: {detail}\n\nThis is likely due to API key authentication issues. \
Please check that your API key is valid and has access to the model."
    )]
    Auth { detail: String },

    /// 429 or quota exhaustion.
    #[error("rate limit exceeded: {detail}")]
    RateLimited { detail: String },

    /// Any other failure reported by the provider or the network.
    #[error("{detail}")]
    Api { detail: String },

    /// The call succeeded but the model returned no text.
    #[error("model returned an empty response")]
    EmptyResponse,

    /// The page image could not be encoded for transport.
    #[error("image encoding failed: {detail}")]
    Encoding { detail: String },
}

impl RemoteError {
    /// Sort a provider error message into a [`RemoteError`] variant.
    ///
    /// Providers report status codes inconsistently (some as typed errors,
    /// some only inside the message), so the message text is what we match.
    pub fn classify(message: impl Into<String>) -> Self {
        let detail = message.into();
        let lower = detail.to_lowercase();

        const AUTH_MARKERS: [&str; 7] = [
            "401",
            "403",
            "unauthorized",
            "unauthenticated",
            "forbidden",
            "invalid api key",
            "permission denied",
        ];
        const RATE_MARKERS: [&str; 4] = ["429", "rate limit", "ratelimit", "quota"];

        if AUTH_MARKERS.iter().any(|m| lower.contains(m)) || lower.contains("authentication") {
            RemoteError::Auth { detail }
        } else if RATE_MARKERS.iter().any(|m| lower.contains(m)) {
            RemoteError::RateLimited { detail }
        } else {
            RemoteError::Api { detail }
        }
    }

    /// Whether this failure is an authentication/authorisation problem.
    pub fn is_auth(&self) -> bool {
        matches!(self, RemoteError::Auth { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_forbidden_as_auth() {
        let e = RemoteError::classify("HTTP 403 Forbidden: API key not valid");
        assert!(e.is_auth(), "got: {e:?}");
        assert!(e.to_string().contains("API key"));
    }

    #[test]
    fn classify_rate_limit() {
        let e = RemoteError::classify("HTTP 429: Resource has been exhausted (check quota)");
        assert!(matches!(e, RemoteError::RateLimited { .. }), "got: {e:?}");
        assert!(e.to_string().contains("rate limit"));
    }

    #[test]
    fn classify_generic() {
        let e = RemoteError::classify("connection reset by peer");
        assert_eq!(
            e,
            RemoteError::Api {
                detail: "connection reset by peer".into()
            }
        );
        assert_eq!(e.to_string(), "connection reset by peer");
    }

    #[test]
    fn empty_document_display() {
        let e = PdflatteError::EmptyDocument {
            name: "scan.pdf".into(),
        };
        assert!(e.to_string().contains("scan.pdf"));
    }

    #[test]
    fn invalid_stage_display() {
        let e = PdflatteError::InvalidStage {
            action: "translate",
            stage: crate::session::DocumentStage::Rasterized,
        };
        let msg = e.to_string();
        assert!(msg.contains("translate"), "got: {msg}");
        assert!(msg.contains("rasterized"), "got: {msg}");
    }
}
