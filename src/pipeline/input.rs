//! Input resolution: turn a user-supplied path or URL into PDF bytes.
//!
//! The rasterizer loads documents from memory, so both local files and URL
//! downloads end up as a [`PdfSource`]. The `%PDF` magic is checked here so
//! callers get a meaningful error rather than a pdfium parse failure.

use crate::error::PdflatteError;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// PDF bytes plus the display name used for downloads and messages.
#[derive(Debug, Clone)]
pub struct PdfSource {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl PdfSource {
    /// Wrap in-memory bytes, validating the PDF magic.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, PdflatteError> {
        let name = name.into();
        check_magic(&name, &bytes)?;
        Ok(Self { name, bytes })
    }
}

/// `true` for `http://` and `https://` inputs.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to PDF bytes.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<PdfSource, PdflatteError> {
    if input.trim().is_empty() {
        return Err(PdflatteError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(Path::new(input)).await
    }
}

/// File stem used to name downloads: everything in the file name before
/// the first dot, so `report.v2.pdf` → `report`.
pub fn file_stem(name: &str) -> String {
    Path::new(name)
        .file_name()
        .map(|s| s.to_string_lossy())
        .and_then(|s| s.split('.').next().map(str::to_string))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "document".to_string())
}

fn check_magic(name: &str, bytes: &[u8]) -> Result<(), PdflatteError> {
    if !bytes.starts_with(b"%PDF") {
        return Err(PdflatteError::NotAPdf {
            name: name.to_string(),
            magic: bytes.iter().take(4).copied().collect(),
        });
    }
    Ok(())
}

async fn read_local(path: &Path) -> Result<PdfSource, PdflatteError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => PdflatteError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => PdflatteError::FileNotFound {
            path: PathBuf::from(path),
        },
    })?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    debug!("Read local PDF: {} ({} bytes)", path.display(), bytes.len());
    PdfSource::from_bytes(name, bytes)
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<PdfSource, PdflatteError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| PdflatteError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            PdflatteError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            PdflatteError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(PdflatteError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| PdflatteError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} bytes", bytes.len());
    PdfSource::from_bytes(filename_from_url(url), bytes.to_vec())
}

/// Last path segment of the URL when it looks like a file name.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.pdf".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_http_schemes_count_as_urls() {
        assert!(is_url("https://arxiv.org/pdf/1706.03762"));
        assert!(is_url("http://localhost:8000/scan.pdf"));
        assert!(!is_url("ftp://host/scan.pdf"));
        assert!(!is_url("./scans/scan.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn filename_from_url_prefers_last_segment() {
        assert_eq!(filename_from_url("https://arxiv.org/pdf/paper.pdf"), "paper.pdf");
        assert_eq!(filename_from_url("https://arxiv.org/pdf/1706"), "downloaded.pdf");
    }

    #[test]
    fn file_stem_stops_at_first_dot() {
        assert_eq!(file_stem("lecture notes.pdf"), "lecture notes");
        assert_eq!(file_stem("/tmp/a/b.pdf"), "b");
        assert_eq!(file_stem(""), "document");
        assert_eq!(file_stem("report.v2.pdf"), "report");
        assert_eq!(file_stem("/data/q3.final.scan.pdf"), "q3");
        assert_eq!(file_stem("README"), "README");
    }

    #[test]
    fn from_bytes_rejects_non_pdf() {
        let err = PdfSource::from_bytes("x.png", b"\x89PNG\r\n".to_vec()).unwrap_err();
        match err {
            PdflatteError::NotAPdf { magic, .. } => assert_eq!(magic, b"\x89PNG".to_vec()),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn resolve_missing_file() {
        let err = resolve_input("/definitely/not/here.pdf", 5).await.unwrap_err();
        assert!(matches!(err, PdflatteError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn resolve_local_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.pdf");
        std::fs::write(&path, b"%PDF-1.7\n%%EOF").unwrap();
        let src = resolve_input(path.to_str().unwrap(), 5).await.unwrap();
        assert_eq!(src.name, "tiny.pdf");
        assert!(src.bytes.starts_with(b"%PDF"));
    }
}
