//! Per-document session state.
//!
//! A [`DocumentSession`] is owned by whoever drives the pipeline; nothing
//! here is global. The stage only moves forward, except that a new
//! translation may replace an old one and a finished export returns the
//! session to the stage it was exported from.

use crate::config::TranslationMode;
use crate::error::PdflatteError;
use crate::output::{AssembledDocument, Page, ResultSet};
use crate::pipeline::input::file_stem;
use serde::Serialize;
use std::fmt;

/// Where a document is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStage {
    Uploaded,
    Rasterized,
    Transcribing,
    Transcribed,
    Translating,
    Translated,
    Exporting,
    Exported,
}

impl fmt::Display for DocumentStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DocumentStage::Uploaded => "uploaded",
            DocumentStage::Rasterized => "rasterized",
            DocumentStage::Transcribing => "transcribing",
            DocumentStage::Transcribed => "transcribed",
            DocumentStage::Translating => "translating",
            DocumentStage::Translated => "translated",
            DocumentStage::Exporting => "exporting",
            DocumentStage::Exported => "exported",
        };
        f.write_str(s)
    }
}

/// Results of the transcription round.
#[derive(Debug, Clone, Serialize)]
pub struct Transcription {
    pub results: ResultSet,
    pub document: AssembledDocument,
}

/// Results of the latest translation round.
#[derive(Debug, Clone, Serialize)]
pub struct Translation {
    pub language: String,
    pub mode: TranslationMode,
    /// Per-page results in page order. In whole-document mode this holds a
    /// single entry with index 0.
    pub results: ResultSet,
    pub document: AssembledDocument,
}

/// Which text a PDF export is made from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportSource {
    Transcription,
    Translation,
}

/// A text file offered for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDownload {
    pub file_name: String,
    pub contents: String,
}

/// One document and everything computed for it so far.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentSession {
    pub name: String,
    stage: DocumentStage,
    #[serde(skip)]
    pages: Vec<Page>,
    page_count: usize,
    transcription: Option<Transcription>,
    translation: Option<Translation>,
}

impl DocumentSession {
    /// A session for an uploaded document that has not been rasterised yet.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stage: DocumentStage::Uploaded,
            pages: Vec::new(),
            page_count: 0,
            transcription: None,
            translation: None,
        }
    }

    pub fn stage(&self) -> DocumentStage {
        self.stage
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn transcription(&self) -> Option<&Transcription> {
        self.transcription.as_ref()
    }

    pub fn translation(&self) -> Option<&Translation> {
        self.translation.as_ref()
    }

    /// `report.pdf` → `report`.
    pub fn stem(&self) -> String {
        file_stem(&self.name)
    }

    // ── Downloads ────────────────────────────────────────────────────────

    /// The full assembled transcription as `{stem}_transcription.txt`.
    pub fn transcription_download(&self) -> Result<TextDownload, PdflatteError> {
        let t = self.require_transcription("download the transcription")?;
        Ok(TextDownload {
            file_name: format!("{}_transcription.txt", self.stem()),
            contents: t.document.text.clone(),
        })
    }

    /// One page's transcription as `{stem}_page{n}_transcription.txt`.
    ///
    /// `page` is 1-based. A failed page downloads its error placeholder.
    pub fn page_download(&self, page: usize) -> Result<TextDownload, PdflatteError> {
        let t = self.require_transcription("download a page")?;
        let total = t.results.len();
        let result = page
            .checked_sub(1)
            .and_then(|i| t.results.get(i))
            .ok_or(PdflatteError::PageOutOfRange { page, total })?;
        Ok(TextDownload {
            file_name: format!("{}_page{}_transcription.txt", self.stem(), page),
            contents: result.text.clone(),
        })
    }

    /// The latest translation as `{stem}_translation_{language}.txt`.
    pub fn translation_download(&self) -> Result<TextDownload, PdflatteError> {
        let t = self.translation.as_ref().ok_or(PdflatteError::InvalidStage {
            action: "download the translation",
            stage: self.stage,
        })?;
        Ok(TextDownload {
            file_name: format!(
                "{}_translation_{}.txt",
                self.stem(),
                language_slug(&t.language)
            ),
            contents: t.document.text.clone(),
        })
    }

    /// File name for an exported PDF.
    pub fn pdf_file_name(&self, source: ExportSource) -> String {
        match (source, &self.translation) {
            (ExportSource::Translation, Some(t)) => {
                format!("{}_translation_{}.pdf", self.stem(), language_slug(&t.language))
            }
            _ => format!("{}_transcription.pdf", self.stem()),
        }
    }

    // ── Stage transitions (driven by DocumentPipeline) ──────────────────

    pub(crate) fn set_pages(&mut self, pages: Vec<Page>) {
        self.page_count = pages.len();
        self.pages = pages;
        self.stage = DocumentStage::Rasterized;
    }

    pub(crate) fn set_stage(&mut self, stage: DocumentStage) {
        self.stage = stage;
    }

    pub(crate) fn set_transcription(&mut self, transcription: Transcription) {
        self.transcription = Some(transcription);
        self.translation = None;
        self.stage = DocumentStage::Transcribed;
    }

    pub(crate) fn set_translation(&mut self, translation: Translation) {
        self.translation = Some(translation);
        self.stage = DocumentStage::Translated;
    }

    /// The transcription, or `InvalidStage` naming `action`.
    pub(crate) fn require_transcription(
        &self,
        action: &'static str,
    ) -> Result<&Transcription, PdflatteError> {
        self.transcription.as_ref().ok_or(PdflatteError::InvalidStage {
            action,
            stage: self.stage,
        })
    }

    /// The stage to return to once a round or export on top of it ends.
    pub(crate) fn settled_stage(&self) -> DocumentStage {
        if self.translation.is_some() {
            DocumentStage::Translated
        } else if self.transcription.is_some() {
            DocumentStage::Transcribed
        } else if self.page_count > 0 {
            DocumentStage::Rasterized
        } else {
            DocumentStage::Uploaded
        }
    }
}

/// `"Brazilian Portuguese"` → `"brazilian_portuguese"`.
fn language_slug(language: &str) -> String {
    let slug: String = language
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    if slug.is_empty() {
        "translation".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PageDelimiter;
    use crate::output::{JobKind, JobResult};
    use image::DynamicImage;

    fn transcribed(name: &str) -> DocumentSession {
        let mut s = DocumentSession::new(name);
        s.set_pages(vec![
            Page::new(0, DynamicImage::new_rgb8(4, 4)),
            Page::new(1, DynamicImage::new_rgb8(4, 4)),
        ]);
        let results = ResultSet::from(vec![
            JobResult::ok(0, "first"),
            JobResult::failed(JobKind::Transcribe, 1, "rate limit exceeded: slow down"),
        ]);
        let document = results.assemble(&PageDelimiter::PageHeader);
        s.set_transcription(Transcription { results, document });
        s
    }

    #[test]
    fn stage_display_is_lowercase() {
        assert_eq!(DocumentStage::Rasterized.to_string(), "rasterized");
        assert_eq!(DocumentStage::Translated.to_string(), "translated");
    }

    #[test]
    fn new_session_cannot_download() {
        let s = DocumentSession::new("notes.pdf");
        assert_eq!(s.stage(), DocumentStage::Uploaded);
        let err = s.transcription_download().unwrap_err();
        assert!(matches!(
            err,
            PdflatteError::InvalidStage {
                stage: DocumentStage::Uploaded,
                ..
            }
        ));
    }

    #[test]
    fn download_file_names() {
        let s = transcribed("lecture notes.pdf");
        let full = s.transcription_download().unwrap();
        assert_eq!(full.file_name, "lecture notes_transcription.txt");
        assert!(full.contents.starts_with("--- PAGE 1 ---"));

        let p2 = s.page_download(2).unwrap();
        assert_eq!(p2.file_name, "lecture notes_page2_transcription.txt");
        assert_eq!(p2.contents, "Transcription error: rate limit exceeded: slow down");
    }

    #[test]
    fn page_download_out_of_range() {
        let s = transcribed("a.pdf");
        for page in [0, 3] {
            let err = s.page_download(page).unwrap_err();
            assert!(matches!(err, PdflatteError::PageOutOfRange { total: 2, .. }));
        }
    }

    #[test]
    fn new_transcription_clears_translation() {
        let mut s = transcribed("a.pdf");
        s.set_translation(Translation {
            language: "Brazilian Portuguese".into(),
            mode: TranslationMode::WholeDocument,
            results: ResultSet::from(vec![JobResult::ok(0, "olá")]),
            document: AssembledDocument { text: "olá".into() },
        });
        assert_eq!(
            s.translation_download().unwrap().file_name,
            "a_translation_brazilian_portuguese.txt"
        );
        assert_eq!(
            s.pdf_file_name(ExportSource::Translation),
            "a_translation_brazilian_portuguese.pdf"
        );

        let results = ResultSet::from(vec![JobResult::ok(0, "x"), JobResult::ok(1, "y")]);
        let document = results.assemble(&PageDelimiter::PageHeader);
        s.set_transcription(Transcription { results, document });
        assert!(s.translation().is_none());
        assert_eq!(s.settled_stage(), DocumentStage::Transcribed);
    }

    #[test]
    fn stages_are_ordered() {
        assert!(DocumentStage::Uploaded < DocumentStage::Rasterized);
        assert!(DocumentStage::Transcribed < DocumentStage::Translated);
    }
}
