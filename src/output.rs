//! Pages, jobs, and the results the scheduler produces.

use crate::config::PageDelimiter;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One rasterised PDF page.
///
/// `index` is 0-based and assigned at rasterisation time; it never changes.
#[derive(Debug, Clone)]
pub struct Page {
    pub index: usize,
    pub image: DynamicImage,
}

impl Page {
    pub fn new(index: usize, image: DynamicImage) -> Self {
        Self { index, image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Which round a job belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobKind {
    Transcribe,
    Translate,
}

impl JobKind {
    /// Adapter name used as the prefix of error placeholders.
    pub fn label(self) -> &'static str {
        match self {
            JobKind::Transcribe => "Transcription",
            JobKind::Translate => "Translation",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A unit of scheduled remote work.
///
/// `P` is the payload: a preprocessed page image for transcription, a text
/// blob for translation.
#[derive(Debug, Clone)]
pub struct Job<P> {
    pub index: usize,
    pub kind: JobKind,
    pub payload: P,
}

impl<P> Job<P> {
    pub fn new(index: usize, kind: JobKind, payload: P) -> Self {
        Self {
            index,
            kind,
            payload,
        }
    }
}

/// Transcription job over one page image.
pub type TranscribeJob = Job<DynamicImage>;

/// Translation job over one text blob.
pub type TranslateJob = Job<String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Ok,
    Failed,
}

/// Outcome of one job.
///
/// A failed job still carries text: a human-readable error placeholder, so
/// the assembled document keeps one entry per page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    pub index: usize,
    pub status: JobStatus,
    pub text: String,
}

impl JobResult {
    pub fn ok(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            status: JobStatus::Ok,
            text: text.into(),
        }
    }

    /// A failed result whose text is `"<Label> error: <message>"`.
    pub fn failed(kind: JobKind, index: usize, message: impl fmt::Display) -> Self {
        Self {
            index,
            status: JobStatus::Failed,
            text: format!("{} error: {}", kind.label(), message),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == JobStatus::Ok
    }
}

/// Fixed-length, index-addressed results of one round.
///
/// Position `i` holds the result of the `i`-th submitted job, whatever
/// order the jobs finished in. Read-only once built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultSet {
    results: Vec<JobResult>,
}

impl ResultSet {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&JobResult> {
        self.results.get(position)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, JobResult> {
        self.results.iter()
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }

    /// Join every result's text in position order.
    pub fn assemble(&self, delimiter: &PageDelimiter) -> AssembledDocument {
        let mut text = String::new();
        for (i, result) in self.results.iter().enumerate() {
            text.push_str(&delimiter.render(result.index + 1, i == 0));
            text.push_str(&result.text);
        }
        AssembledDocument {
            text: text.trim().to_string(),
        }
    }
}

impl From<Vec<JobResult>> for ResultSet {
    fn from(results: Vec<JobResult>) -> Self {
        Self { results }
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a JobResult;
    type IntoIter = std::slice::Iter<'a, JobResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}

/// Pre-sized slot storage filled while a round runs.
///
/// Every slot is written at most once; a second write is a scheduler bug and
/// is ignored rather than overwriting the first result.
#[derive(Debug)]
pub(crate) struct ResultSlots {
    slots: Vec<Option<JobResult>>,
    kind: JobKind,
}

impl ResultSlots {
    pub(crate) fn new(kind: JobKind, len: usize) -> Self {
        Self {
            slots: vec![None; len],
            kind,
        }
    }

    /// Store `result` at `position`. Returns false if the slot was taken.
    pub(crate) fn fill(&mut self, position: usize, result: JobResult) -> bool {
        match self.slots.get_mut(position) {
            Some(slot) if slot.is_none() => {
                *slot = Some(result);
                true
            }
            _ => false,
        }
    }

    /// Freeze into a [`ResultSet`]. `indices[i]` is the page index of job `i`,
    /// used only if a slot was somehow never filled.
    pub(crate) fn freeze(self, indices: &[usize]) -> ResultSet {
        let kind = self.kind;
        let results = self
            .slots
            .into_iter()
            .enumerate()
            .map(|(pos, slot)| {
                slot.unwrap_or_else(|| {
                    let index = indices.get(pos).copied().unwrap_or(pos);
                    JobResult::failed(kind, index, "job produced no result")
                })
            })
            .collect();
        ResultSet { results }
    }
}

/// Every page's text in index order, delimited and trimmed.
///
/// The unit handed to translation and to PDF export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssembledDocument {
    pub text: String,
}

impl AssembledDocument {
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for AssembledDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_result_text_names_adapter() {
        let r = JobResult::failed(JobKind::Transcribe, 4, "rate limit exceeded");
        assert_eq!(r.status, JobStatus::Failed);
        assert_eq!(r.text, "Transcription error: rate limit exceeded");
        let r = JobResult::failed(JobKind::Translate, 0, "boom");
        assert_eq!(r.text, "Translation error: boom");
    }

    #[test]
    fn assemble_uses_page_headers_and_trims() {
        let set = ResultSet::from(vec![
            JobResult::ok(0, "alpha"),
            JobResult::failed(JobKind::Transcribe, 1, "bad"),
            JobResult::ok(2, "gamma"),
        ]);
        let doc = set.assemble(&PageDelimiter::PageHeader);
        assert_eq!(
            doc.text,
            "--- PAGE 1 ---\n\nalpha\n\n--- PAGE 2 ---\n\nTranscription error: bad\n\n--- PAGE 3 ---\n\ngamma"
        );
    }

    #[test]
    fn assemble_empty_set_is_empty() {
        let doc = ResultSet::default().assemble(&PageDelimiter::PageHeader);
        assert_eq!(doc.text, "");
    }

    #[test]
    fn slots_refuse_second_write() {
        let mut slots = ResultSlots::new(JobKind::Transcribe, 2);
        assert!(slots.fill(1, JobResult::ok(1, "first")));
        assert!(!slots.fill(1, JobResult::ok(1, "second")));
        assert!(!slots.fill(5, JobResult::ok(5, "out of range")));
        let set = slots.freeze(&[0, 1]);
        assert_eq!(set.get(1).unwrap().text, "first");
        assert_eq!(set.get(0).unwrap().status, JobStatus::Failed);
        assert_eq!(set.get(0).unwrap().index, 0);
    }

    #[test]
    fn counts() {
        let set = ResultSet::from(vec![
            JobResult::ok(3, "a"),
            JobResult::failed(JobKind::Translate, 5, "x"),
        ]);
        assert_eq!(set.succeeded(), 1);
        assert_eq!(set.failed(), 1);
        assert_eq!(set.get(1).unwrap().index, 5);
    }
}
