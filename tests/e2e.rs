//! End-to-end tests against a real pdfium and a live vision model.
//!
//! Gated behind `E2E_ENABLED` so they never run in CI unless requested.
//! They need a PDF in `./test_cases/`, libpdfium on the library path (or
//! `PDFIUM_LIB_PATH`), and an API key for some provider.
//!
//! Run with:
//!   E2E_ENABLED=1 cargo test --test e2e -- --nocapture

use pdflatte::{transcribe, DocumentStage, JobStatus, PipelineConfig, TranslationMode};
use std::path::PathBuf;

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

/// Skip this test if E2E_ENABLED is not set *or* no PDF file at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP: test file not found: {}", p.display());
            return;
        }
        p
    }};
}

/// Basic shape checks on assembled output.
fn assert_transcription_quality(text: &str, pages: usize, context: &str) {
    assert!(!text.trim().is_empty(), "[{context}] transcription is empty");
    for n in 1..=pages {
        assert!(
            text.contains(&format!("--- PAGE {n} ---")),
            "[{context}] missing header for page {n}"
        );
    }
    let first_line = text.lines().next().unwrap_or("");
    assert!(
        !first_line.starts_with("```"),
        "[{context}] output must not start with a code fence"
    );
    assert!(
        !text.contains('\u{200B}'),
        "[{context}] output contains zero-width spaces"
    );
    println!("[{context}] ✓  {} bytes", text.len());
}

#[tokio::test]
async fn test_transcribe_math_paper() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("attention_is_all_you_need.pdf"));

    let config = PipelineConfig::builder()
        .max_workers(3)
        .dpi(150)
        .build()
        .unwrap();
    let session = transcribe(path.to_str().unwrap(), &config)
        .await
        .expect("transcribe() should succeed");

    assert_eq!(session.stage(), DocumentStage::Transcribed);
    let t = session.transcription().unwrap();
    assert_eq!(t.results.len(), session.page_count());
    assert!(
        t.results.iter().any(|r| r.status == JobStatus::Ok),
        "at least one page should transcribe"
    );
    assert_transcription_quality(&t.document.text, session.page_count(), "attention");
    assert!(t.document.text.contains('$'), "expected LaTeX math in a math paper");
}

#[tokio::test]
async fn test_transcribe_and_translate_sequential() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("irs_form_1040.pdf"));

    let config = PipelineConfig::builder()
        .max_workers(1)
        .target_language("French")
        .translation_mode(TranslationMode::PerPage)
        .build()
        .unwrap();
    let session = transcribe(path.to_str().unwrap(), &config)
        .await
        .expect("transcribe() should succeed");

    assert_eq!(session.stage(), DocumentStage::Translated);
    let tr = session.translation().unwrap();
    assert_eq!(tr.results.len(), session.page_count());
    assert_transcription_quality(&tr.document.text, session.page_count(), "irs-fr");
}
