//! Document-level orchestration.
//!
//! [`DocumentPipeline`] drives one [`DocumentSession`] through its stages:
//!
//! ```text
//! open ──▶ transcribe ──▶ translate? ──▶ export_pdf?
//! (rasterise) (scheduler)  (scheduler)    (HTML → PDF)
//! ```
//!
//! Rasterisation failures are fatal. Remote failures never are: they come
//! back as failed [`crate::output::JobResult`]s inside the round's
//! [`ResultSet`], and the assembled document carries their placeholders.

use crate::config::{PipelineConfig, TranslationMode};
use crate::error::PdflatteError;
use crate::export::{render_html, CommandPdfRenderer, ExportStyle, PdfExport, PdfRenderer};
use crate::math::{LatexToMathml, MathConverter};
use crate::output::{
    AssembledDocument, Job, JobKind, JobResult, Page, ResultSet, TranscribeJob, TranslateJob,
};
use crate::pipeline::input::PdfSource;
use crate::pipeline::llm::{LlmTranscriber, LlmTranslator, Transcriber, Translator};
use crate::pipeline::preprocess::ImagePreprocessor;
use crate::pipeline::render::{self, PdfiumRasterizer, Rasterizer};
use crate::scheduler::PageJobScheduler;
use crate::session::{DocumentSession, DocumentStage, ExportSource, Transcription, Translation};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Runs the transcription pipeline over documents.
///
/// Cheap to share: every collaborator sits behind an `Arc`, and no state
/// about a particular document lives here.
#[derive(Clone)]
pub struct DocumentPipeline {
    config: PipelineConfig,
    rasterizer: Arc<dyn Rasterizer>,
    preprocessor: ImagePreprocessor,
    transcriber: Arc<dyn Transcriber>,
    translator: Arc<dyn Translator>,
    pdf_renderer: Arc<dyn PdfRenderer>,
    math: Arc<dyn MathConverter>,
}

impl DocumentPipeline {
    /// A pipeline with the pdfium rasterizer, `latex2mathml` and the
    /// default external PDF renderer.
    pub fn new(
        config: PipelineConfig,
        transcriber: Arc<dyn Transcriber>,
        translator: Arc<dyn Translator>,
    ) -> Self {
        let rasterizer = Arc::new(PdfiumRasterizer::new(
            config.password.clone(),
            config.max_rendered_pixels,
        ));
        Self {
            preprocessor: ImagePreprocessor::new(config.max_image_dimension),
            rasterizer,
            transcriber,
            translator,
            pdf_renderer: Arc::new(CommandPdfRenderer::default()),
            math: Arc::new(LatexToMathml),
            config,
        }
    }

    /// Resolve the LLM provider from `config` and build the remote adapters
    /// on top of it.
    pub async fn from_config(config: PipelineConfig) -> Result<Self, PdflatteError> {
        let provider = crate::convert::resolve_provider(&config).await?;
        let transcriber = Arc::new(LlmTranscriber::new(Arc::clone(&provider), &config));
        let translator = Arc::new(LlmTranslator::new(provider, &config));
        Ok(Self::new(config, transcriber, translator))
    }

    pub fn with_rasterizer(mut self, rasterizer: Arc<dyn Rasterizer>) -> Self {
        self.rasterizer = rasterizer;
        self
    }

    pub fn with_pdf_renderer(mut self, renderer: Arc<dyn PdfRenderer>) -> Self {
        self.pdf_renderer = renderer;
        self
    }

    pub fn with_math_converter(mut self, math: Arc<dyn MathConverter>) -> Self {
        self.math = math;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Validate and rasterise an uploaded document.
    pub async fn open(
        &self,
        name: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<DocumentSession, PdflatteError> {
        let source = PdfSource::from_bytes(name, bytes)?;
        self.open_source(source).await
    }

    /// Rasterise an already-resolved [`PdfSource`].
    pub async fn open_source(&self, source: PdfSource) -> Result<DocumentSession, PdflatteError> {
        let PdfSource { name, bytes } = source;
        let start = Instant::now();
        let mut session = DocumentSession::new(name.clone());

        let images =
            render::rasterize(Arc::clone(&self.rasterizer), &name, bytes, self.config.dpi).await?;
        if images.is_empty() {
            return Err(PdflatteError::EmptyDocument { name });
        }

        let pages: Vec<Page> = images
            .into_iter()
            .enumerate()
            .map(|(index, image)| Page::new(index, image))
            .collect();
        info!(
            "Rasterised '{}': {} pages at {} DPI in {:?}",
            name,
            pages.len(),
            self.config.dpi,
            start.elapsed()
        );
        session.set_pages(pages);
        Ok(session)
    }

    /// Transcribe every page of a rasterised document.
    ///
    /// Individual page failures end up as placeholders in the result set;
    /// the only error is calling this before the document has pages.
    pub async fn transcribe(&self, session: &mut DocumentSession) -> Result<(), PdflatteError> {
        if session.page_count() == 0 {
            return Err(PdflatteError::InvalidStage {
                action: "transcribe",
                stage: session.stage(),
            });
        }
        session.set_stage(DocumentStage::Transcribing);

        let jobs: Vec<_> = session
            .pages()
            .iter()
            .map(|page| {
                Job::new(
                    page.index,
                    JobKind::Transcribe,
                    self.preprocessor.apply(&page.image),
                )
            })
            .collect();

        let transcriber = self.transcriber.as_ref();
        let results = PageJobScheduler::from_config(&self.config)
            .run(jobs, move |job: TranscribeJob| async move {
                transcriber.transcribe(job.payload).await
            })
            .await;

        report_round(JobKind::Transcribe, &results);
        let document = results.assemble(&self.config.page_delimiter);
        session.set_transcription(Transcription { results, document });
        Ok(())
    }

    /// Translate the transcription into `language`.
    ///
    /// Calling this again replaces the previous translation.
    pub async fn translate(
        &self,
        session: &mut DocumentSession,
        language: &str,
        mode: TranslationMode,
    ) -> Result<(), PdflatteError> {
        let language = language.trim();
        if language.is_empty() {
            return Err(PdflatteError::InvalidConfig(
                "target language must not be empty".into(),
            ));
        }
        let transcription = session.require_transcription("translate")?.clone();
        session.set_stage(DocumentStage::Translating);
        info!("Translating '{}' to {} ({:?})", session.name, language, mode);

        let scheduler = PageJobScheduler::from_config(&self.config);
        let translator = self.translator.as_ref();
        let work = move |job: TranslateJob| async move {
            translator.translate(&job.payload, language).await
        };

        let (results, document) = match mode {
            TranslationMode::PerPage => {
                let jobs: Vec<_> = transcription
                    .results
                    .iter()
                    .filter(|r| r.is_ok())
                    .map(|r| Job::new(r.index, JobKind::Translate, r.text.clone()))
                    .collect();
                let translated = scheduler.run(jobs, work).await;
                report_round(JobKind::Translate, &translated);

                let results = merge_translated(&transcription.results, &translated);
                let document = results.assemble(&self.config.page_delimiter);
                (results, document)
            }
            TranslationMode::WholeDocument => {
                let job = Job::new(0, JobKind::Translate, transcription.document.text);
                let results = scheduler.run(vec![job], work).await;
                report_round(JobKind::Translate, &results);
                let document = AssembledDocument {
                    text: results
                        .get(0)
                        .map(|r| r.text.clone())
                        .unwrap_or_default(),
                };
                (results, document)
            }
        };

        session.set_translation(Translation {
            language: language.to_string(),
            mode,
            results,
            document,
        });
        Ok(())
    }

    /// Render the transcription or the translation to PDF.
    ///
    /// On failure the session returns to the stage it was in; every result
    /// stays available and the export can be retried.
    pub async fn export_pdf(
        &self,
        session: &mut DocumentSession,
        source: ExportSource,
    ) -> Result<PdfExport, PdflatteError> {
        let (markdown, style) = match source {
            ExportSource::Transcription => {
                let t = session.require_transcription("export the transcription")?;
                (t.document.text.clone(), ExportStyle::Default)
            }
            ExportSource::Translation => {
                let t = session.translation().ok_or(PdflatteError::InvalidStage {
                    action: "export the translation",
                    stage: session.stage(),
                })?;
                (
                    t.document.text.clone(),
                    ExportStyle::for_language(Some(t.language.as_str())),
                )
            }
        };

        let settled = session.settled_stage();
        session.set_stage(DocumentStage::Exporting);
        let html = render_html(&markdown, &session.stem(), style, self.math.as_ref());

        match self.pdf_renderer.render(&html).await {
            Ok(bytes) => {
                session.set_stage(DocumentStage::Exported);
                info!("Exported '{}' ({} bytes)", session.name, bytes.len());
                Ok(PdfExport {
                    file_name: session.pdf_file_name(source),
                    bytes,
                })
            }
            Err(e) => {
                session.set_stage(settled);
                warn!("PDF export of '{}' failed: {}", session.name, e);
                Err(e)
            }
        }
    }

    /// Open, transcribe, and translate when the config names a language.
    pub async fn process(
        &self,
        name: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<DocumentSession, PdflatteError> {
        let session = self.open(name, bytes).await?;
        self.process_session(session).await
    }

    /// [`Self::process`] for a session that is already rasterised.
    pub async fn process_session(
        &self,
        mut session: DocumentSession,
    ) -> Result<DocumentSession, PdflatteError> {
        self.transcribe(&mut session).await?;
        if let Some(language) = self.config.target_language.as_deref() {
            self.translate(&mut session, language, self.config.translation_mode)
                .await?;
        }
        Ok(session)
    }
}

fn report_round(kind: JobKind, results: &ResultSet) {
    if results.is_empty() || results.succeeded() > 0 {
        return;
    }
    let auth = results.iter().any(|r| r.text.contains("authentication failed"));
    if auth {
        warn!(
            "Every {} job failed with an authentication error; check the API key",
            kind.label().to_lowercase()
        );
    } else {
        warn!("Every {} job failed", kind.label().to_lowercase());
    }
}

/// Lay per-page translations back over the transcription.
///
/// `translated` holds one result per successful transcription, in the same
/// order, so both sets are walked together. Failed transcriptions keep their
/// own placeholder.
fn merge_translated(transcribed: &ResultSet, translated: &ResultSet) -> ResultSet {
    let mut pending = translated.iter().peekable();
    let merged: Vec<JobResult> = transcribed
        .iter()
        .map(|r| {
            if !r.is_ok() {
                return r.clone();
            }
            match pending.next_if(|t| t.index == r.index) {
                Some(t) => t.clone(),
                None => JobResult::failed(JobKind::Translate, r.index, "no result"),
            }
        })
        .collect();
    ResultSet::from(merged)
}
