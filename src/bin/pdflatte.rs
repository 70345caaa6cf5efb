//! CLI binary for pdflatte.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `PipelineConfig`, drives a `DocumentPipeline`, and writes the downloads.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdflatte::pipeline::input;
use pdflatte::{
    write_output, CommandPdfRenderer, DocumentPipeline, DocumentSession, ExportSource, JobKind,
    JobResult, PageDelimiter, PipelineConfig, ProgressCallback, ProgressHandle, TranslationMode,
};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Renders one progress bar per round plus a ✓/✗ line per finished job.
/// Jobs may finish out of order; lines are printed as they arrive.
struct CliProgress {
    bar: Mutex<Option<ProgressBar>>,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgress {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            bar: Mutex::new(None),
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(bar) = guard.as_ref() {
                f(bar);
            }
        }
    }

    fn elapsed_secs(&self, index: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&index))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

fn round_verb(kind: JobKind) -> &'static str {
    match kind {
        JobKind::Transcribe => "Transcribing",
        JobKind::Translate => "Translating",
    }
}

impl ProgressCallback for CliProgress {
    fn on_round_start(&self, kind: JobKind, total: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len}  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        let bar = ProgressBar::new(total as u64);
        bar.set_style(style);
        bar.set_prefix(round_verb(kind));
        bar.enable_steady_tick(Duration::from_millis(80));
        bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("{} {} jobs…", round_verb(kind), total))
        ));

        self.errors.store(0, Ordering::SeqCst);
        if let Ok(mut guard) = self.bar.lock() {
            *guard = Some(bar);
        }
    }

    fn on_job_started(&self, _kind: JobKind, index: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(index, Instant::now());
        }
        self.with_bar(|bar| bar.set_message(format!("page {}", index + 1)));
    }

    fn on_job_finished(&self, _kind: JobKind, result: &JobResult, _completed: usize, total: usize) {
        let secs = self.elapsed_secs(result.index);
        let line = if result.is_ok() {
            format!(
                "  {} Page {:>3}/{:<3}  {:<8}  {}",
                green("✓"),
                result.index + 1,
                total,
                dim(&format!("{:>5} chars", result.text.chars().count())),
                dim(&format!("{secs:.1}s")),
            )
        } else {
            self.errors.fetch_add(1, Ordering::SeqCst);
            let first_line = result.text.lines().next().unwrap_or_default();
            let msg = if first_line.chars().count() > 80 {
                let cut: String = first_line.chars().take(79).collect();
                format!("{cut}\u{2026}")
            } else {
                first_line.to_string()
            };
            format!(
                "  {} Page {:>3}/{:<3}  {}  {}",
                red("✗"),
                result.index + 1,
                total,
                red(&msg),
                dim(&format!("{secs:.1}s")),
            )
        };
        self.with_bar(|bar| {
            bar.println(line);
            bar.inc(1);
        });
    }

    fn on_round_complete(&self, kind: JobKind, total: usize, succeeded: usize) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(bar) = guard.take() {
                bar.finish_and_clear();
            }
        }
        let failed = total.saturating_sub(succeeded);
        let noun = kind.label().to_lowercase();
        if failed == 0 {
            eprintln!("{} {} pages: {} ok", green("✔"), bold(&succeeded.to_string()), noun);
        } else {
            eprintln!(
                "{} {}/{} pages: {} ok  ({} failed)",
                if failed == total { red("✘") } else { cyan("⚠") },
                bold(&succeeded.to_string()),
                total,
                noun,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Transcribe to stdout
  pdflatte paper.pdf

  # Write downloads (full text, one file per page) to a directory
  pdflatte paper.pdf -o out/ --split-pages

  # Translate page by page and export the translation as PDF
  pdflatte paper.pdf -o out/ --translate French --pdf

  # Whole-document translation into Arabic (RTL PDF layout)
  pdflatte paper.pdf -o out/ --translate Arabic --translation-mode whole-document --pdf

  # Sequential mode with a 2 s pause between requests
  pdflatte --workers 1 --pause-ms 2000 scan.pdf

  # From a URL, JSON output
  pdflatte --json https://arxiv.org/pdf/1706.03762 > session.json

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default provider when set)
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (gemini, openai, anthropic, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium (otherwise the system library is used)
  RUST_LOG                Log filter, e.g. pdflatte=debug

PDF EXPORT:
  --pdf pipes the rendered HTML through an external command that reads HTML
  on stdin and writes a PDF on stdout (default: "weasyprint - -").
"#;

/// Transcribe PDFs to Markdown + LaTeX with vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "pdflatte",
    version,
    about = "Transcribe PDFs to Markdown + LaTeX with vision LLMs, translate, and export",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Directory for the transcription, translation and PDF downloads.
    /// Without it the assembled text goes to stdout.
    #[arg(short, long, env = "PDFLATTE_OUT_DIR")]
    out_dir: Option<PathBuf>,

    /// Also write one `{stem}_page{n}_transcription.txt` per page.
    #[arg(long, env = "PDFLATTE_SPLIT_PAGES", requires = "out_dir")]
    split_pages: bool,

    /// LLM model ID (default: gemini-2.0-flash for Gemini).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: gemini, openai, anthropic, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Maximum concurrent model calls; 1 runs pages strictly in order.
    #[arg(short, long, env = "PDFLATTE_WORKERS", default_value_t = 3)]
    workers: usize,

    /// Pause between requests in sequential mode, in milliseconds.
    #[arg(long, env = "PDFLATTE_PAUSE_MS", default_value_t = 1000)]
    pause_ms: u64,

    /// Rasterisation DPI (72–600).
    #[arg(long, env = "PDFLATTE_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Longest image edge sent to the model, in pixels.
    #[arg(long, env = "PDFLATTE_MAX_DIMENSION", default_value_t = 1000)]
    max_dimension: u32,

    /// Translate the transcription into this language.
    #[arg(short, long, env = "PDFLATTE_TRANSLATE")]
    translate: Option<String>,

    /// Split translation per page or send the whole document at once.
    #[arg(long, env = "PDFLATTE_TRANSLATION_MODE", value_enum, default_value = "per-page")]
    translation_mode: ModeArg,

    /// Export a PDF (of the translation when there is one).
    #[arg(long, env = "PDFLATTE_PDF")]
    pdf: bool,

    /// HTML→PDF command reading stdin and writing stdout.
    #[arg(long, env = "PDFLATTE_PDF_RENDERER", default_value = "weasyprint - -")]
    pdf_renderer: String,

    /// Page delimiter: page (`--- PAGE n ---`), hr, or a custom string.
    #[arg(long, env = "PDFLATTE_DELIMITER", default_value = "page")]
    delimiter: String,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDFLATTE_PASSWORD")]
    password: Option<String>,

    /// Path to a text file replacing the transcription instruction.
    #[arg(long, env = "PDFLATTE_PROMPT")]
    prompt_file: Option<PathBuf>,

    /// Max LLM output tokens per call.
    #[arg(long, env = "PDFLATTE_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PDFLATTE_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDFLATTE_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Print the session (all per-page results) as JSON.
    #[arg(long, env = "PDFLATTE_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDFLATTE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDFLATTE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDFLATTE_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    PerPage,
    WholeDocument,
}

impl From<ModeArg> for TranslationMode {
    fn from(v: ModeArg) -> Self {
        match v {
            ModeArg::PerPage => TranslationMode::PerPage,
            ModeArg::WholeDocument => TranslationMode::WholeDocument,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; --verbose brings them back.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build pipeline ───────────────────────────────────────────────────
    let progress: Option<ProgressHandle> = if show_progress {
        Some(CliProgress::new() as ProgressHandle)
    } else {
        None
    };
    let config = build_config(&cli, progress).await?;
    let download_timeout = config.download_timeout_secs;

    let renderer = CommandPdfRenderer::from_command_line(&cli.pdf_renderer)
        .context("--pdf-renderer must name a command")?;
    let pipeline = DocumentPipeline::from_config(config)
        .await
        .context("Failed to set up the LLM provider")?
        .with_pdf_renderer(Arc::new(renderer));

    // ── Run ──────────────────────────────────────────────────────────────
    let start = Instant::now();
    let source = input::resolve_input(&cli.input, download_timeout)
        .await
        .context("Failed to read input")?;
    let session = pipeline
        .open_source(source)
        .await
        .context("Failed to rasterise PDF")?;
    let mut session = pipeline
        .process_session(session)
        .await
        .context("Transcription failed")?;

    let mut written: Vec<PathBuf> = Vec::new();
    if let Some(ref dir) = cli.out_dir {
        written.extend(write_text_downloads(&session, dir, cli.split_pages).await?);
    }

    if cli.pdf {
        let source = if session.translation().is_some() {
            ExportSource::Translation
        } else {
            ExportSource::Transcription
        };
        let export = pipeline
            .export_pdf(&mut session, source)
            .await
            .context("PDF export failed")?;
        let dir = cli.out_dir.clone().unwrap_or_else(|| PathBuf::from("."));
        let path = dir.join(&export.file_name);
        write_output(&path, &export.bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        written.push(path);
    }

    // ── Report ───────────────────────────────────────────────────────────
    if cli.json {
        let json = serde_json::to_string_pretty(&session).context("Failed to serialise session")?;
        println!("{json}");
    } else if cli.out_dir.is_none() {
        let text = session
            .translation()
            .map(|t| t.document.text.as_str())
            .or_else(|| session.transcription().map(|t| t.document.text.as_str()))
            .unwrap_or_default();
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(text.as_bytes())
            .context("Failed to write to stdout")?;
        if !text.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }

    if !cli.quiet {
        for path in &written {
            eprintln!("   → {}", bold(&path.display().to_string()));
        }
        if !show_progress {
            if let Some(t) = session.transcription() {
                eprintln!(
                    "Transcribed {}/{} pages in {}ms",
                    t.results.succeeded(),
                    t.results.len(),
                    start.elapsed().as_millis()
                );
            }
        } else if !cli.json {
            eprintln!("   {}", dim(&format!("{}ms total", start.elapsed().as_millis())));
        }
    }

    Ok(())
}

/// Map CLI args to `PipelineConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressHandle>) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .dpi(cli.dpi)
        .max_image_dimension(cli.max_dimension)
        .max_workers(cli.workers)
        .request_pause(Duration::from_millis(cli.pause_ms))
        .page_delimiter(parse_delimiter(&cli.delimiter))
        .translation_mode(cli.translation_mode.into())
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref path) = cli.prompt_file {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path))?;
        builder = builder.transcription_prompt(prompt);
    }
    if let Some(ref lang) = cli.translate {
        builder = builder.target_language(lang.clone());
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--delimiter` into a `PageDelimiter`.
fn parse_delimiter(s: &str) -> PageDelimiter {
    match s.trim().to_lowercase().as_str() {
        "page" | "header" => PageDelimiter::PageHeader,
        "hr" | "---" => PageDelimiter::HorizontalRule,
        _ => PageDelimiter::Custom(s.to_string()),
    }
}

/// Write the transcription (and per-page files, and the translation) into `dir`.
async fn write_text_downloads(
    session: &DocumentSession,
    dir: &Path,
    split_pages: bool,
) -> Result<Vec<PathBuf>> {
    let mut downloads = vec![session.transcription_download()?];
    if split_pages {
        for page in 1..=session.page_count() {
            downloads.push(session.page_download(page)?);
        }
    }
    if session.translation().is_some() {
        downloads.push(session.translation_download()?);
    }

    let mut written = Vec::with_capacity(downloads.len());
    for download in downloads {
        let path = dir.join(&download.file_name);
        write_output(&path, download.contents.as_bytes())
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}
