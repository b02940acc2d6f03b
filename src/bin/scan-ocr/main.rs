//! CLI binary for scan-ocr.
//!
//! A thin shim over the library crate: `run` processes a folder once,
//! `serve` starts the web form, `split` cuts a single PDF into parts.

mod server;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use scan_ocr::pdf::split::{split_pdf_by_page, split_pdf_by_ranges};
use scan_ocr::{
    run_batch, BatchProgressCallback, PipelineConfig, ProgressCallback, RecognizerPool, RunLog,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
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

/// One bar over the documents of the batch, with a log line per page.
/// Page events may arrive out of order when `--concurrency` > 1.
struct CliProgressCallback {
    bar: ProgressBar,
    skipped: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Preparing");
        bar.set_message("Listing PDFs…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            skipped: AtomicUsize::new(0),
        })
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_documents: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total_documents as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("OCR");
        self.bar.set_message("");
    }

    fn on_document_start(&self, document: &str, total_pages: usize) {
        self.bar.set_message(document.to_string());
        self.bar.println(format!(
            "{} {}  {}",
            cyan("◆"),
            bold(document),
            dim(&format!("{total_pages} pages"))
        ));
    }

    fn on_page_complete(&self, _document: &str, page_num: usize, total_pages: usize, text_len: usize) {
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            green("✓"),
            page_num,
            total_pages,
            dim(&format!("{text_len:>5} chars")),
        ));
    }

    fn on_page_skipped(&self, _document: &str, page_num: usize, total_pages: usize, reason: &str) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
        let reason = if reason.chars().count() > 80 {
            format!("{}\u{2026}", reason.chars().take(79).collect::<String>())
        } else {
            reason.to_string()
        };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            red("✗"),
            page_num,
            total_pages,
            red(&reason),
        ));
    }

    fn on_document_complete(&self, document: &str, success: bool) {
        if !success {
            self.bar.println(format!("  {} {} has no usable text", red("✘"), document));
        }
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_documents: usize, succeeded: usize) {
        self.bar.finish_and_clear();
        let failed = total_documents.saturating_sub(succeeded);
        let skipped = self.skipped.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!(
                "{} {} files with text  {}",
                green("✔"),
                bold(&succeeded.to_string()),
                dim(&format!("({skipped} pages skipped)"))
            );
        } else {
            eprintln!(
                "{} {}/{} files with text  ({} without)  {}",
                if failed == total_documents { red("✘") } else { cyan("⚠") },
                bold(&succeeded.to_string()),
                total_documents,
                red(&failed.to_string()),
                dim(&format!("({skipped} pages skipped)"))
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # OCR every PDF in scans/ into output/
  scan-ocr run scans/ output/

  # Four pages at a time, English, no combined PDF
  scan-ocr run --concurrency 4 --lang eng --no-combined scans/ output/

  # Machine-readable summary
  scan-ocr run --json scans/ output/ > summary.json

  # Web form on http://127.0.0.1:5000
  scan-ocr serve

  # Cut a PDF into pages 1-2 and 3
  scan-ocr split --ranges 1-2,3-3 invoice.pdf parts/

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH   Path to libpdfium (file or directory)
  TESSDATA_PREFIX   Tesseract language data directory
  RUST_LOG          Overrides --verbose / --quiet log filters
"#;

/// Batch OCR for folders of scanned PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "scan-ocr",
    version,
    about = "Batch OCR for folders of scanned PDFs with text-quality gating",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "SCAN_OCR_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "SCAN_OCR_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// OCR every PDF in INPUT_DIR into per-document folders under OUTPUT_DIR.
    Run {
        /// Folder holding the scanned PDFs.
        input_dir: PathBuf,

        /// Folder receiving one sub-folder per document.
        output_dir: PathBuf,

        #[command(flatten)]
        pipeline: PipelineArgs,

        /// Run-log file. Default: <OUTPUT_DIR>/proceso.log.
        #[arg(long, env = "SCAN_OCR_LOG_FILE")]
        log_file: Option<PathBuf>,

        /// Print the batch summary as JSON on stdout.
        #[arg(long, env = "SCAN_OCR_JSON")]
        json: bool,

        /// Disable the progress bar.
        #[arg(long, env = "SCAN_OCR_NO_PROGRESS")]
        no_progress: bool,
    },

    /// Serve the web form.
    Serve {
        /// Address to bind.
        #[arg(long, env = "SCAN_OCR_HOST", default_value = "127.0.0.1")]
        host: String,

        /// Port to bind.
        #[arg(long, env = "SCAN_OCR_PORT", default_value_t = 5000)]
        port: u16,

        /// Run-log file shown at /logs.
        #[arg(long, env = "SCAN_OCR_LOG_FILE", default_value = "output/proceso.log")]
        log_file: PathBuf,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },

    /// Split one PDF into single pages or page ranges.
    Split {
        /// Source PDF.
        pdf: PathBuf,

        /// Folder receiving the parts.
        output_dir: PathBuf,

        /// Inclusive 1-based ranges, e.g. `1-3,4-4`. Default: one file per page.
        #[arg(long)]
        ranges: Option<String>,
    },
}

/// Pipeline flags shared by `run` and `serve`.
#[derive(Args, Debug)]
struct PipelineArgs {
    /// Rendering DPI (72–600).
    #[arg(long, env = "SCAN_OCR_DPI", default_value_t = 400,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Pages recognised at the same time.
    #[arg(short, long, env = "SCAN_OCR_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// Per-page recognition timeout in seconds (0 disables).
    #[arg(long, env = "SCAN_OCR_PAGE_TIMEOUT", default_value_t = 120)]
    page_timeout: u64,

    /// Tesseract language code(s), e.g. `spa` or `spa+eng`.
    #[arg(short, long = "lang", env = "SCAN_OCR_LANG", default_value = "spa")]
    language: String,

    /// Tesseract executable.
    #[arg(long, env = "SCAN_OCR_TESSERACT", default_value = "tesseract")]
    tesseract_cmd: PathBuf,

    /// Directory holding *.traineddata files.
    #[arg(long, env = "SCAN_OCR_TESSDATA_DIR")]
    tessdata_dir: Option<PathBuf>,

    /// Path to libpdfium (file or directory).
    #[arg(long, env = "SCAN_OCR_PDFIUM_LIB")]
    pdfium_lib: Option<PathBuf>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "SCAN_OCR_PASSWORD")]
    password: Option<String>,

    /// Skip the per-page searchable PDFs.
    #[arg(long, env = "SCAN_OCR_NO_SEARCHABLE")]
    no_searchable: bool,

    /// Skip the combined searchable PDF.
    #[arg(long, env = "SCAN_OCR_NO_COMBINED")]
    no_combined: bool,

    /// Do not split successful source PDFs into pages.
    #[arg(long, env = "SCAN_OCR_NO_SPLIT")]
    no_split: bool,

    /// Do not write PDF metadata.
    #[arg(long, env = "SCAN_OCR_NO_METADATA")]
    no_metadata: bool,

    /// Producer written into PDF metadata.
    #[arg(long, env = "SCAN_OCR_PRODUCER", default_value = "OCR App")]
    producer: String,

    /// Author written into PDF metadata.
    #[arg(long, env = "SCAN_OCR_AUTHOR", default_value = "OCR_App")]
    author: String,

    /// JSON map of per-file metadata overrides.
    #[arg(long, env = "SCAN_OCR_METADATA_FILE")]
    metadata_file: Option<PathBuf>,
}

impl PipelineArgs {
    /// Map CLI args to `PipelineConfig`.
    fn to_config(&self, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
        let mut builder = PipelineConfig::builder()
            .dpi(self.dpi)
            .concurrency(self.concurrency)
            .page_timeout_secs(self.page_timeout)
            .language(self.language.clone())
            .tesseract_cmd(self.tesseract_cmd.clone())
            .searchable_pages(!self.no_searchable)
            .combined_searchable(!self.no_combined)
            .split_pages(!self.no_split)
            .write_metadata(!self.no_metadata)
            .producer(self.producer.clone())
            .author(self.author.clone());

        if let Some(ref dir) = self.tessdata_dir {
            builder = builder.tessdata_dir(dir.clone());
        }
        if let Some(ref lib) = self.pdfium_lib {
            builder = builder.pdfium_lib_path(lib.clone());
        }
        if let Some(ref pwd) = self.password {
            builder = builder.password(pwd.clone());
        }
        if let Some(ref map) = self.metadata_file {
            builder = builder.metadata_map(map.clone());
        }
        if let Some(cb) = progress {
            builder = builder.progress_callback(cb);
        }

        builder.build().context("Invalid configuration")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs during `run`.
    let bar_active = matches!(
        cli.command,
        Commands::Run { json: false, no_progress: false, .. }
    ) && !cli.quiet;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || bar_active {
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

    match cli.command {
        Commands::Run {
            input_dir,
            output_dir,
            pipeline,
            log_file,
            json,
            no_progress: _,
        } => {
            let progress: Option<ProgressCallback> = if bar_active {
                Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>)
            } else {
                None
            };
            let config = pipeline.to_config(progress)?;
            run(&input_dir, &output_dir, log_file, &config, json, cli.quiet).await
        }
        Commands::Serve {
            host,
            port,
            log_file,
            pipeline,
        } => {
            let config = pipeline.to_config(None)?;
            let log = RunLog::open(&log_file)
                .with_context(|| format!("Failed to open run log {}", log_file.display()))?;
            server::serve(&host, port, config, log).await
        }
        Commands::Split {
            pdf,
            output_dir,
            ranges,
        } => split(&pdf, &output_dir, ranges.as_deref(), cli.quiet),
    }
}

async fn run(
    input_dir: &Path,
    output_dir: &Path,
    log_file: Option<PathBuf>,
    config: &PipelineConfig,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let log_path = log_file.unwrap_or_else(|| output_dir.join("proceso.log"));
    let log = RunLog::open(&log_path)
        .with_context(|| format!("Failed to open run log {}", log_path.display()))?;
    let pool = Arc::new(RecognizerPool::from_config(config));

    let summary = run_batch(input_dir, output_dir, config, &pool, &log)
        .await
        .context("Batch failed")?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
        );
    } else if !quiet && config.progress_callback.is_none() {
        eprintln!(
            "Processed {} files in {}ms: {} with text, {} without",
            summary.documents.len(),
            summary.total_duration_ms,
            summary.succeeded(),
            summary.failed()
        );
    }
    if !quiet && !json {
        eprintln!("   {}", dim(&format!("log: {}", log_path.display())));
    }
    Ok(())
}

fn split(pdf: &Path, output_dir: &Path, ranges: Option<&str>, quiet: bool) -> Result<()> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;
    let base = pdf
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .context("PDF path has no file name")?;

    let files = match ranges {
        Some(list) => split_pdf_by_ranges(pdf, &parse_ranges(list)?, output_dir, &base)?,
        None => split_pdf_by_page(pdf, output_dir, &base)?,
    };
    if !quiet {
        for f in &files {
            eprintln!("  {} {}", green("✓"), f.display());
        }
    }
    Ok(())
}

/// Parse `1-3,5,7-8` into inclusive ranges.
fn parse_ranges(s: &str) -> Result<Vec<(u32, u32)>> {
    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|part| {
            let (start, end) = match part.split_once('-') {
                Some((a, b)) => (a.trim(), b.trim()),
                None => (part, part),
            };
            let start: u32 = start
                .parse()
                .with_context(|| format!("Invalid start page in '{part}'"))?;
            let end: u32 = end
                .parse()
                .with_context(|| format!("Invalid end page in '{part}'"))?;
            if start < 1 || start > end {
                anyhow::bail!("Invalid page range '{part}': pages are 1-indexed and start <= end");
            }
            Ok((start, end))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_parse() {
        assert_eq!(parse_ranges("1-3, 5,7-8").unwrap(), vec![(1, 3), (5, 5), (7, 8)]);
        assert!(parse_ranges("3-1").is_err());
        assert!(parse_ranges("0").is_err());
        assert!(parse_ranges("a-b").is_err());
    }

    #[test]
    fn cli_defaults() {
        let cli = Cli::try_parse_from(["scan-ocr", "run", "in", "out"]).unwrap();
        let Commands::Run { pipeline, log_file, .. } = cli.command else {
            panic!("expected run");
        };
        assert_eq!(log_file, None);
        let config = pipeline.to_config(None).unwrap();
        assert_eq!(config.dpi, 400);
        assert_eq!(config.language, "spa");
        assert!(config.split_pages && config.write_metadata);
    }
}
