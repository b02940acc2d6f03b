//! Document pipeline: one PDF in, per-page artifacts and a verdict out.
//!
//! ```text
//! START ─▶ RASTERIZED ─▶ per page: PREPROCESSED ─▶ RECOGNIZED ─▶ CLASSIFIED ─▶ EMITTED | SKIPPED
//!                                                                               │
//!                                                             AGGREGATED ◀──────┘ ─▶ DONE
//! ```
//!
//! Pages run with `config.concurrency` workers. Every artifact name carries
//! the page number, so completion order does not matter, and `found_valid`
//! is reduced only after every page has finished.
//!
//! Page-level problems never surface as errors: a page that cannot be read,
//! times out or fails the quality gate is logged and skipped. The only
//! `Err` is an [`OcrError`] for an artifact that could not be written.

use crate::config::PipelineConfig;
use crate::error::{OcrError, PageError};
use crate::output::{DocumentReport, PageResult};
use crate::pdf::overlay::{write_searchable_pdf, OverlayPage};
use crate::pdf::text::write_text_pdf;
use crate::pipeline::classify::assess;
use crate::pipeline::preprocess::preprocess;
use crate::pipeline::recognize::{recognize_page, RecognizerPool};
use crate::pipeline::{render, StepOutcome};
use crate::runlog::RunLog;
use futures::stream::{self, StreamExt};
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Run one PDF through the pipeline, writing artifacts into `output_dir`.
///
/// `output_dir` must exist. The returned report says whether any page
/// produced usable text; the caller decides what to do with the folder.
pub async fn process_document(
    source: &Path,
    output_dir: &Path,
    config: &PipelineConfig,
    pool: &Arc<RecognizerPool>,
    log: &RunLog,
) -> Result<DocumentReport, OcrError> {
    let doc_name = file_name(source);
    log.info(format!("Starting OCR for {doc_name}"));

    let rendered = render::render_document(source, config).await;
    if let Some(reason) = rendered.reason() {
        log.error(format!("Could not convert {doc_name} to images: {reason}"));
    } else {
        log.info(format!("{doc_name} converted into {} images", rendered.value().len()));
    }

    let images = rendered
        .into_value()
        .into_iter()
        .map(DynamicImage::ImageRgb8)
        .collect();
    process_images(source, images, output_dir, config, pool, log).await
}

/// Run already-rasterised pages of `source` through preprocessing,
/// recognition, the quality gate and artifact emission.
pub async fn process_images(
    source: &Path,
    images: Vec<DynamicImage>,
    output_dir: &Path,
    config: &PipelineConfig,
    pool: &Arc<RecognizerPool>,
    log: &RunLog,
) -> Result<DocumentReport, OcrError> {
    let started = Instant::now();
    let ctx = Arc::new(PageContext {
        doc_name: file_name(source),
        base_name: base_name(source),
        output_dir: output_dir.to_path_buf(),
        total_pages: images.len(),
        config: config.clone(),
        pool: Arc::clone(pool),
        log: log.clone(),
    });

    if let Some(ref cb) = config.progress_callback {
        cb.on_document_start(&ctx.doc_name, ctx.total_pages);
    }

    let images: Vec<Arc<DynamicImage>> = images.into_iter().map(Arc::new).collect();

    // ── Pages ────────────────────────────────────────────────────────────
    // Each job owns its context and image so the batch future stays `Send`.
    let jobs: Vec<_> = images
        .iter()
        .enumerate()
        .map(|(idx, image)| process_page(Arc::clone(&ctx), idx + 1, Arc::clone(image)))
        .collect();
    let outcomes: Vec<Result<PageResult, OcrError>> = stream::iter(jobs)
        .buffer_unordered(config.concurrency.max(1))
        .collect()
        .await;

    let mut pages = outcomes.into_iter().collect::<Result<Vec<_>, _>>()?;
    pages.sort_by_key(|p| p.page_num);

    // ── Aggregate ────────────────────────────────────────────────────────
    let found_valid = pages.iter().any(PageResult::is_valid);
    let text = pages
        .iter()
        .filter(|p| p.is_valid())
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut combined_pdf = None;
    if found_valid {
        log.info(format!(
            "{}: {} of {} pages with valid text",
            ctx.doc_name,
            pages.iter().filter(|p| p.is_valid()).count(),
            pages.len()
        ));
        if config.combined_searchable {
            combined_pdf = write_combined(&ctx, &pages, &images).await;
        }
    } else {
        log.error(format!("OCR failed or produced no usable text: {}", ctx.doc_name));
    }

    info!(
        "{} done in {}ms (valid: {found_valid})",
        ctx.doc_name,
        started.elapsed().as_millis()
    );

    Ok(DocumentReport {
        source: source.to_path_buf(),
        base_name: ctx.base_name.clone(),
        output_dir: ctx.output_dir.clone(),
        pages,
        found_valid,
        text,
        combined_pdf,
        duration_ms: started.elapsed().as_millis() as u64,
    })
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Everything a page worker needs, shared across workers.
struct PageContext {
    doc_name: String,
    base_name: String,
    output_dir: PathBuf,
    total_pages: usize,
    config: PipelineConfig,
    pool: Arc<RecognizerPool>,
    log: RunLog,
}

impl PageContext {
    fn artifact(&self, page_num: usize, suffix: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_pagina_{page_num}{suffix}", self.base_name))
    }
}

async fn process_page(
    ctx: Arc<PageContext>,
    page_num: usize,
    image: Arc<DynamicImage>,
) -> Result<PageResult, OcrError> {
    let started = Instant::now();

    let recognized = recognize_with_budget(&ctx, page_num, Arc::clone(&image)).await;
    let duration_ms = started.elapsed().as_millis() as u64;

    let (text, failure) = match recognized {
        Ok(StepOutcome::Done(text)) => (text, None),
        Ok(StepOutcome::Degraded { value, reason }) => {
            ctx.log.error(format!(
                "OCR error on page {page_num} of {}: {reason}",
                ctx.doc_name
            ));
            (value, Some(PageError::RecognitionFailed { page: page_num, detail: reason }))
        }
        Err(page_error) => (String::new(), Some(page_error)),
    };

    // ── Classify ─────────────────────────────────────────────────────────
    let quality = assess(&text);
    let error = match failure {
        Some(e) => Some(e),
        None if text.trim().is_empty() => Some(PageError::BlankText { page: page_num }),
        None if !quality.valid => Some(PageError::LowQuality {
            page: page_num,
            chars: quality.clean_chars,
            letter_ratio: quality.letter_ratio,
            symbol_ratio: quality.symbol_ratio,
        }),
        None => None,
    };

    // ── Emit or skip ─────────────────────────────────────────────────────
    let artifacts = match &error {
        Some(e) => {
            ctx.log.error(format!("{}: {e}", ctx.doc_name));
            if let Some(ref cb) = ctx.config.progress_callback {
                cb.on_page_skipped(&ctx.doc_name, page_num, ctx.total_pages, &e.to_string());
            }
            Vec::new()
        }
        None => {
            let emit_ctx = Arc::clone(&ctx);
            let emit_text = text.clone();
            let written = tokio::task::spawn_blocking(move || {
                emit_page(&emit_ctx, page_num, &emit_text, &image)
            })
            .await
            .map_err(|e| OcrError::Internal(format!("Emit task panicked: {e}")))??;
            if let Some(ref cb) = ctx.config.progress_callback {
                cb.on_page_complete(&ctx.doc_name, page_num, ctx.total_pages, text.chars().count());
            }
            written
        }
    };

    Ok(PageResult {
        page_num,
        quality: (!text.is_empty()).then_some(quality),
        text,
        artifacts,
        error,
        duration_ms,
    })
}

/// Preprocess and recognise one page on the blocking pool, bounded by the
/// page timeout.
async fn recognize_with_budget(
    ctx: &Arc<PageContext>,
    page_num: usize,
    image: Arc<DynamicImage>,
) -> Result<StepOutcome<String>, PageError> {
    let abandoned = Arc::new(AtomicBool::new(false));
    let worker_ctx = Arc::clone(ctx);
    let worker_flag = Arc::clone(&abandoned);
    let handle = tokio::task::spawn_blocking(move || {
        recognize_blocking(&worker_ctx, page_num, &image, &worker_flag)
    });

    let joined = match ctx.config.page_timeout() {
        Some(budget) => match tokio::time::timeout(budget, handle).await {
            Ok(joined) => joined,
            Err(_) => {
                abandoned.store(true, Ordering::SeqCst);
                let secs = budget.as_secs();
                ctx.log.error(format!(
                    "Page {page_num} of {} timed out after {secs}s",
                    ctx.doc_name
                ));
                return Err(PageError::Timeout { page: page_num, secs });
            }
        },
        None => handle.await,
    };

    joined.map_err(|e| PageError::RecognitionFailed {
        page: page_num,
        detail: format!("worker panicked: {e}"),
    })
}

fn recognize_blocking(
    ctx: &PageContext,
    page_num: usize,
    image: &DynamicImage,
    abandoned: &AtomicBool,
) -> StepOutcome<String> {
    let mut recognizer = match ctx.pool.checkout() {
        Ok(r) => r,
        Err(e) => return StepOutcome::degraded(String::new(), format!("no recognizer: {e}")),
    };

    let prepared = preprocess(image);
    if let Some(reason) = prepared.reason() {
        ctx.log.error(format!(
            "Preprocessing error on page {page_num} of {}: {reason}",
            ctx.doc_name
        ));
    }
    let text = recognize_page(recognizer.as_mut(), prepared.value());

    // An instance whose page was abandoned may still be wedged.
    if abandoned.load(Ordering::SeqCst) {
        debug!("dropping recognizer of abandoned page {page_num}");
    } else {
        ctx.pool.checkin(recognizer);
    }
    text
}

/// Write the artifacts of a valid page. Text and text-PDF failures are
/// fatal; the searchable overlay is best-effort.
fn emit_page(
    ctx: &PageContext,
    page_num: usize,
    text: &str,
    image: &DynamicImage,
) -> Result<Vec<PathBuf>, OcrError> {
    let mut written = Vec::with_capacity(3);

    let txt_path = ctx.artifact(page_num, ".txt");
    std::fs::write(&txt_path, text).map_err(|source| OcrError::OutputWriteFailed {
        path: txt_path.clone(),
        source,
    })?;
    ctx.log.info(format!("Text saved to {}", txt_path.display()));
    written.push(txt_path);

    let pdf_path = ctx.artifact(page_num, "_texto.pdf");
    write_text_pdf(text, &pdf_path)?;
    ctx.log.info(format!("Text PDF saved to {}", pdf_path.display()));
    written.push(pdf_path);

    if ctx.config.searchable_pages {
        let overlay_path = ctx.artifact(page_num, "_searchable.pdf");
        let page = OverlayPage { image, text };
        match write_searchable_pdf(&[page], ctx.config.dpi, &overlay_path) {
            Ok(()) => written.push(overlay_path),
            Err(e) => {
                warn!("overlay for page {page_num} failed: {e}");
                ctx.log.error(format!(
                    "Could not create searchable PDF for page {page_num} of {}: {e}",
                    ctx.doc_name
                ));
            }
        }
    }

    Ok(written)
}

/// Combined searchable PDF of every valid page. Best-effort.
async fn write_combined(
    ctx: &Arc<PageContext>,
    pages: &[PageResult],
    images: &[Arc<DynamicImage>],
) -> Option<PathBuf> {
    let selected: Vec<(Arc<DynamicImage>, String)> = pages
        .iter()
        .filter(|p| p.is_valid())
        .filter_map(|p| images.get(p.page_num - 1).map(|img| (Arc::clone(img), p.text.clone())))
        .collect();

    let path = ctx.output_dir.join(format!("{}_searchable.pdf", ctx.base_name));
    let dpi = ctx.config.dpi;
    let target = path.clone();
    let result = tokio::task::spawn_blocking(move || {
        let overlay: Vec<OverlayPage<'_>> = selected
            .iter()
            .map(|(image, text)| OverlayPage { image, text })
            .collect();
        write_searchable_pdf(&overlay, dpi, &target)
    })
    .await;

    match result {
        Ok(Ok(())) => {
            ctx.log.info(format!("Combined searchable PDF saved to {}", path.display()));
            Some(path)
        }
        Ok(Err(e)) => {
            ctx.log.error(format!("Combined searchable PDF failed for {}: {e}", ctx.doc_name));
            None
        }
        Err(e) => {
            ctx.log.error(format!("Combined searchable PDF task panicked for {}: {e}", ctx.doc_name));
            None
        }
    }
}

pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub(crate) fn base_name(path: &Path) -> String {
    path.file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string())
}
