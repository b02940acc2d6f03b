//! Batch runner: every PDF in a folder, one after another.
//!
//! Per document the runner creates `{output}/{base}/`, runs the document
//! pipeline and then decides:
//!
//! * **no valid page**: the folder is removed if it is still empty and the
//!   document is reported as failed; splitting and metadata are skipped.
//! * **at least one valid page**: the source PDF is split into
//!   `{base}_pagina_{n}.pdf` files and metadata is stamped into every
//!   `*_pagina_*.pdf` in the folder.
//!
//! A fatal error on one document is logged and counted; the batch carries on.

use crate::config::PipelineConfig;
use crate::document::{base_name, file_name, process_document};
use crate::error::OcrError;
use crate::output::{BatchSummary, DocumentSummary};
use crate::pdf::metadata::{apply_metadata_to_dir, load_metadata_map, MetadataOverrides, PdfMetadata};
use crate::pdf::split::split_pdf_by_page;
use crate::pipeline::recognize::RecognizerPool;
use crate::runlog::RunLog;
use chrono::Local;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Process every `.pdf` directly inside `input_dir`, writing one folder per
/// document under `output_dir`.
pub async fn run_batch(
    input_dir: &Path,
    output_dir: &Path,
    config: &PipelineConfig,
    pool: &Arc<RecognizerPool>,
    log: &RunLog,
) -> Result<BatchSummary, OcrError> {
    let started = Instant::now();
    let started_at = Local::now();

    let pdfs = match list_pdfs(input_dir) {
        Ok(pdfs) => pdfs,
        Err(e) => {
            log.error(format!("Error processing folder: {e}"));
            return Err(e);
        }
    };
    std::fs::create_dir_all(output_dir).map_err(|source| {
        let e = OcrError::OutputDirFailed {
            path: output_dir.to_path_buf(),
            source,
        };
        log.error(format!("Error processing folder: {e}"));
        e
    })?;

    let overrides = match (&config.metadata_map, config.write_metadata) {
        (Some(path), true) => load_metadata_map(path)?,
        _ => HashMap::new(),
    };

    log.info(format!(
        "Found {} PDF file(s) in {}",
        pdfs.len(),
        input_dir.display()
    ));
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(pdfs.len());
    }

    let mut documents = Vec::with_capacity(pdfs.len());
    for pdf in &pdfs {
        let summary = run_one(pdf, output_dir, config, pool, log, &overrides).await;
        if let Some(ref cb) = config.progress_callback {
            cb.on_document_complete(&summary.file_name, summary.success);
        }
        documents.push(summary);
    }

    let finished_at = Local::now();
    let processed = documents.iter().filter(|d| d.success).count();
    log.benchmark(started_at, finished_at, processed);

    let summary = BatchSummary {
        input_dir: input_dir.to_path_buf(),
        output_dir: output_dir.to_path_buf(),
        documents,
        started_at: started_at.format(TIMESTAMP_FORMAT).to_string(),
        finished_at: finished_at.format(TIMESTAMP_FORMAT).to_string(),
        total_duration_ms: started.elapsed().as_millis() as u64,
    };
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(summary.documents.len(), summary.succeeded());
    }
    info!(
        "batch finished: {}/{} documents succeeded",
        summary.succeeded(),
        summary.documents.len()
    );
    Ok(summary)
}

/// Blocking wrapper around [`run_batch`] that creates its own runtime.
///
/// # Panics
/// Panics if called from within an existing tokio runtime.
pub fn run_batch_sync(
    input_dir: &Path,
    output_dir: &Path,
    config: &PipelineConfig,
    pool: &Arc<RecognizerPool>,
    log: &RunLog,
) -> Result<BatchSummary, OcrError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| OcrError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(run_batch(input_dir, output_dir, config, pool, log))
}

/// Immediate `.pdf` files of `dir` (extension matched case-insensitively),
/// sorted by name.
pub fn list_pdfs(dir: &Path) -> Result<Vec<PathBuf>, OcrError> {
    if !dir.is_dir() {
        return Err(OcrError::InputNotFound {
            path: dir.to_path_buf(),
        });
    }
    let entries = std::fs::read_dir(dir).map_err(|source| OcrError::InputUnreadable {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut pdfs: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .map(|ext| ext.eq_ignore_ascii_case("pdf"))
                .unwrap_or(false)
        })
        .collect();
    pdfs.sort();
    Ok(pdfs)
}

// ── Per document ─────────────────────────────────────────────────────────

async fn run_one(
    pdf: &Path,
    output_root: &Path,
    config: &PipelineConfig,
    pool: &Arc<RecognizerPool>,
    log: &RunLog,
    overrides: &HashMap<String, MetadataOverrides>,
) -> DocumentSummary {
    let name = file_name(pdf);
    let base = base_name(pdf);
    let doc_dir = output_root.join(&base);
    log.info(format!("Processing file: {name}"));

    let mut summary = DocumentSummary {
        file_name: name.clone(),
        success: false,
        total_pages: 0,
        valid_pages: 0,
        split_files: 0,
        error: None,
    };

    if let Err(source) = std::fs::create_dir_all(&doc_dir) {
        let e = OcrError::OutputDirFailed {
            path: doc_dir.clone(),
            source,
        };
        log.error(format!("Error processing {name}: {e}"));
        summary.error = Some(e.to_string());
        return summary;
    }

    let report = match process_document(pdf, &doc_dir, config, pool, log).await {
        Ok(report) => report,
        Err(e) => {
            log.error(format!("Error processing {name}: {e}"));
            remove_if_empty(&doc_dir);
            summary.error = Some(e.to_string());
            return summary;
        }
    };

    summary.total_pages = report.total_pages();
    summary.valid_pages = report.valid_pages();
    if !report.found_valid {
        remove_if_empty(&doc_dir);
        return summary;
    }
    summary.success = true;

    if config.split_pages {
        summary.split_files = split_source(pdf, &doc_dir, &base, log).await;
    }
    if config.write_metadata {
        let meta = PdfMetadata::for_source(&name, &config.author, &config.producer);
        stamp_metadata(&doc_dir, meta, overrides.clone(), log).await;
    }

    log.info(format!("Finished processing {name}"));
    summary
}

async fn split_source(pdf: &Path, doc_dir: &Path, base: &str, log: &RunLog) -> usize {
    let (source, dir, base_owned) = (pdf.to_path_buf(), doc_dir.to_path_buf(), base.to_string());
    let result = tokio::task::spawn_blocking(move || split_pdf_by_page(&source, &dir, &base_owned)).await;

    match result {
        Ok(Ok(files)) => {
            log.info(format!("{} split into {} page file(s)", pdf.display(), files.len()));
            files.len()
        }
        Ok(Err(e)) => {
            log.error(format!("Error splitting {}: {e}", pdf.display()));
            0
        }
        Err(e) => {
            log.error(format!("Split task panicked for {}: {e}", pdf.display()));
            0
        }
    }
}

async fn stamp_metadata(
    doc_dir: &Path,
    meta: PdfMetadata,
    overrides: HashMap<String, MetadataOverrides>,
    log: &RunLog,
) {
    let dir = doc_dir.to_path_buf();
    let result = tokio::task::spawn_blocking(move || apply_metadata_to_dir(&dir, &meta, &overrides)).await;

    match result {
        Ok(Ok(stamp)) => {
            for (name, e) in &stamp.failures {
                log.error(format!("Error adding metadata to {name}: {e}"));
            }
            log.info(format!(
                "Metadata added to {} file(s) in {}",
                stamp.updated,
                doc_dir.display()
            ));
        }
        Ok(Err(e)) => log.error(format!("Error adding metadata in {}: {e}", doc_dir.display())),
        Err(e) => log.error(format!("Metadata task panicked in {}: {e}", doc_dir.display())),
    }
}

/// Remove `dir` only when it holds nothing.
fn remove_if_empty(dir: &Path) {
    let empty = std::fs::read_dir(dir)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false);
    if empty {
        match std::fs::remove_dir(dir) {
            Ok(()) => debug!("removed empty folder {}", dir.display()),
            Err(e) => debug!("could not remove {}: {e}", dir.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdfs_are_listed_case_insensitively_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.pdf", "A.PDF", "notes.txt", "c.Pdf"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.pdf")).unwrap();

        let names: Vec<String> = list_pdfs(dir.path())
            .unwrap()
            .iter()
            .map(|p| file_name(p))
            .collect();
        assert_eq!(names, vec!["A.PDF", "b.pdf", "c.Pdf"]);
    }

    #[test]
    fn missing_input_folder_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = list_pdfs(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, OcrError::InputNotFound { .. }));
    }

    #[test]
    fn only_empty_folders_are_removed() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty");
        let full = dir.path().join("full");
        std::fs::create_dir(&empty).unwrap();
        std::fs::create_dir(&full).unwrap();
        std::fs::write(full.join("keep.txt"), "x").unwrap();

        remove_if_empty(&empty);
        remove_if_empty(&full);
        assert!(!empty.exists());
        assert!(full.join("keep.txt").exists());
    }

    #[tokio::test]
    async fn unreadable_document_leaves_no_folder() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        std::fs::write(input.path().join("scan.PDF"), b"garbage, not a pdf").unwrap();

        let config = PipelineConfig::default();
        let pool = Arc::new(RecognizerPool::from_config(&config));
        let log = RunLog::memory();

        let summary = run_batch(input.path(), output.path(), &config, &pool, &log)
            .await
            .unwrap();

        assert_eq!(summary.documents.len(), 1);
        assert_eq!(summary.failed(), 1);
        assert!(!output.path().join("scan").exists());

        let text = log.content();
        assert!(text.contains("Processing file: scan.PDF"));
        assert!(text.contains("no usable text"));
        assert!(text.contains("BENCHMARK: total"));
        assert!(text.contains("files processed: 0"));
    }

    #[tokio::test]
    async fn benchmark_counts_only_documents_with_text() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        for name in ["a.pdf", "b.pdf"] {
            std::fs::write(input.path().join(name), b"%PDF-1.4 truncated").unwrap();
        }

        let config = PipelineConfig::default();
        let pool = Arc::new(RecognizerPool::from_config(&config));
        let log = RunLog::memory();
        let summary = run_batch(input.path(), output.path(), &config, &pool, &log)
            .await
            .unwrap();

        assert_eq!(summary.documents.len(), 2);
        assert_eq!(summary.succeeded(), 0);
        let text = log.content();
        assert!(text.contains("Found 2 PDF file(s)"));
        assert!(text.contains("files processed: 0"), "got: {text}");
    }

    #[tokio::test]
    async fn metadata_failures_reach_the_run_log() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f_pagina_1.pdf"), b"not a pdf").unwrap();

        let log = RunLog::memory();
        let meta = PdfMetadata::for_source("f.pdf", "OCR_App", "OCR App");
        stamp_metadata(dir.path(), meta, HashMap::new(), &log).await;

        let text = log.content();
        assert!(text.contains("ERROR: Error adding metadata to f_pagina_1.pdf"), "got: {text}");
        assert!(text.contains("Metadata added to 0 file(s)"));
    }

    #[tokio::test]
    async fn bad_metadata_map_fails_before_any_document() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let map = input.path().join("meta.json");
        std::fs::write(&map, "{ not json").unwrap();

        let config = PipelineConfig::builder().metadata_map(&map).build().unwrap();
        let pool = Arc::new(RecognizerPool::from_config(&config));
        let err = run_batch(input.path(), output.path(), &config, &pool, &RunLog::memory())
            .await
            .unwrap_err();
        assert!(matches!(err, OcrError::InvalidConfig(_)));
    }
}
