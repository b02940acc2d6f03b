//! # scan-ocr
//!
//! Batch OCR for folders of scanned PDFs, with a text-quality gate that
//! keeps garbage recognition out of the output.
//!
//! ## Why a quality gate?
//!
//! Scans of stamps, photos, blank backs and bleed-through produce "text"
//! that is mostly punctuation soup. Feeding that downstream (search
//! indexes, archives) is worse than emitting nothing. Every recognised page
//! is therefore classified by character composition before any artifact is
//! written, and a document with no valid page leaves no trace in the output
//! folder.
//!
//! ## Pipeline Overview
//!
//! ```text
//! input folder
//!  │
//!  ├─ for each *.pdf (sorted)
//!  │   ├─ 1. Render      rasterise pages via pdfium (spawn_blocking)
//!  │   ├─ 2. Preprocess  contrast, Otsu binarisation, median denoise, deskew
//!  │   ├─ 3. Recognise   pooled Tesseract instances, per-page timeout
//!  │   ├─ 4. Classify    letter / symbol ratios on cleaned text
//!  │   ├─ 5. Emit        _pagina_{n}.txt, _texto.pdf, _searchable.pdf
//!  │   └─ 6. Aggregate   found_valid → split + metadata, or drop the folder
//!  └─ benchmark line in the run log
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scan_ocr::{run_batch, PipelineConfig, RecognizerPool, RunLog};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::builder().language("spa").build()?;
//!     let pool = Arc::new(RecognizerPool::from_config(&config));
//!     let log = RunLog::open("output/proceso.log")?;
//!
//!     let summary = run_batch(Path::new("scans"), Path::new("output"), &config, &pool, &log).await?;
//!     eprintln!("{}/{} documents with text", summary.succeeded(), summary.documents.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature         | Default | Description |
//! |-----------------|---------|-------------|
//! | `cli`           | on      | Enables the `scan-ocr` binary (clap, indicatif, axum web form) |
//! | `tesseract-api` | off     | Recognise through libtesseract instead of the `tesseract` executable |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! scan-ocr = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod document;
pub mod error;
pub mod output;
pub mod pdf;
pub mod pipeline;
pub mod progress;
pub mod runlog;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{list_pdfs, run_batch, run_batch_sync};
pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use document::{process_document, process_images};
pub use error::{OcrError, PageError, RecognizeError};
pub use output::{BatchSummary, DocumentReport, DocumentSummary, PageResult};
pub use pipeline::classify::{is_valid_text, TextQuality};
pub use pipeline::recognize::{RecognizerFactory, RecognizerPool, TextRecognizer, TesseractCommand};
pub use pipeline::StepOutcome;
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use runlog::RunLog;
