//! Result types produced by the document pipeline and the batch runner.

use crate::error::PageError;
use crate::pipeline::classify::TextQuality;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What happened to one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult {
    /// 1-based page number.
    pub page_num: usize,
    /// Normalised recognizer output. Kept for skipped pages too.
    pub text: String,
    /// Composition metrics; `None` when recognition never produced text.
    pub quality: Option<TextQuality>,
    /// Files written for this page, in emission order.
    pub artifacts: Vec<PathBuf>,
    /// Why the page was skipped, or `None` when it was emitted.
    pub error: Option<PageError>,
    /// Wall time spent on preprocessing and recognition.
    pub duration_ms: u64,
}

impl PageResult {
    /// True when the page passed the quality gate and its artifacts exist.
    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome of running one PDF through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentReport {
    /// Source PDF.
    pub source: PathBuf,
    /// File stem used to name every artifact.
    pub base_name: String,
    /// Per-document output folder.
    pub output_dir: PathBuf,
    /// One entry per rasterised page, sorted by page number.
    pub pages: Vec<PageResult>,
    /// At least one page passed the quality gate.
    pub found_valid: bool,
    /// Text of the valid pages joined by a blank line.
    pub text: String,
    /// Combined searchable PDF, when it was produced.
    pub combined_pdf: Option<PathBuf>,
    pub duration_ms: u64,
}

impl DocumentReport {
    pub fn total_pages(&self) -> usize {
        self.pages.len()
    }

    pub fn valid_pages(&self) -> usize {
        self.pages.iter().filter(|p| p.is_valid()).count()
    }
}

/// Per-document line of a [`BatchSummary`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub file_name: String,
    pub success: bool,
    pub total_pages: usize,
    pub valid_pages: usize,
    /// Single-page PDFs produced by the splitter.
    pub split_files: usize,
    /// Fatal error text when the document aborted.
    pub error: Option<String>,
}

/// Aggregate result of one batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub documents: Vec<DocumentSummary>,
    /// Local start time, `YYYY-MM-DD HH:MM:SS`.
    pub started_at: String,
    pub finished_at: String,
    pub total_duration_ms: u64,
}

impl BatchSummary {
    pub fn succeeded(&self) -> usize {
        self.documents.iter().filter(|d| d.success).count()
    }

    pub fn failed(&self) -> usize {
        self.documents.len() - self.succeeded()
    }
}
