//! Error types for the scan-ocr library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`OcrError`] is **fatal**: the run or the current document cannot
//!   proceed (input folder missing, output folder not writable, an artifact
//!   could not be written). Returned as `Err(OcrError)`.
//!
//! * [`PageError`] is **non-fatal**: a single page produced no usable text
//!   (recognizer crashed, timed out, or the text failed the quality gate).
//!   Stored inside [`crate::output::PageResult`]; the document carries on
//!   with its remaining pages.
//!
//! Rasterisation, preprocessing and recognition failures are not errors at
//! all from the caller's point of view: each stage degrades to an empty or
//! unmodified value (see [`crate::pipeline::StepOutcome`]).

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the scan-ocr library.
#[derive(Debug, Error)]
pub enum OcrError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input folder was not found at the given path.
    #[error("Input folder not found: '{path}'")]
    InputNotFound { path: PathBuf },

    /// Input folder exists but could not be listed.
    #[error("Failed to read input folder '{path}': {source}")]
    InputUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create an output folder.
    #[error("Failed to create output folder '{path}': {source}")]
    OutputDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write an artifact file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A PDF artifact could not be assembled.
    #[error("Failed to build PDF '{path}': {detail}")]
    PdfBuildFailed { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (a worker task panicked, runtime failure).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Why a recognizer could not produce text for an image.
///
/// Never escapes the recognition stage: the adapter logs it and carries on
/// with an empty string.
#[derive(Debug, Error)]
pub enum RecognizeError {
    #[error("Failed to encode page image: {0}")]
    Encode(#[from] image::ImageError),

    #[error("Recognizer I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not start '{cmd}': {source}")]
    Spawn {
        cmd: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Recognizer exited with {status}")]
    Exit { status: String },

    #[error("Recognizer killed after {secs}s")]
    Killed { secs: u64 },

    #[error("Recognition engine error: {0}")]
    Engine(String),
}

/// A non-fatal reason a single page emitted no artifacts.
#[derive(Debug, Clone, Error, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The recognizer failed; the page was treated as having no text.
    #[error("Page {page}: recognition failed: {detail}")]
    RecognitionFailed { page: usize, detail: String },

    /// Recognition did not finish within the per-page budget.
    #[error("Page {page}: recognition timed out after {secs}s")]
    Timeout { page: usize, secs: u64 },

    /// Recognition succeeded but returned nothing but whitespace.
    #[error("Page {page}: no text recognised")]
    BlankText { page: usize },

    /// The recognised text failed the validity heuristic.
    #[error(
        "Page {page}: text rejected ({chars} chars, letters {letter_ratio:.2}, symbols {symbol_ratio:.2})"
    )]
    LowQuality {
        page: usize,
        chars: usize,
        letter_ratio: f64,
        symbol_ratio: f64,
    },
}

impl PageError {
    /// 1-based page number this error refers to.
    pub fn page(&self) -> usize {
        match self {
            PageError::RecognitionFailed { page, .. }
            | PageError::Timeout { page, .. }
            | PageError::BlankText { page }
            | PageError::LowQuality { page, .. } => *page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_write_failed_display() {
        let e = OcrError::OutputWriteFailed {
            path: PathBuf::from("/out/doc/doc_pagina_1.txt"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let msg = e.to_string();
        assert!(msg.contains("doc_pagina_1.txt"), "got: {msg}");
        assert!(msg.contains("denied"), "got: {msg}");
    }

    #[test]
    fn timeout_display() {
        let e = PageError::Timeout { page: 3, secs: 120 };
        assert!(e.to_string().contains("Page 3"));
        assert!(e.to_string().contains("120s"));
    }

    #[test]
    fn low_quality_display_has_ratios() {
        let e = PageError::LowQuality {
            page: 2,
            chars: 36,
            letter_ratio: 0.0,
            symbol_ratio: 0.694,
        };
        let msg = e.to_string();
        assert!(msg.contains("36 chars"), "got: {msg}");
        assert!(msg.contains("0.69"), "got: {msg}");
    }

    #[test]
    fn page_accessor() {
        assert_eq!(PageError::BlankText { page: 7 }.page(), 7);
        assert_eq!(
            PageError::RecognitionFailed {
                page: 4,
                detail: "x".into()
            }
            .page(),
            4
        );
    }
}
