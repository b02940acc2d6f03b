//! Per-page OCR stages.
//!
//! Each submodule implements exactly one transformation step, so each can
//! be tested on its own and swapped without touching its neighbours.
//!
//! ## Data Flow
//!
//! ```text
//! render ──▶ preprocess ──▶ recognize ──▶ postprocess ──▶ classify
//! (pdfium)   (deskew/bin)   (tesseract)   (line cleanup)  (quality gate)
//! ```
//!
//! 1. [`render`]     : rasterise every page; runs in `spawn_blocking`
//!    because pdfium is not async-safe
//! 2. [`preprocess`] : grayscale, contrast, denoise, Otsu binarisation, deskew
//! 3. [`recognize`]  : recognizer trait, Tesseract adapters, instance pool
//! 4. [`postprocess`]: normalise raw recognizer output into trimmed lines
//! 5. [`classify`]   : character-composition heuristic deciding usability
//!
//! [`encode`] holds the PNG helpers shared by the recognizers and the PDF
//! writers.
//!
//! Rasterise, preprocess and recognize never fail the pipeline: they return
//! a [`StepOutcome`] whose degraded form still carries a usable value.

pub mod classify;
pub mod encode;
pub mod postprocess;
pub mod preprocess;
pub mod recognize;
pub mod render;

/// Result of a best-effort stage.
///
/// `Degraded` carries the fallback value the next stage should use (an empty
/// page list, the untouched image, an empty string) together with the reason
/// the stage could not do its job.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome<T> {
    Done(T),
    Degraded { value: T, reason: String },
}

impl<T> StepOutcome<T> {
    pub fn degraded(value: T, reason: impl Into<String>) -> Self {
        StepOutcome::Degraded {
            value,
            reason: reason.into(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, StepOutcome::Degraded { .. })
    }

    /// The reason the stage degraded, if it did.
    pub fn reason(&self) -> Option<&str> {
        match self {
            StepOutcome::Done(_) => None,
            StepOutcome::Degraded { reason, .. } => Some(reason),
        }
    }

    /// Consume the outcome, keeping only the value.
    pub fn into_value(self) -> T {
        match self {
            StepOutcome::Done(v) | StepOutcome::Degraded { value: v, .. } => v,
        }
    }

    pub fn value(&self) -> &T {
        match self {
            StepOutcome::Done(v) | StepOutcome::Degraded { value: v, .. } => v,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degraded_keeps_fallback_value() {
        let out: StepOutcome<Vec<u8>> = StepOutcome::degraded(vec![], "not a PDF");
        assert!(out.is_degraded());
        assert_eq!(out.reason(), Some("not a PDF"));
        assert!(out.into_value().is_empty());
    }

    #[test]
    fn done_has_no_reason() {
        let out = StepOutcome::Done("text".to_string());
        assert!(!out.is_degraded());
        assert_eq!(out.reason(), None);
        assert_eq!(out.value(), "text");
    }
}
