//! Configuration types for batch OCR runs.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built via
//! its [`PipelineConfigBuilder`]. One struct holds every knob so the same
//! config can be shared by the CLI, the web form and library callers.

use crate::error::OcrError;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;

/// Configuration for an OCR batch run.
///
/// Built via [`PipelineConfig::builder()`] or using
/// [`PipelineConfig::default()`].
///
/// # Example
/// ```rust
/// use scan_ocr::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .dpi(300)
///     .concurrency(4)
///     .language("spa")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Rasterisation DPI. Range: 72–600. Default: 400.
    ///
    /// Recognition accuracy on small print drops sharply below 300 DPI;
    /// 400 keeps accents and punctuation legible for Tesseract.
    pub dpi: u32,

    /// Maximum rendered image dimension (width or height) in pixels. Default: 8000.
    ///
    /// Caps oversized pages (posters, plans) independently of DPI.
    pub max_rendered_pixels: u32,

    /// Number of pages recognised at the same time. Default: 1.
    ///
    /// Each worker holds its own recognizer instance from the pool.
    pub concurrency: usize,

    /// Per-page recognition budget in seconds. `0` disables it. Default: 120.
    pub page_timeout_secs: u64,

    /// Tesseract language code. Default: `spa`.
    pub language: String,

    /// Path or name of the `tesseract` executable. Default: `tesseract`.
    pub tesseract_cmd: PathBuf,

    /// Directory holding `*.traineddata`; Tesseract's default when `None`.
    pub tessdata_dir: Option<PathBuf>,

    /// Explicit pdfium library path. When `None`, `PDFIUM_LIB_PATH`, the
    /// working directory and the usual system locations are tried.
    pub pdfium_lib_path: Option<PathBuf>,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Emit `{base}_pagina_{n}_searchable.pdf` for every valid page. Default: true.
    pub searchable_pages: bool,

    /// Emit `{base}_searchable.pdf` combining every valid page. Default: true.
    pub combined_searchable: bool,

    /// Split successful source PDFs into `{base}_pagina_{n}.pdf`. Default: true.
    pub split_pages: bool,

    /// Write Title/Author/Producer/CustomID into generated PDFs. Default: true.
    pub write_metadata: bool,

    /// Producer written into PDF metadata. Default: `OCR App`.
    pub producer: String,

    /// Author written into PDF metadata. Default: `OCR_App`.
    pub author: String,

    /// JSON file of per-file metadata overrides, keyed by output file name.
    pub metadata_map: Option<PathBuf>,

    /// Optional progress observer.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dpi: 400,
            max_rendered_pixels: 8000,
            concurrency: 1,
            page_timeout_secs: 120,
            language: "spa".to_string(),
            tesseract_cmd: PathBuf::from("tesseract"),
            tessdata_dir: None,
            pdfium_lib_path: None,
            password: None,
            searchable_pages: true,
            combined_searchable: true,
            split_pages: true,
            write_metadata: true,
            producer: "OCR App".to_string(),
            author: "OCR_App".to_string(),
            metadata_map: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("concurrency", &self.concurrency)
            .field("page_timeout_secs", &self.page_timeout_secs)
            .field("language", &self.language)
            .field("tesseract_cmd", &self.tesseract_cmd)
            .field("tessdata_dir", &self.tessdata_dir)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("searchable_pages", &self.searchable_pages)
            .field("combined_searchable", &self.combined_searchable)
            .field("split_pages", &self.split_pages)
            .field("write_metadata", &self.write_metadata)
            .field("producer", &self.producer)
            .field("author", &self.author)
            .field("metadata_map", &self.metadata_map)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// The per-page timeout, or `None` when disabled.
    pub fn page_timeout(&self) -> Option<std::time::Duration> {
        (self.page_timeout_secs > 0).then(|| std::time::Duration::from_secs(self.page_timeout_secs))
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn page_timeout_secs(mut self, secs: u64) -> Self {
        self.config.page_timeout_secs = secs;
        self
    }

    pub fn language(mut self, lang: impl Into<String>) -> Self {
        self.config.language = lang.into();
        self
    }

    pub fn tesseract_cmd(mut self, cmd: impl Into<PathBuf>) -> Self {
        self.config.tesseract_cmd = cmd.into();
        self
    }

    pub fn tessdata_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.tessdata_dir = Some(dir.into());
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn searchable_pages(mut self, v: bool) -> Self {
        self.config.searchable_pages = v;
        self
    }

    pub fn combined_searchable(mut self, v: bool) -> Self {
        self.config.combined_searchable = v;
        self
    }

    pub fn split_pages(mut self, v: bool) -> Self {
        self.config.split_pages = v;
        self
    }

    pub fn write_metadata(mut self, v: bool) -> Self {
        self.config.write_metadata = v;
        self
    }

    pub fn producer(mut self, producer: impl Into<String>) -> Self {
        self.config.producer = producer.into();
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.config.author = author.into();
        self
    }

    pub fn metadata_map(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.metadata_map = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, OcrError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 600 {
            return Err(OcrError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.dpi
            )));
        }
        if c.concurrency == 0 {
            return Err(OcrError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if c.language.trim().is_empty() {
            return Err(OcrError::InvalidConfig(
                "Recognition language must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_behaviour() {
        let c = PipelineConfig::default();
        assert_eq!(c.dpi, 400);
        assert_eq!(c.concurrency, 1);
        assert_eq!(c.language, "spa");
        assert!(c.searchable_pages);
        assert_eq!(c.page_timeout(), Some(std::time::Duration::from_secs(120)));
    }

    #[test]
    fn builder_clamps_values() {
        let c = PipelineConfig::builder()
            .dpi(10_000)
            .concurrency(0)
            .build()
            .unwrap();
        assert_eq!(c.dpi, 600);
        assert_eq!(c.concurrency, 1);
    }

    #[test]
    fn zero_timeout_disables_budget() {
        let c = PipelineConfig::builder().page_timeout_secs(0).build().unwrap();
        assert_eq!(c.page_timeout(), None);
    }

    #[test]
    fn empty_language_rejected() {
        let err = PipelineConfig::builder().language("  ").build().unwrap_err();
        assert!(matches!(err, OcrError::InvalidConfig(_)));
    }

    #[test]
    fn debug_redacts_password() {
        let c = PipelineConfig::builder().password("hunter2").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("<redacted>"));
    }
}
