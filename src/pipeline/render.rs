//! PDF rasterisation: render every page to an RGB image via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and must not be driven from an async worker thread.
//! `tokio::task::spawn_blocking` moves the work onto the blocking pool.
//!
//! ## Failure policy
//!
//! An unreadable, corrupt or encrypted file is not an error here: the
//! rasteriser reports it and yields zero pages, and the document simply
//! ends with no valid text.

use crate::config::PipelineConfig;
use crate::pipeline::StepOutcome;
use image::RgbImage;
use pdfium_render::prelude::*;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Rasterise every page of `pdf_path`, in page order.
pub async fn render_document(pdf_path: &Path, config: &PipelineConfig) -> StepOutcome<Vec<RgbImage>> {
    let path = pdf_path.to_path_buf();
    let settings = RenderSettings::from_config(config);

    match tokio::task::spawn_blocking(move || render_document_blocking(&path, &settings)).await {
        Ok(outcome) => outcome,
        Err(e) => StepOutcome::degraded(Vec::new(), format!("render task panicked: {e}")),
    }
}

/// Owned copy of the config fields the blocking thread needs.
#[derive(Debug, Clone)]
struct RenderSettings {
    dpi: u32,
    max_pixels: u32,
    password: Option<String>,
    lib_path: Option<PathBuf>,
}

impl RenderSettings {
    fn from_config(config: &PipelineConfig) -> Self {
        Self {
            dpi: config.dpi,
            max_pixels: config.max_rendered_pixels,
            password: config.password.clone(),
            lib_path: config.pdfium_lib_path.clone(),
        }
    }
}

fn render_document_blocking(pdf_path: &Path, settings: &RenderSettings) -> StepOutcome<Vec<RgbImage>> {
    if let Err(reason) = check_pdf_magic(pdf_path) {
        warn!("{}: {reason}", pdf_path.display());
        return StepOutcome::degraded(Vec::new(), reason);
    }

    let pdfium = match bind_pdfium(settings.lib_path.as_deref()) {
        Ok(p) => p,
        Err(reason) => {
            warn!("{reason}");
            return StepOutcome::degraded(Vec::new(), reason);
        }
    };

    let document = match pdfium.load_pdf_from_file(pdf_path, settings.password.as_deref()) {
        Ok(doc) => doc,
        Err(e) => {
            let reason = format!("cannot open {}: {e:?}", pdf_path.display());
            warn!("{reason}");
            return StepOutcome::degraded(Vec::new(), reason);
        }
    };

    let pages = document.pages();
    let total = pages.len() as usize;
    info!("{}: {total} pages", pdf_path.display());

    let mut images = Vec::with_capacity(total);
    for idx in 0..total {
        let rendered = pages
            .get(idx as u16)
            .map_err(|e| format!("{e:?}"))
            .and_then(|page| render_page(&page, settings).map_err(|e| format!("{e:?}")));

        match rendered {
            Ok(img) => {
                debug!("Rendered page {} → {}x{} px", idx + 1, img.width(), img.height());
                images.push(img);
            }
            Err(detail) => {
                // A page list with holes would shift every later page number.
                let reason = format!("page {} of {} failed to render: {detail}", idx + 1, pdf_path.display());
                warn!("{reason}");
                return StepOutcome::degraded(Vec::new(), reason);
            }
        }
    }

    StepOutcome::Done(images)
}

fn render_page(page: &PdfPage, settings: &RenderSettings) -> Result<RgbImage, PdfiumError> {
    let (width_px, height_px) = target_size(
        page.width().value,
        page.height().value,
        settings.dpi,
        settings.max_pixels,
    );

    let render_config = PdfRenderConfig::new()
        .set_target_width(width_px as i32)
        .set_target_height(height_px as i32)
        .render_form_data(true)
        .render_annotations(true);

    let bitmap = page.render_with_config(&render_config)?;
    Ok(bitmap.as_image().to_rgb8())
}

/// Pixel size of a page of `width_pt` × `height_pt` points at `dpi`, with the
/// longest edge capped at `max_pixels`.
pub(crate) fn target_size(width_pt: f32, height_pt: f32, dpi: u32, max_pixels: u32) -> (u32, u32) {
    let scale = dpi as f32 / 72.0;
    let mut w = (width_pt * scale).round().max(1.0);
    let mut h = (height_pt * scale).round().max(1.0);

    let longest = w.max(h);
    if longest > max_pixels as f32 {
        let ratio = max_pixels as f32 / longest;
        w = (w * ratio).round().max(1.0);
        h = (h * ratio).round().max(1.0);
    }
    (w as u32, h as u32)
}

/// Bind to pdfium: explicit path, `PDFIUM_LIB_PATH`, the working directory,
/// then the usual system locations.
pub(crate) fn bind_pdfium(explicit: Option<&Path>) -> Result<Pdfium, String> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(p) = explicit {
        candidates.push(p.to_path_buf());
    }
    if let Ok(p) = std::env::var("PDFIUM_LIB_PATH") {
        if !p.is_empty() {
            candidates.push(PathBuf::from(p));
        }
    }

    for candidate in &candidates {
        let lib = if candidate.is_dir() {
            Pdfium::pdfium_platform_library_name_at_path(candidate)
        } else {
            candidate.clone()
        };
        match Pdfium::bind_to_library(&lib) {
            Ok(bindings) => return Ok(Pdfium::new(bindings)),
            Err(e) => debug!("pdfium not loadable from {}: {e:?}", lib.display()),
        }
    }

    Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("/usr/lib")))
        .or_else(|_| Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("/usr/local/lib")))
        .or_else(|_| Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("/opt/homebrew/lib")))
        .or_else(|_| Pdfium::bind_to_system_library())
        .map(Pdfium::new)
        .map_err(|e| format!("could not find the pdfium library: {e:?}"))
}

/// Reject files that do not start with the `%PDF` signature before handing
/// them to pdfium.
fn check_pdf_magic(path: &Path) -> Result<(), String> {
    let mut header = [0u8; 4];
    let mut file = std::fs::File::open(path).map_err(|e| format!("cannot read: {e}"))?;
    file.read_exact(&mut header)
        .map_err(|_| "file too short to be a PDF".to_string())?;
    if &header == b"%PDF" {
        Ok(())
    } else {
        Err("not a PDF (missing %PDF header)".to_string())
    }
}
