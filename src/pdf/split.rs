//! Split a source PDF into single-page (or page-range) files.

use super::{build_failed, save_document};
use crate::error::OcrError;
use lopdf::Document;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Write `{base}_pagina_{n}.pdf` into `out_dir` for every page of `source`.
pub fn split_pdf_by_page(source: &Path, out_dir: &Path, base: &str) -> Result<Vec<PathBuf>, OcrError> {
    let doc = Document::load(source).map_err(|e| build_failed(source, e))?;
    let total = doc.get_pages().len() as u32;

    let mut written = Vec::with_capacity(total as usize);
    for n in 1..=total {
        let path = out_dir.join(format!("{base}_pagina_{n}.pdf"));
        write_page_range(&doc, n, n, &path)?;
        written.push(path);
    }
    Ok(written)
}

/// Write `{base}_rango_{start}_a_{end}.pdf` for each inclusive 1-based range.
///
/// Ranges that fall outside the document are rejected before anything is
/// written.
pub fn split_pdf_by_ranges(
    source: &Path,
    ranges: &[(u32, u32)],
    out_dir: &Path,
    base: &str,
) -> Result<Vec<PathBuf>, OcrError> {
    let doc = Document::load(source).map_err(|e| build_failed(source, e))?;
    let total = doc.get_pages().len() as u32;

    if let Some(&(start, end)) = ranges
        .iter()
        .find(|&&(s, e)| s == 0 || s > e || e > total)
    {
        return Err(build_failed(
            source,
            format!("page range {start}-{end} invalid for a {total}-page document"),
        ));
    }

    let mut written = Vec::with_capacity(ranges.len());
    for &(start, end) in ranges {
        let path = out_dir.join(format!("{base}_rango_{start}_a_{end}.pdf"));
        write_page_range(&doc, start, end, &path)?;
        written.push(path);
    }
    Ok(written)
}

fn write_page_range(doc: &Document, start: u32, end: u32, path: &Path) -> Result<(), OcrError> {
    let mut part = doc.clone();
    let others: Vec<u32> = part
        .get_pages()
        .keys()
        .copied()
        .filter(|n| *n < start || *n > end)
        .collect();
    part.delete_pages(&others);
    part.prune_objects();
    save_document(&mut part, path)?;
    debug!("wrote pages {start}-{end} to {}", path.display());
    Ok(())
}
