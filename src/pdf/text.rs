//! Recognised text rendered as a plain A4 PDF.
//!
//! Helvetica 12 pt, 10 mm line pitch, 10 mm side and top margins and a
//! 15 mm bottom margin. Each source line is word-wrapped to the text width;
//! pages break automatically.

use super::{build_failed, encode_win_ansi, text_width, PdfBuilder, FONT_NAME};
use crate::error::OcrError;
use lopdf::content::Operation;
use lopdf::{Object, StringFormat};
use std::path::Path;
use tracing::debug;

const MM: f32 = 72.0 / 25.4;

pub const PAGE_WIDTH: f32 = 595.28;
pub const PAGE_HEIGHT: f32 = 841.89;
pub const FONT_SIZE: f32 = 12.0;

const MARGIN: f32 = 10.0 * MM;
const BOTTOM_MARGIN: f32 = 15.0 * MM;
const LINE_HEIGHT: f32 = 10.0 * MM;
/// Horizontal padding inside the text cell.
const CELL_PADDING: f32 = 1.0 * MM;

/// Width available to one line of text.
pub fn text_area_width() -> f32 {
    PAGE_WIDTH - 2.0 * MARGIN - 2.0 * CELL_PADDING
}

fn lines_per_page() -> usize {
    ((PAGE_HEIGHT - MARGIN - BOTTOM_MARGIN) / LINE_HEIGHT).floor() as usize
}

/// Greedy word wrap. Words wider than the line are broken by character.
pub fn wrap_line(line: &str, max_width: f32, size: f32) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();

    for word in line.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };
        if text_width(&candidate, size) <= max_width {
            current = candidate;
            continue;
        }

        if !current.is_empty() {
            out.push(std::mem::take(&mut current));
        }
        if text_width(word, size) <= max_width {
            current = word.to_string();
            continue;
        }

        for c in word.chars() {
            let mut next = current.clone();
            next.push(c);
            if !current.is_empty() && text_width(&next, size) > max_width {
                out.push(std::mem::replace(&mut current, c.to_string()));
            } else {
                current = next;
            }
        }
    }

    if !current.is_empty() || out.is_empty() {
        out.push(current);
    }
    out
}

/// Lay `text` out into pages of wrapped lines. Always at least one page.
pub fn layout(text: &str) -> Vec<Vec<String>> {
    let width = text_area_width();
    let per_page = lines_per_page().max(1);

    let lines: Vec<String> = text
        .lines()
        .flat_map(|line| wrap_line(line, width, FONT_SIZE))
        .collect();

    if lines.is_empty() {
        return vec![Vec::new()];
    }
    lines.chunks(per_page).map(|c| c.to_vec()).collect()
}

fn page_operations(lines: &[String]) -> Vec<Operation> {
    let x = MARGIN + CELL_PADDING;
    let mut ops = Vec::with_capacity(lines.len() * 4 + 2);
    ops.push(Operation::new("BT", vec![]));
    ops.push(Operation::new(
        "Tf",
        vec![FONT_NAME.into(), Object::Real(FONT_SIZE)],
    ));
    for (i, line) in lines.iter().enumerate() {
        let top = PAGE_HEIGHT - MARGIN - i as f32 * LINE_HEIGHT;
        let baseline = top - LINE_HEIGHT / 2.0 - 0.3 * FONT_SIZE;
        ops.push(Operation::new(
            "Tm",
            vec![
                Object::Integer(1),
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(1),
                Object::Real(x),
                Object::Real(baseline),
            ],
        ));
        ops.push(Operation::new(
            "Tj",
            vec![Object::String(encode_win_ansi(line), StringFormat::Literal)],
        ));
    }
    ops.push(Operation::new("ET", vec![]));
    ops
}

/// Write `text` as an A4 PDF at `path`.
pub fn write_text_pdf(text: &str, path: &Path) -> Result<(), OcrError> {
    let pages = layout(text);
    let mut builder = PdfBuilder::new();
    for lines in &pages {
        builder
            .add_page(PAGE_WIDTH, PAGE_HEIGHT, page_operations(lines), None)
            .map_err(|e| build_failed(path, e))?;
    }
    debug!("text PDF {} → {} page(s)", path.display(), builder.page_count());
    builder.save(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::Document;

    #[test]
    fn short_line_is_not_wrapped() {
        assert_eq!(wrap_line("Hola mundo", 500.0, 12.0), vec!["Hola mundo"]);
    }

    #[test]
    fn long_line_wraps_on_words() {
        let line = "palabra ".repeat(40);
        let wrapped = wrap_line(&line, text_area_width(), FONT_SIZE);
        assert!(wrapped.len() > 1);
        for l in &wrapped {
            assert!(text_width(l, FONT_SIZE) <= text_area_width());
            assert!(!l.starts_with(' ') && !l.ends_with(' '));
        }
        let rejoined: Vec<&str> = wrapped.iter().flat_map(|l| l.split(' ')).collect();
        assert_eq!(rejoined.len(), 40);
    }

    #[test]
    fn overlong_word_is_broken_by_character() {
        let word = "W".repeat(100);
        let wrapped = wrap_line(&word, 100.0, 12.0);
        assert!(wrapped.len() > 1);
        assert_eq!(wrapped.concat(), word);
        assert!(wrapped.iter().all(|l| text_width(l, 12.0) <= 100.0));
    }

    #[test]
    fn empty_line_keeps_its_slot() {
        assert_eq!(wrap_line("", 100.0, 12.0), vec![String::new()]);
    }

    #[test]
    fn pages_break_automatically() {
        let per_page = lines_per_page();
        assert_eq!(per_page, 27);
        let text = (1..=60).map(|i| format!("linea {i}")).collect::<Vec<_>>().join("\n");
        let pages = layout(&text);
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0].len(), 27);
        assert_eq!(pages[2].len(), 6);
    }

    #[test]
    fn written_pdf_has_expected_pages() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc_pagina_1_texto.pdf");
        let text = (1..=30).map(|i| format!("Señor Núñez línea {i}")).collect::<Vec<_>>().join("\n");
        write_text_pdf(&text, &path).unwrap();

        let doc = Document::load(&path).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }

    #[test]
    fn empty_text_still_produces_a_page() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.pdf");
        write_text_pdf("", &path).unwrap();
        assert_eq!(Document::load(&path).unwrap().get_pages().len(), 1);
    }

    #[test]
    fn unwritable_path_is_output_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("x.pdf");
        let err = write_text_pdf("hola", &path).unwrap_err();
        assert!(matches!(err, OcrError::OutputWriteFailed { .. }));
    }
}
