//! Post-processing: deterministic cleanup of raw recognizer output.
//!
//! Tesseract returns one text block per layout region, separated by blank
//! lines, with a form feed after the last page and the occasional
//! zero-width character picked up from speckle. Downstream consumers want
//! one trimmed line per recognised line and nothing else.
//!
//! ## Rule Order
//!
//! Line endings are normalised before splitting, and invisible characters
//! are removed before trimming so a line holding only a zero-width space
//! counts as blank.

/// Apply all cleanup rules to raw recognizer output.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF / CR → LF) and turn form feeds into breaks
/// 2. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens, etc.)
/// 3. Trim every line
/// 4. Drop blank lines and join the rest with `\n`
pub fn clean_recognized_text(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    join_nonblank_lines(&s)
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input
        .replace("\r\n", "\n")
        .replace(['\r', '\u{000C}'], "\n")
}

// ── Rule 2: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rules 3–4: Trim lines, drop blanks ───────────────────────────────────────

fn join_nonblank_lines(input: &str) -> String {
    input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
