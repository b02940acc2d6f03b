//! Text validity classifier.
//!
//! Recognition noise on blank or graphic-only pages comes out either
//! near-empty or as symbol soup. Two composition ratios reject both without a
//! dictionary. The thresholds are fixed; changing them changes which pages
//! produce artifacts.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Shortest cleaned text that can be valid.
pub const MIN_CLEAN_CHARS: usize = 20;
/// Largest tolerated share of symbols.
pub const MAX_SYMBOL_RATIO: f64 = 0.5;
/// Smallest required share of letters.
pub const MIN_LETTER_RATIO: f64 = 0.4;

/// Accented letters of the recognition locale kept by the cleaner.
const ACCENTED: &str = "áéíóúÁÉÍÓÚñÑüÜ";

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Composition metrics of one page's text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextQuality {
    /// Characters left after cleaning.
    pub clean_chars: usize,
    pub letters: usize,
    pub digits: usize,
    pub symbols: usize,
    pub letter_ratio: f64,
    pub symbol_ratio: f64,
    pub valid: bool,
}

fn is_allowed(c: char) -> bool {
    matches!(c, ' '..='~' | '\t' | '\n' | '\r' | '\u{0B}' | '\u{0C}') || ACCENTED.contains(c)
}

fn is_letter(c: char) -> bool {
    c.is_ascii_alphabetic() || ACCENTED.contains(c)
}

/// Drop characters outside the allowed set, collapse whitespace runs to a
/// single space and trim.
pub fn clean_text(text: &str) -> String {
    let kept: String = text.chars().filter(|&c| is_allowed(c)).collect();
    RE_WHITESPACE.replace_all(&kept, " ").trim().to_string()
}

/// Measure `text` and decide whether it is usable.
pub fn assess(text: &str) -> TextQuality {
    let cleaned = clean_text(text);
    let total = cleaned.chars().count();

    let mut letters = 0;
    let mut digits = 0;
    let mut symbols = 0;
    for c in cleaned.chars() {
        if is_letter(c) {
            letters += 1;
        } else if c.is_ascii_digit() {
            digits += 1;
        } else if !c.is_whitespace() {
            symbols += 1;
        }
    }

    let (letter_ratio, symbol_ratio) = if total == 0 {
        (0.0, 0.0)
    } else {
        (letters as f64 / total as f64, symbols as f64 / total as f64)
    };

    let valid = total >= MIN_CLEAN_CHARS
        && total > 0
        && symbol_ratio <= MAX_SYMBOL_RATIO
        && letter_ratio >= MIN_LETTER_RATIO;

    TextQuality {
        clean_chars: total,
        letters,
        digits,
        symbols,
        letter_ratio,
        symbol_ratio,
        valid,
    }
}

/// Shorthand for `assess(text).valid`.
pub fn is_valid_text(text: &str) -> bool {
    assess(text).valid
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invoice_sentence_is_valid() {
        let q = assess("Factura numero 00123 emitida el dia 5 de enero de 2024 por un total de 450 euros");
        assert_eq!(q.clean_chars, 80);
        assert_eq!(q.letters, 51);
        assert_eq!(q.digits, 13);
        assert_eq!(q.symbols, 0);
        assert!(q.valid);
    }

    #[test]
    fn symbol_soup_is_invalid() {
        let q = assess("## $$ %% && ** ++ == >< <> [] {} |||");
        assert_eq!(q.clean_chars, 36);
        assert_eq!(q.symbols, 25);
        assert!(q.symbol_ratio > MAX_SYMBOL_RATIO);
        assert!(!q.valid);
    }

    #[test]
    fn short_text_is_invalid_regardless_of_composition() {
        assert!(!is_valid_text("ab"));
        assert!(!is_valid_text("abcdefghijklmnopqrs"));
        assert!(is_valid_text("abcdefghijklmnopqrst"));
    }

    #[test]
    fn empty_and_whitespace_are_invalid() {
        let q = assess("");
        assert_eq!(q.clean_chars, 0);
        assert_eq!(q.letter_ratio, 0.0);
        assert!(!q.valid);
        assert!(!is_valid_text(" \n\t \u{0C} "));
    }

    #[test]
    fn digit_heavy_text_fails_letter_ratio() {
        // 28 digits, 6 letters, 6 spaces: no symbols, letter ratio 0.15.
        let q = assess("123456 7890 123456 7890 12345678 abc def");
        assert_eq!(q.symbols, 0);
        assert!(q.letter_ratio < MIN_LETTER_RATIO);
        assert!(!q.valid);
    }

    #[test]
    fn accented_letters_count_as_letters() {
        let q = assess("ñÑáéíóú ÁÉÍÓÚ üÜ año señor");
        assert_eq!(q.symbols, 0);
        assert_eq!(q.letters, q.clean_chars - 4);
        assert!(q.valid);
    }

    #[test]
    fn disallowed_characters_are_stripped() {
        assert_eq!(clean_text("pagó 120,50 € en   el\n\naño"), "pagó 120,50 en el año");
        assert_eq!(clean_text("日本語 texto"), "texto");
    }

    #[test]
    fn ratio_boundaries_are_inclusive() {
        // 10 letters, 10 symbols, 0 spaces: symbol ratio exactly 0.5, letter ratio exactly 0.5.
        let q = assess("abcdefghij!!!!!!!!!!");
        assert_eq!(q.clean_chars, 20);
        assert_eq!(q.symbol_ratio, 0.5);
        assert!(q.valid);

        // 8 letters, 12 symbols: letter ratio 0.4 but symbol ratio 0.6.
        let q = assess("abcdefgh!!!!!!!!!!!!");
        assert!(!q.valid);

        // 8 letters, 10 symbols, 2 digits: letter ratio exactly 0.4.
        let q = assess("abcdefgh!!!!!!!!!!12");
        assert_eq!(q.letter_ratio, 0.4);
        assert!(q.valid);
    }
}
