//! Document Info metadata for generated PDFs.
//!
//! Every `.pdf` in a document's output folder whose name contains
//! `_pagina_` gets Title, Author, Producer, Subject and a CustomID. A JSON
//! file can override the values per file name.

use super::{build_failed, save_document};
use crate::error::OcrError;
use lopdf::{Dictionary, Document, Object, StringFormat};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// Info dictionary values.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfMetadata {
    pub title: String,
    pub author: String,
    pub producer: String,
    pub subject: String,
    pub custom_id: String,
}

impl PdfMetadata {
    /// Metadata for artifacts derived from `source_name`, stamped with the
    /// current unix time.
    pub fn for_source(source_name: &str, author: &str, producer: &str) -> Self {
        Self {
            title: source_name.to_string(),
            author: author.to_string(),
            producer: producer.to_string(),
            subject: String::new(),
            custom_id: chrono::Utc::now().timestamp().to_string(),
        }
    }

    /// Apply per-file overrides on top of these values.
    pub fn with_overrides(mut self, o: &MetadataOverrides) -> Self {
        if let Some(v) = &o.title {
            self.title = v.clone();
        }
        if let Some(v) = &o.author {
            self.author = v.clone();
        }
        if let Some(v) = &o.producer {
            self.producer = v.clone();
        }
        if let Some(v) = &o.subject {
            self.subject = v.clone();
        }
        if let Some(v) = &o.custom_id {
            self.custom_id = v.clone();
        }
        self
    }
}

/// Optional per-file values read from a metadata map.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MetadataOverrides {
    #[serde(rename = "Title")]
    pub title: Option<String>,
    #[serde(rename = "Author")]
    pub author: Option<String>,
    #[serde(rename = "Producer")]
    pub producer: Option<String>,
    #[serde(rename = "Subject")]
    pub subject: Option<String>,
    #[serde(rename = "CustomID")]
    pub custom_id: Option<String>,
}

/// Read a `{ "file.pdf": { "Title": ..., ... } }` JSON map.
pub fn load_metadata_map(path: &Path) -> Result<HashMap<String, MetadataOverrides>, OcrError> {
    let raw = std::fs::read_to_string(path).map_err(|source| OcrError::InputUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|e| {
        OcrError::InvalidConfig(format!("metadata map {}: {e}", path.display()))
    })
}

/// Encode a PDF text string: literal for ASCII, UTF-16BE with BOM otherwise.
pub fn pdf_text_string(value: &str) -> Object {
    if value.is_ascii() {
        Object::String(value.as_bytes().to_vec(), StringFormat::Literal)
    } else {
        let mut bytes = vec![0xFE, 0xFF];
        for unit in value.encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        Object::String(bytes, StringFormat::Hexadecimal)
    }
}

/// Replace the Info dictionary of the PDF at `path` in place.
pub fn write_metadata(path: &Path, meta: &PdfMetadata) -> Result<(), OcrError> {
    let mut doc = Document::load(path).map_err(|e| build_failed(path, e))?;

    let mut info = Dictionary::new();
    info.set("Title", pdf_text_string(&meta.title));
    info.set("Author", pdf_text_string(&meta.author));
    info.set("Producer", pdf_text_string(&meta.producer));
    info.set("Subject", pdf_text_string(&meta.subject));
    info.set("CustomID", pdf_text_string(&meta.custom_id));
    let info_id = doc.add_object(info);
    doc.trailer.set("Info", info_id);

    save_document(&mut doc, path)?;
    debug!("metadata written to {}", path.display());
    Ok(())
}

/// Result of stamping a folder.
#[derive(Debug, Default)]
pub struct MetadataStamp {
    /// Files whose Info dictionary was written.
    pub updated: usize,
    /// File name and error for every file left untouched.
    pub failures: Vec<(String, OcrError)>,
}

/// Write metadata into every `*_pagina_*.pdf` in `dir`. A file that fails
/// is recorded in [`MetadataStamp::failures`] and the rest are still
/// processed.
pub fn apply_metadata_to_dir(
    dir: &Path,
    base: &PdfMetadata,
    overrides: &HashMap<String, MetadataOverrides>,
) -> Result<MetadataStamp, OcrError> {
    let entries = std::fs::read_dir(dir).map_err(|source| OcrError::InputUnreadable {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n.to_lowercase().ends_with(".pdf") && n.contains("_pagina_"))
        .collect();
    names.sort();

    let mut stamp = MetadataStamp::default();
    for name in names {
        let meta = match overrides.get(&name) {
            Some(o) => base.clone().with_overrides(o),
            None => base.clone(),
        };
        match write_metadata(&dir.join(&name), &meta) {
            Ok(()) => stamp.updated += 1,
            Err(e) => {
                warn!("metadata not written to {name}: {e}");
                stamp.failures.push((name, e));
            }
        }
    }
    Ok(stamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::text::write_text_pdf;

    fn info_of(path: &Path) -> Dictionary {
        let doc = Document::load(path).unwrap();
        let id = doc.trailer.get(b"Info").unwrap().as_reference().unwrap();
        doc.get_dictionary(id).unwrap().clone()
    }

    fn string_of(dict: &Dictionary, key: &[u8]) -> Vec<u8> {
        match dict.get(key).unwrap() {
            Object::String(bytes, _) => bytes.clone(),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn ascii_stays_literal_and_accents_become_utf16() {
        assert!(matches!(pdf_text_string("OCR App"), Object::String(ref b, StringFormat::Literal) if b == b"OCR App"));
        let Object::String(bytes, StringFormat::Hexadecimal) = pdf_text_string("Año") else {
            panic!("expected hex string");
        };
        assert_eq!(bytes, vec![0xFE, 0xFF, 0x00, b'A', 0x00, 0xF1, 0x00, b'o']);
    }

    #[test]
    fn info_dictionary_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a_pagina_1.pdf");
        write_text_pdf("hola", &path).unwrap();

        let meta = PdfMetadata {
            title: "a.pdf".into(),
            author: "OCR_App".into(),
            producer: "OCR App".into(),
            subject: String::new(),
            custom_id: "1700000000".into(),
        };
        write_metadata(&path, &meta).unwrap();

        let info = info_of(&path);
        assert_eq!(string_of(&info, b"Title"), b"a.pdf");
        assert_eq!(string_of(&info, b"Producer"), b"OCR App");
        assert_eq!(string_of(&info, b"CustomID"), b"1700000000");
        assert_eq!(string_of(&info, b"Subject"), b"");
    }

    #[test]
    fn only_pagina_pdfs_are_touched() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a_pagina_1.pdf", "a_pagina_1_texto.pdf", "a_searchable.pdf"] {
            write_text_pdf("hola", &dir.path().join(name)).unwrap();
        }
        std::fs::write(dir.path().join("a_pagina_1.txt"), "hola").unwrap();

        let mut overrides = HashMap::new();
        overrides.insert(
            "a_pagina_1.pdf".to_string(),
            MetadataOverrides {
                title: Some("Factura enero".into()),
                ..Default::default()
            },
        );
        let base = PdfMetadata::for_source("a.pdf", "OCR_App", "OCR App");
        let stamp = apply_metadata_to_dir(dir.path(), &base, &overrides).unwrap();
        assert_eq!(stamp.updated, 2);
        assert!(stamp.failures.is_empty());

        assert_eq!(string_of(&info_of(&dir.path().join("a_pagina_1.pdf")), b"Title"), b"Factura enero");
        assert_eq!(string_of(&info_of(&dir.path().join("a_pagina_1_texto.pdf")), b"Title"), b"a.pdf");
        let untouched = Document::load(dir.path().join("a_searchable.pdf")).unwrap();
        assert!(untouched.trailer.get(b"Info").is_err());
    }

    #[test]
    fn unreadable_pagina_pdf_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        write_text_pdf("hola", &dir.path().join("a_pagina_1.pdf")).unwrap();
        std::fs::write(dir.path().join("a_pagina_2.pdf"), b"not a pdf").unwrap();

        let base = PdfMetadata::for_source("a.pdf", "OCR_App", "OCR App");
        let stamp = apply_metadata_to_dir(dir.path(), &base, &HashMap::new()).unwrap();

        assert_eq!(stamp.updated, 1);
        assert_eq!(stamp.failures.len(), 1);
        assert_eq!(stamp.failures[0].0, "a_pagina_2.pdf");
    }

    #[test]
    fn metadata_map_parses_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.json");
        std::fs::write(&path, r#"{"a_pagina_1.pdf": {"Title": "Uno", "CustomID": "X-1"}}"#).unwrap();
        let map = load_metadata_map(&path).unwrap();
        let o = &map["a_pagina_1.pdf"];
        assert_eq!(o.title.as_deref(), Some("Uno"));
        assert_eq!(o.custom_id.as_deref(), Some("X-1"));
        assert_eq!(o.author, None);
    }

    #[test]
    fn custom_id_is_a_unix_timestamp() {
        let meta = PdfMetadata::for_source("x.pdf", "A", "P");
        let ts: i64 = meta.custom_id.parse().unwrap();
        assert!(ts > 1_600_000_000);
    }
}
