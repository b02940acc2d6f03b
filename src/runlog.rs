//! Operator-facing run log.
//!
//! A [`RunLog`] is created once per batch and handed to every component
//! that reports progress to the operator. Each line is appended to the sink
//! and mirrored as a `tracing` event, so `RUST_LOG` output and the log file
//! tell the same story. The web front end serves [`RunLog::content`] as-is.
//!
//! ```text
//! [2024-01-05 10:00:00] INFO: Log initialized.
//! [2024-01-05 10:00:03] ERROR: factura.pdf: Page 2: no text recognised
//! [2024-01-05 10:00:07] BENCHMARK: total 7.12s | files processed: 1
//! ```

use chrono::{DateTime, Local};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{error, info};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

enum Sink {
    File(PathBuf),
    Memory(String),
}

/// Cloneable handle to the run-log sink. Appends are serialised by a mutex.
#[derive(Clone)]
pub struct RunLog {
    sink: Arc<Mutex<Sink>>,
}

impl std::fmt::Debug for RunLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sink = self.sink.lock().unwrap_or_else(|e| e.into_inner());
        match &*sink {
            Sink::File(p) => f.debug_tuple("RunLog::File").field(p).finish(),
            Sink::Memory(_) => f.write_str("RunLog::Memory"),
        }
    }
}

impl RunLog {
    /// Open a file-backed log, truncating any previous run.
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        File::create(&path)?;
        let log = Self {
            sink: Arc::new(Mutex::new(Sink::File(path))),
        };
        log.info("Log initialized.");
        Ok(log)
    }

    /// In-memory log, used by tests and by callers embedding the library.
    pub fn memory() -> Self {
        Self {
            sink: Arc::new(Mutex::new(Sink::Memory(String::new()))),
        }
    }

    /// Path of the backing file, if any.
    pub fn path(&self) -> Option<PathBuf> {
        let sink = self.sink.lock().unwrap_or_else(|e| e.into_inner());
        match &*sink {
            Sink::File(p) => Some(p.clone()),
            Sink::Memory(_) => None,
        }
    }

    pub fn info(&self, msg: impl AsRef<str>) {
        let msg = msg.as_ref();
        info!(target: "scan_ocr::runlog", "{msg}");
        self.append("INFO", msg);
    }

    pub fn error(&self, msg: impl AsRef<str>) {
        let msg = msg.as_ref();
        error!(target: "scan_ocr::runlog", "{msg}");
        self.append("ERROR", msg);
    }

    /// Record the wall time of a batch and how many files it covered.
    pub fn benchmark(&self, start: DateTime<Local>, end: DateTime<Local>, files: usize) {
        let secs = (end - start).num_milliseconds() as f64 / 1000.0;
        let msg = format!("total {secs:.2}s | files processed: {files}");
        info!(target: "scan_ocr::runlog", "benchmark: {msg}");
        self.append("BENCHMARK", &msg);
    }

    /// Full log text. A file-backed log that has gone missing yields
    /// `"Log not found."`.
    pub fn content(&self) -> String {
        let sink = self.sink.lock().unwrap_or_else(|e| e.into_inner());
        match &*sink {
            Sink::File(p) => fs::read_to_string(p).unwrap_or_else(|_| "Log not found.".to_string()),
            Sink::Memory(buf) => buf.clone(),
        }
    }

    fn append(&self, level: &str, msg: &str) {
        let line = format!("[{}] {level}: {msg}\n", Local::now().format(TIMESTAMP_FORMAT));
        let mut sink = self.sink.lock().unwrap_or_else(|e| e.into_inner());
        match &mut *sink {
            Sink::File(p) => {
                let written = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&*p)
                    .and_then(|mut f| f.write_all(line.as_bytes()));
                if let Err(e) = written {
                    tracing::warn!("run log {} not writable: {e}", p.display());
                }
            }
            Sink::Memory(buf) => buf.push_str(&line),
        }
    }
}
