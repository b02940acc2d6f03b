//! Text recognition: the recognizer seam, Tesseract adapters and the
//! instance pool.
//!
//! Recognizers are stateful and not assumed thread-safe, so every worker
//! checks one out of a [`RecognizerPool`], uses it for one page and hands it
//! back. The pool grows on demand up to the number of concurrent workers.
//!
//! Two Tesseract adapters are provided:
//!
//! * [`TesseractCommand`] (default) runs the `tesseract` executable on a
//!   temporary PNG. No native library is linked, and a hung process can be
//!   killed.
//! * `TesseractApi` (feature `tesseract-api`) calls libtesseract in-process.

use crate::config::PipelineConfig;
use crate::error::RecognizeError;
use crate::pipeline::encode::encode_png;
use crate::pipeline::postprocess::clean_recognized_text;
use crate::pipeline::StepOutcome;
use image::DynamicImage;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Turns one page image into raw text.
pub trait TextRecognizer: Send {
    fn recognize(&mut self, image: &DynamicImage) -> Result<String, RecognizeError>;
}

/// Creates recognizer instances for the pool.
pub trait RecognizerFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn TextRecognizer>, RecognizeError>;
}

impl<F> RecognizerFactory for F
where
    F: Fn() -> Result<Box<dyn TextRecognizer>, RecognizeError> + Send + Sync,
{
    fn create(&self) -> Result<Box<dyn TextRecognizer>, RecognizeError> {
        self()
    }
}

/// Run `recognizer` on `image` and normalise its output.
///
/// A recognizer error degrades to an empty string.
pub fn recognize_page(recognizer: &mut dyn TextRecognizer, image: &DynamicImage) -> StepOutcome<String> {
    match recognizer.recognize(image) {
        Ok(raw) => StepOutcome::Done(clean_recognized_text(&raw)),
        Err(e) => {
            warn!("recognition failed: {e}");
            StepOutcome::degraded(String::new(), e.to_string())
        }
    }
}

// ── Pool ─────────────────────────────────────────────────────────────────────

/// Checkout/checkin pool of recognizer instances.
pub struct RecognizerPool {
    factory: Arc<dyn RecognizerFactory>,
    idle: Mutex<Vec<Box<dyn TextRecognizer>>>,
}

impl std::fmt::Debug for RecognizerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecognizerPool")
            .field("idle", &self.idle_count())
            .finish()
    }
}

impl RecognizerPool {
    pub fn new(factory: impl RecognizerFactory + 'static) -> Self {
        Self {
            factory: Arc::new(factory),
            idle: Mutex::new(Vec::new()),
        }
    }

    /// Pool of Tesseract recognizers configured from `config`.
    pub fn from_config(config: &PipelineConfig) -> Self {
        #[cfg(feature = "tesseract-api")]
        {
            let language = config.language.clone();
            let tessdata = config.tessdata_dir.clone();
            Self::new(move || -> Result<Box<dyn TextRecognizer>, RecognizeError> {
                Ok(Box::new(TesseractApi::new(language.clone(), tessdata.clone())))
            })
        }
        #[cfg(not(feature = "tesseract-api"))]
        {
            let template = TesseractCommand::from_config(config);
            Self::new(move || -> Result<Box<dyn TextRecognizer>, RecognizeError> {
                Ok(Box::new(template.clone()))
            })
        }
    }

    /// Take an idle recognizer, or create one.
    pub fn checkout(&self) -> Result<Box<dyn TextRecognizer>, RecognizeError> {
        let reused = self.idle.lock().unwrap_or_else(|e| e.into_inner()).pop();
        match reused {
            Some(r) => Ok(r),
            None => {
                debug!("creating recognizer instance");
                self.factory.create()
            }
        }
    }

    /// Return a recognizer after a page completed normally.
    pub fn checkin(&self, recognizer: Box<dyn TextRecognizer>) {
        self.idle.lock().unwrap_or_else(|e| e.into_inner()).push(recognizer);
    }

    pub fn idle_count(&self) -> usize {
        self.idle.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

// ── Tesseract executable ─────────────────────────────────────────────────────

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Runs `tesseract <png> <outbase> -l <lang>` per page.
#[derive(Debug, Clone)]
pub struct TesseractCommand {
    pub cmd: PathBuf,
    pub language: String,
    pub tessdata_dir: Option<PathBuf>,
    /// Kill the process when it runs longer than this.
    pub deadline: Option<Duration>,
}

impl TesseractCommand {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            cmd: config.tesseract_cmd.clone(),
            language: config.language.clone(),
            tessdata_dir: config.tessdata_dir.clone(),
            deadline: config.page_timeout(),
        }
    }
}

impl TextRecognizer for TesseractCommand {
    fn recognize(&mut self, image: &DynamicImage) -> Result<String, RecognizeError> {
        let work = tempfile::tempdir()?;
        let png = work.path().join("page.png");
        let outbase = work.path().join("page");
        std::fs::write(&png, encode_png(image)?)?;

        let mut command = Command::new(&self.cmd);
        command
            .arg(&png)
            .arg(&outbase)
            .arg("-l")
            .arg(&self.language);
        if let Some(dir) = &self.tessdata_dir {
            command.arg("--tessdata-dir").arg(dir);
        }

        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| RecognizeError::Spawn {
                cmd: self.cmd.clone(),
                source,
            })?;

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if let Some(deadline) = self.deadline {
                if started.elapsed() > deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(RecognizeError::Killed {
                        secs: deadline.as_secs(),
                    });
                }
            }
            std::thread::sleep(POLL_INTERVAL);
        };

        if !status.success() {
            return Err(RecognizeError::Exit {
                status: status.to_string(),
            });
        }

        let text = std::fs::read_to_string(outbase.with_extension("txt"))?;
        debug!("tesseract returned {} bytes in {:?}", text.len(), started.elapsed());
        Ok(text)
    }
}

// ── libtesseract ─────────────────────────────────────────────────────────────

/// In-process recognizer over libtesseract.
///
/// A fresh engine is created per page; the handle is not `Send` and
/// cannot live in the pool.
#[cfg(feature = "tesseract-api")]
#[derive(Debug, Clone)]
pub struct TesseractApi {
    pub language: String,
    pub tessdata_dir: Option<PathBuf>,
}

#[cfg(feature = "tesseract-api")]
impl TesseractApi {
    pub fn new(language: impl Into<String>, tessdata_dir: Option<PathBuf>) -> Self {
        Self {
            language: language.into(),
            tessdata_dir,
        }
    }
}

#[cfg(feature = "tesseract-api")]
impl TextRecognizer for TesseractApi {
    fn recognize(&mut self, image: &DynamicImage) -> Result<String, RecognizeError> {
        use std::io::Write;

        let mut tmp = tempfile::Builder::new().suffix(".png").tempfile()?;
        tmp.write_all(&encode_png(image)?)?;
        tmp.flush()?;
        let path = tmp
            .path()
            .to_str()
            .ok_or_else(|| RecognizeError::Engine("temp path is not UTF-8".into()))?;

        let datapath = self
            .tessdata_dir
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned());

        tesseract::Tesseract::new(datapath.as_deref(), Some(self.language.as_str()))
            .map_err(|e| RecognizeError::Engine(format!("init: {e}")))?
            .set_image(path)
            .map_err(|e| RecognizeError::Engine(format!("image: {e}")))?
            .recognize()
            .map_err(|e| RecognizeError::Engine(format!("recognize: {e}")))?
            .get_text()
            .map_err(|e| RecognizeError::Engine(format!("text: {e}")))
    }
}
