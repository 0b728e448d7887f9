use std::io::Write as _;
use std::process::Command;

use image::RgbImage;

use crate::capability::Capability;
use crate::config::AnalysisConfig;
use crate::errors::{DeskPilotError, DeskPilotResult};
use crate::perception::traits::{OcrEngine, RawToken};
use crate::perception::types::{BoundingBox, TextFragment};

/// Fragments plus a note when the recognizer could not do its job.
#[derive(Debug, Default)]
pub struct Recognition {
    pub fragments: Vec<TextFragment>,
    pub degraded: Option<String>,
}

pub struct TextRecognizer {
    engine: Capability<Box<dyn OcrEngine>>,
    threshold: u8,
}

impl TextRecognizer {
    pub fn new(engine: Capability<Box<dyn OcrEngine>>, threshold: u8) -> Self {
        if let Some(reason) = engine.unavailable_reason() {
            tracing::warn!(reason, "OCR unavailable, reports will carry no text");
        }
        Self { engine, threshold }
    }

    /// Build with the Tesseract CLI backend, probing it once.
    pub fn from_config(cfg: &AnalysisConfig) -> Self {
        let engine = TesseractCli::probe(cfg).map(|t| Box::new(t) as Box<dyn OcrEngine>);
        Self::new(engine.into(), cfg.ocr_confidence_threshold)
    }

    pub fn recognize(&self, image: &RgbImage) -> Recognition {
        let engine = match &self.engine {
            Capability::Available(engine) => engine,
            Capability::Unavailable { reason } => {
                return Recognition {
                    fragments: Vec::new(),
                    degraded: Some(format!("ocr unavailable: {reason}")),
                }
            }
        };

        match engine.recognize(image) {
            Ok(tokens) => {
                let total = tokens.len();
                let fragments = filter_tokens(tokens, self.threshold);
                tracing::info!(
                    engine = engine.name(),
                    tokens = total,
                    kept = fragments.len(),
                    threshold = self.threshold,
                    "text recognized"
                );
                Recognition {
                    fragments,
                    degraded: None,
                }
            }
            Err(e) => {
                tracing::warn!(engine = engine.name(), error = %e, "OCR failed, continuing without text");
                Recognition {
                    fragments: Vec::new(),
                    degraded: Some(format!("ocr failed: {e}")),
                }
            }
        }
    }
}

/// Keep tokens with non-empty trimmed text and `confidence > threshold`.
/// Backend confidences are truncated to integers first.
pub fn filter_tokens(tokens: Vec<RawToken>, threshold: u8) -> Vec<TextFragment> {
    tokens
        .into_iter()
        .filter_map(|t| {
            let text = t.text.trim();
            if text.is_empty() || !t.confidence.is_finite() || t.confidence < 0.0 {
                return None;
            }
            let confidence = t.confidence.trunc().min(100.0) as u8;
            (confidence > threshold).then(|| TextFragment {
                text: text.to_string(),
                bbox: t.bbox,
                confidence,
            })
        })
        .collect()
}

/// Tesseract invoked as a subprocess with TSV output.
pub struct TesseractCli {
    cmd: String,
    lang: String,
    oem: u8,
    psm: u8,
}

impl TesseractCli {
    pub fn new(cfg: &AnalysisConfig) -> Self {
        Self {
            cmd: cfg.tesseract_cmd.clone(),
            lang: cfg.tesseract_lang.clone(),
            oem: cfg.tesseract_oem,
            psm: cfg.tesseract_psm,
        }
    }

    /// Check the binary runs before handing out an engine.
    pub fn probe(cfg: &AnalysisConfig) -> DeskPilotResult<Self> {
        let output = Command::new(&cfg.tesseract_cmd)
            .arg("--version")
            .output()
            .map_err(|e| DeskPilotError::Recognition(format!("{}: {e}", cfg.tesseract_cmd)))?;
        if !output.status.success() {
            return Err(DeskPilotError::Recognition(format!(
                "{} --version exited with {}",
                cfg.tesseract_cmd, output.status
            )));
        }
        tracing::info!(cmd = %cfg.tesseract_cmd, lang = %cfg.tesseract_lang, "tesseract available");
        Ok(Self::new(cfg))
    }
}

impl OcrEngine for TesseractCli {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognize(&self, image: &RgbImage) -> DeskPilotResult<Vec<RawToken>> {
        let mut tmp = tempfile::Builder::new()
            .prefix("deskpilot_ocr_")
            .suffix(".png")
            .tempfile()?;
        image
            .write_to(&mut tmp, image::ImageFormat::Png)
            .map_err(|e| DeskPilotError::Recognition(format!("write temp image: {e}")))?;
        tmp.flush()?;

        let output = Command::new(&self.cmd)
            .arg(tmp.path())
            .arg("stdout")
            .args(["-l", &self.lang])
            .args(["--oem", &self.oem.to_string()])
            .args(["--psm", &self.psm.to_string()])
            .arg("tsv")
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DeskPilotError::Recognition(stderr.trim().to_string()));
        }

        Ok(parse_tsv(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Parse Tesseract TSV output. Columns:
/// `level page_num block_num par_num line_num word_num left top width height conf text`.
/// Malformed rows are skipped.
pub fn parse_tsv(tsv: &str) -> Vec<RawToken> {
    tsv.lines()
        .filter(|line| !line.starts_with("level"))
        .filter_map(|line| {
            let cols: Vec<&str> = line.split('\t').collect();
            if cols.len() < 11 {
                return None;
            }
            let num = |i: usize| cols[i].trim().parse::<i64>().ok();
            let (left, top, width, height) = (num(6)?, num(7)?, num(8)?, num(9)?);
            let confidence = cols[10].trim().parse::<f32>().ok()?;
            Some(RawToken {
                text: cols.get(11).map(|s| s.to_string()).unwrap_or_default(),
                bbox: BoundingBox::new(
                    left as i32,
                    top as i32,
                    width.max(0) as u32,
                    height.max(0) as u32,
                ),
                confidence,
            })
        })
        .collect()
}
