use chrono::Utc;
use image::DynamicImage;

use crate::capability::Capability;
use crate::config::AnalysisConfig;
use crate::errors::DeskPilotResult;
use crate::perception::detector::ElementDetector;
use crate::perception::ocr::TextRecognizer;
use crate::perception::preprocess;
use crate::perception::screenshot::Screenshot;
use crate::perception::types::{DetectedElements, Dimensions};
use crate::report::{self, AnalysisReport, ReportInput};

pub struct ScreenAnalyzer {
    recognizer: TextRecognizer,
    detector: Capability<ElementDetector>,
}

impl ScreenAnalyzer {
    pub fn new(recognizer: TextRecognizer, detector: Capability<ElementDetector>) -> Self {
        Self {
            recognizer,
            detector,
        }
    }

    pub fn from_config(cfg: &AnalysisConfig) -> Self {
        let detector = if cfg.detect_elements {
            Capability::Available(ElementDetector::new())
        } else {
            Capability::unavailable("element detection disabled in config")
        };
        Self::new(TextRecognizer::from_config(cfg), detector)
    }

    /// Analyse a captured frame. Stage failures are recorded in the report's
    /// `degraded` notes; this never fails once the image is decoded.
    pub fn analyze(&self, shot: &Screenshot) -> AnalysisReport {
        self.analyze_image(&shot.image, shot.screen_dimensions)
    }

    /// Decode encoded bytes first; a decode failure is fatal for the cycle.
    pub fn analyze_bytes(
        &self,
        bytes: &[u8],
        screen: Option<Dimensions>,
    ) -> DeskPilotResult<AnalysisReport> {
        let image = preprocess::decode(bytes)?;
        Ok(self.analyze_image(&image, screen))
    }

    fn analyze_image(&self, image: &DynamicImage, screen: Option<Dimensions>) -> AnalysisReport {
        let started = std::time::Instant::now();
        let enhanced = preprocess::enhance(image);
        let mut degraded = Vec::new();

        let recognition = self.recognizer.recognize(&enhanced);
        degraded.extend(recognition.degraded);

        let elements = match &self.detector {
            Capability::Available(detector) => {
                detector.detect(&image::imageops::grayscale(&enhanced))
            }
            Capability::Unavailable { reason } => {
                degraded.push(format!("detection unavailable: {reason}"));
                DetectedElements::default()
            }
        };

        let report = report::compile(ReportInput {
            fragments: recognition.fragments,
            elements,
            image_dimensions: Dimensions::new(enhanced.width(), enhanced.height()),
            screen_dimensions: screen,
            degraded,
            timestamp: Utc::now(),
        });
        tracing::info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            degraded = report.degraded.len(),
            "screen analysed"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DeskPilotError;
    use crate::perception::traits::{OcrEngine, RawToken};
    use crate::perception::types::BoundingBox;
    use image::{Luma, RgbImage};

    struct Canned;

    impl OcrEngine for Canned {
        fn name(&self) -> &str {
            "canned"
        }

        fn recognize(&self, _image: &RgbImage) -> DeskPilotResult<Vec<RawToken>> {
            Ok(vec![
                RawToken {
                    text: "Submit".into(),
                    bbox: BoundingBox::new(40, 30, 50, 20),
                    confidence: 91.2,
                },
                RawToken {
                    text: "noise".into(),
                    bbox: BoundingBox::new(0, 0, 4, 4),
                    confidence: 12.0,
                },
            ])
        }
    }

    fn analyzer(detect: bool) -> ScreenAnalyzer {
        let engine: Box<dyn OcrEngine> = Box::new(Canned);
        let detector = if detect {
            Capability::Available(ElementDetector::new())
        } else {
            Capability::unavailable("off")
        };
        ScreenAnalyzer::new(TextRecognizer::new(Capability::Available(engine), 30), detector)
    }

    fn panel() -> DynamicImage {
        let gray = image::GrayImage::from_fn(400, 300, |x, y| {
            if (50..350).contains(&x) && (40..240).contains(&y) {
                Luma([230])
            } else {
                Luma([20])
            }
        });
        DynamicImage::ImageLuma8(gray)
    }

    #[test]
    fn analysis_merges_text_and_elements() {
        let shot = Screenshot {
            image: panel(),
            screen_dimensions: None,
        };
        let report = analyzer(true).analyze(&shot);
        assert_eq!(report.image_dimensions, Dimensions::new(400, 300));
        assert_eq!(report.screen_dimensions, Dimensions::new(400, 300));
        assert_eq!(report.text_fragments.len(), 1);
        assert_eq!(report.text_fragments[0].confidence, 91);
        assert!(!report.elements.windows.is_empty());
        assert!(report.degraded.is_empty());
    }

    #[test]
    fn disabled_detection_is_noted() {
        let shot = Screenshot {
            image: panel(),
            screen_dimensions: None,
        };
        let report = analyzer(false).analyze(&shot);
        assert_eq!(report.elements, DetectedElements::default());
        assert_eq!(report.degraded.len(), 1);
        assert!(report.degraded[0].starts_with("detection unavailable"));
        assert_eq!(report.interaction_points.len(), 1);
    }

    #[test]
    fn undecodable_bytes_abort() {
        let err = analyzer(true).analyze_bytes(b"not an image", None).unwrap_err();
        assert!(matches!(err, DeskPilotError::ImageLoad(_)));
    }
}
