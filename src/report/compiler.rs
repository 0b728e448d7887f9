use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::perception::types::{DetectedElements, Dimensions, Point, TextFragment};
use crate::report::statistics::{self, ReportStatistics};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    TextClick,
    ButtonClick,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionPoint {
    pub kind: InteractionKind,
    pub description: String,
    pub center: Point,
}

/// One analysis cycle's view of the screen. Built once by [`compile`] and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub timestamp: DateTime<Utc>,
    pub screen_dimensions: Dimensions,
    pub image_dimensions: Dimensions,
    pub text_fragments: Vec<TextFragment>,
    pub elements: DetectedElements,
    pub interaction_points: Vec<InteractionPoint>,
    pub statistics: ReportStatistics,
    pub summary_text: String,
    /// Why parts of the analysis came back empty, if they did.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degraded: Vec<String>,
}

/// Raw stage outputs, in image pixel space.
#[derive(Debug, Clone)]
pub struct ReportInput {
    pub fragments: Vec<TextFragment>,
    pub elements: DetectedElements,
    pub image_dimensions: Dimensions,
    /// Logical screen size; `None` means "same as the image".
    pub screen_dimensions: Option<Dimensions>,
    pub degraded: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Merge recognizer and detector output into a report.
///
/// When the screen is smaller than the captured image (HiDPI), every box is
/// rescaled into screen pixels first so report coordinates are clickable as-is.
/// Interaction points whose centre falls outside the screen are dropped.
pub fn compile(input: ReportInput) -> AnalysisReport {
    let ReportInput {
        mut fragments,
        mut elements,
        image_dimensions,
        screen_dimensions,
        degraded,
        timestamp,
    } = input;

    let screen = screen_dimensions
        .filter(|d| !d.is_empty())
        .unwrap_or(image_dimensions);

    if screen != image_dimensions && !image_dimensions.is_empty() {
        let sx = screen.width as f64 / image_dimensions.width as f64;
        let sy = screen.height as f64 / image_dimensions.height as f64;
        tracing::debug!(sx, sy, "rescaling report coordinates to screen space");
        for f in &mut fragments {
            f.bbox = f.bbox.scaled(sx, sy);
        }
        for c in elements
            .buttons
            .iter_mut()
            .chain(elements.windows.iter_mut())
            .chain(elements.icons.iter_mut())
        {
            c.bbox = c.bbox.scaled(sx, sy);
        }
    }

    let interaction_points = interaction_points(&fragments, &elements, screen);
    let statistics = statistics::compute(&fragments, &elements, interaction_points.len());
    let summary_text = summarize(screen, &statistics);

    tracing::info!(
        text = fragments.len(),
        buttons = elements.buttons.len(),
        windows = elements.windows.len(),
        points = interaction_points.len(),
        "report compiled"
    );

    AnalysisReport {
        timestamp,
        screen_dimensions: screen,
        image_dimensions,
        text_fragments: fragments,
        elements,
        interaction_points,
        statistics,
        summary_text,
        degraded,
    }
}

fn interaction_points(
    fragments: &[TextFragment],
    elements: &DetectedElements,
    screen: Dimensions,
) -> Vec<InteractionPoint> {
    let text_points = fragments.iter().map(|f| InteractionPoint {
        kind: InteractionKind::TextClick,
        description: format!("Click text: '{}'", f.text),
        center: f.bbox.center(),
    });
    let button_points = elements.buttons.iter().map(|b| InteractionPoint {
        kind: InteractionKind::ButtonClick,
        description: "Click button".to_string(),
        center: b.bbox.center(),
    });

    text_points
        .chain(button_points)
        .filter(|p| {
            let inside = screen.contains(p.center.x, p.center.y);
            if !inside {
                tracing::debug!(x = p.center.x, y = p.center.y, "dropping off-screen interaction point");
            }
            inside
        })
        .collect()
}

fn summarize(screen: Dimensions, stats: &ReportStatistics) -> String {
    format!(
        "Screen resolution: {}x{}. Detected elements: {} text blocks, {} buttons, {} windows. \
         Found {} potential interaction points.",
        screen.width,
        screen.height,
        stats.object_counts.text,
        stats.object_counts.buttons,
        stats.object_counts.windows,
        stats.interaction_points,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::types::{BoundingBox, ElementCandidate, ElementKind};

    fn frag(text: &str, x: i32, y: i32) -> TextFragment {
        TextFragment {
            text: text.into(),
            bbox: BoundingBox::new(x, y, 20, 10),
            confidence: 90,
        }
    }

    fn input(fragments: Vec<TextFragment>, elements: DetectedElements) -> ReportInput {
        ReportInput {
            fragments,
            elements,
            image_dimensions: Dimensions::new(1920, 1080),
            screen_dimensions: None,
            degraded: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn points_cover_text_then_buttons() {
        let mut elements = DetectedElements::default();
        elements.push(ElementCandidate {
            kind: ElementKind::Button,
            bbox: BoundingBox::new(100, 100, 40, 20),
        });
        elements.push(ElementCandidate {
            kind: ElementKind::Window,
            bbox: BoundingBox::new(0, 0, 800, 600),
        });
        let report = compile(input(vec![frag("File", 10, 5)], elements));

        assert_eq!(report.interaction_points.len(), 2);
        assert_eq!(report.interaction_points[0].kind, InteractionKind::TextClick);
        assert_eq!(report.interaction_points[0].center, Point { x: 20, y: 10 });
        assert_eq!(report.interaction_points[0].description, "Click text: 'File'");
        assert_eq!(report.interaction_points[1].kind, InteractionKind::ButtonClick);
        assert_eq!(report.interaction_points[1].center, Point { x: 120, y: 110 });
        assert_eq!(report.statistics.object_counts.windows, 1);
    }

    #[test]
    fn every_point_lies_on_screen() {
        let report = compile(input(
            vec![frag("inside", 10, 10), frag("outside", 1915, 1078), frag("neg", -40, 3)],
            DetectedElements::default(),
        ));
        assert_eq!(report.interaction_points.len(), 1);
        for p in &report.interaction_points {
            assert!(report.screen_dimensions.contains(p.center.x, p.center.y));
        }
    }

    #[test]
    fn hidpi_capture_is_rescaled() {
        let mut inp = input(vec![frag("File", 200, 100)], DetectedElements::default());
        inp.image_dimensions = Dimensions::new(3840, 2160);
        inp.screen_dimensions = Some(Dimensions::new(1920, 1080));
        let report = compile(inp);
        assert_eq!(report.text_fragments[0].bbox, BoundingBox::new(100, 50, 10, 5));
        assert_eq!(report.interaction_points[0].center, Point { x: 105, y: 52 });
        assert_eq!(report.screen_dimensions, Dimensions::new(1920, 1080));
    }

    #[test]
    fn summary_mentions_counts() {
        let report = compile(input(vec![frag("File", 10, 5)], DetectedElements::default()));
        assert_eq!(
            report.summary_text,
            "Screen resolution: 1920x1080. Detected elements: 1 text blocks, 0 buttons, 0 windows. \
             Found 1 potential interaction points."
        );
    }

    #[test]
    fn degraded_notes_survive_and_serialize() {
        let mut inp = input(Vec::new(), DetectedElements::default());
        inp.degraded.push("ocr unavailable: missing".into());
        let report = compile(inp);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["degraded"][0], "ocr unavailable: missing");
        assert_eq!(json["elements"]["icons"], serde_json::json!([]));
        let back: AnalysisReport = serde_json::from_value(json).unwrap();
        assert_eq!(back, report);
    }
}
