use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::point::Point;

use crate::perception::types::{BoundingBox, DetectedElements, ElementCandidate, ElementKind};

/// σ that a 5×5 kernel gets when sigma is derived from the kernel size.
pub const BLUR_SIGMA: f32 = 1.1;
pub const CANNY_LOW: f32 = 50.0;
pub const CANNY_HIGH: f32 = 150.0;
/// Polygon approximation tolerance as a fraction of the perimeter.
pub const APPROX_EPSILON: f64 = 0.04;

/// Button: `20 < w < 100` and `10 < h < 50`. Window: `w > 100` and `h > 100`.
/// The ranges cannot overlap (a button is at most 99 wide, a window at least 101).
pub fn classify(width: u32, height: u32) -> Option<ElementKind> {
    if width > 20 && width < 100 && height > 10 && height < 50 {
        Some(ElementKind::Button)
    } else if width > 100 && height > 100 {
        Some(ElementKind::Window)
    } else {
        None
    }
}

/// Inclusive pixel extents, so a single point is 1×1.
fn bounding_rect(points: &[Point<i32>]) -> Option<BoundingBox> {
    let first = points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for p in &points[1..] {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    Some(BoundingBox::new(
        min_x,
        min_y,
        (max_x - min_x + 1) as u32,
        (max_y - min_y + 1) as u32,
    ))
}

/// Approximate a closed contour and classify its bounding rectangle.
pub fn candidate_from_contour(points: &[Point<i32>]) -> Option<ElementCandidate> {
    if points.is_empty() {
        return None;
    }
    let perimeter = arc_length(points, true);
    let approx = approximate_polygon_dp(points, APPROX_EPSILON * perimeter, true);
    let bbox = bounding_rect(if approx.is_empty() { points } else { &approx[..] })?;
    classify(bbox.width, bbox.height).map(|kind| ElementCandidate { kind, bbox })
}

#[derive(Debug, Default)]
pub struct ElementDetector;

impl ElementDetector {
    pub fn new() -> Self {
        Self
    }

    pub fn detect(&self, gray: &GrayImage) -> DetectedElements {
        let blurred = imageproc::filter::gaussian_blur_f32(gray, BLUR_SIGMA);
        let edges = imageproc::edges::canny(&blurred, CANNY_LOW, CANNY_HIGH);
        let contours = find_contours::<i32>(&edges);

        let mut elements = DetectedElements::default();
        let mut external = 0usize;
        for contour in contours
            .iter()
            .filter(|c| c.parent.is_none() && matches!(c.border_type, BorderType::Outer))
        {
            external += 1;
            if let Some(candidate) = candidate_from_contour(&contour.points) {
                elements.push(candidate);
            }
        }

        tracing::info!(
            contours = contours.len(),
            external,
            buttons = elements.buttons.len(),
            windows = elements.windows.len(),
            "elements detected"
        );
        elements
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn rect_points(x: i32, y: i32, w: i32, h: i32) -> Vec<Point<i32>> {
        let mut pts = Vec::new();
        for i in 0..w {
            pts.push(Point::new(x + i, y));
        }
        for j in 1..h {
            pts.push(Point::new(x + w - 1, y + j));
        }
        for i in (0..w - 1).rev() {
            pts.push(Point::new(x + i, y + h - 1));
        }
        for j in (1..h - 1).rev() {
            pts.push(Point::new(x, y + j));
        }
        pts
    }

    fn canvas_with_rect(w: u32, h: u32, rx: u32, ry: u32, rw: u32, rh: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| {
            if x >= rx && x < rx + rw && y >= ry && y < ry + rh {
                Luma([255])
            } else {
                Luma([0])
            }
        })
    }

    #[test]
    fn button_thresholds_are_exclusive() {
        assert_eq!(classify(21, 11), Some(ElementKind::Button));
        assert_eq!(classify(99, 49), Some(ElementKind::Button));
        assert_eq!(classify(20, 30), None);
        assert_eq!(classify(100, 30), None);
        assert_eq!(classify(50, 10), None);
        assert_eq!(classify(50, 50), None);
    }

    #[test]
    fn window_thresholds_are_exclusive() {
        assert_eq!(classify(101, 101), Some(ElementKind::Window));
        assert_eq!(classify(100, 400), None);
        assert_eq!(classify(400, 100), None);
    }

    #[test]
    fn classes_never_overlap() {
        for w in 0..=260 {
            for h in 0..=260 {
                match classify(w, h) {
                    Some(ElementKind::Button) => {
                        assert!(w > 20 && w < 100 && h > 10 && h < 50)
                    }
                    Some(ElementKind::Window) => assert!(w > 100 && h > 100),
                    None => {}
                }
            }
        }
    }

    #[test]
    fn rectangular_contour_becomes_button() {
        let c = candidate_from_contour(&rect_points(40, 60, 60, 30)).unwrap();
        assert_eq!(c.kind, ElementKind::Button);
        assert_eq!(c.bbox, BoundingBox::new(40, 60, 60, 30));
    }

    #[test]
    fn large_contour_becomes_window() {
        let c = candidate_from_contour(&rect_points(0, 0, 400, 300)).unwrap();
        assert_eq!(c.kind, ElementKind::Window);
    }

    #[test]
    fn thin_contour_is_discarded() {
        assert!(candidate_from_contour(&rect_points(0, 0, 200, 3)).is_none());
        assert!(candidate_from_contour(&[]).is_none());
    }

    #[test]
    fn blank_image_has_no_candidates() {
        let det = ElementDetector::new().detect(&GrayImage::new(120, 80));
        assert_eq!(det, DetectedElements::default());
    }

    #[test]
    fn detects_large_panel_as_window() {
        let img = canvas_with_rect(400, 300, 50, 40, 300, 200);
        let det = ElementDetector::new().detect(&img);
        assert!(!det.windows.is_empty());
        for w in &det.windows {
            assert!(w.bbox.width > 100 && w.bbox.height > 100);
        }
        for b in &det.buttons {
            assert!(b.bbox.width > 20 && b.bbox.width < 100);
            assert!(b.bbox.height > 10 && b.bbox.height < 50);
        }
        assert!(det.icons.is_empty());
    }

    #[test]
    fn detection_is_deterministic() {
        let img = canvas_with_rect(200, 120, 30, 30, 60, 30);
        let detector = ElementDetector::new();
        assert_eq!(detector.detect(&img), detector.detect(&img));
    }
}
