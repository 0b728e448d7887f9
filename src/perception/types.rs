use serde::{Deserialize, Serialize};

/// Axis-aligned box in pixels, top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn center(&self) -> Point {
        Point {
            x: self.x + (self.width / 2) as i32,
            y: self.y + (self.height / 2) as i32,
        }
    }

    /// Map from image pixels to screen pixels (HiDPI captures are larger
    /// than the logical screen).
    pub fn scaled(&self, sx: f64, sy: f64) -> Self {
        Self {
            x: (self.x as f64 * sx).round() as i32,
            y: (self.y as f64 * sy).round() as i32,
            width: (self.width as f64 * sx).round() as u32,
            height: (self.height as f64 * sy).round() as u32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// `[0, width) × [0, height)`.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as i64) < self.width as i64 && (y as i64) < self.height as i64
    }

    pub fn center(&self) -> Point {
        Point {
            x: (self.width / 2) as i32,
            y: (self.height / 2) as i32,
        }
    }
}

/// One OCR token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFragment {
    pub text: String,
    pub bbox: BoundingBox,
    /// 0–100 as reported by the OCR backend.
    pub confidence: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Button,
    Window,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementCandidate {
    pub kind: ElementKind,
    pub bbox: BoundingBox,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectedElements {
    pub buttons: Vec<ElementCandidate>,
    pub windows: Vec<ElementCandidate>,
    /// Always empty: the heuristics have no icon class.
    pub icons: Vec<ElementCandidate>,
}

impl DetectedElements {
    pub fn push(&mut self, candidate: ElementCandidate) {
        match candidate.kind {
            ElementKind::Button => self.buttons.push(candidate),
            ElementKind::Window => self.windows.push(candidate),
        }
    }
}
