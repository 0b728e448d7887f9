use image::RgbImage;

use crate::errors::DeskPilotResult;
use crate::perception::types::BoundingBox;

/// A token as the OCR backend reports it, before threshold filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct RawToken {
    pub text: String,
    pub bbox: BoundingBox,
    /// Backend confidence; negative for rows that are not words.
    pub confidence: f32,
}

/// Strategy trait for OCR backends. Tokens come back in the engine's own
/// order, not re-sorted spatially.
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &str;

    fn recognize(&self, image: &RgbImage) -> DeskPilotResult<Vec<RawToken>>;
}
