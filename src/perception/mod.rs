pub mod detector;
pub mod ocr;
pub mod pipeline;
pub mod preprocess;
pub mod screenshot;
pub mod traits;
pub mod types;
