pub mod compiler;
pub mod statistics;

pub use compiler::{compile, AnalysisReport, InteractionKind, InteractionPoint, ReportInput};
pub use statistics::ReportStatistics;
