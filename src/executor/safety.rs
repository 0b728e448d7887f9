use crate::executor::input::DeviceControl;
use crate::perception::types::Dimensions;
use crate::report::AnalysisReport;

/// Screen bounds for click validation: the report's screen size when it is
/// known, else whatever the device reports, else none (no bounds check).
pub fn resolve_bounds(
    report: Option<&AnalysisReport>,
    device: Option<&dyn DeviceControl>,
) -> Option<Dimensions> {
    report
        .map(|r| r.screen_dimensions)
        .filter(|d| !d.is_empty())
        .or_else(|| device.and_then(|d| d.current_screen_size()))
        .filter(|d| !d.is_empty())
}

/// `true` when a click at `(x, y)` may go ahead.
pub fn click_allowed(x: i32, y: i32, bounds: Option<Dimensions>) -> bool {
    bounds.map_or(true, |b| b.contains(x, y))
}
