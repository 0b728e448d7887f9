use async_trait::async_trait;

use crate::errors::DeskPilotResult;
use crate::report::AnalysisReport;

/// The language-model exchange. Takes a compiled report (and optionally the
/// raw screenshot as PNG) and returns free-form text describing actions.
///
/// `Ok(None)` means the service answered without usable text; the cycle
/// then ends without invoking the parser.
#[async_trait]
pub trait ActionAdvisor: Send + Sync {
    fn name(&self) -> &str;

    async fn propose(
        &self,
        report: &AnalysisReport,
        screenshot_png: Option<&[u8]>,
    ) -> DeskPilotResult<Option<String>>;
}
