use base64::Engine as _;

use crate::errors::DeskPilotResult;
use crate::llm::types::{ChatMessage, ContentPart, ImageUrl};
use crate::report::AnalysisReport;

pub const SYSTEM_PROMPT: &str = "You are a desktop automation assistant. Analyze the screen content \
and suggest specific actions the user might want to take. Focus on practical, actionable \
suggestions like clicking buttons, typing text, or pressing keys. Be specific about coordinates \
when suggesting clicks.\n\n\
Write every action on its own line using exactly one of these forms:\n\
CLICK (x, y)\n\
TYPE \"text to type\"\n\
PRESS \"key\"\n\
Coordinates are screen pixels from the top-left corner and must lie inside the reported screen \
resolution. Keys are names like enter, tab, esc, f5 or chords like ctrl+s.";

/// System prompt plus one user message carrying the report as pretty JSON,
/// the goal, and optionally the screenshot as a data URI.
pub fn build_messages(
    report: &AnalysisReport,
    goal: &str,
    screenshot_png: Option<&[u8]>,
) -> DeskPilotResult<Vec<ChatMessage>> {
    let report_json = serde_json::to_string_pretty(report)?;
    let mut parts = vec![ContentPart::Text {
        text: format!(
            "Screen analysis data:\n{report_json}\n\n{}\n\nGoal: {goal}",
            report.summary_text
        ),
    }];

    if let Some(png) = screenshot_png {
        let encoded = base64::engine::general_purpose::STANDARD.encode(png);
        parts.push(ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: format!("data:image/png;base64,{encoded}"),
                detail: Some("high".into()),
            },
        });
    }

    Ok(vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(parts)])
}
