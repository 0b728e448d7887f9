use std::sync::LazyLock;

use regex::Regex;

use crate::executor::directive::ActionDirective;

static KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(click|type|press)\b").expect("keyword pattern"));

static DELIMITED_PAIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(\s*(-?\d+)\s*,\s*(-?\d+)\s*\)|\[\s*(-?\d+)\s*,\s*(-?\d+)\s*\]")
        .expect("delimited pair pattern")
});

/// The leading group keeps the pair from starting inside a number or after a
/// decimal point; a fractional tail on the second number is captured so the
/// pair can be rejected.
static BARE_PAIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^\w\-.])(-?\d+)\s*,\s*(-?\d+)(\.\d)?").expect("bare pair pattern")
});

/// Extract every directive from `text`, in order of appearance.
pub fn parse(text: &str) -> Vec<ActionDirective> {
    let mut directives = Vec::new();
    let mut cursor = 0;

    while let Some(kw) = KEYWORD.find_at(text, cursor) {
        let parsed = directive_at(text, kw);

        match parsed {
            Some((directive, end)) => {
                tracing::trace!(%directive, "directive parsed");
                directives.push(directive);
                cursor = end;
            }
            None => {
                tracing::trace!(keyword = kw.as_str(), at = kw.start(), "malformed directive skipped");
                cursor = kw.end();
            }
        }
    }

    tracing::debug!(count = directives.len(), "action text parsed");
    directives
}

/// The directive introduced by `kw`, with the byte offset just past it.
fn directive_at(text: &str, kw: regex::Match<'_>) -> Option<(ActionDirective, usize)> {
    match kw.as_str().to_ascii_lowercase().as_str() {
        "click" => parse_click(text, kw.end()),
        "type" => parse_quoted(text, kw.end()).and_then(|(payload, end)| {
            (!payload.is_empty()).then(|| {
                (
                    ActionDirective::Type {
                        text: payload.to_string(),
                    },
                    end,
                )
            })
        }),
        "press" => parse_quoted(text, kw.end()).and_then(|(payload, end)| {
            let key = payload.trim();
            (!key.is_empty() && !key.contains(char::is_whitespace)).then(|| {
                (
                    ActionDirective::Press {
                        key: key.to_lowercase(),
                    },
                    end,
                )
            })
        }),
        _ => None,
    }
}

/// Coordinates for a CLICK keyword ending at `start`. The search region runs
/// to the end of the line; a later keyword on the same line only cuts it short
/// when a complete directive parses there, so filler such as
/// `the 'Type a message' box` stays part of this click.
fn parse_click(text: &str, start: usize) -> Option<(ActionDirective, usize)> {
    let line_end = text[start..]
        .find('\n')
        .map_or(text.len(), |off| start + off);
    let region_end = KEYWORD
        .find_iter(&text[..line_end])
        .skip_while(|m| m.start() < start)
        .find(|m| directive_at(text, *m).is_some())
        .map_or(line_end, |m| m.start());
    let region = &text[start..region_end];

    let (x, y, end) = if let Some(caps) = DELIMITED_PAIR.captures(region) {
        let whole = caps.get(0)?;
        let (gx, gy) = if caps.get(1).is_some() { (1, 2) } else { (3, 4) };
        (caps.get(gx)?.as_str(), caps.get(gy)?.as_str(), whole.end())
    } else {
        let caps = BARE_PAIR.captures_iter(region).find(|c| c.get(3).is_none())?;
        (caps.get(1)?.as_str(), caps.get(2)?.as_str(), caps.get(2)?.end())
    };

    // Overflowing integers fall out here and the directive is skipped.
    let x = x.parse::<i32>().ok()?;
    let y = y.parse::<i32>().ok()?;
    Some((ActionDirective::Click { x, y }, start + end))
}

/// A quoted payload right after a TYPE/PRESS keyword: optional whitespace,
/// an optional colon, then a quote that must close on the same line.
/// Returns the payload verbatim and the byte offset after the closing quote.
fn parse_quoted(text: &str, start: usize) -> Option<(&str, usize)> {
    let rest = &text[start..];
    let after_ws = rest.trim_start_matches([' ', '\t']);
    let after_colon = after_ws
        .strip_prefix(':')
        .map_or(after_ws, |s| s.trim_start_matches([' ', '\t']));

    let mut chars = after_colon.chars();
    let closing: &[char] = match chars.next()? {
        '"' => &['"'],
        '“' => &['”', '"'],
        _ => return None,
    };
    let body = chars.as_str();
    let body_start = text.len() - body.len();

    let close = body.find(|c: char| closing.contains(&c) || c == '\n')?;
    let close_char = body[close..].chars().next()?;
    if close_char == '\n' {
        return None;
    }
    Some((&body[..close], body_start + close + close_char.len_utf8()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ActionDirective::{Click, Press, Type};

    fn click(x: i32, y: i32) -> ActionDirective {
        Click { x, y }
    }

    #[test]
    fn three_click_forms_agree() {
        for input in [
            "CLICK (89, 17)",
            "CLICK button at coordinates [89, 17]",
            "CLICK at 89,17",
        ] {
            assert_eq!(parse(input), vec![click(89, 17)], "input: {input}");
        }
    }

    #[test]
    fn type_preserves_payload_verbatim() {
        assert_eq!(
            parse(r#"TYPE "Hello, world!""#),
            vec![Type {
                text: "Hello, world!".into()
            }]
        );
        assert_eq!(
            parse(r#"type:  "  spaced   out  ""#),
            vec![Type {
                text: "  spaced   out  ".into()
            }]
        );
    }

    #[test]
    fn press_is_lowercased_single_token() {
        assert_eq!(parse(r#"PRESS "Enter""#), vec![Press { key: "enter".into() }]);
        assert_eq!(parse(r#"press " Ctrl+S ""#), vec![Press { key: "ctrl+s".into() }]);
        assert!(parse(r#"PRESS "page down""#).is_empty());
        assert!(parse(r#"PRESS """#).is_empty());
    }

    #[test]
    fn curly_quotes_are_accepted() {
        assert_eq!(
            parse("TYPE “quarterly report”"),
            vec![Type {
                text: "quarterly report".into()
            }]
        );
    }

    #[test]
    fn delimited_pair_beats_bare_pair() {
        assert_eq!(parse("CLICK item 3, 4 at [100, 200]"), vec![click(100, 200)]);
    }

    #[test]
    fn keywords_need_word_boundaries() {
        assert!(parse("The clicker typed 5, 6 and pressed on").is_empty());
    }

    #[test]
    fn keywords_inside_payload_are_not_directives() {
        assert_eq!(
            parse(r#"TYPE "click (1, 2) then press" and CLICK [5, 6]"#),
            vec![
                Type {
                    text: "click (1, 2) then press".into()
                },
                click(5, 6)
            ]
        );
    }

    #[test]
    fn one_directive_per_click_keyword() {
        // the bracketed pair also reads as a bare pair; only one is emitted
        assert_eq!(parse("CLICK [10, 20]"), vec![click(10, 20)]);
        assert_eq!(
            parse("CLICK (1, 2) and CLICK (3, 4)"),
            vec![click(1, 2), click(3, 4)]
        );
    }

    #[test]
    fn click_region_stops_at_line_end() {
        assert!(parse("CLICK the OK button\n(40, 50)").is_empty());
    }

    #[test]
    fn decimal_coordinates_are_not_split_into_integers() {
        assert!(parse("CLICK at (1.5, 2)").is_empty());
        assert!(parse("CLICK (0.45, 0.62)").is_empty());
        assert!(parse("CLICK at 0.45, 0.62").is_empty());
        assert!(parse("CLICK at 3, 4.5").is_empty());
        assert!(parse("CLICK [12.0, 40]").is_empty());
    }

    #[test]
    fn keyword_words_in_click_filler_are_ignored() {
        assert_eq!(
            parse("CLICK the 'Type a message' box at (500, 900)"),
            vec![click(500, 900)]
        );
        assert_eq!(
            parse("CLICK the Press Release link at [120, 40]"),
            vec![click(120, 40)]
        );
    }

    #[test]
    fn complete_directive_later_on_the_line_ends_the_click() {
        assert_eq!(
            parse(r#"CLICK the field then TYPE "5, 6""#),
            vec![Type { text: "5, 6".into() }]
        );
        assert_eq!(
            parse("CLICK somewhere, then click (7, 8)"),
            vec![click(7, 8)]
        );
    }

    #[test]
    fn negative_and_overflowing_coordinates() {
        assert_eq!(parse("CLICK (-5, 10)"), vec![click(-5, 10)]);
        assert!(parse("CLICK (99999999999, 10)").is_empty());
    }

    #[test]
    fn malformed_fragments_are_skipped() {
        let text = "CLICK somewhere\nTYPE unquoted\nPRESS \"tab\nTYPE \"ok\"";
        assert_eq!(parse(text), vec![Type { text: "ok".into() }]);
        assert!(parse("").is_empty());
        assert!(parse("No actions needed.").is_empty());
    }

    #[test]
    fn end_to_end_scenario_parses_in_order() {
        let text = "1. CLICK button at coordinates [89, 17]\n\
                    2. CLICK button at coordinates [198, 17]\n\
                    3. CLICK button at [271, 17]";
        assert_eq!(parse(text), vec![click(89, 17), click(198, 17), click(271, 17)]);
    }

    #[test]
    fn mixed_response_keeps_occurrence_order() {
        let text = "First, click on the search box at (400, 120).\n\
                    Then TYPE: \"rust parsers\"\n\
                    Finally press \"Enter\".";
        assert_eq!(
            parse(text),
            vec![
                click(400, 120),
                Type {
                    text: "rust parsers".into()
                },
                Press { key: "enter".into() }
            ]
        );
    }

    #[test]
    fn parsing_is_idempotent() {
        let text = "CLICK [1, 2]\nTYPE \"a\"\nPRESS \"esc\"\nCLICK 3,4";
        assert_eq!(parse(text), parse(text));
    }
}
