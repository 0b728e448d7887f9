use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::perception::types::{DetectedElements, TextFragment};

const TOP_N: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TitleCandidate {
    pub text: String,
    pub count: usize,
    pub avg_confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextCount {
    pub text: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectCounts {
    pub text: usize,
    pub buttons: usize,
    pub windows: usize,
    pub icons: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportStatistics {
    pub total_text_elements: usize,
    pub unique_text_entries: usize,
    pub average_text_confidence: Option<f64>,
    pub title_candidates: Vec<TitleCandidate>,
    pub top_text_fragments: Vec<TextCount>,
    pub object_counts: ObjectCounts,
    pub interaction_points: usize,
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Does this fragment read like a heading? Needs at least three letters,
/// a short word count, and either high confidence or heading-style casing.
pub fn looks_like_title(text: &str, confidence: u8) -> bool {
    let char_count = text.chars().count();
    if char_count < 3 {
        return false;
    }
    if text.chars().filter(|c| c.is_alphabetic()).count() < 3 {
        return false;
    }
    let words: Vec<&str> = text.split_whitespace().collect();
    let reasonable_length = (1..=10).contains(&words.len()) && char_count <= 80;
    let confident = confidence >= 75;
    (confident || is_upper(text) || is_title_case(&words)) && reasonable_length
}

fn is_upper(text: &str) -> bool {
    let mut cased = text.chars().filter(|c| c.is_alphabetic()).peekable();
    cased.peek().is_some() && cased.all(|c| !c.is_lowercase())
}

fn is_title_case(words: &[&str]) -> bool {
    let mut saw_word = false;
    for word in words {
        let mut letters = word.chars().filter(|c| c.is_alphabetic());
        match letters.next() {
            Some(first) => {
                if !first.is_uppercase() || letters.any(|c| c.is_uppercase()) {
                    return false;
                }
                saw_word = true;
            }
            None => continue,
        }
    }
    saw_word
}

/// Derive the report statistics. Ordering of ties always falls back to
/// first appearance, so the result is stable for a given input.
pub fn compute(
    fragments: &[TextFragment],
    elements: &DetectedElements,
    interaction_points: usize,
) -> ReportStatistics {
    // text → (first index, count); titles additionally sum confidence
    let mut texts: HashMap<&str, (usize, usize)> = HashMap::new();
    let mut titles: HashMap<&str, (usize, usize, f64)> = HashMap::new();

    for (idx, f) in fragments.iter().enumerate() {
        let entry = texts.entry(f.text.as_str()).or_insert((idx, 0));
        entry.1 += 1;

        if looks_like_title(&f.text, f.confidence) {
            let t = titles.entry(f.text.as_str()).or_insert((idx, 0, 0.0));
            t.1 += 1;
            t.2 += f.confidence as f64;
        }
    }

    let average_text_confidence = if fragments.is_empty() {
        None
    } else {
        let sum: f64 = fragments.iter().map(|f| f.confidence as f64).sum();
        Some(round1(sum / fragments.len() as f64))
    };

    let mut ranked_titles: Vec<(&str, usize, usize, f64)> = titles
        .into_iter()
        .map(|(text, (first, count, conf_sum))| (text, first, count, conf_sum / count as f64))
        .collect();
    ranked_titles.sort_by(|a, b| {
        b.2.cmp(&a.2)
            .then(b.3.total_cmp(&a.3))
            .then(a.1.cmp(&b.1))
    });
    let title_candidates = ranked_titles
        .into_iter()
        .take(TOP_N)
        .map(|(text, _, count, mean)| TitleCandidate {
            text: text.to_string(),
            count,
            avg_confidence: round1(mean),
        })
        .collect();

    let unique_text_entries = texts.len();
    let mut ranked_texts: Vec<(&str, usize, usize)> =
        texts.into_iter().map(|(t, (first, count))| (t, first, count)).collect();
    ranked_texts.sort_by(|a, b| b.2.cmp(&a.2).then(a.1.cmp(&b.1)));
    let top_text_fragments = ranked_texts
        .into_iter()
        .take(TOP_N)
        .map(|(text, _, count)| TextCount {
            text: text.to_string(),
            count,
        })
        .collect();

    ReportStatistics {
        total_text_elements: fragments.len(),
        unique_text_entries,
        average_text_confidence,
        title_candidates,
        top_text_fragments,
        object_counts: ObjectCounts {
            text: fragments.len(),
            buttons: elements.buttons.len(),
            windows: elements.windows.len(),
            icons: elements.icons.len(),
        },
        interaction_points,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::types::BoundingBox;

    fn frag(text: &str, confidence: u8) -> TextFragment {
        TextFragment {
            text: text.into(),
            bbox: BoundingBox::new(0, 0, 10, 10),
            confidence,
        }
    }

    #[test]
    fn title_heuristic() {
        assert!(looks_like_title("Settings", 90));
        assert!(looks_like_title("FILE MENU", 40));
        assert!(looks_like_title("Open Recent", 40));
        assert!(!looks_like_title("open recent", 40));
        assert!(!looks_like_title("ok", 99));
        assert!(!looks_like_title("1234", 99));
        assert!(!looks_like_title("one two three four five six seven eight nine ten eleven", 99));
    }

    #[test]
    fn empty_input_has_no_average() {
        let stats = compute(&[], &DetectedElements::default(), 0);
        assert_eq!(stats.total_text_elements, 0);
        assert_eq!(stats.average_text_confidence, None);
        assert!(stats.title_candidates.is_empty());
    }

    #[test]
    fn counts_and_rankings() {
        let fragments = vec![
            frag("File", 90),
            frag("Edit", 80),
            frag("File", 70),
            frag("x", 40),
            frag("View", 95),
        ];
        let stats = compute(&fragments, &DetectedElements::default(), 7);
        assert_eq!(stats.total_text_elements, 5);
        assert_eq!(stats.unique_text_entries, 4);
        assert_eq!(stats.average_text_confidence, Some(75.0));
        assert_eq!(stats.interaction_points, 7);

        assert_eq!(stats.top_text_fragments[0], TextCount { text: "File".into(), count: 2 });
        assert_eq!(stats.top_text_fragments[1].text, "Edit");

        let titles: Vec<_> = stats.title_candidates.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(titles, vec!["File", "View", "Edit"]);
        assert_eq!(stats.title_candidates[0].avg_confidence, 80.0);
    }

    #[test]
    fn top_lists_are_capped() {
        let fragments: Vec<_> = ["Alpha", "Bravo", "Charlie", "Delta", "Echo", "Foxtrot", "Golf"]
            .iter()
            .map(|t| frag(t, 90))
            .collect();
        let stats = compute(&fragments, &DetectedElements::default(), 0);
        assert_eq!(stats.title_candidates.len(), 5);
        assert_eq!(stats.top_text_fragments.len(), 5);
        assert_eq!(stats.title_candidates[0].text, "Alpha");
    }
}
