use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::executor::directive::ActionDirective;
use crate::perception::types::Point;

/// Which parsed directives go forward to the gate. Deterministic for a given
/// input; there is no random mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    /// Every directive, in parse order.
    #[default]
    All,
    /// The `max_actions` clicks closest to the screen centre (Manhattan
    /// distance, ties go to the earlier click). Other directives are kept and
    /// everything stays in parse order.
    NearestCenter { max_actions: usize },
    /// The first `max_actions` directives.
    First { max_actions: usize },
}

impl SelectionStrategy {
    pub fn select(&self, directives: Vec<ActionDirective>, center: Point) -> Vec<ActionDirective> {
        match *self {
            SelectionStrategy::All => directives,
            SelectionStrategy::First { max_actions } => {
                directives.into_iter().take(max_actions).collect()
            }
            SelectionStrategy::NearestCenter { max_actions } => {
                let mut ranked: Vec<(i64, usize)> = directives
                    .iter()
                    .enumerate()
                    .filter_map(|(idx, d)| match d {
                        ActionDirective::Click { x, y } => Some((
                            (*x as i64 - center.x as i64).abs() + (*y as i64 - center.y as i64).abs(),
                            idx,
                        )),
                        _ => None,
                    })
                    .collect();
                ranked.sort();
                let kept: HashSet<usize> =
                    ranked.into_iter().take(max_actions).map(|(_, idx)| idx).collect();

                directives
                    .into_iter()
                    .enumerate()
                    .filter(|(idx, d)| !matches!(d, ActionDirective::Click { .. }) || kept.contains(idx))
                    .map(|(_, d)| d)
                    .collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn click(x: i32, y: i32) -> ActionDirective {
        ActionDirective::Click { x, y }
    }

    fn sample() -> Vec<ActionDirective> {
        vec![
            click(0, 0),
            ActionDirective::Type { text: "a".into() },
            click(950, 530),
            click(970, 550),
            ActionDirective::Press { key: "enter".into() },
        ]
    }

    const CENTER: Point = Point { x: 960, y: 540 };

    #[test]
    fn all_keeps_everything() {
        assert_eq!(SelectionStrategy::All.select(sample(), CENTER), sample());
    }

    #[test]
    fn first_truncates() {
        let out = SelectionStrategy::First { max_actions: 2 }.select(sample(), CENTER);
        assert_eq!(out, sample()[..2].to_vec());
    }

    #[test]
    fn nearest_center_ranks_clicks_with_stable_ties() {
        let out = SelectionStrategy::NearestCenter { max_actions: 2 }.select(sample(), CENTER);
        assert_eq!(
            out,
            vec![
                ActionDirective::Type { text: "a".into() },
                click(950, 530),
                click(970, 550),
                ActionDirective::Press { key: "enter".into() },
            ]
        );
    }

    #[test]
    fn nearest_center_keeps_field_type_submit_order() {
        let directives = vec![
            click(900, 500),
            ActionDirective::Type { text: "query".into() },
            click(1000, 600),
            click(10, 10),
        ];
        let out = SelectionStrategy::NearestCenter { max_actions: 2 }.select(directives, CENTER);
        assert_eq!(
            out,
            vec![
                click(900, 500),
                ActionDirective::Type { text: "query".into() },
                click(1000, 600),
            ]
        );
    }
}
