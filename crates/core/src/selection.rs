//! Solid selection clauses.
//!
//! A clause names a solid and optionally extends the selection upstream
//! (prefix) or downstream (suffix):
//!
//! | Clause      | Selects                                   |
//! |-------------|-------------------------------------------|
//! | `load`      | `load`                                    |
//! | `*load`     | `load` and all of its ancestors           |
//! | `++load`    | `load` and ancestors up to two levels     |
//! | `extract*`  | `extract` and all of its descendants      |
//! | `extract+`  | `extract` and its direct consumers        |

use std::collections::BTreeSet;

use crate::definition::PipelineDef;

/// Selection that names solids the pipeline does not define.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct SelectionError {
    pub message: String,
    pub unknown: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Depth {
    Levels(usize),
    All,
}

#[derive(Debug, PartialEq, Eq)]
struct Clause<'a> {
    name: &'a str,
    up: Depth,
    down: Depth,
}

fn parse_clause(raw: &str) -> Clause<'_> {
    let raw = raw.trim();
    let (up, rest) = split_prefix(raw);
    let (name, down) = split_suffix(rest);
    Clause { name, up, down }
}

fn split_prefix(raw: &str) -> (Depth, &str) {
    if let Some(rest) = raw.strip_prefix('*') {
        return (Depth::All, rest);
    }
    let levels = raw.chars().take_while(|c| *c == '+').count();
    (Depth::Levels(levels), &raw[levels..])
}

fn split_suffix(raw: &str) -> (&str, Depth) {
    if let Some(rest) = raw.strip_suffix('*') {
        return (rest, Depth::All);
    }
    let levels = raw.chars().rev().take_while(|c| *c == '+').count();
    (&raw[..raw.len() - levels], Depth::Levels(levels))
}

/// Resolve selection clauses to the set of selected solid names.
///
/// An empty clause list selects every solid.
pub fn resolve_selection(
    pipeline: &PipelineDef,
    clauses: &[String],
) -> Result<BTreeSet<String>, SelectionError> {
    if clauses.is_empty() {
        return Ok(pipeline.solids.iter().map(|s| s.name.clone()).collect());
    }

    let parsed: Vec<Clause<'_>> = clauses.iter().map(|c| parse_clause(c)).collect();
    let unknown: Vec<String> = parsed
        .iter()
        .filter(|c| pipeline.solid(c.name).is_none())
        .map(|c| c.name.to_string())
        .collect();
    if !unknown.is_empty() {
        return Err(SelectionError {
            message: format!(
                "No qualified solids to execute found for solid_selection {clauses:?}: \
                 pipeline '{}' has no solid named {}",
                pipeline.name,
                unknown
                    .iter()
                    .map(|n| format!("'{n}'"))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            unknown,
        });
    }

    let mut selected = BTreeSet::new();
    for clause in parsed {
        selected.insert(clause.name.to_string());
        walk(pipeline, clause.name, clause.up, &mut selected, |p, s| p.upstream_of(s));
        walk(pipeline, clause.name, clause.down, &mut selected, |p, s| p.downstream_of(s));
    }
    Ok(selected)
}

fn walk(
    pipeline: &PipelineDef,
    start: &str,
    depth: Depth,
    selected: &mut BTreeSet<String>,
    next: impl Fn(&PipelineDef, &str) -> BTreeSet<String>,
) {
    let mut frontier: BTreeSet<String> = BTreeSet::from([start.to_string()]);
    let mut level = 0;
    while !frontier.is_empty() {
        if let Depth::Levels(max) = depth {
            if level >= max {
                break;
            }
        }
        let mut following = BTreeSet::new();
        for name in &frontier {
            for neighbour in next(pipeline, name) {
                if selected.insert(neighbour.clone()) {
                    following.insert(neighbour);
                }
            }
        }
        frontier = following;
        level += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::fixtures::etl_pipeline;

    fn select(clauses: &[&str]) -> Result<Vec<String>, SelectionError> {
        let clauses: Vec<String> = clauses.iter().map(|c| c.to_string()).collect();
        resolve_selection(&etl_pipeline(), &clauses).map(|s| s.into_iter().collect())
    }

    #[test]
    fn parses_prefix_and_suffix() {
        assert_eq!(
            parse_clause("++load*"),
            Clause {
                name: "load",
                up: Depth::Levels(2),
                down: Depth::All
            }
        );
        assert_eq!(
            parse_clause("extract"),
            Clause {
                name: "extract",
                up: Depth::Levels(0),
                down: Depth::Levels(0)
            }
        );
    }

    #[test]
    fn empty_selection_selects_everything() {
        assert_eq!(select(&[]).unwrap().len(), 4);
    }

    #[test]
    fn plain_name_selects_one_solid() {
        assert_eq!(select(&["transform"]).unwrap(), vec!["transform"]);
    }

    #[test]
    fn star_prefix_selects_all_ancestors() {
        assert_eq!(
            select(&["*load"]).unwrap(),
            vec!["extract", "load", "transform"]
        );
    }

    #[test]
    fn plus_limits_depth() {
        assert_eq!(select(&["+load"]).unwrap(), vec!["load", "transform"]);
        assert_eq!(select(&["extract+"]).unwrap(), vec!["extract", "transform"]);
    }

    #[test]
    fn unknown_names_are_reported() {
        let err = select(&["transform", "ghost*"]).unwrap_err();
        assert_eq!(err.unknown, vec!["ghost"]);
        assert!(err.message.contains("'ghost'"));
    }
}
