//! Coverage checking for tuple matches over tagged unions.

use gild_core::{PassError, Position};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Pattern {
    Tag(String),
    Wildcard,
}

impl Pattern {
    fn covers(&self, tag: &str) -> bool {
        match self {
            Pattern::Tag(t) => t == tag,
            Pattern::Wildcard => true,
        }
    }
}

/// One arm: a pattern per column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Row {
    pub patterns: Vec<Pattern>,
    /// Arms with a guard never count towards coverage.
    pub guarded: bool,
    pub position: Option<Position>,
}

impl Row {
    pub fn new(patterns: Vec<Pattern>) -> Self {
        Self {
            patterns,
            guarded: false,
            position: None,
        }
    }

    pub fn guarded(mut self) -> Self {
        self.guarded = true;
        self
    }

    pub fn at(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    fn matches(&self, combination: &[String]) -> bool {
        self.patterns.iter().zip(combination).all(|(p, tag)| p.covers(tag))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TupleMatchSpec {
    pub rows: Vec<Row>,
}

/// Legal tags per column in declaration order; `None` when the column's union
/// is not declared in this file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExhaustivenessRequirement {
    pub columns: Vec<Option<Vec<String>>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Exhaustive,
    /// The first uncovered combination in declaration order.
    Missing {
        combination: Vec<String>,
        /// A guarded arm that would have covered it.
        guarded_row: Option<Position>,
    },
    /// A column names tags of a union that is not known here.
    Unverifiable { column: usize },
}

const LIMIT_WHAT: &str = "match combinations";
const LIMIT_HINT: &str = "too many required combinations — add a wildcard row";

struct Search<'a> {
    ceiling: usize,
    leaves: usize,
    prefix: Vec<&'a str>,
}

impl<'a> Search<'a> {
    fn leaf(&mut self) -> Result<(), PassError> {
        self.leaves += 1;
        if self.leaves > self.ceiling {
            return Err(PassError::LimitExceeded {
                what: LIMIT_WHAT,
                limit: self.ceiling,
                actual: self.leaves,
                hint: LIMIT_HINT,
            });
        }
        Ok(())
    }

    fn descend(&mut self, rows: &[&Row], column: usize, columns: &'a [Vec<String>]) -> Result<Option<Vec<String>>, PassError> {
        if rows.is_empty() {
            self.leaf()?;
            let mut witness: Vec<String> = self.prefix.iter().map(|t| t.to_string()).collect();
            witness.extend(columns[column..].iter().map(|tags| tags[0].clone()));
            return Ok(Some(witness));
        }
        let covered = rows
            .iter()
            .any(|row| row.patterns[column..].iter().all(|p| *p == Pattern::Wildcard));
        if covered {
            self.leaf()?;
            return Ok(None);
        }
        for tag in &columns[column] {
            let remaining: Vec<&Row> = rows
                .iter()
                .copied()
                .filter(|row| row.patterns[column].covers(tag))
                .collect();
            self.prefix.push(tag);
            if let Some(witness) = self.descend(&remaining, column + 1, columns)? {
                return Ok(Some(witness));
            }
            self.prefix.pop();
        }
        Ok(None)
    }
}

/// Decide whether the unguarded rows of `spec` cover every combination of
/// legal tags, visiting at most `ceiling` leaves.
pub fn check(spec: &TupleMatchSpec, requirement: &ExhaustivenessRequirement, ceiling: usize) -> Result<Verdict, PassError> {
    let arity = requirement.columns.len();
    if let Some(row) = spec.rows.iter().find(|row| row.patterns.len() != arity) {
        return Err(PassError::invalid(format!(
            "row has {} patterns but the match has {arity} columns",
            row.patterns.len()
        )));
    }

    let mut columns = Vec::with_capacity(arity);
    for (index, legal) in requirement.columns.iter().enumerate() {
        let concrete = spec
            .rows
            .iter()
            .any(|row| matches!(row.patterns[index], Pattern::Tag(_)));
        match legal {
            Some(tags) if !tags.is_empty() => columns.push(tags.clone()),
            _ if concrete => return Ok(Verdict::Unverifiable { column: index }),
            // A column only ever matched by wildcards is covered by any of them.
            _ => columns.push(vec!["_".to_string()]),
        }
    }

    let unguarded: Vec<&Row> = spec.rows.iter().filter(|row| !row.guarded).collect();
    let mut search = Search {
        ceiling,
        leaves: 0,
        prefix: Vec::new(),
    };
    let witness = search.descend(&unguarded, 0, &columns)?;
    tracing::trace!(leaves = search.leaves, arity, "exhaustiveness search");

    Ok(match witness {
        None => Verdict::Exhaustive,
        Some(combination) => {
            let guarded_row = spec
                .rows
                .iter()
                .find(|row| row.guarded && row.matches(&combination))
                .and_then(|row| row.position);
            Verdict::Missing {
                combination,
                guarded_row,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(name: &str) -> Pattern {
        Pattern::Tag(name.to_string())
    }

    fn row(patterns: &[&str]) -> Row {
        Row::new(
            patterns
                .iter()
                .map(|&p| if p == "_" { Pattern::Wildcard } else { tag(p) })
                .collect(),
        )
    }

    fn columns(columns: &[&[&str]]) -> ExhaustivenessRequirement {
        ExhaustivenessRequirement {
            columns: columns
                .iter()
                .map(|tags| Some(tags.iter().map(|t| t.to_string()).collect()))
                .collect(),
        }
    }

    fn missing(combination: &[&str]) -> Verdict {
        Verdict::Missing {
            combination: combination.iter().map(|t| t.to_string()).collect(),
            guarded_row: None,
        }
    }

    #[test]
    fn test_three_of_four_reports_the_fourth() {
        let requirement = columns(&[&["Some", "None"], &["Ok", "Err"]]);
        let spec = TupleMatchSpec {
            rows: vec![row(&["Some", "Ok"]), row(&["Some", "Err"]), row(&["None", "Ok"])],
        };
        assert_eq!(check(&spec, &requirement, 1024).unwrap(), missing(&["None", "Err"]));
    }

    #[test]
    fn test_removing_any_row_reports_that_row() {
        let requirement = columns(&[&["A", "B"], &["X", "Y"]]);
        let all = [["A", "X"], ["A", "Y"], ["B", "X"], ["B", "Y"]];
        let full = TupleMatchSpec {
            rows: all.iter().map(|r| row(r)).collect(),
        };
        assert_eq!(check(&full, &requirement, 1024).unwrap(), Verdict::Exhaustive);

        for removed in 0..all.len() {
            let spec = TupleMatchSpec {
                rows: all
                    .iter()
                    .enumerate()
                    .filter(|&(i, _)| i != removed)
                    .map(|(_, r)| row(r))
                    .collect(),
            };
            assert_eq!(check(&spec, &requirement, 1024).unwrap(), missing(&all[removed]));
        }
    }

    #[test]
    fn test_wildcard_row_covers_everything() {
        let requirement = columns(&[&["A", "B"], &["X", "Y"]]);
        let spec = TupleMatchSpec {
            rows: vec![row(&["A", "X"]), row(&["_", "_"])],
        };
        assert_eq!(check(&spec, &requirement, 1024).unwrap(), Verdict::Exhaustive);
    }

    #[test]
    fn test_ceiling() {
        let requirement = columns(&[&["A", "B"], &["X", "Y"]]);
        let spec = TupleMatchSpec {
            rows: vec![row(&["A", "X"]), row(&["A", "Y"]), row(&["B", "X"]), row(&["B", "Y"])],
        };
        let err = check(&spec, &requirement, 3).unwrap_err();
        assert_eq!(
            err.to_string(),
            "match combinations limit exceeded (4 > 3); too many required combinations — add a wildcard row"
        );
    }

    #[test]
    fn test_guarded_rows_do_not_count() {
        let requirement = columns(&[&["Circle", "Rect"]]);
        let spec = TupleMatchSpec {
            rows: vec![row(&["Circle"]).guarded().at(Position::new(3, 3)), row(&["Rect"])],
        };
        assert_eq!(
            check(&spec, &requirement, 1024).unwrap(),
            Verdict::Missing {
                combination: vec!["Circle".to_string()],
                guarded_row: Some(Position::new(3, 3)),
            }
        );
    }

    #[test]
    fn test_unknown_union() {
        let mut requirement = columns(&[&["A", "B"]]);
        requirement.columns.push(None);
        let spec = TupleMatchSpec {
            rows: vec![row(&["A", "Other"]), row(&["B", "_"])],
        };
        assert_eq!(
            check(&spec, &requirement, 1024).unwrap(),
            Verdict::Unverifiable { column: 1 }
        );

        let spec = TupleMatchSpec {
            rows: vec![row(&["A", "_"]), row(&["B", "_"])],
        };
        assert_eq!(check(&spec, &requirement, 1024).unwrap(), Verdict::Exhaustive);
    }
}
