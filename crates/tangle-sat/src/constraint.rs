use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier values uniquely identify particular variables within
/// the input to a single solve.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identifier {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for Identifier {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A constraint limits the circumstances under which a particular
/// variable can appear in a solution.
///
/// Each variant constrains the variable it is attached to (the
/// "subject"); variants that reference other variables do so by
/// identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// The subject must appear in any solution.
    Mandatory,
    /// The subject must not appear in any solution. Callers may also
    /// decide to omit the variable from the input instead.
    Prohibited,
    /// If the subject is selected, at least one of the listed variables
    /// must be selected as well. Identifiers appearing earlier in the
    /// list are preferred over those appearing later.
    Dependency(Vec<Identifier>),
    /// The subject and the referenced variable may not both be selected.
    Conflict(Identifier),
    /// At most `n` of the listed variables may be selected at once.
    AtMost { n: usize, ids: Vec<Identifier> },
    /// A two-literal disjunction over the subject and an operand, with
    /// either side optionally negated.
    Or {
        operand: Identifier,
        negate_subject: bool,
        negate_operand: bool,
    },
}

impl Constraint {
    /// Whether this constraint anchors its subject: anchored variables
    /// have their literals assumed at the top level of every solve.
    pub fn is_anchor(&self) -> bool {
        matches!(self, Constraint::Mandatory)
    }

    /// The ordered identifier list the search explores for this
    /// constraint. Only `Dependency` carries one; the list order is the
    /// preference order.
    pub fn order(&self) -> &[Identifier] {
        match self {
            Constraint::Dependency(ids) => ids,
            _ => &[],
        }
    }

    /// A human-readable sentence describing this constraint as applied
    /// to `subject`.
    pub fn describe(&self, subject: &Identifier) -> String {
        match self {
            Constraint::Mandatory => format!("{subject} is mandatory"),
            Constraint::Prohibited => format!("{subject} is prohibited"),
            Constraint::Dependency(ids) if ids.is_empty() => {
                format!("{subject} has a dependency without any candidates to satisfy it")
            }
            Constraint::Dependency(ids) => {
                format!("{subject} requires at least one of {}", join(ids))
            }
            Constraint::Conflict(id) => format!("{subject} conflicts with {id}"),
            Constraint::AtMost { n, ids } => {
                format!("{subject} permits at most {n} of {}", join(ids))
            }
            Constraint::Or {
                operand,
                negate_subject,
                negate_operand,
            } => {
                let subject = if *negate_subject {
                    format!("not {subject}")
                } else {
                    subject.to_string()
                };
                let operand = if *negate_operand {
                    format!("not {operand}")
                } else {
                    operand.to_string()
                };
                format!("{subject} or {operand}")
            }
        }
    }
}

fn join(ids: &[Identifier]) -> String {
    ids.iter()
        .map(Identifier::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Variable values are the basic unit of problems and solutions
/// understood by this crate.
pub trait Variable {
    /// The identifier that uniquely identifies this variable among all
    /// other variables in a given problem.
    fn identifier(&self) -> &Identifier;

    /// The ordered constraints that apply to this variable.
    fn constraints(&self) -> &[Constraint];
}

/// A single constraint together with the variable it applies to; the
/// unit in which unsatisfiable cores are reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedConstraint {
    pub variable: Identifier,
    pub constraint: Constraint,
}

impl fmt::Display for AppliedConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.variable)
    }
}
