use std::fmt;

use thiserror::Error;

use crate::constraint::{AppliedConstraint, Identifier};

/// The ordered unsatisfiable core: the applied constraints whose
/// simultaneous assumption the engine found inconsistent, in input
/// order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotSatisfiable(pub Vec<AppliedConstraint>);

impl fmt::Display for NotSatisfiable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const MSG: &str = "constraints not satisfiable";
        if self.0.is_empty() {
            return f.write_str(MSG);
        }
        let subjects = self
            .0
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{MSG}: {subjects}")
    }
}

#[derive(Error, Debug)]
pub enum SolverError {
    /// Two input variables share an identifier. Reported at
    /// construction; no solve runs.
    #[error("duplicate identifier \"{0}\" in input")]
    DuplicateIdentifier(Identifier),

    /// Constraints referenced identifiers not present in the variable
    /// set, or the engine was asked about an unmapped literal.
    /// Aggregated across the solve and returned in lieu of any result.
    #[error("{} errors encountered: {}", .0.len(), .0.join(", "))]
    InconsistentMapping(Vec<String>),

    /// No assignment satisfies the constraints; carries the ordered
    /// unsatisfiable core.
    #[error("{0}")]
    NotSatisfiable(NotSatisfiable),

    /// The caller cancelled before a decision was reached.
    #[error("cancelled before a solution could be found")]
    Incomplete,

    /// A state the solver should never reach; indicates a bug in the
    /// circuit or the engine.
    #[error("internal solver failure: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, SolverError>;
