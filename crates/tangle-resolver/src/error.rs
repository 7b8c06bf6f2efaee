use thiserror::Error;

use tangle_sat::SolverError;

#[derive(Error, Debug)]
pub enum ResolveError {
    /// The core solver rejected the input or found it unsatisfiable.
    #[error(transparent)]
    Solver(#[from] SolverError),

    /// A constraint generator could not produce its variables.
    #[error("constraint generation failed: {0}")]
    Generator(String),
}

pub type Result<T> = std::result::Result<T, ResolveError>;
