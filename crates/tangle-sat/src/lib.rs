//! Installation-constraint solving over a universe of named variables.
//!
//! Callers describe candidate installations as [`Variable`]s, each
//! carrying typed [`Constraint`]s relating it to others. [`Solver`]
//! compiles the constraints into a propositional formula, searches for a
//! satisfying selection that honors declared dependency preferences, and
//! then minimizes the number of installations beyond the preferred ones.
//! An infeasible input yields [`NotSatisfiable`] with the ordered list of
//! constraints that clash.

pub mod cancel;
pub mod constraint;
pub mod error;
pub mod solve;
pub mod tracer;

mod circuit;
mod engine;
mod litmap;
mod search;

pub use cancel::CancelToken;
pub use constraint::{AppliedConstraint, Constraint, Identifier, Variable};
pub use error::{NotSatisfiable, Result, SolverError};
pub use solve::Solver;
pub use tracer::{DefaultTracer, LoggingTracer, SearchPosition, Tracer};
