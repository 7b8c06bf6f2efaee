use std::io::Write;

use crate::constraint::{AppliedConstraint, Identifier};

/// A snapshot of the search at a backtrack point: the variables assumed
/// on the way here and the constraints the engine found inconsistent.
#[derive(Debug, Clone)]
pub struct SearchPosition {
    variables: Vec<Identifier>,
    conflicts: Vec<AppliedConstraint>,
}

impl SearchPosition {
    pub(crate) fn new(variables: Vec<Identifier>, conflicts: Vec<AppliedConstraint>) -> Self {
        Self {
            variables,
            conflicts,
        }
    }

    /// Identifiers of the currently assumed variables, in assumption
    /// order.
    pub fn variables(&self) -> &[Identifier] {
        &self.variables
    }

    /// The applied-constraint core at this node, in input order.
    pub fn conflicts(&self) -> &[AppliedConstraint] {
        &self.conflicts
    }
}

/// Observes the search every time it backtracks out of an
/// unsatisfiable node.
pub trait Tracer {
    fn trace(&mut self, position: &SearchPosition);
}

/// The default tracer ignores every position.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTracer;

impl Tracer for DefaultTracer {
    fn trace(&mut self, _position: &SearchPosition) {}
}

/// Writes every backtrack position to the wrapped sink.
pub struct LoggingTracer<W: Write> {
    writer: W,
}

impl<W: Write> LoggingTracer<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Tracer for LoggingTracer<W> {
    fn trace(&mut self, position: &SearchPosition) {
        // sink failures are not the solver's problem
        let _ = writeln!(self.writer, "---\nAssumptions:");
        for id in position.variables() {
            let _ = writeln!(self.writer, "- {id}");
        }
        let _ = writeln!(self.writer, "Conflicts:");
        for applied in position.conflicts() {
            let _ = writeln!(
                self.writer,
                "- {}",
                applied.constraint.describe(&applied.variable)
            );
        }
    }
}
