//! Translation between the input vocabulary (variables, constraints)
//! and the literals of the SAT formula.
//!
//! Construction runs two passes: the first allocates a literal per
//! variable and rejects duplicate identifiers, the second compiles each
//! constraint into a guard literal whose truth makes the constraint
//! hold. Guards are assumed rather than asserted, so a failed-assumption
//! core maps straight back to the offending constraints.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;

use crate::circuit::{CardSort, Circuit};
use crate::constraint::{AppliedConstraint, Constraint, Identifier, Variable};
use crate::engine::{Engine, Lit, LIT_NULL};
use crate::error::SolverError;

pub(crate) struct LitMapping<'a, V: Variable> {
    inorder: &'a [V],
    variables: HashMap<Lit, &'a V>,
    lits: HashMap<&'a Identifier, Lit>,
    /// Guard literal to applied constraint, in input order. The order
    /// is what makes unsatisfiable cores deterministic.
    constraints: IndexMap<Lit, AppliedConstraint>,
    circuit: Circuit,
    errs: Vec<String>,
}

impl<'a, V: Variable> LitMapping<'a, V> {
    pub(crate) fn new(variables: &'a [V]) -> Result<Self, SolverError> {
        let mut mapping = Self {
            inorder: variables,
            variables: HashMap::with_capacity(variables.len()),
            lits: HashMap::with_capacity(variables.len()),
            constraints: IndexMap::new(),
            circuit: Circuit::new(),
            errs: Vec::new(),
        };

        // First pass to assign literals.
        for variable in variables {
            let lit = mapping.circuit.fresh();
            let id = variable.identifier();
            if mapping.lits.contains_key(id) {
                return Err(SolverError::DuplicateIdentifier(id.clone()));
            }
            mapping.lits.insert(id, lit);
            mapping.variables.insert(lit, variable);
        }

        for variable in variables {
            for constraint in variable.constraints() {
                let guard = mapping.encode(variable.identifier(), constraint);
                if guard == LIT_NULL {
                    // No useful representation in the SAT inputs.
                    log::debug!(
                        "skipping constraint without encoding: {}",
                        constraint.describe(variable.identifier())
                    );
                    continue;
                }
                mapping.constraints.insert(
                    guard,
                    AppliedConstraint {
                        variable: variable.identifier().clone(),
                        constraint: constraint.clone(),
                    },
                );
            }
        }

        Ok(mapping)
    }

    /// Compile one constraint into its guard literal.
    fn encode(&mut self, subject: &Identifier, constraint: &Constraint) -> Lit {
        match constraint {
            Constraint::Mandatory => self.lit_of(subject),
            Constraint::Prohibited => -self.lit_of(subject),
            Constraint::Dependency(ids) => {
                // an empty candidate list leaves the bare negation:
                // selecting the subject becomes impossible
                let mut guard = -self.lit_of(subject);
                for id in ids {
                    let lit = self.lit_of(id);
                    guard = self.circuit.or(guard, lit);
                }
                guard
            }
            Constraint::Conflict(id) => {
                let subject = -self.lit_of(subject);
                let other = -self.lit_of(id);
                self.circuit.or(subject, other)
            }
            Constraint::AtMost { n, ids } => {
                let mut lits = Vec::with_capacity(ids.len());
                for id in ids {
                    let lit = self.lit_of(id);
                    if lit == LIT_NULL {
                        return LIT_NULL;
                    }
                    lits.push(lit);
                }
                self.circuit.card_sort(&lits).leq(*n)
            }
            Constraint::Or {
                operand,
                negate_subject,
                negate_operand,
            } => {
                let mut subject = self.lit_of(subject);
                if *negate_subject {
                    subject = -subject;
                }
                let mut operand = self.lit_of(operand);
                if *negate_operand {
                    operand = -operand;
                }
                self.circuit.or(subject, operand)
            }
        }
    }

    /// The positive literal of the variable with the given identifier,
    /// or the null literal (plus a recorded diagnostic) if the
    /// identifier is unknown.
    pub(crate) fn lit_of(&mut self, id: &Identifier) -> Lit {
        if let Some(&lit) = self.lits.get(id) {
            return lit;
        }
        self.errs
            .push(format!("variable \"{id}\" referenced but not provided"));
        LIT_NULL
    }

    /// The variable a literal stands for, if any.
    pub(crate) fn variable_of(&mut self, lit: Lit) -> Option<&'a V> {
        match self.variables.get(&lit) {
            Some(&variable) => Some(variable),
            None => {
                self.errs
                    .push(format!("no variable corresponding to literal {lit}"));
                None
            }
        }
    }

    /// The applied constraint guarded by a literal, if any.
    pub(crate) fn constraint_of(&mut self, lit: Lit) -> Option<&AppliedConstraint> {
        if self.constraints.contains_key(&lit) {
            return self.constraints.get(&lit);
        }
        self.errs
            .push(format!("no constraint corresponding to literal {lit}"));
        None
    }

    /// Teach the circuit's accumulated clauses to the engine.
    pub(crate) fn add_constraints(&mut self, engine: &mut Engine) {
        self.circuit.emit_cnf(engine);
    }

    /// Assume every guard literal so that unsatisfiable cores are
    /// expressible in terms of the original constraints.
    pub(crate) fn assume_constraints(&self, engine: &mut Engine) {
        for (&guard, _) in &self.constraints {
            engine.assume(guard);
        }
    }

    pub(crate) fn variable_count(&self) -> usize {
        self.inorder.len()
    }

    /// Identifiers of every variable carrying at least one anchor
    /// constraint, in input order.
    pub(crate) fn anchor_identifiers(&self) -> Vec<Identifier> {
        let mut ids = Vec::new();
        for variable in self.inorder {
            if variable.constraints().iter().any(Constraint::is_anchor) {
                ids.push(variable.identifier().clone());
            }
        }
        ids
    }

    /// Build a sorting network over `lits` and teach its gates to the
    /// engine, returning the handle for `at most w` probes.
    pub(crate) fn cardinality_constrainer(&mut self, engine: &mut Engine, lits: &[Lit]) -> CardSort {
        let cs = self.circuit.card_sort(lits);
        self.circuit.emit_cnf(engine);
        cs
    }

    /// The literal of every input variable, in input order.
    pub(crate) fn lits(&mut self) -> Vec<Lit> {
        let inorder = self.inorder;
        let mut lits = Vec::with_capacity(inorder.len());
        for variable in inorder {
            lits.push(self.lit_of(variable.identifier()));
        }
        lits
    }

    /// The input variables the engine's current model selects, in
    /// input order.
    pub(crate) fn variables_in_model(&mut self, engine: &Engine) -> Vec<&'a V> {
        let inorder = self.inorder;
        let mut selected = Vec::new();
        for variable in inorder {
            let lit = self.lit_of(variable.identifier());
            if lit != LIT_NULL && engine.value(lit) {
                selected.push(variable);
            }
        }
        selected
    }

    /// Map the engine's failed-assumption set back to applied
    /// constraints, in input order.
    pub(crate) fn conflicts(&mut self, engine: &Engine) -> Vec<AppliedConstraint> {
        let why: HashSet<Lit> = engine.why().iter().copied().collect();
        let guards: Vec<Lit> = self
            .constraints
            .keys()
            .filter(|guard| why.contains(*guard))
            .copied()
            .collect();
        let mut conflicts = Vec::with_capacity(guards.len());
        for guard in guards {
            if let Some(applied) = self.constraint_of(guard) {
                conflicts.push(applied.clone());
            }
        }
        conflicts
    }

    /// Every diagnostic accumulated over the mapping's lifetime,
    /// aggregated into a single error. A non-empty result likely
    /// indicates a problem with the constraint inputs.
    pub(crate) fn take_error(&mut self) -> Option<SolverError> {
        if self.errs.is_empty() {
            return None;
        }
        Some(SolverError::InconsistentMapping(std::mem::take(
            &mut self.errs,
        )))
    }
}
