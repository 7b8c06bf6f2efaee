//! The solver facade: compiles variables, runs the preference-ordered
//! search, then minimizes the number of installations beyond the
//! preferred ones.

use std::collections::HashSet;

use crate::cancel::CancelToken;
use crate::constraint::Variable;
use crate::engine::{Engine, Lit, Outcome};
use crate::error::{NotSatisfiable, Result, SolverError};
use crate::litmap::LitMapping;
use crate::search::Search;
use crate::tracer::{DefaultTracer, Tracer};

/// Resolves which of the given variables must be installed so that
/// every constraint holds, preferring earlier dependency alternatives
/// and installing as little else as possible.
///
/// A solver is built for one input set and consumed by [`Solver::solve`];
/// the compiled formula and search state live exactly that long.
pub struct Solver<'a, V: Variable> {
    litmap: LitMapping<'a, V>,
    engine: Engine,
    tracer: Box<dyn Tracer + 'a>,
}

impl<'a, V: Variable> Solver<'a, V> {
    /// Compile the input variables. Fails fast when two variables share
    /// an identifier.
    pub fn new(variables: &'a [V]) -> Result<Self> {
        Ok(Self {
            litmap: LitMapping::new(variables)?,
            engine: Engine::new(),
            tracer: Box::new(DefaultTracer),
        })
    }

    /// Observe every backtrack of the search with the given tracer.
    pub fn with_tracer(mut self, tracer: impl Tracer + 'a) -> Self {
        self.tracer = Box::new(tracer);
        self
    }

    /// Find the preferred minimal selection, or explain why none
    /// exists. Accumulated mapping diagnostics replace any result.
    pub fn solve(mut self, cancel: &CancelToken) -> Result<Vec<&'a V>> {
        let result = self.solve_inner(cancel);
        if let Some(err) = self.litmap.take_error() {
            // likely a bug in the constraint inputs; discard whatever
            // was produced
            return Err(err);
        }
        result
    }

    fn solve_inner(&mut self, cancel: &CancelToken) -> Result<Vec<&'a V>> {
        // teach all constraints to the engine
        self.litmap.add_constraints(&mut self.engine);

        // literals of all anchored variables, assumed as a baseline
        let anchor_ids = self.litmap.anchor_identifiers();
        let anchors: Vec<Lit> = anchor_ids.iter().map(|id| self.litmap.lit_of(id)).collect();

        log::debug!(
            "solving {} variables, {} anchors",
            self.litmap.variable_count(),
            anchors.len()
        );

        // assume that all constraints hold, and push a test scope so
        // the baseline assumptions survive the search
        self.litmap.assume_constraints(&mut self.engine);
        for &lit in &anchors {
            self.engine.assume(lit);
        }
        let mut outcome = self.engine.test();

        let mut picked = anchors.clone();
        let mut picked_set = HashSet::new();
        if outcome == Outcome::Unknown {
            // search in input order so dependency preferences are
            // honored
            let search = Search::new(&mut self.engine, &mut self.litmap, self.tracer.as_mut());
            let (search_outcome, lits, set) = search.run(cancel, &anchors);
            outcome = search_outcome;
            picked = lits;
            picked_set = set;
        }

        match outcome {
            Outcome::Satisfiable => self.minimize(cancel, &picked, &picked_set),
            Outcome::Unsatisfiable => Err(SolverError::NotSatisfiable(NotSatisfiable(
                self.litmap.conflicts(&self.engine),
            ))),
            Outcome::Unknown => Err(SolverError::Incomplete),
        }
    }

    /// With a preference-correct model in hand, pin its exclusions and
    /// tighten a cardinality bound over the remaining true literals
    /// until the smallest feasible count is found.
    fn minimize(
        &mut self,
        cancel: &CancelToken,
        picked: &[Lit],
        picked_set: &HashSet<Lit>,
    ) -> Result<Vec<&'a V>> {
        let mut extras = Vec::new();
        let mut excluded = Vec::new();
        for lit in self.litmap.lits() {
            if picked_set.contains(&lit) {
                continue;
            }
            if !self.engine.value(lit) {
                excluded.push(-lit);
            } else {
                extras.push(lit);
            }
        }
        log::debug!(
            "model found: {} picked, {} extras, {} excluded",
            picked.len(),
            extras.len(),
            excluded.len()
        );

        // the network must be taught outside any test scope
        self.engine.untest();
        let cs = self
            .litmap
            .cardinality_constrainer(&mut self.engine, &extras);

        for &lit in picked {
            self.engine.assume(lit);
        }
        for &lit in &excluded {
            self.engine.assume(lit);
        }
        self.litmap.assume_constraints(&mut self.engine);
        self.engine.test();

        for bound in 0..=cs.n() {
            if cancel.is_cancelled() {
                return Err(SolverError::Incomplete);
            }
            self.engine.assume(cs.leq(bound));
            if self.engine.solve() == Outcome::Satisfiable {
                log::debug!("minimum feasible extra count: {bound}");
                return Ok(self.litmap.variables_in_model(&self.engine));
            }
        }

        // something is wrong if no bound admits a model after one was
        // already found
        Err(SolverError::Internal(
            "cardinality minimization found no feasible bound".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::constraint::{AppliedConstraint, Constraint, Identifier};
    use crate::tracer::SearchPosition;

    #[derive(Debug)]
    struct TestVariable {
        id: Identifier,
        constraints: Vec<Constraint>,
    }

    impl Variable for TestVariable {
        fn identifier(&self) -> &Identifier {
            &self.id
        }

        fn constraints(&self) -> &[Constraint] {
            &self.constraints
        }
    }

    fn variable(id: &str, constraints: Vec<Constraint>) -> TestVariable {
        TestVariable {
            id: id.into(),
            constraints,
        }
    }

    fn dependency(ids: &[&str]) -> Constraint {
        Constraint::Dependency(ids.iter().map(|&id| id.into()).collect())
    }

    fn at_most(n: usize, ids: &[&str]) -> Constraint {
        Constraint::AtMost {
            n,
            ids: ids.iter().map(|&id| id.into()).collect(),
        }
    }

    fn applied(id: &str, constraint: Constraint) -> AppliedConstraint {
        AppliedConstraint {
            variable: id.into(),
            constraint,
        }
    }

    /// Solve and return the selected identifiers, in input order.
    fn solve(variables: &[TestVariable]) -> Result<Vec<Identifier>> {
        let solver = Solver::new(variables)?;
        let selected = solver.solve(&CancelToken::new())?;
        Ok(selected
            .iter()
            .map(|variable| variable.identifier().clone())
            .collect())
    }

    fn ids(list: &[&str]) -> Vec<Identifier> {
        list.iter().map(|&id| id.into()).collect()
    }

    fn unsat_core(variables: &[TestVariable]) -> Vec<AppliedConstraint> {
        match solve(variables) {
            Err(SolverError::NotSatisfiable(NotSatisfiable(core))) => core,
            other => panic!("expected NotSatisfiable, got {other:?}"),
        }
    }

    #[test]
    fn test_no_variables() {
        assert_eq!(solve(&[]).unwrap(), ids(&[]));
    }

    #[test]
    fn test_unnecessary_variable_is_not_installed() {
        let input = vec![variable("a", vec![])];
        assert_eq!(solve(&input).unwrap(), ids(&[]));
    }

    #[test]
    fn test_single_mandatory_variable_is_installed() {
        let input = vec![variable("a", vec![Constraint::Mandatory])];
        assert_eq!(solve(&input).unwrap(), ids(&["a"]));
    }

    #[test]
    fn test_both_mandatory_and_prohibited_produce_error() {
        let input = vec![variable(
            "a",
            vec![Constraint::Mandatory, Constraint::Prohibited],
        )];
        assert_eq!(
            unsat_core(&input),
            vec![
                applied("a", Constraint::Mandatory),
                applied("a", Constraint::Prohibited),
            ]
        );
    }

    #[test]
    fn test_dependency_is_installed() {
        let input = vec![
            variable("a", vec![]),
            variable("b", vec![Constraint::Mandatory, dependency(&["a"])]),
        ];
        assert_eq!(solve(&input).unwrap(), ids(&["a", "b"]));
    }

    #[test]
    fn test_transitive_dependency_is_installed() {
        let input = vec![
            variable("a", vec![]),
            variable("b", vec![dependency(&["a"])]),
            variable("c", vec![Constraint::Mandatory, dependency(&["b"])]),
        ];
        assert_eq!(solve(&input).unwrap(), ids(&["a", "b", "c"]));
    }

    #[test]
    fn test_both_dependencies_are_installed() {
        let input = vec![
            variable("a", vec![]),
            variable("b", vec![]),
            variable(
                "c",
                vec![Constraint::Mandatory, dependency(&["a"]), dependency(&["b"])],
            ),
        ];
        assert_eq!(solve(&input).unwrap(), ids(&["a", "b", "c"]));
    }

    #[test]
    fn test_solution_with_first_dependency_is_selected() {
        let input = vec![
            variable("a", vec![]),
            variable("b", vec![Constraint::Conflict("a".into())]),
            variable("c", vec![Constraint::Mandatory, dependency(&["a", "b"])]),
        ];
        assert_eq!(solve(&input).unwrap(), ids(&["a", "c"]));
    }

    #[test]
    fn test_solution_with_only_first_dependency_is_selected() {
        let input = vec![
            variable("a", vec![]),
            variable("b", vec![]),
            variable("c", vec![Constraint::Mandatory, dependency(&["a", "b"])]),
        ];
        assert_eq!(solve(&input).unwrap(), ids(&["a", "c"]));
    }

    #[test]
    fn test_solution_with_first_dependency_is_selected_reverse() {
        let input = vec![
            variable("a", vec![]),
            variable("b", vec![Constraint::Conflict("a".into())]),
            variable("c", vec![Constraint::Mandatory, dependency(&["b", "a"])]),
        ];
        assert_eq!(solve(&input).unwrap(), ids(&["b", "c"]));
    }

    #[test]
    fn test_two_mandatory_but_conflicting_variables() {
        let input = vec![
            variable("a", vec![Constraint::Mandatory]),
            variable(
                "b",
                vec![Constraint::Mandatory, Constraint::Conflict("a".into())],
            ),
        ];
        assert_eq!(
            unsat_core(&input),
            vec![
                applied("a", Constraint::Mandatory),
                applied("b", Constraint::Mandatory),
                applied("b", Constraint::Conflict("a".into())),
            ]
        );
    }

    #[test]
    fn test_irrelevant_dependencies_do_not_influence_search_order() {
        let input = vec![
            variable("a", vec![dependency(&["x", "y"])]),
            variable("b", vec![Constraint::Mandatory, dependency(&["y", "x"])]),
            variable("x", vec![]),
            variable("y", vec![]),
        ];
        assert_eq!(solve(&input).unwrap(), ids(&["b", "y"]));
    }

    #[test]
    fn test_cardinality_constraint_prevents_resolution() {
        let input = vec![
            variable(
                "a",
                vec![
                    Constraint::Mandatory,
                    dependency(&["x", "y"]),
                    at_most(1, &["x", "y"]),
                ],
            ),
            variable("x", vec![Constraint::Mandatory]),
            variable("y", vec![Constraint::Mandatory]),
        ];
        assert_eq!(
            unsat_core(&input),
            vec![
                applied("a", at_most(1, &["x", "y"])),
                applied("x", Constraint::Mandatory),
                applied("y", Constraint::Mandatory),
            ]
        );
    }

    #[test]
    fn test_cardinality_constraint_forces_alternative() {
        let input = vec![
            variable(
                "a",
                vec![
                    Constraint::Mandatory,
                    dependency(&["x", "y"]),
                    at_most(1, &["x", "y"]),
                ],
            ),
            variable("b", vec![Constraint::Mandatory, dependency(&["y"])]),
            variable("x", vec![]),
            variable("y", vec![]),
        ];
        assert_eq!(solve(&input).unwrap(), ids(&["a", "b", "y"]));
    }

    #[test]
    fn test_at_most_with_generous_bound_is_a_no_op() {
        let input = vec![
            variable(
                "a",
                vec![
                    Constraint::Mandatory,
                    dependency(&["x"]),
                    dependency(&["y"]),
                    at_most(2, &["x", "y"]),
                ],
            ),
            variable("x", vec![]),
            variable("y", vec![]),
        ];
        assert_eq!(solve(&input).unwrap(), ids(&["a", "x", "y"]));
    }

    #[test]
    fn test_two_dependencies_satisfied_by_one_variable() {
        let input = vec![
            variable("a", vec![Constraint::Mandatory, dependency(&["y"])]),
            variable("b", vec![Constraint::Mandatory, dependency(&["x", "y"])]),
            variable("x", vec![]),
            variable("y", vec![]),
        ];
        assert_eq!(solve(&input).unwrap(), ids(&["a", "b", "y"]));
    }

    #[test]
    fn test_later_dependencies_satisfied_by_one_variable() {
        let input = vec![
            variable("a", vec![Constraint::Mandatory, dependency(&["y", "z", "m"])]),
            variable("b", vec![Constraint::Mandatory, dependency(&["x", "y"])]),
            variable("x", vec![]),
            variable("y", vec![]),
            variable("z", vec![]),
            variable("m", vec![]),
        ];
        assert_eq!(solve(&input).unwrap(), ids(&["a", "b", "y"]));
    }

    #[test]
    fn test_result_larger_than_minimum_due_to_preference() {
        let input = vec![
            variable("a", vec![Constraint::Mandatory, dependency(&["x", "y"])]),
            variable("b", vec![Constraint::Mandatory, dependency(&["y"])]),
            variable("x", vec![]),
            variable("y", vec![]),
        ];
        // a preferred x before b forced y; the preferred pick is kept
        // even though {a, b, y} would be smaller
        assert_eq!(solve(&input).unwrap(), ids(&["a", "b", "x", "y"]));
    }

    #[test]
    fn test_only_the_least_preferable_choice_is_acceptable() {
        let input = vec![
            variable("a", vec![Constraint::Mandatory, dependency(&["a1", "a2"])]),
            variable(
                "a1",
                vec![
                    Constraint::Conflict("c1".into()),
                    Constraint::Conflict("c2".into()),
                ],
            ),
            variable("a2", vec![Constraint::Conflict("c1".into())]),
            variable("b", vec![Constraint::Mandatory, dependency(&["b1", "b2"])]),
            variable(
                "b1",
                vec![
                    Constraint::Conflict("c1".into()),
                    Constraint::Conflict("c2".into()),
                ],
            ),
            variable("b2", vec![Constraint::Conflict("c1".into())]),
            variable("c", vec![Constraint::Mandatory, dependency(&["c1", "c2"])]),
            variable("c1", vec![]),
            variable("c2", vec![]),
        ];
        assert_eq!(
            solve(&input).unwrap(),
            ids(&["a", "a2", "b", "b2", "c", "c2"])
        );
    }

    #[test]
    fn test_preferences_respected_with_multiple_dependencies_per_variable() {
        let input = vec![
            variable(
                "a",
                vec![
                    Constraint::Mandatory,
                    dependency(&["x1", "x2"]),
                    dependency(&["y1", "y2"]),
                ],
            ),
            variable("x1", vec![]),
            variable("x2", vec![]),
            variable("y1", vec![]),
            variable("y2", vec![]),
        ];
        assert_eq!(solve(&input).unwrap(), ids(&["a", "x1", "y1"]));
    }

    #[test]
    fn test_empty_dependency_prohibits_its_subject() {
        let input = vec![variable(
            "a",
            vec![Constraint::Mandatory, dependency(&[])],
        )];
        assert_eq!(
            unsat_core(&input),
            vec![
                applied("a", Constraint::Mandatory),
                applied("a", dependency(&[])),
            ]
        );
    }

    #[test]
    fn test_or_negates_the_subject_as_declared() {
        // not-b or a reads as "b implies a": installing b drags a in
        let input = vec![
            variable("a", vec![]),
            variable(
                "b",
                vec![
                    Constraint::Mandatory,
                    Constraint::Or {
                        operand: "a".into(),
                        negate_subject: true,
                        negate_operand: false,
                    },
                ],
            ),
        ];
        assert_eq!(solve(&input).unwrap(), ids(&["a", "b"]));
    }

    #[test]
    fn test_unknown_reference_surfaces_mapping_error() {
        let input = vec![variable(
            "a",
            vec![Constraint::Mandatory, dependency(&["missing"])],
        )];
        match solve(&input) {
            Err(SolverError::InconsistentMapping(errs)) => {
                assert!(errs.iter().any(|err| err.contains("missing")));
            }
            other => panic!("expected mapping error, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_identifier_fails_construction() {
        let input = vec![variable("a", vec![]), variable("a", vec![])];
        match Solver::new(&input) {
            Err(SolverError::DuplicateIdentifier(id)) => assert_eq!(id, "a".into()),
            Err(other) => panic!("unexpected error {other:?}"),
            Ok(_) => panic!("expected duplicate identifier error"),
        };
    }

    #[test]
    fn test_cancellation_yields_incomplete() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let input = vec![variable("a", vec![Constraint::Mandatory])];
        let solver = Solver::new(&input).unwrap();
        match solver.solve(&cancel) {
            Err(SolverError::Incomplete) => {}
            other => panic!("expected incomplete, got {other:?}"),
        }
    }

    struct CountingTracer(Rc<Cell<usize>>);

    impl Tracer for CountingTracer {
        fn trace(&mut self, _position: &SearchPosition) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn test_tracer_observes_backtracking() {
        // the preferred alternative conflicts with another mandatory
        // pick, so the search has to back out of it at least once
        let input = vec![
            variable("a", vec![Constraint::Mandatory, dependency(&["a1", "a2"])]),
            variable("a1", vec![Constraint::Conflict("c1".into())]),
            variable("a2", vec![]),
            variable("c", vec![Constraint::Mandatory, dependency(&["c1", "c2"])]),
            variable("c1", vec![]),
            variable("c2", vec![]),
        ];
        let count = Rc::new(Cell::new(0));
        let solver = Solver::new(&input)
            .unwrap()
            .with_tracer(CountingTracer(Rc::clone(&count)));
        let selected = solver.solve(&CancelToken::new()).unwrap();
        let selected: Vec<Identifier> = selected
            .iter()
            .map(|variable| variable.identifier().clone())
            .collect();
        assert_eq!(selected, ids(&["a", "a1", "c", "c2"]));
        assert!(count.get() > 0, "expected at least one backtrack");
    }

    #[test]
    fn test_identical_inputs_solve_identically() {
        let build = || {
            vec![
                variable("a", vec![Constraint::Mandatory, dependency(&["a1", "a2"])]),
                variable("a1", vec![Constraint::Conflict("c1".into())]),
                variable("a2", vec![]),
                variable("c", vec![Constraint::Mandatory, dependency(&["c1", "c2"])]),
                variable("c1", vec![]),
                variable("c2", vec![]),
            ]
        };
        let first = solve(&build()).unwrap();
        let second = solve(&build()).unwrap();
        assert_eq!(first, second);

        let conflicting = || {
            vec![
                variable("a", vec![Constraint::Mandatory]),
                variable(
                    "b",
                    vec![Constraint::Mandatory, Constraint::Conflict("a".into())],
                ),
            ]
        };
        assert_eq!(unsat_core(&conflicting()), unsat_core(&conflicting()));
    }
}
