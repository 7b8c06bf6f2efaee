//! Preference-ordered search above the engine.
//!
//! The engine alone would happily return any model; this driver steers
//! it so that whenever a dependency offers ordered alternatives, the
//! earliest feasible one is taken. Dependencies are expanded
//! breadth-first (a FIFO of pending choices), alternatives are explored
//! depth-first (a LIFO of committed guesses), and every guess opens an
//! engine test scope so backtracking is a matter of popping scopes.

use std::collections::{HashSet, VecDeque};

use crate::cancel::CancelToken;
use crate::constraint::Variable;
use crate::engine::{Engine, Lit, Outcome, LIT_NULL};
use crate::litmap::LitMapping;
use crate::tracer::{SearchPosition, Tracer};

/// An ordered set of candidate literals, one of which the search will
/// assume next.
struct Choice {
    /// Index of the next unguessed candidate.
    index: usize,
    candidates: Vec<Lit>,
}

/// A committed choice, kept for backtracking.
struct Guess {
    /// The assumed literal, or null if the choice was already satisfied
    /// by an earlier assumption.
    lit: Lit,
    /// Index of the guessed literal in `candidates`.
    index: usize,
    /// Number of choices introduced by making this guess.
    children: usize,
    candidates: Vec<Lit>,
}

pub(crate) struct Search<'s, 'a, V: Variable> {
    engine: &'s mut Engine,
    litmap: &'s mut LitMapping<'a, V>,
    tracer: &'s mut (dyn Tracer + 'a),
    choices: VecDeque<Choice>,
    guesses: Vec<Guess>,
    /// Union of the non-null guessed literals, for O(1) membership.
    assumptions: HashSet<Lit>,
    outcome: Outcome,
}

impl<'s, 'a, V: Variable> Search<'s, 'a, V> {
    pub(crate) fn new(
        engine: &'s mut Engine,
        litmap: &'s mut LitMapping<'a, V>,
        tracer: &'s mut (dyn Tracer + 'a),
    ) -> Self {
        Self {
            engine,
            litmap,
            tracer,
            choices: VecDeque::new(),
            guesses: Vec::new(),
            assumptions: HashSet::new(),
            outcome: Outcome::Unknown,
        }
    }

    /// Run the search seeded with the anchor literals. Returns the
    /// final outcome together with the assumed literals, in assumption
    /// order, and the same literals as a set.
    pub(crate) fn run(
        mut self,
        cancel: &CancelToken,
        anchors: &[Lit],
    ) -> (Outcome, Vec<Lit>, HashSet<Lit>) {
        for &lit in anchors {
            self.choices.push_back(Choice {
                index: 0,
                candidates: vec![lit],
            });
        }

        loop {
            if cancel.is_cancelled() {
                log::debug!("search cancelled after {} guesses", self.guesses.len());
                while !self.guesses.is_empty() {
                    self.pop_guess();
                }
                return (Outcome::Unknown, Vec::new(), HashSet::new());
            }

            // Once all choices have been made the engine must decide,
            // so the loop knows whether to end or backtrack.
            if self.choices.is_empty() && self.outcome == Outcome::Unknown {
                self.outcome = self.engine.solve();
            }

            // Backtrack if possible, otherwise end.
            if self.outcome == Outcome::Unsatisfiable {
                let position = self.position();
                self.tracer.trace(&position);
                if self.guesses.is_empty() {
                    break;
                }
                self.pop_guess();
                continue;
            }

            // Satisfiable and no decisions left.
            if self.choices.is_empty() {
                break;
            }

            // Possibly satisfiable, keep guessing.
            self.push_guess();
        }

        let lits = self.assumed_lits();
        let set: HashSet<Lit> = lits.iter().copied().collect();
        let outcome = self.outcome;

        // Return to the initial test scope.
        while !self.guesses.is_empty() {
            self.pop_guess();
        }

        (outcome, lits, set)
    }

    fn push_guess(&mut self) {
        let choice = self.choices.pop_front().unwrap();
        let mut guess = Guess {
            lit: LIT_NULL,
            index: choice.index,
            children: 0,
            candidates: choice.candidates,
        };
        if guess.index < guess.candidates.len() {
            guess.lit = guess.candidates[guess.index];
        }

        // A choice any of whose candidates is already assumed needs no
        // assumption of its own.
        if guess
            .candidates
            .iter()
            .any(|lit| self.assumptions.contains(lit))
        {
            guess.lit = LIT_NULL;
        }

        let lit = guess.lit;
        self.guesses.push(guess);
        if lit == LIT_NULL {
            return;
        }

        // Queue a choice for every ordered constraint of the guessed
        // variable, in the order the constraints appear.
        if let Some(variable) = self.litmap.variable_of(lit) {
            for constraint in variable.constraints() {
                let order = constraint.order();
                if order.is_empty() {
                    continue;
                }
                let candidates: Vec<Lit> = order
                    .iter()
                    .map(|id| self.litmap.lit_of(id))
                    .filter(|&lit| lit != LIT_NULL)
                    .collect();
                if candidates.is_empty() {
                    // unknown references; the mapping recorded them
                    continue;
                }
                self.guesses.last_mut().unwrap().children += 1;
                self.choices.push_back(Choice {
                    index: 0,
                    candidates,
                });
            }
        }

        self.assumptions.insert(lit);
        self.engine.assume(lit);
        self.outcome = self.engine.test();
    }

    fn pop_guess(&mut self) {
        let mut guess = self.guesses.pop().unwrap();
        if guess.lit != LIT_NULL {
            self.assumptions.remove(&guess.lit);
            self.outcome = self.engine.untest();
        }
        while guess.children > 0 {
            guess.children -= 1;
            self.choices.pop_back();
        }
        let mut choice = Choice {
            index: guess.index,
            candidates: guess.candidates,
        };
        if guess.lit != LIT_NULL {
            choice.index += 1;
        }
        self.choices.push_front(choice);
    }

    fn assumed_lits(&self) -> Vec<Lit> {
        self.guesses
            .iter()
            .filter(|guess| guess.lit != LIT_NULL)
            .map(|guess| guess.lit)
            .collect()
    }

    fn position(&mut self) -> SearchPosition {
        let mut variables = Vec::new();
        for i in 0..self.guesses.len() {
            let lit = self.guesses[i].lit;
            if lit == LIT_NULL {
                continue;
            }
            if let Some(variable) = self.litmap.variable_of(lit) {
                variables.push(variable.identifier().clone());
            }
        }
        let conflicts = self.litmap.conflicts(self.engine);
        SearchPosition::new(variables, conflicts)
    }
}
