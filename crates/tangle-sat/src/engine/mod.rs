//! A conflict-driven clause-learning engine with scoped assumptions.
//!
//! The engine exposes the surface the layers above need and nothing
//! more: clauses are taught with [`Engine::add_clause`], assumptions are
//! queued with [`Engine::assume`] and either consumed by the next
//! [`Engine::solve`] or frozen into a scope by [`Engine::test`] until the
//! matching [`Engine::untest`]. After an unsatisfiable outcome,
//! [`Engine::why`] names the assumptions responsible; after a satisfiable
//! one, [`Engine::value`] reads the model.
//!
//! `test` and `untest` re-derive the engine's status from the scope
//! stack by unit propagation alone, so `Unknown` is a common and valid
//! answer; only `solve` performs a full search.

mod assignment;
mod branching;
mod restart;

use assignment::{Assignment, Reason};
use branching::Chooser;
use restart::Luby;

pub(crate) type Lit = i32;
pub(crate) type Var = usize;

/// The sentinel literal: never assigned, never watched, silently
/// dropped by [`Engine::assume`].
pub(crate) const LIT_NULL: Lit = 0;

pub(crate) fn var_of(lit: Lit) -> Var {
    debug_assert_ne!(lit, LIT_NULL);
    lit.unsigned_abs() as Var
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Satisfiable,
    Unsatisfiable,
    Unknown,
}

/// Watch lists indexed by literal, two watches per clause. The watched
/// literals of a clause are kept at positions 0 and 1 (implicit
/// watches).
struct Watches {
    lists: Vec<Vec<usize>>,
}

impl Watches {
    fn new() -> Self {
        Self { lists: Vec::new() }
    }

    fn grow(&mut self, nvars: usize) {
        if self.lists.len() < 2 * nvars + 1 {
            self.lists.resize(2 * nvars + 1, Vec::new());
        }
    }

    fn position(lit: Lit) -> usize {
        2 * var_of(lit) - lit.is_negative() as usize
    }

    fn get(&self, lit: Lit) -> &Vec<usize> {
        &self.lists[Self::position(lit)]
    }

    fn get_mut(&mut self, lit: Lit) -> &mut Vec<usize> {
        &mut self.lists[Self::position(lit)]
    }
}

pub(crate) struct Engine {
    clauses: Vec<Vec<Lit>>,
    /// Indices of single-literal clauses, original and learned.
    units: Vec<usize>,
    has_empty: bool,
    watches: Watches,
    assignment: Assignment,
    prop_head: usize,
    chooser: Chooser,
    seen: Vec<bool>,
    /// Assumptions frozen by `test`, flattened; `scope_marks` holds the
    /// length of this vector at each `test`.
    scoped: Vec<Lit>,
    scope_marks: Vec<usize>,
    /// Assumptions queued since the last `solve`/`test`.
    pending: Vec<Lit>,
    /// Model of the last satisfiable outcome, indexed by variable.
    model: Vec<bool>,
    /// Failed assumptions of the last unsatisfiable outcome.
    core: Vec<Lit>,
    status: Outcome,
    nvars: usize,
}

impl Engine {
    pub(crate) fn new() -> Self {
        Self {
            clauses: Vec::new(),
            units: Vec::new(),
            has_empty: false,
            watches: Watches::new(),
            assignment: Assignment::new(),
            prop_head: 0,
            chooser: Chooser::new(),
            seen: vec![false],
            scoped: Vec::new(),
            scope_marks: Vec::new(),
            pending: Vec::new(),
            model: Vec::new(),
            core: Vec::new(),
            status: Outcome::Unknown,
            nvars: 0,
        }
    }

    /// Make the engine aware of variables `1..=nvars` even if no clause
    /// mentions them yet; they take part in models.
    pub(crate) fn reserve(&mut self, nvars: usize) {
        if nvars <= self.nvars {
            return;
        }
        self.nvars = nvars;
        self.watches.grow(nvars);
        self.assignment.grow(nvars);
        self.chooser.grow(nvars);
        self.seen.resize(nvars + 1, false);
    }

    pub(crate) fn add_clause(&mut self, clause: Vec<Lit>) {
        debug_assert!(clause.iter().all(|&lit| lit != LIT_NULL));
        if let Some(max) = clause.iter().map(|&lit| var_of(lit)).max() {
            self.reserve(max);
        }
        let index = self.clauses.len();
        match clause.len() {
            0 => self.has_empty = true,
            1 => {
                self.clauses.push(clause);
                self.units.push(index);
            }
            _ => {
                self.watches.get_mut(clause[0]).push(index);
                self.watches.get_mut(clause[1]).push(index);
                self.clauses.push(clause);
            }
        }
    }

    /// Queue an assumption for the next `solve` or `test`. The null
    /// literal is dropped; callers record that condition themselves.
    pub(crate) fn assume(&mut self, lit: Lit) {
        if lit == LIT_NULL {
            return;
        }
        self.reserve(var_of(lit));
        self.pending.push(lit);
    }

    /// Freeze the queued assumptions into a new scope and report what
    /// unit propagation alone can conclude under every scoped
    /// assumption.
    pub(crate) fn test(&mut self) -> Outcome {
        self.scope_marks.push(self.scoped.len());
        let mut pending = std::mem::take(&mut self.pending);
        self.scoped.append(&mut pending);
        self.check()
    }

    /// Discard the innermost scope and re-derive the engine's status
    /// from the scopes that remain.
    pub(crate) fn untest(&mut self) -> Outcome {
        if let Some(mark) = self.scope_marks.pop() {
            self.scoped.truncate(mark);
        }
        self.check()
    }

    /// Decide the formula under all scoped plus queued assumptions,
    /// consuming the queued ones.
    pub(crate) fn solve(&mut self) -> Outcome {
        let mut assumptions = self.scoped.clone();
        assumptions.append(&mut self.pending);
        self.search(&assumptions)
    }

    /// The failed assumptions recorded by the last unsatisfiable
    /// outcome.
    pub(crate) fn why(&self) -> &[Lit] {
        &self.core
    }

    /// The value of `lit` in the most recent satisfying model.
    /// Variables the engine has never seen read as false.
    pub(crate) fn value(&self, lit: Lit) -> bool {
        let value = self.model.get(var_of(lit)).copied().unwrap_or(false);
        if lit.is_positive() {
            value
        } else {
            !value
        }
    }

    /// Rebuild the root level: clear the trail, replay unit clauses and
    /// close under propagation. False on a root-level conflict.
    fn rebuild_root(&mut self) -> bool {
        self.assignment.clear();
        self.prop_head = 0;
        for i in 0..self.units.len() {
            let index = self.units[i];
            let lit = self.clauses[index][0];
            match self.assignment.eval(lit) {
                Some(true) => {}
                Some(false) => return false,
                None => self
                    .assignment
                    .set(lit, Reason::Propagation { clause: index }),
            }
        }
        self.propagate().is_none()
    }

    /// Propagation-only status check under the scoped assumptions.
    fn check(&mut self) -> Outcome {
        if self.has_empty || !self.rebuild_root() {
            self.core.clear();
            self.status = Outcome::Unsatisfiable;
            return self.status;
        }
        for i in 0..self.scoped.len() {
            let lit = self.scoped[i];
            match self.assignment.eval(lit) {
                Some(true) => {}
                Some(false) => {
                    self.core = self.analyze_final_lit(lit);
                    self.status = Outcome::Unsatisfiable;
                    return self.status;
                }
                None => {
                    self.assignment.new_level();
                    self.assignment.set(lit, Reason::Decision);
                    if let Some(conflict) = self.propagate() {
                        self.core = self.analyze_final_clause(conflict);
                        self.status = Outcome::Unsatisfiable;
                        return self.status;
                    }
                }
            }
        }
        self.status = if self.assignment.assigned() == self.nvars {
            self.save_model();
            Outcome::Satisfiable
        } else {
            Outcome::Unknown
        };
        self.status
    }

    /// Full CDCL search under the given assumptions, placed as the
    /// leading decision levels so failed cores stay expressible in
    /// terms of them.
    fn search(&mut self, assumptions: &[Lit]) -> Outcome {
        if self.has_empty || !self.rebuild_root() {
            self.core.clear();
            self.status = Outcome::Unsatisfiable;
            return self.status;
        }

        let mut conflicts = 0usize;
        let mut restarts = Luby::new(32);
        let mut threshold = restarts.next().unwrap();

        loop {
            if let Some(conflict) = self.propagate() {
                if self.assignment.current_level() == 0 {
                    self.core.clear();
                    self.status = Outcome::Unsatisfiable;
                    return self.status;
                }
                conflicts += 1;
                let (learnt, bt_level) = self.analyze(conflict);
                self.assignment.backtrack_to(bt_level);
                self.prop_head = self.assignment.assigned();

                let assert_lit = learnt[0];
                let index = self.clauses.len();
                if learnt.len() == 1 {
                    self.units.push(index);
                } else {
                    self.watches.get_mut(learnt[0]).push(index);
                    self.watches.get_mut(learnt[1]).push(index);
                }
                self.clauses.push(learnt);
                self.assignment
                    .set(assert_lit, Reason::Propagation { clause: index });
                continue;
            }

            if conflicts >= threshold {
                conflicts = 0;
                threshold = restarts.next().unwrap();
                if self.assignment.current_level() > 0 {
                    self.assignment.backtrack_to(0);
                    self.prop_head = self.assignment.assigned();
                }
            }

            // Assumptions occupy the leading decision levels, one level
            // per assumption, already-satisfied ones holding an empty
            // placeholder level so positions stay aligned.
            let level = self.assignment.current_level();
            if level < assumptions.len() {
                let lit = assumptions[level];
                match self.assignment.eval(lit) {
                    Some(true) => self.assignment.new_level(),
                    Some(false) => {
                        self.core = self.analyze_final_lit(lit);
                        self.status = Outcome::Unsatisfiable;
                        return self.status;
                    }
                    None => {
                        self.assignment.new_level();
                        self.assignment.set(lit, Reason::Decision);
                    }
                }
            } else if let Some(var) = self.chooser.choose(&self.assignment) {
                self.assignment.new_level();
                self.assignment.set(-(var as Lit), Reason::Decision);
            } else {
                self.save_model();
                self.status = Outcome::Satisfiable;
                return self.status;
            }
        }
    }

    fn propagate(&mut self) -> Option<usize> {
        while self.prop_head < self.assignment.trail.len() {
            let lit = -self.assignment.trail[self.prop_head];

            let mut i = 0;
            'clause: while i < self.watches.get(lit).len() {
                let index = self.watches.get(lit)[i];
                let clause = &mut self.clauses[index];

                if clause[1] != lit {
                    clause.swap(0, 1);
                }
                debug_assert_eq!(clause[1], lit);

                for j in 0..clause.len() {
                    match self.assignment.eval(clause[j]) {
                        Some(true) => {
                            i += 1;
                            continue 'clause;
                        }
                        None if j != 0 => {
                            clause.swap(1, j);
                            let new_watch = clause[1];
                            self.watches.get_mut(lit).swap_remove(i);
                            self.watches.get_mut(new_watch).push(index);
                            continue 'clause;
                        }
                        _ => {}
                    }
                }

                if self.assignment.eval(clause[0]).is_none() {
                    let unit = clause[0];
                    self.assignment
                        .set(unit, Reason::Propagation { clause: index });
                } else {
                    return Some(index);
                }

                i += 1;
            }

            self.prop_head += 1;
        }

        None
    }

    /// First-UIP conflict analysis. Returns the learned clause with the
    /// asserting literal first and the highest remaining level second,
    /// plus the level to backtrack to.
    fn analyze(&mut self, conflict: usize) -> (Vec<Lit>, usize) {
        let current = self.assignment.current_level();
        let mut learnt: Vec<Lit> = vec![LIT_NULL];
        let mut counter = 0usize;
        let mut resolved = LIT_NULL;
        let mut index = self.assignment.trail.len();
        let mut clause_index = conflict;

        loop {
            for j in 0..self.clauses[clause_index].len() {
                let q = self.clauses[clause_index][j];
                if q == resolved {
                    continue;
                }
                let var = var_of(q);
                let level = self.assignment.level_of(q).unwrap();
                if !self.seen[var] && level > 0 {
                    self.seen[var] = true;
                    self.chooser.touch(var);
                    if level >= current {
                        counter += 1;
                    } else {
                        learnt.push(q);
                    }
                }
            }

            loop {
                index -= 1;
                if self.seen[var_of(self.assignment.trail[index])] {
                    break;
                }
            }
            resolved = self.assignment.trail[index];
            self.seen[var_of(resolved)] = false;
            counter -= 1;
            if counter == 0 {
                break;
            }
            clause_index = match self.assignment.reason_of(resolved) {
                Some(Reason::Propagation { clause }) => clause,
                _ => unreachable!("resolved literal must have a reason clause"),
            };
        }

        learnt[0] = -resolved;
        for i in 1..learnt.len() {
            self.seen[var_of(learnt[i])] = false;
        }

        let bt_level = if learnt.len() == 1 {
            0
        } else {
            let mut max = 1;
            for i in 2..learnt.len() {
                if self.assignment.level_of(learnt[i]) > self.assignment.level_of(learnt[max]) {
                    max = i;
                }
            }
            learnt.swap(1, max);
            self.assignment.level_of(learnt[1]).unwrap()
        };

        self.chooser.rescale();
        (learnt, bt_level)
    }

    /// Which assumptions imply the falsification of `lit`? Every
    /// decision on the trail is an assumption when this runs.
    fn analyze_final_lit(&mut self, lit: Lit) -> Vec<Lit> {
        self.seen[var_of(lit)] = true;
        let mut core = vec![lit];
        self.collect_assumptions(&mut core);
        core
    }

    /// Which assumptions are responsible for the given falsified
    /// clause?
    fn analyze_final_clause(&mut self, conflict: usize) -> Vec<Lit> {
        for j in 0..self.clauses[conflict].len() {
            let q = self.clauses[conflict][j];
            if self.assignment.level_of(q).unwrap_or(0) > 0 {
                self.seen[var_of(q)] = true;
            }
        }
        let mut core = Vec::new();
        self.collect_assumptions(&mut core);
        core
    }

    fn collect_assumptions(&mut self, core: &mut Vec<Lit>) {
        for i in (0..self.assignment.trail.len()).rev() {
            let lit = self.assignment.trail[i];
            let var = var_of(lit);
            if !self.seen[var] {
                continue;
            }
            self.seen[var] = false;
            match self.assignment.reason_of(lit) {
                Some(Reason::Decision) => core.push(lit),
                Some(Reason::Propagation { clause }) => {
                    for j in 0..self.clauses[clause].len() {
                        let q = self.clauses[clause][j];
                        if q != lit && self.assignment.level_of(q).unwrap_or(0) > 0 {
                            self.seen[var_of(q)] = true;
                        }
                    }
                }
                None => {}
            }
        }
    }

    fn save_model(&mut self) {
        self.model = vec![false; self.nvars + 1];
        for &lit in &self.assignment.trail {
            if lit.is_positive() {
                self.model[var_of(lit)] = true;
            }
        }
    }
}
