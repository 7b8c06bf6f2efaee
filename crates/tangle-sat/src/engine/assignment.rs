use super::{var_of, Lit};

/// Why a literal is on the trail.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Reason {
    Decision,
    Propagation { clause: usize },
}

#[derive(Clone)]
struct VarData {
    value: bool,
    level: usize,
    reason: Reason,
}

/// The assignment trail: current variable values plus the
/// decision-level bookkeeping needed to undo them.
pub(crate) struct Assignment {
    data: Vec<Option<VarData>>,
    pub(crate) trail: Vec<Lit>,
    /// `levels[i]` is the trail length at the moment level `i + 1` began.
    levels: Vec<usize>,
}

impl Assignment {
    pub(crate) fn new() -> Self {
        Self {
            data: vec![None],
            trail: Vec::new(),
            levels: Vec::new(),
        }
    }

    pub(crate) fn grow(&mut self, nvars: usize) {
        if self.data.len() < nvars + 1 {
            self.data.resize(nvars + 1, None);
        }
    }

    pub(crate) fn eval(&self, lit: Lit) -> Option<bool> {
        self.data[var_of(lit)]
            .as_ref()
            .map(|data| data.value == lit.is_positive())
    }

    pub(crate) fn current_level(&self) -> usize {
        self.levels.len()
    }

    pub(crate) fn new_level(&mut self) {
        self.levels.push(self.trail.len());
    }

    pub(crate) fn set(&mut self, lit: Lit, reason: Reason) {
        debug_assert!(self.eval(lit).is_none());
        self.trail.push(lit);
        self.data[var_of(lit)] = Some(VarData {
            value: lit.is_positive(),
            level: self.current_level(),
            reason,
        });
    }

    pub(crate) fn level_of(&self, lit: Lit) -> Option<usize> {
        self.data[var_of(lit)].as_ref().map(|data| data.level)
    }

    pub(crate) fn reason_of(&self, lit: Lit) -> Option<Reason> {
        self.data[var_of(lit)].as_ref().map(|data| data.reason)
    }

    pub(crate) fn assigned(&self) -> usize {
        self.trail.len()
    }

    /// Undo every level above `level`, keeping `level` itself.
    pub(crate) fn backtrack_to(&mut self, level: usize) {
        if level >= self.current_level() {
            return;
        }
        let mark = self.levels[level];
        self.levels.truncate(level);
        for lit in self.trail.drain(mark..) {
            self.data[var_of(lit)] = None;
        }
    }

    /// Undo everything, including root-level propagations.
    pub(crate) fn clear(&mut self) {
        self.levels.clear();
        for lit in self.trail.drain(..) {
            self.data[var_of(lit)] = None;
        }
    }
}
