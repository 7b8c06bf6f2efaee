//! A small and-inverter circuit over engine literals.
//!
//! The literal mapping compiles constraints into gates here and the
//! facade teaches the accumulated gates to the engine as CNF. Emission
//! is watermarked: gates created after the last [`Circuit::emit_cnf`]
//! call (the cardinality network of the minimization phase) are taught
//! by the next one without repeating earlier clauses.

use std::collections::HashMap;

use crate::engine::{Engine, Lit, LIT_NULL};

/// Gate `out <-> a AND b`.
struct Gate {
    out: Lit,
    a: Lit,
    b: Lit,
}

pub(crate) struct Circuit {
    /// Highest allocated variable; variable 1 is the constant true.
    nvars: Lit,
    gates: Vec<Gate>,
    /// Structural hashing of and-gates by normalized operand pair.
    strash: HashMap<(Lit, Lit), Lit>,
    emitted_gates: usize,
    emitted_const: bool,
}

impl Circuit {
    pub(crate) fn new() -> Self {
        Self {
            nvars: 1,
            gates: Vec::new(),
            strash: HashMap::new(),
            emitted_gates: 0,
            emitted_const: false,
        }
    }

    /// The constant true literal.
    pub(crate) fn t(&self) -> Lit {
        1
    }

    /// The constant false literal.
    pub(crate) fn f(&self) -> Lit {
        -1
    }

    /// Allocate a fresh input literal.
    pub(crate) fn fresh(&mut self) -> Lit {
        self.nvars += 1;
        self.nvars
    }

    /// `a AND b`, simplified against constants and shared structurally.
    /// Null operands propagate to a null result.
    pub(crate) fn and(&mut self, a: Lit, b: Lit) -> Lit {
        if a == LIT_NULL || b == LIT_NULL {
            return LIT_NULL;
        }
        if a == self.f() || b == self.f() || a == -b {
            return self.f();
        }
        if a == self.t() || a == b {
            return b;
        }
        if b == self.t() {
            return a;
        }
        let key = (a.min(b), a.max(b));
        if let Some(&out) = self.strash.get(&key) {
            return out;
        }
        let out = self.fresh();
        self.gates.push(Gate { out, a, b });
        self.strash.insert(key, out);
        out
    }

    /// `a OR b` by De Morgan over the and-gate.
    pub(crate) fn or(&mut self, a: Lit, b: Lit) -> Lit {
        if a == LIT_NULL || b == LIT_NULL {
            return LIT_NULL;
        }
        -self.and(-a, -b)
    }

    /// Build a Batcher odd-even sorting network over `lits`. The
    /// returned handle answers `at most w` queries for any bound; the
    /// gates still need to be taught through [`Circuit::emit_cnf`].
    pub(crate) fn card_sort(&mut self, lits: &[Lit]) -> CardSort {
        let t = self.t();
        if lits.is_empty() {
            return CardSort {
                sorted: Vec::new(),
                t,
            };
        }
        let mut sorted = lits.to_vec();
        let padded = lits.len().next_power_of_two();
        sorted.resize(padded, self.f());
        self.oe_sort(&mut sorted, 0, padded);
        sorted.truncate(lits.len());
        CardSort { sorted, t }
    }

    fn oe_sort(&mut self, lits: &mut [Lit], lo: usize, n: usize) {
        if n > 1 {
            let m = n / 2;
            self.oe_sort(lits, lo, m);
            self.oe_sort(lits, lo + m, m);
            self.oe_merge(lits, lo, n, 1);
        }
    }

    fn oe_merge(&mut self, lits: &mut [Lit], lo: usize, n: usize, r: usize) {
        let step = 2 * r;
        if step < n {
            self.oe_merge(lits, lo, n, step);
            self.oe_merge(lits, lo + r, n, step);
            let mut i = lo + r;
            while i + r < lo + n {
                self.comparator(lits, i, i + r);
                i += step;
            }
        } else {
            self.comparator(lits, lo, lo + r);
        }
    }

    /// Sort positions `i < j` descending: trues bubble toward `i`.
    fn comparator(&mut self, lits: &mut [Lit], i: usize, j: usize) {
        let (a, b) = (lits[i], lits[j]);
        lits[i] = self.or(a, b);
        lits[j] = self.and(a, b);
    }

    /// Teach every gate created since the previous call to the engine
    /// as Tseitin clauses, plus the constant-true unit on first use.
    pub(crate) fn emit_cnf(&mut self, engine: &mut Engine) {
        engine.reserve(self.nvars.unsigned_abs() as usize);
        if !self.emitted_const {
            engine.add_clause(vec![self.t()]);
            self.emitted_const = true;
        }
        for gate in &self.gates[self.emitted_gates..] {
            engine.add_clause(vec![-gate.out, gate.a]);
            engine.add_clause(vec![-gate.out, gate.b]);
            engine.add_clause(vec![gate.out, -gate.a, -gate.b]);
        }
        self.emitted_gates = self.gates.len();
    }
}

/// Sorted outputs of a cardinality network, descending: `sorted[i]` is
/// true exactly when more than `i` of the inputs are true.
pub(crate) struct CardSort {
    sorted: Vec<Lit>,
    t: Lit,
}

impl CardSort {
    /// Number of inputs, the largest meaningful bound.
    pub(crate) fn n(&self) -> usize {
        self.sorted.len()
    }

    /// A literal that is true exactly when at most `w` inputs are true.
    /// Bounds of `n` or more are trivially satisfied.
    pub(crate) fn leq(&self, w: usize) -> Lit {
        if w >= self.sorted.len() {
            self.t
        } else {
            -self.sorted[w]
        }
    }
}
