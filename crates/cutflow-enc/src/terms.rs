//! Interned, solver-agnostic terms.
//!
//! Every formula the encoder produces lives in a [`TermFactory`] arena
//! and is referred to by a copyable [`TermId`]. Interning makes
//! structural equality an id comparison and keeps the transition
//! database compact: a guard shared by many paths is stored once.
//!
//! Constructors apply only cheap, local normalization (constant
//! negation, unit/absorbing elements of the connectives, reflexive
//! equality). Anything deeper belongs in a solver, not here.

use indexmap::IndexSet;
use serde::Serialize;
use std::fmt;

/// Index of an interned term within its owning [`TermFactory`].
///
/// Ids are only meaningful relative to the factory that produced them;
/// mixing ids across factories is a logic error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TermId(pub u32);

/// A node of the term language.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    True,
    False,
    Int(i64),
    /// A versioned symbolic constant, e.g. `x` at version 2.
    Sym { name: String, version: u32 },
    /// An uninterpreted location label.
    Loc(String),
    Not(TermId),
    And(TermId, TermId),
    Or(TermId, TermId),
    Implies(TermId, TermId),
    Eq(TermId, TermId),
    Lt(TermId, TermId),
    Le(TermId, TermId),
    Add(TermId, TermId),
    Sub(TermId, TermId),
    Mul(TermId, TermId),
    Ite(TermId, TermId, TermId),
}

/// A concrete value a term can evaluate to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Loc(String),
}

/// Arena of hash-consed terms.
///
/// One factory per encoding session; the intern table is append-only,
/// so every id handed out stays valid for the factory's lifetime.
#[derive(Debug, Default)]
pub struct TermFactory {
    table: IndexSet<Term>,
}

impl TermFactory {
    pub fn new() -> Self {
        Self::default()
    }

    fn intern(&mut self, t: Term) -> TermId {
        let (idx, _) = self.table.insert_full(t);
        TermId(idx as u32)
    }

    /// The term behind `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was produced by a different factory.
    pub fn get(&self, id: TermId) -> &Term {
        self.table
            .get_index(id.0 as usize)
            .unwrap_or_else(|| panic!("foreign term id {}", id.0))
    }

    /// Number of distinct terms interned so far.
    pub fn num_terms(&self) -> usize {
        self.table.len()
    }

    pub fn mk_true(&mut self) -> TermId {
        self.intern(Term::True)
    }

    pub fn mk_false(&mut self) -> TermId {
        self.intern(Term::False)
    }

    pub fn mk_int(&mut self, n: i64) -> TermId {
        self.intern(Term::Int(n))
    }

    pub fn mk_sym(&mut self, name: &str, version: u32) -> TermId {
        self.intern(Term::Sym {
            name: name.to_string(),
            version,
        })
    }

    pub fn mk_loc(&mut self, label: &str) -> TermId {
        self.intern(Term::Loc(label.to_string()))
    }

    pub fn mk_not(&mut self, a: TermId) -> TermId {
        match self.get(a).clone() {
            Term::True => self.mk_false(),
            Term::False => self.mk_true(),
            Term::Not(inner) => inner,
            _ => self.intern(Term::Not(a)),
        }
    }

    pub fn mk_and(&mut self, a: TermId, b: TermId) -> TermId {
        let a_true = matches!(self.get(a), Term::True);
        let a_false = matches!(self.get(a), Term::False);
        let b_true = matches!(self.get(b), Term::True);
        let b_false = matches!(self.get(b), Term::False);
        if a_false || b_false {
            self.mk_false()
        } else if a_true {
            b
        } else if b_true || a == b {
            a
        } else {
            self.intern(Term::And(a, b))
        }
    }

    pub fn mk_or(&mut self, a: TermId, b: TermId) -> TermId {
        let a_true = matches!(self.get(a), Term::True);
        let a_false = matches!(self.get(a), Term::False);
        let b_true = matches!(self.get(b), Term::True);
        let b_false = matches!(self.get(b), Term::False);
        if a_true || b_true {
            self.mk_true()
        } else if a_false {
            b
        } else if b_false || a == b {
            a
        } else {
            self.intern(Term::Or(a, b))
        }
    }

    pub fn mk_implies(&mut self, a: TermId, b: TermId) -> TermId {
        if matches!(self.get(a), Term::False) || matches!(self.get(b), Term::True) {
            self.mk_true()
        } else if matches!(self.get(a), Term::True) {
            b
        } else {
            self.intern(Term::Implies(a, b))
        }
    }

    pub fn mk_eq(&mut self, a: TermId, b: TermId) -> TermId {
        if a == b {
            self.mk_true()
        } else {
            self.intern(Term::Eq(a, b))
        }
    }

    pub fn mk_lt(&mut self, a: TermId, b: TermId) -> TermId {
        self.intern(Term::Lt(a, b))
    }

    pub fn mk_le(&mut self, a: TermId, b: TermId) -> TermId {
        self.intern(Term::Le(a, b))
    }

    pub fn mk_add(&mut self, a: TermId, b: TermId) -> TermId {
        self.intern(Term::Add(a, b))
    }

    pub fn mk_sub(&mut self, a: TermId, b: TermId) -> TermId {
        self.intern(Term::Sub(a, b))
    }

    pub fn mk_mul(&mut self, a: TermId, b: TermId) -> TermId {
        self.intern(Term::Mul(a, b))
    }

    pub fn mk_ite(&mut self, cond: TermId, then_t: TermId, else_t: TermId) -> TermId {
        if then_t == else_t || matches!(self.get(cond), Term::True) {
            then_t
        } else if matches!(self.get(cond), Term::False) {
            else_t
        } else {
            self.intern(Term::Ite(cond, then_t, else_t))
        }
    }

    /// Renders `id` as an s-expression.
    pub fn display(&self, id: TermId) -> TermDisplay<'_> {
        TermDisplay { factory: self, id }
    }

    /// Evaluates `id` under a symbol valuation.
    ///
    /// Returns `None` on an unbound symbol or a sort mismatch; the
    /// evaluator exists for tests and diagnostics, not for solving.
    pub fn eval<F>(&self, id: TermId, env: &F) -> Option<Value>
    where
        F: Fn(&str, u32) -> Option<Value>,
    {
        match self.get(id) {
            Term::True => Some(Value::Bool(true)),
            Term::False => Some(Value::Bool(false)),
            Term::Int(n) => Some(Value::Int(*n)),
            Term::Sym { name, version } => env(name, *version),
            Term::Loc(l) => Some(Value::Loc(l.clone())),
            Term::Not(a) => match self.eval(*a, env)? {
                Value::Bool(x) => Some(Value::Bool(!x)),
                _ => None,
            },
            Term::And(a, b) => self.eval_bool2(*a, *b, env, |x, y| x && y),
            Term::Or(a, b) => self.eval_bool2(*a, *b, env, |x, y| x || y),
            Term::Implies(a, b) => self.eval_bool2(*a, *b, env, |x, y| !x || y),
            Term::Eq(a, b) => match (self.eval(*a, env)?, self.eval(*b, env)?) {
                (Value::Int(x), Value::Int(y)) => Some(Value::Bool(x == y)),
                (Value::Bool(x), Value::Bool(y)) => Some(Value::Bool(x == y)),
                (Value::Loc(x), Value::Loc(y)) => Some(Value::Bool(x == y)),
                _ => None,
            },
            Term::Lt(a, b) => self.eval_int2(*a, *b, env).map(|(x, y)| Value::Bool(x < y)),
            Term::Le(a, b) => self.eval_int2(*a, *b, env).map(|(x, y)| Value::Bool(x <= y)),
            Term::Add(a, b) => self
                .eval_int2(*a, *b, env)
                .map(|(x, y)| Value::Int(x.wrapping_add(y))),
            Term::Sub(a, b) => self
                .eval_int2(*a, *b, env)
                .map(|(x, y)| Value::Int(x.wrapping_sub(y))),
            Term::Mul(a, b) => self
                .eval_int2(*a, *b, env)
                .map(|(x, y)| Value::Int(x.wrapping_mul(y))),
            Term::Ite(c, t, e) => match self.eval(*c, env)? {
                Value::Bool(true) => self.eval(*t, env),
                Value::Bool(false) => self.eval(*e, env),
                _ => None,
            },
        }
    }

    fn eval_bool2<F>(&self, a: TermId, b: TermId, env: &F, op: fn(bool, bool) -> bool) -> Option<Value>
    where
        F: Fn(&str, u32) -> Option<Value>,
    {
        match (self.eval(a, env)?, self.eval(b, env)?) {
            (Value::Bool(x), Value::Bool(y)) => Some(Value::Bool(op(x, y))),
            _ => None,
        }
    }

    fn eval_int2<F>(&self, a: TermId, b: TermId, env: &F) -> Option<(i64, i64)>
    where
        F: Fn(&str, u32) -> Option<Value>,
    {
        match (self.eval(a, env)?, self.eval(b, env)?) {
            (Value::Int(x), Value::Int(y)) => Some((x, y)),
            _ => None,
        }
    }
}

/// Borrowing pretty-printer returned by [`TermFactory::display`].
pub struct TermDisplay<'a> {
    factory: &'a TermFactory,
    id: TermId,
}

impl fmt::Display for TermDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_term(self.factory, self.id, f)
    }
}

fn write_term(factory: &TermFactory, id: TermId, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let bin = |f: &mut fmt::Formatter<'_>, op: &str, a: TermId, b: TermId| {
        write!(f, "({op} ")?;
        write_term(factory, a, f)?;
        write!(f, " ")?;
        write_term(factory, b, f)?;
        write!(f, ")")
    };
    match factory.get(id) {
        Term::True => write!(f, "true"),
        Term::False => write!(f, "false"),
        Term::Int(n) => write!(f, "{n}"),
        Term::Sym { name, version } => write!(f, "{name}#{version}"),
        Term::Loc(l) => write!(f, "@{l}"),
        Term::Not(a) => {
            write!(f, "(not ")?;
            write_term(factory, *a, f)?;
            write!(f, ")")
        }
        Term::And(a, b) => bin(f, "and", *a, *b),
        Term::Or(a, b) => bin(f, "or", *a, *b),
        Term::Implies(a, b) => bin(f, "=>", *a, *b),
        Term::Eq(a, b) => bin(f, "=", *a, *b),
        Term::Lt(a, b) => bin(f, "<", *a, *b),
        Term::Le(a, b) => bin(f, "<=", *a, *b),
        Term::Add(a, b) => bin(f, "+", *a, *b),
        Term::Sub(a, b) => bin(f, "-", *a, *b),
        Term::Mul(a, b) => bin(f, "*", *a, *b),
        Term::Ite(c, t, e) => {
            write!(f, "(ite ")?;
            write_term(factory, *c, f)?;
            write!(f, " ")?;
            write_term(factory, *t, f)?;
            write!(f, " ")?;
            write_term(factory, *e, f)?;
            write!(f, ")")
        }
    }
}
