//! The operational-semantics seam.
//!
//! The verification-condition generator knows how to walk an edge's
//! blocks but nothing about what the statements mean; an [`OpSem`]
//! implementation supplies the meaning by emitting side conditions into
//! the threaded symbolic store. [`ExprOpSem`] is the bundled semantics
//! for the guarded-command language.

use cutflow_cfg::cfg::{BlockId, Expr, Procedure, Stmt, Terminator};
use thiserror::Error;

use crate::store::SymStore;
use crate::terms::{TermFactory, TermId};

/// Why an edge could not be encoded.
///
/// Any error is fatal for the whole edge: the caller must discard every
/// side condition gathered so far and record nothing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("unsupported construct `{construct}` in block {block}")]
    Unsupported { construct: String, block: String },

    #[error("malformed control flow: {reason}")]
    MalformedCfg { reason: String },
}

impl EncodeError {
    pub fn unsupported(construct: &str, block: &str) -> Self {
        Self::Unsupported {
            construct: construct.to_string(),
            block: block.to_string(),
        }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedCfg {
            reason: reason.into(),
        }
    }
}

/// How a side condition participates in the transition relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideCondKind {
    /// Contributes to the path guard.
    Guard,
    /// A relational fact conditioned on the guard.
    Fact,
}

/// One clause emitted while executing an edge symbolically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SideCondition {
    pub kind: SideCondKind,
    pub term: TermId,
}

impl SideCondition {
    pub fn guard(term: TermId) -> Self {
        Self {
            kind: SideCondKind::Guard,
            term,
        }
    }

    pub fn fact(term: TermId) -> Self {
        Self {
            kind: SideCondKind::Fact,
            term,
        }
    }

    pub fn is_guard(&self) -> bool {
        self.kind == SideCondKind::Guard
    }
}

/// Symbolic semantics of one basic block.
///
/// `taken` names the successor the enclosing path continues into, and
/// `last` is set on the final executed block of the edge, where the
/// implementation must also emit the primed output bindings.
pub trait OpSem {
    fn exec(
        &self,
        factory: &mut TermFactory,
        store: &mut SymStore,
        procedure: &Procedure,
        block: BlockId,
        taken: BlockId,
        last: bool,
    ) -> Result<Vec<SideCondition>, EncodeError>;
}

/// Bundled semantics for the guarded-command language.
///
/// Division is deliberately not encoded; it surfaces as
/// [`EncodeError::Unsupported`] so callers can exercise the
/// fatal-per-edge contract.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExprOpSem;

impl ExprOpSem {
    pub fn new() -> Self {
        Self
    }

    fn encode_expr(
        &self,
        factory: &mut TermFactory,
        store: &mut SymStore,
        procedure: &Procedure,
        block: &str,
        e: &Expr,
    ) -> Result<TermId, EncodeError> {
        let t = match e {
            Expr::Var(v) => store.read(factory, procedure, *v),
            Expr::Int(n) => factory.mk_int(*n),
            Expr::Bool(true) => factory.mk_true(),
            Expr::Bool(false) => factory.mk_false(),
            Expr::Div(..) => {
                return Err(EncodeError::unsupported("div", block));
            }
            Expr::Add(a, b) => {
                let (x, y) = self.encode_pair(factory, store, procedure, block, a, b)?;
                factory.mk_add(x, y)
            }
            Expr::Sub(a, b) => {
                let (x, y) = self.encode_pair(factory, store, procedure, block, a, b)?;
                factory.mk_sub(x, y)
            }
            Expr::Mul(a, b) => {
                let (x, y) = self.encode_pair(factory, store, procedure, block, a, b)?;
                factory.mk_mul(x, y)
            }
            Expr::Eq(a, b) => {
                let (x, y) = self.encode_pair(factory, store, procedure, block, a, b)?;
                factory.mk_eq(x, y)
            }
            Expr::Lt(a, b) => {
                let (x, y) = self.encode_pair(factory, store, procedure, block, a, b)?;
                factory.mk_lt(x, y)
            }
            Expr::Le(a, b) => {
                let (x, y) = self.encode_pair(factory, store, procedure, block, a, b)?;
                factory.mk_le(x, y)
            }
            Expr::And(a, b) => {
                let (x, y) = self.encode_pair(factory, store, procedure, block, a, b)?;
                factory.mk_and(x, y)
            }
            Expr::Or(a, b) => {
                let (x, y) = self.encode_pair(factory, store, procedure, block, a, b)?;
                factory.mk_or(x, y)
            }
            Expr::Not(a) => {
                let x = self.encode_expr(factory, store, procedure, block, a)?;
                factory.mk_not(x)
            }
        };
        Ok(t)
    }

    fn encode_pair(
        &self,
        factory: &mut TermFactory,
        store: &mut SymStore,
        procedure: &Procedure,
        block: &str,
        a: &Expr,
        b: &Expr,
    ) -> Result<(TermId, TermId), EncodeError> {
        let x = self.encode_expr(factory, store, procedure, block, a)?;
        let y = self.encode_expr(factory, store, procedure, block, b)?;
        Ok((x, y))
    }
}

impl OpSem for ExprOpSem {
    fn exec(
        &self,
        factory: &mut TermFactory,
        store: &mut SymStore,
        procedure: &Procedure,
        block: BlockId,
        taken: BlockId,
        last: bool,
    ) -> Result<Vec<SideCondition>, EncodeError> {
        let bb = procedure.block(block);
        let name = bb.name.clone();
        let mut out = Vec::new();

        for stmt in &bb.stmts {
            match stmt {
                Stmt::Assign { var, value } => {
                    let t = self.encode_expr(factory, store, procedure, &name, value)?;
                    store.write(*var, t);
                }
                Stmt::Assume(e) => {
                    let t = self.encode_expr(factory, store, procedure, &name, e)?;
                    out.push(SideCondition::guard(t));
                }
                Stmt::Havoc(v) => {
                    store.havoc(factory, procedure, *v);
                }
            }
        }

        match &bb.terminator {
            Terminator::Goto(t) => {
                if *t != taken {
                    return Err(EncodeError::malformed(format!(
                        "block {name} jumps to {t}, path continues to {taken}"
                    )));
                }
            }
            Terminator::Branch {
                cond,
                then_to,
                else_to,
            } => {
                if then_to == else_to {
                    if *then_to != taken {
                        return Err(EncodeError::malformed(format!(
                            "block {name} branches to {then_to}, path continues to {taken}"
                        )));
                    }
                    // Both arms agree; the condition constrains nothing.
                } else {
                    let c = self.encode_expr(factory, store, procedure, &name, cond)?;
                    if taken == *then_to {
                        out.push(SideCondition::guard(c));
                    } else if taken == *else_to {
                        let nc = factory.mk_not(c);
                        out.push(SideCondition::guard(nc));
                    } else {
                        return Err(EncodeError::malformed(format!(
                            "block {name} branches to {then_to}/{else_to}, path continues to {taken}"
                        )));
                    }
                }
            }
            Terminator::Return => {
                return Err(EncodeError::malformed(format!(
                    "return block {name} executed inside an edge"
                )));
            }
        }

        if last {
            for (var, term) in store.bindings().collect::<Vec<_>>() {
                let primed = format!("{}'", procedure.var_name(var));
                let out_sym = factory.mk_sym(&primed, 0);
                let eq = factory.mk_eq(out_sym, term);
                out.push(SideCondition::fact(eq));
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terms::Term;
    use cutflow_cfg::cfg::{ProcedureBuilder, VarId};

    /// entry: x := x + 1; branch (x < 10) -> then else other.
    fn branchy() -> (Procedure, VarId, BlockId, BlockId, BlockId) {
        let mut b = ProcedureBuilder::new("branchy");
        let x = b.var("x");
        let entry = b.block("entry");
        let then_b = b.block("then");
        let else_b = b.block("else");
        let exit = b.block("exit");
        b.fill(
            entry,
            vec![Stmt::Assign {
                var: x,
                value: Expr::var(x).add(Expr::int(1)),
            }],
            Terminator::Branch {
                cond: Expr::var(x).lt(Expr::int(10)),
                then_to: then_b,
                else_to: else_b,
            },
        );
        b.fill(then_b, vec![], Terminator::Goto(exit));
        b.fill(else_b, vec![], Terminator::Goto(exit));
        b.fill(exit, vec![], Terminator::Return);
        (b.finish(entry, exit).unwrap(), x, entry, then_b, else_b)
    }

    #[test]
    fn taken_then_arm_emits_the_condition() {
        let (p, _, entry, then_b, _) = branchy();
        let mut f = TermFactory::new();
        let mut s = SymStore::new();
        let conds = ExprOpSem::new()
            .exec(&mut f, &mut s, &p, entry, then_b, false)
            .unwrap();
        assert_eq!(conds.len(), 1);
        assert!(conds[0].is_guard());
        assert_eq!(f.display(conds[0].term).to_string(), "(< (+ x#0 1) 10)");
    }

    #[test]
    fn taken_else_arm_negates_the_condition() {
        let (p, _, entry, _, else_b) = branchy();
        let mut f = TermFactory::new();
        let mut s = SymStore::new();
        let conds = ExprOpSem::new()
            .exec(&mut f, &mut s, &p, entry, else_b, false)
            .unwrap();
        assert_eq!(conds.len(), 1);
        assert!(matches!(f.get(conds[0].term), Term::Not(_)));
    }

    #[test]
    fn wrong_successor_is_malformed() {
        let (p, _, entry, _, _) = branchy();
        let mut f = TermFactory::new();
        let mut s = SymStore::new();
        let err = ExprOpSem::new()
            .exec(&mut f, &mut s, &p, entry, p.exit(), false)
            .unwrap_err();
        assert!(matches!(err, EncodeError::MalformedCfg { .. }));
    }

    #[test]
    fn division_is_unsupported() {
        let mut b = ProcedureBuilder::new("div");
        let x = b.var("x");
        let entry = b.block("entry");
        let exit = b.block("exit");
        b.fill(
            entry,
            vec![Stmt::Assign {
                var: x,
                value: Expr::var(x).div(Expr::int(2)),
            }],
            Terminator::Goto(exit),
        );
        b.fill(exit, vec![], Terminator::Return);
        let p = b.finish(entry, exit).unwrap();
        let mut f = TermFactory::new();
        let mut s = SymStore::new();
        let err = ExprOpSem::new()
            .exec(&mut f, &mut s, &p, entry, exit, false)
            .unwrap_err();
        assert_eq!(err, EncodeError::unsupported("div", "entry"));
    }

    #[test]
    fn last_block_emits_primed_outputs() {
        let (p, _, entry, then_b, _) = branchy();
        let mut f = TermFactory::new();
        let mut s = SymStore::new();
        let conds = ExprOpSem::new()
            .exec(&mut f, &mut s, &p, entry, then_b, true)
            .unwrap();
        let facts: Vec<_> = conds.iter().filter(|c| !c.is_guard()).collect();
        assert_eq!(facts.len(), 1);
        assert_eq!(
            f.display(facts[0].term).to_string(),
            "(= x'#0 (+ x#0 1))"
        );
    }

    #[test]
    fn assume_becomes_a_guard() {
        let mut b = ProcedureBuilder::new("assume");
        let x = b.var("x");
        let entry = b.block("entry");
        let exit = b.block("exit");
        b.fill(
            entry,
            vec![Stmt::Assume(Expr::int(0).le(Expr::var(x)))],
            Terminator::Goto(exit),
        );
        b.fill(exit, vec![], Terminator::Return);
        let p = b.finish(entry, exit).unwrap();
        let mut f = TermFactory::new();
        let mut s = SymStore::new();
        let conds = ExprOpSem::new()
            .exec(&mut f, &mut s, &p, entry, exit, false)
            .unwrap();
        assert_eq!(conds.len(), 1);
        assert!(conds[0].is_guard());
    }
}
