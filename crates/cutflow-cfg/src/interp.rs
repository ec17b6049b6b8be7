//! Bounded concrete interpreter for the guarded-command language.
//!
//! This is the reference semantics: soundness tests compare the guards
//! produced by flattening against what this interpreter actually does on
//! concrete inputs. It is deliberately strict: uninitialized reads,
//! sort mismatches, and division by zero are hard errors, and `havoc`
//! cannot be executed concretely.

use indexmap::IndexMap;
use thiserror::Error;

use crate::cfg::{BlockId, Expr, Procedure, Stmt, Terminator, VarId};

/// A runtime value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcreteValue {
    Int(i64),
    Bool(bool),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InterpError {
    #[error("read of uninitialized variable {0}")]
    Uninitialized(String),

    #[error("sort mismatch evaluating {0}")]
    SortMismatch(String),

    #[error("division by zero in block {0}")]
    DivisionByZero(String),

    #[error("cannot execute havoc of {0} concretely")]
    Havoc(String),
}

/// How a bounded concrete execution ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Execution reached the exit block's return.
    Returned {
        env: IndexMap<VarId, ConcreteValue>,
    },
    /// An assumption evaluated to false; the execution is infeasible.
    Blocked { block: BlockId },
    /// The fuel bound was exhausted before a return.
    OutOfFuel,
}

/// Runs `procedure` on `inputs` for at most `fuel` block executions.
pub fn run(
    procedure: &Procedure,
    inputs: &IndexMap<VarId, ConcreteValue>,
    fuel: usize,
) -> Result<Outcome, InterpError> {
    let mut env = inputs.clone();
    let mut cur = procedure.entry();
    for _ in 0..fuel {
        let bb = procedure.block(cur);
        for stmt in &bb.stmts {
            match stmt {
                Stmt::Assign { var, value } => {
                    let v = eval(procedure, &env, value, &bb.name)?;
                    env.insert(*var, v);
                }
                Stmt::Assume(e) => {
                    if !eval_bool(procedure, &env, e, &bb.name)? {
                        return Ok(Outcome::Blocked { block: cur });
                    }
                }
                Stmt::Havoc(v) => {
                    return Err(InterpError::Havoc(procedure.var_name(*v).to_string()));
                }
            }
        }
        match &bb.terminator {
            Terminator::Goto(t) => cur = *t,
            Terminator::Branch {
                cond,
                then_to,
                else_to,
            } => {
                cur = if eval_bool(procedure, &env, cond, &bb.name)? {
                    *then_to
                } else {
                    *else_to
                };
            }
            Terminator::Return => return Ok(Outcome::Returned { env }),
        }
    }
    Ok(Outcome::OutOfFuel)
}

fn eval(
    procedure: &Procedure,
    env: &IndexMap<VarId, ConcreteValue>,
    e: &Expr,
    block: &str,
) -> Result<ConcreteValue, InterpError> {
    match e {
        Expr::Var(v) => env
            .get(v)
            .copied()
            .ok_or_else(|| InterpError::Uninitialized(procedure.var_name(*v).to_string())),
        Expr::Int(n) => Ok(ConcreteValue::Int(*n)),
        Expr::Bool(b) => Ok(ConcreteValue::Bool(*b)),
        Expr::Add(a, b) => {
            let (x, y) = eval_int2(procedure, env, a, b, block)?;
            Ok(ConcreteValue::Int(x.wrapping_add(y)))
        }
        Expr::Sub(a, b) => {
            let (x, y) = eval_int2(procedure, env, a, b, block)?;
            Ok(ConcreteValue::Int(x.wrapping_sub(y)))
        }
        Expr::Mul(a, b) => {
            let (x, y) = eval_int2(procedure, env, a, b, block)?;
            Ok(ConcreteValue::Int(x.wrapping_mul(y)))
        }
        Expr::Div(a, b) => {
            let (x, y) = eval_int2(procedure, env, a, b, block)?;
            if y == 0 {
                Err(InterpError::DivisionByZero(block.to_string()))
            } else {
                Ok(ConcreteValue::Int(x.wrapping_div(y)))
            }
        }
        Expr::Eq(a, b) => {
            let x = eval(procedure, env, a, block)?;
            let y = eval(procedure, env, b, block)?;
            match (x, y) {
                (ConcreteValue::Int(_), ConcreteValue::Int(_))
                | (ConcreteValue::Bool(_), ConcreteValue::Bool(_)) => {
                    Ok(ConcreteValue::Bool(x == y))
                }
                _ => Err(InterpError::SortMismatch(e.to_string())),
            }
        }
        Expr::Lt(a, b) => {
            let (x, y) = eval_int2(procedure, env, a, b, block)?;
            Ok(ConcreteValue::Bool(x < y))
        }
        Expr::Le(a, b) => {
            let (x, y) = eval_int2(procedure, env, a, b, block)?;
            Ok(ConcreteValue::Bool(x <= y))
        }
        Expr::And(a, b) => {
            let x = eval_bool(procedure, env, a, block)?;
            let y = eval_bool(procedure, env, b, block)?;
            Ok(ConcreteValue::Bool(x && y))
        }
        Expr::Or(a, b) => {
            let x = eval_bool(procedure, env, a, block)?;
            let y = eval_bool(procedure, env, b, block)?;
            Ok(ConcreteValue::Bool(x || y))
        }
        Expr::Not(a) => {
            let x = eval_bool(procedure, env, a, block)?;
            Ok(ConcreteValue::Bool(!x))
        }
    }
}

fn eval_int2(
    procedure: &Procedure,
    env: &IndexMap<VarId, ConcreteValue>,
    a: &Expr,
    b: &Expr,
    block: &str,
) -> Result<(i64, i64), InterpError> {
    let x = eval(procedure, env, a, block)?;
    let y = eval(procedure, env, b, block)?;
    match (x, y) {
        (ConcreteValue::Int(x), ConcreteValue::Int(y)) => Ok((x, y)),
        _ => Err(InterpError::SortMismatch(format!("({a}, {b})"))),
    }
}

fn eval_bool(
    procedure: &Procedure,
    env: &IndexMap<VarId, ConcreteValue>,
    e: &Expr,
    block: &str,
) -> Result<bool, InterpError> {
    match eval(procedure, env, e, block)? {
        ConcreteValue::Bool(b) => Ok(b),
        ConcreteValue::Int(_) => Err(InterpError::SortMismatch(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::ProcedureBuilder;

    fn inputs(pairs: &[(VarId, i64)]) -> IndexMap<VarId, ConcreteValue> {
        pairs
            .iter()
            .map(|&(v, n)| (v, ConcreteValue::Int(n)))
            .collect()
    }

    /// loop: i := i - 1; branch (0 < i) -> loop else exit.
    fn countdown() -> (Procedure, VarId) {
        let mut b = ProcedureBuilder::new("countdown");
        let i = b.var("i");
        let header = b.block("loop");
        let exit = b.block("exit");
        b.fill(
            header,
            vec![Stmt::Assign {
                var: i,
                value: Expr::var(i).sub(Expr::int(1)),
            }],
            Terminator::Branch {
                cond: Expr::int(0).lt(Expr::var(i)),
                then_to: header,
                else_to: exit,
            },
        );
        b.fill(exit, vec![], Terminator::Return);
        (b.finish(header, exit).unwrap(), i)
    }

    #[test]
    fn countdown_terminates_with_zero() {
        let (p, i) = countdown();
        match run(&p, &inputs(&[(i, 5)]), 100).unwrap() {
            Outcome::Returned { env } => assert_eq!(env[&i], ConcreteValue::Int(0)),
            other => panic!("expected Returned, got {other:?}"),
        }
    }

    #[test]
    fn fuel_exhaustion_is_reported() {
        let (p, i) = countdown();
        assert_eq!(run(&p, &inputs(&[(i, 1000)]), 3).unwrap(), Outcome::OutOfFuel);
    }

    #[test]
    fn false_assumption_blocks() {
        let mut b = ProcedureBuilder::new("assume");
        let x = b.var("x");
        let entry = b.block("entry");
        let exit = b.block("exit");
        b.fill(
            entry,
            vec![Stmt::Assume(Expr::var(x).lt(Expr::int(0)))],
            Terminator::Goto(exit),
        );
        b.fill(exit, vec![], Terminator::Return);
        let p = b.finish(entry, exit).unwrap();
        assert_eq!(
            run(&p, &inputs(&[(x, 7)]), 10).unwrap(),
            Outcome::Blocked { block: entry }
        );
        assert!(matches!(
            run(&p, &inputs(&[(x, -7)]), 10).unwrap(),
            Outcome::Returned { .. }
        ));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let mut b = ProcedureBuilder::new("div");
        let x = b.var("x");
        let entry = b.block("entry");
        let exit = b.block("exit");
        b.fill(
            entry,
            vec![Stmt::Assign {
                var: x,
                value: Expr::int(1).div(Expr::var(x)),
            }],
            Terminator::Goto(exit),
        );
        b.fill(exit, vec![], Terminator::Return);
        let p = b.finish(entry, exit).unwrap();
        assert_eq!(
            run(&p, &inputs(&[(x, 0)]), 10),
            Err(InterpError::DivisionByZero("entry".into()))
        );
    }

    #[test]
    fn havoc_cannot_run_concretely() {
        let mut b = ProcedureBuilder::new("havoc");
        let x = b.var("x");
        let entry = b.block("entry");
        let exit = b.block("exit");
        b.fill(entry, vec![Stmt::Havoc(x)], Terminator::Goto(exit));
        b.fill(exit, vec![], Terminator::Return);
        let p = b.finish(entry, exit).unwrap();
        assert_eq!(
            run(&p, &IndexMap::new(), 10),
            Err(InterpError::Havoc("x".into()))
        );
    }

    #[test]
    fn uninitialized_read_is_an_error() {
        let (p, _) = countdown();
        assert_eq!(
            run(&p, &IndexMap::new(), 10),
            Err(InterpError::Uninitialized("i".into()))
        );
    }
}
