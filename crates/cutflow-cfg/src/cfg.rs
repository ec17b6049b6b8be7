use std::fmt;

use thiserror::Error;

/// A unique identifier for a basic block within one procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub usize);

/// A unique identifier for a procedure-local variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub usize);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{}", self.0)
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// An expression of the guarded-command language.
///
/// Integer-valued and boolean-valued expressions share one enum; the
/// interpreter and the symbolic oracle both check sorts at evaluation
/// time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Var(VarId),
    Int(i64),
    Bool(bool),

    // Arithmetic
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),

    // Comparison
    Eq(Box<Expr>, Box<Expr>),
    Lt(Box<Expr>, Box<Expr>),
    Le(Box<Expr>, Box<Expr>),

    // Boolean logic
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

#[allow(clippy::should_implement_trait)]
impl Expr {
    pub fn var(v: VarId) -> Self {
        Expr::Var(v)
    }

    pub fn int(n: i64) -> Self {
        Expr::Int(n)
    }

    pub fn bool(b: bool) -> Self {
        Expr::Bool(b)
    }

    pub fn add(self, other: Expr) -> Self {
        Expr::Add(Box::new(self), Box::new(other))
    }

    pub fn sub(self, other: Expr) -> Self {
        Expr::Sub(Box::new(self), Box::new(other))
    }

    pub fn mul(self, other: Expr) -> Self {
        Expr::Mul(Box::new(self), Box::new(other))
    }

    pub fn div(self, other: Expr) -> Self {
        Expr::Div(Box::new(self), Box::new(other))
    }

    pub fn eq(self, other: Expr) -> Self {
        Expr::Eq(Box::new(self), Box::new(other))
    }

    pub fn lt(self, other: Expr) -> Self {
        Expr::Lt(Box::new(self), Box::new(other))
    }

    pub fn le(self, other: Expr) -> Self {
        Expr::Le(Box::new(self), Box::new(other))
    }

    pub fn and(self, other: Expr) -> Self {
        Expr::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Expr) -> Self {
        Expr::Or(Box::new(self), Box::new(other))
    }

    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Var(v) => write!(f, "{v}"),
            Expr::Int(n) => write!(f, "{n}"),
            Expr::Bool(b) => write!(f, "{b}"),
            Expr::Add(a, b) => write!(f, "({a} + {b})"),
            Expr::Sub(a, b) => write!(f, "({a} - {b})"),
            Expr::Mul(a, b) => write!(f, "({a} * {b})"),
            Expr::Div(a, b) => write!(f, "({a} / {b})"),
            Expr::Eq(a, b) => write!(f, "({a} == {b})"),
            Expr::Lt(a, b) => write!(f, "({a} < {b})"),
            Expr::Le(a, b) => write!(f, "({a} <= {b})"),
            Expr::And(a, b) => write!(f, "({a} && {b})"),
            Expr::Or(a, b) => write!(f, "({a} || {b})"),
            Expr::Not(a) => write!(f, "!{a}"),
        }
    }
}

/// A statement inside a basic block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    /// `var := value`.
    Assign { var: VarId, value: Expr },
    /// Constrains the execution; a false assumption blocks the path.
    Assume(Expr),
    /// Assigns a nondeterministic value to `var`.
    Havoc(VarId),
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::Assign { var, value } => write!(f, "{var} := {value}"),
            Stmt::Assume(e) => write!(f, "assume {e}"),
            Stmt::Havoc(v) => write!(f, "havoc {v}"),
        }
    }
}

/// How control leaves a basic block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminator {
    Goto(BlockId),
    Branch {
        cond: Expr,
        then_to: BlockId,
        else_to: BlockId,
    },
    Return,
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminator::Goto(t) => write!(f, "goto {t}"),
            Terminator::Branch {
                cond,
                then_to,
                else_to,
            } => write!(f, "branch {cond} -> {then_to} else {else_to}"),
            Terminator::Return => write!(f, "return"),
        }
    }
}

/// A basic block: straight-line statements plus one terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicBlock {
    pub name: String,
    pub stmts: Vec<Stmt>,
    pub terminator: Terminator,
}

/// A single procedure's control-flow graph.
///
/// Blocks and variables are stored densely and addressed by id; the
/// entry and exit blocks are designated at construction time. The exit
/// block ends in `return` and carries no statements: a cutpoint's code
/// belongs to its outgoing edges, so statements in the exit block would
/// never execute under the flattened encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Procedure {
    name: String,
    blocks: Vec<BasicBlock>,
    vars: Vec<String>,
    entry: BlockId,
    exit: BlockId,
}

impl Procedure {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entry(&self) -> BlockId {
        self.entry
    }

    pub fn exit(&self) -> BlockId {
        self.exit
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.0]
    }

    pub fn block_name(&self, id: BlockId) -> &str {
        &self.blocks[id.0].name
    }

    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> + '_ {
        (0..self.blocks.len()).map(BlockId)
    }

    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    pub fn var_name(&self, v: VarId) -> &str {
        &self.vars[v.0]
    }

    pub fn var_ids(&self) -> impl Iterator<Item = VarId> + '_ {
        (0..self.vars.len()).map(VarId)
    }

    pub fn find_var_by_name(&self, name: &str) -> Option<VarId> {
        self.vars.iter().position(|v| v == name).map(VarId)
    }

    /// Successor blocks in terminator order. A branch whose arms share
    /// one target contributes that target once.
    pub fn successors(&self, id: BlockId) -> Vec<BlockId> {
        match &self.blocks[id.0].terminator {
            Terminator::Goto(t) => vec![*t],
            Terminator::Branch {
                then_to, else_to, ..
            } => {
                if then_to == else_to {
                    vec![*then_to]
                } else {
                    vec![*then_to, *else_to]
                }
            }
            Terminator::Return => Vec::new(),
        }
    }
}

impl fmt::Display for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "procedure {}:", self.name)?;
        write!(f, "  vars:")?;
        for (i, v) in self.vars.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, " v{i}={v}")?;
        }
        writeln!(f)?;
        for (i, bb) in self.blocks.iter().enumerate() {
            let mark = if BlockId(i) == self.entry {
                " (entry)"
            } else if BlockId(i) == self.exit {
                " (exit)"
            } else {
                ""
            };
            writeln!(f, "  B{i} {}{mark}:", bb.name)?;
            for stmt in &bb.stmts {
                writeln!(f, "    {stmt}")?;
            }
            writeln!(f, "    {}", bb.terminator)?;
        }
        Ok(())
    }
}

/// Structural validation errors raised by [`ProcedureBuilder::finish`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CfgError {
    #[error("block {0} was declared but never filled")]
    UnfilledBlock(String),

    #[error("block {block} targets unknown block id {target}")]
    UnknownTarget { block: String, target: usize },

    #[error("exit block {0} must end in return")]
    ExitNotReturn(String),

    #[error("exit block {0} must not contain statements")]
    NonEmptyExit(String),

    #[error("block {0} ends in return but is not the designated exit")]
    ReturnOutsideExit(String),

    #[error("variable name {0} is reserved: primed and @-prefixed names denote synthesized symbols")]
    ReservedVarName(String),
}

/// Incrementally builds a [`Procedure`], validating the CFG on `finish`.
#[derive(Debug, Default)]
pub struct ProcedureBuilder {
    name: String,
    blocks: Vec<(String, Option<(Vec<Stmt>, Terminator)>)>,
    vars: Vec<String>,
}

impl ProcedureBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        ProcedureBuilder {
            name: name.into(),
            blocks: Vec::new(),
            vars: Vec::new(),
        }
    }

    /// Declares a procedure-local variable.
    ///
    /// Names ending in `'` or starting with `@` are reserved for
    /// symbols synthesized during encoding (primed outputs, the
    /// destination-cutpoint binding) and are rejected by
    /// [`Self::finish`].
    pub fn var(&mut self, name: impl Into<String>) -> VarId {
        let id = VarId(self.vars.len());
        self.vars.push(name.into());
        id
    }

    /// Declares an empty block; contents are supplied via [`Self::fill`].
    pub fn block(&mut self, name: impl Into<String>) -> BlockId {
        let id = BlockId(self.blocks.len());
        self.blocks.push((name.into(), None));
        id
    }

    pub fn fill(&mut self, id: BlockId, stmts: Vec<Stmt>, terminator: Terminator) {
        self.blocks[id.0].1 = Some((stmts, terminator));
    }

    pub fn finish(self, entry: BlockId, exit: BlockId) -> Result<Procedure, CfgError> {
        for name in &self.vars {
            if name.starts_with('@') || name.ends_with('\'') {
                return Err(CfgError::ReservedVarName(name.clone()));
            }
        }
        let num_blocks = self.blocks.len();
        let mut blocks = Vec::with_capacity(num_blocks);
        for (name, contents) in self.blocks {
            let (stmts, terminator) =
                contents.ok_or_else(|| CfgError::UnfilledBlock(name.clone()))?;
            blocks.push(BasicBlock {
                name,
                stmts,
                terminator,
            });
        }
        for (i, bb) in blocks.iter().enumerate() {
            let check = |target: BlockId| {
                if target.0 >= num_blocks {
                    Err(CfgError::UnknownTarget {
                        block: bb.name.clone(),
                        target: target.0,
                    })
                } else {
                    Ok(())
                }
            };
            match &bb.terminator {
                Terminator::Goto(t) => check(*t)?,
                Terminator::Branch {
                    then_to, else_to, ..
                } => {
                    check(*then_to)?;
                    check(*else_to)?;
                }
                Terminator::Return => {
                    if BlockId(i) != exit {
                        return Err(CfgError::ReturnOutsideExit(bb.name.clone()));
                    }
                }
            }
        }
        let exit_bb = &blocks[exit.0];
        if !matches!(exit_bb.terminator, Terminator::Return) {
            return Err(CfgError::ExitNotReturn(exit_bb.name.clone()));
        }
        if !exit_bb.stmts.is_empty() {
            return Err(CfgError::NonEmptyExit(exit_bb.name.clone()));
        }
        Ok(Procedure {
            name: self.name,
            blocks,
            vars: self.vars,
            entry,
            exit,
        })
    }
}
