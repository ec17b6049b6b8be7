//! Verification-condition generation for one cutpoint edge.
//!
//! An edge is a loop-free block path from a source cutpoint up to, but
//! not including, a destination cutpoint. The generator threads a fresh
//! symbolic store through the blocks in order, delegating statement
//! meaning to the [`OpSem`] seam, and returns the accumulated side
//! conditions. Errors are fatal for the edge: nothing partial escapes.

use cutflow_cfg::cfg::{BlockId, Procedure};
use tracing::trace;

use crate::opsem::{EncodeError, OpSem, SideCondition};
use crate::store::SymStore;
use crate::terms::TermFactory;

/// A loop-free path between two cutpoints.
///
/// `blocks` holds the executed blocks in forward order, starting with
/// `src`; `dst` itself is not executed, its statements belong to its
/// own outgoing edges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpEdge {
    pub src: BlockId,
    pub dst: BlockId,
    pub blocks: Vec<BlockId>,
}

impl CpEdge {
    /// True when no executed block repeats.
    pub fn is_acyclic(&self) -> bool {
        for (i, b) in self.blocks.iter().enumerate() {
            if self.blocks[i + 1..].contains(b) {
                return false;
            }
        }
        true
    }
}

/// Symbolic executor for cutpoint edges.
pub struct VcGen<'a, S: OpSem> {
    procedure: &'a Procedure,
    opsem: &'a S,
}

impl<'a, S: OpSem> VcGen<'a, S> {
    pub fn new(procedure: &'a Procedure, opsem: &'a S) -> Self {
        Self { procedure, opsem }
    }

    /// Executes `edge` symbolically and returns its side conditions.
    pub fn exec_cp_edge(
        &self,
        factory: &mut TermFactory,
        edge: &CpEdge,
    ) -> Result<Vec<SideCondition>, EncodeError> {
        if edge.blocks.is_empty() {
            return Err(EncodeError::malformed(format!(
                "empty edge {} -> {}",
                edge.src, edge.dst
            )));
        }
        if edge.blocks[0] != edge.src {
            return Err(EncodeError::malformed(format!(
                "edge {} -> {} does not start at its source",
                edge.src, edge.dst
            )));
        }
        if !edge.is_acyclic() {
            return Err(EncodeError::malformed(format!(
                "edge {} -> {} repeats a block",
                edge.src, edge.dst
            )));
        }

        let mut store = SymStore::new();
        let mut conds = Vec::new();
        let len = edge.blocks.len();
        for (i, &block) in edge.blocks.iter().enumerate() {
            let last = i + 1 == len;
            let taken = if last { edge.dst } else { edge.blocks[i + 1] };
            trace!(
                block = %self.procedure.block_name(block),
                taken = %self.procedure.block_name(taken),
                last,
                "executing block"
            );
            conds.extend(
                self.opsem
                    .exec(factory, &mut store, self.procedure, block, taken, last)?,
            );
        }
        Ok(conds)
    }
}
