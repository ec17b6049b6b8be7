//! CFG flattening over cutpoints.
//!
//! Flattening reduces a procedure with loops to a finite set of
//! loop-free cutpoint-to-cutpoint edges, encodes each edge with the
//! [`VcGen`], and deposits the results into a transition-relation
//! database. Two strategies are offered: large-block, where only the
//! entry, the exit, and the loop headers are cutpoints, and
//! small-block, where every reachable block is one.

use cutflow_cfg::cfg::{BlockId, Procedure};
use cutflow_cfg::loops::{loop_headers, predecessors, reachable};
use indexmap::IndexSet;
use tracing::debug;

use crate::db::TransRelationDB;
use crate::opsem::{EncodeError, OpSem, SideCondition};
use crate::terms::{TermFactory, TermId};
use crate::vcgen::{CpEdge, VcGen};

/// Name of the synthetic symbol bound to the destination cutpoint's
/// location in every value vector. It lets exporters recover which
/// cutpoint a transition jumps to while guards stay pure path
/// conditions.
pub const CUTPOINT_NEXT: &str = "@cutpoint'";

/// Which blocks become cutpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlatteningStrategy {
    /// Entry, exit, and every loop header.
    #[default]
    LargeBlock,
    /// Every reachable block.
    SmallBlock,
}

/// One term arena and one database, owned together.
///
/// A session covers exactly one procedure encoding. Keeping sessions
/// independent means a failed encoding can be dropped wholesale without
/// other procedures ever seeing its terms.
#[derive(Debug, Default)]
pub struct EncodingSession {
    pub factory: TermFactory,
    pub db: TransRelationDB,
}

impl EncodingSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empties the database while keeping the interned terms.
    pub fn reset(&mut self) {
        self.db.clear();
    }
}

/// Enumerates loop-free cutpoint edges by walking the CFG backwards.
pub struct PathEnumerator<'a> {
    procedure: &'a Procedure,
    preds: Vec<Vec<BlockId>>,
    live: IndexSet<BlockId>,
    cutpoints: IndexSet<BlockId>,
}

impl<'a> PathEnumerator<'a> {
    pub fn new(procedure: &'a Procedure, strategy: FlatteningStrategy) -> Self {
        let live = reachable(procedure);
        let cutpoints = match strategy {
            FlatteningStrategy::LargeBlock => {
                let mut cps = IndexSet::new();
                cps.insert(procedure.entry());
                cps.extend(loop_headers(procedure));
                cps.insert(procedure.exit());
                cps
            }
            FlatteningStrategy::SmallBlock => live.clone(),
        };
        Self {
            procedure,
            preds: predecessors(procedure),
            live,
            cutpoints,
        }
    }

    /// Builds an enumerator over a caller-chosen cutpoint set.
    ///
    /// The set is taken as given; if it misses a loop header, edge
    /// enumeration for the blocked destination fails with
    /// [`EncodeError::MalformedCfg`].
    pub fn with_cutpoints(procedure: &'a Procedure, cutpoints: IndexSet<BlockId>) -> Self {
        Self {
            procedure,
            preds: predecessors(procedure),
            live: reachable(procedure),
            cutpoints,
        }
    }

    pub fn cutpoints(&self) -> &IndexSet<BlockId> {
        &self.cutpoints
    }

    /// All cutpoint edges of the procedure, destination by destination.
    pub fn edges(&self) -> Result<Vec<CpEdge>, EncodeError> {
        let mut out = Vec::new();
        for &dst in &self.cutpoints {
            if !self.live.contains(&dst) {
                continue;
            }
            let found = self.walk_to_roots(dst);
            let has_live_pred = self.preds[dst.0].iter().any(|p| self.live.contains(p));
            if found.is_empty() && has_live_pred {
                return Err(EncodeError::malformed(format!(
                    "no cutpoint reaches {} over loop-free paths; a loop header is missing \
                     from the cutpoint set",
                    self.procedure.block_name(dst)
                )));
            }
            out.extend(found);
        }
        Ok(out)
    }

    /// Walks backwards from `dst` until every path hits a cutpoint,
    /// pruning paths that revisit a block.
    fn walk_to_roots(&self, dst: BlockId) -> Vec<CpEdge> {
        let mut edges = Vec::new();
        // Each entry is (head, tail): the candidate path is head
        // followed by tail, with dst excluded.
        let mut stack: Vec<(BlockId, Vec<BlockId>)> = Vec::new();
        for &p in &self.preds[dst.0] {
            if self.live.contains(&p) {
                stack.push((p, Vec::new()));
            }
        }
        while let Some((b, tail)) = stack.pop() {
            if self.cutpoints.contains(&b) {
                let mut blocks = Vec::with_capacity(tail.len() + 1);
                blocks.push(b);
                blocks.extend_from_slice(&tail);
                edges.push(CpEdge { src: b, dst, blocks });
                continue;
            }
            if tail.contains(&b) {
                // Cycled through a non-cutpoint; this path cannot be
                // completed loop-free.
                continue;
            }
            let mut extended = Vec::with_capacity(tail.len() + 1);
            extended.push(b);
            extended.extend_from_slice(&tail);
            for &p in &self.preds[b.0] {
                if self.live.contains(&p) {
                    stack.push((p, extended.clone()));
                }
            }
        }
        edges
    }
}

/// Flattens `procedure` under `strategy` and fills the session's
/// database.
///
/// All edges are encoded before anything is committed: if any edge
/// fails, the database is left exactly as it was.
pub fn encode_procedure<S: OpSem>(
    procedure: &Procedure,
    strategy: FlatteningStrategy,
    opsem: &S,
    session: &mut EncodingSession,
) -> Result<(), EncodeError> {
    let enumerator = PathEnumerator::new(procedure, strategy);
    encode_with(procedure, &enumerator, opsem, session)
}

/// Like [`encode_procedure`] but over a prepared enumerator, so callers
/// can supply their own cutpoint set.
pub fn encode_with<S: OpSem>(
    procedure: &Procedure,
    enumerator: &PathEnumerator<'_>,
    opsem: &S,
    session: &mut EncodingSession,
) -> Result<(), EncodeError> {
    let edges = enumerator.edges()?;
    let vcgen = VcGen::new(procedure, opsem);

    let mut pending = Vec::with_capacity(edges.len());
    for edge in &edges {
        let conds = vcgen.exec_cp_edge(&mut session.factory, edge)?;
        let row = lower_edge(&mut session.factory, procedure, edge, &conds);
        pending.push(row);
    }

    for &cp in enumerator.cutpoints() {
        let loc = session.factory.mk_loc(procedure.block_name(cp));
        session.db.register_location(loc);
    }
    for (guard, values) in pending {
        session.db.add_transition(guard, values);
    }
    debug!(
        procedure = procedure.name(),
        cutpoints = enumerator.cutpoints().len(),
        edges = edges.len(),
        guards = session.db.num_guards(),
        "flattened procedure"
    );
    Ok(())
}

/// Splits an edge's side conditions into its guard (the conjunction of
/// all guard clauses) and its value vector (the facts plus the
/// destination-cutpoint binding).
fn lower_edge(
    factory: &mut TermFactory,
    procedure: &Procedure,
    edge: &CpEdge,
    conds: &[SideCondition],
) -> (TermId, Vec<TermId>) {
    let mut guard = factory.mk_true();
    let mut values = Vec::new();
    for c in conds {
        if c.is_guard() {
            guard = factory.mk_and(guard, c.term);
        } else {
            values.push(c.term);
        }
    }
    let next = factory.mk_sym(CUTPOINT_NEXT, 0);
    let loc = factory.mk_loc(procedure.block_name(edge.dst));
    let binding = factory.mk_eq(next, loc);
    values.push(binding);
    (guard, values)
}
