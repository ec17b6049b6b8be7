//! Loop-structure analysis over a procedure's CFG.
//!
//! Classifies back-edge targets (loop headers) with an iterative
//! tricolor depth-first search and provides the predecessor map and the
//! entry-reachable block set. All traversals use explicit work stacks;
//! recursion depth must not scale with procedure size.

use indexmap::IndexSet;

use crate::cfg::{BlockId, Procedure};

/// Predecessor lists for every block, indexed by block id.
pub fn predecessors(procedure: &Procedure) -> Vec<Vec<BlockId>> {
    let mut preds = vec![Vec::new(); procedure.num_blocks()];
    for b in procedure.block_ids() {
        for s in procedure.successors(b) {
            preds[s.0].push(b);
        }
    }
    preds
}

/// Blocks reachable from the entry, in deterministic discovery order.
pub fn reachable(procedure: &Procedure) -> IndexSet<BlockId> {
    let mut seen = IndexSet::new();
    let mut stack = vec![procedure.entry()];
    while let Some(b) = stack.pop() {
        if seen.insert(b) {
            for s in procedure.successors(b) {
                if !seen.contains(&s) {
                    stack.push(s);
                }
            }
        }
    }
    seen
}

/// Back-edge targets of the CFG, i.e. the loop headers.
///
/// A successor edge into a block that is still on the DFS stack (gray)
/// is a back edge; its target can repeat and must become a cutpoint
/// under large-block flattening.
pub fn loop_headers(procedure: &Procedure) -> IndexSet<BlockId> {
    #[derive(Clone, Copy, PartialEq)]
    enum Color {
        White,
        Gray,
        Black,
    }

    let mut color = vec![Color::White; procedure.num_blocks()];
    let mut headers = IndexSet::new();
    let mut stack: Vec<(BlockId, usize)> = vec![(procedure.entry(), 0)];
    color[procedure.entry().0] = Color::Gray;

    while let Some(frame) = stack.last_mut() {
        let b = frame.0;
        let idx = frame.1;
        let succs = procedure.successors(b);
        if idx < succs.len() {
            frame.1 = idx + 1;
            let s = succs[idx];
            match color[s.0] {
                Color::White => {
                    color[s.0] = Color::Gray;
                    stack.push((s, 0));
                }
                Color::Gray => {
                    headers.insert(s);
                }
                Color::Black => {}
            }
        } else {
            color[b.0] = Color::Black;
            stack.pop();
        }
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::{Expr, ProcedureBuilder, Terminator};

    fn branch(cond: Expr, then_to: BlockId, else_to: BlockId) -> Terminator {
        Terminator::Branch {
            cond,
            then_to,
            else_to,
        }
    }

    /// entry -> loop; loop -> loop | exit.
    fn looped() -> (Procedure, BlockId) {
        let mut b = ProcedureBuilder::new("looped");
        let x = b.var("x");
        let entry = b.block("entry");
        let header = b.block("header");
        let exit = b.block("exit");
        b.fill(entry, vec![], Terminator::Goto(header));
        b.fill(
            header,
            vec![],
            branch(Expr::int(0).lt(Expr::var(x)), header, exit),
        );
        b.fill(exit, vec![], Terminator::Return);
        (b.finish(entry, exit).unwrap(), header)
    }

    #[test]
    fn predecessors_cover_all_edges() {
        let (p, header) = looped();
        let preds = predecessors(&p);
        assert_eq!(preds[p.entry().0], Vec::<BlockId>::new());
        assert_eq!(preds[header.0], vec![p.entry(), header]);
        assert_eq!(preds[p.exit().0], vec![header]);
    }

    #[test]
    fn self_loop_is_a_header() {
        let (p, header) = looped();
        let headers = loop_headers(&p);
        assert_eq!(headers.len(), 1);
        assert!(headers.contains(&header));
    }

    #[test]
    fn straight_line_has_no_headers() {
        let mut b = ProcedureBuilder::new("straight");
        let entry = b.block("entry");
        let exit = b.block("exit");
        b.fill(entry, vec![], Terminator::Goto(exit));
        b.fill(exit, vec![], Terminator::Return);
        let p = b.finish(entry, exit).unwrap();
        assert!(loop_headers(&p).is_empty());
    }

    #[test]
    fn two_block_cycle_has_one_header() {
        let mut b = ProcedureBuilder::new("cycle");
        let x = b.var("x");
        let entry = b.block("entry");
        let a = b.block("a");
        let c = b.block("c");
        let exit = b.block("exit");
        b.fill(entry, vec![], Terminator::Goto(a));
        b.fill(a, vec![], Terminator::Goto(c));
        b.fill(c, vec![], branch(Expr::int(0).lt(Expr::var(x)), a, exit));
        b.fill(exit, vec![], Terminator::Return);
        let p = b.finish(entry, exit).unwrap();
        let headers = loop_headers(&p);
        assert_eq!(headers.len(), 1);
        assert!(headers.contains(&a));
    }

    #[test]
    fn unreachable_blocks_are_excluded() {
        let mut b = ProcedureBuilder::new("orphan");
        let entry = b.block("entry");
        let orphan = b.block("orphan");
        let exit = b.block("exit");
        b.fill(entry, vec![], Terminator::Goto(exit));
        b.fill(orphan, vec![], Terminator::Goto(exit));
        b.fill(exit, vec![], Terminator::Return);
        let p = b.finish(entry, exit).unwrap();
        let seen = reachable(&p);
        assert!(seen.contains(&entry));
        assert!(seen.contains(&exit));
        assert!(!seen.contains(&orphan));
    }
}
