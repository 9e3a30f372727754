//! # Dominance Analysis
//!
//! This module computes the dominator tree of a block order using the
//! Cooper-Harvey-Kennedy algorithm: immediate dominators are derived
//! directly by intersecting predecessor dominators in reverse postorder
//! until a fixpoint is reached. O(n²) worst case, near-linear in practice.
//!
//! The stackifier uses it for one query: the common dominator of all
//! predecessors of a jump target, which is the latest block a labeled
//! block may open at while still containing every branch into the target.

use index_vec::IndexVec;

use crate::{BlockId, BlockOrder};

/// Immediate-dominator tree for one block order
///
/// Blocks unreachable from the entry block have no dominator information;
/// they are ignored by [`common_dominator`](Self::common_dominator).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DominatorTree {
    /// `idom[b]` is meaningful only where `reachable[b]`; the entry block
    /// maps to itself
    idom: IndexVec<BlockId, BlockId>,
    reachable: IndexVec<BlockId, bool>,
    rpo_index: IndexVec<BlockId, usize>,
}

impl DominatorTree {
    /// Computes the dominator tree for a block order
    pub fn compute(blocks: &BlockOrder) -> Self {
        let block_count = blocks.block_count();
        let entry = BlockId::from_raw(0);

        let rpo = reverse_postorder(blocks);
        let mut rpo_index: IndexVec<BlockId, usize> =
            IndexVec::from_vec(vec![usize::MAX; block_count]);
        for (i, &block) in rpo.iter().enumerate() {
            rpo_index[block] = i;
        }

        // `idom[b] == b` doubles as the entry's fixpoint and the initial
        // state of unprocessed blocks; `processed` tells them apart.
        let mut idom: IndexVec<BlockId, BlockId> =
            (0..block_count).map(BlockId::from_raw).collect();
        let mut processed: IndexVec<BlockId, bool> =
            IndexVec::from_vec(vec![false; block_count]);
        processed[entry] = true;

        let mut changed = true;
        while changed {
            changed = false;
            for &block in rpo.iter().skip(1) {
                let mut new_idom: Option<BlockId> = None;
                for &pred in blocks.predecessors(block) {
                    if !processed[pred] {
                        continue;
                    }
                    new_idom = Some(match new_idom {
                        None => pred,
                        Some(current) => intersect(&idom, &rpo_index, pred, current),
                    });
                }
                if let Some(new_idom) = new_idom {
                    if !processed[block] || idom[block] != new_idom {
                        idom[block] = new_idom;
                        processed[block] = true;
                        changed = true;
                    }
                }
            }
        }

        Self {
            idom,
            reachable: processed,
            rpo_index,
        }
    }

    /// Returns the immediate dominator of a block
    ///
    /// The entry block and unreachable blocks have none.
    pub fn immediate_dominator(&self, block: BlockId) -> Option<BlockId> {
        if self.reachable[block] && self.idom[block] != block {
            Some(self.idom[block])
        } else {
            None
        }
    }

    /// Returns true if `a` dominates `b` (every block dominates itself)
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        if !self.reachable[a] || !self.reachable[b] {
            return false;
        }
        let mut current = b;
        loop {
            if current == a {
                return true;
            }
            let next = self.idom[current];
            if next == current {
                return false;
            }
            current = next;
        }
    }

    /// Returns the deepest block through which control must pass on every
    /// path to each of the given blocks
    ///
    /// Unreachable blocks are skipped; returns `None` for an empty (or
    /// entirely unreachable) input.
    pub fn common_dominator(&self, blocks: impl IntoIterator<Item = BlockId>) -> Option<BlockId> {
        blocks
            .into_iter()
            .filter(|&b| self.reachable[b])
            .reduce(|a, b| intersect(&self.idom, &self.rpo_index, a, b))
    }
}

/// Cooper's two-finger intersection: walk both blocks up the dominator
/// tree until they meet. The entry block is its own `idom`, and has the
/// smallest reverse-postorder number, so the walk always terminates.
fn intersect(
    idom: &IndexVec<BlockId, BlockId>,
    rpo_index: &IndexVec<BlockId, usize>,
    mut a: BlockId,
    mut b: BlockId,
) -> BlockId {
    while a != b {
        while rpo_index[a] > rpo_index[b] {
            a = idom[a];
        }
        while rpo_index[b] > rpo_index[a] {
            b = idom[b];
        }
    }
    a
}

/// Blocks reachable from the entry, in reverse postorder
fn reverse_postorder(blocks: &BlockOrder) -> Vec<BlockId> {
    let entry = BlockId::from_raw(0);
    let mut visited: IndexVec<BlockId, bool> =
        IndexVec::from_vec(vec![false; blocks.block_count()]);
    let mut postorder = Vec::with_capacity(blocks.block_count());

    // Iterative DFS; each frame records how many successors it has pushed.
    let mut stack: Vec<(BlockId, usize)> = vec![(entry, 0)];
    visited[entry] = true;
    while let Some(frame) = stack.last_mut() {
        let (block, cursor) = (frame.0, frame.1);
        let successors = blocks.successors(block);
        if cursor < successors.len() {
            frame.1 += 1;
            let successor = successors[cursor];
            if !visited[successor] {
                visited[successor] = true;
                stack.push((successor, 0));
            }
        } else {
            postorder.push(block);
            stack.pop();
        }
    }

    postorder.reverse();
    postorder
}
