//! # Label Placement
//!
//! Given an edge that needs a labeled block ending at its target, this
//! module computes the earliest block at which the label must open. The
//! label is placed as late as possible — close to the jump source — while
//! still containing every branch into the target, respecting the scope
//! nesting, and properly containing every previously placed label that
//! closes inside its range.

use log::debug;

use crate::{
    BlockId, BlockOrder, DominatorTree, LabelRegistry, ScopeTree, StackifyError, StackifyResult,
};

/// Computes the start block of a labeled block ending at `successor`
///
/// Deterministic and total for a well-formed scope tree; the only failure
/// is a jump that would have to originate outside a scope and land inside
/// it, which no nesting of labeled blocks can express.
pub fn compute_start(
    blocks: &BlockOrder,
    scopes: &ScopeTree,
    doms: &DominatorTree,
    registry: &LabelRegistry,
    predecessor: BlockId,
    successor: BlockId,
) -> StackifyResult<BlockId> {
    let mut earliest = predecessor;

    // Every branch into `successor` must lie inside the labeled block, so
    // with several predecessors it can open no later than their common
    // dominator.
    let predecessors = blocks.predecessors(successor);
    if predecessors.len() > 1 {
        if let Some(dominator) = doms.common_dominator(predecessors.iter().copied()) {
            earliest = dominator;
        }
    }

    let start_scope = scopes.enclosing_scope(earliest);
    let mut end_scope = scopes.enclosing_scope(successor);
    if blocks.is_loop_header(successor) {
        // A loop header's own enclosing scope is its loop body; the jump
        // lands before the loop is entered, in the scope holding the loop
        // as a whole.
        end_scope = end_scope.and_then(|s| scopes.parent(s));
    }

    if start_scope != end_scope {
        // Climb out of the start scope until one level below the end
        // scope; the labeled block must open where that scope opens.
        let mut scope = start_scope;
        loop {
            let Some(current) = scope else {
                return Err(StackifyError::NestingImpossible {
                    predecessor,
                    successor,
                });
            };
            if scopes.parent(current) == end_scope {
                earliest = scopes.start_block(current);
                break;
            }
            scope = scopes.parent(current);
        }
    }

    // Any already-placed label closing inside the new range must be fully
    // contained by it, or the two blocks would cross.
    for label in registry.labels() {
        if label.end().index() > predecessor.index()
            && label.end().index() < successor.index()
            && label.start().index() < earliest.index()
        {
            earliest = label.start();
        }
    }

    debug!(
        "labeled block for edge block_{} -> block_{} opens at block_{}",
        predecessor.index(),
        successor.index(),
        earliest.index()
    );
    Ok(earliest)
}
