//! # Label Generation Driver
//!
//! This module runs the single pass that produces the label registry:
//! blocks in ascending emission order, successors in terminator order,
//! classify each edge, place a labeled block where one is needed, and
//! reuse an existing label whenever one already closes at the jump target.

use log::debug;

use crate::analysis::DominatorTree;
use crate::classify::is_label_needed;
use crate::placement::compute_start;
use crate::{BlockOrder, LabelRegistry, ScopeTree, StackifyResult};

/// Synthesizes the labeled blocks for one function
///
/// Computes the dominator tree itself; callers that already have one can
/// use [`generate_with_dominators`].
pub fn generate(blocks: &BlockOrder, scopes: &ScopeTree) -> StackifyResult<LabelRegistry> {
    let doms = DominatorTree::compute(blocks);
    generate_with_dominators(blocks, scopes, &doms)
}

/// Synthesizes the labeled blocks for one function, reusing a dominator
/// tree computed by the caller
pub fn generate_with_dominators(
    blocks: &BlockOrder,
    scopes: &ScopeTree,
    doms: &DominatorTree,
) -> StackifyResult<LabelRegistry> {
    let mut registry = LabelRegistry::new(blocks.block_count());

    for block in blocks.ids() {
        for &successor in blocks.successors(block) {
            if !is_label_needed(blocks, scopes, block, successor)? {
                continue;
            }
            let start = compute_start(blocks, scopes, doms, &registry, block, successor)?;
            if registry.already_ends_before(successor) {
                // The existing label closes exactly where this edge needs
                // to land; the emitter breaks on it.
                continue;
            }
            let id = registry.create(start, successor)?;
            debug!(
                "created {} spanning [block_{}, block_{}) for edge block_{} -> block_{}",
                registry.label(id).name(),
                start.index(),
                successor.index(),
                block.index(),
                successor.index()
            );
        }
    }

    Ok(registry)
}
