//! # Edge Classification
//!
//! This module decides, per forward edge, whether reaching the successor
//! requires an explicit labeled block, or whether an existing construct
//! (loop exit, if/else arm, switch arm, catch handler) or plain
//! fallthrough already expresses the jump.
//!
//! The decision procedure is ordered; the first matching case wins. It is
//! a pure predicate over the block order and scope tree: the same
//! predicate runs once while placing labels and again in the emitter when
//! it prints `break` statements.

use log::trace;

use crate::{
    BlockId, BlockOrder, ScopeRole, ScopeTree, StackifyError, StackifyResult, Terminator,
    TerminatorScopes,
};

/// Returns true if the edge `block -> successor` needs a labeled block
///
/// `successor` must be a successor of `block`; anything else is a
/// consistency bug in the caller and fails the unit.
pub fn is_label_needed(
    blocks: &BlockOrder,
    scopes: &ScopeTree,
    block: BlockId,
    successor: BlockId,
) -> StackifyResult<bool> {
    if !blocks.successors(block).contains(&successor) {
        return Err(StackifyError::NotASuccessor { block, successor });
    }

    let needed = decide(blocks, scopes, block, successor);
    trace!(
        "edge block_{} -> block_{}: label {}",
        block.index(),
        successor.index(),
        if needed { "needed" } else { "not needed" }
    );
    Ok(needed)
}

fn decide(blocks: &BlockOrder, scopes: &ScopeTree, block: BlockId, successor: BlockId) -> bool {
    // A back edge is closed by the loop construct itself.
    if blocks.is_loop_end(block) {
        return false;
    }

    // Leaving the innermost loop for the block just past its scope is a
    // plain unlabeled loop exit.
    if let Some(loop_id) = blocks.loop_of(block) {
        let header = blocks.loop_header(loop_id);
        if let Some(TerminatorScopes::Loop { body }) = scopes.scope_of_terminator(header) {
            if successor.index() == scopes.last_block(*body).index() + 1 {
                return false;
            }
        }
    }

    match blocks.terminator(block) {
        // A captured branch arm is the construct's natural continuation.
        Terminator::Branch {
            then_target,
            else_target,
        } => {
            if let Some(TerminatorScopes::If {
                then_scope,
                else_scope,
            }) = scopes.scope_of_terminator(block)
            {
                if successor == *then_target && then_scope.is_some() {
                    return false;
                }
                if successor == *else_target && else_scope.is_some() {
                    return false;
                }
            }
        }

        Terminator::Invoke { target, handler } => {
            if let Some(TerminatorScopes::Catch {
                handler: handler_scope,
            }) = scopes.scope_of_terminator(block)
            {
                if successor == *target {
                    // The normal path needs a label only when it must hop
                    // over handler code emitted before the target.
                    if let Some(handler_scope) = handler_scope {
                        return blocks
                            .between(block, successor)
                            .any(|x| scopes.contains(*handler_scope, x));
                    }
                    return false;
                }
                if successor == *handler && handler_scope.is_some() {
                    return false;
                }
            }
        }

        // A captured switch arm breaks structurally; an uncaptured one
        // needs an explicit label to reach its target.
        Terminator::Switch { targets } => {
            if let Some(TerminatorScopes::Switch { cases }) = scopes.scope_of_terminator(block) {
                if let Some(arm) = targets.iter().position(|t| *t == successor) {
                    return cases[arm].is_none();
                }
            }
        }

        Terminator::Goto { .. } | Terminator::Return => {}
    }

    // The tail of a then arm falls past its else arm implicitly; jumping
    // anywhere else out of the arm needs a label.
    for scope_id in scopes.scopes_closing_at(block) {
        if let ScopeRole::Then { branch } = scopes.scope(scope_id).role() {
            if let Some(TerminatorScopes::If {
                else_scope: Some(else_scope),
                ..
            }) = scopes.scope_of_terminator(branch)
            {
                let skips_only_else = blocks
                    .between(block, successor)
                    .all(|x| scopes.contains(*else_scope, x));
                return !skips_only_else;
            }
        }
    }

    // A switch-arm tail always breaks to a label wrapping the switch, even
    // when its target happens to be the next block in order.
    for scope_id in scopes.scopes_closing_at(block) {
        if matches!(scopes.scope(scope_id).role(), ScopeRole::Case { .. }) {
            return true;
        }
    }

    // Anything other than a fall-through to the next block needs a label.
    successor.index() != block.index() + 1
}
