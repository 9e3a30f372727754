//! End-to-end tests for label generation: one scenario per control
//! construct family, plus randomized invariant checks over forward-edge
//! CFGs.

use proptest::prelude::*;

use crate::testing::bid;
use crate::{
    generate, BlockOrder, BlockOrderBuilder, PrettyPrint, ScopeTree, ScopeTreeBuilder, Terminator,
};

#[test]
fn test_linear_chain_needs_no_labels() {
    let mut builder = BlockOrderBuilder::new();
    builder.block(Terminator::goto(bid(1)));
    builder.block(Terminator::goto(bid(2)));
    builder.block(Terminator::ret());
    let order = builder.build().unwrap();

    let registry = generate(&order, &ScopeTree::empty(3)).unwrap();
    assert!(registry.is_empty());
}

#[test]
fn test_if_else_merge_needs_no_labels() {
    let mut builder = BlockOrderBuilder::new();
    builder.block(Terminator::branch(bid(1), bid(2)));
    builder.block(Terminator::goto(bid(3)));
    builder.block(Terminator::goto(bid(3)));
    builder.block(Terminator::ret());
    let order = builder.build().unwrap();

    let mut scopes = ScopeTreeBuilder::new();
    let then_scope = scopes.scope(bid(1), bid(1));
    let else_scope = scopes.scope(bid(2), bid(2));
    scopes.branch_scopes(bid(0), Some(then_scope), Some(else_scope));
    let tree = scopes.build(&order).unwrap();

    let registry = generate(&order, &tree).unwrap();
    assert!(registry.is_empty());
}

#[test]
fn test_if_without_else_early_exit() {
    // The then arm jumps straight past the uncaptured false path; its
    // label has to wrap the whole branch construct.
    let mut builder = BlockOrderBuilder::new();
    builder.block(Terminator::branch(bid(1), bid(2)));
    builder.block(Terminator::goto(bid(3)));
    builder.block(Terminator::ret());
    builder.block(Terminator::ret());
    let order = builder.build().unwrap();

    let mut scopes = ScopeTreeBuilder::new();
    let then_scope = scopes.scope(bid(1), bid(1));
    scopes.branch_scopes(bid(0), Some(then_scope), None);
    let tree = scopes.build(&order).unwrap();

    let registry = generate(&order, &tree).unwrap();

    // The early exit lands just before block 3, wrapped from block 0.
    let exit = registry.ends_at(bid(3)).unwrap();
    assert_eq!(exit.start(), bid(0));
    // The uncaptured false edge gets its own label into block 2.
    let false_edge = registry.ends_at(bid(2)).unwrap();
    assert_eq!(false_edge.start(), bid(0));
    assert_eq!(registry.len(), 2);
}

#[test]
fn test_switch_with_uncaptured_arm() {
    let mut builder = BlockOrderBuilder::new();
    builder.block(Terminator::switch(vec![bid(1), bid(2), bid(3)]));
    builder.block(Terminator::goto(bid(4)));
    builder.block(Terminator::goto(bid(4)));
    builder.block(Terminator::goto(bid(4)));
    builder.block(Terminator::ret());
    let order = builder.build().unwrap();

    let mut scopes = ScopeTreeBuilder::new();
    let arm0 = scopes.scope(bid(1), bid(1));
    let arm2 = scopes.scope(bid(3), bid(3));
    scopes.switch_scopes(bid(0), vec![Some(arm0), None, Some(arm2)]);
    let tree = scopes.build(&order).unwrap();

    let registry = generate(&order, &tree).unwrap();

    // One label reaches the uncaptured arm, one wraps the whole switch as
    // the shared landing pad for the arm tails; all arms reuse the latter.
    assert_eq!(
        registry.pretty_print(0),
        "block_0: open label_1 (end block_4), open label_0 (end block_2)\n\
         block_2: close label_0\n\
         block_4: close label_1\n"
    );
}

#[test]
fn test_loop_with_ordinary_exit_and_far_break() {
    // Loop over [0..3]; block 4 is the ordinary exit target, while block 2
    // breaks further out, past the exit code.
    let mut builder = BlockOrderBuilder::new();
    builder.block(Terminator::branch(bid(1), bid(4)));
    builder.block(Terminator::branch(bid(2), bid(4)));
    builder.block(Terminator::branch(bid(3), bid(5)));
    builder.block(Terminator::goto(bid(0)));
    builder.block(Terminator::goto(bid(5)));
    builder.block(Terminator::ret());
    builder.add_loop(bid(0), &[bid(0), bid(1), bid(2), bid(3)]);
    let order = builder.build().unwrap();

    let mut scopes = ScopeTreeBuilder::new();
    let body = scopes.scope(bid(0), bid(3));
    scopes.loop_body(bid(0), body);
    let tree = scopes.build(&order).unwrap();

    let registry = generate(&order, &tree).unwrap();

    // Both ordinary exits and the back edge are free; only the far break
    // needs a label, wrapping the loop as a whole.
    assert_eq!(registry.len(), 1);
    let label = registry.ends_at(bid(5)).unwrap();
    assert_eq!(label.start(), bid(0));
    assert!(registry.ends_at(bid(4)).is_none());
}

#[test]
fn test_label_reused_for_shared_target() {
    let mut builder = BlockOrderBuilder::new();
    builder.block(Terminator::branch(bid(1), bid(3)));
    builder.block(Terminator::goto(bid(2)));
    builder.block(Terminator::goto(bid(6)));
    builder.block(Terminator::goto(bid(4)));
    builder.block(Terminator::branch(bid(5), bid(6)));
    builder.block(Terminator::goto(bid(6)));
    builder.block(Terminator::ret());
    let order = builder.build().unwrap();

    let registry = generate(&order, &ScopeTree::empty(7)).unwrap();

    // Blocks 2 and 4 both jump to 6; the second request reuses the first
    // label instead of creating another one ending there.
    assert_eq!(registry.len(), 2);
    let shared = registry.ends_at(bid(6)).unwrap();
    assert_eq!(shared.start(), bid(0));
    assert_eq!(shared.name(), "label_1");
    assert!(registry.ends_at(bid(3)).is_some());
}

#[test]
fn test_generate_is_deterministic() {
    let mut builder = BlockOrderBuilder::new();
    builder.block(Terminator::switch(vec![bid(1), bid(2), bid(3)]));
    builder.block(Terminator::goto(bid(4)));
    builder.block(Terminator::goto(bid(4)));
    builder.block(Terminator::goto(bid(4)));
    builder.block(Terminator::ret());
    let order = builder.build().unwrap();
    let tree = ScopeTree::empty(5);

    let first = generate(&order, &tree).unwrap();
    let second = generate(&order, &tree).unwrap();
    assert_eq!(first, second);
}

// --- Randomized invariants ---

/// Builds a forward-edge CFG where every block falls through to the next,
/// with extra skip edges chosen by `picks`; all blocks stay reachable.
fn forward_cfg(picks: &[(u8, usize, usize)]) -> BlockOrder {
    let block_count = picks.len() + 1;
    let mut builder = BlockOrderBuilder::new();
    for (i, &(kind, t, u)) in picks.iter().enumerate() {
        let next = bid(i + 1);
        let span = block_count - i - 1;
        let skip_t = bid(i + 1 + t % span);
        let skip_u = bid(i + 1 + u % span);
        let terminator = match kind {
            0 => Terminator::goto(next),
            1 => Terminator::branch(next, skip_t),
            _ => Terminator::switch(vec![next, skip_t, skip_u]),
        };
        builder.block(terminator);
    }
    builder.block(Terminator::ret());
    builder.build().unwrap()
}

proptest! {
    #[test]
    fn prop_labels_nest_and_cover(picks in prop::collection::vec((0u8..3, 0usize..64, 0usize..64), 3..20)) {
        let order = forward_cfg(&picks);
        let tree = ScopeTree::empty(order.block_count());
        let registry = generate(&order, &tree).unwrap();

        // Labeled blocks are half-open [start, end) intervals and must be
        // disjoint or properly nested, never partially overlapping.
        for a in registry.labels() {
            for b in registry.labels() {
                if a.id() == b.id() {
                    continue;
                }
                let (a_start, a_end) = (a.start().index(), a.end().index());
                let (b_start, b_end) = (b.start().index(), b.end().index());
                let overlap = a_start.max(b_start) < a_end.min(b_end);
                let a_in_b = b_start <= a_start && a_end <= b_end;
                let b_in_a = a_start <= b_start && b_end <= a_end;
                prop_assert!(!overlap || a_in_b || b_in_a);
            }
        }

        // No two labels close before the same block.
        for a in registry.labels() {
            prop_assert_eq!(registry.ends_at(a.end()).unwrap().id(), a.id());
        }

        // Every edge that needs a label is covered by the label closing at
        // its target, and every label is justified by such an edge.
        for block in order.ids() {
            for &successor in order.successors(block) {
                if crate::is_label_needed(&order, &tree, block, successor).unwrap() {
                    let label = registry.ends_at(successor);
                    prop_assert!(label.is_some());
                    prop_assert!(label.unwrap().start().index() <= block.index());
                }
            }
        }
        for label in registry.labels() {
            let justified = label.end().index() > 0 && order.predecessors(label.end()).iter().any(
                |&pred| crate::is_label_needed(&order, &tree, pred, label.end()).unwrap(),
            );
            prop_assert!(justified);
        }

        // Plain fallthrough is never wrapped: a label only ends where some
        // non-adjacent edge lands, so adjacent-only targets stay bare.
        for block in order.ids().skip(1) {
            let prev = bid(block.index() - 1);
            let only_fallthrough = order
                .predecessors(block)
                .iter()
                .all(|&pred| pred == prev && order.successors(pred).iter().all(|&s| s == block));
            if only_fallthrough {
                prop_assert!(registry.ends_at(block).is_none());
            }
        }

        // Same inputs, same registry.
        let again = generate(&order, &tree).unwrap();
        prop_assert_eq!(&registry, &again);
    }
}
