//! # Block Terminators
//!
//! This module defines terminators, which end basic blocks and transfer
//! control flow. Every basic block ends with exactly one terminator, and
//! the terminator's target list is the block's ordered successor list.
//!
//! The stackifier never looks inside a block; the terminator kind and its
//! target order are all it needs to classify outgoing edges.

use crate::{BlockId, PrettyPrint};

/// A terminator ends a basic block and transfers control
///
/// # Design Notes
///
/// - Each terminator specifies its target blocks explicitly, in successor
///   order (`then` before `else`, switch arms in arm order, the normal
///   continuation of an invoke before its exception handler)
/// - The set of kinds is closed: adding a new control transfer is a
///   compile error at every `match` until it is classified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminator {
    /// Unconditional jump: `goto target`
    Goto { target: BlockId },

    /// Two-way branch: `if cond then jump then_target else jump else_target`
    Branch {
        then_target: BlockId,
        else_target: BlockId,
    },

    /// Multi-way branch: `targets[i]` is the target of switch arm `i`
    Switch { targets: Vec<BlockId> },

    /// Call that may transfer to an exception handler instead of its
    /// normal continuation
    Invoke { target: BlockId, handler: BlockId },

    /// Function return: ends function execution
    Return,
}

impl Terminator {
    /// Creates a new unconditional jump terminator
    pub const fn goto(target: BlockId) -> Self {
        Self::Goto { target }
    }

    /// Creates a new two-way branch terminator
    pub const fn branch(then_target: BlockId, else_target: BlockId) -> Self {
        Self::Branch {
            then_target,
            else_target,
        }
    }

    /// Creates a new multi-way switch terminator
    pub fn switch(targets: Vec<BlockId>) -> Self {
        Self::Switch { targets }
    }

    /// Creates a new invoke terminator with an exception handler edge
    pub const fn invoke(target: BlockId, handler: BlockId) -> Self {
        Self::Invoke { target, handler }
    }

    /// Creates a new return terminator
    pub const fn ret() -> Self {
        Self::Return
    }

    /// Returns all basic block targets of this terminator, in successor order
    pub fn target_blocks(&self) -> Vec<BlockId> {
        match self {
            Self::Goto { target } => vec![*target],
            Self::Branch {
                then_target,
                else_target,
            } => vec![*then_target, *else_target],
            Self::Switch { targets } => targets.clone(),
            Self::Invoke { target, handler } => vec![*target, *handler],
            Self::Return => vec![],
        }
    }

    /// Returns the number of successors
    pub fn successor_count(&self) -> usize {
        match self {
            Self::Goto { .. } => 1,
            Self::Branch { .. } => 2,
            Self::Switch { targets } => targets.len(),
            Self::Invoke { .. } => 2,
            Self::Return => 0,
        }
    }

    /// Returns true if this terminator ends the function
    pub const fn ends_function(&self) -> bool {
        matches!(self, Self::Return)
    }

    /// Returns true if this is a two-way branch
    pub const fn is_branch(&self) -> bool {
        matches!(self, Self::Branch { .. })
    }

    /// Returns true if this terminator may transfer to an exception handler
    pub const fn may_unwind(&self) -> bool {
        matches!(self, Self::Invoke { .. })
    }
}

impl PrettyPrint for Terminator {
    fn pretty_print(&self, _indent: usize) -> String {
        match self {
            Self::Goto { target } => format!("goto block_{}", target.index()),

            Self::Branch {
                then_target,
                else_target,
            } => format!(
                "branch block_{} block_{}",
                then_target.index(),
                else_target.index()
            ),

            Self::Switch { targets } => {
                let arms: Vec<String> = targets
                    .iter()
                    .map(|t| format!("block_{}", t.index()))
                    .collect();
                format!("switch [{}]", arms.join(", "))
            }

            Self::Invoke { target, handler } => format!(
                "invoke block_{} unwind block_{}",
                target.index(),
                handler.index()
            ),

            Self::Return => "return".to_string(),
        }
    }
}
