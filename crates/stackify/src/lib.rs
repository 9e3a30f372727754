//! # Structured Control Flow Synthesis ("Stackifier")
//!
//! This crate decides, for a function whose basic blocks have already been
//! linearized into a single emission order, which forward jumps need an
//! explicit labeled-break construct, and where each labeled block must open
//! and close so that all labeled blocks nest properly over the linear order.
//!
//! ## Architecture
//!
//! ```text
//! BlockOrder              read-only view of blocks in emission order
//! scopes: ScopeTree       which blocks each control construct owns (input)
//! analysis::DominatorTree common-dominator queries over the block order
//!
//! generate(blocks, scopes) -> LabelRegistry
//!   for each block, for each successor:
//!     classify::is_label_needed   is a labeled block required?
//!     placement::compute_start    where must it open?
//!     LabelRegistry               dedup per jump target, record open/close
//! ```
//!
//! The [`LabelRegistry`] is the sole output. A downstream emitter walks the
//! block order, opens `label_<n>: {` before each block in `starts_at`,
//! closes `}` before each block in `ends_at`, and prints `break label_<n>`
//! at jump sites.
//!
//! ## Design Principles
//!
//! 1. **Dense indices**: blocks are identified by their position in the
//!    final emission order, so all per-block tables are flat vectors
//! 2. **Read-only inputs**: the block order and scope tree are never
//!    mutated; the registry is the only state this crate builds
//! 3. **Fail fast**: inconsistent inputs abort the compilation unit with a
//!    diagnostic naming the offending block or edge; nothing is emitted
//!    from a partially-processed function
//!
//! ## Error Handling
//!
//! Every error this crate can produce is a defect in its inputs or an
//! internal invariant violation, never a user-facing condition. There are
//! no retryable states: [`generate`] either returns a complete registry or
//! the unit fails.

#![allow(clippy::option_if_let_else)]

pub use analysis::DominatorTree;
pub use block_order::{Block, BlockOrder, BlockOrderBuilder, LoopInfo};
pub use classify::is_label_needed;
pub use generate::{generate, generate_with_dominators};
pub use labels::{LabelRegistry, LabeledBlock};
pub use placement::compute_start;
pub use scope::{Scope, ScopeRole, ScopeTree, ScopeTreeBuilder, TerminatorScopes};
pub use terminator::Terminator;

pub mod analysis;
pub mod block_order;
pub mod classify;
pub mod generate;
pub mod labels;
pub mod placement;
pub mod scope;
pub mod terminator;

#[cfg(test)]
pub(crate) mod testing;

#[cfg(test)]
mod generate_tests;

// --- Core Identifiers ---

index_vec::define_index_type! {
    /// Position of a basic block in the final emission order (0-based, dense)
    pub struct BlockId = usize;
}

index_vec::define_index_type! {
    /// Unique identifier for a loop within a block order
    pub struct LoopId = usize;
}

index_vec::define_index_type! {
    /// Unique identifier for a scope within a scope tree
    pub struct ScopeId = usize;
}

index_vec::define_index_type! {
    /// Unique identifier for a labeled block within a registry
    pub struct LabelId = usize;
}

// --- Error Handling ---

/// Result type for all fallible operations in this crate
pub type StackifyResult<T> = Result<T, StackifyError>;

/// Errors that can occur while synthesizing labeled blocks
///
/// All variants are fail-fast: they indicate a defect in the upstream
/// phases (block sorting, scope computation) or in this crate itself, and
/// the compilation unit must be aborted rather than emitted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StackifyError {
    /// The block order is internally inconsistent
    #[error("malformed control flow graph: {0}")]
    MalformedCfg(String),

    /// The scope tree is internally inconsistent or does not match the CFG
    #[error("malformed scope tree: {0}")]
    MalformedScopeTree(String),

    /// An edge was queried that does not exist in the CFG
    #[error("block {successor:?} is not a successor of block {block:?}")]
    NotASuccessor { block: BlockId, successor: BlockId },

    /// A jump would have to originate outside a scope and land inside it,
    /// which no arrangement of labeled blocks can express
    #[error(
        "jump from block {predecessor:?} to block {successor:?} enters a scope that does not contain its source"
    )]
    NestingImpossible {
        predecessor: BlockId,
        successor: BlockId,
    },

    /// Two labeled blocks would close before the same block
    #[error("a labeled block already ends before block {end:?}")]
    DuplicateLabelEnd { end: BlockId },
}

// --- Pretty Printing Support ---

/// Trait for pretty-printing stackifier constructs
pub trait PrettyPrint {
    fn pretty_print(&self, indent: usize) -> String;
}

/// Helper function to create indentation
pub(crate) fn indent_str(level: usize) -> String {
    "  ".repeat(level)
}
