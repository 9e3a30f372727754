//! # Block Order Model
//!
//! This module defines the read-only view of a function's basic blocks in
//! their final emission order. Block ids are dense positions in that order,
//! so every per-block table in this crate is a flat vector.
//!
//! The model is produced once by [`BlockOrderBuilder`] and never mutated
//! afterward: the stackifier only queries successors, predecessors and loop
//! membership. Builder validation is fail-fast — an inconsistent graph is a
//! defect in the upstream block-sorting phase, not a recoverable condition.

use index_vec::IndexVec;

use crate::{
    indent_str, BlockId, LoopId, PrettyPrint, StackifyError, StackifyResult, Terminator,
};

/// A natural loop in the block order, identified by its header block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopInfo {
    /// The single entry block of the loop; all back edges target it
    pub header: BlockId,
}

/// A basic block as seen by the stackifier
///
/// The block's instructions are irrelevant here; only its terminator, its
/// place in the emission order and its loop membership matter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    terminator: Terminator,
    successors: Vec<BlockId>,
    predecessors: Vec<BlockId>,
    loop_id: Option<LoopId>,
    is_loop_header: bool,
    is_loop_end: bool,
}

impl Block {
    /// Returns the terminator of this block
    pub const fn terminator(&self) -> &Terminator {
        &self.terminator
    }

    /// Returns the successors of this block, in terminator order
    pub fn successors(&self) -> &[BlockId] {
        &self.successors
    }

    /// Returns the predecessors of this block, in ascending id order
    pub fn predecessors(&self) -> &[BlockId] {
        &self.predecessors
    }

    /// Returns the innermost loop containing this block, if any
    pub const fn loop_id(&self) -> Option<LoopId> {
        self.loop_id
    }

    /// Returns true if this block is the header of a loop
    pub const fn is_loop_header(&self) -> bool {
        self.is_loop_header
    }

    /// Returns true if this block's sole successor is a back edge to its
    /// own loop header
    pub const fn is_loop_end(&self) -> bool {
        self.is_loop_end
    }
}

/// Read-only view of all basic blocks in final emission order
///
/// # Invariants
///
/// - Block ids are contiguous and equal to emission-order positions
/// - Successor and predecessor lists are consistent (if B is a successor
///   of A, then A is a predecessor of B) — guaranteed by construction
/// - Back edges occur only as the sole successor of a loop-end block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockOrder {
    blocks: IndexVec<BlockId, Block>,
    loops: IndexVec<LoopId, LoopInfo>,
}

impl BlockOrder {
    /// Returns the number of blocks
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Returns all block ids in ascending emission order
    pub fn ids(&self) -> impl Iterator<Item = BlockId> {
        (0..self.blocks.len()).map(BlockId::from_raw)
    }

    /// Returns a block by id
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id]
    }

    /// Returns the terminator of a block
    pub fn terminator(&self, id: BlockId) -> &Terminator {
        &self.blocks[id].terminator
    }

    /// Returns the successors of a block, in terminator order
    pub fn successors(&self, id: BlockId) -> &[BlockId] {
        &self.blocks[id].successors
    }

    /// Returns the predecessors of a block, in ascending id order
    pub fn predecessors(&self, id: BlockId) -> &[BlockId] {
        &self.blocks[id].predecessors
    }

    /// Returns true if the block is a loop header
    pub fn is_loop_header(&self, id: BlockId) -> bool {
        self.blocks[id].is_loop_header
    }

    /// Returns true if the block's sole successor is a back edge
    pub fn is_loop_end(&self, id: BlockId) -> bool {
        self.blocks[id].is_loop_end
    }

    /// Returns the innermost loop containing the block, if any
    pub fn loop_of(&self, id: BlockId) -> Option<LoopId> {
        self.blocks[id].loop_id
    }

    /// Returns the header block of a loop
    pub fn loop_header(&self, id: LoopId) -> BlockId {
        self.loops[id].header
    }

    /// Returns all block ids strictly between `a` and `b` in emission order
    pub fn between(&self, a: BlockId, b: BlockId) -> impl Iterator<Item = BlockId> {
        (a.index() + 1..b.index()).map(BlockId::from_raw)
    }
}

impl PrettyPrint for BlockOrder {
    fn pretty_print(&self, indent: usize) -> String {
        let mut result = String::new();
        let base_indent = indent_str(indent);

        for (id, block) in self.blocks.iter_enumerated() {
            let mut line = format!(
                "{}block_{}: {}",
                base_indent,
                id.index(),
                block.terminator.pretty_print(0)
            );
            if let Some(loop_id) = block.loop_id {
                line.push_str(&format!(" (loop_{}", loop_id.index()));
                if block.is_loop_header {
                    line.push_str(" header");
                }
                if block.is_loop_end {
                    line.push_str(" end");
                }
                line.push(')');
            }
            line.push('\n');
            result.push_str(&line);
        }

        result
    }
}

/// Builds a [`BlockOrder`] from terminators pushed in emission order
///
/// Terminators may reference blocks that have not been pushed yet; all
/// targets are checked when [`build`](Self::build) runs. Loops must be
/// registered outermost first, so that a block's recorded loop is its
/// innermost one.
#[derive(Debug, Default)]
pub struct BlockOrderBuilder {
    terminators: Vec<Terminator>,
    loops: Vec<LoopInfo>,
    loop_members: Vec<(LoopId, Vec<BlockId>)>,
}

impl BlockOrderBuilder {
    /// Creates a new empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a block with the given terminator, returning its id
    pub fn block(&mut self, terminator: Terminator) -> BlockId {
        let id = BlockId::from_raw(self.terminators.len());
        self.terminators.push(terminator);
        id
    }

    /// Registers a loop with the given header and member blocks
    ///
    /// Outer loops must be registered before the loops nested inside them.
    pub fn add_loop(&mut self, header: BlockId, members: &[BlockId]) -> LoopId {
        let id = LoopId::from_raw(self.loops.len());
        self.loops.push(LoopInfo { header });
        self.loop_members.push((id, members.to_vec()));
        id
    }

    /// Validates the graph and produces the read-only model
    ///
    /// Checks performed:
    /// - at least one block, every terminator target in range
    /// - loop members in range, each loop header a member of its own loop
    /// - back edges (target id ≤ source id) occur only as the sole
    ///   successor of a block belonging to the targeted loop
    pub fn build(self) -> StackifyResult<BlockOrder> {
        let block_count = self.terminators.len();
        if block_count == 0 {
            return Err(StackifyError::MalformedCfg(
                "a block order must contain at least one block".to_string(),
            ));
        }

        let mut blocks: IndexVec<BlockId, Block> = self
            .terminators
            .into_iter()
            .map(|terminator| {
                let successors = terminator.target_blocks();
                Block {
                    terminator,
                    successors,
                    predecessors: Vec::new(),
                    loop_id: None,
                    is_loop_header: false,
                    is_loop_end: false,
                }
            })
            .collect();

        for id in (0..block_count).map(BlockId::from_raw) {
            for &target in &blocks[id].successors {
                if target.index() >= block_count {
                    return Err(StackifyError::MalformedCfg(format!(
                        "terminator of block {} targets block {}, which does not exist",
                        id.index(),
                        target.index()
                    )));
                }
            }
        }

        let loops: IndexVec<LoopId, LoopInfo> = self.loops.into_iter().collect();

        // Later registrations overwrite earlier ones, so inner loops must be
        // registered after their enclosing loops.
        for (loop_id, members) in &self.loop_members {
            for &member in members {
                let Some(block) = blocks.get_mut(member) else {
                    return Err(StackifyError::MalformedCfg(format!(
                        "loop {} lists member block {}, which does not exist",
                        loop_id.index(),
                        member.index()
                    )));
                };
                block.loop_id = Some(*loop_id);
            }
        }

        for (loop_id, info) in loops.iter_enumerated() {
            if blocks[info.header].loop_id != Some(loop_id)
                && !self
                    .loop_members
                    .iter()
                    .any(|(l, members)| *l == loop_id && members.contains(&info.header))
            {
                return Err(StackifyError::MalformedCfg(format!(
                    "header block {} of loop {} is not a member of that loop",
                    info.header.index(),
                    loop_id.index()
                )));
            }
            blocks[info.header].is_loop_header = true;
        }

        // Predecessor lists, in ascending source order.
        for id in (0..block_count).map(BlockId::from_raw) {
            for index in 0..blocks[id].successors.len() {
                let target = blocks[id].successors[index];
                blocks[target].predecessors.push(id);
            }
        }

        // Back edges close loops and nothing else.
        for id in (0..block_count).map(BlockId::from_raw) {
            let block = &blocks[id];
            let back_targets: Vec<BlockId> = block
                .successors
                .iter()
                .copied()
                .filter(|t| t.index() <= id.index())
                .collect();
            if back_targets.is_empty() {
                continue;
            }
            let header = back_targets[0];
            let closes_own_loop = block.successors.len() == 1
                && block
                    .loop_id
                    .is_some_and(|l| loops[l].header == header && blocks[header].is_loop_header);
            if back_targets.len() > 1 || !closes_own_loop {
                return Err(StackifyError::MalformedCfg(format!(
                    "back edge from block {} to block {} is not the sole successor of a latch in the targeted loop",
                    id.index(),
                    header.index()
                )));
            }
            blocks[id].is_loop_end = true;
        }

        Ok(BlockOrder { blocks, loops })
    }
}
