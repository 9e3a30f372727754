//! # Labeled Blocks and the Label Registry
//!
//! A labeled block is a synthesized structured-break target spanning
//! `[start, end)` in block order: the emitter prints `label_<n>: {` before
//! `start`'s code, `}` before `end`'s code, and `break label_<n>` wherever
//! control must jump to just before `end`.
//!
//! The registry is the stackifier's entire output. It keeps two maps,
//! both indexed by dense block position: the labels opening at each block
//! (ordered so that the label closing furthest away is opened first) and
//! the at-most-one label closing before each block.

use index_vec::IndexVec;

use crate::{indent_str, BlockId, LabelId, PrettyPrint, StackifyError, StackifyResult};

/// A synthesized structured-break target spanning `[start, end)`
///
/// Created only by the generation driver; immutable afterward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabeledBlock {
    id: LabelId,
    start: BlockId,
    end: BlockId,
}

impl LabeledBlock {
    /// Returns the identifier used for naming this label
    pub const fn id(&self) -> LabelId {
        self.id
    }

    /// Returns the block before whose code this label opens
    pub const fn start(&self) -> BlockId {
        self.start
    }

    /// Returns the block before whose code this label closes
    ///
    /// A break on this label transfers control to just before `end`.
    pub const fn end(&self) -> BlockId {
        self.end
    }

    /// Returns the emitter-facing name of this label
    pub fn name(&self) -> String {
        format!("label_{}", self.id.index())
    }
}

/// The labels opening and closing at each block of one function
///
/// # Invariants
///
/// - `ends_at` is injective: no two labels close before the same block
/// - each `starts_at` sequence is ordered by descending end position, so
///   the emitter opens outermost labels first and braces nest correctly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelRegistry {
    labels: IndexVec<LabelId, LabeledBlock>,
    starts_at: IndexVec<BlockId, Vec<LabelId>>,
    ends_at: IndexVec<BlockId, Option<LabelId>>,
}

impl LabelRegistry {
    /// Creates an empty registry for a function with `block_count` blocks
    pub fn new(block_count: usize) -> Self {
        Self {
            labels: IndexVec::new(),
            starts_at: IndexVec::from_vec(vec![Vec::new(); block_count]),
            ends_at: IndexVec::from_vec(vec![None; block_count]),
        }
    }

    /// Returns true if some label already closes before `block`
    ///
    /// The driver uses this to reuse an existing label instead of creating
    /// a second one for the same jump target.
    pub fn already_ends_before(&self, block: BlockId) -> bool {
        self.ends_at[block].is_some()
    }

    /// Creates a label spanning `[start, end)` and records it in both maps
    ///
    /// Two labels closing before the same block would be unprintable; the
    /// driver must check [`already_ends_before`](Self::already_ends_before)
    /// first, so an occupied end slot here is a fatal internal error.
    pub fn create(&mut self, start: BlockId, end: BlockId) -> StackifyResult<LabelId> {
        if self.ends_at[end].is_some() {
            return Err(StackifyError::DuplicateLabelEnd { end });
        }

        let id = LabelId::from_raw(self.labels.len());
        self.labels.push(LabeledBlock { id, start, end });
        self.ends_at[end] = Some(id);

        let labels = &self.labels;
        let starts = &mut self.starts_at[start];
        starts.push(id);
        // Outermost first: the label whose end is furthest away opens first.
        starts.sort_by(|&a, &b| labels[b].end.index().cmp(&labels[a].end.index()));

        Ok(id)
    }

    /// Returns a label by id
    pub fn label(&self, id: LabelId) -> &LabeledBlock {
        &self.labels[id]
    }

    /// Returns the labels opening before `block`'s code, outermost first
    pub fn starts_at(&self, block: BlockId) -> impl Iterator<Item = &LabeledBlock> {
        self.starts_at[block].iter().map(|&id| &self.labels[id])
    }

    /// Returns the label closing before `block`'s code, if any
    pub fn ends_at(&self, block: BlockId) -> Option<&LabeledBlock> {
        self.ends_at[block].map(|id| &self.labels[id])
    }

    /// Returns all labels in creation order
    pub fn labels(&self) -> impl Iterator<Item = &LabeledBlock> {
        self.labels.iter()
    }

    /// Returns the number of labels
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Returns true if no labels were created
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl PrettyPrint for LabelRegistry {
    fn pretty_print(&self, indent: usize) -> String {
        let mut result = String::new();
        let base_indent = indent_str(indent);

        for block in (0..self.starts_at.len()).map(BlockId::from_raw) {
            let mut entries: Vec<String> = Vec::new();
            if let Some(label) = self.ends_at(block) {
                entries.push(format!("close {}", label.name()));
            }
            for label in self.starts_at(block) {
                entries.push(format!(
                    "open {} (end block_{})",
                    label.name(),
                    label.end.index()
                ));
            }
            if !entries.is_empty() {
                result.push_str(&format!(
                    "{}block_{}: {}\n",
                    base_indent,
                    block.index(),
                    entries.join(", ")
                ));
            }
        }

        result
    }
}
