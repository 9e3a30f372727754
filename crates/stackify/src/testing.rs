//! Shared helpers for this crate's tests.

use crate::BlockId;

/// Shorthand for building block ids in test CFGs
pub(crate) fn bid(index: usize) -> BlockId {
    BlockId::from_raw(index)
}
