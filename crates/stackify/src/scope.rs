//! # Scope Tree
//!
//! This module defines the tree of scopes consumed by the stackifier: for
//! every branching, looping or exception construct, which contiguous range
//! of blocks each of its arms structurally owns.
//!
//! The tree is computed by an upstream phase and consumed read-only here.
//! Scopes live in an arena indexed by [`ScopeId`]; a child stores its
//! parent's index as a plain, non-owning handle, so the tree has no
//! reference cycles. [`ScopeTreeBuilder::build`] derives parent links and
//! per-block innermost scopes from the block sets, and rejects trees whose
//! ranges cross.

use index_vec::IndexVec;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::{BlockId, BlockOrder, ScopeId, StackifyError, StackifyResult, Terminator};

/// Which construct arm a scope is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeRole {
    /// The then arm of a two-way branch
    Then { branch: BlockId },
    /// The else arm of a two-way branch
    Else { branch: BlockId },
    /// The body of a loop
    LoopBody { header: BlockId },
    /// One arm of a switch
    Case { switch: BlockId, arm: usize },
    /// The handler of an invoke
    Handler { invoke: BlockId },
}

impl ScopeRole {
    /// Returns the block whose construct owns this scope
    pub const fn owner(self) -> BlockId {
        match self {
            Self::Then { branch } | Self::Else { branch } => branch,
            Self::LoopBody { header } => header,
            Self::Case { switch, .. } => switch,
            Self::Handler { invoke } => invoke,
        }
    }
}

/// A contiguous range of blocks owned by one arm of a control construct
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    start: BlockId,
    last: BlockId,
    parent: Option<ScopeId>,
    role: ScopeRole,
    blocks: FxHashSet<BlockId>,
}

impl Scope {
    /// Returns the block where the owning construct begins
    ///
    /// This is the construct's block, not the first block of the arm: a
    /// labeled block that must wrap this scope has to open before the
    /// construct's own code (for a loop body the two coincide, since the
    /// body contains its header).
    pub const fn start(&self) -> BlockId {
        self.start
    }

    /// Returns the last block of this scope in emission order
    pub const fn last(&self) -> BlockId {
        self.last
    }

    /// Returns the innermost scope containing this one, if any
    pub const fn parent(&self) -> Option<ScopeId> {
        self.parent
    }

    /// Returns which construct arm this scope is
    pub const fn role(&self) -> ScopeRole {
        self.role
    }

    /// Returns true if the block belongs to this scope
    pub fn contains(&self, block: BlockId) -> bool {
        self.blocks.contains(&block)
    }

    /// Returns the number of blocks in this scope
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }
}

/// The sub-scopes owned by one block's terminator
///
/// Indexed by the block that owns the construct. A missing entry means the
/// upstream scope computation chose not to capture that construct; edge
/// classification then falls back to fallthrough analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminatorScopes {
    /// A two-way branch with optionally captured arms
    If {
        then_scope: Option<ScopeId>,
        else_scope: Option<ScopeId>,
    },
    /// A loop, owned by its header block
    Loop { body: ScopeId },
    /// A switch; `cases[i]` is the scope of arm `i`, indexed identically
    /// to the switch terminator's target list
    Switch { cases: Vec<Option<ScopeId>> },
    /// An invoke with an optionally captured handler
    Catch { handler: Option<ScopeId> },
}

/// Read-only scope tree for one function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeTree {
    scopes: IndexVec<ScopeId, Scope>,
    terminator_scopes: FxHashMap<BlockId, TerminatorScopes>,
    enclosing: IndexVec<BlockId, Option<ScopeId>>,
}

impl ScopeTree {
    /// Creates a scope tree with no scopes (every block at top level)
    pub fn empty(block_count: usize) -> Self {
        Self {
            scopes: IndexVec::new(),
            terminator_scopes: FxHashMap::default(),
            enclosing: IndexVec::from_vec(vec![None; block_count]),
        }
    }

    /// Returns a scope by id
    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id]
    }

    /// Returns the number of scopes
    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }

    /// Returns the innermost scope containing the block, if any
    pub fn enclosing_scope(&self, block: BlockId) -> Option<ScopeId> {
        self.enclosing[block]
    }

    /// Returns the sub-scopes owned by the block's construct, if captured
    pub fn scope_of_terminator(&self, block: BlockId) -> Option<&TerminatorScopes> {
        self.terminator_scopes.get(&block)
    }

    /// Returns the innermost scope containing the given scope, if any
    pub fn parent(&self, id: ScopeId) -> Option<ScopeId> {
        self.scopes[id].parent
    }

    /// Returns the block where the construct owning the scope begins
    pub fn start_block(&self, id: ScopeId) -> BlockId {
        self.scopes[id].start
    }

    /// Returns the last block of a scope
    pub fn last_block(&self, id: ScopeId) -> BlockId {
        self.scopes[id].last
    }

    /// Returns true if the block belongs to the scope
    pub fn contains(&self, id: ScopeId, block: BlockId) -> bool {
        self.scopes[id].contains(block)
    }

    /// Returns the scopes whose last block is `block`, innermost first
    ///
    /// These are the construct arms that close before `block`'s successor
    /// is emitted; they drive the arm-tail edge classifications.
    pub fn scopes_closing_at(&self, block: BlockId) -> impl Iterator<Item = ScopeId> + '_ {
        std::iter::successors(self.enclosing_scope(block), move |&s| self.scopes[s].parent)
            .take_while(move |&s| self.scopes[s].last == block)
    }
}

/// A scope while it is being assembled: range and block set only; role and
/// parent are derived during `build`.
#[derive(Debug, Clone)]
struct ProtoScope {
    blocks: FxHashSet<BlockId>,
}

/// Builds a [`ScopeTree`] for a given block order
///
/// Scopes are created first, then attached to the constructs that own
/// them. `build` validates the result against the block order and derives
/// everything the queries need.
#[derive(Debug, Default)]
pub struct ScopeTreeBuilder {
    scopes: Vec<ProtoScope>,
    payloads: Vec<(BlockId, TerminatorScopes)>,
}

impl ScopeTreeBuilder {
    /// Creates a new empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a scope covering the contiguous block range `start..=last`
    pub fn scope(&mut self, start: BlockId, last: BlockId) -> ScopeId {
        let blocks = (start.index()..=last.index())
            .map(BlockId::from_raw)
            .collect();
        self.add(ProtoScope { blocks })
    }

    /// Creates a scope from an explicit block set
    pub fn scope_with_blocks(&mut self, blocks: impl IntoIterator<Item = BlockId>) -> ScopeId {
        self.add(ProtoScope {
            blocks: blocks.into_iter().collect(),
        })
    }

    /// Attaches then/else arm scopes to a two-way branch block
    pub fn branch_scopes(
        &mut self,
        block: BlockId,
        then_scope: Option<ScopeId>,
        else_scope: Option<ScopeId>,
    ) {
        self.payloads.push((
            block,
            TerminatorScopes::If {
                then_scope,
                else_scope,
            },
        ));
    }

    /// Attaches a body scope to a loop header block
    pub fn loop_body(&mut self, header: BlockId, body: ScopeId) {
        self.payloads.push((header, TerminatorScopes::Loop { body }));
    }

    /// Attaches case arm scopes to a switch block
    pub fn switch_scopes(&mut self, block: BlockId, cases: Vec<Option<ScopeId>>) {
        self.payloads.push((block, TerminatorScopes::Switch { cases }));
    }

    /// Attaches a handler scope to an invoke block
    pub fn catch_scopes(&mut self, block: BlockId, handler: Option<ScopeId>) {
        self.payloads.push((block, TerminatorScopes::Catch { handler }));
    }

    fn add(&mut self, scope: ProtoScope) -> ScopeId {
        let id = ScopeId::from_raw(self.scopes.len());
        self.scopes.push(scope);
        id
    }

    /// Validates the tree against the block order and derives parent links,
    /// roles and per-block innermost scopes
    pub fn build(self, blocks: &BlockOrder) -> StackifyResult<ScopeTree> {
        let scope_count = self.scopes.len();
        let block_count = blocks.block_count();

        let mut roles: Vec<Option<ScopeRole>> = vec![None; scope_count];
        let mut terminator_scopes: FxHashMap<BlockId, TerminatorScopes> = FxHashMap::default();

        for (block, payload) in self.payloads {
            check_payload_kind(blocks, block, &payload)?;
            for (sub_scope, role) in payload_roles(block, &payload) {
                if sub_scope.index() >= scope_count {
                    return Err(StackifyError::MalformedScopeTree(format!(
                        "block {} references scope {}, which does not exist",
                        block.index(),
                        sub_scope.index()
                    )));
                }
                if roles[sub_scope.index()].replace(role).is_some() {
                    return Err(StackifyError::MalformedScopeTree(format!(
                        "scope {} is owned by more than one construct arm",
                        sub_scope.index()
                    )));
                }
            }
            if terminator_scopes.insert(block, payload).is_some() {
                return Err(StackifyError::MalformedScopeTree(format!(
                    "block {} owns more than one scope payload",
                    block.index()
                )));
            }
        }

        let mut scopes: IndexVec<ScopeId, Scope> = IndexVec::new();
        for (index, proto) in self.scopes.into_iter().enumerate() {
            let Some(role) = roles[index] else {
                return Err(StackifyError::MalformedScopeTree(format!(
                    "scope {index} is not owned by any construct arm"
                )));
            };
            let Some(&last) = proto.blocks.iter().max() else {
                return Err(StackifyError::MalformedScopeTree(format!(
                    "scope {index} contains no blocks"
                )));
            };
            if last.index() >= block_count {
                return Err(StackifyError::MalformedScopeTree(format!(
                    "scope {} contains block {}, which does not exist",
                    index,
                    last.index()
                )));
            }
            scopes.push(Scope {
                start: role.owner(),
                last,
                parent: None,
                role,
                blocks: proto.blocks,
            });
        }

        // Any two scopes must be disjoint or properly nested. For scopes
        // with identical block sets the owning construct disambiguates:
        // the scope whose owner block lies inside the range is the inner
        // one (a loop body filling an entire branch arm, for example).
        for a in (0..scopes.len()).map(ScopeId::from_raw) {
            for b in (a.index() + 1..scopes.len()).map(ScopeId::from_raw) {
                let overlap = scopes[a].blocks.intersection(&scopes[b].blocks).count();
                if overlap == 0 {
                    continue;
                }
                if inside(&scopes, a, b) == inside(&scopes, b, a) {
                    return Err(StackifyError::MalformedScopeTree(format!(
                        "scopes {} and {} overlap without nesting",
                        a.index(),
                        b.index()
                    )));
                }
            }
        }

        // Parent: the innermost scope properly containing this one.
        for id in (0..scopes.len()).map(ScopeId::from_raw) {
            let parent = (0..scopes.len())
                .map(ScopeId::from_raw)
                .filter(|&other| other != id && inside(&scopes, id, other))
                .min_by_key(|&other| (scopes[other].blocks.len(), depth_hint(&scopes, other)));
            scopes[id].parent = parent;
        }

        // Innermost enclosing scope per block.
        let mut enclosing: IndexVec<BlockId, Option<ScopeId>> =
            IndexVec::from_vec(vec![None; block_count]);
        for block in blocks.ids() {
            enclosing[block] = (0..scopes.len())
                .map(ScopeId::from_raw)
                .filter(|&s| scopes[s].blocks.contains(&block))
                .min_by_key(|&s| (scopes[s].blocks.len(), depth_hint(&scopes, s)));
        }

        Ok(ScopeTree {
            scopes,
            terminator_scopes,
            enclosing,
        })
    }
}

/// True if scope `a` nests inside scope `b`
///
/// For distinct block sets this is plain containment. For identical sets,
/// `a` is inside `b` exactly when `a`'s owner block lies in the shared
/// range while `b`'s does not.
fn inside(scopes: &IndexVec<ScopeId, Scope>, a: ScopeId, b: ScopeId) -> bool {
    let (sa, sb) = (&scopes[a], &scopes[b]);
    if !sa.blocks.is_subset(&sb.blocks) {
        return false;
    }
    if sa.blocks.len() < sb.blocks.len() {
        return true;
    }
    sb.blocks.contains(&sa.role.owner()) && !sa.blocks.contains(&sb.role.owner())
}

/// Tie-break for identical-size containers: count how many equal-size
/// scopes nest inside this one, so the innermost (containing none of its
/// peers) sorts first.
fn depth_hint(scopes: &IndexVec<ScopeId, Scope>, id: ScopeId) -> usize {
    (0..scopes.len())
        .map(ScopeId::from_raw)
        .filter(|&other| {
            other != id
                && scopes[other].blocks.len() == scopes[id].blocks.len()
                && inside(scopes, other, id)
        })
        .count()
}

/// The (sub-scope, role) pairs a payload assigns
fn payload_roles(block: BlockId, payload: &TerminatorScopes) -> Vec<(ScopeId, ScopeRole)> {
    match payload {
        TerminatorScopes::If {
            then_scope,
            else_scope,
        } => {
            let mut roles = Vec::new();
            if let Some(s) = then_scope {
                roles.push((*s, ScopeRole::Then { branch: block }));
            }
            if let Some(s) = else_scope {
                roles.push((*s, ScopeRole::Else { branch: block }));
            }
            roles
        }
        TerminatorScopes::Loop { body } => {
            vec![(*body, ScopeRole::LoopBody { header: block })]
        }
        TerminatorScopes::Switch { cases } => cases
            .iter()
            .enumerate()
            .filter_map(|(arm, s)| s.map(|s| (s, ScopeRole::Case { switch: block, arm })))
            .collect(),
        TerminatorScopes::Catch { handler } => handler
            .map(|s| vec![(s, ScopeRole::Handler { invoke: block })])
            .unwrap_or_default(),
    }
}

/// A payload must match the kind of construct its block actually ends with
fn check_payload_kind(
    blocks: &BlockOrder,
    block: BlockId,
    payload: &TerminatorScopes,
) -> StackifyResult<()> {
    if block.index() >= blocks.block_count() {
        return Err(StackifyError::MalformedScopeTree(format!(
            "scope payload attached to block {}, which does not exist",
            block.index()
        )));
    }
    let ok = match payload {
        TerminatorScopes::If { .. } => blocks.terminator(block).is_branch(),
        TerminatorScopes::Loop { .. } => blocks.is_loop_header(block),
        TerminatorScopes::Switch { cases } => match blocks.terminator(block) {
            Terminator::Switch { targets } => targets.len() == cases.len(),
            _ => false,
        },
        TerminatorScopes::Catch { .. } => blocks.terminator(block).may_unwind(),
    };
    if ok {
        Ok(())
    } else {
        Err(StackifyError::MalformedScopeTree(format!(
            "scope payload attached to block {} does not match its terminator",
            block.index()
        )))
    }
}
