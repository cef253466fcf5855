//! Basic blocks.
//!
//! A [`BasicBlock`] is an ordered list of instructions plus the ids of the blocks control can flow
//! to and come from. Blocks never own one another: every edge is a [`BlockId`] into the arena of
//! the [`ControlFlowGraph`](crate::cfg::ControlFlowGraph) that holds them.
//!
//! Termination is checked, never enforced. A block is properly terminated when its last
//! instruction is a jump or a return, as reported by the instruction's [`Terminator`]
//! implementation; builders are responsible for appending that instruction themselves.

use std::fmt;

/// Index of a basic block within its control flow graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct BlockId(usize);

impl BlockId {
    /// Creates a block id from a raw index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{}", self.0)
    }
}

/// Classifies instructions that may end a basic block.
pub trait Terminator {
    /// Returns `true` if the instruction transfers control out of its block (jump or return).
    fn is_terminator(&self) -> bool;
}

/// A straight-line sequence of instructions with its control flow edges.
#[derive(Debug, Clone, PartialEq)]
pub struct BasicBlock<I> {
    id: BlockId,
    name: String,
    instructions: Vec<I>,
    successors: Vec<BlockId>,
    predecessors: Vec<BlockId>,
}

impl<I> BasicBlock<I> {
    /// Creates an empty block.
    ///
    /// When no name is given the block is called `Block<n>` after its id, which gives each
    /// graph a monotonic naming sequence.
    ///
    /// # Arguments
    ///
    /// * `id` - Position of the block in its graph
    /// * `name` - Optional caller-supplied name
    #[must_use]
    pub fn new(id: BlockId, name: Option<&str>) -> Self {
        let name = match name {
            Some(name) => name.to_string(),
            None => format!("Block{}", id.index()),
        };

        Self {
            id,
            name,
            instructions: Vec::new(),
            successors: Vec::new(),
            predecessors: Vec::new(),
        }
    }

    /// Returns the block id.
    #[must_use]
    pub const fn id(&self) -> BlockId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: BlockId) {
        self.id = id;
    }

    /// Returns the block name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Appends an instruction. No legality check happens at this layer.
    pub fn insert_instruction(&mut self, inst: I) {
        self.instructions.push(inst);
    }

    /// Inserts an instruction at `index`, shifting later instructions down.
    ///
    /// An index past the end appends.
    pub fn insert_instruction_at(&mut self, index: usize, inst: I) {
        let index = index.min(self.instructions.len());
        self.instructions.insert(index, inst);
    }

    /// Appends `target` to the successor list.
    ///
    /// This only records the outgoing edge. Use
    /// [`ControlFlowGraph::add_edge`](crate::cfg::ControlFlowGraph::add_edge) to keep the
    /// target's predecessor list in sync.
    pub fn insert_branch(&mut self, target: BlockId) {
        self.successors.push(target);
    }

    pub(crate) fn insert_predecessor(&mut self, source: BlockId) {
        self.predecessors.push(source);
    }

    /// Returns the instructions in execution order.
    #[must_use]
    pub fn instructions(&self) -> &[I] {
        &self.instructions
    }

    /// Returns the instructions mutably.
    pub fn instructions_mut(&mut self) -> &mut [I] {
        &mut self.instructions
    }

    /// Returns the successor ids in insertion order.
    #[must_use]
    pub fn successors(&self) -> &[BlockId] {
        &self.successors
    }

    /// Returns the predecessor ids in insertion order.
    #[must_use]
    pub fn predecessors(&self) -> &[BlockId] {
        &self.predecessors
    }

    /// Returns the last inserted instruction.
    ///
    /// `None` for an empty block. Callers lowering a block they have just appended to can rely
    /// on this being `Some`.
    #[must_use]
    pub fn terminator(&self) -> Option<&I> {
        self.instructions.last()
    }

    /// Returns the number of instructions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Returns `true` if the block holds no instruction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

impl<I: PartialEq> BasicBlock<I> {
    /// Replaces the first instruction structurally equal to `old` with `new`.
    ///
    /// # Returns
    ///
    /// `true` if a replacement happened, `false` if `old` is not in the block.
    pub fn replace_instruction(&mut self, old: &I, new: I) -> bool {
        match self.instructions.iter_mut().find(|inst| **inst == *old) {
            Some(slot) => {
                *slot = new;
                true
            }
            None => false,
        }
    }
}

impl<I: Terminator> BasicBlock<I> {
    /// Returns `true` iff the block is non-empty and ends with a jump or a return.
    #[must_use]
    pub fn is_properly_terminated(&self) -> bool {
        self.terminator().is_some_and(Terminator::is_terminator)
    }
}

impl<I: fmt::Display> fmt::Display for BasicBlock<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:", self.name)?;
        for inst in &self.instructions {
            writeln!(f, "    {inst}")?;
        }
        Ok(())
    }
}
