//! Control flow graph for a single function.
//!
//! The graph is an arena of [`BasicBlock`]s indexed by [`BlockId`]. The entry block is the first
//! block inserted. Edges are stored on the blocks themselves and are always added in pairs through
//! [`ControlFlowGraph::add_edge`], so successor and predecessor lists stay consistent.

use std::fmt;

use crate::{
    cfg::{BasicBlock, BlockId},
    Error, Result,
};

/// Ordered collection of basic blocks forming one function body.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlFlowGraph<I> {
    blocks: Vec<BasicBlock<I>>,
}

impl<I> Default for ControlFlowGraph<I> {
    fn default() -> Self {
        Self { blocks: Vec::new() }
    }
}

impl<I> ControlFlowGraph<I> {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a block and returns the id it now lives under.
    ///
    /// The block's id is rewritten to its position in this graph.
    pub fn insert_node(&mut self, mut block: BasicBlock<I>) -> BlockId {
        let id = BlockId::new(self.blocks.len());
        block.set_id(id);
        self.blocks.push(block);
        id
    }

    /// Creates and appends an empty block.
    ///
    /// # Arguments
    ///
    /// * `name` - Optional block name; defaults to `Block<n>`
    pub fn create_block(&mut self, name: Option<&str>) -> BlockId {
        let id = BlockId::new(self.blocks.len());
        self.blocks.push(BasicBlock::new(id, name));
        id
    }

    /// Returns the entry block, i.e. the first block inserted.
    #[must_use]
    pub fn entry_block(&self) -> Option<&BasicBlock<I>> {
        self.blocks.first()
    }

    /// Returns the block with the given id.
    #[must_use]
    pub fn block(&self, id: BlockId) -> Option<&BasicBlock<I>> {
        self.blocks.get(id.index())
    }

    /// Returns the block with the given id mutably.
    pub fn block_mut(&mut self, id: BlockId) -> Option<&mut BasicBlock<I>> {
        self.blocks.get_mut(id.index())
    }

    /// Returns all blocks in insertion order.
    #[must_use]
    pub fn blocks(&self) -> &[BasicBlock<I>] {
        &self.blocks
    }

    /// Iterates over all blocks in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, BasicBlock<I>> {
        self.blocks.iter()
    }

    /// Returns the number of blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Returns `true` if the graph holds no block.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Adds the edge `from -> to`, updating both endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BlockNotFound`] if either id does not belong to this graph.
    pub fn add_edge(&mut self, from: BlockId, to: BlockId) -> Result<()> {
        if to.index() >= self.blocks.len() {
            return Err(Error::BlockNotFound(to.index()));
        }

        self.blocks
            .get_mut(from.index())
            .ok_or(Error::BlockNotFound(from.index()))?
            .insert_branch(to);
        self.blocks[to.index()].insert_predecessor(from);
        Ok(())
    }

    /// Returns the blocks reachable from the entry in reverse postorder.
    ///
    /// Successors are visited in their insertion order, so the result is deterministic.
    #[must_use]
    pub fn reverse_postorder(&self) -> Vec<BlockId> {
        let Some(entry) = self.entry_block() else {
            return Vec::new();
        };

        let mut visited = vec![false; self.blocks.len()];
        let mut postorder = Vec::with_capacity(self.blocks.len());
        let mut stack = vec![(entry.id(), 0usize)];
        visited[entry.id().index()] = true;

        while let Some((node, next_child)) = stack.pop() {
            let successors = self.blocks[node.index()].successors();
            if let Some(&child) = successors.get(next_child) {
                stack.push((node, next_child + 1));
                if !visited[child.index()] {
                    visited[child.index()] = true;
                    stack.push((child, 0));
                }
            } else {
                postorder.push(node);
            }
        }

        postorder.reverse();
        postorder
    }
}

impl<'a, I> IntoIterator for &'a ControlFlowGraph<I> {
    type Item = &'a BasicBlock<I>;
    type IntoIter = std::slice::Iter<'a, BasicBlock<I>>;

    fn into_iter(self) -> Self::IntoIter {
        self.blocks.iter()
    }
}

impl<I: fmt::Display> fmt::Display for ControlFlowGraph<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for block in &self.blocks {
            write!(f, "{block}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> ControlFlowGraph<u32> {
        let mut cfg = ControlFlowGraph::new();
        let a = cfg.create_block(Some("entry"));
        let b = cfg.create_block(None);
        let c = cfg.create_block(None);
        let d = cfg.create_block(Some("join"));
        cfg.add_edge(a, b).unwrap();
        cfg.add_edge(a, c).unwrap();
        cfg.add_edge(b, d).unwrap();
        cfg.add_edge(c, d).unwrap();
        cfg
    }

    #[test]
    fn test_entry_is_first_inserted() {
        let cfg = diamond();
        assert_eq!(cfg.entry_block().map(BasicBlock::name), Some("entry"));
        assert!(ControlFlowGraph::<u32>::new().entry_block().is_none());
    }

    #[test]
    fn test_add_edge_updates_both_sides() {
        let cfg = diamond();
        let join = cfg.block(BlockId::new(3)).unwrap();
        assert_eq!(join.predecessors(), &[BlockId::new(1), BlockId::new(2)]);
        assert_eq!(
            cfg.block(BlockId::new(0)).unwrap().successors(),
            &[BlockId::new(1), BlockId::new(2)]
        );
    }

    #[test]
    fn test_add_edge_rejects_foreign_block() {
        let mut cfg = diamond();
        assert!(matches!(
            cfg.add_edge(BlockId::new(0), BlockId::new(9)),
            Err(Error::BlockNotFound(9))
        ));
        assert!(matches!(
            cfg.add_edge(BlockId::new(9), BlockId::new(0)),
            Err(Error::BlockNotFound(9))
        ));
        assert!(cfg.block(BlockId::new(0)).unwrap().predecessors().is_empty());
    }

    #[test]
    fn test_insert_node_renumbers() {
        let mut cfg: ControlFlowGraph<u32> = ControlFlowGraph::new();
        cfg.create_block(None);
        let id = cfg.insert_node(BasicBlock::new(BlockId::new(42), Some("late")));
        assert_eq!(id, BlockId::new(1));
        assert_eq!(cfg.block(id).unwrap().id(), id);
    }

    #[test]
    fn test_reverse_postorder() {
        let mut cfg = diamond();
        // Unreachable block is not visited.
        cfg.create_block(None);
        let order = cfg.reverse_postorder();
        assert_eq!(order.first(), Some(&BlockId::new(0)));
        assert_eq!(order.last(), Some(&BlockId::new(3)));
        assert_eq!(order.len(), 4);
    }

    #[test]
    fn test_reverse_postorder_with_back_edge() {
        let mut cfg: ControlFlowGraph<u32> = ControlFlowGraph::new();
        let entry = cfg.create_block(None);
        let header = cfg.create_block(None);
        let body = cfg.create_block(None);
        let exit = cfg.create_block(None);
        cfg.add_edge(entry, header).unwrap();
        cfg.add_edge(header, body).unwrap();
        cfg.add_edge(header, exit).unwrap();
        cfg.add_edge(body, header).unwrap();

        assert_eq!(cfg.reverse_postorder(), vec![entry, header, exit, body]);
    }
}
