//! Control flow graph model shared by the SSA builder and code generation.
//!
//! This module provides three containers, all generic over the instruction type they hold:
//!
//! - [`BasicBlock`] - an ordered instruction list with predecessor and successor edges
//! - [`ControlFlowGraph`] - the blocks of one function, entry block first
//! - [`Module`] - functions by name, plus the program's global pseudo-block
//!
//! # Architecture
//!
//! Blocks and instructions form a cyclic graph (blocks point at their neighbours, instructions
//! point at their owning block and at their users). Instead of shared pointers, the graph owns
//! its blocks in a vector and every reference is a [`BlockId`]. Ids are stable because blocks are
//! never removed once created.
//!
//! # Example
//!
//! ```rust
//! use toslang::cfg::{ControlFlowGraph, Module};
//!
//! let mut cfg: ControlFlowGraph<&str> = ControlFlowGraph::new();
//! let entry = cfg.create_block(Some("entry"));
//! let exit = cfg.create_block(None);
//! cfg.add_edge(entry, exit)?;
//!
//! let mut module = Module::new();
//! module.insert_function("main", cfg);
//! assert_eq!(module.get_function("main")?.len(), 2);
//! # Ok::<(), toslang::Error>(())
//! ```

mod block;
mod graph;
mod module;

pub use block::{BasicBlock, BlockId, Terminator};
pub use graph::ControlFlowGraph;
pub use module::{Function, Module, GLOBAL_BLOCK_NAME};
