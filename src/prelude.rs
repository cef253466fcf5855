//! # toslang Prelude
//!
//! This module provides a convenient prelude for the most commonly used types from the toslang
//! library. Import it to get quick access to the types needed to build SSA from a syntax tree
//! and to run programs on the virtual machine.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all toslang operations
pub use crate::Error;

/// The result type used throughout toslang
pub use crate::Result;

// ================================================================================================
// Syntax Tree
// ================================================================================================

/// Tree construction with symbol binding, and the operator tokens
pub use crate::ast::{AstBuilder, Operation, SymbolId, SymbolTable};

// ================================================================================================
// Control Flow Graphs
// ================================================================================================

/// Generic CFG containers
pub use crate::cfg::{BasicBlock, BlockId, ControlFlowGraph, Module};

// ================================================================================================
// SSA Construction
// ================================================================================================

/// The SSA builder and its options
pub use crate::ssa::{BuilderOptions, CfgBuilder};

/// SSA code representation
pub use crate::ssa::{InstId, SsaFunction, SsaInstruction, SsaModule, SsaOp, SsaValue};

// ================================================================================================
// Virtual Machine
// ================================================================================================

/// Execution
pub use crate::machine::{Interpreter, MachineLimits, RunSummary, StopReason};

/// Machine state and faults
pub use crate::machine::{Cpu, Fault, FaultFlags, Flags};

/// Programs and instruction encoding
pub use crate::machine::{Instruction, Opcode, Program};

/// Machine-level code before encoding
pub use crate::machine::{VirtualInstruction, VirtualOpcode, VirtualOperand};
