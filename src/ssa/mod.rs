//! Static Single Assignment form.
//!
//! This module lowers the AST into per-function control flow graphs whose instructions are in SSA
//! form: every value is defined exactly once and merges of control flow are expressed with PHI
//! instructions.
//!
//! # Key Components
//!
//! - [`SsaValue`] - argument, literal, instruction result or undefined
//! - [`SsaInstruction`] / [`SsaOp`] - an opcode with operands, owning block and users
//! - [`SsaFunction`] - control flow graph of SSA instructions plus arguments
//! - [`CfgBuilder`] - single-pass construction (Braun et al.) with trivial-PHI removal
//!
//! # Printing
//!
//! Every type implements [`std::fmt::Display`]. A built module prints as:
//!
//! ```text
//! Globals:
//!
//! CFG for main:
//! Block0:
//!     MOV 42, V1
//!     RET V1
//! ```

mod builder;
mod function;
mod instruction;
mod value;

pub use builder::{BuilderOptions, CfgBuilder};
pub use function::{SsaFunction, SsaModule};
pub use instruction::{InstId, SsaInstruction, SsaOp};
pub use value::{SsaValue, ValueKind};
