// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]

//! # toslang
//!
//! Middle end and virtual machine of the TosLang toy compiler.
//!
//! The crate takes a checked abstract syntax tree, lowers it into per-function control flow
//! graphs in Static Single Assignment form, and runs encoded programs on a 16-bit virtual
//! machine modelled on the Chip16 fantasy console.
//!
//! ## Features
//!
//! - **SSA construction** - Single-pass construction after Braun et al., with on-the-fly
//!   trivial PHI removal and no dominance computation
//! - **Generic CFG model** - Basic blocks, graphs and modules shared by SSA and machine-level code
//! - **Virtual machine** - A bounds-checked CPU and an interpreter that records faults instead of
//!   aborting
//!
//! ## Quick Start
//!
//! ### Using the Prelude
//!
//! ```rust
//! use toslang::prelude::*;
//!
//! let mut ast = AstBuilder::new();
//! let x = ast.declare_local("x", 1);
//! let body = ast.compound(vec![
//!     ast.var_stmt(ast.var(x, Some(ast.number(41)))),
//!     ast.ret(Some(ast.binary(Operation::Plus, ast.ident(x), ast.number(1)))),
//! ]);
//! let main = ast.function("main", vec![], body);
//! let (program, symbols) = ast.finish(vec![main]);
//!
//! let module = CfgBuilder::new(&symbols).run(&program)?;
//! println!("{module}");
//! # Ok::<(), toslang::Error>(())
//! ```
//!
//! ### Running Machine Code
//!
//! ```rust
//! use toslang::prelude::*;
//!
//! let program = Program::from_instructions(&[
//!     Instruction::new(0x2000_0A00), // LDI R0, 10
//!     Instruction::new(0x5000_0100), // SUBI R0, 1
//!     Instruction::new(0x1201_0400), // JNZ 4
//! ]);
//!
//! let mut interpreter = Interpreter::with_seed(0);
//! interpreter.load_program(&program)?;
//! let summary = interpreter.run(&MachineLimits::new().with_max_instructions(21));
//!
//! assert_eq!(summary.reason, StopReason::InstructionLimit);
//! assert_eq!(interpreter.cpu().register(0), 0);
//! # Ok::<(), toslang::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`ast`] - The syntax tree and symbol table handed over by the front end
//! - [`cfg`] - [`cfg::BasicBlock`], [`cfg::ControlFlowGraph`] and [`cfg::Module`]
//! - [`ssa`] - SSA values, instructions and the [`ssa::CfgBuilder`]
//! - [`machine`] - CPU, instruction encoding, interpreter and virtual instructions
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T, Error>`](Result). Faults raised while the
//! interpreter executes are not errors: they accumulate in a
//! [`FaultFlags`](machine::FaultFlags) status word the host inspects between steps.
//!
//! ```rust
//! use toslang::{cfg::Module, ssa::SsaModule, Error};
//!
//! let module: SsaModule = Module::new();
//! match module.get_function("main") {
//!     Ok(_) => unreachable!(),
//!     Err(Error::FunctionNotFound(name)) => println!("no function {name}"),
//!     Err(e) => println!("Other error: {e}"),
//! }
//! ```
#[macro_use]
pub(crate) mod error;

/// Convenient re-exports of the most commonly used types.
///
/// # Example
///
/// ```rust
/// use toslang::prelude::*;
///
/// let mut interpreter = Interpreter::with_seed(1);
/// interpreter.load_program(&Program::from_instructions(&[Instruction::new(0)]))?;
/// assert!(interpreter.interpret_one().is_empty());
/// # Ok::<(), toslang::Error>(())
/// ```
pub mod prelude;

/// Abstract syntax tree and symbol table produced by the front end.
pub mod ast;

/// Basic blocks, control flow graphs and modules.
///
/// The containers are generic over their instruction type so that SSA code and machine-level
/// code share them.
pub mod cfg;

/// SSA values, instructions and the single-pass SSA builder.
pub mod ssa;

/// The 16-bit virtual machine and its interpreter.
pub mod machine;

/// `toslang` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
/// This is used consistently throughout the crate for all fallible operations.
pub type Result<T> = std::result::Result<T, Error>;

/// `toslang` Error type
///
/// The main error type for all operations in this crate. Covers SSA construction, CFG lookups
/// and program loading.
pub use error::Error;
