//! The 16-bit virtual machine TosLang programs run on.
//!
//! The machine is modelled on the Chip16 fantasy console: sixteen general purpose 16-bit
//! registers, a flag register, a 64 KiB address space with an upward growing stack near its top,
//! and fixed-width 32-bit instructions.
//!
//! # Key Components
//!
//! - [`Cpu`] - Registers, flags, program counter, stack pointer and memory, with bounds-checked
//!   primitives that report a [`Fault`]
//! - [`Instruction`] - Field access and form predicates for an encoded instruction
//! - [`Interpreter`] - The fetch, decode and execute loop
//! - [`Program`] - A memory image and its entry point, parsed from a ROM
//! - [`VirtualInstruction`] - Machine-level instructions with symbolic operands, as produced by
//!   instruction selection before encoding
//!
//! # Example
//!
//! ```rust
//! use toslang::machine::{FaultFlags, Instruction, Interpreter, Program};
//!
//! let program = Program::from_instructions(&[Instruction::new(0x4000_2A00)]); // ADDI R0, 42
//! let mut interpreter = Interpreter::with_seed(7);
//! interpreter.load_program(&program)?;
//!
//! assert_eq!(interpreter.interpret_one(), FaultFlags::empty());
//! assert_eq!(interpreter.cpu().register(0), 42);
//! # Ok::<(), toslang::Error>(())
//! ```

mod condition;
mod config;
pub mod constants;
mod cpu;
mod fault;
mod instruction;
mod interpreter;
mod operand;
mod program;

pub use condition::Condition;
pub use config::MachineLimits;
pub use cpu::{Cpu, Flags};
pub use fault::{Fault, FaultFlags};
pub use instruction::{Instruction, Opcode};
pub use interpreter::{Interpreter, RunSummary, StopReason};
pub use operand::{VirtualInstruction, VirtualOpcode, VirtualOperand, MAX_OPERANDS};
pub use program::Program;
