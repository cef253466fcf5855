use thiserror::Error;

use crate::machine::Fault;

macro_rules! ssa_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::SsaError {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::SsaError {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Two families of failures exist. Compiler-side errors come from looking up functions and
/// blocks that were never inserted or from feeding the SSA builder an AST that did not pass
/// semantic checking. Machine-side errors wrap a [`Fault`] raised by the virtual CPU, or report a
/// ROM image that cannot be loaded at all.
///
/// # Error Categories
///
/// ## Compiler Errors
/// - [`Error::FunctionNotFound`] - Module lookup by name failed
/// - [`Error::BlockNotFound`] - A block id does not belong to the graph
/// - [`Error::SsaError`] - The SSA builder hit an AST it cannot lower
/// - [`Error::OperandOverflow`] - A fourth operand was added to a virtual instruction
///
/// ## Machine Errors
/// - [`Error::InvalidProgram`] - The ROM header is missing or truncated
/// - [`Error::Fault`] - A CPU primitive reported a fault
///
/// # Examples
///
/// ```rust
/// use toslang::{cfg::Module, cfg::ControlFlowGraph, ssa::SsaInstruction, Error};
///
/// let module: Module<ControlFlowGraph<SsaInstruction>> = Module::new();
/// match module.get_function("main") {
///     Err(Error::FunctionNotFound(name)) => assert_eq!(name, "main"),
///     _ => unreachable!(),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// No function with the given name was inserted into the module.
    ///
    /// Callers are expected to insert a function before querying it; this variant
    /// carries the name that was looked up.
    #[error("Function '{0}' is not part of the module")]
    FunctionNotFound(String),

    /// A block id was used with a graph that does not own it.
    #[error("Block {0} does not exist in this control flow graph")]
    BlockNotFound(usize),

    /// The SSA builder was handed input it cannot lower.
    ///
    /// The builder assumes a semantically checked AST: every identifier resolves
    /// to a symbol and every declaration at program level is a function or a
    /// variable. Violations surface here instead of aborting the process.
    ///
    /// # Fields
    ///
    /// * `message` - Description of the violated precondition
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("SSA construction - {file}:{line}: {message}")]
    SsaError {
        /// The message to be printed for the SsaError error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// A virtual instruction already holds its maximum of three operands.
    #[error("Virtual instruction cannot hold more than 3 operands")]
    OperandOverflow,

    /// The program image could not be loaded.
    ///
    /// Raised when the ROM is shorter than its fixed-size header or when the
    /// header points the program counter outside of the code region.
    #[error("Invalid program - {0}")]
    InvalidProgram(String),

    /// The virtual CPU reported a fault.
    ///
    /// Interpreter steps never return this directly; they accumulate faults into
    /// a status word. It is produced when a caller converts a single primitive
    /// failure with `?`.
    #[error("Machine fault - {0}")]
    Fault(#[from] Fault),
}
