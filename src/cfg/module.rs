//! Compilation module: every function of a program plus its globals.

use std::fmt;

use rustc_hash::FxHashMap;

use crate::{
    cfg::{BasicBlock, BlockId, ControlFlowGraph},
    Error, Result,
};

/// Name given to the module's global pseudo-block.
pub const GLOBAL_BLOCK_NAME: &str = "Global";

/// A function body that exposes its control flow graph.
///
/// Implemented by plain [`ControlFlowGraph`]s and by richer function representations such as
/// [`SsaFunction`](crate::ssa::SsaFunction), which carry extra per-function data.
pub trait Function {
    /// Instruction type stored in the function's blocks.
    type Inst;

    /// Returns the function's control flow graph.
    fn cfg(&self) -> &ControlFlowGraph<Self::Inst>;
}

impl<I> Function for ControlFlowGraph<I> {
    type Inst = I;

    fn cfg(&self) -> &ControlFlowGraph<I> {
        self
    }
}

/// Maps function names to their bodies and keeps the program's global instruction stream.
///
/// Functions are kept in insertion order so printing a module is deterministic.
#[derive(Debug, Clone)]
pub struct Module<F: Function> {
    functions: Vec<(String, F)>,
    index: FxHashMap<String, usize>,
    globals: BasicBlock<F::Inst>,
    array_vars: Vec<(String, Vec<u8>)>,
}

impl<F: Function> Default for Module<F> {
    fn default() -> Self {
        Self {
            functions: Vec::new(),
            index: FxHashMap::default(),
            globals: BasicBlock::new(BlockId::new(0), Some(GLOBAL_BLOCK_NAME)),
            array_vars: Vec::new(),
        }
    }
}

impl<F: Function> Module<F> {
    /// Creates an empty module.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `function` under `name`, replacing a previous function of the same name.
    pub fn insert_function(&mut self, name: &str, function: F) {
        match self.index.get(name) {
            Some(&slot) => self.functions[slot].1 = function,
            None => {
                self.index.insert(name.to_string(), self.functions.len());
                self.functions.push((name.to_string(), function));
            }
        }
    }

    /// Looks up a function by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FunctionNotFound`] if no function was inserted under `name`.
    pub fn get_function(&self, name: &str) -> Result<&F> {
        self.index
            .get(name)
            .map(|&slot| &self.functions[slot].1)
            .ok_or_else(|| Error::FunctionNotFound(name.to_string()))
    }

    /// Looks up a function by name for modification.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FunctionNotFound`] if no function was inserted under `name`.
    pub fn get_function_mut(&mut self, name: &str) -> Result<&mut F> {
        match self.index.get(name) {
            Some(&slot) => Ok(&mut self.functions[slot].1),
            None => Err(Error::FunctionNotFound(name.to_string())),
        }
    }

    /// Iterates over `(name, function)` pairs in insertion order.
    pub fn functions(&self) -> impl Iterator<Item = (&str, &F)> {
        self.functions.iter().map(|(name, f)| (name.as_str(), f))
    }

    /// Returns the number of functions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Returns `true` if the module holds no function.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Appends an instruction to the global pseudo-block and returns it.
    pub fn insert_global(&mut self, inst: F::Inst) -> Option<&F::Inst> {
        self.globals.insert_instruction(inst);
        self.globals.terminator()
    }

    /// Returns the global pseudo-block.
    #[must_use]
    pub fn globals(&self) -> &BasicBlock<F::Inst> {
        &self.globals
    }

    /// Returns the global pseudo-block mutably.
    pub fn globals_mut(&mut self) -> &mut BasicBlock<F::Inst> {
        &mut self.globals
    }

    /// Registers a constant byte array (a string literal) and returns its memory slot.
    ///
    /// Slots are handed out sequentially starting at 0.
    pub fn insert_array_variable(&mut self, name: &str, value: &[u8]) -> usize {
        self.array_vars.push((name.to_string(), value.to_vec()));
        self.array_vars.len() - 1
    }

    /// Returns the contents of a memory slot.
    #[must_use]
    pub fn array_variable(&self, slot: usize) -> Option<&[u8]> {
        self.array_vars.get(slot).map(|(_, bytes)| bytes.as_slice())
    }
}

impl<F> fmt::Display for Module<F>
where
    F: Function + fmt::Display,
    F::Inst: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Globals:")?;
        for inst in self.globals.instructions() {
            writeln!(f, "    {inst}")?;
        }
        for (name, function) in &self.functions {
            writeln!(f)?;
            writeln!(f, "CFG for {name}:")?;
            write!(f, "{function}")?;
        }
        Ok(())
    }
}
