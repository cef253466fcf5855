//! SSA function representation.
//!
//! An [`SsaFunction`] is a control flow graph of [`SsaInstruction`]s plus the function's
//! arguments. It also keeps an index from [`InstId`] to the owning block so instructions can be
//! looked up by id even after PHIs were inserted at the head of a block and shifted everything
//! behind them.
//!
//! Def-use chains are maintained on insertion: appending an instruction registers it as a user of
//! every operand that is an instruction result of this function.

use std::fmt;

use rustc_hash::FxHashMap;

use crate::{
    cfg::{BasicBlock, BlockId, ControlFlowGraph, Function, Module},
    ssa::{InstId, SsaInstruction, SsaOp, SsaValue},
    Error, Result,
};

/// Module of SSA functions, as produced by [`CfgBuilder`](crate::ssa::CfgBuilder).
pub type SsaModule = Module<SsaFunction>;

/// A function in SSA form.
#[derive(Debug, Clone, Default)]
pub struct SsaFunction {
    cfg: ControlFlowGraph<SsaInstruction>,
    arguments: Vec<SsaValue>,
    locations: FxHashMap<InstId, BlockId>,
}

impl SsaFunction {
    /// Creates an empty function.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the function's control flow graph.
    #[must_use]
    pub fn cfg(&self) -> &ControlFlowGraph<SsaInstruction> {
        &self.cfg
    }

    /// Appends an argument value.
    pub fn add_argument(&mut self, value: SsaValue) {
        self.arguments.push(value);
    }

    /// Returns the arguments in declaration order.
    #[must_use]
    pub fn arguments(&self) -> &[SsaValue] {
        &self.arguments
    }

    /// Returns the number of arguments.
    #[must_use]
    pub fn nb_arguments(&self) -> usize {
        self.arguments.len()
    }

    /// Creates an empty block.
    pub fn create_block(&mut self, name: Option<&str>) -> BlockId {
        self.cfg.create_block(name)
    }

    /// Returns a block by id.
    #[must_use]
    pub fn block(&self, id: BlockId) -> Option<&BasicBlock<SsaInstruction>> {
        self.cfg.block(id)
    }

    /// Adds the control flow edge `from -> to`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BlockNotFound`] if either block does not exist.
    pub fn add_edge(&mut self, from: BlockId, to: BlockId) -> Result<()> {
        self.cfg.add_edge(from, to)
    }

    /// Appends `inst` to its owning block and wires up def-use chains.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BlockNotFound`] if the instruction's block does not exist.
    pub fn append(&mut self, inst: SsaInstruction) -> Result<InstId> {
        let block = inst.block();
        let id = inst.id();
        let operands = inst.operands().to_vec();

        self.cfg
            .block_mut(block)
            .ok_or(Error::BlockNotFound(block.index()))?
            .insert_instruction(inst);
        self.locations.insert(id, block);

        for operand in operands {
            self.register_user(operand, id);
        }
        Ok(id)
    }

    /// Inserts a PHI at the head of its block, after any PHI already there.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BlockNotFound`] if the instruction's block does not exist.
    pub fn insert_phi(&mut self, phi: SsaInstruction) -> Result<InstId> {
        let block = phi.block();
        let id = phi.id();

        let target = self
            .cfg
            .block_mut(block)
            .ok_or(Error::BlockNotFound(block.index()))?;
        let head = target
            .instructions()
            .iter()
            .take_while(|inst| inst.is_phi())
            .count();
        target.insert_instruction_at(head, phi);
        self.locations.insert(id, block);
        Ok(id)
    }

    /// Appends an operand to an existing instruction and records the def-use edge.
    ///
    /// Returns `false` if `inst` does not belong to this function.
    pub fn add_operand(&mut self, inst: InstId, value: SsaValue) -> bool {
        match self.instruction_mut(inst) {
            Some(target) => target.add_operand(value),
            None => return false,
        }
        self.register_user(value, inst);
        true
    }

    /// Records `user` as a consumer of `value` when `value` is defined in this function.
    pub(crate) fn register_user(&mut self, value: SsaValue, user: InstId) {
        if let Some(def) = value.def().and_then(|def| self.instruction_mut(def)) {
            def.add_user(user);
        }
    }

    /// Looks up an instruction by id.
    #[must_use]
    pub fn instruction(&self, id: InstId) -> Option<&SsaInstruction> {
        let block = self.locations.get(&id)?;
        self.cfg
            .block(*block)?
            .instructions()
            .iter()
            .find(|inst| inst.id() == id)
    }

    /// Looks up an instruction by id for modification.
    pub fn instruction_mut(&mut self, id: InstId) -> Option<&mut SsaInstruction> {
        let block = *self.locations.get(&id)?;
        self.cfg
            .block_mut(block)?
            .instructions_mut()
            .iter_mut()
            .find(|inst| inst.id() == id)
    }

    /// Returns the instruction defining `value`, if it is a result of this function.
    #[must_use]
    pub fn definition(&self, value: &SsaValue) -> Option<&SsaInstruction> {
        self.instruction(value.def()?)
    }

    /// Returns the users of an instruction; empty if the instruction is unknown.
    #[must_use]
    pub fn users(&self, id: InstId) -> &[InstId] {
        self.instruction(id)
            .map(SsaInstruction::users)
            .unwrap_or_default()
    }

    /// Replaces the instruction `id` in place with `new`.
    ///
    /// The replacement inherits the slot of the old instruction in its block. Returns `false`
    /// if `id` is not part of this function.
    pub fn replace_instruction(&mut self, id: InstId, new: SsaInstruction) -> bool {
        let Some(old) = self.instruction(id).cloned() else {
            return false;
        };
        let new_id = new.id();
        let replaced = self
            .cfg
            .block_mut(old.block())
            .is_some_and(|block| block.replace_instruction(&old, new));

        if replaced && new_id != id {
            self.locations.remove(&id);
            self.locations.insert(new_id, old.block());
        }
        replaced
    }

    /// Iterates over every instruction in block order.
    pub fn instructions(&self) -> impl Iterator<Item = &SsaInstruction> {
        self.cfg.iter().flat_map(|block| block.instructions().iter())
    }

    /// Iterates over every PHI in the function.
    pub fn phis(&self) -> impl Iterator<Item = &SsaInstruction> {
        self.instructions().filter(|inst| inst.op() == SsaOp::Phi)
    }

    /// Iterates over the PHIs of one block.
    pub fn block_phis(&self, block: BlockId) -> impl Iterator<Item = &SsaInstruction> {
        self.cfg
            .block(block)
            .into_iter()
            .flat_map(|b| b.instructions().iter())
            .filter(|inst| inst.is_phi())
    }
}

impl Function for SsaFunction {
    type Inst = SsaInstruction;

    fn cfg(&self) -> &ControlFlowGraph<SsaInstruction> {
        &self.cfg
    }
}

impl fmt::Display for SsaFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.arguments.is_empty() {
            let args: Vec<String> = self.arguments.iter().map(ToString::to_string).collect();
            writeln!(f, "Arguments: {}", args.join(", "))?;
        }
        write!(f, "{}", self.cfg)
    }
}
