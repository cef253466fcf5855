//! Virtual instructions produced by instruction selection.
//!
//! A [`VirtualInstruction`] is a machine-level opcode with up to three [`VirtualOperand`]s.
//! Operands are a tagged sum: an immediate, a stack slot not yet assigned a register, a physical
//! register, a jump target block or a callee name. Virtual instructions fill the same
//! [`BasicBlock`](crate::cfg::BasicBlock) and [`ControlFlowGraph`](crate::cfg::ControlFlowGraph)
//! containers as SSA instructions.

use std::fmt;

use strum::{Display, EnumIter};

use crate::{
    cfg::{BlockId, Terminator},
    Error, Result,
};

/// Maximum number of operands of a virtual instruction.
pub const MAX_OPERANDS: usize = 3;

/// Opcodes of virtual instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[allow(missing_docs)]
pub enum VirtualOpcode {
    #[strum(to_string = "NOP")]
    NoOp,
    #[strum(to_string = "ALLOCA")]
    Alloca,
    #[strum(to_string = "JMP")]
    Jump,
    #[strum(to_string = "CALL")]
    Call,
    #[strum(to_string = "RET")]
    Ret,
    #[strum(to_string = "LDI")]
    LoadImm,
    #[strum(to_string = "LDI_SP")]
    LoadSp,
    #[strum(to_string = "LOAD")]
    Load,
    #[strum(to_string = "MOV")]
    Mov,
    #[strum(to_string = "STM")]
    Store,
    #[strum(to_string = "PUSH")]
    Push,
    #[strum(to_string = "POP")]
    Pop,
    #[strum(to_string = "ADDI")]
    AddImm,
    #[strum(to_string = "ADD")]
    Add,
    #[strum(to_string = "SUBI")]
    SubImm,
    #[strum(to_string = "SUB")]
    Sub,
    #[strum(to_string = "GT")]
    Gt,
    #[strum(to_string = "LT")]
    Lt,
    #[strum(to_string = "ANDI")]
    AndImm,
    #[strum(to_string = "AND")]
    And,
    #[strum(to_string = "ORI")]
    OrImm,
    #[strum(to_string = "OR")]
    Or,
    #[strum(to_string = "XORI")]
    XorImm,
    #[strum(to_string = "XOR")]
    Xor,
    #[strum(to_string = "MULI")]
    MulImm,
    #[strum(to_string = "MUL")]
    Mul,
    #[strum(to_string = "DIVI")]
    DivImm,
    #[strum(to_string = "DIV")]
    Div,
    #[strum(to_string = "LSHIFT")]
    LShift,
    #[strum(to_string = "RSHIFT")]
    RShift,
    #[strum(to_string = "MODI")]
    ModImm,
    #[strum(to_string = "MOD")]
    Mod,
    #[strum(to_string = "NOTI")]
    NotImm,
    #[strum(to_string = "NOT")]
    Not,
    #[strum(to_string = "NEGI")]
    NegImm,
    #[strum(to_string = "NEG")]
    Neg,
}

/// An operand of a virtual instruction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VirtualOperand {
    /// A literal value.
    Immediate(u32),
    /// A stack slot, before register allocation.
    StackSlot(u32),
    /// A physical register.
    Register(u32),
    /// The block a jump transfers control to.
    Target(BlockId),
    /// The function a call transfers control to.
    Function(String),
}

impl fmt::Display for VirtualOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VirtualOperand::Immediate(value) => write!(f, "{value}"),
            VirtualOperand::StackSlot(slot) => write!(f, "S{slot}"),
            VirtualOperand::Register(reg) => write!(f, "R{reg}"),
            VirtualOperand::Target(block) => write!(f, "{block}"),
            VirtualOperand::Function(name) => write!(f, "{name}"),
        }
    }
}

/// A machine-level instruction before encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualInstruction {
    opcode: VirtualOpcode,
    operands: Vec<VirtualOperand>,
}

impl VirtualInstruction {
    /// Creates an operandless instruction.
    #[must_use]
    pub fn new(opcode: VirtualOpcode) -> Self {
        VirtualInstruction {
            opcode,
            operands: Vec::with_capacity(MAX_OPERANDS),
        }
    }

    /// Returns the opcode.
    #[must_use]
    pub fn opcode(&self) -> VirtualOpcode {
        self.opcode
    }

    /// Returns the operands in order.
    #[must_use]
    pub fn operands(&self) -> &[VirtualOperand] {
        &self.operands
    }

    fn push(&mut self, operand: VirtualOperand) -> Result<&mut Self> {
        if self.operands.len() >= MAX_OPERANDS {
            return Err(Error::OperandOverflow);
        }
        self.operands.push(operand);
        Ok(self)
    }

    /// Appends an immediate operand.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperandOverflow`] if the instruction already has three operands. The same
    /// holds for every other `add_*` method.
    pub fn add_imm_operand(&mut self, value: u32) -> Result<&mut Self> {
        self.push(VirtualOperand::Immediate(value))
    }

    /// Appends a stack slot operand.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperandOverflow`] if the instruction is full.
    pub fn add_stack_slot_operand(&mut self, slot: u32) -> Result<&mut Self> {
        self.push(VirtualOperand::StackSlot(slot))
    }

    /// Appends a register operand.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperandOverflow`] if the instruction is full.
    pub fn add_reg_operand(&mut self, reg: u32) -> Result<&mut Self> {
        self.push(VirtualOperand::Register(reg))
    }

    /// Appends a jump target.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperandOverflow`] if the instruction is full.
    pub fn add_target_operand(&mut self, block: BlockId) -> Result<&mut Self> {
        self.push(VirtualOperand::Target(block))
    }

    /// Appends a call target.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperandOverflow`] if the instruction is full.
    pub fn add_function_operand(&mut self, name: &str) -> Result<&mut Self> {
        self.push(VirtualOperand::Function(name.to_string()))
    }
}

impl Terminator for VirtualInstruction {
    fn is_terminator(&self) -> bool {
        matches!(self.opcode, VirtualOpcode::Jump | VirtualOpcode::Ret)
    }
}

impl fmt::Display for VirtualInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.opcode)?;
        for operand in &self.operands {
            write!(f, " {operand}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::ControlFlowGraph;

    #[test]
    fn test_operand_limit() {
        let mut inst = VirtualInstruction::new(VirtualOpcode::Add);
        inst.add_reg_operand(0)
            .unwrap()
            .add_reg_operand(1)
            .unwrap()
            .add_stack_slot_operand(2)
            .unwrap();
        assert!(matches!(
            inst.add_imm_operand(4),
            Err(Error::OperandOverflow)
        ));
        assert_eq!(inst.operands().len(), 3);
        assert_eq!(inst.to_string(), "ADD R0 R1 S2");
    }

    #[test]
    fn test_targets() {
        let mut jump = VirtualInstruction::new(VirtualOpcode::Jump);
        jump.add_target_operand(BlockId::new(3)).unwrap();
        assert_eq!(jump.to_string(), "JMP B3");
        assert!(jump.is_terminator());

        let mut call = VirtualInstruction::new(VirtualOpcode::Call);
        call.add_function_operand("fib").unwrap();
        assert_eq!(call.to_string(), "CALL fib");
        assert!(!call.is_terminator());
        assert_eq!(
            call.operands(),
            &[VirtualOperand::Function("fib".to_string())]
        );
    }

    #[test]
    fn test_virtual_cfg() {
        let mut cfg: ControlFlowGraph<VirtualInstruction> = ControlFlowGraph::new();
        let entry = cfg.create_block(None);
        let exit = cfg.create_block(None);
        cfg.add_edge(entry, exit).unwrap();

        let mut ldi = VirtualInstruction::new(VirtualOpcode::LoadImm);
        ldi.add_reg_operand(0).unwrap().add_imm_operand(42).unwrap();
        let mut jump = VirtualInstruction::new(VirtualOpcode::Jump);
        jump.add_target_operand(exit).unwrap();

        let block = cfg.block_mut(entry).unwrap();
        block.insert_instruction(ldi);
        assert!(!block.is_properly_terminated());
        block.insert_instruction(jump);
        assert!(block.is_properly_terminated());

        cfg.block_mut(exit)
            .unwrap()
            .insert_instruction(VirtualInstruction::new(VirtualOpcode::Ret));
        assert!(cfg.iter().all(|b| b.is_properly_terminated()));
    }
}
