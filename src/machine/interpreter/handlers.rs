//! Instruction handlers.
//!
//! Each handler executes one decoded instruction against the CPU and reports the first failed
//! primitive as a [`Fault`]. A handler that faults leaves the destination register untouched.

use rand::Rng;

use super::Interpreter;
use crate::machine::{Condition, Cpu, Fault, Flags, Instruction};

/// Operations of the arithmetic and logic groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum AluOp {
    Add,
    Sub,
    And,
    Or,
    Xor,
    Mul,
    Div,
    Mod,
}

impl AluOp {
    fn apply(self, lhs: u16, rhs: u16) -> Result<u16, Fault> {
        match self {
            AluOp::Add => Ok(lhs.wrapping_add(rhs)),
            AluOp::Sub => Ok(lhs.wrapping_sub(rhs)),
            AluOp::And => Ok(lhs & rhs),
            AluOp::Or => Ok(lhs | rhs),
            AluOp::Xor => Ok(lhs ^ rhs),
            AluOp::Mul => Ok(lhs.wrapping_mul(rhs)),
            AluOp::Div => lhs.checked_div(rhs).ok_or(Fault::DivideByZero),
            AluOp::Mod => lhs.checked_rem(rhs).ok_or(Fault::DivideByZero),
        }
    }

    /// Updates carry and overflow. Logic operations and `MOD` leave them alone.
    fn update_flags(self, cpu: &mut Cpu, lhs: u16, rhs: u16) {
        match self {
            AluOp::Add => cpu.set_carry_overflow_flag_add(lhs, rhs),
            AluOp::Sub => cpu.set_carry_overflow_flag_sub(lhs, rhs),
            AluOp::Mul => cpu.set_carry_overflow_flag_mul(lhs, rhs),
            AluOp::Div => cpu.set_carry_overflow_flag_div(lhs, rhs),
            AluOp::And | AluOp::Or | AluOp::Xor | AluOp::Mod => {}
        }
    }
}

/// Operations of the unary group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum UnaryOp {
    Not,
    Neg,
}

impl UnaryOp {
    fn apply(self, value: u16) -> u16 {
        match self {
            UnaryOp::Not => !value,
            UnaryOp::Neg => value.wrapping_neg(),
        }
    }
}

/// Shift operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ShiftOp {
    Shl,
    Shr,
    Sar,
}

impl ShiftOp {
    fn apply(self, value: u16, amount: u16) -> u16 {
        let amount = u32::from(amount);
        match self {
            ShiftOp::Shl => value.checked_shl(amount).unwrap_or(0),
            ShiftOp::Shr => value.checked_shr(amount).unwrap_or(0),
            ShiftOp::Sar => {
                let signed = i16::from_ne_bytes(value.to_ne_bytes());
                let shifted = signed
                    .checked_shr(amount)
                    .unwrap_or(if signed < 0 { -1 } else { 0 });
                u16::from_ne_bytes(shifted.to_ne_bytes())
            }
        }
    }
}

/// Where operands come from and where the result goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Form {
    /// `Rx = Rx op imm`, or `Rx = op imm` for unary operations.
    Immediate,
    /// `Rx = Rx op Ry`, or `Rx = op Rx` for unary operations.
    Inplace,
    /// `Rz = Rx op Ry`, or `Rx = op Ry` for unary operations.
    Basic,
    /// `Rx op Ry` for its flags only.
    Discard,
    /// `Rx op imm` for its flags only.
    DiscardImmediate,
}

impl Interpreter {
    fn reg(&self, id: u8) -> u16 {
        self.cpu.register(id)
    }

    fn flag_set(&self, flag: Flags) -> bool {
        self.cpu.flags().contains(flag)
    }

    // ============================================================================================
    // Miscellaneous
    // ============================================================================================

    pub(super) fn random(&mut self, inst: Instruction) -> Result<(), Fault> {
        let value = self.rng.gen_range(0..=inst.immediate_value());
        self.cpu.set_register(inst.first_operand(), value)
    }

    // ============================================================================================
    // Jumps and calls
    // ============================================================================================

    pub(super) fn jump(&mut self, inst: Instruction) -> Result<(), Fault> {
        self.cpu.set_program_counter(inst.immediate_value())
    }

    pub(super) fn jump_on_carry(&mut self, inst: Instruction) -> Result<(), Fault> {
        if self.flag_set(Flags::CARRY) {
            self.jump(inst)?;
        }
        Ok(())
    }

    pub(super) fn jump_if(&mut self, inst: Instruction) -> Result<(), Fault> {
        if Condition::holds(inst.first_operand(), self.cpu.flags()) {
            self.jump(inst)?;
        }
        Ok(())
    }

    pub(super) fn jump_if_equal(&mut self, inst: Instruction) -> Result<(), Fault> {
        if self.reg(inst.first_operand()) == self.reg(inst.second_operand()) {
            self.jump(inst)?;
        }
        Ok(())
    }

    pub(super) fn jump_indirect(&mut self, inst: Instruction) -> Result<(), Fault> {
        self.cpu
            .set_program_counter(self.reg(inst.first_operand()))
    }

    /// Pushes the return address and jumps to `target`. A rejected target pops the return
    /// address again.
    pub(super) fn call(&mut self, target: u16) -> Result<(), Fault> {
        self.cpu.push_pc()?;
        if let Err(fault) = self.cpu.set_program_counter(target) {
            self.cpu.pop()?;
            return Err(fault);
        }
        Ok(())
    }

    pub(super) fn call_if(&mut self, inst: Instruction) -> Result<(), Fault> {
        if Condition::holds(inst.first_operand(), self.cpu.flags()) {
            self.call(inst.immediate_value())?;
        }
        Ok(())
    }

    pub(super) fn ret(&mut self) -> Result<(), Fault> {
        let address = self.cpu.pop()?;
        self.cpu.set_program_counter(address)
    }

    // ============================================================================================
    // Loads and stores
    // ============================================================================================

    pub(super) fn load_immediate(&mut self, inst: Instruction) -> Result<(), Fault> {
        self.cpu
            .set_register(inst.first_operand(), inst.immediate_value())
    }

    pub(super) fn load_stack_pointer(&mut self, inst: Instruction) -> Result<(), Fault> {
        self.cpu.set_stack_pointer(inst.immediate_value())
    }

    pub(super) fn load_direct(&mut self, inst: Instruction) -> Result<(), Fault> {
        let value = self.cpu.load(inst.immediate_value())?;
        self.cpu.set_register(inst.first_operand(), value)
    }

    pub(super) fn load_indirect(&mut self, inst: Instruction) -> Result<(), Fault> {
        let value = self.cpu.load(self.reg(inst.second_operand()))?;
        self.cpu.set_register(inst.first_operand(), value)
    }

    pub(super) fn mov(&mut self, inst: Instruction) -> Result<(), Fault> {
        self.cpu
            .set_register(inst.first_operand(), self.reg(inst.second_operand()))
    }

    pub(super) fn store_direct(&mut self, inst: Instruction) -> Result<(), Fault> {
        self.cpu
            .store(inst.immediate_value(), self.reg(inst.first_operand()))
    }

    pub(super) fn store_indirect(&mut self, inst: Instruction) -> Result<(), Fault> {
        self.cpu.store(
            self.reg(inst.second_operand()),
            self.reg(inst.first_operand()),
        )
    }

    // ============================================================================================
    // Arithmetic and logic
    // ============================================================================================

    /// Runs a two-operand operation. Carry and overflow are updated first, then zero and
    /// negative from the result.
    pub(super) fn binary(&mut self, inst: Instruction, op: AluOp, form: Form) -> Result<(), Fault> {
        let lhs = self.reg(inst.first_operand());
        let (rhs, destination) = match form {
            Form::Immediate => (inst.immediate_value(), Some(inst.first_operand())),
            Form::Inplace => (self.reg(inst.second_operand()), Some(inst.first_operand())),
            Form::Basic => (self.reg(inst.second_operand()), Some(inst.third_operand())),
            Form::Discard => (self.reg(inst.second_operand()), None),
            Form::DiscardImmediate => (inst.immediate_value(), None),
        };

        let result = op.apply(lhs, rhs)?;
        op.update_flags(&mut self.cpu, lhs, rhs);
        if let Some(register) = destination {
            self.cpu.set_register(register, result)?;
        }
        self.cpu.set_sign_zero_flag(result);
        Ok(())
    }

    pub(super) fn unary(&mut self, inst: Instruction, op: UnaryOp, form: Form) -> Result<(), Fault> {
        let operand = match form {
            Form::Immediate | Form::DiscardImmediate => inst.immediate_value(),
            Form::Inplace | Form::Discard => self.reg(inst.first_operand()),
            Form::Basic => self.reg(inst.second_operand()),
        };

        let result = op.apply(operand);
        self.cpu.set_register(inst.first_operand(), result)?;
        self.cpu.set_sign_zero_flag(result);
        Ok(())
    }

    /// Shifts `Rx` by the `op3` nibble, or by `Ry` when `by_register` is set.
    pub(super) fn shift(
        &mut self,
        inst: Instruction,
        op: ShiftOp,
        by_register: bool,
    ) -> Result<(), Fault> {
        let amount = if by_register {
            self.reg(inst.second_operand())
        } else {
            u16::from(inst.third_operand())
        };

        let result = op.apply(self.reg(inst.first_operand()), amount);
        self.cpu.set_register(inst.first_operand(), result)?;
        self.cpu.set_sign_zero_flag(result);
        Ok(())
    }

    // ============================================================================================
    // Stack
    // ============================================================================================

    pub(super) fn push(&mut self, inst: Instruction) -> Result<(), Fault> {
        self.cpu.push(self.reg(inst.first_operand()))
    }

    pub(super) fn pop(&mut self, inst: Instruction) -> Result<(), Fault> {
        let value = self.cpu.pop()?;
        self.cpu.set_register(inst.first_operand(), value)
    }

    /// Pushes `R0` through `R15`. Every register is attempted; the first fault is reported.
    pub(super) fn push_all(&mut self) -> Result<(), Fault> {
        let mut first = Ok(());
        for id in 0..16u8 {
            let pushed = self.cpu.push(self.reg(id));
            if first.is_ok() {
                first = pushed;
            }
        }
        first
    }

    /// Pops into `R15` down to `R0`. Registers whose pop fails keep their value.
    pub(super) fn pop_all(&mut self) -> Result<(), Fault> {
        let mut first = Ok(());
        for id in (0..16u8).rev() {
            let popped = self
                .cpu
                .pop()
                .and_then(|value| self.cpu.set_register(id, value));
            if first.is_ok() {
                first = popped;
            }
        }
        first
    }

    pub(super) fn push_flags(&mut self) -> Result<(), Fault> {
        self.cpu.push(self.cpu.flag_register())
    }

    pub(super) fn pop_flags(&mut self) -> Result<(), Fault> {
        let value = self.cpu.pop()?;
        self.cpu.set_flag_register(value);
        Ok(())
    }
}
