//! Fetch, decode and execute loop.
//!
//! The [`Interpreter`] owns a [`Cpu`] and executes one instruction per
//! [`Interpreter::interpret_one`] call. Handlers never abort: a failed primitive becomes a bit
//! in the step's [`FaultFlags`], which is also ORed into a running status the host can inspect.
//! Opcodes without a handler are logged and skipped.
//!
//! # Example
//!
//! ```rust
//! use toslang::machine::{Instruction, Interpreter, MachineLimits, Program, StopReason};
//!
//! let program = Program::from_instructions(&[
//!     Instruction::new(0x4000_0500), // ADDI R0, 5
//!     Instruction::new(0x4001_0300), // ADDI R1, 3
//!     Instruction::new(0x4210_0200), // ADD R0, R1, R2
//!     Instruction::new(0xC100_0000), // POP R0 on an empty stack
//! ]);
//!
//! let mut interpreter = Interpreter::with_seed(0);
//! interpreter.load_program(&program)?;
//! let summary = interpreter.run(&MachineLimits::default());
//!
//! assert_eq!(summary.executed, 4);
//! assert_eq!(summary.reason, StopReason::Fault);
//! assert_eq!(interpreter.cpu().register(2), 8);
//! # Ok::<(), toslang::Error>(())
//! ```

mod handlers;

use rand::{rngs::StdRng, SeedableRng};

use crate::{
    machine::{Cpu, Fault, FaultFlags, Instruction, MachineLimits, Opcode, Program},
    Result,
};

/// Why [`Interpreter::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A step raised a fault and the limits ask to stop on faults.
    Fault,
    /// The instruction budget was used up.
    InstructionLimit,
}

/// Outcome of [`Interpreter::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Instructions executed by this run.
    pub executed: u64,
    /// Faults accumulated by this run.
    pub status: FaultFlags,
    /// Why the run ended.
    pub reason: StopReason,
}

/// Interpreter for the 16-bit virtual machine.
pub struct Interpreter {
    /// Architectural state.
    cpu: Cpu,

    /// Source of `RND` values.
    rng: StdRng,

    /// Faults accumulated since the last reset.
    status: FaultFlags,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Creates an interpreter whose `RND` instruction is seeded from the OS.
    #[must_use]
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Creates an interpreter with a deterministic `RND` sequence.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Interpreter {
            cpu: Cpu::new(),
            rng,
            status: FaultFlags::empty(),
        }
    }

    /// Returns the CPU state.
    #[must_use]
    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    /// Returns the CPU state for modification.
    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    /// Returns the faults accumulated since the last reset.
    #[must_use]
    pub fn status(&self) -> FaultFlags {
        self.status
    }

    /// Restores the CPU to its power-on state and clears the status.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.status = FaultFlags::empty();
    }

    /// Copies a program into memory and points the program counter at its entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Fault`](crate::Error::Fault) if the image is empty or too large, or if
    /// the entry point is not a legal program counter.
    pub fn load_program(&mut self, program: &Program) -> Result<()> {
        self.cpu.init_memory(program.image())?;
        self.cpu.set_program_counter(program.entry())?;
        Ok(())
    }

    /// Executes one instruction.
    ///
    /// # Returns
    ///
    /// The faults raised by this instruction alone. They are also added to
    /// [`Interpreter::status`].
    pub fn interpret_one(&mut self) -> FaultFlags {
        let instruction = self.cpu.fetch_instruction();
        log::trace!(
            "{:#06x}: {instruction}",
            self.cpu.program_counter().wrapping_sub(4)
        );

        let mut step = FaultFlags::empty();
        step.record(self.execute(instruction));
        self.status |= step;
        step
    }

    /// Executes instructions until the limits stop the run.
    ///
    /// With `stop_on_fault` unset and no instruction budget this never returns, since the
    /// machine has no halt instruction.
    pub fn run(&mut self, limits: &MachineLimits) -> RunSummary {
        let mut executed = 0u64;
        let mut status = FaultFlags::empty();

        loop {
            if limits.is_exhausted(executed) {
                return RunSummary {
                    executed,
                    status,
                    reason: StopReason::InstructionLimit,
                };
            }

            let step = self.interpret_one();
            executed += 1;
            status |= step;

            if limits.stop_on_fault && !step.is_empty() {
                log::debug!("Run stopped after {executed} instructions: {step:?}");
                return RunSummary {
                    executed,
                    status,
                    reason: StopReason::Fault,
                };
            }
        }
    }

    fn execute(&mut self, instruction: Instruction) -> std::result::Result<(), Fault> {
        use handlers::{AluOp, Form, ShiftOp, UnaryOp};

        let Some(opcode) = instruction.kind() else {
            log::warn!(
                "Unknown opcode {:#04x}, instruction skipped",
                instruction.opcode()
            );
            return Ok(());
        };

        match opcode {
            Opcode::Nop => Ok(()),
            Opcode::Rnd => self.random(instruction),

            Opcode::Jmp => self.jump(instruction),
            Opcode::Jmc => self.jump_on_carry(instruction),
            Opcode::Jx => self.jump_if(instruction),
            Opcode::Jme => self.jump_if_equal(instruction),
            Opcode::Call => self.call(instruction.immediate_value()),
            Opcode::Ret => self.ret(),
            Opcode::JmpReg => self.jump_indirect(instruction),
            Opcode::Cx => self.call_if(instruction),
            Opcode::CallReg => self.call(self.cpu.register(instruction.first_operand())),

            Opcode::Ldi => self.load_immediate(instruction),
            Opcode::LdiSp => self.load_stack_pointer(instruction),
            Opcode::Ldm => self.load_direct(instruction),
            Opcode::LdmReg => self.load_indirect(instruction),
            Opcode::Mov => self.mov(instruction),

            Opcode::Stm => self.store_direct(instruction),
            Opcode::StmReg => self.store_indirect(instruction),

            Opcode::Addi => self.binary(instruction, AluOp::Add, Form::Immediate),
            Opcode::AddInplace => self.binary(instruction, AluOp::Add, Form::Inplace),
            Opcode::Add => self.binary(instruction, AluOp::Add, Form::Basic),
            Opcode::Subi => self.binary(instruction, AluOp::Sub, Form::Immediate),
            Opcode::SubInplace => self.binary(instruction, AluOp::Sub, Form::Inplace),
            Opcode::Sub => self.binary(instruction, AluOp::Sub, Form::Basic),
            Opcode::Cmpi => self.binary(instruction, AluOp::Sub, Form::DiscardImmediate),
            Opcode::Cmp => self.binary(instruction, AluOp::Sub, Form::Discard),
            Opcode::Andi => self.binary(instruction, AluOp::And, Form::Immediate),
            Opcode::AndInplace => self.binary(instruction, AluOp::And, Form::Inplace),
            Opcode::And => self.binary(instruction, AluOp::And, Form::Basic),
            Opcode::Tsti => self.binary(instruction, AluOp::And, Form::DiscardImmediate),
            Opcode::Tst => self.binary(instruction, AluOp::And, Form::Discard),
            Opcode::Ori => self.binary(instruction, AluOp::Or, Form::Immediate),
            Opcode::OrInplace => self.binary(instruction, AluOp::Or, Form::Inplace),
            Opcode::Or => self.binary(instruction, AluOp::Or, Form::Basic),
            Opcode::Xori => self.binary(instruction, AluOp::Xor, Form::Immediate),
            Opcode::XorInplace => self.binary(instruction, AluOp::Xor, Form::Inplace),
            Opcode::Xor => self.binary(instruction, AluOp::Xor, Form::Basic),
            Opcode::Muli => self.binary(instruction, AluOp::Mul, Form::Immediate),
            Opcode::MulInplace => self.binary(instruction, AluOp::Mul, Form::Inplace),
            Opcode::Mul => self.binary(instruction, AluOp::Mul, Form::Basic),
            Opcode::Divi => self.binary(instruction, AluOp::Div, Form::Immediate),
            Opcode::DivInplace => self.binary(instruction, AluOp::Div, Form::Inplace),
            Opcode::Div => self.binary(instruction, AluOp::Div, Form::Basic),
            Opcode::Modi => self.binary(instruction, AluOp::Mod, Form::Immediate),
            Opcode::ModInplace => self.binary(instruction, AluOp::Mod, Form::Inplace),
            Opcode::Mod => self.binary(instruction, AluOp::Mod, Form::Basic),

            Opcode::Shl => self.shift(instruction, ShiftOp::Shl, false),
            Opcode::Shr => self.shift(instruction, ShiftOp::Shr, false),
            Opcode::Sar => self.shift(instruction, ShiftOp::Sar, false),
            Opcode::ShlReg => self.shift(instruction, ShiftOp::Shl, true),
            Opcode::ShrReg => self.shift(instruction, ShiftOp::Shr, true),
            Opcode::SarReg => self.shift(instruction, ShiftOp::Sar, true),

            Opcode::Push => self.push(instruction),
            Opcode::Pop => self.pop(instruction),
            Opcode::PushAll => self.push_all(),
            Opcode::PopAll => self.pop_all(),
            Opcode::PushF => self.push_flags(),
            Opcode::PopF => self.pop_flags(),

            Opcode::Noti => self.unary(instruction, UnaryOp::Not, Form::Immediate),
            Opcode::NotInplace => self.unary(instruction, UnaryOp::Not, Form::Inplace),
            Opcode::Not => self.unary(instruction, UnaryOp::Not, Form::Basic),
            Opcode::Negi => self.unary(instruction, UnaryOp::Neg, Form::Immediate),
            Opcode::NegInplace => self.unary(instruction, UnaryOp::Neg, Form::Inplace),
            Opcode::Neg => self.unary(instruction, UnaryOp::Neg, Form::Basic),
        }
    }
}
