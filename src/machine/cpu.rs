//! Architectural state of the virtual machine.
//!
//! The [`Cpu`] owns sixteen 16-bit registers, the flag register, the program counter, the stack
//! pointer and a flat 64 KiB memory. Every primitive that can go out of bounds returns a
//! [`Fault`] and leaves the state untouched when it does.
//!
//! # Memory Map
//!
//! | Range | Use |
//! |-------|-----|
//! | `0x0000..=STACK_START` | Program and data, legal program counter values |
//! | `STACK_START..STACK_END` | Stack, growing upward two bytes per push |
//! | `STACK_END..` | Reserved |
//!
//! 16-bit values are stored low byte first.

use bitflags::bitflags;

use crate::machine::{
    constants::{INSTRUCTION_SIZE, MEMORY_SIZE, NB_REGISTERS, STACK_END, STACK_START},
    Fault, Instruction,
};

bitflags! {
    /// Bits of the flag register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Flags: u16 {
        /// Unsigned carry (or borrow for subtraction).
        const CARRY = 0x02;
        /// Result was zero.
        const ZERO = 0x04;
        /// Signed overflow.
        const OVERFLOW = 0x40;
        /// Result has its sign bit set.
        const NEGATIVE = 0x80;
    }
}

/// Registers, flags and memory of one virtual machine.
#[derive(Debug, Clone)]
pub struct Cpu {
    registers: [u16; NB_REGISTERS],
    flags: u16,
    pc: u16,
    sp: u16,
    memory: Box<[u8]>,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu {
    /// Creates a CPU in its power-on state: everything zeroed, stack pointer at
    /// [`STACK_START`].
    #[must_use]
    pub fn new() -> Self {
        Cpu {
            registers: [0; NB_REGISTERS],
            flags: 0,
            pc: 0,
            sp: STACK_START,
            memory: vec![0; MEMORY_SIZE].into_boxed_slice(),
        }
    }

    /// Restores the power-on state.
    pub fn reset(&mut self) {
        self.registers = [0; NB_REGISTERS];
        self.flags = 0;
        self.pc = 0;
        self.sp = STACK_START;
        self.memory.fill(0);
    }

    /// Copies `program` to the start of memory.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::EmptyRom`] for an empty image and [`Fault::RomOverflow`] if it is larger
    /// than memory.
    pub fn init_memory(&mut self, program: &[u8]) -> Result<(), Fault> {
        if program.is_empty() {
            return Err(Fault::EmptyRom);
        }
        if program.len() > MEMORY_SIZE {
            return Err(Fault::RomOverflow(program.len()));
        }
        self.memory[..program.len()].copy_from_slice(program);
        Ok(())
    }

    // ============================================================================================
    // Dumps
    // ============================================================================================

    /// Returns the register file.
    #[must_use]
    pub fn registers(&self) -> &[u16; NB_REGISTERS] {
        &self.registers
    }

    /// Returns one register, or 0 for an id beyond the register file.
    #[must_use]
    pub fn register(&self, id: u8) -> u16 {
        self.registers.get(usize::from(id)).copied().unwrap_or(0)
    }

    /// Returns the raw flag register.
    #[must_use]
    pub fn flag_register(&self) -> u16 {
        self.flags
    }

    /// Returns the flag register as typed flags. Unused bits are dropped.
    #[must_use]
    pub fn flags(&self) -> Flags {
        Flags::from_bits_truncate(self.flags)
    }

    /// Returns the program counter.
    #[must_use]
    pub fn program_counter(&self) -> u16 {
        self.pc
    }

    /// Returns the stack pointer.
    #[must_use]
    pub fn stack_pointer(&self) -> u16 {
        self.sp
    }

    /// Returns the whole memory.
    #[must_use]
    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    // ============================================================================================
    // Setters
    // ============================================================================================

    /// Writes a register.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::UnknownRegister`] if `id` is not below 16.
    pub fn set_register(&mut self, id: u8, value: u16) -> Result<(), Fault> {
        match self.registers.get_mut(usize::from(id)) {
            Some(register) => {
                *register = value;
                Ok(())
            }
            None => {
                log::debug!("Not a valid register id: {id}");
                Err(Fault::UnknownRegister(id))
            }
        }
    }

    /// Overwrites the flag register. Only the low byte is kept.
    pub fn set_flag_register(&mut self, value: u16) {
        self.flags = value & 0xFF;
    }

    /// Sets the given flags.
    pub fn set_flag(&mut self, flags: Flags) {
        self.flags |= flags.bits();
    }

    /// Clears the given flags.
    pub fn unset_flag(&mut self, flags: Flags) {
        self.flags &= !flags.bits();
    }

    fn update_flag(&mut self, flags: Flags, condition: bool) {
        if condition {
            self.set_flag(flags);
        } else {
            self.unset_flag(flags);
        }
    }

    /// Moves the program counter.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::MemoryError`] if `value` lies beyond [`STACK_START`].
    pub fn set_program_counter(&mut self, value: u16) -> Result<(), Fault> {
        if value > STACK_START {
            log::debug!("Not a valid value for the PC: {value:#06x}");
            return Err(Fault::MemoryError(u32::from(value)));
        }
        self.pc = value;
        Ok(())
    }

    /// Moves the stack pointer.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::MemoryError`] if `value` is outside `STACK_START..=STACK_END`.
    pub fn set_stack_pointer(&mut self, value: u16) -> Result<(), Fault> {
        if !(STACK_START..=STACK_END).contains(&value) {
            log::debug!("Not a valid value for the SP: {value:#06x}");
            return Err(Fault::MemoryError(u32::from(value)));
        }
        self.sp = value;
        Ok(())
    }

    /// Rewinds the program counter by one instruction.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::MemoryError`] if the program counter is already on the first
    /// instruction.
    pub fn step_back(&mut self) -> Result<(), Fault> {
        match self.pc.checked_sub(INSTRUCTION_SIZE) {
            Some(pc) => {
                self.pc = pc;
                Ok(())
            }
            None => Err(Fault::MemoryError(u32::from(self.pc))),
        }
    }

    // ============================================================================================
    // Memory
    // ============================================================================================

    /// Reads the 4-byte big-endian instruction at the program counter and advances past it.
    pub fn fetch_instruction(&mut self) -> Instruction {
        let mut raw = 0u32;
        for _ in 0..INSTRUCTION_SIZE {
            raw = (raw << 8) | u32::from(self.memory[usize::from(self.pc)]);
            self.pc = self.pc.wrapping_add(1);
        }
        Instruction::new(raw)
    }

    /// Reads a 16-bit value.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::MemoryError`] for an address strictly inside the stack region or for a
    /// read running past the end of memory.
    pub fn load(&self, address: u16) -> Result<u16, Fault> {
        let low = usize::from(address);
        if (STACK_START < address && address < STACK_END) || low + 1 >= MEMORY_SIZE {
            log::debug!("Address out of memory: {address:#06x}");
            return Err(Fault::MemoryError(u32::from(address)));
        }
        Ok(u16::from_le_bytes([self.memory[low], self.memory[low + 1]]))
    }

    /// Writes a 16-bit value, low byte first.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::MemoryError`] for an address beyond [`STACK_START`].
    pub fn store(&mut self, address: u16, value: u16) -> Result<(), Fault> {
        if address > STACK_START {
            log::debug!("Address out of memory: {address:#06x}");
            return Err(Fault::MemoryError(u32::from(address)));
        }
        let low = usize::from(address);
        self.memory[low..low + 2].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Pushes a value on the stack.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::StackOverflow`] if the stack is full.
    pub fn push(&mut self, value: u16) -> Result<(), Fault> {
        if u32::from(self.sp) + 2 > u32::from(STACK_END) {
            log::debug!("Stack overflow while pushing {value}");
            return Err(Fault::StackOverflow);
        }
        let low = usize::from(self.sp);
        self.memory[low..low + 2].copy_from_slice(&value.to_le_bytes());
        self.sp += 2;
        Ok(())
    }

    /// Pops a value from the stack.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::StackUnderflow`] if the stack is empty.
    pub fn pop(&mut self) -> Result<u16, Fault> {
        if u32::from(self.sp) < u32::from(STACK_START) + 2 {
            log::debug!("Stack underflow");
            return Err(Fault::StackUnderflow);
        }
        self.sp -= 2;
        let low = usize::from(self.sp);
        Ok(u16::from_le_bytes([self.memory[low], self.memory[low + 1]]))
    }

    /// Pushes the program counter, as a call does before jumping.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::StackOverflow`] if the stack is full.
    pub fn push_pc(&mut self) -> Result<(), Fault> {
        self.push(self.pc)
    }

    // ============================================================================================
    // Flag computation
    // ============================================================================================

    /// Sets zero and negative from a result.
    pub fn set_sign_zero_flag(&mut self, result: u16) {
        self.update_flag(Flags::ZERO, result == 0);
        self.update_flag(Flags::NEGATIVE, result & 0x8000 != 0);
    }

    /// Sets carry and overflow for `op1 + op2`.
    pub fn set_carry_overflow_flag_add(&mut self, op1: u16, op2: u16) {
        let result = op1.wrapping_add(op2);
        self.update_flag(Flags::CARRY, result < op1);
        self.update_flag(
            Flags::OVERFLOW,
            (is_negative(op1) && is_negative(op2))
                || (!is_negative(op1) && !is_negative(op2) && is_negative(result)),
        );
    }

    /// Sets carry (borrow) and overflow for `op1 - op2`.
    pub fn set_carry_overflow_flag_sub(&mut self, op1: u16, op2: u16) {
        let result = op1.wrapping_sub(op2);
        self.update_flag(Flags::CARRY, op1 < op2);
        self.update_flag(
            Flags::OVERFLOW,
            is_negative(op1) != is_negative(op2) && is_negative(result) != is_negative(op1),
        );
    }

    /// Sets carry when `op1 * op2` does not fit in 16 bits.
    pub fn set_carry_overflow_flag_mul(&mut self, op1: u16, op2: u16) {
        let product = u32::from(op1) * u32::from(op2);
        self.update_flag(Flags::CARRY, product > u32::from(u16::MAX));
    }

    /// Sets carry when `op1 / op2` leaves a remainder. A zero divisor clears it.
    pub fn set_carry_overflow_flag_div(&mut self, op1: u16, op2: u16) {
        self.update_flag(Flags::CARRY, op1.checked_rem(op2).is_some_and(|r| r != 0));
    }
}

fn is_negative(value: u16) -> bool {
    value & 0x8000 != 0
}
