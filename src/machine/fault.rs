//! Faults raised by CPU primitives.
//!
//! A [`Fault`] is the error type of every bounds-checked primitive on [`Cpu`](super::Cpu).
//! The interpreter never stops on its own when a primitive fails: it records the fault's bit in a
//! [`FaultFlags`] status word and carries on, leaving the decision to the host loop.

use bitflags::bitflags;
use thiserror::Error;

/// A failed CPU primitive.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    /// A register id beyond the register file was used.
    #[error("Unknown register R{0}")]
    UnknownRegister(u8),

    /// An address outside the region the access is allowed in.
    #[error("Invalid memory access at {0:#06x}")]
    MemoryError(u32),

    /// A push would grow the stack past its end.
    #[error("Stack overflow")]
    StackOverflow,

    /// A pop on an empty stack.
    #[error("Stack underflow")]
    StackUnderflow,

    /// An empty program image was loaded.
    #[error("Empty ROM")]
    EmptyRom,

    /// A program image larger than memory was loaded.
    #[error("ROM of {0} bytes does not fit in memory")]
    RomOverflow(usize),

    /// Division or remainder by zero.
    #[error("Division by zero")]
    DivideByZero,
}

bitflags! {
    /// Accumulated fault status.
    ///
    /// One bit per [`Fault`] kind, so that faults from successive steps accumulate.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FaultFlags: u8 {
        /// [`Fault::UnknownRegister`]
        const UNKNOWN_REGISTER = 0x01;
        /// [`Fault::MemoryError`]
        const MEMORY_ERROR = 0x02;
        /// [`Fault::StackOverflow`]
        const STACK_OVERFLOW = 0x04;
        /// [`Fault::StackUnderflow`]
        const STACK_UNDERFLOW = 0x08;
        /// [`Fault::EmptyRom`]
        const EMPTY_ROM = 0x10;
        /// [`Fault::RomOverflow`]
        const ROM_OVERFLOW = 0x20;
        /// [`Fault::DivideByZero`]
        const DIVIDE_BY_ZERO = 0x40;
    }
}

impl From<Fault> for FaultFlags {
    fn from(fault: Fault) -> Self {
        match fault {
            Fault::UnknownRegister(_) => FaultFlags::UNKNOWN_REGISTER,
            Fault::MemoryError(_) => FaultFlags::MEMORY_ERROR,
            Fault::StackOverflow => FaultFlags::STACK_OVERFLOW,
            Fault::StackUnderflow => FaultFlags::STACK_UNDERFLOW,
            Fault::EmptyRom => FaultFlags::EMPTY_ROM,
            Fault::RomOverflow(_) => FaultFlags::ROM_OVERFLOW,
            Fault::DivideByZero => FaultFlags::DIVIDE_BY_ZERO,
        }
    }
}

impl FaultFlags {
    /// Records the outcome of a primitive, returning `true` if it succeeded.
    pub fn record<T>(&mut self, result: Result<T, Fault>) -> bool {
        match result {
            Ok(_) => true,
            Err(fault) => {
                self.insert(fault.into());
                false
            }
        }
    }
}
