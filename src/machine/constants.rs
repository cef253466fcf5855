//! Memory map and architectural sizes of the virtual machine.

/// Size of the ROM header stripped before the program is loaded.
pub const HEADER_SIZE: usize = 16;

/// Offset of the initial program counter inside the ROM header.
pub const HEADER_PC_OFFSET: usize = 0x0A;

/// Size of the flat address space, in bytes.
pub const MEMORY_SIZE: usize = 64 * 1024;

/// First byte of the stack region. Also the highest legal program counter.
pub const STACK_START: u16 = 0xFDF0;

/// One past the last byte of the stack region.
pub const STACK_END: u16 = 0xFFF0;

/// Number of general purpose registers.
pub const NB_REGISTERS: usize = 16;

/// Size of one encoded instruction, in bytes.
pub const INSTRUCTION_SIZE: u16 = 4;
