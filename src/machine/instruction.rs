//! Encoded machine instructions.
//!
//! Every instruction is 32 bits, stored big-endian in memory:
//!
//! ```text
//!  31      24 23  20 19  16 15           8 7            0
//! +----------+------+------+---------------+--------------+
//! |  opcode  | op2  | op1  |   byte 2      |   byte 3     |
//! +----------+------+------+---------------+--------------+
//!                           op3 = low nibble of byte 2
//!                           immediate = byte 2 | byte 3 << 8
//! ```
//!
//! The low nibble of the opcode selects the addressing form inside an arithmetic group: `0` takes
//! an immediate, `1` works in place (`Rx = Rx op Ry`) and `2` writes a third register
//! (`Rz = Rx op Ry`).

use std::fmt;

use strum::{Display, EnumIter, FromRepr};

/// Opcodes understood by the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, FromRepr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
#[allow(missing_docs)]
pub enum Opcode {
    Nop = 0x00,
    Rnd = 0x07,

    Jmp = 0x10,
    Jmc = 0x11,
    Jx = 0x12,
    Jme = 0x13,
    Call = 0x14,
    Ret = 0x15,
    JmpReg = 0x16,
    Cx = 0x17,
    CallReg = 0x18,

    Ldi = 0x20,
    LdiSp = 0x21,
    Ldm = 0x22,
    LdmReg = 0x23,
    Mov = 0x24,

    Stm = 0x30,
    StmReg = 0x31,

    Addi = 0x40,
    AddInplace = 0x41,
    Add = 0x42,

    Subi = 0x50,
    SubInplace = 0x51,
    Sub = 0x52,
    Cmpi = 0x53,
    Cmp = 0x54,

    Andi = 0x60,
    AndInplace = 0x61,
    And = 0x62,
    Tsti = 0x63,
    Tst = 0x64,

    Ori = 0x70,
    OrInplace = 0x71,
    Or = 0x72,

    Xori = 0x80,
    XorInplace = 0x81,
    Xor = 0x82,

    Muli = 0x90,
    MulInplace = 0x91,
    Mul = 0x92,

    Divi = 0xA0,
    DivInplace = 0xA1,
    Div = 0xA2,
    Modi = 0xA3,
    ModInplace = 0xA4,
    Mod = 0xA5,

    Shl = 0xB0,
    Shr = 0xB1,
    Sar = 0xB2,
    ShlReg = 0xB3,
    ShrReg = 0xB4,
    SarReg = 0xB5,

    Push = 0xC0,
    Pop = 0xC1,
    PushAll = 0xC2,
    PopAll = 0xC3,
    PushF = 0xC4,
    PopF = 0xC5,

    Noti = 0xE0,
    NotInplace = 0xE1,
    Not = 0xE2,
    Negi = 0xE3,
    NegInplace = 0xE4,
    Neg = 0xE5,
}

/// One encoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Instruction(u32);

impl Instruction {
    /// Wraps a raw 32-bit encoding.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Creates an instruction with only its opcode set.
    #[must_use]
    pub const fn from_opcode(opcode: Opcode) -> Self {
        Self((opcode as u32) << 24)
    }

    /// Decodes the four bytes as laid out in memory.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(u32::from_be_bytes(bytes))
    }

    /// Returns the four bytes as laid out in memory.
    #[must_use]
    pub const fn to_bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }

    /// Returns the raw encoding.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Returns the opcode byte.
    #[must_use]
    pub const fn opcode(self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Returns the decoded opcode, or `None` if the interpreter has no handler for it.
    #[must_use]
    pub fn kind(self) -> Option<Opcode> {
        Opcode::from_repr(self.opcode())
    }

    /// Returns `op1`, the low nibble of byte 1.
    #[must_use]
    pub const fn first_operand(self) -> u8 {
        ((self.0 >> 16) & 0xF) as u8
    }

    /// Returns `op2`, the high nibble of byte 1.
    #[must_use]
    pub const fn second_operand(self) -> u8 {
        ((self.0 >> 20) & 0xF) as u8
    }

    /// Returns `op3`, the low nibble of byte 2.
    #[must_use]
    pub const fn third_operand(self) -> u8 {
        ((self.0 >> 8) & 0xF) as u8
    }

    /// Returns the little-endian immediate held in bytes 2 and 3.
    #[must_use]
    pub const fn immediate_value(self) -> u16 {
        (((self.0 << 8) & 0xFF00) | ((self.0 >> 8) & 0xFF)) as u16
    }

    /// Returns `true` when the low nibble of the opcode is 0, the immediate form.
    #[must_use]
    pub const fn use_immediate(self) -> bool {
        self.0 & 0x0F00_0000 == 0
    }

    /// Returns `true` when the low nibble of the opcode is odd.
    #[must_use]
    pub const fn is_inplace(self) -> bool {
        self.0 & 0x0100_0000 != 0
    }

    /// Returns `true` from opcode `0x05` upward.
    #[must_use]
    pub const fn is_arithmetic(self) -> bool {
        self.0 >= 0x0500_0000
    }

    /// Returns `true` for opcodes that read a register in `op2`.
    #[must_use]
    pub const fn use_second_operand(self) -> bool {
        matches!(
            self.opcode(),
            0x13 | 0x23
                | 0x24
                | 0x31
                | 0x51
                | 0x52
                | 0x61
                | 0x62
                | 0x64
                | 0x71
                | 0x72
                | 0x74
                | 0x81
                | 0x82
                | 0x91
                | 0x92
                | 0xA1
                | 0xA2
                | 0xB1
                | 0xB2
                | 0xC3
                | 0xC4
                | 0xC5
                | 0xD1
                | 0xD2
                | 0xE1
                | 0xE2
                | 0xF1
                | 0xF2
        )
    }

    /// Returns `true` for the three-register arithmetic form.
    #[must_use]
    pub const fn use_third_operand(self) -> bool {
        self.is_arithmetic() && (self.0 >> 24) & 0x0F == 2
    }

    // The setters OR their bits in: each field can only be set once.

    /// Sets `op1`.
    pub fn set_first_operand(&mut self, value: u8) {
        self.0 |= u32::from(value & 0xF) << 16;
    }

    /// Sets `op2`. Ignored for the immediate form.
    pub fn set_second_operand(&mut self, value: u8) {
        if !self.use_immediate() {
            self.0 |= u32::from(value & 0xF) << 20;
        }
    }

    /// Sets `op3`. Ignored for the immediate and in-place forms.
    pub fn set_third_operand(&mut self, value: u8) {
        if !self.use_immediate() && !self.is_inplace() {
            self.0 |= u32::from(value & 0xF) << 8;
        }
    }

    /// Sets the immediate. Ignored unless this is the immediate form.
    pub fn set_immediate_value(&mut self, value: u16) {
        if self.use_immediate() {
            self.0 |= ((u32::from(value) << 8) & 0xFF00) | ((u32::from(value) >> 8) & 0xFF);
        }
    }
}

impl From<u32> for Instruction {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            Some(opcode) => write!(f, "{opcode} {:#010x}", self.0),
            None => write!(f, "??? {:#010x}", self.0),
        }
    }
}
