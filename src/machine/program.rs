//! Program images.
//!
//! A ROM starts with a fixed 16-byte header. Byte `0x0A` of the header is the initial program
//! counter; the rest of the header is not interpreted. Everything after the header is the memory
//! image, copied to address 0 when the program is loaded.

use crate::{
    machine::{
        constants::{HEADER_PC_OFFSET, HEADER_SIZE, MEMORY_SIZE},
        Instruction,
    },
    Error, Result,
};

/// A loadable program: a memory image and the address execution starts at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    entry: u16,
    image: Vec<u8>,
}

impl Program {
    /// Parses a ROM, header included.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidProgram`] if the ROM is not longer than its header or if the
    /// image does not fit in memory.
    pub fn from_rom(rom: &[u8]) -> Result<Self> {
        if rom.len() <= HEADER_SIZE {
            return Err(Error::InvalidProgram(format!(
                "ROM of {} bytes holds no code after its {HEADER_SIZE}-byte header",
                rom.len()
            )));
        }

        let image = &rom[HEADER_SIZE..];
        if image.len() > MEMORY_SIZE {
            return Err(Error::InvalidProgram(format!(
                "image of {} bytes exceeds memory",
                image.len()
            )));
        }

        Ok(Program {
            entry: u16::from(rom[HEADER_PC_OFFSET]),
            image: image.to_vec(),
        })
    }

    /// Wraps a raw memory image that starts executing at address 0.
    #[must_use]
    pub fn from_image(image: Vec<u8>) -> Self {
        Program { entry: 0, image }
    }

    /// Lays out `instructions` back to back from address 0.
    #[must_use]
    pub fn from_instructions(instructions: &[Instruction]) -> Self {
        let image = instructions
            .iter()
            .flat_map(|inst| inst.to_bytes())
            .collect();
        Self::from_image(image)
    }

    /// Returns the initial program counter.
    #[must_use]
    pub fn entry(&self) -> u16 {
        self.entry
    }

    /// Returns the memory image.
    #[must_use]
    pub fn image(&self) -> &[u8] {
        &self.image
    }

    /// Builds a ROM for this program, with the entry point recorded in the header.
    ///
    /// Entry points above 255 do not fit the header byte and are truncated.
    #[must_use]
    pub fn to_rom(&self) -> Vec<u8> {
        let mut rom = vec![0u8; HEADER_SIZE];
        rom[..4].copy_from_slice(b"CH16");
        rom[HEADER_PC_OFFSET] = self.entry.to_le_bytes()[0];
        rom.extend_from_slice(&self.image);
        rom
    }
}
