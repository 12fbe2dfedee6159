//! Disassembler trait and error types for instruction decoding.
//!
//! This module defines the Disassembler trait that provides a common interface
//! for the decoder backends (iced-x86, Capstone). It also includes error types
//! for disassembly operations and the architecture/endianness vocabulary shared
//! with the artifact model.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::instruction::Instruction;
use crate::formats::elf::{ElfData, ElfMachine};

/// Errors that can occur during disassembly operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisassemblerError {
    /// Invalid instruction bytes
    InvalidInstruction(),
    /// Insufficient bytes for complete instruction
    InsufficientBytes(),
    /// Unsupported architecture for the selected backend
    UnsupportedArchitecture(),
    /// Internal disassembler error with message
    InternalError(String),
}

impl fmt::Display for DisassemblerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisassemblerError::InvalidInstruction() => write!(f, "InvalidInstruction"),
            DisassemblerError::InsufficientBytes() => write!(f, "InsufficientBytes"),
            DisassemblerError::UnsupportedArchitecture() => write!(f, "UnsupportedArchitecture"),
            DisassemblerError::InternalError(msg) => write!(f, "InternalError: {}", msg),
        }
    }
}

impl std::error::Error for DisassemblerError {}

/// Result type for disassembly operations
pub type DisassemblerResult<T> = Result<T, DisassemblerError>;

/// Machine architectures reported by the container parser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Architecture {
    /// x86 (32-bit)
    X86,
    /// x86-64 (64-bit)
    X86_64,
    ARM,
    ARM64,
    MIPS,
    PPC,
    PPC64,
    RISCV,
    /// Unknown/unsupported architecture
    Unknown,
}

impl Architecture {
    /// Whether instruction recovery is available for this architecture
    pub fn is_x86_family(&self) -> bool {
        matches!(self, Architecture::X86 | Architecture::X86_64)
    }

    /// Decoder bitness for x86 targets
    pub fn x86_bitness(&self) -> Option<u32> {
        match self {
            Architecture::X86 => Some(32),
            Architecture::X86_64 => Some(64),
            _ => None,
        }
    }
}

impl From<ElfMachine> for Architecture {
    fn from(machine: ElfMachine) -> Self {
        match machine {
            ElfMachine::X86 => Architecture::X86,
            ElfMachine::X86_64 => Architecture::X86_64,
            ElfMachine::ARM => Architecture::ARM,
            ElfMachine::AArch64 => Architecture::ARM64,
            ElfMachine::Mips => Architecture::MIPS,
            ElfMachine::PowerPC => Architecture::PPC,
            ElfMachine::PowerPC64 => Architecture::PPC64,
            ElfMachine::RiscV => Architecture::RISCV,
            ElfMachine::None | ElfMachine::Other(_) => Architecture::Unknown,
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Architecture::X86 => write!(f, "x86"),
            Architecture::X86_64 => write!(f, "x86_64"),
            Architecture::ARM => write!(f, "arm"),
            Architecture::ARM64 => write!(f, "arm64"),
            Architecture::MIPS => write!(f, "mips"),
            Architecture::PPC => write!(f, "ppc"),
            Architecture::PPC64 => write!(f, "ppc64"),
            Architecture::RISCV => write!(f, "riscv"),
            Architecture::Unknown => write!(f, "unknown"),
        }
    }
}

/// Byte order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endianness {
    Little,
    Big,
}

impl From<ElfData> for Endianness {
    fn from(data: ElfData) -> Self {
        match data {
            ElfData::Little => Endianness::Little,
            ElfData::Big => Endianness::Big,
        }
    }
}

impl fmt::Display for Endianness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endianness::Little => write!(f, "little"),
            Endianness::Big => write!(f, "big"),
        }
    }
}

/// Core disassembler trait that provides a common interface for instruction decoding
pub trait Disassembler {
    /// Disassemble a single instruction at the given address
    ///
    /// # Arguments
    /// * `address` - The virtual address of the first byte
    /// * `bytes` - The raw bytes to disassemble
    fn disassemble_instruction(&self, address: u64, bytes: &[u8])
        -> DisassemblerResult<Instruction>;

    /// Get the maximum instruction length for this architecture in bytes
    fn max_instruction_length(&self) -> usize;

    /// Get the architecture this disassembler supports
    fn architecture(&self) -> Architecture;

    /// Get a human-readable name for this disassembler
    fn name(&self) -> &str {
        "Generic Disassembler"
    }

    /// Linear sweep over `bytes` starting at `address`
    ///
    /// Stops at the end of the buffer, at the first byte sequence that does not
    /// decode, or after `max_instructions` instructions.
    fn disassemble_range(
        &self,
        address: u64,
        bytes: &[u8],
        max_instructions: usize,
    ) -> Vec<Instruction> {
        let mut out = Vec::new();
        let mut offset = 0usize;
        while offset < bytes.len() && out.len() < max_instructions {
            let ip = address.wrapping_add(offset as u64);
            let insn = match self.disassemble_instruction(ip, &bytes[offset..]) {
                Ok(insn) => insn,
                Err(e) => {
                    tracing::debug!(address = ip, error = %e, "linear sweep stopped");
                    break;
                }
            };
            if insn.length == 0 {
                break;
            }
            offset += insn.length as usize;
            out.push(insn);
        }
        out
    }
}
