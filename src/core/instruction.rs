//! Instruction and Operand types for decoded assembly instructions.
//!
//! Backends translate their native instruction objects into these records so
//! recovery code never depends on a particular decoder.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Control-flow category of an instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstructionCategory {
    /// Falls through to the next instruction
    Sequential,
    /// Unconditional direct jump
    Branch,
    /// Conditional direct jump
    ConditionalBranch,
    /// Jump through a register or memory
    IndirectBranch,
    /// Direct call
    Call,
    /// Call through a register or memory
    IndirectCall,
    Return,
    /// Software interrupt, syscall or trap
    Interrupt,
}

impl InstructionCategory {
    /// Classify an x86 mnemonic; `direct` is whether the first operand is an immediate target
    pub fn from_x86_mnemonic(mnemonic: &str, direct: bool) -> Self {
        let m = mnemonic.to_ascii_lowercase();
        match m.as_str() {
            "ret" | "retq" | "retf" | "iret" | "iretd" | "iretq" => Self::Return,
            "call" | "callq" if direct => Self::Call,
            "call" | "callq" => Self::IndirectCall,
            "jmp" | "jmpq" if direct => Self::Branch,
            "jmp" | "jmpq" => Self::IndirectBranch,
            "int" | "int1" | "int3" | "into" | "syscall" | "sysenter" | "ud2" => Self::Interrupt,
            _ if m.starts_with('j') || m.starts_with("loop") => Self::ConditionalBranch,
            _ => Self::Sequential,
        }
    }
}

impl fmt::Display for InstructionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Sequential => "sequential",
            Self::Branch => "branch",
            Self::ConditionalBranch => "conditional_branch",
            Self::IndirectBranch => "indirect_branch",
            Self::Call => "call",
            Self::IndirectCall => "indirect_call",
            Self::Return => "return",
            Self::Interrupt => "interrupt",
        };
        write!(f, "{}", s)
    }
}

/// Memory operand `[base + index*scale + displacement]`
///
/// For instruction-pointer-relative operands `displacement` is the raw encoded
/// displacement, relative to the end of the instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryOperand {
    pub base: Option<String>,
    pub index: Option<String>,
    pub scale: u8,
    pub displacement: i64,
}

impl MemoryOperand {
    pub fn is_ip_relative(&self) -> bool {
        matches!(self.base.as_deref(), Some("rip") | Some("eip"))
    }
}

/// Structured operand representation for instructions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    Register(String),
    /// Immediate value; direct branch targets are absolute addresses
    Immediate(i64),
    Memory(MemoryOperand),
}

impl Operand {
    pub fn as_immediate(&self) -> Option<i64> {
        match self {
            Operand::Immediate(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_memory(&self) -> Option<&MemoryOperand> {
        match self {
            Operand::Memory(m) => Some(m),
            _ => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Register(r) => write!(f, "{}", r),
            Operand::Immediate(v) => write!(f, "{:#x}", v),
            Operand::Memory(m) => {
                write!(f, "[")?;
                let mut first = true;
                if let Some(base) = &m.base {
                    write!(f, "{}", base)?;
                    first = false;
                }
                if let Some(index) = &m.index {
                    if !first {
                        write!(f, "+")?;
                    }
                    write!(f, "{}*{}", index, m.scale)?;
                    first = false;
                }
                if m.displacement != 0 || first {
                    if !first && m.displacement >= 0 {
                        write!(f, "+")?;
                    }
                    if m.displacement < 0 {
                        write!(f, "-{:#x}", m.displacement.unsigned_abs())?;
                    } else {
                        write!(f, "{:#x}", m.displacement)?;
                    }
                }
                write!(f, "]")
            }
        }
    }
}

/// A decoded instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub address: u64,
    pub bytes: Vec<u8>,
    /// Lowercase mnemonic without prefixes or operands
    pub mnemonic: String,
    pub operands: Vec<Operand>,
    pub length: u16,
    pub category: InstructionCategory,
    /// Full formatted text as produced by the backend
    pub text: String,
}

impl Instruction {
    /// Address of the following instruction
    pub fn next_address(&self) -> u64 {
        self.address.wrapping_add(self.length as u64)
    }

    /// Target of a direct call or jump
    pub fn direct_target(&self) -> Option<u64> {
        match self.category {
            InstructionCategory::Call
            | InstructionCategory::Branch
            | InstructionCategory::ConditionalBranch => {
                self.operands.first()?.as_immediate().map(|v| v as u64)
            }
            _ => None,
        }
    }

    /// Absolute address referenced by an instruction-pointer-relative memory operand
    pub fn ip_relative_target(&self) -> Option<u64> {
        self.operands
            .iter()
            .filter_map(Operand::as_memory)
            .find(|m| m.is_ip_relative())
            .map(|m| self.next_address().wrapping_add(m.displacement as u64))
    }

    pub fn opcode_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}: {}", self.address, self.text)
    }
}
