use capstone::arch::x86::X86OperandType;
use capstone::prelude::*;
use capstone::{Arch, Capstone, Mode, NO_EXTRA_MODE};

use crate::core::disassembler::{
    Architecture, Disassembler, DisassemblerError, DisassemblerResult,
};
use crate::core::instruction::{Instruction, InstructionCategory, MemoryOperand, Operand};

/// Capstone-backed x86 decoder, the alternative to iced-x86
pub struct CapstoneDisassembler {
    cs: Capstone,
    arch: Architecture,
}

impl CapstoneDisassembler {
    pub fn new(arch: Architecture) -> Option<Self> {
        let mode = match arch {
            Architecture::X86 => Mode::Mode32,
            Architecture::X86_64 => Mode::Mode64,
            _ => return None,
        };
        let mut cs = Capstone::new_raw(Arch::X86, mode, NO_EXTRA_MODE, None).ok()?;
        // Details carry the structured operands (needed for RIP-relative addressing)
        cs.set_detail(true).ok()?;
        Some(Self { cs, arch })
    }

    fn reg(&self, id: RegId) -> Option<String> {
        if id.0 == 0 {
            None
        } else {
            self.cs.reg_name(id).map(|n| n.to_ascii_lowercase())
        }
    }
}

impl Disassembler for CapstoneDisassembler {
    fn disassemble_instruction(
        &self,
        address: u64,
        bytes: &[u8],
    ) -> DisassemblerResult<Instruction> {
        let insns = self
            .cs
            .disasm_count(bytes, address, 1)
            .map_err(|e| DisassemblerError::InternalError(e.to_string()))?;
        let insn = insns
            .iter()
            .next()
            .ok_or(DisassemblerError::InvalidInstruction())?;

        let mnemonic = insn.mnemonic().unwrap_or("").to_ascii_lowercase();
        let mut operands = Vec::new();
        if let Ok(detail) = self.cs.insn_detail(insn) {
            if let Some(x86) = detail.arch_detail().x86() {
                for op in x86.operands() {
                    match op.op_type {
                        X86OperandType::Reg(r) => {
                            if let Some(name) = self.reg(r) {
                                operands.push(Operand::Register(name));
                            }
                        }
                        X86OperandType::Imm(i) => operands.push(Operand::Immediate(i)),
                        X86OperandType::Mem(m) => operands.push(Operand::Memory(MemoryOperand {
                            base: self.reg(m.base()),
                            index: self.reg(m.index()),
                            scale: m.scale() as u8,
                            displacement: m.disp(),
                        })),
                        _ => {}
                    }
                }
            }
        }

        let direct = matches!(operands.first(), Some(Operand::Immediate(_)));
        let category = InstructionCategory::from_x86_mnemonic(&mnemonic, direct);
        let op_str = insn.op_str().unwrap_or("");
        let text = if op_str.is_empty() {
            mnemonic.clone()
        } else {
            format!("{} {}", mnemonic, op_str)
        };
        let raw = insn.bytes();

        Ok(Instruction {
            address,
            bytes: raw.to_vec(),
            mnemonic,
            operands,
            length: raw.len() as u16,
            category,
            text,
        })
    }

    fn max_instruction_length(&self) -> usize {
        15
    }

    fn architecture(&self) -> Architecture {
        self.arch
    }

    fn name(&self) -> &str {
        "capstone"
    }
}
