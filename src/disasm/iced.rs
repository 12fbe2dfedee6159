use iced_x86::{
    Decoder, DecoderError, DecoderOptions, FlowControl, Formatter, IntelFormatter, OpKind,
    Register as IReg,
};

use crate::core::disassembler::{
    Architecture, Disassembler, DisassemblerError, DisassemblerResult,
};
use crate::core::instruction::{Instruction, InstructionCategory, MemoryOperand, Operand};

pub struct IcedDisassembler {
    bits: u32,
    arch: Architecture,
}

impl IcedDisassembler {
    /// Create a decoder for x86 or x86-64; `None` for other architectures
    pub fn new(arch: Architecture) -> Option<Self> {
        let bits = arch.x86_bitness()?;
        Some(Self { bits, arch })
    }

    fn reg_name(reg: IReg) -> Option<String> {
        if reg == IReg::None {
            None
        } else {
            Some(format!("{:?}", reg).to_ascii_lowercase())
        }
    }

    fn iced_operands(instr: &iced_x86::Instruction) -> Vec<Operand> {
        let mut out = Vec::new();
        for i in 0..instr.op_count() {
            match instr.op_kind(i) {
                OpKind::Register => {
                    if let Some(name) = Self::reg_name(instr.op_register(i)) {
                        out.push(Operand::Register(name));
                    }
                }
                OpKind::Memory => {
                    // iced folds RIP-relative displacements into the absolute
                    // target; store the encoded displacement instead.
                    let (base, displacement) = if instr.is_ip_rel_memory_operand() {
                        let base = if instr.memory_base() == IReg::EIP { "eip" } else { "rip" };
                        let disp = instr.ip_rel_memory_address().wrapping_sub(instr.next_ip()) as i64;
                        (Some(base.to_string()), disp)
                    } else {
                        (
                            Self::reg_name(instr.memory_base()),
                            instr.memory_displacement64() as i64,
                        )
                    };
                    out.push(Operand::Memory(MemoryOperand {
                        base,
                        index: Self::reg_name(instr.memory_index()),
                        scale: instr.memory_index_scale() as u8,
                        displacement,
                    }));
                }
                OpKind::Immediate8 => out.push(Operand::Immediate(instr.immediate8() as i8 as i64)),
                OpKind::Immediate16 => {
                    out.push(Operand::Immediate(instr.immediate16() as i16 as i64))
                }
                OpKind::Immediate32 => {
                    out.push(Operand::Immediate(instr.immediate32() as i32 as i64))
                }
                OpKind::Immediate64 => out.push(Operand::Immediate(instr.immediate64() as i64)),
                OpKind::Immediate8to16
                | OpKind::Immediate8to32
                | OpKind::Immediate8to64
                | OpKind::Immediate32to64 => out.push(Operand::Immediate(instr.immediate(i) as i64)),
                OpKind::NearBranch16 | OpKind::NearBranch32 | OpKind::NearBranch64 => {
                    out.push(Operand::Immediate(instr.near_branch_target() as i64));
                }
                // Far branches, string-instruction implicit memory and friends
                // have no structured form here; the formatted text still shows them.
                _ => {}
            }
        }
        out
    }

    fn category(instr: &iced_x86::Instruction) -> InstructionCategory {
        match instr.flow_control() {
            FlowControl::Next | FlowControl::XbeginXabortXend => InstructionCategory::Sequential,
            FlowControl::UnconditionalBranch => InstructionCategory::Branch,
            FlowControl::ConditionalBranch => InstructionCategory::ConditionalBranch,
            FlowControl::IndirectBranch => InstructionCategory::IndirectBranch,
            FlowControl::Call => InstructionCategory::Call,
            FlowControl::IndirectCall => InstructionCategory::IndirectCall,
            FlowControl::Return => InstructionCategory::Return,
            FlowControl::Interrupt | FlowControl::Exception => InstructionCategory::Interrupt,
            _ => InstructionCategory::Sequential,
        }
    }
}

impl Disassembler for IcedDisassembler {
    fn disassemble_instruction(
        &self,
        address: u64,
        bytes: &[u8],
    ) -> DisassemblerResult<Instruction> {
        let mut decoder = Decoder::with_ip(self.bits, bytes, address, DecoderOptions::NONE);
        let instr = decoder.decode();
        if instr.is_invalid() {
            return Err(match decoder.last_error() {
                DecoderError::NoMoreBytes => DisassemblerError::InsufficientBytes(),
                _ => DisassemblerError::InvalidInstruction(),
            });
        }

        let len = instr.len();
        let mut text = String::new();
        IntelFormatter::new().format(&instr, &mut text);

        Ok(Instruction {
            address,
            bytes: bytes[..len.min(bytes.len())].to_vec(),
            mnemonic: format!("{:?}", instr.mnemonic()).to_ascii_lowercase(),
            operands: Self::iced_operands(&instr),
            length: len as u16,
            category: Self::category(&instr),
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
        "iced-x86"
    }
}
