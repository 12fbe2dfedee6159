use serde::{Deserialize, Serialize};

use crate::core::disassembler::{
    Architecture, Disassembler, DisassemblerError, DisassemblerResult,
};
use crate::core::instruction::Instruction;

pub enum Backend {
    Iced(super::iced::IcedDisassembler),
    Cap(super::capstone::CapstoneDisassembler),
}

impl Disassembler for Backend {
    fn disassemble_instruction(
        &self,
        address: u64,
        bytes: &[u8],
    ) -> DisassemblerResult<Instruction> {
        match self {
            Backend::Iced(d) => d.disassemble_instruction(address, bytes),
            Backend::Cap(d) => d.disassemble_instruction(address, bytes),
        }
    }

    fn max_instruction_length(&self) -> usize {
        match self {
            Backend::Iced(d) => d.max_instruction_length(),
            Backend::Cap(d) => d.max_instruction_length(),
        }
    }

    fn architecture(&self) -> Architecture {
        match self {
            Backend::Iced(d) => d.architecture(),
            Backend::Cap(d) => d.architecture(),
        }
    }

    fn name(&self) -> &str {
        match self {
            Backend::Iced(d) => d.name(),
            Backend::Cap(d) => d.name(),
        }
    }
}

/// Preferred backend kind for explicit selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Iced,
    Capstone,
}

/// Select the default backend (iced-x86) for the given architecture.
pub fn for_arch(arch: Architecture) -> Option<Backend> {
    super::iced::IcedDisassembler::new(arch).map(Backend::Iced)
}

/// Explicit backend selector. Returns an error if the backend cannot support the arch.
pub fn for_arch_with(
    arch: Architecture,
    prefer: Option<BackendKind>,
) -> Result<Backend, DisassemblerError> {
    match prefer {
        Some(BackendKind::Capstone) => super::capstone::CapstoneDisassembler::new(arch)
            .map(Backend::Cap)
            .ok_or(DisassemblerError::UnsupportedArchitecture()),
        Some(BackendKind::Iced) | None => {
            for_arch(arch).ok_or(DisassemblerError::UnsupportedArchitecture())
        }
    }
}
