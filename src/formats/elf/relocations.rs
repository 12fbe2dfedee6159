//! Relocation processing

use crate::formats::elf::types::*;
use crate::formats::elf::utils::{read_word, EndianRead};

/// Relocation records of one `SHT_REL`/`SHT_RELA` section, in file order
pub struct RelocationTable {
    relocations: Vec<Relocation>,
    is_rela: bool,
}

impl RelocationTable {
    /// Parse relocations from section data
    pub fn parse(rel_data: &[u8], section_type: u32, class: ElfClass, endian: ElfData) -> Result<Self> {
        let is_rela = section_type == SHT_RELA;
        let entry_size = match (class, is_rela) {
            (ElfClass::Elf32, false) => 8,  // Elf32_Rel
            (ElfClass::Elf32, true) => 12,  // Elf32_Rela
            (ElfClass::Elf64, false) => 16, // Elf64_Rel
            (ElfClass::Elf64, true) => 24,  // Elf64_Rela
        };

        let relocations = rel_data
            .chunks_exact(entry_size)
            .map(|entry| parse_relocation(entry, class, endian, is_rela))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            relocations,
            is_rela,
        })
    }

    /// Relocations in file order; the position is the PLT ordinal
    pub fn entries(&self) -> &[Relocation] {
        &self.relocations
    }

    /// Count relocations
    pub fn count(&self) -> usize {
        self.relocations.len()
    }

    /// Check if using RELA format
    pub fn is_rela(&self) -> bool {
        self.is_rela
    }
}

/// Split `r_info` into (symbol index, relocation type) for the given class
pub fn split_info(r_info: u64, class: ElfClass) -> (u32, u32) {
    match class {
        ElfClass::Elf32 => ((r_info >> 8) as u32, (r_info & 0xff) as u32),
        ElfClass::Elf64 => ((r_info >> 32) as u32, (r_info & 0xffff_ffff) as u32),
    }
}

/// Parse a single relocation entry
fn parse_relocation(
    data: &[u8],
    class: ElfClass,
    endian: ElfData,
    is_rela: bool,
) -> Result<Relocation> {
    let word = match class {
        ElfClass::Elf32 => 4,
        ElfClass::Elf64 => 8,
    };
    let r_offset = read_word(data, 0, class, endian)?;
    let r_info = read_word(data, word, class, endian)?;
    let r_addend = match (is_rela, class) {
        (false, _) => 0,
        (true, ElfClass::Elf32) => data.read_i32(8, endian)? as i64,
        (true, ElfClass::Elf64) => data.read_i64(16, endian)?,
    };
    let (symbol_index, reloc_type) = split_info(r_info, class);

    Ok(Relocation {
        r_offset,
        r_addend,
        symbol_index,
        reloc_type,
    })
}
