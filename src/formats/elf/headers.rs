//! ELF header parsing

use crate::formats::elf::types::*;
use crate::formats::elf::utils::{read_word, EndianRead};

/// Parse ELF identification bytes
pub fn parse_ident(data: &[u8]) -> Result<ElfIdent> {
    if data.len() < 16 {
        return Err(ElfError::Truncated {
            offset: 0,
            needed: 16,
        });
    }

    if &data[0..4] != ELF_MAGIC {
        return Err(ElfError::InvalidMagic);
    }

    Ok(ElfIdent {
        class: ElfClass::from_u8(data[4])?,
        data: ElfData::from_u8(data[5])?,
        version: data[6],
        osabi: data[7],
    })
}

/// Field offsets that differ between the 32- and 64-bit layouts.
struct Layout {
    header_size: usize,
    shentsize: usize,
    entry: usize,
    shoff: usize,
    tail: usize,
}

impl Layout {
    fn for_class(class: ElfClass) -> Self {
        match class {
            ElfClass::Elf32 => Layout {
                header_size: 52,
                shentsize: 40,
                entry: 24,
                shoff: 32,
                tail: 40,
            },
            ElfClass::Elf64 => Layout {
                header_size: 64,
                shentsize: 64,
                entry: 24,
                shoff: 40,
                tail: 52,
            },
        }
    }
}

/// Parse ELF header
pub fn parse_header(data: &[u8]) -> Result<ElfHeader> {
    let ident = parse_ident(data)?;
    let layout = Layout::for_class(ident.class);

    if data.len() < layout.header_size {
        return Err(ElfError::Truncated {
            offset: 0,
            needed: layout.header_size,
        });
    }

    let endian = ident.data;
    let e_type = data.read_u16(16, endian)?;
    let e_machine = data.read_u16(18, endian)?;
    let e_entry = read_word(data, layout.entry, ident.class, endian)?;
    let e_shoff = read_word(data, layout.shoff, ident.class, endian)?;

    // e_ehsize, e_phentsize, e_phnum, e_shentsize, e_shnum, e_shstrndx
    let e_ehsize = data.read_u16(layout.tail, endian)?;
    let e_shentsize = data.read_u16(layout.tail + 6, endian)?;
    let e_shnum = data.read_u16(layout.tail + 8, endian)?;
    let e_shstrndx = data.read_u16(layout.tail + 10, endian)?;

    if e_ehsize as usize != layout.header_size {
        return Err(ElfError::MalformedHeader(format!(
            "Invalid e_ehsize: expected {}, got {}",
            layout.header_size, e_ehsize
        )));
    }

    if e_shnum > 0 && e_shentsize as usize != layout.shentsize {
        return Err(ElfError::MalformedHeader(format!(
            "Invalid e_shentsize: expected {}, got {}",
            layout.shentsize, e_shentsize
        )));
    }

    Ok(ElfHeader {
        ident,
        e_type,
        e_machine,
        e_entry,
        e_shoff,
        e_shentsize,
        e_shnum,
        e_shstrndx,
    })
}
