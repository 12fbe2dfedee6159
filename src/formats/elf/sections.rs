//! Section table management

use crate::formats::elf::types::*;
use crate::formats::elf::utils::{checked_slice, read_cstring, read_word, EndianRead};
use std::collections::HashMap;

/// Section table for efficient section lookup
///
/// Every section's file range is validated when the table is built, so the
/// lookups below never hand out a truncated slice.
pub struct SectionTable<'a> {
    headers: Vec<SectionHeader>,
    strings: &'a [u8],
    contents: Vec<&'a [u8]>,
    by_name: HashMap<&'a str, usize>,
}

impl<'a> SectionTable<'a> {
    /// Parse section table from ELF data
    pub fn parse(data: &'a [u8], header: &ElfHeader) -> Result<Self> {
        let sh_offset = header.e_shoff;
        let sh_entsize = header.e_shentsize as u64;
        let sh_num = header.e_shnum as usize;

        if sh_num == 0 || sh_offset == 0 {
            return Ok(Self {
                headers: Vec::new(),
                strings: &[],
                contents: Vec::new(),
                by_name: HashMap::new(),
            });
        }

        let total_size = sh_entsize * sh_num as u64;
        if checked_slice(data, sh_offset, total_size).is_none() {
            return Err(ElfError::Truncated {
                offset: sh_offset as usize,
                needed: total_size as usize,
            });
        }

        let mut headers = Vec::with_capacity(sh_num);
        for i in 0..sh_num {
            let offset = (sh_offset + i as u64 * sh_entsize) as usize;
            headers.push(parse_section_header(
                data,
                offset,
                header.ident.class,
                header.ident.data,
            )?);
        }

        let mut contents = Vec::with_capacity(sh_num);
        for (index, sh) in headers.iter().enumerate() {
            if sh.sh_type == SHT_NOBITS || sh.sh_type == SHT_NULL {
                contents.push(&data[0..0]);
                continue;
            }
            let bytes = checked_slice(data, sh.sh_offset, sh.sh_size).ok_or(
                ElfError::SectionOutOfBounds {
                    index,
                    offset: sh.sh_offset,
                    size: sh.sh_size,
                },
            )?;
            contents.push(bytes);
        }

        let strings = contents
            .get(header.e_shstrndx as usize)
            .copied()
            .unwrap_or(&[]);

        // First section wins on duplicate names
        let mut by_name = HashMap::new();
        for (i, sh) in headers.iter().enumerate() {
            if let Ok(name) = read_cstring(strings, sh.sh_name as usize) {
                if !name.is_empty() {
                    by_name.entry(name).or_insert(i);
                }
            }
        }

        Ok(Self {
            headers,
            strings,
            contents,
            by_name,
        })
    }

    /// Get section by name
    pub fn by_name(&self, name: &str) -> Option<Section<'a>> {
        self.by_name.get(name).and_then(|&idx| self.by_index(idx))
    }

    /// Get section by index
    pub fn by_index(&self, index: usize) -> Option<Section<'a>> {
        let header = self.headers.get(index)?;
        let name = read_cstring(self.strings, header.sh_name as usize).unwrap_or("");
        Some(Section {
            index,
            header: *header,
            name,
            data: self.contents[index],
        })
    }

    /// Find the allocated section containing a virtual address
    pub fn by_addr(&self, addr: u64) -> Option<Section<'a>> {
        self.headers
            .iter()
            .position(|h| {
                (h.sh_flags & SHF_ALLOC) != 0
                    && h.sh_addr <= addr
                    && addr < h.sh_addr.saturating_add(h.sh_size)
            })
            .and_then(|i| self.by_index(i))
    }

    /// First section of the given type
    pub fn by_type(&self, sh_type: u32) -> Option<Section<'a>> {
        self.headers
            .iter()
            .position(|h| h.sh_type == sh_type)
            .and_then(|i| self.by_index(i))
    }

    /// Get all sections
    pub fn sections(&self) -> impl Iterator<Item = Section<'a>> + '_ {
        (0..self.headers.len()).filter_map(move |i| self.by_index(i))
    }

    /// Count sections
    pub fn count(&self) -> usize {
        self.headers.len()
    }
}

/// Parse a single section header
fn parse_section_header(
    data: &[u8],
    offset: usize,
    class: ElfClass,
    endian: ElfData,
) -> Result<SectionHeader> {
    let (flags, addr, off, size, link, info, entsize) = match class {
        ElfClass::Elf32 => (8, 12, 16, 20, 24, 28, 36),
        ElfClass::Elf64 => (8, 16, 24, 32, 40, 44, 56),
    };
    Ok(SectionHeader {
        sh_name: data.read_u32(offset, endian)?,
        sh_type: data.read_u32(offset + 4, endian)?,
        sh_flags: read_word(data, offset + flags, class, endian)?,
        sh_addr: read_word(data, offset + addr, class, endian)?,
        sh_offset: read_word(data, offset + off, class, endian)?,
        sh_size: read_word(data, offset + size, class, endian)?,
        sh_link: data.read_u32(offset + link, endian)?,
        sh_info: data.read_u32(offset + info, endian)?,
        sh_entsize: read_word(data, offset + entsize, class, endian)?,
    })
}
