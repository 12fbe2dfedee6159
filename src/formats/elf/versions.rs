//! GNU symbol versioning (`.gnu.version`, `.gnu.version_r`)
//!
//! Used only to attribute undefined dynamic symbols to the shared object that
//! provides them: `versym[i]` selects a `Vernaux` entry whose parent `Verneed`
//! names the needed file.

use crate::formats::elf::types::*;
use crate::formats::elf::utils::{read_cstring, EndianRead};
use std::collections::HashMap;

const VERSYM_HIDDEN: u16 = 0x8000;
/// Upper bound on chained entries, guards against `vn_next` loops
const MAX_VERNEED_ENTRIES: usize = 4096;

/// Symbol index → needed library file name
pub struct VersionTable<'a> {
    versym: Vec<u16>,
    files: HashMap<u16, &'a str>,
}

impl<'a> VersionTable<'a> {
    /// Parse `.gnu.version` against `.gnu.version_r` (names from `strings`, usually `.dynstr`)
    pub fn parse(
        versym_data: &[u8],
        verneed_data: &[u8],
        verneed_count: u32,
        strings: &'a [u8],
        endian: ElfData,
    ) -> Result<Self> {
        let versym = versym_data
            .chunks_exact(2)
            .map(|c| c.read_u16(0, endian))
            .collect::<Result<Vec<_>>>()?;

        let mut files = HashMap::new();
        let mut offset = 0usize;
        let limit = if verneed_count == 0 {
            MAX_VERNEED_ENTRIES
        } else {
            (verneed_count as usize).min(MAX_VERNEED_ENTRIES)
        };

        for _ in 0..limit {
            let vn_cnt = verneed_data.read_u16(offset + 2, endian)?;
            let vn_file = verneed_data.read_u32(offset + 4, endian)?;
            let vn_aux = verneed_data.read_u32(offset + 8, endian)?;
            let vn_next = verneed_data.read_u32(offset + 12, endian)?;

            if let Ok(file) = read_cstring(strings, vn_file as usize) {
                let mut aux = offset + vn_aux as usize;
                for _ in 0..vn_cnt {
                    let vna_other = verneed_data.read_u16(aux + 6, endian)?;
                    let vna_next = verneed_data.read_u32(aux + 12, endian)?;
                    files.entry(vna_other & !VERSYM_HIDDEN).or_insert(file);
                    if vna_next == 0 {
                        break;
                    }
                    aux += vna_next as usize;
                }
            }

            if vn_next == 0 {
                break;
            }
            offset += vn_next as usize;
        }

        Ok(Self { versym, files })
    }

    /// Library providing the dynamic symbol at `symbol_index`, if versioned
    pub fn library_for(&self, symbol_index: usize) -> Option<&'a str> {
        let index = self.versym.get(symbol_index)? & !VERSYM_HIDDEN;
        // 0 = local, 1 = global base version
        if index < 2 {
            return None;
        }
        self.files.get(&index).copied()
    }
}
