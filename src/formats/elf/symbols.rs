//! Symbol table parsing

use crate::formats::elf::types::*;
use crate::formats::elf::utils::{read_cstring, read_word, EndianRead};

/// Raw view of a `.symtab` or `.dynsym` section
pub struct SymbolTable<'a> {
    symbols: Vec<Symbol>,
    strings: &'a [u8],
}

impl<'a> SymbolTable<'a> {
    /// Parse symbol table from section data
    ///
    /// Trailing bytes that do not form a whole entry are ignored.
    pub fn parse(
        symbol_data: &[u8],
        string_data: &'a [u8],
        class: ElfClass,
        endian: ElfData,
    ) -> Result<Self> {
        let entry_size = match class {
            ElfClass::Elf32 => 16,
            ElfClass::Elf64 => 24,
        };

        let symbols = symbol_data
            .chunks_exact(entry_size)
            .map(|entry| parse_symbol(entry, class, endian))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            symbols,
            strings: string_data,
        })
    }

    /// Get symbol by index
    pub fn by_index(&self, index: usize) -> Option<&Symbol> {
        self.symbols.get(index)
    }

    /// Get symbol name; `None` for unnamed entries or bad string offsets
    pub fn symbol_name(&self, symbol: &Symbol) -> Option<&'a str> {
        if symbol.st_name == 0 {
            return None;
        }
        read_cstring(self.strings, symbol.st_name as usize)
            .ok()
            .filter(|name| !name.is_empty())
    }

    /// Name of the symbol at `index`
    pub fn name_at(&self, index: usize) -> Option<&'a str> {
        self.by_index(index).and_then(|s| self.symbol_name(s))
    }

    /// Iterate symbols in file order with their table index and name
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Symbol, Option<&'a str>)> + '_ {
        self.symbols
            .iter()
            .enumerate()
            .map(move |(i, s)| (i, s, self.symbol_name(s)))
    }

    /// Count total symbols
    pub fn count(&self) -> usize {
        self.symbols.len()
    }
}

/// Parse a single symbol entry
fn parse_symbol(data: &[u8], class: ElfClass, endian: ElfData) -> Result<Symbol> {
    match class {
        // st_name, st_value, st_size, st_info, st_other, st_shndx
        ElfClass::Elf32 => Ok(Symbol {
            st_name: data.read_u32(0, endian)?,
            st_value: read_word(data, 4, class, endian)?,
            st_size: read_word(data, 8, class, endian)?,
            st_info: data[12],
            st_other: data[13],
            st_shndx: data.read_u16(14, endian)?,
        }),
        // st_name, st_info, st_other, st_shndx, st_value, st_size
        ElfClass::Elf64 => Ok(Symbol {
            st_name: data.read_u32(0, endian)?,
            st_info: data[4],
            st_other: data[5],
            st_shndx: data.read_u16(6, endian)?,
            st_value: data.read_u64(8, endian)?,
            st_size: data.read_u64(16, endian)?,
        }),
    }
}
