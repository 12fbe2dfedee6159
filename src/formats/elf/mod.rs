//! ELF (Executable and Linkable Format) parser
//!
//! A zero-copy ELF parser covering what extraction needs: the header, the
//! section table, symbol tables, PLT relocations and GNU version
//! requirements. Header and section-table problems are reported
//! when the parser is built; everything optional is exposed as `Option`.

pub mod headers;
pub mod relocations;
pub mod sections;
pub mod symbols;
pub mod types;
pub mod utils;
pub mod versions;

use headers::parse_header;
use relocations::RelocationTable;
use sections::SectionTable;
use symbols::SymbolTable;
pub use types::*;
use versions::VersionTable;

/// Main ELF parser
pub struct ElfParser<'data> {
    data: &'data [u8],
    header: ElfHeader,
    sections: SectionTable<'data>,
}

impl<'data> ElfParser<'data> {
    /// Parse header and section table from raw data
    pub fn parse(data: &'data [u8]) -> Result<Self> {
        let header = parse_header(data)?;
        let sections = SectionTable::parse(data, &header)?;

        Ok(Self {
            data,
            header,
            sections,
        })
    }

    /// Get ELF header
    pub fn header(&self) -> &ElfHeader {
        &self.header
    }

    /// Get raw data
    pub fn data(&self) -> &'data [u8] {
        self.data
    }

    pub fn class(&self) -> ElfClass {
        self.header.ident.class
    }

    pub fn endian(&self) -> ElfData {
        self.header.ident.data
    }

    /// Get sections
    pub fn sections(&self) -> &SectionTable<'data> {
        &self.sections
    }

    /// Section lookup by name
    pub fn section(&self, name: &str) -> Option<Section<'data>> {
        self.sections.by_name(name)
    }

    /// Get symbol table (`.symtab`)
    pub fn symbols(&self) -> Result<Option<SymbolTable<'data>>> {
        self.parse_symbol_table(".symtab", SHT_SYMTAB)
    }

    /// Get dynamic symbol table (`.dynsym`)
    pub fn dynamic_symbols(&self) -> Result<Option<SymbolTable<'data>>> {
        self.parse_symbol_table(".dynsym", SHT_DYNSYM)
    }

    /// Get PLT relocations (`.rela.plt`, else `.rel.plt`)
    pub fn plt_relocations(&self) -> Result<Option<RelocationTable>> {
        let rel_section = match self.section(".rela.plt").or_else(|| self.section(".rel.plt")) {
            Some(s) => s,
            None => return Ok(None),
        };

        RelocationTable::parse(
            rel_section.data,
            rel_section.header.sh_type,
            self.class(),
            self.endian(),
        )
        .map(Some)
    }

    /// Get symbol version requirements; `None` unless both version sections exist
    pub fn versions(&self) -> Result<Option<VersionTable<'data>>> {
        let versym = match self.sections.by_type(SHT_GNU_VERSYM) {
            Some(s) => s,
            None => return Ok(None),
        };
        let verneed = match self.sections.by_type(SHT_GNU_VERNEED) {
            Some(s) => s,
            None => return Ok(None),
        };
        let strings = self
            .sections
            .by_index(verneed.header.sh_link as usize)
            .map(|s| s.data)
            .unwrap_or(&[]);

        VersionTable::parse(
            versym.data,
            verneed.data,
            verneed.header.sh_info,
            strings,
            self.endian(),
        )
        .map(Some)
    }

    /// Parse a symbol table by name, falling back to the first section of its type
    fn parse_symbol_table(&self, name: &str, sh_type: u32) -> Result<Option<SymbolTable<'data>>> {
        let symtab_section = match self
            .section(name)
            .or_else(|| self.sections.by_type(sh_type))
        {
            Some(s) => s,
            None => return Ok(None),
        };

        let strtab_section = match self.sections.by_index(symtab_section.header.sh_link as usize) {
            Some(s) => s,
            None => return Ok(None),
        };

        SymbolTable::parse(
            symtab_section.data,
            strtab_section.data,
            self.class(),
            self.endian(),
        )
        .map(Some)
    }
}
