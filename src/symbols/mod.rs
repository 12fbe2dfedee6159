//! Merged symbol map built from `.symtab` and `.dynsym`.
//!
//! One record per address. Collisions follow [`Precedence`]: a later symbol
//! only displaces the existing record when it is strictly more specific, where
//! specificity orders by (function-typed, non-zero size). Ties keep the first
//! record seen, so static symbols win over dynamic ones and earlier entries
//! win within a table.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::debug;

use crate::formats::elf::symbols::SymbolTable;
use crate::formats::elf::{self, ElfParser, Symbol};

/// Symbol kinds for different types of program entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolKind {
    /// Function symbol (`STT_FUNC`, `STT_GNU_IFUNC`)
    Function,
    /// Data object symbol
    Object,
    /// Thread-local object
    Tls,
    /// Untyped symbol
    NoType,
    /// Other/unknown symbol type
    Other,
}

impl SymbolKind {
    fn from_elf(st_type: u8) -> Self {
        match st_type {
            elf::STT_FUNC | elf::STT_GNU_IFUNC => SymbolKind::Function,
            elf::STT_OBJECT => SymbolKind::Object,
            elf::STT_TLS => SymbolKind::Tls,
            elf::STT_NOTYPE => SymbolKind::NoType,
            _ => SymbolKind::Other,
        }
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolKind::Function => write!(f, "Function"),
            SymbolKind::Object => write!(f, "Object"),
            SymbolKind::Tls => write!(f, "Tls"),
            SymbolKind::NoType => write!(f, "NoType"),
            SymbolKind::Other => write!(f, "Other"),
        }
    }
}

/// Symbol binding types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolBinding {
    Local,
    Global,
    Weak,
    Other,
}

impl SymbolBinding {
    fn from_elf(st_bind: u8) -> Self {
        match st_bind {
            elf::STB_LOCAL => SymbolBinding::Local,
            elf::STB_GLOBAL => SymbolBinding::Global,
            elf::STB_WEAK => SymbolBinding::Weak,
            _ => SymbolBinding::Other,
        }
    }
}

/// Symbol visibility levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolVisibility {
    Default,
    Internal,
    Hidden,
    Protected,
}

impl SymbolVisibility {
    fn from_elf(st_other: u8) -> Self {
        match st_other & 0x3 {
            elf::STV_INTERNAL => SymbolVisibility::Internal,
            elf::STV_HIDDEN => SymbolVisibility::Hidden,
            elf::STV_PROTECTED => SymbolVisibility::Protected,
            _ => SymbolVisibility::Default,
        }
    }
}

/// Table a record was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolSource {
    /// `.symtab`
    Static,
    /// `.dynsym`
    Dynamic,
}

/// A named symbol at a non-zero address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolRecord {
    pub name: String,
    pub address: u64,
    pub size: u64,
    pub kind: SymbolKind,
    pub binding: SymbolBinding,
    pub visibility: SymbolVisibility,
    pub section_index: u16,
    pub source: SymbolSource,
}

impl SymbolRecord {
    pub fn is_function(&self) -> bool {
        self.kind == SymbolKind::Function
    }

    fn specificity(&self) -> (bool, bool) {
        (self.is_function(), self.size > 0)
    }
}

/// Outcome of inserting a record at an address that may already be taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precedence {
    /// The existing record is at least as specific
    KeepExisting,
    /// The candidate was strictly more specific and replaced the existing record
    Replace,
}

impl Precedence {
    pub fn decide(existing: &SymbolRecord, candidate: &SymbolRecord) -> Self {
        if candidate.specificity() > existing.specificity() {
            Precedence::Replace
        } else {
            Precedence::KeepExisting
        }
    }
}

/// Address-keyed symbol map
#[derive(Debug, Clone, Default)]
pub struct SymbolMap {
    by_addr: BTreeMap<u64, SymbolRecord>,
    by_name: HashMap<String, u64>,
}

impl SymbolMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `.symtab` then `.dynsym`
    pub fn from_elf(parser: &ElfParser<'_>) -> elf::Result<Self> {
        let mut map = Self::new();
        match parser.symbols()? {
            Some(table) => map.merge_table(&table, SymbolSource::Static),
            None => debug!("no .symtab present"),
        }
        match parser.dynamic_symbols()? {
            Some(table) => map.merge_table(&table, SymbolSource::Dynamic),
            None => debug!("no .dynsym present"),
        }
        Ok(map)
    }

    fn merge_table(&mut self, table: &SymbolTable<'_>, source: SymbolSource) {
        for (_, sym, name) in table.iter() {
            if let Some(record) = Self::record_for(sym, name, source) {
                self.insert(record);
            }
        }
    }

    fn record_for(sym: &Symbol, name: Option<&str>, source: SymbolSource) -> Option<SymbolRecord> {
        let name = name?;
        if sym.st_value == 0 || matches!(sym.st_type(), elf::STT_SECTION | elf::STT_FILE) {
            return None;
        }
        Some(SymbolRecord {
            name: name.to_string(),
            address: sym.st_value,
            size: sym.st_size,
            kind: SymbolKind::from_elf(sym.st_type()),
            binding: SymbolBinding::from_elf(sym.st_bind()),
            visibility: SymbolVisibility::from_elf(sym.st_other),
            section_index: sym.st_shndx,
            source,
        })
    }

    /// Insert a record, applying the collision rule; `None` when the address was free
    pub fn insert(&mut self, record: SymbolRecord) -> Option<Precedence> {
        self.by_name
            .entry(record.name.clone())
            .or_insert(record.address);

        match self.by_addr.get(&record.address) {
            None => {
                self.by_addr.insert(record.address, record);
                None
            }
            Some(existing) => {
                let decision = Precedence::decide(existing, &record);
                if decision == Precedence::Replace {
                    self.by_addr.insert(record.address, record);
                }
                Some(decision)
            }
        }
    }

    /// Record at an address
    pub fn get(&self, address: u64) -> Option<&SymbolRecord> {
        self.by_addr.get(&address)
    }

    /// Name at an address
    pub fn name_at(&self, address: u64) -> Option<&str> {
        self.get(address).map(|r| r.name.as_str())
    }

    /// Address of the first symbol seen with this name
    pub fn address_of(&self, name: &str) -> Option<u64> {
        self.by_name.get(name).copied()
    }

    /// Function records in address order
    pub fn functions(&self) -> impl Iterator<Item = &SymbolRecord> + '_ {
        self.by_addr.values().filter(|r| r.is_function())
    }

    /// All records in address order
    pub fn iter(&self) -> impl Iterator<Item = &SymbolRecord> + '_ {
        self.by_addr.values()
    }

    pub fn len(&self) -> usize {
        self.by_addr.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_addr.is_empty()
    }
}
