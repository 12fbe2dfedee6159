//! ELF PLT import resolution.
//!
//! Pairs `.rela.plt` (or `.rel.plt`) entries with `.plt` stubs by ordinal:
//! relocation `i` owns the stub at `.plt + (i + 1) * stride`, slot 0 being the
//! lazy resolver. With `.plt.sec` (IBT layouts) the same ordinal also owns
//! `.plt.sec + i * stride`, registered as an alias of the primary stub.
//! Undefined function symbols in `.dynsym` that no relocation claimed are
//! added by name with address 0.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::formats::elf::{self, ElfParser};

/// Default distance between consecutive x86 PLT stubs
pub const DEFAULT_PLT_ENTRY_SIZE: u64 = 16;

const STUB_SECTIONS: [&str; 3] = [".plt", ".plt.sec", ".plt.got"];

/// How an import was discovered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportOrigin {
    /// Bound to a stub through the PLT relocation at this ordinal
    PltRelocation { ordinal: usize },
    /// Undefined function in `.dynsym` with no stub; address is 0
    UndefinedSymbol,
}

/// One imported function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportEntry {
    pub name: String,
    pub library: Option<String>,
    /// Canonical stub address, 0 when known by name only
    pub address: u64,
    pub origin: ImportOrigin,
}

/// Imports of one binary with stub-address lookup
#[derive(Debug, Clone, Default)]
pub struct ImportTable {
    entries: Vec<ImportEntry>,
    by_stub: HashMap<u64, usize>,
    by_name: HashMap<String, usize>,
    stub_regions: Vec<(u64, u64)>,
}

impl ImportTable {
    /// Build the import table of an ELF image
    pub fn from_elf(parser: &ElfParser<'_>, plt_entry_size: u64) -> elf::Result<Self> {
        let mut table = Self::default();

        for name in STUB_SECTIONS {
            if let Some(section) = parser.section(name) {
                table.add_stub_region(section.addr(), section.end_addr());
            }
        }

        let dynsym = match parser.dynamic_symbols()? {
            Some(dynsym) => dynsym,
            None => {
                debug!("no .dynsym, import table is empty");
                return Ok(table);
            }
        };

        let versions = match parser.versions() {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "ignoring malformed symbol version sections");
                None
            }
        };
        let library_for = |index: usize| {
            versions
                .as_ref()
                .and_then(|v| v.library_for(index))
                .map(str::to_string)
        };

        let stride = plt_entry_size.max(1);
        let plt = parser.section(".plt");
        let plt_sec = parser.section(".plt.sec");

        match (parser.plt_relocations()?, plt.as_ref()) {
            (Some(relocations), Some(plt)) => {
                for (ordinal, reloc) in relocations.entries().iter().enumerate() {
                    let index = reloc.symbol_index as usize;
                    let Some(name) = dynsym.name_at(index) else {
                        continue;
                    };
                    let stub = (ordinal as u64 + 1)
                        .checked_mul(stride)
                        .and_then(|off| plt.addr().checked_add(off));
                    let Some(stub) = stub.filter(|&s| s < plt.end_addr()) else {
                        debug!(name, ordinal, "PLT stub past end of .plt, dropped");
                        continue;
                    };

                    let slot = table.register(ImportEntry {
                        name: name.to_string(),
                        library: library_for(index),
                        address: stub,
                        origin: ImportOrigin::PltRelocation { ordinal },
                    });

                    if let Some(sec) = plt_sec.as_ref() {
                        let alias = sec.addr().saturating_add(ordinal as u64 * stride);
                        if alias < sec.end_addr() {
                            table.by_stub.entry(alias).or_insert(slot);
                        }
                    }
                }
            }
            (Some(_), None) => debug!("PLT relocations without .plt, no stubs bound"),
            (None, _) => debug!("no PLT relocations"),
        }

        for (index, sym, name) in dynsym.iter() {
            let Some(name) = name else { continue };
            if sym.is_function() && sym.is_undefined() && !table.by_name.contains_key(name) {
                table.register(ImportEntry {
                    name: name.to_string(),
                    library: library_for(index),
                    address: 0,
                    origin: ImportOrigin::UndefinedSymbol,
                });
            }
        }

        Ok(table)
    }

    /// Add an entry; a repeated name keeps the first entry and only gains the stub
    pub(crate) fn register(&mut self, entry: ImportEntry) -> usize {
        if let Some(&slot) = self.by_name.get(&entry.name) {
            if entry.address != 0 {
                self.by_stub.entry(entry.address).or_insert(slot);
            }
            return slot;
        }
        let slot = self.entries.len();
        if entry.address != 0 {
            self.by_stub.insert(entry.address, slot);
        }
        self.by_name.insert(entry.name.clone(), slot);
        self.entries.push(entry);
        slot
    }

    pub(crate) fn add_stub_region(&mut self, start: u64, end: u64) {
        if start < end {
            self.stub_regions.push((start, end));
        }
    }

    /// Import bound to a stub address (primary or `.plt.sec` alias)
    pub fn lookup(&self, address: u64) -> Option<&ImportEntry> {
        if address == 0 {
            return None;
        }
        self.by_stub.get(&address).map(|&i| &self.entries[i])
    }

    pub fn by_name(&self, name: &str) -> Option<&ImportEntry> {
        self.by_name.get(name).map(|&i| &self.entries[i])
    }

    /// Whether an address lies in `.plt`, `.plt.sec` or `.plt.got`
    pub fn in_stub_region(&self, address: u64) -> bool {
        self.stub_regions
            .iter()
            .any(|&(start, end)| start <= address && address < end)
    }

    /// Entries in discovery order: relocation ordinals first, then fallbacks
    pub fn entries(&self) -> &[ImportEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
