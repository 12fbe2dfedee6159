//! Symbol-driven function recovery.
//!
//! Every sized function symbol inside `.text` is decoded linearly over its
//! declared extent. Direct calls are split into import references (targets in
//! the PLT) and raw callee addresses; RIP-relative `lea` into `.rodata` yields
//! string references. Each function becomes a single basic block.

use std::collections::HashSet;
use tracing::{debug, info};

use crate::analysis::elf_plt::ImportTable;
use crate::config::ExtractionConfig;
use crate::core::artifact::{
    BasicBlockArtifact, FunctionArtifact, ImportReference, InstructionArtifact, StringReference,
};
use crate::core::disassembler::Disassembler;
use crate::core::instruction::{Instruction, InstructionCategory};
use crate::formats::elf::ElfParser;
use crate::symbols::{SymbolMap, SymbolRecord};

/// A loaded byte range at a virtual address
#[derive(Debug, Clone, Copy)]
pub struct Region<'a> {
    pub address: u64,
    pub data: &'a [u8],
}

impl<'a> Region<'a> {
    pub fn new(address: u64, data: &'a [u8]) -> Self {
        Self { address, data }
    }

    pub fn end(&self) -> u64 {
        self.address.saturating_add(self.data.len() as u64)
    }

    pub fn contains(&self, address: u64) -> bool {
        self.address <= address && address < self.end()
    }

    /// Bytes from `address` up to `len`, clipped to the region end
    pub fn slice_from(&self, address: u64, len: u64) -> Option<&'a [u8]> {
        if !self.contains(address) {
            return None;
        }
        let start = (address - self.address) as usize;
        let end = start.saturating_add(usize::try_from(len).unwrap_or(usize::MAX)).min(self.data.len());
        self.data.get(start..end)
    }
}

/// Where a direct call lands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallTarget {
    Import(ImportReference),
    Local(u64),
}

/// Recovers functions from one binary's code
pub struct FunctionRecoverer<'a> {
    symbols: &'a SymbolMap,
    imports: &'a ImportTable,
    decoder: &'a dyn Disassembler,
    config: &'a ExtractionConfig,
    rodata: Option<Region<'a>>,
}

impl<'a> FunctionRecoverer<'a> {
    pub fn new(
        symbols: &'a SymbolMap,
        imports: &'a ImportTable,
        decoder: &'a dyn Disassembler,
        config: &'a ExtractionConfig,
    ) -> Self {
        Self {
            symbols,
            imports,
            decoder,
            config,
            rodata: None,
        }
    }

    /// Region consulted when resolving `lea` string references
    pub fn with_rodata(mut self, rodata: Option<Region<'a>>) -> Self {
        self.rodata = rodata;
        self
    }

    /// Recover every eligible function symbol inside `text`, in address order
    pub fn recover(&self, text: Region<'_>) -> Vec<FunctionArtifact> {
        let mut out = Vec::new();
        for record in self.symbols.functions() {
            if record.size == 0 || !text.contains(record.address) {
                continue;
            }
            if self.config.is_skipped(&record.name) {
                debug!(name = %record.name, "skipping startup function");
                continue;
            }
            let Some(body) = text.slice_from(record.address, record.size) else {
                continue;
            };
            out.push(self.recover_function(record, body));
        }
        out
    }

    fn recover_function(&self, record: &SymbolRecord, body: &[u8]) -> FunctionArtifact {
        let decoded = self.decoder.disassemble_range(
            record.address,
            body,
            self.config.max_instructions_per_function,
        );
        if decoded.len() == self.config.max_instructions_per_function {
            debug!(name = %record.name, "instruction budget reached");
        }

        let mut callees = Vec::new();
        let mut seen_callees = HashSet::new();
        let mut imports: Vec<ImportReference> = Vec::new();
        let mut strings = Vec::new();
        let mut seen_strings = HashSet::new();

        for insn in &decoded {
            if insn.category == InstructionCategory::Call {
                if let Some(target) = insn.direct_target() {
                    match self.resolve_call(target) {
                        CallTarget::Import(import) => {
                            if !imports.iter().any(|i| i.name() == import.name()) {
                                imports.push(import);
                            }
                        }
                        CallTarget::Local(addr) => {
                            if seen_callees.insert(addr) {
                                callees.push(addr);
                            }
                        }
                    }
                }
            }
            if let Some(string) = self.lea_string(insn) {
                if seen_strings.insert(string.address()) {
                    strings.push(string);
                }
            }
        }

        let assembly = self.config.emit_assembly.then(|| {
            decoded
                .iter()
                .map(Instruction::to_string)
                .collect::<Vec<_>>()
                .join("\n")
        });

        let instructions = decoded
            .into_iter()
            .map(|insn| InstructionArtifact::new(insn.address, insn.mnemonic, insn.bytes, Some(insn.category)))
            .collect();
        let block = BasicBlockArtifact::new(record.address, body.len() as u64, instructions, Vec::new());

        FunctionArtifact::new(
            record.name.clone(),
            record.address,
            record.size,
            assembly,
            vec![block],
            callees,
            strings,
            imports,
        )
    }

    /// Classify a direct call target.
    ///
    /// Stub addresses bound by relocation win; otherwise a symbol sitting in a
    /// stub section (`printf@plt`, `exit@GLIBC_2.2.5`) names the import.
    pub fn resolve_call(&self, target: u64) -> CallTarget {
        if let Some(entry) = self.imports.lookup(target) {
            return CallTarget::Import(ImportReference::new(
                entry.name.clone(),
                entry.library.clone(),
                entry.address,
            ));
        }
        if self.imports.in_stub_region(target) {
            if let Some(name) = self.symbols.name_at(target) {
                let clean = strip_symbol_suffix(name);
                let (library, address) = match self.imports.by_name(clean) {
                    Some(entry) if entry.address != 0 => (entry.library.clone(), entry.address),
                    Some(entry) => (entry.library.clone(), target),
                    None => (None, target),
                };
                return CallTarget::Import(ImportReference::new(clean, library, address));
            }
        }
        CallTarget::Local(target)
    }

    fn lea_string(&self, insn: &Instruction) -> Option<StringReference> {
        if insn.mnemonic != "lea" {
            return None;
        }
        let target = insn.ip_relative_target()?;
        let rodata = self.rodata?;
        let bytes = rodata.slice_from(target, self.config.max_ref_length as u64)?;
        let value = ascii_until_nul(bytes)?;
        (value.len() >= self.config.min_ref_length).then(|| StringReference::new(value, target))
    }
}

/// Decode up to the first NUL; None when any byte is not ASCII
pub fn ascii_until_nul(bytes: &[u8]) -> Option<String> {
    let end = memchr::memchr(0, bytes).unwrap_or(bytes.len());
    let raw = &bytes[..end];
    raw.is_ascii()
        .then(|| String::from_utf8_lossy(raw).into_owned())
}

/// `printf@plt` -> `printf`, `exit@@GLIBC_2.2.5` -> `exit`
pub fn strip_symbol_suffix(name: &str) -> &str {
    name.split('@').next().unwrap_or(name)
}

/// Recover functions from an ELF image; no `.text` yields no functions
pub fn recover_functions(
    parser: &ElfParser<'_>,
    symbols: &SymbolMap,
    imports: &ImportTable,
    decoder: &dyn Disassembler,
    config: &ExtractionConfig,
) -> Vec<FunctionArtifact> {
    let Some(text) = parser.section(".text") else {
        debug!("no .text section, no functions recovered");
        return Vec::new();
    };
    let rodata = parser
        .section(".rodata")
        .map(|s| Region::new(s.addr(), s.data));

    let functions = FunctionRecoverer::new(symbols, imports, decoder, config)
        .with_rodata(rodata)
        .recover(Region::new(text.addr(), text.data));

    info!(
        functions = functions.len(),
        decoder = decoder.name(),
        "function recovery complete"
    );
    functions
}
