//! Immutable artifact tree produced by extraction.
//!
//! A [`BinaryArtifact`] owns its functions, which own their basic blocks,
//! which own their instructions. Every type is a plain value with private
//! fields and read-only accessors; nothing is mutated after extraction.
//! Scores, summaries and labels are attached downstream in the graph store,
//! never here.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::core::disassembler::{Architecture, Endianness};
use crate::core::instruction::InstructionCategory;
use crate::formats::elf::ElfType;

/// Container kind of a binary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileKind {
    Executable,
    SharedObject,
    Relocatable,
    Core,
    Unknown,
}

impl From<ElfType> for FileKind {
    fn from(t: ElfType) -> Self {
        match t {
            ElfType::Executable => FileKind::Executable,
            ElfType::SharedObject => FileKind::SharedObject,
            ElfType::Relocatable => FileKind::Relocatable,
            ElfType::Core => FileKind::Core,
            ElfType::None => FileKind::Unknown,
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileKind::Executable => write!(f, "executable"),
            FileKind::SharedObject => write!(f, "shared_object"),
            FileKind::Relocatable => write!(f, "relocatable"),
            FileKind::Core => write!(f, "core"),
            FileKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// A printable string and where it lives
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StringReference {
    value: String,
    address: u64,
}

impl StringReference {
    pub fn new(value: impl Into<String>, address: u64) -> Self {
        Self {
            value: value.into(),
            address,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn address(&self) -> u64 {
        self.address
    }
}

/// An imported function
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImportReference {
    name: String,
    library: Option<String>,
    address: u64,
}

impl ImportReference {
    pub fn new(name: impl Into<String>, library: Option<String>, address: u64) -> Self {
        Self {
            name: name.into(),
            library,
            address,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Providing shared object, when symbol versioning names it
    pub fn library(&self) -> Option<&str> {
        self.library.as_deref()
    }

    /// Stub address; 0 when the import is known by name only
    pub fn address(&self) -> u64 {
        self.address
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionArtifact {
    address: u64,
    mnemonic: String,
    opcode: Vec<u8>,
    category: Option<InstructionCategory>,
}

impl InstructionArtifact {
    pub fn new(
        address: u64,
        mnemonic: impl Into<String>,
        opcode: Vec<u8>,
        category: Option<InstructionCategory>,
    ) -> Self {
        Self {
            address,
            mnemonic: mnemonic.into(),
            opcode,
            category,
        }
    }

    pub fn address(&self) -> u64 {
        self.address
    }

    pub fn mnemonic(&self) -> &str {
        &self.mnemonic
    }

    pub fn opcode(&self) -> &[u8] {
        &self.opcode
    }

    pub fn opcode_hex(&self) -> String {
        hex::encode(&self.opcode)
    }

    pub fn category(&self) -> Option<InstructionCategory> {
        self.category
    }

    pub fn end_address(&self) -> u64 {
        self.address.saturating_add(self.opcode.len() as u64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicBlockArtifact {
    address: u64,
    size: u64,
    instructions: Vec<InstructionArtifact>,
    successors: Vec<u64>,
}

impl BasicBlockArtifact {
    pub fn new(
        address: u64,
        size: u64,
        instructions: Vec<InstructionArtifact>,
        successors: Vec<u64>,
    ) -> Self {
        Self {
            address,
            size,
            instructions,
            successors,
        }
    }

    pub fn address(&self) -> u64 {
        self.address
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn instructions(&self) -> &[InstructionArtifact] {
        &self.instructions
    }

    pub fn num_instructions(&self) -> usize {
        self.instructions.len()
    }

    /// Successor block addresses; empty for a terminal block
    pub fn successors(&self) -> &[u64] {
        &self.successors
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionArtifact {
    name: String,
    address: u64,
    size: u64,
    assembly: Option<String>,
    blocks: Vec<BasicBlockArtifact>,
    callees: Vec<u64>,
    strings: Vec<StringReference>,
    imports: Vec<ImportReference>,
}

impl FunctionArtifact {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        address: u64,
        size: u64,
        assembly: Option<String>,
        blocks: Vec<BasicBlockArtifact>,
        callees: Vec<u64>,
        strings: Vec<StringReference>,
        imports: Vec<ImportReference>,
    ) -> Self {
        Self {
            name: name.into(),
            address,
            size,
            assembly,
            blocks,
            callees,
            strings,
            imports,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> u64 {
        self.address
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Instruction listing, when enabled at extraction time
    pub fn assembly(&self) -> Option<&str> {
        self.assembly.as_deref()
    }

    pub fn blocks(&self) -> &[BasicBlockArtifact] {
        &self.blocks
    }

    /// Direct call targets that are not imports, first occurrence order
    pub fn callees(&self) -> &[u64] {
        &self.callees
    }

    pub fn strings(&self) -> &[StringReference] {
        &self.strings
    }

    pub fn imports(&self) -> &[ImportReference] {
        &self.imports
    }

    pub fn instructions(&self) -> impl Iterator<Item = &InstructionArtifact> + '_ {
        self.blocks.iter().flat_map(|b| b.instructions.iter())
    }
}

/// Root of the artifact tree, identified by the SHA-256 of the file bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryArtifact {
    name: String,
    content_hash: String,
    architecture: Architecture,
    endianness: Endianness,
    word_size: u8,
    file_kind: FileKind,
    entry_point: u64,
    functions: Vec<FunctionArtifact>,
    strings: Vec<StringReference>,
    imports: Vec<ImportReference>,
}

impl BinaryArtifact {
    /// Only the assembler builds binaries, so the hash always matches the bytes it read
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        name: String,
        content_hash: String,
        architecture: Architecture,
        endianness: Endianness,
        word_size: u8,
        file_kind: FileKind,
        entry_point: u64,
        functions: Vec<FunctionArtifact>,
        strings: Vec<StringReference>,
        imports: Vec<ImportReference>,
    ) -> Self {
        Self {
            name,
            content_hash,
            architecture,
            endianness,
            word_size,
            file_kind,
            entry_point,
            functions,
            strings,
            imports,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lowercase hex SHA-256 of the file; the binary's identity
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    pub fn architecture(&self) -> Architecture {
        self.architecture
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// 32 or 64
    pub fn word_size(&self) -> u8 {
        self.word_size
    }

    pub fn file_kind(&self) -> FileKind {
        self.file_kind
    }

    pub fn entry_point(&self) -> u64 {
        self.entry_point
    }

    pub fn functions(&self) -> &[FunctionArtifact] {
        &self.functions
    }

    /// Strings found by scanning data sections
    pub fn strings(&self) -> &[StringReference] {
        &self.strings
    }

    /// Every import known for the binary
    pub fn imports(&self) -> &[ImportReference] {
        &self.imports
    }

    pub fn function_at(&self, address: u64) -> Option<&FunctionArtifact> {
        self.functions.iter().find(|f| f.address == address)
    }

    pub fn blocks(&self) -> impl Iterator<Item = &BasicBlockArtifact> + '_ {
        self.functions.iter().flat_map(|f| f.blocks.iter())
    }

    /// Check the structural invariants of the tree; returns one message per violation
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.content_hash.len() != 64
            || !self
                .content_hash
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        {
            problems.push(format!("content hash {:?} is not a SHA-256 hex digest", self.content_hash));
        }

        let mut function_addrs = HashSet::new();
        let mut block_addrs = HashSet::new();
        let mut insn_addrs = HashSet::new();
        for func in &self.functions {
            if !function_addrs.insert(func.address) {
                problems.push(format!("duplicate function address {:#x}", func.address));
            }
            let end = func.address.saturating_add(func.size);
            for block in &func.blocks {
                if !block_addrs.insert(block.address) {
                    problems.push(format!("duplicate block address {:#x}", block.address));
                }
                for insn in &block.instructions {
                    if !insn_addrs.insert(insn.address) {
                        problems.push(format!("duplicate instruction address {:#x}", insn.address));
                    }
                    if insn.address < func.address || insn.end_address() > end {
                        problems.push(format!(
                            "instruction {:#x} lies outside function {} [{:#x}, {:#x})",
                            insn.address, func.name, func.address, end
                        ));
                    }
                }
            }
        }

        for block in self.blocks() {
            for &succ in &block.successors {
                if succ != 0 && !block_addrs.contains(&succ) {
                    problems.push(format!(
                        "block {:#x} has unknown successor {:#x}",
                        block.address, succ
                    ));
                }
            }
        }

        problems
    }
}
