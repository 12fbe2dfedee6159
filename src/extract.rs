//! Binary artifact assembly.
//!
//! Composes the container parser, symbol map, import table, string scanner
//! and function recoverer into one [`BinaryArtifact`] per input file.

use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::analysis::elf_plt::ImportTable;
use crate::analysis::functions::recover_functions;
use crate::config::{ExtractionConfig, RevgraphConfig};
use crate::core::artifact::{BinaryArtifact, FileKind, ImportReference};
use crate::core::disassembler::{Architecture, Endianness};
use crate::disasm::registry;
use crate::error::Result;
use crate::formats::elf::ElfParser;
use crate::hashing::sha256_digest;
use crate::io;
use crate::span_trace;
use crate::strings::scan_sections;
use crate::symbols::SymbolMap;

/// Extract an artifact from in-memory bytes
pub fn extract_bytes(name: &str, bytes: &[u8], config: &ExtractionConfig) -> Result<BinaryArtifact> {
    let span = span_trace!("extract", binary = name);
    let _guard = span.enter();

    let content_hash = sha256_digest(bytes);
    let parser = ElfParser::parse(bytes)?;
    let header = parser.header();
    let architecture = Architecture::from(header.machine());
    let endianness = Endianness::from(parser.endian());

    let symbols = SymbolMap::from_elf(&parser)?;
    let imports = ImportTable::from_elf(&parser, config.plt_entry_size)?;
    let strings = scan_sections(&parser, &config.string_sections, config.min_string_length);

    let functions = match registry::for_arch_with(architecture, Some(config.decoder)) {
        Ok(decoder) => recover_functions(&parser, &symbols, &imports, &decoder, config),
        Err(e) => {
            debug!(%architecture, error = %e, "no decoder for architecture, skipping function recovery");
            Vec::new()
        }
    };

    let import_refs = imports
        .entries()
        .iter()
        .map(|e| ImportReference::new(e.name.clone(), e.library.clone(), e.address))
        .collect::<Vec<_>>();

    info!(
        binary = name,
        %architecture,
        symbols = symbols.len(),
        functions = functions.len(),
        strings = strings.len(),
        imports = import_refs.len(),
        "extraction complete"
    );

    Ok(BinaryArtifact::new(
        name.to_string(),
        content_hash,
        architecture,
        endianness,
        header.word_size(),
        FileKind::from(header.file_type()),
        header.entry_point(),
        functions,
        strings,
        import_refs,
    ))
}

/// Read, map and extract one file
pub fn load_binary_with(path: &Path, config: &RevgraphConfig) -> Result<BinaryArtifact> {
    let mapped = io::read_file(path, &config.io)?;
    extract_bytes(&file_stem(path), mapped.as_bytes(), &config.extraction)
}

/// Extract one file with default configuration; `None` when it cannot be read or parsed
pub fn load_binary<P: AsRef<Path>>(path: P) -> Option<BinaryArtifact> {
    let path = path.as_ref();
    match load_binary_with(path, &RevgraphConfig::default()) {
        Ok(artifact) => Some(artifact),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to load binary");
            None
        }
    }
}

/// Extract many files in parallel; failures are logged and left out
pub fn load_binaries(paths: &[PathBuf], config: &RevgraphConfig) -> Vec<BinaryArtifact> {
    let artifacts: Vec<_> = paths
        .par_iter()
        .filter_map(|path| match load_binary_with(path, config) {
            Ok(artifact) => Some(artifact),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load binary");
                None
            }
        })
        .collect();
    info!(requested = paths.len(), loaded = artifacts.len(), "batch extraction complete");
    artifacts
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
