//! revgraph: ELF artifact extraction and Basic-Block-Rank scoring.
//!
//! [`extract::load_binary`] turns an ELF file into an immutable
//! [`BinaryArtifact`] tree (functions, blocks, instructions, string and
//! import references). The tree is handed to a graph store through
//! [`graph::ArtifactSink`]; [`bbr`] ranks the stored blocks and writes the
//! scores back.

/// Analysis passes: imports and function recovery
pub mod analysis;
/// Basic-Block-Rank
pub mod bbr;
pub mod config;
/// Core data types module
pub mod core;
/// Decoder backends
pub mod disasm;
pub mod error;
pub mod extract;
/// Container parsing
pub mod formats;
pub mod graph;
pub mod hashing;
pub mod io;
pub mod logging;
pub mod strings;
pub mod symbols;

pub use crate::config::RevgraphConfig;
pub use crate::core::artifact::{
    BasicBlockArtifact, BinaryArtifact, FileKind, FunctionArtifact, ImportReference,
    InstructionArtifact, StringReference,
};
pub use crate::error::{Result, RevgraphError};
pub use crate::extract::{extract_bytes, load_binaries, load_binary, load_binary_with};
