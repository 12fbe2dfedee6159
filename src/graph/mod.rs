//! Graph store seams.
//!
//! Extraction hands finished artifacts to an [`ArtifactSink`]; ranking reads
//! the control-flow graph back through a [`GraphReader`] and stores scores
//! through a [`GraphWriter`]. Binaries are identified by content hash.
//! [`MemoryGraph`] is the in-process implementation of all three.

pub mod memory;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::core::artifact::BinaryArtifact;
use crate::error::Result;

pub use memory::MemoryGraph;

/// Blocks owned by one function, as stored in the graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionBlocks {
    pub name: String,
    pub address: u64,
    pub blocks: Vec<u64>,
}

/// Read side of the control-flow graph of one binary
pub trait GraphReader {
    /// Addresses of every basic block of the binary
    fn block_addresses(&self, binary_id: &str) -> Result<Vec<u64>>;

    /// Directed `(source, target)` flow edges between blocks
    fn flow_edges(&self, binary_id: &str) -> Result<Vec<(u64, u64)>>;

    /// Function to block containment
    fn function_blocks(&self, binary_id: &str) -> Result<Vec<FunctionBlocks>>;
}

/// Write side used for score write-back
pub trait GraphWriter {
    /// Set the score of each `(block address, score)` pair for the binary
    fn upsert_block_scores(&mut self, binary_id: &str, scores: &[(u64, f64)]) -> Result<()>;
}

/// Destination for extracted artifacts
pub trait ArtifactSink {
    fn ingest(&mut self, artifact: &BinaryArtifact) -> Result<IngestStats>;
}

/// Row counts of one ingest
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStats {
    pub functions: usize,
    pub calls: usize,
    pub basic_blocks: usize,
    pub flows: usize,
    pub instructions: usize,
    pub strings: usize,
    pub imports: usize,
}

impl IngestStats {
    /// Counts as a loader writes them.
    ///
    /// Strings and imports are the per-function references plus the
    /// binary-level records no function already references, keyed by
    /// (value, address) and (name, address).
    pub fn for_artifact(artifact: &BinaryArtifact) -> Self {
        let mut stats = Self::default();
        let mut seen_strings = HashSet::new();
        let mut seen_imports = HashSet::new();

        for func in artifact.functions() {
            stats.functions += 1;
            stats.calls += func.callees().len();
            for block in func.blocks() {
                stats.basic_blocks += 1;
                stats.flows += block.successors().len();
                stats.instructions += block.num_instructions();
            }
            for s in func.strings() {
                stats.strings += 1;
                seen_strings.insert((s.value(), s.address()));
            }
            for i in func.imports() {
                stats.imports += 1;
                seen_imports.insert((i.name(), i.address()));
            }
        }

        stats.strings += artifact
            .strings()
            .iter()
            .filter(|s| !seen_strings.contains(&(s.value(), s.address())))
            .count();
        stats.imports += artifact
            .imports()
            .iter()
            .filter(|i| !seen_imports.contains(&(i.name(), i.address())))
            .count();
        stats
    }
}
