//! In-process graph store.

use std::collections::{BTreeSet, HashMap};
use tracing::info;

use super::{ArtifactSink, FunctionBlocks, GraphReader, GraphWriter, IngestStats};
use crate::core::artifact::BinaryArtifact;
use crate::error::{Result, RevgraphError};

#[derive(Debug, Clone, Default)]
struct StoredBinary {
    name: String,
    blocks: BTreeSet<u64>,
    edges: Vec<(u64, u64)>,
    functions: Vec<FunctionBlocks>,
    scores: HashMap<u64, f64>,
}

/// Graph store held in memory, keyed by content hash
#[derive(Debug, Clone, Default)]
pub struct MemoryGraph {
    binaries: HashMap<String, StoredBinary>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a bare block graph without an artifact
    pub fn insert_graph(&mut self, binary_id: &str, blocks: &[u64], edges: &[(u64, u64)]) {
        let stored = self.binaries.entry(binary_id.to_string()).or_default();
        stored.blocks.extend(blocks.iter().copied());
        stored.edges.extend(edges.iter().copied());
    }

    /// Content hashes of every stored binary, sorted
    pub fn binary_ids(&self) -> Vec<&str> {
        let mut ids: Vec<_> = self.binaries.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn binary_name(&self, binary_id: &str) -> Option<&str> {
        self.binaries.get(binary_id).map(|b| b.name.as_str())
    }

    pub fn score(&self, binary_id: &str, address: u64) -> Option<f64> {
        self.binaries.get(binary_id)?.scores.get(&address).copied()
    }

    pub fn scores(&self, binary_id: &str) -> Option<&HashMap<u64, f64>> {
        self.binaries.get(binary_id).map(|b| &b.scores)
    }
}

impl ArtifactSink for MemoryGraph {
    /// Re-ingesting a hash replaces the stored graph and drops its scores
    fn ingest(&mut self, artifact: &BinaryArtifact) -> Result<IngestStats> {
        let mut stored = StoredBinary {
            name: artifact.name().to_string(),
            ..StoredBinary::default()
        };
        for func in artifact.functions() {
            let mut blocks = Vec::with_capacity(func.blocks().len());
            for block in func.blocks() {
                stored.blocks.insert(block.address());
                blocks.push(block.address());
                stored
                    .edges
                    .extend(block.successors().iter().map(|&succ| (block.address(), succ)));
            }
            stored.functions.push(FunctionBlocks {
                name: func.name().to_string(),
                address: func.address(),
                blocks,
            });
        }

        let stats = IngestStats::for_artifact(artifact);
        self.binaries.insert(artifact.content_hash().to_string(), stored);
        info!(
            binary = artifact.name(),
            hash = artifact.content_hash().get(..12).unwrap_or_default(),
            functions = stats.functions,
            basic_blocks = stats.basic_blocks,
            "binary ingested"
        );
        Ok(stats)
    }
}

impl GraphReader for MemoryGraph {
    fn block_addresses(&self, binary_id: &str) -> Result<Vec<u64>> {
        Ok(self
            .binaries
            .get(binary_id)
            .map(|b| b.blocks.iter().copied().collect())
            .unwrap_or_default())
    }

    fn flow_edges(&self, binary_id: &str) -> Result<Vec<(u64, u64)>> {
        Ok(self
            .binaries
            .get(binary_id)
            .map(|b| b.edges.clone())
            .unwrap_or_default())
    }

    fn function_blocks(&self, binary_id: &str) -> Result<Vec<FunctionBlocks>> {
        Ok(self
            .binaries
            .get(binary_id)
            .map(|b| b.functions.clone())
            .unwrap_or_default())
    }
}

impl GraphWriter for MemoryGraph {
    /// Scores for addresses that are not stored blocks are ignored
    fn upsert_block_scores(&mut self, binary_id: &str, scores: &[(u64, f64)]) -> Result<()> {
        let stored = self
            .binaries
            .get_mut(binary_id)
            .ok_or_else(|| RevgraphError::Graph(format!("unknown binary {}", binary_id)))?;
        for &(address, score) in scores {
            if stored.blocks.contains(&address) {
                stored.scores.insert(address, score);
            }
        }
        Ok(())
    }
}
