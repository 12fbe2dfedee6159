//! Basic-Block-Rank: PageRank over a binary's control-flow graph.
//!
//! The transition matrix is dense and column-stochastic; a block with no
//! outgoing flow spreads its rank uniformly. Power iteration runs a fixed
//! number of rounds and the result is normalized to sum to one. Graphs above
//! the configured node ceiling are rejected before the `n * n` matrix is
//! allocated.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

use crate::config::BbrConfig;
use crate::error::{Result, RevgraphError};
use crate::graph::{GraphReader, GraphWriter};

/// Block address to score
pub type BlockScores = HashMap<u64, f64>;

/// Rank `nodes` under `edges`.
///
/// Duplicate edges count once and edges touching unknown nodes are ignored.
pub fn rank_blocks(
    nodes: &[u64],
    edges: &[(u64, u64)],
    iterations: usize,
    damping: f64,
    max_nodes: usize,
) -> Result<BlockScores> {
    let mut order: Vec<u64> = nodes.to_vec();
    order.sort_unstable();
    order.dedup();
    let n = order.len();
    if n == 0 {
        return Ok(BlockScores::new());
    }
    if n > max_nodes {
        return Err(RevgraphError::ResourceExhausted {
            resource: "bbr nodes".to_string(),
            used: n,
            limit: max_nodes,
        });
    }

    let index: HashMap<u64, usize> = order.iter().enumerate().map(|(i, &a)| (a, i)).collect();
    let mut distinct = HashSet::new();
    let mut out_degree = vec![0usize; n];
    // Row-major: matrix[tgt * n + src]
    let mut matrix = vec![0.0f64; n * n];

    for (src, tgt) in edges {
        let (Some(&s), Some(&t)) = (index.get(src), index.get(tgt)) else {
            continue;
        };
        if distinct.insert((s, t)) {
            matrix[t * n + s] = 1.0;
            out_degree[s] += 1;
        }
    }

    let uniform = 1.0 / n as f64;
    for (col, &degree) in out_degree.iter().enumerate() {
        if degree == 0 {
            for row in 0..n {
                matrix[row * n + col] = uniform;
            }
        } else {
            let weight = 1.0 / degree as f64;
            for row in 0..n {
                matrix[row * n + col] *= weight;
            }
        }
    }

    let teleport = (1.0 - damping) * uniform;
    let mut rank = vec![uniform; n];
    for _ in 0..iterations {
        rank = matrix
            .par_chunks(n)
            .map(|row| {
                let flow: f64 = row.iter().zip(&rank).map(|(m, r)| m * r).sum();
                damping * flow + teleport
            })
            .collect();
    }

    let total: f64 = rank.iter().sum();
    if total > 0.0 {
        rank.iter_mut().for_each(|r| *r /= total);
    }

    Ok(order.into_iter().zip(rank).collect())
}

/// Rank one binary's blocks as stored in the graph
pub fn compute_bbr<R: GraphReader + ?Sized>(
    reader: &R,
    binary_id: &str,
    iterations: usize,
    damping: f64,
) -> Result<BlockScores> {
    compute_bbr_with(
        reader,
        binary_id,
        &BbrConfig {
            iterations,
            damping,
            ..BbrConfig::default()
        },
    )
}

/// [`compute_bbr`] with every knob taken from configuration
pub fn compute_bbr_with<R: GraphReader + ?Sized>(
    reader: &R,
    binary_id: &str,
    config: &BbrConfig,
) -> Result<BlockScores> {
    let nodes = reader.block_addresses(binary_id)?;
    if nodes.is_empty() {
        warn!(binary_id, "no basic blocks to rank");
        return Ok(BlockScores::new());
    }
    let edges = reader.flow_edges(binary_id)?;
    let scores = rank_blocks(&nodes, &edges, config.iterations, config.damping, config.max_nodes)?;
    info!(
        binary_id,
        blocks = scores.len(),
        edges = edges.len(),
        iterations = config.iterations,
        "bbr computed"
    );
    Ok(scores)
}

/// Write scores back in batches of `batch_size`, in address order; returns the number written
pub fn write_bbr_scores<W: GraphWriter + ?Sized>(
    writer: &mut W,
    binary_id: &str,
    scores: &BlockScores,
    batch_size: usize,
) -> Result<usize> {
    let mut rows: Vec<(u64, f64)> = scores.iter().map(|(&a, &s)| (a, s)).collect();
    rows.sort_unstable_by_key(|&(address, _)| address);

    for (batch, chunk) in rows.chunks(batch_size.max(1)).enumerate() {
        debug!(binary_id, batch, rows = chunk.len(), "writing bbr batch");
        writer.upsert_block_scores(binary_id, chunk)?;
    }
    info!(binary_id, count = rows.len(), "bbr scores written");
    Ok(rows.len())
}

/// Highest-scoring blocks first; ties go to the lower address
pub fn top_blocks(scores: &BlockScores, limit: usize) -> Vec<(u64, f64)> {
    let mut rows: Vec<(u64, f64)> = scores.iter().map(|(&a, &s)| (a, s)).collect();
    rows.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    rows.truncate(limit);
    rows
}

/// A function ranked by the scores of its blocks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionRank {
    pub name: String,
    pub address: u64,
    pub avg_score: f64,
    pub max_score: f64,
    pub block_count: usize,
}

/// Rank functions by their best block, skipping functions with no scored block
pub fn rank_functions<R: GraphReader + ?Sized>(
    reader: &R,
    binary_id: &str,
    scores: &BlockScores,
    limit: usize,
) -> Result<Vec<FunctionRank>> {
    let mut ranked: Vec<FunctionRank> = reader
        .function_blocks(binary_id)?
        .into_iter()
        .filter_map(|func| {
            let scored: Vec<f64> = func.blocks.iter().filter_map(|b| scores.get(b).copied()).collect();
            if scored.is_empty() {
                return None;
            }
            let max_score = scored.iter().copied().fold(f64::MIN, f64::max);
            Some(FunctionRank {
                avg_score: scored.iter().sum::<f64>() / scored.len() as f64,
                max_score,
                block_count: scored.len(),
                name: func.name,
                address: func.address,
            })
        })
        .collect();

    ranked.sort_by(|a, b| b.max_score.total_cmp(&a.max_score).then(a.address.cmp(&b.address)));
    ranked.truncate(limit);
    Ok(ranked)
}
