use revgraph::bbr::{compute_bbr, compute_bbr_with, rank_functions, top_blocks, write_bbr_scores};
use revgraph::config::BbrConfig;
use revgraph::graph::{ArtifactSink, GraphReader, IngestStats, MemoryGraph};
use revgraph::{extract_bytes, RevgraphConfig};

use crate::common::*;

#[test]
fn test_ingest_stats_match_artifact() {
    let artifact = extract_bytes("hello", &hello_elf(), &Default::default()).unwrap();
    let mut graph = MemoryGraph::new();
    let stats = graph.ingest(&artifact).unwrap();

    assert_eq!(stats, IngestStats::for_artifact(&artifact));
    assert_eq!(
        stats,
        IngestStats {
            functions: 2,
            calls: 1,
            basic_blocks: 2,
            flows: 0,
            instructions: 12,
            // "Hello, world" from main plus two unreferenced data strings
            strings: 3,
            // printf from main plus the name-only puts
            imports: 2,
        }
    );
}

#[test]
fn test_rank_extracted_binary_and_write_back() {
    let artifact = extract_bytes("hello", &hello_elf(), &Default::default()).unwrap();
    let id = artifact.content_hash().to_string();
    let mut graph = MemoryGraph::new();
    graph.ingest(&artifact).unwrap();

    let scores = compute_bbr(&graph, &id, 20, 0.85).unwrap();
    assert_eq!(scores.len(), 2);
    for score in scores.values() {
        assert!((score - 0.5).abs() < 1e-9);
    }

    let written = write_bbr_scores(&mut graph, &id, &scores, 500).unwrap();
    assert_eq!(written, 2);
    assert_eq!(graph.score(&id, MAIN_ADDR), scores.get(&MAIN_ADDR).copied());

    let ranked = rank_functions(&graph, &id, &scores, 10).unwrap();
    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked[0].block_count, 1);
    assert_eq!(ranked[0].address, MAIN_ADDR);
    assert!((ranked[0].avg_score - ranked[0].max_score).abs() < 1e-12);
}

#[test]
fn test_configured_ranking_over_stored_cfg() {
    let mut graph = MemoryGraph::new();
    let blocks = [0x10, 0x20, 0x30, 0x40];
    let edges = [(0x10, 0x20), (0x20, 0x30), (0x30, 0x40), (0x10, 0x30)];
    graph.insert_graph("cfg", &blocks, &edges);
    assert_eq!(graph.flow_edges("cfg").unwrap().len(), 4);

    let config = BbrConfig {
        iterations: 50,
        ..RevgraphConfig::default().bbr
    };
    let scores = compute_bbr_with(&graph, "cfg", &config).unwrap();
    let total: f64 = scores.values().sum();
    assert!((total - 1.0).abs() < 1e-3);
    assert!(scores[&0x40] > scores[&0x10]);
    assert!(scores[&0x30] > scores[&0x20]);

    let top = top_blocks(&scores, 1);
    assert_eq!(top[0].0, 0x40);

    let small = BbrConfig {
        max_nodes: 3,
        ..BbrConfig::default()
    };
    assert!(compute_bbr_with(&graph, "cfg", &small).is_err());
}

#[test]
fn test_reingest_replaces_graph() {
    let artifact = extract_bytes("hello", &hello_elf(), &Default::default()).unwrap();
    let id = artifact.content_hash().to_string();
    let mut graph = MemoryGraph::new();
    graph.ingest(&artifact).unwrap();
    graph.ingest(&artifact).unwrap();
    assert_eq!(graph.binary_ids().len(), 1);
    assert_eq!(graph.block_addresses(&id).unwrap(), vec![MAIN_ADDR, COMPUTE_ADDR]);
}
