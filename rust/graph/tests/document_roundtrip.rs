//! Serialize a program graph and parse it back.
#![allow(clippy::unwrap_used, clippy::expect_used)]

#[allow(dead_code, unreachable_pub)]
mod helpers;

use proptest::strategy::{Strategy, ValueTree};

use blocks_graph::{Block, BlockId, ProgramGraph};

fn assert_same_structure(a: &ProgramGraph, b: &ProgramGraph) {
    let ids_a: Vec<_> = a.block_ids().collect();
    let ids_b: Vec<_> = b.block_ids().collect();
    assert_eq!(ids_a, ids_b);
    assert_eq!(a.scripts().collect::<Vec<_>>(), b.scripts().collect::<Vec<_>>());
    for id in ids_a {
        let (x, y) = (a.block(id).unwrap(), b.block(id).unwrap());
        assert_eq!(x.opcode, y.opcode);
        assert_eq!(x.fields, y.fields);
        assert_eq!(x.inputs, y.inputs);
        assert_eq!(x.next, y.next);
        assert_eq!(x.parent, y.parent);
    }
}

#[test]
fn prop_document_roundtrip_preserves_linkage() {
    let mut runner = helpers::make_runner(64);
    let strategy = helpers::graph_strategy();

    for _ in 0..64 {
        let graph = strategy.new_tree(&mut runner).unwrap().current();
        let json = graph.to_json().unwrap();
        let parsed = ProgramGraph::from_json(&json).unwrap();
        assert_same_structure(&graph, &parsed);
    }
}

#[test]
fn roundtrip_ignores_ephemeral_blocks() {
    let mut graph = ProgramGraph::new();
    graph
        .create_block(Block::new("s", "event_whenflagclicked"), false)
        .unwrap();
    graph
        .create_block(Block::new("preview", "looks_say"), true)
        .unwrap();

    let parsed = ProgramGraph::from_json(&graph.to_json().unwrap()).unwrap();
    assert!(parsed.block(&BlockId::new("s")).is_some());
    assert!(parsed.block(&BlockId::new("preview")).is_none());
    assert_eq!(parsed.len(), 1);
}
