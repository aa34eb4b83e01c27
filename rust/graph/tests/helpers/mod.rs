//! Shared strategies for program graph tests.

use proptest::prelude::*;
use proptest::test_runner::{Config, RngAlgorithm, TestRng, TestRunner};

use blocks_graph::{BlockEvent, BlockId, BlockTree, ProgramGraph};

/// Deterministic seed for reproducibility.
pub const SEED: [u8; 32] = [
    0x42, 0x6C, 0x6F, 0x63, 0x6B, 0x47, 0x72, 0x61, // "BlockGra"
    0x70, 0x68, 0x50, 0x72, 0x6F, 0x70, 0x65, 0x72, // "phProper"
    0x74, 0x79, 0x54, 0x65, 0x73, 0x74, 0x53, 0x75, // "tyTestSu"
    0x69, 0x74, 0x65, 0x56, 0x31, 0x2E, 0x30, 0x30, // "iteV1.00"
];

pub fn make_runner(cases: u32) -> TestRunner {
    TestRunner::new_with_rng(
        Config {
            cases,
            ..Config::default()
        },
        TestRng::from_seed(RngAlgorithm::ChaCha, &SEED),
    )
}

fn opcode_strategy() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("control_repeat"),
        Just("control_if"),
        Just("control_forever"),
        Just("looks_say"),
        Just("data_setvariableto"),
        Just("operator_add"),
        Just("math_number"),
    ]
}

fn input_name_strategy() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("SUBSTACK"),
        Just("SUBSTACK2"),
        Just("CONDITION"),
        Just("TIMES"),
        Just("VALUE"),
    ]
}

fn fields_strategy() -> impl Strategy<Value = Vec<(&'static str, String)>> {
    prop::collection::vec(
        (prop_oneof![Just("NUM"), Just("VARIABLE"), Just("TEXT")], "[a-z0-9]{0,6}"),
        0..3,
    )
}

/// Random create payload with unique ids `{prefix}0`, `{prefix}1`, ...
pub fn tree_strategy(prefix: &'static str) -> impl Strategy<Value = BlockTree> {
    let leaf = (opcode_strategy(), fields_strategy()).prop_map(|(opcode, fields)| {
        let mut tree = BlockTree::new("?", opcode);
        for (name, value) in fields {
            tree = tree.field(name, value);
        }
        tree
    });
    leaf.prop_recursive(4, 32, 3, |inner| {
        (
            opcode_strategy(),
            fields_strategy(),
            prop::collection::vec((input_name_strategy(), inner.clone()), 0..3),
            prop::option::of(inner),
        )
            .prop_map(|(opcode, fields, inputs, next)| {
                let mut tree = BlockTree::new("?", opcode);
                for (name, value) in fields {
                    tree = tree.field(name, value);
                }
                for (name, child) in inputs {
                    tree = tree.input(name, child);
                }
                if let Some(next) = next {
                    tree = tree.next(next);
                }
                tree
            })
    })
    .prop_map(move |mut tree| {
        let mut counter = 0;
        renumber(&mut tree, prefix, &mut counter);
        tree
    })
}

fn renumber(tree: &mut BlockTree, prefix: &str, counter: &mut usize) {
    tree.id = BlockId::new(format!("{prefix}{counter}"));
    *counter += 1;
    for slot in tree.inputs.values_mut() {
        if let Some(block) = slot.block.as_mut() {
            renumber(block, prefix, counter);
        }
        if let Some(shadow) = slot.shadow.as_mut() {
            renumber(shadow, prefix, counter);
        }
    }
    if let Some(next) = tree.next.as_mut() {
        renumber(next, prefix, counter);
    }
}

/// Graph made of up to three independent scripts.
pub fn graph_strategy() -> impl Strategy<Value = ProgramGraph> {
    (
        tree_strategy("a"),
        prop::option::of(tree_strategy("b")),
        prop::option::of(tree_strategy("c")),
    )
        .prop_map(|(a, b, c)| {
            let mut graph = ProgramGraph::new();
            for tree in std::iter::once(a).chain(b).chain(c) {
                graph
                    .apply_event(&BlockEvent::Create { tree }, false)
                    .expect("generated ids are unique");
            }
            graph
        })
}
