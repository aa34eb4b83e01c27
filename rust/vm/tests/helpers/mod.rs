//! Shared test infrastructure for runtime tests.

use std::collections::BTreeMap;
use std::time::Duration;

use proptest::test_runner::{Config, RngAlgorithm, TestRng, TestRunner};
use serde_json::{json, Value as Json};

use blocks_graph::{BlockEvent, BlockId, ProgramGraph};
use blocks_vm::{
    FixedCostTimer, Notification, PrimitiveTable, Runtime, RuntimeConfig, SimClock, TargetId,
    Value,
};

/// Deterministic seed for reproducibility.
pub const SEED: [u8; 32] = [
    0x42, 0x6C, 0x6F, 0x63, 0x6B, 0x56, 0x4D, 0x52, // "BlockVMR"
    0x75, 0x6E, 0x74, 0x69, 0x6D, 0x65, 0x50, 0x72, // "untimePr"
    0x6F, 0x70, 0x65, 0x72, 0x74, 0x79, 0x54, 0x65, // "opertyTe"
    0x73, 0x74, 0x73, 0x56, 0x31, 0x2E, 0x30, 0x30, // "stsV1.00"
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

// ============================================================================
// Program construction
// ============================================================================

/// Build a program from nested block trees in the editor's JSON shape.
pub fn program(scripts: &[Json]) -> ProgramGraph {
    let mut graph = ProgramGraph::new();
    for tree in scripts {
        let event: BlockEvent =
            serde_json::from_value(json!({ "type": "create", "tree": tree })).unwrap();
        graph.apply_event(&event, false).unwrap();
    }
    graph
}

/// Number literal shadow for an input slot.
pub fn num(id: &str, value: f64) -> Json {
    json!({ "shadow": { "id": id, "opcode": "math_number", "fields": { "NUM": value.to_string() } } })
}

/// Text literal shadow for an input slot.
pub fn text(id: &str, value: &str) -> Json {
    json!({ "shadow": { "id": id, "opcode": "text", "fields": { "TEXT": value } } })
}

/// Real block plugged into an input slot.
pub fn plug(tree: Json) -> Json {
    json!({ "block": tree })
}

/// `change VARIABLE by delta`.
pub fn change_by(id: &str, variable: &str, delta: f64) -> Json {
    json!({
        "id": id,
        "opcode": "data_changevariableby",
        "fields": { "VARIABLE": variable },
        "inputs": { "VALUE": num(&format!("{id}_n"), delta) }
    })
}

/// `set VARIABLE to text`.
pub fn set_to(id: &str, variable: &str, value: &str) -> Json {
    json!({
        "id": id,
        "opcode": "data_setvariableto",
        "fields": { "VARIABLE": variable },
        "inputs": { "VALUE": text(&format!("{id}_t"), value) }
    })
}

/// `wait seconds`.
pub fn wait(id: &str, seconds: f64) -> Json {
    json!({
        "id": id,
        "opcode": "control_wait",
        "inputs": { "DURATION": num(&format!("{id}_n"), seconds) }
    })
}

/// Append `next` below `tree`.
pub fn then(mut tree: Json, next: Json) -> Json {
    tree["next"] = next;
    tree
}

/// A script: hat followed by the given blocks in order.
pub fn script(hat: Json, body: Vec<Json>) -> Json {
    let mut chain: Option<Json> = None;
    for block in body.into_iter().rev() {
        chain = Some(match chain {
            Some(next) => then(block, next),
            None => block,
        });
    }
    match chain {
        Some(next) => then(hat, next),
        None => hat,
    }
}

pub fn flag_hat(id: &str) -> Json {
    json!({ "id": id, "opcode": "event_whenflagclicked" })
}

pub fn forever(id: &str, body: Json) -> Json {
    json!({ "id": id, "opcode": "control_forever", "inputs": { "SUBSTACK": plug(body) } })
}

pub fn repeat(id: &str, times: f64, body: Json) -> Json {
    json!({
        "id": id,
        "opcode": "control_repeat",
        "inputs": { "TIMES": num(&format!("{id}_n"), times), "SUBSTACK": plug(body) }
    })
}

// ============================================================================
// Runtime construction and inspection
// ============================================================================

/// Runtime with unlimited work budget and a simulated clock.
pub fn runtime(config: RuntimeConfig) -> Runtime {
    Runtime::with_parts(
        config,
        PrimitiveTable::with_default_packages(),
        Box::new(SimClock::default()),
        Box::new(FixedCostTimer::new(Duration::ZERO)),
    )
}

/// Advance one frame interval and step, returning the notifications.
pub fn tick(runtime: &mut Runtime) -> Vec<Notification> {
    let interval = runtime.config().frame_interval();
    runtime.advance_clock(interval);
    runtime.step();
    runtime.drain_notifications()
}

pub fn number(runtime: &Runtime, target: TargetId, variable: &str) -> f64 {
    runtime
        .target(target)
        .and_then(|t| t.variable(variable))
        .map_or(0.0, Value::to_number)
}

pub fn variable(runtime: &Runtime, target: TargetId, variable: &str) -> Option<Value> {
    runtime
        .target(target)
        .and_then(|t| t.variable(variable))
        .cloned()
}

/// Running glow balance per script: +1 for each glow-on, -1 for each
/// glow-off.
pub fn glow_balance(
    balance: &mut BTreeMap<BlockId, i64>,
    notifications: &[Notification],
) {
    for notification in notifications {
        match notification {
            Notification::GlowOn { script } => *balance.entry(script.clone()).or_default() += 1,
            Notification::GlowOff { script } => *balance.entry(script.clone()).or_default() -= 1,
            _ => {}
        }
    }
}
