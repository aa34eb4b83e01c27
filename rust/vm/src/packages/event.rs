//! Event hats and broadcasts.

use crate::error::PrimitiveError;
use crate::primitive::{BlockArgs, BlockPackage, BlockUtility, HatMeta, Outcome, PrimitiveFn};
use crate::value::Value;

/// Green flag hat.
pub const WHEN_FLAG_CLICKED: &str = "event_whenflagclicked";
/// Broadcast hat, matched on [`BROADCAST_OPTION`].
pub const WHEN_BROADCAST_RECEIVED: &str = "event_whenbroadcastreceived";
/// Key hat, matched on [`KEY_OPTION`].
pub const WHEN_KEY_PRESSED: &str = "event_whenkeypressed";
/// Sprite click hat.
pub const WHEN_THIS_SPRITE_CLICKED: &str = "event_whenthisspriteclicked";
/// Edge-activated comparison hat.
pub const WHEN_GREATER_THAN: &str = "event_whengreaterthan";

/// Field naming the broadcast a hat listens for.
pub const BROADCAST_OPTION: &str = "BROADCAST_OPTION";
/// Field naming the key a hat listens for.
pub const KEY_OPTION: &str = "KEY_OPTION";

const RESTART: HatMeta = HatMeta {
    restart_existing_threads: true,
    edge_activated: false,
};

/// `event_*` opcodes.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventPackage;

impl BlockPackage for EventPackage {
    fn primitives(&self) -> Vec<(&'static str, PrimitiveFn)> {
        vec![
            (WHEN_GREATER_THAN, when_greater_than as PrimitiveFn),
            ("event_broadcast", broadcast as PrimitiveFn),
            ("event_broadcast_menu", broadcast_menu as PrimitiveFn),
        ]
    }

    fn hats(&self) -> Vec<(&'static str, HatMeta)> {
        vec![
            (WHEN_FLAG_CLICKED, RESTART),
            (WHEN_BROADCAST_RECEIVED, RESTART),
            (WHEN_KEY_PRESSED, HatMeta::default()),
            (WHEN_THIS_SPRITE_CLICKED, RESTART),
            (
                WHEN_GREATER_THAN,
                HatMeta {
                    restart_existing_threads: false,
                    edge_activated: true,
                },
            ),
        ]
    }
}

fn when_greater_than(
    args: &BlockArgs,
    util: &mut BlockUtility<'_, '_>,
) -> Result<Outcome, PrimitiveError> {
    let threshold = args.number("VALUE");
    let above = match args.string("WHENGREATERTHANMENU").to_lowercase().as_str() {
        "timer" => util.project_timer() > threshold,
        // No loudness source in this runtime.
        _ => false,
    };
    Ok(Outcome::Value(Value::Bool(above)))
}

fn broadcast(args: &BlockArgs, util: &mut BlockUtility<'_, '_>) -> Result<Outcome, PrimitiveError> {
    let name = args.string("BROADCAST_INPUT");
    util.start_hats(WHEN_BROADCAST_RECEIVED, &[(BROADCAST_OPTION, name.as_str())]);
    Ok(Outcome::Done)
}

fn broadcast_menu(args: &BlockArgs, _: &mut BlockUtility<'_, '_>) -> Result<Outcome, PrimitiveError> {
    Ok(Outcome::Value(args.string(BROADCAST_OPTION).into()))
}
