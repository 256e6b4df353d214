//! Tool registries and dispatch. Each registry pairs a descriptor with its
//! handler closure and is built once at startup; dispatch is a name lookup,
//! with unknown names collapsing to a diagnostic string handed back to the
//! model. Network tools run under an optional deadline.

use std::sync::mpsc;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use crate::tool_args::*;
use crate::tool_defs::*;
use crate::{
    current_time_string, deck, lights, weather, websearch, BotConfig, DeckTable, MemoryStore,
    ToolCall, ToolExecution,
};

pub(crate) struct ToolContext<'a> {
    pub(crate) config: &'a BotConfig,
    pub(crate) user_id: &'a str,
    pub(crate) memory: &'a Mutex<MemoryStore>,
    pub(crate) decks: &'a Mutex<DeckTable>,
}

type ToolHandler = Box<dyn Fn(&ToolContext<'_>, &serde_json::Value) -> ToolExecution + Send + Sync>;

struct RegisteredTool {
    descriptor: serde_json::Value,
    name: String,
    run: ToolHandler,
}

/// A closed set of invocable tools: descriptor plus handler, looked up by
/// name. Registration order is preserved so descriptors reach the oracle in
/// a stable order.
pub(crate) struct ToolRegistry {
    tools: Vec<RegisteredTool>,
}

impl ToolRegistry {
    fn new() -> Self {
        Self { tools: Vec::new() }
    }

    fn register(&mut self, descriptor: serde_json::Value, run: ToolHandler) {
        let name = descriptor["name"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        self.tools.push(RegisteredTool {
            descriptor,
            name,
            run,
        });
    }

    pub(crate) fn descriptors(&self) -> Vec<serde_json::Value> {
        self.tools.iter().map(|t| t.descriptor.clone()).collect()
    }

    pub(crate) fn dispatch(&self, ctx: &ToolContext<'_>, call: &ToolCall) -> ToolExecution {
        eprintln!("[tools] call: {}", call.name);
        match self.tools.iter().find(|t| t.name == call.name) {
            Some(tool) => (tool.run)(ctx, &call.args),
            None => ToolExecution::err(format!(
                "Unknown tool call: {} with args: {}",
                call.name, call.args
            )),
        }
    }
}

/// The per-mode registries. Built once at startup and shared by every turn.
pub(crate) struct ToolRegistries {
    pub(crate) standard: ToolRegistry,
    pub(crate) home: ToolRegistry,
}

impl ToolRegistries {
    pub(crate) fn new() -> Self {
        Self {
            standard: standard_registry(),
            home: home_registry(),
        }
    }
}

/// Run a blocking network tool on its own thread so a hung socket cannot
/// stall the turn past the configured deadline. The deadline bounds how
/// long the turn waits, not the tool itself: on timeout the worker thread
/// is abandoned and its side effect (a light command, say) may still land
/// after the diagnostic has been returned.
fn run_with_deadline(
    timeout_ms: Option<u64>,
    label: &str,
    work: impl FnOnce() -> String + Send + 'static,
) -> ToolExecution {
    let Some(ms) = timeout_ms else {
        return ToolExecution::ok(work());
    };
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(work());
    });
    match rx.recv_timeout(Duration::from_millis(ms)) {
        Ok(output) => ToolExecution::ok(output),
        Err(_) => {
            eprintln!("[tools] {label} timed out after {ms}ms");
            ToolExecution::err(format!("Tool call {label} timed out after {ms}ms."))
        }
    }
}

fn respond_to_user_handler() -> ToolHandler {
    Box::new(|_ctx, args| match parse_args::<RespondArgs>(RESPOND_TO_USER, args) {
        Ok(args) => ToolExecution::ok(args.content),
        Err(err) => ToolExecution::err(err),
    })
}

fn standard_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    let descriptors = standard_tools();
    let mut descriptors = descriptors.into_iter();

    // Descriptor order in tool_defs matches registration order here.
    registry.register(descriptors.next().unwrap(), respond_to_user_handler());
    registry.register(
        descriptors.next().unwrap(),
        Box::new(|_ctx, _args| ToolExecution::ok(current_time_string())),
    );
    registry.register(
        descriptors.next().unwrap(),
        Box::new(|ctx, args| match parse_args::<SearchWebArgs>(SEARCH_WEB, args) {
            Ok(args) => {
                let timeout = ctx.config.tool_timeout_ms;
                run_with_deadline(timeout, SEARCH_WEB, move || {
                    websearch::search_web(&args.query, timeout)
                })
            }
            Err(err) => ToolExecution::err(err),
        }),
    );
    registry.register(
        descriptors.next().unwrap(),
        Box::new(|_ctx, args| match parse_args::<RollDiceArgs>(ROLL_DICE, args) {
            Ok(args) => ToolExecution::ok(deck::roll_dice(args.sides)),
            Err(err) => ToolExecution::err(err),
        }),
    );
    registry.register(
        descriptors.next().unwrap(),
        Box::new(|ctx, args| match parse_args::<WeatherArgs>(GET_WEATHER, args) {
            Ok(args) => {
                let timeout = ctx.config.tool_timeout_ms;
                run_with_deadline(timeout, GET_WEATHER, move || {
                    weather::get_weather(&args.city, timeout)
                })
            }
            Err(err) => ToolExecution::err(err),
        }),
    );
    registry.register(
        descriptors.next().unwrap(),
        Box::new(|ctx, args| match parse_args::<DrawCardsArgs>(DRAW_CARDS, args) {
            Ok(args) => {
                let mut decks = ctx.decks.lock().unwrap_or_else(|e| e.into_inner());
                ToolExecution::ok(decks.draw_cards(args.number_of_cards, ctx.user_id))
            }
            Err(err) => ToolExecution::err(err),
        }),
    );
    registry.register(
        descriptors.next().unwrap(),
        Box::new(|ctx, _args| {
            let decks = ctx.decks.lock().unwrap_or_else(|e| e.into_inner());
            ToolExecution::ok(decks.cards_left(ctx.user_id))
        }),
    );
    registry.register(
        descriptors.next().unwrap(),
        Box::new(|ctx, _args| {
            let mut decks = ctx.decks.lock().unwrap_or_else(|e| e.into_inner());
            ToolExecution::ok(decks.reload(ctx.user_id))
        }),
    );
    registry.register(
        descriptors.next().unwrap(),
        Box::new(|ctx, _args| {
            let memory = ctx.memory.lock().unwrap_or_else(|e| e.into_inner());
            match memory.as_json(ctx.user_id) {
                Ok(json) => ToolExecution::ok(json),
                Err(err) => ToolExecution::err(format!("Error reading memories: {err}")),
            }
        }),
    );
    registry.register(
        descriptors.next().unwrap(),
        Box::new(|ctx, args| match parse_args::<RememberArgs>(REMEMBER, args) {
            Ok(args) => {
                let memory = ctx.memory.lock().unwrap_or_else(|e| e.into_inner());
                match memory.add(ctx.user_id, &args.key, &args.value) {
                    Ok(()) => ToolExecution::ok(format!("Remembered {} for you.", args.key)),
                    Err(err) => ToolExecution::err(format!("Error saving memory: {err}")),
                }
            }
            Err(err) => ToolExecution::err(err),
        }),
    );
    registry
}

fn home_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(
        standard_tools().swap_remove(0),
        respond_to_user_handler(),
    );

    let mut descriptors = home_tools().into_iter();
    registry.register(
        descriptors.next().unwrap(),
        Box::new(|ctx, _args| {
            let config = ctx.config.clone();
            let user = ctx.user_id.to_string();
            run_with_deadline(ctx.config.tool_timeout_ms, TURN_ON_LIGHTS, move || {
                lights::turn_on_lights(&config, &user)
            })
        }),
    );
    registry.register(
        descriptors.next().unwrap(),
        Box::new(|ctx, _args| {
            let config = ctx.config.clone();
            let user = ctx.user_id.to_string();
            run_with_deadline(ctx.config.tool_timeout_ms, TURN_OFF_LIGHTS, move || {
                lights::turn_off_lights(&config, &user)
            })
        }),
    );
    registry.register(
        descriptors.next().unwrap(),
        Box::new(
            |ctx, args| match parse_args::<ChangeLightColorArgs>(CHANGE_LIGHT_COLOR, args) {
                Ok(args) => {
                    let config = ctx.config.clone();
                    let user = ctx.user_id.to_string();
                    run_with_deadline(ctx.config.tool_timeout_ms, CHANGE_LIGHT_COLOR, move || {
                        lights::change_light_color(&config, &user, args.color_hue)
                    })
                }
                Err(err) => ToolExecution::err(err),
            },
        ),
    );
    registry
}
