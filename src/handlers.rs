//! Mode handlers. Each takes the turn's context, makes exactly one oracle
//! call, honors at most one tool call from the reply, and returns the
//! messages to persist plus the text shown to the user.

use std::sync::Mutex;

use crate::{
    BotConfig, ChatRequest, DeckTable, MemoryStore, Message, MessageSource, Oracle, OracleError,
    RouteDecision, ToolContext, ToolRegistries, ToolRegistry,
};

const PERSONA_PROMPT: &str = r#"Role:
    Your name is Miss Fritters, and you are a helpful chatbot with personal opinions of your own.
    You are very nice and are generally very upbeat.
    You love apple fritters.
    You do retain memories per user, and can use the search_memories tool to retrieve them.

    When responding to the user, keep your response to a paragraph or less.

Tools:
    get_current_time: Fetch the current time (US / Central Standard Time).
    search_web: Use only to search the internet if you are unsure about something.
    roll_dice: Roll different types of dice.
    get_weather: Get the temperature in Fahrenheit for a specific city.
    draw_cards: Draw cards from a deck.
    deck_cards_left: Check remaining cards in a deck.
    deck_reload: Shuffle or reload the current deck.
    search_memories: Returns a JSON payload of stored memories you have had with a user.
    remember: Store a fact about the user, but only when asked to.
"#;

const CODING_PROMPT: &str = "You are a ChatBot that assists with writing or explaining code.";

const STORY_PROMPT: &str =
    "You are a ChatBot that receives a prompt and tells a story based off of it.";

const HOME_PROMPT: &str = r#"You control the smart lights in the house. Use the light tools to do
what the user asks, and respond_to_user when no device action is needed."#;

/// What a handler hands back to the orchestrator: the new messages to append
/// to history (user first, assistant last) and the reply for the transport.
pub(crate) struct TurnDelta {
    pub(crate) messages: Vec<Message>,
    pub(crate) reply_text: String,
}

pub(crate) struct TurnInput<'a> {
    pub(crate) config: &'a BotConfig,
    pub(crate) user_id: &'a str,
    pub(crate) source: MessageSource,
    pub(crate) prompt: &'a str,
    pub(crate) history: &'a [Message],
    pub(crate) memory: &'a Mutex<MemoryStore>,
    pub(crate) decks: &'a Mutex<DeckTable>,
    pub(crate) registries: &'a ToolRegistries,
}

fn format_prompt(source: MessageSource, user_id: &str, prompt: &str) -> String {
    format!(
        "Context:\n    {}\nQuestion:\n    {}",
        source.context_line(user_id),
        prompt
    )
}

pub(crate) fn handle_turn(
    oracle: &dyn Oracle,
    route: RouteDecision,
    input: &TurnInput<'_>,
) -> Result<TurnDelta, OracleError> {
    match route {
        RouteDecision::Conversation => {
            converse_with_system(oracle, input, PERSONA_PROMPT, &input.registries.standard)
        }
        RouteDecision::HomeManagement => {
            converse_with_system(oracle, input, HOME_PROMPT, &input.registries.home)
        }
        RouteDecision::Coding => single_shot(
            oracle,
            input,
            &input.config.code_model,
            CODING_PROMPT,
        ),
        RouteDecision::Story => single_shot(
            oracle,
            input,
            &input.config.story_model,
            STORY_PROMPT,
        ),
    }
}

/// Coding and story modes: a fresh model sees only its system prompt and the
/// latest user message, no history and no tools.
fn single_shot(
    oracle: &dyn Oracle,
    input: &TurnInput<'_>,
    model: &str,
    system: &str,
) -> Result<TurnDelta, OracleError> {
    let user_message = Message::user(input.prompt);
    let request = ChatRequest {
        model: model.to_string(),
        system: system.to_string(),
        messages: vec![user_message.clone()],
        tools: Vec::new(),
    };
    let reply = oracle.complete(&request)?;
    Ok(TurnDelta {
        messages: vec![user_message, Message::assistant(&reply.text)],
        reply_text: reply.text,
    })
}

/// Tool-capable mode: full history plus the framed prompt go to the oracle,
/// and at most the first tool call from the reply is executed. The tool's
/// output verbatim becomes the assistant message, with the call recorded on
/// it.
fn converse_with_system(
    oracle: &dyn Oracle,
    input: &TurnInput<'_>,
    system: &str,
    registry: &ToolRegistry,
) -> Result<TurnDelta, OracleError> {
    let user_message = Message::user(format_prompt(input.source, input.user_id, input.prompt));
    let mut messages: Vec<Message> = input.history.to_vec();
    messages.push(user_message.clone());

    let request = ChatRequest {
        model: input.config.chat_model.clone(),
        system: system.to_string(),
        messages,
        tools: registry.descriptors(),
    };
    let reply = oracle.complete(&request)?;

    if let Some(call) = reply.tool_calls.first() {
        if reply.tool_calls.len() > 1 {
            eprintln!(
                "[handlers] {} extra tool calls ignored",
                reply.tool_calls.len() - 1
            );
        }
        let ctx = ToolContext {
            config: input.config,
            user_id: input.user_id,
            memory: input.memory,
            decks: input.decks,
        };
        let execution = registry.dispatch(&ctx, call);
        let assistant = Message::assistant_from_tool(&execution.output, call.clone());
        return Ok(TurnDelta {
            reply_text: execution.output,
            messages: vec![user_message, assistant],
        });
    }

    Ok(TurnDelta {
        messages: vec![user_message, Message::assistant(&reply.text)],
        reply_text: reply.text,
    })
}
