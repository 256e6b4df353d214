//! Per-turn mode selection. One oracle call decides the route; anything the
//! model says that is not a legal route name degrades to conversation.

use crate::{
    BotConfig, ChatRequest, Message, Oracle, OracleError, RouteDecision, CODING_ROUTE,
    CONVERSATION_ROUTE, HOME_ROUTE, STORY_ROUTE,
};

fn supervisor_prompt(include_home: bool) -> String {
    let mut prompt = format!(
        r#"Your response must always be one of the following options:
"{CONVERSATION_ROUTE}" - used by default.
"{CODING_ROUTE}" - use if the user is asking for something code-related.
"{STORY_ROUTE}" - use if the user is asking you tell a story.
"#
    );
    if include_home {
        prompt.push_str(&format!(
            "\"{HOME_ROUTE}\" - use if the user is asking to control lights or home devices.\n"
        ));
    }
    prompt.push_str(&format!(
        r#"
Do NOT generate any additional text or explanations.
Only return one of the above values as the complete response.
Example inputs and expected outputs:
- "Can you help me with a Python script to list all values in a dict" -> "{CODING_ROUTE}"
- "Can you tell me a story about frogs?" -> "{STORY_ROUTE}"
- "How are you doing?" -> "{CONVERSATION_ROUTE}"
"#
    ));
    prompt
}

/// Choose the mode for this turn. The home route is only offered to
/// allowlisted users; for everyone else the oracle never even sees it.
pub(crate) fn choose_route(
    oracle: &dyn Oracle,
    config: &BotConfig,
    user_id: &str,
    user_message: &str,
) -> Result<RouteDecision, OracleError> {
    let is_root = config.is_root_user(user_id);
    let request = ChatRequest {
        model: config.chat_model.clone(),
        system: supervisor_prompt(is_root),
        messages: vec![Message::user(user_message)],
        tools: Vec::new(),
    };
    let reply = oracle.complete(&request)?;
    let route = match RouteDecision::parse(&reply.text) {
        Some(route) => route,
        None => {
            eprintln!("[router] unrecognized route {:?}, defaulting to conversation", reply.text);
            RouteDecision::Conversation
        }
    };
    // A non-root user can never reach home management, no matter what the
    // model answered.
    if route == RouteDecision::HomeManagement && !is_root {
        eprintln!("[router] home route refused for {user_id}");
        return Ok(RouteDecision::Conversation);
    }
    eprintln!("[router] route: {}", route.as_str());
    Ok(route)
}
