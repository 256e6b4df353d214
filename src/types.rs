use serde::{Deserialize, Serialize};

// ── Roles ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }

    pub(crate) fn from_db_str(s: &str) -> Self {
        match s {
            "system" => Self::System,
            "assistant" => Self::Assistant,
            "tool" => Self::Tool,
            _ => Self::User,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Messages ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ToolCall {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) args: serde_json::Value,
}

/// One conversation message. Immutable once persisted; `seq` is assigned by
/// the history store and is monotonic within a (user, conversation) key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Message {
    pub(crate) role: Role,
    pub(crate) content: String,
    /// Set on an assistant message whose content came from a tool — the
    /// descriptor doubles as the result linkage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) tool_call: Option<ToolCall>,
    #[serde(default)]
    pub(crate) seq: u64,
}

impl Message {
    pub(crate) fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_call: None,
            seq: 0,
        }
    }

    pub(crate) fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_call: None,
            seq: 0,
        }
    }

    pub(crate) fn assistant_from_tool(content: impl Into<String>, call: ToolCall) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_call: Some(call),
            seq: 0,
        }
    }
}

// ── Routes ───────────────────────────────────────────────────────────────

pub(crate) const CONVERSATION_ROUTE: &str = "conversation";
pub(crate) const CODING_ROUTE: &str = "help_with_coding";
pub(crate) const STORY_ROUTE: &str = "tell_a_story";
pub(crate) const HOME_ROUTE: &str = "home_management";

/// Conversation mode chosen for a single turn. Produced fresh every turn and
/// never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RouteDecision {
    Conversation,
    Coding,
    Story,
    HomeManagement,
}

impl RouteDecision {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::Conversation => CONVERSATION_ROUTE,
            Self::Coding => CODING_ROUTE,
            Self::Story => STORY_ROUTE,
            Self::HomeManagement => HOME_ROUTE,
        }
    }

    /// Exact case-insensitive match against the legal route names. Anything
    /// else is None; callers degrade to Conversation.
    pub(crate) fn parse(raw: &str) -> Option<Self> {
        let cleaned = raw.trim().trim_matches('"').trim().to_ascii_lowercase();
        match cleaned.as_str() {
            CONVERSATION_ROUTE => Some(Self::Conversation),
            CODING_ROUTE => Some(Self::Coding),
            STORY_ROUTE => Some(Self::Story),
            HOME_ROUTE => Some(Self::HomeManagement),
            _ => None,
        }
    }
}

// ── Transport boundary ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MessageSource {
    Cli,
    DiscordText,
    DiscordVoice,
}

impl MessageSource {
    pub(crate) fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "cli" => Some(Self::Cli),
            "discord_text" => Some(Self::DiscordText),
            "discord_voice" => Some(Self::DiscordVoice),
            _ => None,
        }
    }

    pub(crate) fn context_line(&self, user_id: &str) -> String {
        match self {
            Self::DiscordText => format!("User is texting from Discord (User ID: {user_id})"),
            Self::DiscordVoice => format!(
                "User is speaking from Discord (User ID: {user_id}). Answer in 10 words or less."
            ),
            Self::Cli => format!("User is interacting via CLI (User ID: {user_id})"),
        }
    }
}

// ── Oracle wire types ────────────────────────────────────────────────────

/// One request to the language-model oracle. History is an explicit snapshot;
/// nothing here is mutated by the call.
#[derive(Debug, Clone)]
pub(crate) struct ChatRequest {
    pub(crate) model: String,
    pub(crate) system: String,
    pub(crate) messages: Vec<Message>,
    /// Tool descriptors in `{name, description, inputSchema}` form; empty
    /// when tool calling is disabled for the request.
    pub(crate) tools: Vec<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub(crate) struct OracleReply {
    pub(crate) text: String,
    pub(crate) tool_calls: Vec<ToolCall>,
}

// ── Errors ───────────────────────────────────────────────────────────────

/// Oracle call failure (network, timeout, malformed response). The only
/// infrastructure error that is allowed to fail a turn.
#[derive(Debug)]
pub(crate) struct OracleError(pub(crate) String);

impl std::fmt::Display for OracleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "oracle: {}", self.0)
    }
}

impl std::error::Error for OracleError {}

#[derive(Debug)]
pub(crate) enum TurnError {
    OracleUnavailable(OracleError),
    Store(String),
    BadInput(String),
}

impl std::fmt::Display for TurnError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OracleUnavailable(e) => write!(f, "{e}"),
            Self::Store(msg) => write!(f, "store: {msg}"),
            Self::BadInput(msg) => write!(f, "bad input: {msg}"),
        }
    }
}

impl std::error::Error for TurnError {}

impl From<OracleError> for TurnError {
    fn from(e: OracleError) -> Self {
        Self::OracleUnavailable(e)
    }
}

// ── Tool execution ───────────────────────────────────────────────────────

#[derive(Debug)]
pub(crate) struct ToolExecution {
    pub(crate) output: String,
    pub(crate) is_error: bool,
}

impl ToolExecution {
    pub(crate) fn ok(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            is_error: false,
        }
    }

    pub(crate) fn err(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            is_error: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_parse_exact() {
        assert_eq!(
            RouteDecision::parse("conversation"),
            Some(RouteDecision::Conversation)
        );
        assert_eq!(
            RouteDecision::parse("HELP_WITH_CODING"),
            Some(RouteDecision::Coding)
        );
        assert_eq!(
            RouteDecision::parse("  \"tell_a_story\"  "),
            Some(RouteDecision::Story)
        );
        assert_eq!(
            RouteDecision::parse("home_management"),
            Some(RouteDecision::HomeManagement)
        );
    }

    #[test]
    fn test_route_parse_garbage() {
        assert_eq!(RouteDecision::parse("I think coding would fit"), None);
        assert_eq!(RouteDecision::parse(""), None);
    }

    #[test]
    fn test_role_db_round_trip() {
        for role in [Role::System, Role::User, Role::Assistant, Role::Tool] {
            assert_eq!(Role::from_db_str(role.as_str()), role);
        }
        assert_eq!(Role::from_db_str("garbage"), Role::User);
    }
}
