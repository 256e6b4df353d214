use std::thread;
use std::time::Duration;

use crate::{
    jitter_ratio, BotConfig, ChatRequest, Message, OracleError, OracleReply, Role, ToolCall,
};

const RETRY_BASE_SECS: f64 = 0.5;
const RETRY_MAX_SECS: f64 = 4.0;

/// The language-model oracle, as seen by the router, handlers, and
/// summarizer. Implementations must tolerate being called concurrently for
/// different conversations.
pub(crate) trait Oracle {
    fn complete(&self, request: &ChatRequest) -> Result<OracleReply, OracleError>;
}

impl<T: Oracle + ?Sized> Oracle for std::sync::Arc<T> {
    fn complete(&self, request: &ChatRequest) -> Result<OracleReply, OracleError> {
        (**self).complete(request)
    }
}

/// Oracle backed by a local Ollama server's /api/chat endpoint.
pub(crate) struct OllamaClient {
    base_url: String,
    timeout_ms: Option<u64>,
    max_retries: usize,
}

impl OllamaClient {
    pub(crate) fn from_config(config: &BotConfig) -> Self {
        Self {
            base_url: config.ollama_url.trim_end_matches('/').to_string(),
            timeout_ms: config.oracle_timeout_ms,
            max_retries: config.oracle_max_retries,
        }
    }

    fn agent(&self) -> ureq::Agent {
        let mut builder = ureq::AgentBuilder::new();
        if let Some(ms) = self.timeout_ms {
            let timeout = Duration::from_millis(ms.max(1));
            builder = builder
                .timeout_connect(timeout)
                .timeout_read(timeout)
                .timeout_write(timeout);
        }
        builder.build()
    }
}

pub(crate) fn to_ollama_messages(system: &str, messages: &[Message]) -> Vec<serde_json::Value> {
    let mut out = Vec::with_capacity(messages.len() + 1);
    if !system.trim().is_empty() {
        out.push(serde_json::json!({"role": "system", "content": system}));
    }
    for msg in messages {
        // Tool-call descriptors are persistence metadata; the wire format
        // only carries role + text.
        let role = match msg.role {
            Role::Tool => "tool",
            Role::System => "system",
            Role::Assistant => "assistant",
            Role::User => "user",
        };
        out.push(serde_json::json!({"role": role, "content": msg.content}));
    }
    out
}

pub(crate) fn to_ollama_tools(tools: &[serde_json::Value]) -> Vec<serde_json::Value> {
    let mut out = Vec::new();
    for tool in tools {
        let Some(obj) = tool.as_object() else {
            continue;
        };
        let Some(name) = obj.get("name").and_then(|v| v.as_str()) else {
            continue;
        };
        let description = obj
            .get("description")
            .and_then(|v| v.as_str())
            .unwrap_or("");
        let parameters = obj
            .get("inputSchema")
            .or_else(|| obj.get("input_schema"))
            .cloned()
            .unwrap_or_else(|| serde_json::json!({"type": "object", "properties": {}}));
        out.push(serde_json::json!({
            "type": "function",
            "function": {
                "name": name,
                "description": description,
                "parameters": parameters
            }
        }));
    }
    out
}

/// Parse an /api/chat response body. Malformed or empty tool-call lists are
/// tolerated; free-text-only replies are the common case.
pub(crate) fn parse_ollama_response(payload: &serde_json::Value) -> Result<OracleReply, OracleError> {
    let message = payload
        .get("message")
        .ok_or_else(|| OracleError("response missing message".to_string()))?;
    let text = message
        .get("content")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    let mut tool_calls = Vec::new();
    if let Some(calls) = message.get("tool_calls").and_then(|v| v.as_array()) {
        for call in calls {
            let Some(function) = call.get("function") else {
                continue;
            };
            let Some(name) = function.get("name").and_then(|v| v.as_str()) else {
                continue;
            };
            if name.is_empty() {
                continue;
            }
            // Some models emit arguments as a JSON-encoded string.
            let args = match function.get("arguments") {
                Some(serde_json::Value::String(raw)) => {
                    serde_json::from_str(raw).unwrap_or(serde_json::json!({}))
                }
                Some(value) => value.clone(),
                None => serde_json::json!({}),
            };
            tool_calls.push(ToolCall {
                name: name.to_string(),
                args,
            });
        }
    }

    Ok(OracleReply { text, tool_calls })
}

impl Oracle for OllamaClient {
    fn complete(&self, request: &ChatRequest) -> Result<OracleReply, OracleError> {
        let url = format!("{}/api/chat", self.base_url);
        let mut payload = serde_json::json!({
            "model": request.model,
            "stream": false,
            "messages": to_ollama_messages(&request.system, &request.messages),
        });
        let tools = to_ollama_tools(&request.tools);
        if !tools.is_empty() {
            payload["tools"] = serde_json::json!(tools);
        }

        let agent = self.agent();
        let retryable = |status: u16| matches!(status, 429 | 500 | 502 | 503 | 504);
        let mut last_err = String::new();

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let mut delay =
                    (RETRY_BASE_SECS * 2.0_f64.powi(attempt as i32 - 1)).min(RETRY_MAX_SECS);
                delay *= 1.0 + jitter_ratio() * 0.2;
                thread::sleep(Duration::from_secs_f64(delay));
            }
            match agent.post(&url).send_json(payload.clone()) {
                Ok(resp) => {
                    let body = resp
                        .into_string()
                        .map_err(|e| OracleError(format!("read response: {e}")))?;
                    let value: serde_json::Value = serde_json::from_str(&body)
                        .map_err(|e| OracleError(format!("parse response: {e}")))?;
                    return parse_ollama_response(&value);
                }
                Err(ureq::Error::Status(code, resp)) => {
                    let text = resp.into_string().unwrap_or_default();
                    last_err = format!("status {code}: {text}");
                    if !retryable(code) {
                        break;
                    }
                    eprintln!("[ollama] attempt {attempt} failed ({code}), retrying");
                }
                Err(ureq::Error::Transport(err)) => {
                    last_err = format!("transport: {err}");
                    eprintln!("[ollama] attempt {attempt} transport error, retrying");
                }
            }
        }

        Err(OracleError(format!(
            "request to {url} failed after {} attempts: {last_err}",
            self.max_retries + 1
        )))
    }
}
