//! Test doubles shared across module tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::{ChatRequest, Oracle, OracleError, OracleReply, ToolCall};

/// Scripted oracle: hands out queued replies in order and records every
/// request it sees. Running out of replies is an oracle failure, which is
/// exactly what the fail-closed paths want to exercise.
pub(crate) struct FakeOracle {
    replies: Mutex<VecDeque<OracleReply>>,
    pub(crate) requests: Mutex<Vec<ChatRequest>>,
}

impl FakeOracle {
    pub(crate) fn new(replies: Vec<OracleReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn text(reply: &str) -> OracleReply {
        OracleReply {
            text: reply.to_string(),
            tool_calls: Vec::new(),
        }
    }

    pub(crate) fn tool(name: &str, args: serde_json::Value) -> OracleReply {
        OracleReply {
            text: String::new(),
            tool_calls: vec![ToolCall {
                name: name.to_string(),
                args,
            }],
        }
    }

    pub(crate) fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Oracle for FakeOracle {
    fn complete(&self, request: &ChatRequest) -> Result<OracleReply, OracleError> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| OracleError("scripted oracle exhausted".to_string()))
    }
}
