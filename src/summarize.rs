//! History eviction. Once a conversation outgrows the configured threshold,
//! the transcript is summarized into long-term memory and the stored history
//! shrinks to a short tail. Ordering is fail-closed: the summary and its key
//! are stored before anything is deleted, so an oracle outage can never lose
//! history.

use std::sync::Mutex;

use crate::{
    current_time_string, BotConfig, ChatRequest, HistoryStore, MemoryStore, Message, Oracle,
    TurnError,
};

const SUMMARY_REQUEST: &str = "Please summarize the conversation above:";
const WRAP_UP_NOTE: &str = "\r\n I am wrapping up this conversation and starting a new one :)";
const KEY_PROMPT: &str = "Please provide a short sentence describing this memory starting with \
                          the word \"memory\". Example - memory_of_pie";

/// Summarize and truncate if the conversation has outgrown the threshold.
/// Returns whether a summarization happened.
///
/// The store mutex is only taken for the snapshot and the final truncation;
/// the two oracle calls run with no lock held so other conversations'
/// turns are never blocked behind a slow summarization. The caller's
/// per-conversation turn lock is what keeps this key single-writer.
pub(crate) fn maybe_summarize(
    oracle: &dyn Oracle,
    config: &BotConfig,
    history: &Mutex<HistoryStore>,
    memory: &Mutex<MemoryStore>,
    user_id: &str,
    conversation_id: &str,
) -> Result<bool, TurnError> {
    let mut transcript = {
        let history = history.lock().unwrap_or_else(|e| e.into_inner());
        let len = history
            .len(user_id, conversation_id)
            .map_err(TurnError::Store)?;
        if len <= config.history_threshold {
            return Ok(false);
        }
        eprintln!("[summarize] {len} messages for {user_id}, summarizing");
        history
            .load(user_id, conversation_id)
            .map_err(TurnError::Store)?
    };
    if let Some(last) = transcript.last_mut() {
        last.content.push_str(WRAP_UP_NOTE);
    }
    transcript.push(Message::user(SUMMARY_REQUEST));

    let summary_reply = oracle.complete(&ChatRequest {
        model: config.chat_model.clone(),
        system: String::new(),
        messages: transcript,
        tools: Vec::new(),
    })?;
    let summary = format!(
        "Summary made at {} \r\n {}",
        current_time_string(),
        summary_reply.text
    );

    let key_reply = oracle.complete(&ChatRequest {
        model: config.chat_model.clone(),
        system: KEY_PROMPT.to_string(),
        messages: vec![Message::user(&summary)],
        tools: Vec::new(),
    })?;
    let key = key_reply.text.trim().to_string();
    let key = if key.is_empty() {
        "memory_of_conversation".to_string()
    } else {
        key
    };

    // Store first, delete second. A failure between the two leaves extra
    // history behind, never a hole.
    memory
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .add(user_id, &key, &summary)
        .map_err(TurnError::Store)?;
    history
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .truncate_to_last(user_id, conversation_id, config.summary_retain)
        .map_err(TurnError::Store)?;
    eprintln!("[summarize] stored {key} and kept last {} messages", config.summary_retain);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeOracle;
    use std::path::PathBuf;

    fn temp_db_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("miss_fritters_test");
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(format!("summarize_{}_{name}.sqlite", std::process::id()))
    }

    fn seeded_history(path: &PathBuf, count: usize) -> HistoryStore {
        let _ = std::fs::remove_file(path);
        let mut store = HistoryStore::open_or_create(path).unwrap();
        let messages: Vec<Message> = (0..count)
            .map(|i| {
                if i % 2 == 0 {
                    Message::user(format!("question {i}"))
                } else {
                    Message::assistant(format!("answer {i}"))
                }
            })
            .collect();
        store.append("alice", "alice", &messages).unwrap();
        store
    }

    #[test]
    fn test_below_threshold_is_untouched() {
        let hist_path = temp_db_path("below_hist");
        let mem_path = temp_db_path("below_mem");
        let _ = std::fs::remove_file(&mem_path);
        let history = Mutex::new(seeded_history(&hist_path, 4));
        let memory = Mutex::new(MemoryStore::open_or_create(&mem_path).unwrap());
        let oracle = FakeOracle::new(vec![]);
        let config = BotConfig::default();

        let did =
            maybe_summarize(&oracle, &config, &history, &memory, "alice", "alice").unwrap();
        assert!(!did);
        assert_eq!(oracle.call_count(), 0);
        assert_eq!(history.lock().unwrap().len("alice", "alice").unwrap(), 4);

        std::fs::remove_file(&hist_path).ok();
        std::fs::remove_file(&mem_path).ok();
    }

    #[test]
    fn test_over_threshold_summarizes_and_truncates() {
        let hist_path = temp_db_path("over_hist");
        let mem_path = temp_db_path("over_mem");
        let _ = std::fs::remove_file(&mem_path);
        let history = Mutex::new(seeded_history(&hist_path, 7));
        let memory = Mutex::new(MemoryStore::open_or_create(&mem_path).unwrap());
        let oracle = FakeOracle::new(vec![
            FakeOracle::text("We talked about pie."),
            FakeOracle::text("memory_of_pie"),
        ]);
        let config = BotConfig::default();

        let did =
            maybe_summarize(&oracle, &config, &history, &memory, "alice", "alice").unwrap();
        assert!(did);
        assert_eq!(oracle.call_count(), 2);
        assert_eq!(
            history.lock().unwrap().len("alice", "alice").unwrap(),
            config.summary_retain
        );

        let mem = memory.lock().unwrap();
        let entries = mem.list("alice").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, "memory_of_pie");
        assert!(entries[0].value.starts_with("Summary made at "));
        assert!(entries[0].value.contains("We talked about pie."));

        std::fs::remove_file(&hist_path).ok();
        std::fs::remove_file(&mem_path).ok();
    }

    #[test]
    fn test_oracle_failure_leaves_history_intact() {
        let hist_path = temp_db_path("fail_hist");
        let mem_path = temp_db_path("fail_mem");
        let _ = std::fs::remove_file(&mem_path);
        let history = Mutex::new(seeded_history(&hist_path, 7));
        let memory = Mutex::new(MemoryStore::open_or_create(&mem_path).unwrap());
        // Summary call succeeds, key call fails.
        let oracle = FakeOracle::new(vec![FakeOracle::text("We talked about pie.")]);
        let config = BotConfig::default();

        let result = maybe_summarize(&oracle, &config, &history, &memory, "alice", "alice");
        assert!(result.is_err());
        assert_eq!(history.lock().unwrap().len("alice", "alice").unwrap(), 7);
        assert_eq!(memory.lock().unwrap().count("alice").unwrap(), 0);

        std::fs::remove_file(&hist_path).ok();
        std::fs::remove_file(&mem_path).ok();
    }

    #[test]
    fn test_summary_request_carries_wrap_up_note() {
        let hist_path = temp_db_path("note_hist");
        let mem_path = temp_db_path("note_mem");
        let _ = std::fs::remove_file(&mem_path);
        let history = Mutex::new(seeded_history(&hist_path, 7));
        let memory = Mutex::new(MemoryStore::open_or_create(&mem_path).unwrap());
        let oracle = FakeOracle::new(vec![
            FakeOracle::text("summary"),
            FakeOracle::text("memory_of_chat"),
        ]);
        let config = BotConfig::default();

        maybe_summarize(&oracle, &config, &history, &memory, "alice", "alice").unwrap();
        let requests = oracle.requests.lock().unwrap();
        let summary_messages = &requests[0].messages;
        assert_eq!(summary_messages.last().unwrap().content, SUMMARY_REQUEST);
        assert!(summary_messages[summary_messages.len() - 2]
            .content
            .contains("wrapping up this conversation"));

        std::fs::remove_file(&hist_path).ok();
        std::fs::remove_file(&mem_path).ok();
    }
}
