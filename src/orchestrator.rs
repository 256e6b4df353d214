//! The turn engine. One entry point, `Bot::run_turn`, drives a full turn:
//! route, handle, persist, then maybe summarize. A per-conversation lock
//! keeps turns for the same key strictly serial; different keys proceed in
//! parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::{
    choose_route, handle_turn, maybe_summarize, sanitize_user_id, turn_log, BotConfig, DeckTable,
    HistoryStore, MemoryStore, MessageSource, Oracle, ToolRegistries, TurnError, TurnInput,
};

pub(crate) struct Bot {
    config: BotConfig,
    oracle: Box<dyn Oracle + Send + Sync>,
    history: Mutex<HistoryStore>,
    memory: Mutex<MemoryStore>,
    decks: Mutex<DeckTable>,
    registries: ToolRegistries,
    turn_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Bot {
    pub(crate) fn new(
        config: BotConfig,
        oracle: Box<dyn Oracle + Send + Sync>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let history = HistoryStore::open_or_create(&config.db_path)?;
        let memory = MemoryStore::open_or_create(&config.db_path)?;
        Ok(Self {
            config,
            oracle,
            history: Mutex::new(history),
            memory: Mutex::new(memory),
            decks: Mutex::new(DeckTable::default()),
            registries: ToolRegistries::new(),
            turn_locks: Mutex::new(HashMap::new()),
        })
    }

    pub(crate) fn config(&self) -> &BotConfig {
        &self.config
    }

    fn turn_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.turn_locks.lock().unwrap_or_else(|e| e.into_inner());
        // Entries nobody else holds are dead; drop them so the map does not
        // grow with every (user, conversation) pair ever seen.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Run one full turn and return the reply text. Oracle failures abort
    /// the turn before anything is persisted; the caller sees the error and
    /// history is as if the turn never happened.
    pub(crate) fn run_turn(
        &self,
        raw_user_id: &str,
        conversation_id: Option<&str>,
        source: MessageSource,
        prompt: &str,
    ) -> Result<String, TurnError> {
        let user_id = sanitize_user_id(raw_user_id);
        if user_id.is_empty() {
            return Err(TurnError::BadInput(format!(
                "user id {raw_user_id:?} is empty after sanitizing"
            )));
        }
        let conversation_id = match conversation_id {
            Some(raw) => {
                let cleaned = sanitize_user_id(raw);
                if cleaned.is_empty() {
                    return Err(TurnError::BadInput(format!(
                        "conversation id {raw:?} is empty after sanitizing"
                    )));
                }
                cleaned
            }
            None => user_id.clone(),
        };

        let lock = self.turn_lock(&format!("{user_id}:{conversation_id}"));
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let history_snapshot = self
            .history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .load(&user_id, &conversation_id)
            .map_err(TurnError::Store)?;

        let route = choose_route(self.oracle.as_ref(), &self.config, &user_id, prompt)?;
        let input = TurnInput {
            config: &self.config,
            user_id: &user_id,
            source,
            prompt,
            history: &history_snapshot,
            memory: &self.memory,
            decks: &self.decks,
            registries: &self.registries,
        };
        let delta = handle_turn(self.oracle.as_ref(), route, &input)?;
        let tool_name = delta
            .messages
            .last()
            .and_then(|m| m.tool_call.as_ref())
            .map(|c| c.name.clone());

        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .append(&user_id, &conversation_id, &delta.messages)
            .map_err(TurnError::Store)?;
        // The store mutex is released before summarizing: the summarizer's
        // oracle calls must not block turns on other conversations. The
        // per-key lock above keeps this conversation single-writer.
        let summarized = maybe_summarize(
            self.oracle.as_ref(),
            &self.config,
            &self.history,
            &self.memory,
            &user_id,
            &conversation_id,
        )?;

        if let Some(log_dir) = &self.config.log_dir {
            let entry = turn_log::TurnLogEntry {
                ts: crate::now_ts(),
                user_id: user_id.clone(),
                conversation_id: conversation_id.clone(),
                source: match source {
                    MessageSource::Cli => "cli".to_string(),
                    MessageSource::DiscordText => "discord_text".to_string(),
                    MessageSource::DiscordVoice => "discord_voice".to_string(),
                },
                route: route.as_str().to_string(),
                tool: tool_name,
                reply_len: delta.reply_text.len(),
                summarized,
            };
            if let Err(err) = turn_log::append_turn_jsonl(log_dir, &entry) {
                eprintln!("[log] failed to append turn log: {err}");
            }
        }

        Ok(delta.reply_text)
    }

    pub(crate) fn clear_conversation(
        &self,
        raw_user_id: &str,
        conversation_id: Option<&str>,
    ) -> Result<(), TurnError> {
        let user_id = sanitize_user_id(raw_user_id);
        if user_id.is_empty() {
            return Err(TurnError::BadInput("empty user id".to_string()));
        }
        let conversation_id = conversation_id
            .map(sanitize_user_id)
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| user_id.clone());
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear(&user_id, &conversation_id)
            .map_err(TurnError::Store)
    }

    pub(crate) fn history_len(
        &self,
        user_id: &str,
        conversation_id: &str,
    ) -> Result<usize, TurnError> {
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len(user_id, conversation_id)
            .map_err(TurnError::Store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeOracle;
    use crate::{lights, ChatRequest, OracleError, OracleReply};
    use std::path::PathBuf;
    use std::time::{Duration, Instant};

    fn temp_db_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("miss_fritters_test");
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(format!("orchestrator_{}_{name}.sqlite", std::process::id()))
    }

    fn make_bot(name: &str, replies: Vec<OracleReply>) -> (Bot, Arc<FakeOracle>, PathBuf) {
        let path = temp_db_path(name);
        let _ = std::fs::remove_file(&path);
        let config = BotConfig {
            db_path: path.clone(),
            ..BotConfig::default()
        };
        let oracle = Arc::new(FakeOracle::new(replies));
        let bot = Bot::new(config, Box::new(oracle.clone())).unwrap();
        (bot, oracle, path)
    }

    #[test]
    fn test_plain_turn_persists_two_messages() {
        let (bot, oracle, path) = make_bot(
            "plain",
            vec![
                FakeOracle::text("conversation"),
                FakeOracle::text("Hi! I love fritters."),
            ],
        );
        let reply = bot
            .run_turn("alice", None, MessageSource::Cli, "hello")
            .unwrap();
        assert_eq!(reply, "Hi! I love fritters.");
        assert_eq!(bot.history_len("alice", "alice").unwrap(), 2);
        assert_eq!(oracle.call_count(), 2);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_tool_output_is_reply_and_persisted() {
        let (bot, _oracle, path) = make_bot(
            "tool",
            vec![
                FakeOracle::text("conversation"),
                FakeOracle::tool("respond_to_user", serde_json::json!({"content": "All good!"})),
            ],
        );
        let reply = bot
            .run_turn("alice", None, MessageSource::Cli, "how are you")
            .unwrap();
        assert_eq!(reply, "All good!");
        assert_eq!(bot.history_len("alice", "alice").unwrap(), 2);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_oracle_down_persists_nothing() {
        let (bot, _oracle, path) = make_bot("down", vec![]);
        let result = bot.run_turn("alice", None, MessageSource::Cli, "hello");
        assert!(matches!(result, Err(TurnError::OracleUnavailable(_))));
        assert_eq!(bot.history_len("alice", "alice").unwrap(), 0);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_unsanitizable_user_id_rejected() {
        let (bot, oracle, path) = make_bot("bad_user", vec![]);
        let result = bot.run_turn("!!!", None, MessageSource::Cli, "hello");
        assert!(matches!(result, Err(TurnError::BadInput(_))));
        assert_eq!(oracle.call_count(), 0);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_lights_refusal_for_unauthorized_user() {
        // bob is not on the allowlist; even a model determined to call the
        // light tool only produces the refusal string.
        let (bot, _oracle, path) = make_bot(
            "lights",
            vec![
                FakeOracle::text("conversation"),
                FakeOracle::tool("turn_on_lights", serde_json::json!({})),
            ],
        );
        let reply = bot
            .run_turn("bob", None, MessageSource::Cli, "turn on the lights")
            .unwrap();
        assert_eq!(reply, lights::BAD_USER_MESSAGE);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_home_route_never_offered_to_unauthorized_user() {
        let (bot, oracle, path) = make_bot(
            "home_gate",
            vec![
                FakeOracle::text("conversation"),
                FakeOracle::text("I can't touch the lights."),
            ],
        );
        bot.run_turn("bob", None, MessageSource::Cli, "lights please")
            .unwrap();
        let requests = oracle.requests.lock().unwrap();
        assert!(!requests[0].system.contains("home_management"));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_summarization_fires_over_threshold() {
        // Threshold is 6: three prior turns leave 6 messages, and the
        // fourth turn's two messages push the count to 8.
        let (bot, oracle, path) = make_bot(
            "summarize",
            vec![
                FakeOracle::text("conversation"),
                FakeOracle::text("reply 1"),
                FakeOracle::text("conversation"),
                FakeOracle::text("reply 2"),
                FakeOracle::text("conversation"),
                FakeOracle::text("reply 3"),
                FakeOracle::text("conversation"),
                FakeOracle::text("reply 4"),
                FakeOracle::text("We talked about pie."),
                FakeOracle::text("memory_of_pie"),
            ],
        );
        for i in 0..4 {
            bot.run_turn("alice", None, MessageSource::Cli, &format!("msg {i}"))
                .unwrap();
        }
        assert_eq!(oracle.call_count(), 10);
        assert_eq!(
            bot.history_len("alice", "alice").unwrap(),
            bot.config().summary_retain
        );
        let memory = bot.memory.lock().unwrap();
        assert_eq!(memory.count("alice").unwrap(), 1);
        assert_eq!(memory.list("alice").unwrap()[0].key, "memory_of_pie");
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_failed_summarization_fails_turn_but_keeps_history() {
        let (bot, _oracle, path) = make_bot(
            "summarize_fail",
            vec![
                FakeOracle::text("conversation"),
                FakeOracle::text("reply 1"),
                FakeOracle::text("conversation"),
                FakeOracle::text("reply 2"),
                FakeOracle::text("conversation"),
                FakeOracle::text("reply 3"),
                FakeOracle::text("conversation"),
                FakeOracle::text("reply 4"),
                // Oracle dies before the summary completes.
            ],
        );
        for i in 0..3 {
            bot.run_turn("alice", None, MessageSource::Cli, &format!("msg {i}"))
                .unwrap();
        }
        let result = bot.run_turn("alice", None, MessageSource::Cli, "msg 3");
        assert!(result.is_err());
        // The turn's messages persisted and nothing was truncated.
        assert_eq!(bot.history_len("alice", "alice").unwrap(), 8);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_clear_conversation() {
        let (bot, _oracle, path) = make_bot(
            "clear",
            vec![
                FakeOracle::text("conversation"),
                FakeOracle::text("hello!"),
            ],
        );
        bot.run_turn("alice", None, MessageSource::Cli, "hi").unwrap();
        bot.clear_conversation("alice", None).unwrap();
        assert_eq!(bot.history_len("alice", "alice").unwrap(), 0);
        bot.clear_conversation("alice", None).unwrap();
        std::fs::remove_file(&path).ok();
    }

    /// Answers by request shape instead of call order, so it stays
    /// deterministic when turns run concurrently. The summary request is
    /// the slow one.
    struct SlowSummaryOracle {
        delay: Duration,
    }

    impl Oracle for SlowSummaryOracle {
        fn complete(&self, request: &ChatRequest) -> Result<OracleReply, OracleError> {
            let last = request
                .messages
                .last()
                .map(|m| m.content.as_str())
                .unwrap_or("");
            if last == "Please summarize the conversation above:" {
                std::thread::sleep(self.delay);
                return Ok(FakeOracle::text("a long recap"));
            }
            if request.system.starts_with("Please provide a short sentence") {
                return Ok(FakeOracle::text("memory_of_recap"));
            }
            if request.system.contains("Your response must always be one of") {
                return Ok(FakeOracle::text("conversation"));
            }
            Ok(FakeOracle::text("sure thing"))
        }
    }

    #[test]
    fn test_slow_summarization_does_not_block_other_conversations() {
        let path = temp_db_path("parallel");
        let _ = std::fs::remove_file(&path);
        let config = BotConfig {
            db_path: path.clone(),
            ..BotConfig::default()
        };
        let oracle = SlowSummaryOracle {
            delay: Duration::from_millis(1500),
        };
        let bot = Arc::new(Bot::new(config, Box::new(oracle)).unwrap());

        // Three turns leave alice at the 6-message threshold; the fourth
        // pushes past it and summarizes slowly on its own thread.
        for i in 0..3 {
            bot.run_turn("alice", None, MessageSource::Cli, &format!("msg {i}"))
                .unwrap();
        }
        let slow_bot = bot.clone();
        let slow = std::thread::spawn(move || {
            slow_bot
                .run_turn("alice", None, MessageSource::Cli, "msg 3")
                .unwrap();
        });
        // Let the slow turn reach its summarization call.
        std::thread::sleep(Duration::from_millis(300));

        let started = Instant::now();
        let reply = bot
            .run_turn("bob", None, MessageSource::Cli, "hello")
            .unwrap();
        assert_eq!(reply, "sure thing");
        assert!(
            started.elapsed() < Duration::from_millis(1000),
            "unrelated turn waited on another conversation's summarization"
        );

        slow.join().unwrap();
        assert_eq!(
            bot.history_len("alice", "alice").unwrap(),
            bot.config().summary_retain
        );
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_turn_locks_do_not_accumulate() {
        let (bot, _oracle, path) = make_bot(
            "lock_prune",
            vec![
                FakeOracle::text("conversation"),
                FakeOracle::text("hi alice"),
                FakeOracle::text("conversation"),
                FakeOracle::text("hi bob"),
                FakeOracle::text("conversation"),
                FakeOracle::text("hi carol"),
            ],
        );
        for user in ["alice", "bob", "carol"] {
            bot.run_turn(user, None, MessageSource::Cli, "hi").unwrap();
        }
        // Finished turns release their Arc, so each later turn prunes the
        // earlier entries; at most the newest key is left behind.
        assert!(bot.turn_locks.lock().unwrap().len() <= 1);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_separate_conversations_do_not_mix() {
        let (bot, _oracle, path) = make_bot(
            "separate",
            vec![
                FakeOracle::text("conversation"),
                FakeOracle::text("reply a"),
                FakeOracle::text("conversation"),
                FakeOracle::text("reply b"),
            ],
        );
        bot.run_turn("alice", Some("work"), MessageSource::Cli, "hi")
            .unwrap();
        bot.run_turn("alice", Some("play"), MessageSource::Cli, "hi")
            .unwrap();
        assert_eq!(bot.history_len("alice", "work").unwrap(), 2);
        assert_eq!(bot.history_len("alice", "play").unwrap(), 2);
        assert_eq!(bot.history_len("alice", "alice").unwrap(), 0);
        std::fs::remove_file(&path).ok();
    }
}
