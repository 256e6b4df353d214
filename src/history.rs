//! SQLite-backed conversation history, keyed by (user_id, conversation_id).
//!
//! Messages are append-only; the only removals are `clear` and the
//! summarizer's truncation, both of which replace the tail atomically inside
//! a transaction.

use std::path::Path;

use rusqlite::{params, Connection};

use crate::{Message, Role, ToolCall};

pub(crate) struct HistoryStore {
    conn: Connection,
}

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS message_history (
    user_id TEXT NOT NULL,
    conversation_id TEXT NOT NULL,
    seq INTEGER NOT NULL,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    tool_call TEXT,
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
    PRIMARY KEY (user_id, conversation_id, seq)
);

CREATE INDEX IF NOT EXISTS idx_history_key
    ON message_history(user_id, conversation_id);
";

impl HistoryStore {
    pub(crate) fn open_or_create(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.apply_pragmas()?;
        store.conn.execute_batch(SCHEMA_SQL)?;
        Ok(store)
    }

    fn apply_pragmas(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(())
    }

    /// Append messages in order, assigning each the next sequence number for
    /// the key. One transaction per call; a turn's messages never interleave
    /// with another turn's.
    pub(crate) fn append(
        &mut self,
        user_id: &str,
        conversation_id: &str,
        messages: &[Message],
    ) -> Result<(), String> {
        if messages.is_empty() {
            return Ok(());
        }
        let tx = self.conn.transaction().map_err(|e| e.to_string())?;
        let mut next_seq: u64 = tx
            .query_row(
                "SELECT COALESCE(MAX(seq), 0) FROM message_history
                 WHERE user_id = ? AND conversation_id = ?",
                params![user_id, conversation_id],
                |row| row.get::<_, i64>(0),
            )
            .map_err(|e| e.to_string())? as u64
            + 1;
        for msg in messages {
            let tool_call_json = match &msg.tool_call {
                Some(call) => Some(serde_json::to_string(call).map_err(|e| e.to_string())?),
                None => None,
            };
            tx.execute(
                "INSERT INTO message_history (user_id, conversation_id, seq, role, content, tool_call)
                 VALUES (?, ?, ?, ?, ?, ?)",
                params![
                    user_id,
                    conversation_id,
                    next_seq as i64,
                    msg.role.as_str(),
                    msg.content,
                    tool_call_json
                ],
            )
            .map_err(|e| e.to_string())?;
            next_seq += 1;
        }
        tx.commit().map_err(|e| e.to_string())
    }

    pub(crate) fn load(
        &self,
        user_id: &str,
        conversation_id: &str,
    ) -> Result<Vec<Message>, String> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT seq, role, content, tool_call FROM message_history
                 WHERE user_id = ? AND conversation_id = ?
                 ORDER BY seq ASC",
            )
            .map_err(|e| e.to_string())?;
        let rows = stmt
            .query_map(params![user_id, conversation_id], |row| {
                let seq: i64 = row.get(0)?;
                let role: String = row.get(1)?;
                let content: String = row.get(2)?;
                let tool_call: Option<String> = row.get(3)?;
                Ok((seq, role, content, tool_call))
            })
            .map_err(|e| e.to_string())?;

        let mut messages = Vec::new();
        for row in rows {
            let (seq, role, content, tool_call) = row.map_err(|e| e.to_string())?;
            let tool_call: Option<ToolCall> =
                tool_call.and_then(|raw| serde_json::from_str(&raw).ok());
            messages.push(Message {
                role: Role::from_db_str(&role),
                content,
                tool_call,
                seq: seq as u64,
            });
        }
        Ok(messages)
    }

    pub(crate) fn len(&self, user_id: &str, conversation_id: &str) -> Result<usize, String> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM message_history
                 WHERE user_id = ? AND conversation_id = ?",
                params![user_id, conversation_id],
                |row| row.get::<_, i64>(0),
            )
            .map(|n| n as usize)
            .map_err(|e| e.to_string())
    }

    pub(crate) fn clear(&self, user_id: &str, conversation_id: &str) -> Result<(), String> {
        self.conn
            .execute(
                "DELETE FROM message_history WHERE user_id = ? AND conversation_id = ?",
                params![user_id, conversation_id],
            )
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    /// Drop everything except the most recent `retain` messages, atomically.
    pub(crate) fn truncate_to_last(
        &mut self,
        user_id: &str,
        conversation_id: &str,
        retain: usize,
    ) -> Result<(), String> {
        let tx = self.conn.transaction().map_err(|e| e.to_string())?;
        tx.execute(
            "DELETE FROM message_history
             WHERE user_id = ?1 AND conversation_id = ?2
               AND seq NOT IN (
                   SELECT seq FROM message_history
                   WHERE user_id = ?1 AND conversation_id = ?2
                   ORDER BY seq DESC LIMIT ?3
               )",
            params![user_id, conversation_id, retain as i64],
        )
        .map_err(|e| e.to_string())?;
        tx.commit().map_err(|e| e.to_string())
    }
}
