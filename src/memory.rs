//! Long-term key/value memory per user. Append-only: remembering the same
//! key twice keeps both rows, and the JSON view shows the newest value.

use std::path::Path;

use rusqlite::{params, Connection};

pub(crate) struct MemoryStore {
    conn: Connection,
}

#[derive(Debug, Clone)]
pub(crate) struct MemoryEntry {
    pub(crate) key: String,
    pub(crate) value: String,
    pub(crate) created_at: i64,
}

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS memories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
);

CREATE INDEX IF NOT EXISTS idx_memories_user ON memories(user_id);
";

impl MemoryStore {
    pub(crate) fn open_or_create(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self { conn })
    }

    pub(crate) fn add(&self, user_id: &str, key: &str, value: &str) -> Result<(), String> {
        self.conn
            .execute(
                "INSERT INTO memories (user_id, key, value) VALUES (?, ?, ?)",
                params![user_id, key, value],
            )
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    pub(crate) fn list(&self, user_id: &str) -> Result<Vec<MemoryEntry>, String> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT key, value, created_at FROM memories
                 WHERE user_id = ? ORDER BY id ASC",
            )
            .map_err(|e| e.to_string())?;
        let rows = stmt
            .query_map(params![user_id], |row| {
                Ok(MemoryEntry {
                    key: row.get(0)?,
                    value: row.get(1)?,
                    created_at: row.get(2)?,
                })
            })
            .map_err(|e| e.to_string())?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row.map_err(|e| e.to_string())?);
        }
        Ok(entries)
    }

    pub(crate) fn count(&self, user_id: &str) -> Result<usize, String> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM memories WHERE user_id = ?",
                params![user_id],
                |row| row.get::<_, i64>(0),
            )
            .map(|n| n as usize)
            .map_err(|e| e.to_string())
    }

    /// All of a user's memories as one JSON object. Duplicate keys collapse
    /// newest-wins, which is what the chat prompt wants to see.
    pub(crate) fn as_json(&self, user_id: &str) -> Result<String, String> {
        let mut map = serde_json::Map::new();
        for entry in self.list(user_id)? {
            map.insert(entry.key, serde_json::Value::String(entry.value));
        }
        serde_json::to_string(&serde_json::Value::Object(map)).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_db_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("miss_fritters_test");
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(format!("memory_{}_{name}.sqlite", std::process::id()))
    }

    #[test]
    fn test_add_and_list() {
        let path = temp_db_path("add_list");
        let _ = std::fs::remove_file(&path);
        let store = MemoryStore::open_or_create(&path).unwrap();

        store.add("alice", "favorite_color", "teal").unwrap();
        store.add("alice", "hometown", "Austin").unwrap();
        store.add("bob", "favorite_color", "red").unwrap();

        let entries = store.list("alice").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key, "favorite_color");
        assert_eq!(store.count("bob").unwrap(), 1);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_duplicate_keys_coexist_newest_wins_in_json() {
        let path = temp_db_path("dup_keys");
        let _ = std::fs::remove_file(&path);
        let store = MemoryStore::open_or_create(&path).unwrap();

        store.add("alice", "favorite_color", "teal").unwrap();
        store.add("alice", "favorite_color", "mauve").unwrap();

        assert_eq!(store.count("alice").unwrap(), 2);
        let json: serde_json::Value =
            serde_json::from_str(&store.as_json("alice").unwrap()).unwrap();
        assert_eq!(json["favorite_color"], "mauve");

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_empty_user_json_is_empty_object() {
        let path = temp_db_path("empty_json");
        let _ = std::fs::remove_file(&path);
        let store = MemoryStore::open_or_create(&path).unwrap();

        assert_eq!(store.as_json("nobody").unwrap(), "{}");

        std::fs::remove_file(&path).ok();
    }
}
