//! Date-rotated JSONL turn log. One line per completed turn; disabled when
//! no log directory is configured.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct TurnLogEntry {
    pub(crate) ts: i64,
    pub(crate) user_id: String,
    pub(crate) conversation_id: String,
    pub(crate) source: String,
    pub(crate) route: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) tool: Option<String>,
    pub(crate) reply_len: usize,
    pub(crate) summarized: bool,
}

pub(crate) fn append_turn_jsonl(
    log_dir: &Path,
    entry: &TurnLogEntry,
) -> Result<(), Box<dyn std::error::Error>> {
    fs::create_dir_all(log_dir)?;
    let date_str = Utc::now().format("%Y-%m-%d");
    let filename = format!("turns-{}.jsonl", date_str);
    let path = log_dir.join(filename);
    let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
    let json = serde_json::to_string(entry)?;
    writeln!(file, "{}", json)?;
    Ok(())
}

/// Most recent turns for a user, newest last, scanning at most a week of
/// log files.
pub(crate) fn load_user_turns(log_dir: &Path, user_id: &str, limit: usize) -> Vec<TurnLogEntry> {
    let mut files: Vec<PathBuf> = match fs::read_dir(log_dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with("turns-") && n.ends_with(".jsonl"))
                    .unwrap_or(false)
            })
            .collect(),
        Err(_) => return Vec::new(),
    };
    files.sort_by(|a, b| b.file_name().cmp(&a.file_name()));
    files.truncate(7);

    let mut collected = Vec::new();
    for path in &files {
        let file = match fs::File::open(path) {
            Ok(f) => f,
            Err(_) => continue,
        };
        let reader = BufReader::new(file);
        for line in reader.lines() {
            let line = match line {
                Ok(l) => l,
                Err(_) => continue,
            };
            let entry: TurnLogEntry = match serde_json::from_str(&line) {
                Ok(e) => e,
                Err(_) => continue,
            };
            if entry.user_id == user_id {
                collected.push(entry);
                if collected.len() >= limit {
                    collected.reverse();
                    return collected;
                }
            }
        }
    }
    collected.reverse();
    collected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_log_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join("miss_fritters_test")
            .join(format!("logs_{}_{name}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn entry(user: &str, route: &str) -> TurnLogEntry {
        TurnLogEntry {
            ts: 1_700_000_000,
            user_id: user.to_string(),
            conversation_id: user.to_string(),
            source: "cli".to_string(),
            route: route.to_string(),
            tool: None,
            reply_len: 42,
            summarized: false,
        }
    }

    #[test]
    fn test_append_and_filter_by_user() {
        let dir = temp_log_dir("filter");
        append_turn_jsonl(&dir, &entry("alice", "conversation")).unwrap();
        append_turn_jsonl(&dir, &entry("bob", "tell_a_story")).unwrap();
        append_turn_jsonl(&dir, &entry("alice", "help_with_coding")).unwrap();

        let turns = load_user_turns(&dir, "alice", 10);
        assert_eq!(turns.len(), 2);
        assert!(turns.iter().all(|t| t.user_id == "alice"));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_dir_yields_empty() {
        let dir = temp_log_dir("missing");
        assert!(load_user_turns(&dir, "alice", 10).is_empty());
    }
}
