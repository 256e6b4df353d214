use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_chat_model() -> String {
    "llama3.2".to_string()
}

fn default_code_model() -> String {
    "codellama".to_string()
}

fn default_story_model() -> String {
    "mistral".to_string()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("chat_history.db")
}

fn default_history_threshold() -> usize {
    6
}

fn default_summary_retain() -> usize {
    2
}

fn default_oracle_max_retries() -> usize {
    2
}

/// Bot configuration, read from a JSON file. A default file is written on
/// first run so every knob is visible and editable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct BotConfig {
    #[serde(default = "default_ollama_url")]
    pub(crate) ollama_url: String,
    #[serde(default = "default_chat_model")]
    pub(crate) chat_model: String,
    #[serde(default = "default_code_model")]
    pub(crate) code_model: String,
    #[serde(default = "default_story_model")]
    pub(crate) story_model: String,
    #[serde(default = "default_db_path")]
    pub(crate) db_path: PathBuf,
    /// Users allowed to reach the home-management mode and its tools.
    #[serde(default)]
    pub(crate) root_users: Vec<String>,
    /// Summarization fires once history exceeds this many messages.
    #[serde(default = "default_history_threshold")]
    pub(crate) history_threshold: usize,
    /// Messages kept after summarization truncates history.
    #[serde(default = "default_summary_retain")]
    pub(crate) summary_retain: usize,
    /// Per-call deadline for oracle requests. None = no deadline.
    #[serde(default)]
    pub(crate) oracle_timeout_ms: Option<u64>,
    /// Per-call deadline for tool invocations that do I/O. None = no deadline.
    #[serde(default)]
    pub(crate) tool_timeout_ms: Option<u64>,
    #[serde(default = "default_oracle_max_retries")]
    pub(crate) oracle_max_retries: usize,
    /// HTTP bridge for the smart lights. Unset disables the light tools'
    /// device I/O (they report the bridge as unconfigured).
    #[serde(default)]
    pub(crate) lights_endpoint: Option<String>,
    /// Directory for per-turn JSONL logs. Unset disables turn logging.
    #[serde(default)]
    pub(crate) log_dir: Option<PathBuf>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            ollama_url: default_ollama_url(),
            chat_model: default_chat_model(),
            code_model: default_code_model(),
            story_model: default_story_model(),
            db_path: default_db_path(),
            root_users: Vec::new(),
            history_threshold: default_history_threshold(),
            summary_retain: default_summary_retain(),
            oracle_timeout_ms: None,
            tool_timeout_ms: None,
            oracle_max_retries: default_oracle_max_retries(),
            lights_endpoint: None,
            log_dir: None,
        }
    }
}

impl BotConfig {
    pub(crate) fn is_root_user(&self, user_id: &str) -> bool {
        self.root_users.iter().any(|u| u == user_id)
    }
}

/// Load the config, writing a default file first if none exists.
pub(crate) fn load_or_create_config(path: &Path) -> Result<BotConfig, Box<dyn std::error::Error>> {
    if !path.exists() {
        save_config(path, &BotConfig::default())?;
        eprintln!("[config] wrote default config to {}", path.display());
    }
    let data = std::fs::read_to_string(path)?;
    let config: BotConfig = serde_json::from_str(&data)
        .map_err(|e| format!("invalid config {}: {e}", path.display()))?;
    Ok(config)
}

pub(crate) fn save_config(path: &Path, config: &BotConfig) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(config)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
