use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "miss-fritters")]
#[command(about = "A routing chatbot with tools, per-user memory, and history summarization", long_about = None)]
#[command(version)]
pub(crate) struct Cli {
    /// Config file path (created with defaults if missing).
    #[arg(long, default_value = "config.json")]
    pub(crate) config: PathBuf,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Interactive chat loop on stdin/stdout.
    Chat {
        /// User id for the session.
        #[arg(long, default_value = "cli")]
        user: String,
        /// Conversation id (defaults to the user id).
        #[arg(long)]
        conversation: Option<String>,
    },

    /// Run a single turn and print the reply.
    Ask {
        prompt: String,
        #[arg(long, default_value = "cli")]
        user: String,
        #[arg(long)]
        conversation: Option<String>,
        /// Message source: cli | discord_text | discord_voice
        #[arg(long, default_value = "cli")]
        source: String,
    },

    /// Print stored history for a conversation.
    History {
        #[arg(long, default_value = "cli")]
        user: String,
        #[arg(long)]
        conversation: Option<String>,
    },

    /// Delete stored history for a conversation.
    Clear {
        #[arg(long, default_value = "cli")]
        user: String,
        #[arg(long)]
        conversation: Option<String>,
    },

    /// Print a user's long-term memories as JSON.
    Memories {
        #[arg(long, default_value = "cli")]
        user: String,
    },

    /// Show recent turns from the turn log.
    Turns {
        #[arg(long, default_value = "cli")]
        user: String,
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },
}
