// Module declarations
mod cli;
mod types;
mod util;
mod config;
mod ollama;
mod history;
mod memory;
mod deck;
mod weather;
mod websearch;
mod lights;
mod tool_args;
mod tool_defs;
mod tool_exec;
mod router;
mod handlers;
mod summarize;
mod orchestrator;
mod turn_log;

#[cfg(test)]
mod testing;

// Re-export all module items at crate root so cross-module references work.
#[allow(unused_imports)]
pub(crate) use cli::*;
#[allow(unused_imports)]
pub(crate) use types::*;
#[allow(unused_imports)]
pub(crate) use util::*;
#[allow(unused_imports)]
pub(crate) use config::*;
#[allow(unused_imports)]
pub(crate) use ollama::*;
#[allow(unused_imports)]
pub(crate) use history::*;
#[allow(unused_imports)]
pub(crate) use memory::*;
#[allow(unused_imports)]
pub(crate) use deck::*;
#[allow(unused_imports)]
pub(crate) use tool_args::*;
#[allow(unused_imports)]
pub(crate) use tool_defs::*;
#[allow(unused_imports)]
pub(crate) use tool_exec::*;
#[allow(unused_imports)]
pub(crate) use router::*;
#[allow(unused_imports)]
pub(crate) use handlers::*;
#[allow(unused_imports)]
pub(crate) use summarize::*;
#[allow(unused_imports)]
pub(crate) use orchestrator::*;

use std::io::{self, BufRead, Write};

use clap::Parser;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_or_create_config(&cli.config)?;

    match cli.command {
        Command::Chat { user, conversation } => {
            let oracle = OllamaClient::from_config(&config);
            let bot = Bot::new(config, Box::new(oracle))?;
            run_chat_loop(&bot, &user, conversation.as_deref())
        }

        Command::Ask {
            prompt,
            user,
            conversation,
            source,
        } => {
            let source = MessageSource::parse(&source)
                .ok_or_else(|| format!("unknown message source: {source}"))?;
            let oracle = OllamaClient::from_config(&config);
            let bot = Bot::new(config, Box::new(oracle))?;
            let reply = bot.run_turn(&user, conversation.as_deref(), source, &prompt)?;
            println!("{reply}");
            Ok(())
        }

        Command::History { user, conversation } => {
            let history = HistoryStore::open_or_create(&config.db_path)?;
            let user_id = sanitize_user_id(&user);
            let conv = conversation
                .as_deref()
                .map(sanitize_user_id)
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| user_id.clone());
            for msg in history.load(&user_id, &conv)? {
                let tool = msg
                    .tool_call
                    .as_ref()
                    .map(|c| format!(" [{}]", c.name))
                    .unwrap_or_default();
                println!("{:>4} {}{}: {}", msg.seq, msg.role, tool, msg.content);
            }
            Ok(())
        }

        Command::Clear { user, conversation } => {
            let history = HistoryStore::open_or_create(&config.db_path)?;
            let user_id = sanitize_user_id(&user);
            let conv = conversation
                .as_deref()
                .map(sanitize_user_id)
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| user_id.clone());
            history.clear(&user_id, &conv)?;
            println!("Cleared history for {user_id}:{conv}");
            Ok(())
        }

        Command::Memories { user } => {
            let memory = MemoryStore::open_or_create(&config.db_path)?;
            println!("{}", memory.as_json(&sanitize_user_id(&user))?);
            Ok(())
        }

        Command::Turns { user, limit } => {
            let Some(log_dir) = &config.log_dir else {
                eprintln!("No log_dir configured; turn logging is disabled.");
                return Ok(());
            };
            for entry in turn_log::load_user_turns(log_dir, &sanitize_user_id(&user), limit) {
                println!("{}", serde_json::to_string(&entry)?);
            }
            Ok(())
        }
    }
}

fn run_chat_loop(
    bot: &Bot,
    user: &str,
    conversation: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    println!("Miss Fritters is listening. Type 'exit' to leave, 'clear' to forget this conversation.");
    loop {
        print!("> ");
        stdout.flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let prompt = line.trim();
        if prompt.is_empty() {
            continue;
        }
        if prompt.eq_ignore_ascii_case("exit") || prompt.eq_ignore_ascii_case("quit") {
            break;
        }
        if prompt.eq_ignore_ascii_case("clear") {
            bot.clear_conversation(user, conversation)?;
            println!("Forgotten!");
            continue;
        }
        match bot.run_turn(user, conversation, MessageSource::Cli, prompt) {
            Ok(reply) => println!("{reply}"),
            Err(err) => eprintln!("[chat] turn failed: {err}"),
        }
    }
    Ok(())
}
