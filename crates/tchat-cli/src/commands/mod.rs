//! Slash commands for interactive mode

mod history;
mod info;
mod model;
mod stats;
mod system;

pub use history::HistoryCommand;
pub use info::{ConfigCommand, ShowCommand, version_message};
pub use model::ModelCommand;
pub use stats::StatsCommand;
pub use system::SystemCommand;

use std::path::Path;

use tchat_core::{AppState, HistoryWindow, ModelCatalog};

use crate::config::Config;

/// Escape sequence that homes the cursor and clears the screen
pub const CLEAR_SCREEN: &str = "\x1b[H\x1b[2J";

/// Read-only view of the session that commands inspect
pub struct CommandContext<'a> {
    pub state: &'a AppState,
    pub history: &'a HistoryWindow,
    pub catalog: &'a ModelCatalog,
    pub config: &'a Config,
    pub app_dir: &'a Path,
    /// Server address actually in use
    pub host: &'a str,
}

/// Result of executing a slash command
#[derive(Debug, PartialEq, Eq)]
pub enum CommandResult {
    /// Show a message to the user
    Message(String),
    /// Switch to the named model (clears history when it changes)
    ChangeModel(String),
    /// Replace the system prompt
    SetSystemPrompt(String),
    /// Drop the conversation history
    ResetHistory,
    /// Clear the terminal
    ClearScreen,
    /// Copy the last reply to the clipboard
    CopyLastResponse,
    /// Show stored statistics
    ShowStats,
    /// Exit the application
    Exit,
    /// Unknown command
    Unknown(String),
}

/// Parse and execute a slash command
pub fn execute_command(input: &str, ctx: &CommandContext<'_>) -> Option<CommandResult> {
    let input = input.trim();

    let rest = input.strip_prefix('/')?;
    let parts: Vec<&str> = rest.splitn(2, ' ').collect();
    let command = parts[0].to_lowercase();
    let args = parts.get(1).map(|s| s.trim()).unwrap_or("");

    Some(match command.as_str() {
        "help" | "h" | "?" => CommandResult::Message(help_message()),

        "quit" | "exit" | "q" => CommandResult::Exit,

        "model" | "models" => ModelCommand::execute(args, &ctx.state.model(), ctx.catalog),

        "system" | "sysprompt" => SystemCommand::execute(args, &ctx.state.system_prompt()),

        "show" => ShowCommand::execute(ctx),

        "config" | "settings" | "cfg" => ConfigCommand::execute(ctx),

        "clear" | "cls" => CommandResult::ClearScreen,

        "reset" => CommandResult::ResetHistory,

        "history" | "hist" => HistoryCommand::execute(ctx.history),

        "copy" | "cp" => CommandResult::CopyLastResponse,

        "version" | "v" => CommandResult::Message(version_message()),

        "stats" => CommandResult::ShowStats,

        _ => CommandResult::Unknown(command),
    })
}

pub fn help_message() -> String {
    r#"Available commands:
  /help, /h, /?            Show this help message
  /model, /models [n|name] List models or switch by number or name
  /system, /sysprompt [..] Show or set the system prompt
  /show                    Show current model and system prompt
  /config, /settings, /cfg Show all settings
  /history, /hist          Show conversation history stats
  /reset                   Clear conversation history
  /clear, /cls             Clear the screen
  /copy, /cp               Copy the last response to the clipboard
  /stats                   Show usage statistics
  /version, /v             Show version information
  /quit, /exit, /q         Exit tchat

Images:
  Mention an image path or URL in your message (png, jpg, jpeg, webp, gif, bmp)
  and it is attached to the request.

Examples:
  /model 2                 Switch to the second listed model
  /model llava             Switch to the first model matching "llava"
  what is in ~/shot.png?   Ask about a local image
  Press Ctrl-C during a reply to stop it"#
        .to_string()
}
