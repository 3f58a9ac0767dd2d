use std::str::FromStr;

use strum::{AsRefStr, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Commands that can be invoked by starting a message with a leading slash.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, AsRefStr, IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum SlashCommand {
    /// Reset the session and start over
    Reset,
    /// Forward the conversation to a human expert
    Expert,
    /// Download the conversation transcript
    Export,
    /// Show help
    Help,
    /// Exit the application
    Bye,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandEntry {
    pub command: SlashCommand,
    pub keyword: &'static str,
    pub description: &'static str,
}

pub fn command_entries() -> Vec<CommandEntry> {
    SlashCommand::iter()
        .map(|command| CommandEntry {
            command,
            keyword: command.keyword(),
            description: command.description(),
        })
        .collect()
}

impl SlashCommand {
    /// User-visible description shown in help.
    pub fn description(self) -> &'static str {
        match self {
            SlashCommand::Reset => "reset the session and start a fresh conversation",
            SlashCommand::Expert => "send your conversation to a human expert for review",
            SlashCommand::Export => "download the conversation transcript",
            SlashCommand::Help => "show available commands",
            SlashCommand::Bye => "exit the application",
        }
    }

    /// Command string without the leading '/'.
    pub fn keyword(self) -> &'static str {
        self.into()
    }
}

/// Parse a slash command from user input
pub fn parse_slash_command(input: &str) -> Option<SlashCommand> {
    if !input.starts_with('/') {
        return None;
    }

    let head = input[1..].split_whitespace().next()?;

    SlashCommand::from_str(head)
        .ok()
        .or_else(|| match head.to_lowercase().as_str() {
            "q" | "quit" | "exit" => Some(SlashCommand::Bye),
            "clear" | "restart" => Some(SlashCommand::Reset),
            "pdf" | "download" => Some(SlashCommand::Export),
            "h" => Some(SlashCommand::Help),
            _ => None,
        })
}

/// Get help text for all available commands
pub fn get_help_text() -> String {
    let mut help = String::from("Available commands:\n\n");
    for entry in command_entries() {
        help.push_str(&format!("/{} - {}\n", entry.keyword, entry.description));
    }

    help.push_str("\nAliases: /q for /bye, /clear for /reset, /pdf for /export, /h for /help");
    help.push_str("\nWith an empty input line, Enter toggles voice capture when a transcriber is configured.");

    help
}
