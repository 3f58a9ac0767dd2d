//! Terminal UI components for the counsel chat client

pub mod app;
pub mod commands;
pub mod composer;
pub mod transcript;

pub use app::ChatApp;
pub use commands::{SlashCommand, get_help_text};
pub use composer::Composer;
pub use transcript::TranscriptView;
