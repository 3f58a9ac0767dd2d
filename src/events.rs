//! Internal application events for coordinating between components.

use crate::api::{AskResponse, Polarity};
use crate::error::ApiError;
use crate::pipeline::TranscriptOutcome;
use crate::voice::CaptureError;

/// Typed commands dispatched by UI affordances.
///
/// Every state transition goes through one of these instead of mutating
/// shared state from event callbacks directly.
#[derive(Debug, Clone)]
pub enum UiCommand {
    /// Submit the pending input as a question
    SubmitQuestion { text: String },

    /// Toggle the bookmark on an assistant answer
    ToggleBookmark { id: u64 },

    /// Send a thumbs judgment for an answer
    SendFeedback { id: u64, polarity: Polarity },

    /// Start a single-shot voice capture
    StartVoiceCapture,

    /// Forward the conversation to a human expert
    AskExpert,

    /// Download the conversation transcript
    DownloadTranscript,

    /// Reset the session on the server, then locally
    ResetSession,

    /// Copy a suggestion into the pending input
    SelectSuggestion { index: usize },

    /// Scroll a bookmarked answer into view and highlight it
    JumpToBookmark { id: u64 },

    /// Leave the application
    Exit,
}

/// Completions delivered back to the UI loop by spawned pipeline tasks.
///
/// Each in-flight action resolves into exactly one of these; the UI loop
/// drains them between frames and applies the terminal state transition.
#[derive(Debug)]
pub enum PipelineEvent {
    AnswerArrived(Result<AskResponse, ApiError>),
    ExpertReplied(Result<String, ApiError>),
    SessionCleared(Result<(), ApiError>),
    SuggestionsFetched(Result<Vec<String>, ApiError>),
    FeedbackAcked {
        doc_id: String,
        result: Result<String, ApiError>,
    },
    TranscriptFinished(Result<TranscriptOutcome, anyhow::Error>),
    CaptureFinished(Result<String, CaptureError>),
}
