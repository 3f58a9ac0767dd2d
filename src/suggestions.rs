//! Canned follow-up questions fetched from the backend.
//!
//! Suggestions are auxiliary: a failed fetch keeps whatever is already
//! displayed and is logged, never surfaced in the conversation area.

use crate::error::ApiError;
use tracing::warn;

#[derive(Default)]
pub struct SuggestionProvider {
    items: Vec<String>,
}

impl SuggestionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Apply a fetch result. The list is replaced wholesale on success,
    /// never merged; failure leaves the previous list in place.
    pub fn apply_fetch(&mut self, result: Result<Vec<String>, ApiError>) {
        match result {
            Ok(items) => self.items = items,
            Err(err) => warn!(target: "counsel::suggestions", %err, "suggestion fetch failed"),
        }
    }

    /// Text of the suggestion at `index`, to be copied into the pending
    /// input without submitting.
    pub fn select(&self, index: usize) -> Option<&str> {
        self.items.get(index).map(String::as_str)
    }
}
