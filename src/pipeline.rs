//! Turns user actions into network round trips with a visible loading state
//! and a guaranteed terminal conversation message.
//!
//! Each action runs in two halves on either side of an await point. The
//! synchronous half validates input and appends the user/loading messages, so
//! the renderer never sees a half-applied transition. The spawned half issues
//! the call and delivers a [`PipelineEvent`] over the channel; the UI loop
//! feeds it back through [`RequestPipeline::apply`], which resolves the
//! placeholder. There is no in-flight lock: a rapid double submit is allowed,
//! and each invocation's own steps stay ordered.

use crate::api::{Backend, Polarity, TranscriptPayload};
use crate::error::ApiError;
use crate::events::PipelineEvent;
use crate::markdown;
use crate::store::ConversationStore;
use anyhow::Context;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Placeholder text while an answer is pending.
pub const THINKING_SENTINEL: &str = "Thinking...";
/// Placeholder text while the expert hand-off is pending.
pub const EXPERT_SENTINEL: &str = "Forwarding your request to an expert for review...";
/// Placeholder text while the transcript download is pending.
pub const TRANSCRIPT_SENTINEL: &str = "Preparing your transcript...";

/// Terminal text for any failed ask/expert round trip.
pub const ASK_ERROR_TEXT: &str = "Error fetching response!";
/// Terminal text when the transcript could not be fetched or saved.
pub const TRANSCRIPT_ERROR_TEXT: &str = "An error occurred while downloading the PDF.";
/// Terminal text after the transcript landed on disk.
pub const TRANSCRIPT_SAVED_TEXT: &str = "PDF downloaded successfully!";

pub const TRANSCRIPT_FILE_NAME: &str = "conversation.pdf";

/// How a transcript download ended on the success path.
#[derive(Debug)]
pub enum TranscriptOutcome {
    /// Binary document written to disk.
    Saved(PathBuf),
    /// The server answered with a JSON report instead of a document.
    Report(String),
}

/// Client-side record of which polarity is active per answer, so an
/// already-selected thumb click never produces a second call.
#[derive(Default)]
pub struct FeedbackTracker {
    selected: HashMap<u64, Polarity>,
}

impl FeedbackTracker {
    /// Record a click. Returns false when this polarity is already active
    /// for the message, meaning no call should be sent.
    pub fn select(&mut self, id: u64, polarity: Polarity) -> bool {
        if self.selected.get(&id) == Some(&polarity) {
            return false;
        }
        self.selected.insert(id, polarity);
        true
    }

    pub fn selected(&self, id: u64) -> Option<Polarity> {
        self.selected.get(&id).copied()
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }
}

/// Issues one network call per user action and resolves its placeholder.
pub struct RequestPipeline {
    backend: Arc<dyn Backend>,
    events: mpsc::UnboundedSender<PipelineEvent>,
    download_dir: PathBuf,
    feedback: FeedbackTracker,
}

impl RequestPipeline {
    pub fn new(
        backend: Arc<dyn Backend>,
        events: mpsc::UnboundedSender<PipelineEvent>,
        download_dir: PathBuf,
    ) -> Self {
        Self {
            backend,
            events,
            download_dir,
            feedback: FeedbackTracker::default(),
        }
    }

    /// Submit a question. Empty input is rejected silently before any state
    /// mutation. Returns whether a request was issued.
    pub fn submit_question(&self, store: &mut ConversationStore, text: &str) -> bool {
        let question = text.trim();
        if question.is_empty() {
            return false;
        }

        store.append_user(question.to_string());
        store.append_loading(THINKING_SENTINEL);

        let backend = Arc::clone(&self.backend);
        let events = self.events.clone();
        let question = question.to_string();
        tokio::spawn(async move {
            let result = backend.ask(&question).await;
            let _ = events.send(PipelineEvent::AnswerArrived(result));
        });
        true
    }

    /// Forward the conversation to an expert. No input precondition.
    pub fn ask_expert(&self, store: &mut ConversationStore) {
        store.append_loading(EXPERT_SENTINEL);

        let backend = Arc::clone(&self.backend);
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = backend.ask_expert().await;
            let _ = events.send(PipelineEvent::ExpertReplied(result));
        });
    }

    /// Reset the server session. Local state is cleared only once the call
    /// resolves, inside [`RequestPipeline::apply`].
    pub fn reset_session(&self) {
        let backend = Arc::clone(&self.backend);
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = backend.reset_session().await;
            let _ = events.send(PipelineEvent::SessionCleared(result));
        });
    }

    /// Refresh the suggestion list.
    pub fn fetch_suggestions(&self) {
        let backend = Arc::clone(&self.backend);
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = backend.suggestions().await;
            let _ = events.send(PipelineEvent::SuggestionsFetched(result));
        });
    }

    /// Send a feedback signal, fire-and-forget. An already-selected polarity
    /// is a no-op. Returns whether a call was issued.
    pub fn send_feedback(&mut self, id: u64, doc_id: &str, polarity: Polarity) -> bool {
        if !self.feedback.select(id, polarity) {
            return false;
        }

        let backend = Arc::clone(&self.backend);
        let events = self.events.clone();
        let doc_id = doc_id.to_string();
        tokio::spawn(async move {
            let result = backend.feedback(&doc_id, polarity).await;
            let _ = events.send(PipelineEvent::FeedbackAcked { doc_id, result });
        });
        true
    }

    /// Which polarity is visually active for an answer, if any.
    pub fn feedback_selected(&self, id: u64) -> Option<Polarity> {
        self.feedback.selected(id)
    }

    /// Fetch the transcript and materialize a binary body onto disk.
    pub fn download_transcript(&self, store: &mut ConversationStore) {
        store.append_loading(TRANSCRIPT_SENTINEL);

        let backend = Arc::clone(&self.backend);
        let events = self.events.clone();
        let target = self.download_dir.join(TRANSCRIPT_FILE_NAME);
        tokio::spawn(async move {
            let result = fetch_transcript(backend, target).await;
            let _ = events.send(PipelineEvent::TranscriptFinished(result));
        });
    }

    /// Apply a completion to the store: the terminal half of each protocol.
    /// Whatever arrives, the loading placeholder never outlives this call.
    pub fn apply(&mut self, store: &mut ConversationStore, event: PipelineEvent) {
        match event {
            PipelineEvent::AnswerArrived(Ok(response)) => {
                let content = markdown::render(&response.answer);
                store.replace_loading(content, response.doc_id);
            }
            PipelineEvent::AnswerArrived(Err(err)) => {
                log_api_error("ask", &err);
                store.replace_loading(ASK_ERROR_TEXT.to_string(), None);
            }
            PipelineEvent::ExpertReplied(Ok(message)) => {
                store.replace_loading(message, None);
            }
            PipelineEvent::ExpertReplied(Err(err)) => {
                log_api_error("ask-expert", &err);
                store.replace_loading(ASK_ERROR_TEXT.to_string(), None);
            }
            PipelineEvent::SessionCleared(Ok(())) => {
                store.reset();
                self.feedback.clear();
                self.fetch_suggestions();
            }
            PipelineEvent::SessionCleared(Err(err)) => {
                // Server-side reset failed; keep local state as-is.
                log_api_error("reset-session", &err);
            }
            PipelineEvent::TranscriptFinished(Ok(TranscriptOutcome::Saved(path))) => {
                info!(path = %path.display(), "transcript saved");
                store.replace_loading(TRANSCRIPT_SAVED_TEXT.to_string(), None);
            }
            PipelineEvent::TranscriptFinished(Ok(TranscriptOutcome::Report(message))) => {
                store.replace_loading(message, None);
            }
            PipelineEvent::TranscriptFinished(Err(err)) => {
                error!(error = %err, "transcript download failed");
                store.replace_loading(TRANSCRIPT_ERROR_TEXT.to_string(), None);
            }
            PipelineEvent::FeedbackAcked { doc_id, result } => match result {
                Ok(message) => debug!(doc_id, message, "feedback acknowledged"),
                Err(err) => log_api_error("feedback", &err),
            },
            // Suggestion and capture completions belong to their own
            // components; the UI loop routes them before reaching here.
            PipelineEvent::SuggestionsFetched(_) | PipelineEvent::CaptureFinished(_) => {}
        }
    }
}

async fn fetch_transcript(
    backend: Arc<dyn Backend>,
    target: PathBuf,
) -> anyhow::Result<TranscriptOutcome> {
    match backend.download_transcript().await? {
        TranscriptPayload::Report(message) => Ok(TranscriptOutcome::Report(message)),
        TranscriptPayload::Document(bytes) => {
            tokio::fs::write(&target, bytes)
                .await
                .with_context(|| format!("Failed to write transcript to {}", target.display()))?;
            Ok(TranscriptOutcome::Saved(target))
        }
    }
}

fn log_api_error(call: &str, err: &ApiError) {
    match err {
        ApiError::Network(message) => {
            warn!(target: "counsel::net", call, message, "request failed")
        }
        ApiError::Protocol(message) => {
            error!(target: "counsel::protocol", call, message, "malformed response")
        }
        ApiError::Server { status, message } => {
            warn!(target: "counsel::server", call, status, message, "server rejected call")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::AskResponse;
    use crate::store::{Sender, WELCOME_TEXT};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Scripted in-memory backend recording every call it receives.
    #[derive(Default)]
    struct FakeBackend {
        calls: Mutex<Vec<String>>,
        fail_ask: bool,
        answer: Option<AskResponse>,
        transcript: Mutex<Option<TranscriptPayload>>,
        suggestions: Vec<String>,
    }

    impl FakeBackend {
        fn record(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Backend for FakeBackend {
        async fn ask(&self, question: &str) -> Result<AskResponse, ApiError> {
            self.record(format!("ask:{question}"));
            if self.fail_ask {
                return Err(ApiError::network("connection refused"));
            }
            Ok(self.answer.clone().unwrap_or(AskResponse {
                answer: "ok".to_string(),
                doc_id: None,
            }))
        }

        async fn reset_session(&self) -> Result<(), ApiError> {
            self.record("reset");
            Ok(())
        }

        async fn ask_expert(&self) -> Result<String, ApiError> {
            self.record("expert");
            Ok("An expert will reach out.".to_string())
        }

        async fn suggestions(&self) -> Result<Vec<String>, ApiError> {
            self.record("suggestions");
            Ok(self.suggestions.clone())
        }

        async fn feedback(&self, doc_id: &str, polarity: Polarity) -> Result<String, ApiError> {
            self.record(format!("feedback:{doc_id}:{}", polarity.as_str()));
            Ok("Feedback updated successfully.".to_string())
        }

        async fn download_transcript(&self) -> Result<TranscriptPayload, ApiError> {
            self.record("download");
            self.transcript
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| ApiError::network("no transcript scripted"))
        }
    }

    struct Harness {
        pipeline: RequestPipeline,
        store: ConversationStore,
        events: mpsc::UnboundedReceiver<PipelineEvent>,
        backend: Arc<FakeBackend>,
    }

    fn harness(backend: FakeBackend) -> Harness {
        let backend = Arc::new(backend);
        let (tx, rx) = mpsc::unbounded_channel();
        let download_dir = std::env::temp_dir();
        Harness {
            pipeline: RequestPipeline::new(backend.clone(), tx, download_dir),
            store: ConversationStore::new(),
            events: rx,
            backend,
        }
    }

    impl Harness {
        /// Wait for the next completion and apply it to the store.
        async fn settle(&mut self) {
            let event = self.events.recv().await.expect("pipeline event");
            self.pipeline.apply(&mut self.store, event);
        }
    }

    #[tokio::test]
    async fn successful_ask_renders_markdown_and_carries_doc_id() {
        let mut h = harness(FakeBackend {
            answer: Some(AskResponse {
                answer: "# Hi".to_string(),
                doc_id: Some("d1".to_string()),
            }),
            ..FakeBackend::default()
        });

        assert!(h.pipeline.submit_question(&mut h.store, "  what is margin?  "));
        assert!(h.store.has_loading());
        h.settle().await;

        let last = h.store.newest().unwrap();
        assert_eq!(last.sender, Sender::Assistant);
        assert_eq!(last.content, markdown::render("# Hi"));
        assert_eq!(last.doc_id.as_deref(), Some("d1"));
        assert!(!h.store.has_loading());
        // Trimmed question went over the wire.
        assert_eq!(h.backend.calls(), vec!["ask:what is margin?"]);
    }

    #[tokio::test]
    async fn failed_ask_resolves_to_exactly_one_error_message() {
        let mut h = harness(FakeBackend {
            fail_ask: true,
            ..FakeBackend::default()
        });

        h.pipeline.submit_question(&mut h.store, "question");
        h.settle().await;

        assert!(!h.store.has_loading());
        let errors: Vec<_> = h
            .store
            .messages()
            .iter()
            .filter(|m| m.content == ASK_ERROR_TEXT)
            .collect();
        assert_eq!(errors.len(), 1);
    }

    #[tokio::test]
    async fn blank_input_is_rejected_before_any_state_mutation() {
        let mut h = harness(FakeBackend::default());
        assert!(!h.pipeline.submit_question(&mut h.store, "   "));
        assert_eq!(h.store.messages().len(), 1);
        assert!(h.backend.calls().is_empty());
    }

    #[tokio::test]
    async fn double_submit_keeps_a_single_placeholder() {
        let mut h = harness(FakeBackend::default());
        h.pipeline.submit_question(&mut h.store, "first");
        h.pipeline.submit_question(&mut h.store, "second");
        let loading = h.store.messages().iter().filter(|m| m.is_loading).count();
        assert_eq!(loading, 1);

        // Both completions still land as terminal messages.
        h.settle().await;
        h.settle().await;
        assert!(!h.store.has_loading());
    }

    #[tokio::test]
    async fn expert_flow_resolves_placeholder_with_server_message() {
        let mut h = harness(FakeBackend::default());
        h.pipeline.ask_expert(&mut h.store);
        assert_eq!(h.store.newest().unwrap().content, EXPERT_SENTINEL);
        h.settle().await;
        assert_eq!(h.store.newest().unwrap().content, "An expert will reach out.");
        assert!(!h.store.has_loading());
    }

    #[tokio::test]
    async fn repeated_polarity_sends_one_call_switch_sends_two() {
        let mut h = harness(FakeBackend::default());

        assert!(h.pipeline.send_feedback(3, "d1", Polarity::Positive));
        assert!(!h.pipeline.send_feedback(3, "d1", Polarity::Positive));
        assert_eq!(h.pipeline.feedback_selected(3), Some(Polarity::Positive));

        assert!(h.pipeline.send_feedback(3, "d1", Polarity::Negative));
        assert_eq!(h.pipeline.feedback_selected(3), Some(Polarity::Negative));

        // Let both spawned calls land before counting.
        h.events.recv().await.unwrap();
        h.events.recv().await.unwrap();
        assert_eq!(
            h.backend.calls(),
            vec!["feedback:d1:positive", "feedback:d1:negative"]
        );
    }

    #[tokio::test]
    async fn reset_clears_store_and_refetches_suggestions() {
        let mut h = harness(FakeBackend {
            suggestions: vec!["What is a stop order?".to_string()],
            ..FakeBackend::default()
        });
        h.pipeline.submit_question(&mut h.store, "question");
        h.settle().await;
        h.pipeline.send_feedback(2, "d1", Polarity::Positive);
        h.events.recv().await.unwrap();

        h.pipeline.reset_session();
        h.settle().await;

        assert_eq!(h.store.messages().len(), 1);
        assert_eq!(h.store.messages()[0].content, WELCOME_TEXT);
        assert!(h.pipeline.feedback_selected(2).is_none());

        // The follow-up suggestion fetch was issued.
        match h.events.recv().await.unwrap() {
            PipelineEvent::SuggestionsFetched(Ok(items)) => {
                assert_eq!(items, vec!["What is a stop order?".to_string()]);
            }
            other => panic!("expected suggestions, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn transcript_report_is_shown_in_conversation() {
        let mut h = harness(FakeBackend {
            transcript: Mutex::new(Some(TranscriptPayload::Report(
                "Nothing to export yet.".to_string(),
            ))),
            ..FakeBackend::default()
        });

        h.pipeline.download_transcript(&mut h.store);
        h.settle().await;
        assert_eq!(h.store.newest().unwrap().content, "Nothing to export yet.");
        assert!(!h.store.has_loading());
    }

    #[tokio::test]
    async fn transcript_document_is_written_to_disk_and_confirmed() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(FakeBackend {
            transcript: Mutex::new(Some(TranscriptPayload::Document(vec![0x25, 0x50, 0x44, 0x46]))),
            ..FakeBackend::default()
        });
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut pipeline = RequestPipeline::new(backend, tx, dir.path().to_path_buf());
        let mut store = ConversationStore::new();

        pipeline.download_transcript(&mut store);
        let event = rx.recv().await.unwrap();
        pipeline.apply(&mut store, event);

        assert_eq!(store.newest().unwrap().content, TRANSCRIPT_SAVED_TEXT);
        let saved = std::fs::read(dir.path().join(TRANSCRIPT_FILE_NAME)).unwrap();
        assert_eq!(saved, vec![0x25, 0x50, 0x44, 0x46]);
    }

    #[tokio::test]
    async fn transcript_failure_resolves_with_fixed_error_text() {
        let mut h = harness(FakeBackend::default());
        h.pipeline.download_transcript(&mut h.store);
        h.settle().await;
        assert_eq!(h.store.newest().unwrap().content, TRANSCRIPT_ERROR_TEXT);
        assert!(!h.store.has_loading());
    }
}
