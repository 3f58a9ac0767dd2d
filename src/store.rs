//! Ordered conversation log plus the bookmark set.
//!
//! The store is the single source of truth for what the transcript renders.
//! It is only ever touched from the UI loop, so every operation is atomic
//! from the renderer's point of view.

use chrono::{DateTime, Utc};

/// Greeting seeded at startup and after every reset, always under id 0.
pub const WELCOME_TEXT: &str = "Welcome! How can I help you today?";

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Assistant,
}

/// A single entry in the conversation log.
///
/// Messages are immutable once appended. The only lifecycle transition is
/// loading -> terminal, which removes the loading entry and appends its
/// replacement under a fresh id.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: u64,
    pub content: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
    pub is_loading: bool,
    pub doc_id: Option<String>,
}

impl Message {
    /// Whether this message can carry bookmark and feedback affordances.
    pub fn is_terminal_answer(&self) -> bool {
        self.sender == Sender::Assistant && !self.is_loading
    }
}

/// A bookmarked assistant answer, kept in a side list for quick navigation.
#[derive(Debug, Clone)]
pub struct BookmarkEntry {
    pub id: u64,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Ordered log of messages and the bookmark set derived from it.
pub struct ConversationStore {
    messages: Vec<Message>,
    bookmarks: Vec<BookmarkEntry>,
    next_id: u64,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationStore {
    /// Create a store seeded with the welcome message.
    pub fn new() -> Self {
        let mut store = Self {
            messages: Vec::new(),
            bookmarks: Vec::new(),
            next_id: 1,
        };
        store.seed_welcome();
        store
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn bookmarks(&self) -> &[BookmarkEntry] {
        &self.bookmarks
    }

    pub fn message(&self, id: u64) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn newest(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn has_loading(&self) -> bool {
        self.messages.iter().any(|m| m.is_loading)
    }

    /// Append a user question and return its id.
    pub fn append_user(&mut self, content: String) -> u64 {
        self.push(content, Sender::User, false, None)
    }

    /// Append a terminal assistant answer and return its id.
    pub fn append_assistant(&mut self, content: String, doc_id: Option<String>) -> u64 {
        self.push(content, Sender::Assistant, false, doc_id)
    }

    /// Append the loading placeholder for an in-flight request.
    ///
    /// At most one placeholder exists at any instant: an earlier one still
    /// pending (rapid double submit) is dropped in favor of the new one. Its
    /// request keeps running and resolves through `replace_loading`, which
    /// tolerates the placeholder already being gone.
    pub fn append_loading(&mut self, sentinel: &str) -> u64 {
        self.messages.retain(|m| !m.is_loading);
        self.push(sentinel.to_string(), Sender::Assistant, true, None)
    }

    /// Resolve the pending placeholder into a terminal assistant message.
    ///
    /// Removing the placeholder is a silent no-op when none exists; the
    /// terminal message is appended either way so no completion is lost.
    pub fn replace_loading(&mut self, content: String, doc_id: Option<String>) -> u64 {
        self.messages.retain(|m| !m.is_loading);
        self.append_assistant(content, doc_id)
    }

    /// Bookmark an assistant answer. Idempotent; refuses user-authored and
    /// loading messages. Returns whether an entry was added.
    pub fn bookmark(&mut self, id: u64) -> bool {
        if self.is_bookmarked(id) {
            return false;
        }
        let Some(message) = self.message(id) else {
            return false;
        };
        if !message.is_terminal_answer() {
            return false;
        }
        self.bookmarks.push(BookmarkEntry {
            id,
            content: message.content.clone(),
            timestamp: message.timestamp,
        });
        true
    }

    /// Remove a bookmark. No-op when the id is not bookmarked.
    pub fn unbookmark(&mut self, id: u64) -> bool {
        let before = self.bookmarks.len();
        self.bookmarks.retain(|b| b.id != id);
        self.bookmarks.len() != before
    }

    pub fn is_bookmarked(&self, id: u64) -> bool {
        self.bookmarks.iter().any(|b| b.id == id)
    }

    /// Clear messages and bookmarks atomically, then re-seed the welcome
    /// message. Ids restart from 1.
    pub fn reset(&mut self) {
        self.messages.clear();
        self.bookmarks.clear();
        self.next_id = 1;
        self.seed_welcome();
    }

    fn seed_welcome(&mut self) {
        self.messages.push(Message {
            id: 0,
            content: WELCOME_TEXT.to_string(),
            sender: Sender::Assistant,
            timestamp: Utc::now(),
            is_loading: false,
            doc_id: None,
        });
    }

    fn push(&mut self, content: String, sender: Sender, is_loading: bool, doc_id: Option<String>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.messages.push(Message {
            id,
            content,
            sender,
            timestamp: Utc::now(),
            is_loading,
            doc_id,
        });
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn loading_count(store: &ConversationStore) -> usize {
        store.messages().iter().filter(|m| m.is_loading).count()
    }

    #[test]
    fn new_store_holds_only_the_welcome_message() {
        let store = ConversationStore::new();
        assert_eq!(store.messages().len(), 1);
        assert_eq!(store.messages()[0].id, 0);
        assert_eq!(store.messages()[0].content, WELCOME_TEXT);
        assert!(store.bookmarks().is_empty());
    }

    #[test]
    fn appended_ids_are_monotonic_and_one_based() {
        let mut store = ConversationStore::new();
        let first = store.append_user("hello".into());
        let second = store.append_assistant("hi".into(), None);
        assert_eq!(first, 1);
        assert_eq!(second, 2);
    }

    #[test]
    fn double_loading_append_keeps_a_single_placeholder() {
        let mut store = ConversationStore::new();
        store.append_loading("Thinking...");
        store.append_loading("Thinking...");
        assert_eq!(loading_count(&store), 1);
    }

    #[test]
    fn replace_loading_resolves_the_placeholder() {
        let mut store = ConversationStore::new();
        let placeholder = store.append_loading("Thinking...");
        let terminal = store.replace_loading("answer".into(), Some("d1".into()));
        assert!(!store.has_loading());
        assert_ne!(placeholder, terminal);
        let message = store.message(terminal).unwrap();
        assert_eq!(message.doc_id.as_deref(), Some("d1"));
    }

    #[test]
    fn replace_loading_without_placeholder_still_appends() {
        let mut store = ConversationStore::new();
        store.replace_loading("late answer".into(), None);
        assert_eq!(store.messages().len(), 2);
        assert!(!store.has_loading());
    }

    #[test]
    fn bookmarking_twice_yields_one_entry() {
        let mut store = ConversationStore::new();
        let id = store.append_assistant("answer".into(), None);
        assert!(store.bookmark(id));
        assert!(!store.bookmark(id));
        assert_eq!(store.bookmarks().len(), 1);
    }

    #[test]
    fn bookmark_rejects_user_and_loading_messages() {
        let mut store = ConversationStore::new();
        let user = store.append_user("question".into());
        let loading = store.append_loading("Thinking...");
        assert!(!store.bookmark(user));
        assert!(!store.bookmark(loading));
        assert!(store.bookmarks().is_empty());
    }

    #[test]
    fn unbookmarking_an_absent_id_is_a_no_op() {
        let mut store = ConversationStore::new();
        assert!(!store.unbookmark(42));
        let id = store.append_assistant("answer".into(), None);
        store.bookmark(id);
        assert!(store.unbookmark(id));
        assert!(store.bookmarks().is_empty());
    }

    #[test]
    fn reset_leaves_exactly_the_welcome_message() {
        let mut store = ConversationStore::new();
        store.append_user("question".into());
        let id = store.append_assistant("answer".into(), None);
        store.bookmark(id);
        store.reset();
        assert_eq!(store.messages().len(), 1);
        assert_eq!(store.messages()[0].id, 0);
        assert!(store.bookmarks().is_empty());
        assert_eq!(store.append_user("again".into()), 1);
    }

    #[derive(Debug, Clone)]
    enum Op {
        User(String),
        Loading,
        Replace(String),
        Bookmark(u64),
        Unbookmark(u64),
        Reset,
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            "[a-z ]{1,12}".prop_map(Op::User),
            Just(Op::Loading),
            "[a-z ]{1,12}".prop_map(Op::Replace),
            (0u64..20).prop_map(Op::Bookmark),
            (0u64..20).prop_map(Op::Unbookmark),
            Just(Op::Reset),
        ]
    }

    proptest! {
        #[test]
        fn at_most_one_loading_message_ever(ops in proptest::collection::vec(arb_op(), 0..40)) {
            let mut store = ConversationStore::new();
            for op in ops {
                match op {
                    Op::User(text) => { store.append_user(text); }
                    Op::Loading => { store.append_loading("Thinking..."); }
                    Op::Replace(text) => { store.replace_loading(text, None); }
                    Op::Bookmark(id) => { store.bookmark(id); }
                    Op::Unbookmark(id) => { store.unbookmark(id); }
                    Op::Reset => store.reset(),
                }
                prop_assert!(loading_count(&store) <= 1);

                // Bookmarks stay unique and anchored to terminal answers.
                let mut seen = std::collections::HashSet::new();
                for bookmark in store.bookmarks() {
                    prop_assert!(seen.insert(bookmark.id));
                    let message = store.message(bookmark.id);
                    prop_assert!(message.is_some_and(Message::is_terminal_answer));
                }
            }
        }
    }
}
