//! Conversation transcript surface.
//!
//! A pure projection of the store into terminal lines, plus the small bits of
//! transient view state the renderer owns itself: the message selection, a
//! pending jump target, and a highlight that clears itself two seconds after
//! a bookmark jump.

use crate::api::Polarity;
use crate::store::{ConversationStore, Message, Sender};
use crate::{format, store};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};
use std::time::{Duration, Instant};

/// How long a jumped-to message stays highlighted.
pub const HIGHLIGHT_DURATION: Duration = Duration::from_secs(2);

/// Transient view state over the conversation log.
pub struct TranscriptView {
    selected: Option<u64>,
    highlight: Option<(u64, Instant)>,
    jump_target: Option<u64>,
    has_focus: bool,
}

impl Default for TranscriptView {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscriptView {
    pub fn new() -> Self {
        Self {
            selected: None,
            highlight: None,
            jump_target: None,
            has_focus: false,
        }
    }

    pub fn selected(&self) -> Option<u64> {
        self.selected
    }

    pub fn set_focus(&mut self, has_focus: bool) {
        self.has_focus = has_focus;
    }

    /// Move the selection one message up, starting from the newest.
    pub fn select_prev(&mut self, store: &ConversationStore) {
        let ids: Vec<u64> = store.messages().iter().map(|m| m.id).collect();
        if ids.is_empty() {
            return;
        }
        self.selected = match self.selected.and_then(|s| ids.iter().position(|&id| id == s)) {
            Some(0) => Some(ids[0]),
            Some(index) => Some(ids[index - 1]),
            None => ids.last().copied(),
        };
    }

    /// Move the selection one message down.
    pub fn select_next(&mut self, store: &ConversationStore) {
        let ids: Vec<u64> = store.messages().iter().map(|m| m.id).collect();
        if ids.is_empty() {
            return;
        }
        self.selected = match self.selected.and_then(|s| ids.iter().position(|&id| id == s)) {
            Some(index) if index + 1 < ids.len() => Some(ids[index + 1]),
            Some(index) => Some(ids[index]),
            None => ids.last().copied(),
        };
    }

    /// Scroll a message into view and highlight it. The highlight clears
    /// itself after [`HIGHLIGHT_DURATION`].
    pub fn jump_to(&mut self, id: u64) {
        self.jump_target = Some(id);
        self.selected = Some(id);
        self.highlight = Some((id, Instant::now()));
    }

    /// Re-anchor the view to the newest message; called after every
    /// append/replace so the conversation surface stays pinned to the bottom.
    pub fn follow_newest(&mut self) {
        self.jump_target = None;
        self.selected = None;
    }

    /// Advance time-driven state; called once per frame.
    pub fn tick(&mut self) {
        self.expire(Instant::now());
    }

    fn expire(&mut self, now: Instant) {
        if let Some((_, since)) = self.highlight {
            if now.duration_since(since) >= HIGHLIGHT_DURATION {
                self.highlight = None;
                self.jump_target = None;
            }
        }
    }

    pub fn highlighted(&self) -> Option<u64> {
        self.highlight.map(|(id, _)| id)
    }

    /// Render the transcript. `polarity_of` reports the visually active
    /// thumb for an answer; everything else comes from the store.
    pub fn render(
        &self,
        area: Rect,
        buf: &mut Buffer,
        store: &ConversationStore,
        polarity_of: impl Fn(u64) -> Option<Polarity>,
        show_timestamps: bool,
    ) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title("Conversation")
            .style(if self.has_focus {
                Style::default().fg(Color::Green)
            } else {
                Style::default()
            });
        let inner = block.inner(area);
        block.render(area, buf);

        let width = inner.width.saturating_sub(2) as usize;
        let mut all_lines: Vec<Line> = Vec::new();
        let mut first_line_of_jump: Option<usize> = None;

        for message in store.messages() {
            if Some(message.id) == self.jump_target {
                first_line_of_jump = Some(all_lines.len());
            }
            let mut lines = self.message_lines(
                message,
                store.is_bookmarked(message.id),
                polarity_of(message.id),
                width,
                show_timestamps,
            );
            all_lines.append(&mut lines);
            all_lines.push(Line::from(vec![Span::raw("")]));
        }

        let height = inner.height as usize;
        let total = all_lines.len();
        let start = match first_line_of_jump {
            // Center the jump target rather than pinning to the bottom.
            Some(first) => first
                .saturating_sub(height / 2)
                .min(total.saturating_sub(height)),
            None => total.saturating_sub(height),
        };
        let end = (start + height).min(total);

        for (i, line) in all_lines[start..end].iter().enumerate() {
            buf.set_line(inner.x, inner.y + i as u16, line, inner.width);
        }
    }

    /// Project a single message into lines.
    fn message_lines(
        &self,
        message: &Message,
        bookmarked: bool,
        polarity: Option<Polarity>,
        width: usize,
        show_timestamps: bool,
    ) -> Vec<Line<'static>> {
        let mut lines = Vec::new();

        let icon = match message.sender {
            Sender::User => "👤",
            Sender::Assistant => "💬",
        };

        let mut header_spans = vec![Span::styled(
            format!("{} {} ", icon, "─".repeat(16)),
            Style::default().fg(Color::DarkGray),
        )];
        if show_timestamps && !message.is_loading {
            header_spans.push(Span::styled(
                format::format_time(message.timestamp),
                Style::default().fg(Color::DarkGray),
            ));
        }
        if bookmarked {
            header_spans.push(Span::styled(" ★", Style::default().fg(Color::Yellow)));
        }
        match polarity {
            Some(Polarity::Positive) => {
                header_spans.push(Span::styled(" 👍", Style::default()));
            }
            Some(Polarity::Negative) => {
                header_spans.push(Span::styled(" 👎", Style::default()));
            }
            None => {}
        }
        if self.selected == Some(message.id) && self.has_focus {
            header_spans.push(Span::styled(
                " ◀",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ));
        }
        lines.push(Line::from(header_spans));

        let content = if message.is_loading {
            format!("{}{}", message.content.trim_end_matches('.'), loading_dots())
        } else {
            message.content.clone()
        };

        let style = self.content_style(message);
        for raw_line in content.split('\n') {
            for wrapped in wrap_text(raw_line, width) {
                lines.push(Line::from(vec![Span::raw("  "), Span::styled(wrapped, style)]));
            }
        }

        lines
    }

    fn content_style(&self, message: &Message) -> Style {
        if self.highlighted() == Some(message.id) {
            return Style::default()
                .fg(Color::Black)
                .bg(Color::Yellow)
                .add_modifier(Modifier::BOLD);
        }
        if message.is_loading {
            return Style::default().fg(Color::DarkGray);
        }
        match message.sender {
            Sender::User => Style::default().fg(Color::Blue),
            Sender::Assistant => Style::default().fg(Color::Green),
        }
    }
}

/// Animated ellipsis for the loading placeholder.
fn loading_dots() -> &'static str {
    match (std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        / 300)
        % 4
    {
        0 => ".",
        1 => "..",
        2 => "...",
        _ => "   ",
    }
}

/// Wrap text to fit within the given width.
fn wrap_text(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    let mut current_line = String::new();

    for word in text.split_whitespace() {
        if current_line.len() + word.len() + 1 <= width {
            if !current_line.is_empty() {
                current_line.push(' ');
            }
            current_line.push_str(word);
        } else {
            if !current_line.is_empty() {
                lines.push(current_line);
                current_line = String::new();
            }
            current_line.push_str(word);
        }
    }

    if !current_line.is_empty() {
        lines.push(current_line);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }

    lines
}

/// First line of a bookmarked answer, for the side pane cards.
pub fn bookmark_preview(entry: &store::BookmarkEntry) -> String {
    entry.content.lines().next().unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_walks_from_the_newest_message() {
        let mut store = ConversationStore::new();
        store.append_user("one".into());
        store.append_assistant("two".into(), None);

        let mut view = TranscriptView::new();
        view.select_prev(&store);
        assert_eq!(view.selected(), Some(2));
        view.select_prev(&store);
        assert_eq!(view.selected(), Some(1));
        view.select_next(&store);
        assert_eq!(view.selected(), Some(2));
        view.select_next(&store);
        assert_eq!(view.selected(), Some(2));
    }

    #[test]
    fn jump_sets_highlight_and_follow_clears_it() {
        let mut view = TranscriptView::new();
        view.jump_to(3);
        assert_eq!(view.highlighted(), Some(3));
        assert_eq!(view.selected(), Some(3));

        view.follow_newest();
        assert_eq!(view.selected(), None);
        // The highlight itself only expires on its timer.
        assert_eq!(view.highlighted(), Some(3));
    }

    #[test]
    fn highlight_expires_after_its_duration() {
        let mut view = TranscriptView::new();
        view.jump_to(7);

        let later = Instant::now() + HIGHLIGHT_DURATION + Duration::from_millis(10);
        view.expire(later);
        assert_eq!(view.highlighted(), None);
    }

    #[test]
    fn wrap_text_respects_width() {
        let wrapped = wrap_text("alpha beta gamma delta", 11);
        assert_eq!(wrapped, vec!["alpha beta", "gamma delta"]);
    }

    #[test]
    fn bookmark_preview_is_the_first_line() {
        let entry = store::BookmarkEntry {
            id: 1,
            content: "headline\nrest of the answer".into(),
            timestamp: chrono::Utc::now(),
        };
        assert_eq!(bookmark_preview(&entry), "headline");
    }
}
