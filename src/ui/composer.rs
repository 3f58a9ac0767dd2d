use crate::ui::commands::{CommandEntry, SlashCommand, command_entries, parse_slash_command};
use crate::voice::Affordance;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};
use std::cell::{Cell, RefCell};

/// Result returned when the user interacts with the composer
#[derive(Debug, PartialEq)]
pub enum ComposerResult {
    /// The pending input was submitted as a question
    Submitted(String),
    /// A slash command was entered
    Command(SlashCommand),
    /// Enter on an empty input: the mic/submit control in mic mode
    VoiceToggle,
    None,
}

/// State for the text area within the composer
#[derive(Debug, Clone, Default)]
pub struct TextAreaState {
    pub content: String,
    /// Cursor position in characters, not bytes
    pub cursor: usize,
}

impl TextAreaState {
    fn byte_index(&self) -> usize {
        self.content
            .char_indices()
            .nth(self.cursor)
            .map_or(self.content.len(), |(i, _)| i)
    }

    fn char_count(&self) -> usize {
        self.content.chars().count()
    }
}

/// Single-line question composer with a slash-command palette and a
/// mic/submit affordance hint.
#[derive(Clone)]
pub struct Composer {
    state: RefCell<TextAreaState>,
    placeholder: String,
    has_focus: bool,
    affordance: Affordance,
    command_entries: Vec<CommandEntry>,
    filtered_commands: RefCell<Vec<CommandEntry>>,
    show_command_palette: Cell<bool>,
    selected_command: Cell<Option<usize>>,
}

impl Composer {
    pub fn new(placeholder: String) -> Self {
        Self {
            state: RefCell::new(TextAreaState::default()),
            placeholder,
            has_focus: true,
            affordance: Affordance::Hidden,
            command_entries: command_entries(),
            filtered_commands: RefCell::new(Vec::new()),
            show_command_palette: Cell::new(false),
            selected_command: Cell::new(None),
        }
    }

    /// Handle key input
    pub fn handle_key(&self, key: KeyEvent) -> ComposerResult {
        if key.kind != KeyEventKind::Press {
            return ComposerResult::None;
        }

        let mut state = self.state.borrow_mut();

        match key.code {
            KeyCode::Enter => {
                if self.show_command_palette.get() {
                    if self.apply_selected_command(&mut state) {
                        return ComposerResult::None;
                    }
                } else if state.content.trim().is_empty() {
                    // The same control that submits text starts dictation
                    // while the input is empty.
                    return ComposerResult::VoiceToggle;
                } else {
                    let content = state.content.clone();
                    state.content.clear();
                    state.cursor = 0;
                    self.close_command_palette();
                    drop(state);
                    if let Some(command) = parse_slash_command(&content) {
                        return ComposerResult::Command(command);
                    }
                    return ComposerResult::Submitted(content);
                }
            }
            KeyCode::Up => {
                if self.show_command_palette.get() {
                    self.move_command_selection(-1);
                }
            }
            KeyCode::Down => {
                if self.show_command_palette.get() {
                    self.move_command_selection(1);
                }
            }
            KeyCode::Esc => {
                if self.show_command_palette.get() {
                    self.close_command_palette();
                }
            }
            KeyCode::Tab => {
                if self.show_command_palette.get() {
                    self.apply_selected_command(&mut state);
                }
            }
            KeyCode::Char(c) => {
                self.insert_char(&mut state, c);

                if self.show_command_palette.get() {
                    if state.content.starts_with('/') {
                        if c.is_whitespace() {
                            self.close_command_palette();
                        } else {
                            self.refresh_command_palette(&state);
                        }
                    } else {
                        self.close_command_palette();
                    }
                } else if state.content == "/" {
                    self.open_command_palette(&state);
                }
            }
            KeyCode::Backspace => {
                if self.backspace(&mut state) && self.show_command_palette.get() {
                    if state.content.starts_with('/') {
                        self.refresh_command_palette(&state);
                    } else {
                        self.close_command_palette();
                    }
                }
            }
            KeyCode::Delete => {
                if self.delete(&mut state) && self.show_command_palette.get() {
                    if state.content.starts_with('/') {
                        self.refresh_command_palette(&state);
                    } else {
                        self.close_command_palette();
                    }
                }
            }
            KeyCode::Left => {
                if state.cursor > 0 {
                    state.cursor -= 1;
                }
            }
            KeyCode::Right => {
                if state.cursor < state.char_count() {
                    state.cursor += 1;
                }
            }
            KeyCode::Home => {
                state.cursor = 0;
            }
            KeyCode::End => {
                state.cursor = state.char_count();
            }
            _ => {}
        }

        ComposerResult::None
    }

    fn insert_char(&self, state: &mut TextAreaState, c: char) {
        let at = state.byte_index();
        state.content.insert(at, c);
        state.cursor += 1;
    }

    fn backspace(&self, state: &mut TextAreaState) -> bool {
        if state.cursor > 0 {
            state.cursor -= 1;
            let at = state.byte_index();
            state.content.remove(at);
            true
        } else {
            false
        }
    }

    fn delete(&self, state: &mut TextAreaState) -> bool {
        if state.cursor < state.char_count() {
            let at = state.byte_index();
            state.content.remove(at);
            true
        } else {
            false
        }
    }

    fn open_command_palette(&self, state: &TextAreaState) {
        self.show_command_palette.set(true);
        self.refresh_command_palette(state);
        self.selected_command.set(Some(0));
    }

    fn close_command_palette(&self) {
        self.show_command_palette.set(false);
        self.filtered_commands.borrow_mut().clear();
        self.selected_command.set(None);
    }

    fn refresh_command_palette(&self, state: &TextAreaState) {
        let query = state.content.trim_start_matches('/').to_lowercase();
        let mut filtered = self.filtered_commands.borrow_mut();
        filtered.clear();

        for entry in &self.command_entries {
            if query.is_empty() || entry.keyword.starts_with(&query) {
                filtered.push(*entry);
            }
        }

        if filtered.is_empty() {
            self.selected_command.set(None);
        } else {
            let index = self.selected_command.get().unwrap_or(0);
            self.selected_command.set(Some(index.min(filtered.len() - 1)));
        }
    }

    fn move_command_selection(&self, delta: isize) {
        let filtered = self.filtered_commands.borrow();
        if filtered.is_empty() {
            self.selected_command.set(None);
            return;
        }

        let current = self.selected_command.get().unwrap_or(0) as isize;
        let len = filtered.len() as isize;
        let mut next = current + delta;

        if next < 0 {
            next = len - 1;
        } else if next >= len {
            next = 0;
        }

        self.selected_command.set(Some(next as usize));
    }

    fn apply_selected_command(&self, state: &mut TextAreaState) -> bool {
        let filtered = self.filtered_commands.borrow();
        let Some(index) = self.selected_command.get() else {
            return false;
        };

        if index >= filtered.len() {
            return false;
        }

        let entry = filtered[index];
        state.content = format!("/{}", entry.keyword);
        state.cursor = state.char_count();
        drop(filtered);
        self.close_command_palette();
        true
    }

    /// Set focus state
    pub fn set_focus(&mut self, has_focus: bool) {
        self.has_focus = has_focus;
    }

    /// Update the mic/submit hint shown in the composer frame.
    pub fn set_affordance(&mut self, affordance: Affordance) {
        self.affordance = affordance;
    }

    /// Get current content
    pub fn content(&self) -> String {
        self.state.borrow().content.clone()
    }

    /// Replace the content wholesale, cursor at the end. Used by suggestion
    /// selection and the voice transcript append.
    pub fn replace_content(&self, content: String) {
        let mut state = self.state.borrow_mut();
        state.content = content;
        state.cursor = state.char_count();
        drop(state);
        self.close_command_palette();
    }

    /// Whether the slash-command palette is showing; it owns Tab while open.
    pub fn palette_open(&self) -> bool {
        self.show_command_palette.get()
    }
}

impl Widget for &Composer {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let state = self.state.borrow();

        let hint = match self.affordance {
            Affordance::Submit => " ⏎ send ",
            Affordance::Microphone => " ⏎ speak ",
            Affordance::Recording => " ● recording ",
            Affordance::Hidden => "",
        };

        let block = Block::default()
            .borders(Borders::ALL)
            .title("Ask a question")
            .style(if self.has_focus {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::Gray)
            });

        let inner_area = block.inner(area);
        block.render(area, buf);

        // Mic/submit hint in the bottom-right corner of the frame.
        if !hint.is_empty() && area.height >= 2 {
            let hint_width = hint.chars().count() as u16;
            if area.width > hint_width + 2 {
                let hint_line = Line::from(Span::styled(hint, Style::default().fg(Color::DarkGray)));
                let x = area.x + area.width - hint_width - 2;
                let y = area.y + area.height - 1;
                buf.set_line(x, y, &hint_line, hint_width);
            }
        }

        if state.content.is_empty() {
            let placeholder_line = Line::from(vec![Span::styled(
                self.placeholder.as_str(),
                Style::default().fg(Color::DarkGray),
            )]);
            buf.set_line(inner_area.x, inner_area.y, &placeholder_line, inner_area.width);
        } else {
            let mut content = state.content.clone();
            if self.has_focus {
                let at = state.byte_index().min(content.len());
                content.insert(at, '▌');
            }
            let line = Line::from(vec![Span::raw(content)]);
            buf.set_line(inner_area.x, inner_area.y, &line, inner_area.width);
        }

        if self.show_command_palette.get() {
            let filtered = self.filtered_commands.borrow();
            let palette_height = (filtered.len().min(5) + 2) as u16;
            let palette_area = Rect {
                x: inner_area.x,
                y: inner_area.y.saturating_sub(palette_height),
                width: inner_area.width,
                height: palette_height,
            };

            let block = Block::default()
                .borders(Borders::ALL)
                .title("Commands")
                .style(Style::default().fg(Color::Blue));
            let inner = block.inner(palette_area);
            block.render(palette_area, buf);

            let selected = self.selected_command.get();
            for (index, entry) in filtered.iter().enumerate() {
                if index >= inner.height as usize {
                    break;
                }

                let is_selected = selected == Some(index);
                let style = if is_selected {
                    Style::default()
                        .fg(Color::Black)
                        .bg(Color::Cyan)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::White)
                };

                let line = Line::from(vec![
                    Span::styled(format!("/{}", entry.keyword), style),
                    Span::styled(" — ", Style::default().fg(Color::DarkGray)),
                    Span::styled(entry.description, Style::default().fg(Color::Gray)),
                ]);

                buf.set_line(inner.x, inner.y + index as u16, &line, inner.width);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(composer: &Composer, text: &str) {
        for c in text.chars() {
            composer.handle_key(press(KeyCode::Char(c)));
        }
    }

    #[test]
    fn enter_submits_trimmed_pending_text() {
        let composer = Composer::new("Ask...".into());
        type_text(&composer, "what is a limit order?");
        let result = composer.handle_key(press(KeyCode::Enter));
        assert_eq!(
            result,
            ComposerResult::Submitted("what is a limit order?".into())
        );
        assert!(composer.content().is_empty());
    }

    #[test]
    fn enter_on_empty_input_is_the_voice_toggle() {
        let composer = Composer::new("Ask...".into());
        assert_eq!(composer.handle_key(press(KeyCode::Enter)), ComposerResult::VoiceToggle);
    }

    #[test]
    fn slash_input_parses_to_a_command() {
        let composer = Composer::new("Ask...".into());
        type_text(&composer, "/reset");
        // Palette is open; Esc closes it, Enter then submits the raw text.
        composer.handle_key(press(KeyCode::Esc));
        let result = composer.handle_key(press(KeyCode::Enter));
        assert_eq!(result, ComposerResult::Command(SlashCommand::Reset));
    }

    #[test]
    fn palette_tab_completes_the_selected_command() {
        let composer = Composer::new("Ask...".into());
        type_text(&composer, "/ex");
        composer.handle_key(press(KeyCode::Tab));
        assert_eq!(composer.content(), "/expert");
    }

    #[test]
    fn replace_content_moves_cursor_to_the_end() {
        let composer = Composer::new("Ask...".into());
        composer.replace_content("What is a stop order?".into());
        type_text(&composer, "!");
        assert_eq!(composer.content(), "What is a stop order?!");
    }

    #[test]
    fn editing_handles_multibyte_input() {
        let composer = Composer::new("Ask...".into());
        type_text(&composer, "héllo");
        composer.handle_key(press(KeyCode::Backspace));
        assert_eq!(composer.content(), "héll");
    }
}
