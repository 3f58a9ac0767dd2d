//! Application shell: owns the store and drives the single UI event loop.
//!
//! All state mutation happens on this loop. Key presses become typed
//! [`UiCommand`]s, spawned pipeline tasks report back through the event
//! channel, and both are applied between frames so the renderer only ever
//! sees complete transitions.

use crate::api::{ApiClient, Polarity};
use crate::config::Config;
use crate::events::{PipelineEvent, UiCommand};
use crate::format;
use crate::pipeline::RequestPipeline;
use crate::store::ConversationStore;
use crate::suggestions::SuggestionProvider;
use crate::ui::commands::{SlashCommand, get_help_text};
use crate::ui::composer::{Composer, ComposerResult};
use crate::ui::transcript::{TranscriptView, bookmark_preview};
use crate::voice::VoiceInputController;
use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Widget};
use std::io::Stdout;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Which panel receives navigation keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Composer,
    Transcript,
    Bookmarks,
    Suggestions,
}

impl Focus {
    fn next(self) -> Self {
        match self {
            Focus::Composer => Focus::Transcript,
            Focus::Transcript => Focus::Bookmarks,
            Focus::Bookmarks => Focus::Suggestions,
            Focus::Suggestions => Focus::Composer,
        }
    }
}

pub struct ChatApp {
    config: Config,
    store: ConversationStore,
    pipeline: RequestPipeline,
    suggestions: SuggestionProvider,
    voice: VoiceInputController,
    composer: Composer,
    view: TranscriptView,
    events: mpsc::UnboundedReceiver<PipelineEvent>,
    focus: Focus,
    bookmark_cursor: usize,
    suggestion_cursor: usize,
    should_exit: bool,
}

impl ChatApp {
    pub fn new(config: &Config) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let backend = Arc::new(ApiClient::new(&config.base_url, config.request_timeout()));
        let pipeline = RequestPipeline::new(backend, tx.clone(), config.download_dir());
        let capture = VoiceInputController::probe(config.voice_command.as_deref());
        let voice = VoiceInputController::new(capture, tx);

        let app = Self {
            config: config.clone(),
            store: ConversationStore::new(),
            pipeline,
            suggestions: SuggestionProvider::new(),
            voice,
            composer: Composer::new("Ask a question, or / for commands...".to_string()),
            view: TranscriptView::new(),
            events: rx,
            focus: Focus::Composer,
            bookmark_cursor: 0,
            suggestion_cursor: 0,
            should_exit: false,
        };

        app.pipeline.fetch_suggestions();
        app
    }

    pub async fn run(mut self) -> Result<()> {
        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.event_loop(&mut terminal).await;

        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;
        result
    }

    async fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    ) -> Result<()> {
        while !self.should_exit {
            self.drain_pipeline_events();
            self.view.tick();
            self.composer
                .set_affordance(self.voice.affordance(&self.composer.content()));
            self.composer.set_focus(self.focus == Focus::Composer);
            self.view.set_focus(self.focus == Focus::Transcript);

            terminal.draw(|frame| {
                let area = frame.size();
                self.render(area, frame.buffer_mut());
            })?;

            if event::poll(Duration::from_millis(100))? {
                if let Event::Key(key) = event::read()? {
                    self.handle_key(key);
                }
            }
        }
        Ok(())
    }

    /// Apply completions from spawned tasks; each one is a full state
    /// transition, never a partial update.
    fn drain_pipeline_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            match event {
                PipelineEvent::SuggestionsFetched(result) => self.suggestions.apply_fetch(result),
                PipelineEvent::CaptureFinished(result) => {
                    let mut input = self.composer.content();
                    self.voice.finish_capture(&mut input, result);
                    self.composer.replace_content(input);
                }
                other => {
                    self.pipeline.apply(&mut self.store, other);
                    self.view.follow_newest();
                    self.bookmark_cursor = 0;
                }
            }
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }

        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.dispatch(UiCommand::Exit);
            return;
        }

        // Tab cycles panels unless the command palette has claimed it.
        if key.code == KeyCode::Tab && !(self.focus == Focus::Composer && self.composer.palette_open())
        {
            self.focus = self.focus.next();
            return;
        }

        match self.focus {
            Focus::Composer => self.handle_composer_key(key),
            Focus::Transcript => self.handle_transcript_key(key),
            Focus::Bookmarks => self.handle_bookmarks_key(key),
            Focus::Suggestions => self.handle_suggestions_key(key),
        }
    }

    fn handle_composer_key(&mut self, key: KeyEvent) {
        match self.composer.handle_key(key) {
            ComposerResult::Submitted(text) => self.dispatch(UiCommand::SubmitQuestion { text }),
            ComposerResult::Command(command) => self.run_slash_command(command),
            ComposerResult::VoiceToggle => self.dispatch(UiCommand::StartVoiceCapture),
            ComposerResult::None => {}
        }
    }

    fn handle_transcript_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Up => self.view.select_prev(&self.store),
            KeyCode::Down => self.view.select_next(&self.store),
            KeyCode::Esc => self.view.follow_newest(),
            KeyCode::Char('b') => {
                if let Some(id) = self.view.selected() {
                    self.dispatch(UiCommand::ToggleBookmark { id });
                }
            }
            KeyCode::Char('u') => {
                if let Some(id) = self.view.selected() {
                    self.dispatch(UiCommand::SendFeedback {
                        id,
                        polarity: Polarity::Positive,
                    });
                }
            }
            KeyCode::Char('d') => {
                if let Some(id) = self.view.selected() {
                    self.dispatch(UiCommand::SendFeedback {
                        id,
                        polarity: Polarity::Negative,
                    });
                }
            }
            _ => {}
        }
    }

    fn handle_bookmarks_key(&mut self, key: KeyEvent) {
        let count = self.store.bookmarks().len();
        match key.code {
            KeyCode::Up => self.bookmark_cursor = self.bookmark_cursor.saturating_sub(1),
            KeyCode::Down if count > 0 => {
                self.bookmark_cursor = (self.bookmark_cursor + 1).min(count - 1);
            }
            KeyCode::Enter => {
                if let Some(entry) = self.store.bookmarks().get(self.bookmark_cursor) {
                    self.dispatch(UiCommand::JumpToBookmark { id: entry.id });
                }
            }
            _ => {}
        }
    }

    fn handle_suggestions_key(&mut self, key: KeyEvent) {
        let count = self.suggestions.items().len();
        match key.code {
            KeyCode::Up => self.suggestion_cursor = self.suggestion_cursor.saturating_sub(1),
            KeyCode::Down if count > 0 => {
                self.suggestion_cursor = (self.suggestion_cursor + 1).min(count - 1);
            }
            KeyCode::Enter => self.dispatch(UiCommand::SelectSuggestion {
                index: self.suggestion_cursor,
            }),
            _ => {}
        }
    }

    fn run_slash_command(&mut self, command: SlashCommand) {
        match command {
            SlashCommand::Reset => self.dispatch(UiCommand::ResetSession),
            SlashCommand::Expert => self.dispatch(UiCommand::AskExpert),
            SlashCommand::Export => self.dispatch(UiCommand::DownloadTranscript),
            SlashCommand::Help => {
                self.store.append_assistant(get_help_text(), None);
                self.view.follow_newest();
            }
            SlashCommand::Bye => self.dispatch(UiCommand::Exit),
        }
    }

    /// Consume a typed command; the single entry point for every state
    /// transition a UI affordance can request.
    fn dispatch(&mut self, command: UiCommand) {
        match command {
            UiCommand::SubmitQuestion { text } => {
                if self.pipeline.submit_question(&mut self.store, &text) {
                    self.view.follow_newest();
                }
            }
            UiCommand::ToggleBookmark { id } => {
                if self.store.is_bookmarked(id) {
                    self.store.unbookmark(id);
                    self.bookmark_cursor = 0;
                } else {
                    self.store.bookmark(id);
                }
            }
            UiCommand::SendFeedback { id, polarity } => {
                let doc_id = self.store.message(id).and_then(|m| m.doc_id.clone());
                if let Some(doc_id) = doc_id {
                    self.pipeline.send_feedback(id, &doc_id, polarity);
                }
            }
            UiCommand::StartVoiceCapture => {
                self.voice.start_capture();
            }
            UiCommand::AskExpert => {
                self.pipeline.ask_expert(&mut self.store);
                self.view.follow_newest();
            }
            UiCommand::DownloadTranscript => {
                self.pipeline.download_transcript(&mut self.store);
                self.view.follow_newest();
            }
            UiCommand::ResetSession => self.pipeline.reset_session(),
            UiCommand::SelectSuggestion { index } => {
                if let Some(text) = self.suggestions.select(index) {
                    self.composer.replace_content(text.to_string());
                    self.focus = Focus::Composer;
                }
            }
            UiCommand::JumpToBookmark { id } => self.view.jump_to(id),
            UiCommand::Exit => self.should_exit = true,
        }
    }

    fn render(&self, area: Rect, buf: &mut Buffer) {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(34), Constraint::Min(40)])
            .split(area);

        let side = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
            .split(columns[0]);

        self.render_suggestions(side[0], buf);
        self.render_bookmarks(side[1], buf);

        let main = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(10), Constraint::Length(3)])
            .split(columns[1]);

        self.view.render(
            main[0],
            buf,
            &self.store,
            |id| self.pipeline.feedback_selected(id),
            self.config.ui.show_timestamps,
        );
        (&self.composer).render(main[1], buf);
    }

    fn render_suggestions(&self, area: Rect, buf: &mut Buffer) {
        let focused = self.focus == Focus::Suggestions;
        let block = Block::default()
            .borders(Borders::ALL)
            .title("Suggestions")
            .style(if focused {
                Style::default().fg(Color::Green)
            } else {
                Style::default()
            });
        let inner = block.inner(area);
        block.render(area, buf);

        if self.suggestions.is_empty() {
            let line = Line::from(Span::styled(
                "No suggestions yet",
                Style::default().fg(Color::DarkGray),
            ));
            buf.set_line(inner.x, inner.y, &line, inner.width);
            return;
        }

        for (index, suggestion) in self.suggestions.items().iter().enumerate() {
            if index >= inner.height as usize {
                break;
            }
            let style = if focused && index == self.suggestion_cursor {
                Style::default().fg(Color::Black).bg(Color::Cyan)
            } else {
                Style::default().fg(Color::Gray)
            };
            let line = Line::from(vec![
                Span::styled("→ ", Style::default().fg(Color::DarkGray)),
                Span::styled(suggestion.clone(), style),
            ]);
            buf.set_line(inner.x, inner.y + index as u16, &line, inner.width);
        }
    }

    fn render_bookmarks(&self, area: Rect, buf: &mut Buffer) {
        let focused = self.focus == Focus::Bookmarks;
        let block = Block::default()
            .borders(Borders::ALL)
            .title("Bookmarks")
            .style(if focused {
                Style::default().fg(Color::Green)
            } else {
                Style::default()
            });
        let inner = block.inner(area);
        block.render(area, buf);

        if self.store.bookmarks().is_empty() {
            let line = Line::from(Span::styled(
                "Press b on an answer to bookmark it",
                Style::default().fg(Color::DarkGray),
            ));
            buf.set_line(inner.x, inner.y, &line, inner.width);
            return;
        }

        // Two-line cards: timestamp then the first line of the answer.
        let mut y = 0u16;
        for (index, entry) in self.store.bookmarks().iter().enumerate() {
            if y + 1 >= inner.height {
                break;
            }
            let selected = focused && index == self.bookmark_cursor;
            let date_style = if selected {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            let date = Line::from(Span::styled(format::format_date(entry.timestamp), date_style));
            buf.set_line(inner.x, inner.y + y, &date, inner.width);

            let preview_style = if selected {
                Style::default().fg(Color::Black).bg(Color::Cyan)
            } else {
                Style::default().fg(Color::Gray)
            };
            let preview = Line::from(Span::styled(bookmark_preview(entry), preview_style));
            buf.set_line(inner.x, inner.y + y + 1, &preview, inner.width);
            y += 3;
        }
    }
}
