use crate::ui::conversation::commands::{ParsedCommand, parse_slash_command};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

/// Result returned when the user interacts with the conversation composer
#[derive(Debug, PartialEq)]
pub enum ComposerResult {
    /// Enter pressed on a non-blank message
    Submitted(String),
    /// Enter pressed on a recognised slash command
    Command(ParsedCommand),
    /// The text changed
    Edited,
    None,
}

/// State for the text area within the composer. `cursor` counts chars.
#[derive(Debug, Clone, Default)]
pub struct TextAreaState {
    pub content: String,
    pub cursor: usize,
}

impl TextAreaState {
    fn byte_index(&self) -> usize {
        self.content
            .char_indices()
            .nth(self.cursor)
            .map(|(index, _)| index)
            .unwrap_or(self.content.len())
    }

    fn char_count(&self) -> usize {
        self.content.chars().count()
    }

    fn insert_str(&mut self, text: &str) {
        let index = self.byte_index();
        self.content.insert_str(index, text);
        self.cursor += text.chars().count();
    }

    /// Delete character before cursor
    fn backspace(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        let index = self.byte_index();
        self.content.remove(index);
        true
    }

    /// Delete character at cursor
    fn delete(&mut self) -> bool {
        if self.cursor >= self.char_count() {
            return false;
        }
        let index = self.byte_index();
        self.content.remove(index);
        true
    }
}

/// Multi-line input box for composing the next question
#[derive(Debug, Clone)]
pub struct ConversationComposer {
    state: TextAreaState,
    placeholder: String,
    disabled: bool,
}

impl ConversationComposer {
    pub fn new(placeholder: impl Into<String>) -> Self {
        Self {
            state: TextAreaState::default(),
            placeholder: placeholder.into(),
            disabled: false,
        }
    }

    /// Handle key input
    pub fn handle_key(&mut self, key: KeyEvent) -> ComposerResult {
        if key.kind != KeyEventKind::Press {
            return ComposerResult::None;
        }

        match key.code {
            KeyCode::Enter => {
                if key.modifiers.intersects(KeyModifiers::SHIFT | KeyModifiers::ALT) {
                    self.state.insert_str("\n");
                    return ComposerResult::Edited;
                }
                self.on_enter()
            }
            KeyCode::Char(c) => {
                if key.modifiers.contains(KeyModifiers::CONTROL) {
                    return ComposerResult::None;
                }
                let mut buf = [0u8; 4];
                self.state.insert_str(c.encode_utf8(&mut buf));
                ComposerResult::Edited
            }
            KeyCode::Backspace => self.edited_if(|state| state.backspace()),
            KeyCode::Delete => self.edited_if(|state| state.delete()),
            KeyCode::Left => {
                self.state.cursor = self.state.cursor.saturating_sub(1);
                ComposerResult::None
            }
            KeyCode::Right => {
                self.state.cursor = (self.state.cursor + 1).min(self.state.char_count());
                ComposerResult::None
            }
            KeyCode::Home => {
                self.state.cursor = 0;
                ComposerResult::None
            }
            KeyCode::End => {
                self.state.cursor = self.state.char_count();
                ComposerResult::None
            }
            _ => ComposerResult::None,
        }
    }

    /// Insert pasted text at the cursor
    pub fn handle_paste(&mut self, text: &str) -> ComposerResult {
        if text.is_empty() {
            return ComposerResult::None;
        }
        self.state.insert_str(&text.replace("\r\n", "\n"));
        ComposerResult::Edited
    }

    fn on_enter(&mut self) -> ComposerResult {
        if let Some(command) = parse_slash_command(&self.state.content) {
            self.clear();
            return ComposerResult::Command(command);
        }

        if self.disabled || self.state.content.trim().is_empty() {
            return ComposerResult::None;
        }

        ComposerResult::Submitted(self.state.content.clone())
    }

    fn edited_if(&mut self, edit: impl FnOnce(&mut TextAreaState) -> bool) -> ComposerResult {
        if edit(&mut self.state) {
            ComposerResult::Edited
        } else {
            ComposerResult::None
        }
    }

    /// Block submission while a reply is outstanding
    pub fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Get current content
    pub fn content(&self) -> &str {
        &self.state.content
    }

    /// Clear content
    pub fn clear(&mut self) {
        self.state = TextAreaState::default();
    }

    fn can_send(&self) -> bool {
        !self.disabled && !self.state.content.trim().is_empty()
    }
}

impl Widget for &ConversationComposer {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let title = if self.is_disabled() {
            " Waiting for reply... "
        } else if self.can_send() {
            " Enter to send "
        } else {
            " Ask "
        };

        let border_color = if self.can_send() {
            Color::Blue
        } else if self.disabled {
            Color::DarkGray
        } else {
            Color::Gray
        };

        let block = Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(Style::default().fg(border_color));

        let inner_area = block.inner(area);
        block.render(area, buf);

        if self.state.content.is_empty() {
            let placeholder_line = Line::from(vec![Span::styled(
                self.placeholder.as_str(),
                Style::default().fg(Color::DarkGray),
            )]);
            buf.set_line(inner_area.x, inner_area.y, &placeholder_line, inner_area.width);
            return;
        }

        let cursor_index = self.state.byte_index();
        let mut content = self.state.content.clone();
        content.insert(cursor_index, '▌');

        // Keep the cursor line visible when the draft outgrows the box
        let lines: Vec<&str> = content.split('\n').collect();
        let height = inner_area.height as usize;
        let cursor_line = self.state.content[..cursor_index].matches('\n').count();
        let start = (cursor_line + 1).saturating_sub(height);

        for (i, line_text) in lines.iter().skip(start).take(height).enumerate() {
            let line = Line::from(vec![Span::raw(*line_text)]);
            buf.set_line(inner_area.x, inner_area.y + i as u16, &line, inner_area.width);
        }
    }
}
