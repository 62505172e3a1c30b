//! Conversation history display component

use crate::events::{ChatMessage, ChatRole};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

/// Read-only view over the controller's message log.
///
/// Always shows the newest lines: the view is pinned to the bottom so every
/// new turn scrolls into sight.
pub struct ConversationHistory<'a> {
    messages: &'a [ChatMessage],
    pending: bool,
    tick: usize,
    notice: Option<&'a str>,
}

impl<'a> ConversationHistory<'a> {
    pub fn new(messages: &'a [ChatMessage]) -> Self {
        Self {
            messages,
            pending: false,
            tick: 0,
            notice: None,
        }
    }

    /// Show the typing indicator below the last message
    pub fn pending(mut self, pending: bool, tick: usize) -> Self {
        self.pending = pending;
        self.tick = tick;
        self
    }

    /// Local text (help output) shown after the conversation, never part of it
    pub fn notice(mut self, notice: Option<&'a str>) -> Self {
        self.notice = notice;
        self
    }

    fn lines(&self, width: u16) -> Vec<Line<'static>> {
        let mut all_lines: Vec<Line> = Vec::new();

        if self.messages.is_empty() && !self.pending {
            all_lines.push(Line::from(Span::styled(
                "Ask me anything about Anshumansinh Rathore.",
                Style::default().fg(Color::Gray),
            )));
            all_lines.push(Line::from(Span::styled(
                "Press Enter to send, Shift+Enter for a new line, /help for commands.",
                Style::default().fg(Color::DarkGray),
            )));
            all_lines.push(Line::from(""));
        }

        for message in self.messages {
            all_lines.append(&mut render_message(message, width));
            // spacing between messages
            all_lines.push(Line::from(""));
        }

        if self.pending {
            let dots = match self.tick % 4 {
                0 => ".",
                1 => "..",
                2 => "...",
                _ => "",
            };
            all_lines.push(Line::from(vec![
                Span::styled("Typing", Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC)),
                Span::styled(dots.to_string(), Style::default().fg(Color::Gray)),
            ]));
        }

        if let Some(notice) = self.notice {
            for line in notice.lines() {
                all_lines.push(Line::from(Span::styled(
                    line.to_string(),
                    Style::default().fg(Color::Yellow),
                )));
            }
        }

        all_lines
    }
}

impl Widget for ConversationHistory<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default().borders(Borders::ALL).title(" Conversation ");

        let inner_area = block.inner(area);
        block.render(area, buf);

        let all_lines = self.lines(inner_area.width);

        // Determine the range of lines to display from the bottom
        let height = inner_area.height as usize;
        let start = all_lines.len().saturating_sub(height);

        for (i, line) in all_lines[start..].iter().enumerate() {
            buf.set_line(inner_area.x, inner_area.y + i as u16, line, inner_area.width);
        }
    }
}

/// Render a single message into lines: user turns on the right, replies on the left
fn render_message(message: &ChatMessage, width: u16) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    let (label, style) = match message.role {
        ChatRole::User => ("You", Style::default().fg(Color::Blue)),
        ChatRole::Assistant => ("AskAnsh", Style::default().fg(Color::White)),
        ChatRole::System => ("System", Style::default().fg(Color::Yellow)),
    };

    let timestamp = message
        .timestamp
        .map(|ts| ts.with_timezone(&chrono::Local).format("%H:%M").to_string())
        .unwrap_or_default();
    let header = format!("{} {}", label, timestamp);
    let text_width = (width as usize).saturating_sub(4).max(1);

    let align_right = message.role == ChatRole::User;
    let pad = |text: &str| -> String {
        if align_right {
            let used = text.chars().count();
            " ".repeat((width as usize).saturating_sub(used))
        } else {
            "  ".to_string()
        }
    };

    lines.push(Line::from(vec![
        Span::raw(pad(&header)),
        Span::styled(header.trim_end().to_string(), Style::default().fg(Color::DarkGray)),
    ]));

    for content_line in wrap_text(&message.content, text_width) {
        lines.push(Line::from(vec![
            Span::raw(pad(&content_line)),
            Span::styled(content_line, style),
        ]));
    }

    lines
}

/// Wrap text to fit within the given width, keeping the author's line breaks,
/// indentation and runs of spaces. Words wider than the line are split.
fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut current_line = String::new();
        let mut current_len = 0;

        for segment in split_segments(paragraph) {
            let segment_len = segment.chars().count();

            if current_len + segment_len <= width {
                current_line.push_str(segment);
                current_len += segment_len;
                continue;
            }

            // Whitespace at a wrap point is dropped
            if segment.starts_with(char::is_whitespace) {
                if !current_line.trim().is_empty() {
                    lines.push(current_line.trim_end().to_string());
                }
                current_line.clear();
                current_len = 0;
                continue;
            }

            if !current_line.trim().is_empty() {
                lines.push(current_line.trim_end().to_string());
                current_line.clear();
                current_len = 0;
            }

            for c in segment.chars() {
                if current_len == width {
                    lines.push(std::mem::take(&mut current_line));
                    current_len = 0;
                }
                current_line.push(c);
                current_len += 1;
            }
        }

        lines.push(current_line.trim_end().to_string());
    }

    if lines.is_empty() {
        lines.push(String::new());
    }

    lines
}

/// Split a line into alternating runs of whitespace and non-whitespace
fn split_segments(line: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut in_space: Option<bool> = None;

    for (index, c) in line.char_indices() {
        let is_space = c.is_whitespace();
        if in_space.is_some_and(|previous| previous != is_space) {
            segments.push(&line[start..index]);
            start = index;
        }
        in_space = Some(is_space);
    }

    if start < line.len() {
        segments.push(&line[start..]);
    }

    segments
}
