use crate::conversation::ConversationController;
use crate::error::LlmError;
use crate::events::AppEvent;
use crate::llm::CompletionBackend;
use crate::ui::conversation::{
    ComposerResult, ConversationComposer, ConversationHistory, ParsedCommand, SlashCommand,
    get_help_text,
};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget},
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Actions that can be requested by the conversation manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationAction {
    None,
    Exit,
}

/// Wires the composer and history view to the conversation controller and
/// runs completion requests off the UI loop.
pub struct ConversationManager {
    controller: ConversationController,
    composer: ConversationComposer,
    backend: Arc<dyn CompletionBackend>,
    events: mpsc::UnboundedSender<AppEvent>,
    notice: Option<String>,
    tick: usize,
}

impl ConversationManager {
    pub fn new(
        controller: ConversationController,
        backend: Arc<dyn CompletionBackend>,
        events: mpsc::UnboundedSender<AppEvent>,
    ) -> Self {
        Self {
            controller,
            composer: ConversationComposer::new("Ask something..."),
            backend,
            events,
            notice: None,
            tick: 0,
        }
    }

    #[cfg(test)]
    pub fn controller(&self) -> &ConversationController {
        &self.controller
    }

    /// Handle key input
    pub fn handle_key(&mut self, key: KeyEvent) -> ConversationAction {
        if key.modifiers.contains(KeyModifiers::CONTROL)
            && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('d'))
        {
            return ConversationAction::Exit;
        }

        let result = self.composer.handle_key(key);
        self.apply(result)
    }

    /// Handle a bracketed paste
    pub fn handle_paste(&mut self, text: &str) -> ConversationAction {
        let result = self.composer.handle_paste(text);
        self.apply(result)
    }

    fn apply(&mut self, result: ComposerResult) -> ConversationAction {
        match result {
            ComposerResult::Submitted(input) => {
                self.send(&input);
                ConversationAction::None
            }
            ComposerResult::Command(command) => self.handle_slash_command(command),
            ComposerResult::Edited => {
                self.notice = None;
                self.controller.update_draft(self.composer.content());
                ConversationAction::None
            }
            ComposerResult::None => ConversationAction::None,
        }
    }

    /// Submit `input` and spawn the completion request if it was accepted
    fn send(&mut self, input: &str) {
        let Some(outbound) = self.controller.submit(input) else {
            debug!("submission rejected");
            return;
        };

        self.composer.clear();
        self.composer.set_disabled(true);
        self.notice = None;

        let backend = Arc::clone(&self.backend);
        let events = self.events.clone();
        tokio::spawn(async move {
            let outcome = backend.complete(outbound).await;
            // The loop may already be gone if the user quit mid-request
            let _ = events.send(AppEvent::ReplySettled(outcome));
        });
    }

    /// Apply the outcome of the in-flight request
    pub fn on_reply(&mut self, outcome: Result<String, LlmError>) {
        self.controller.settle(outcome);
        self.composer.set_disabled(self.controller.is_pending());
        info!(turns = self.controller.messages().len(), "reply settled");
    }

    /// Advance the typing indicator
    pub fn on_tick(&mut self) {
        self.tick = self.tick.wrapping_add(1);
    }

    /// Handle slash commands
    fn handle_slash_command(&mut self, command: ParsedCommand) -> ConversationAction {
        self.controller.update_draft("");
        match command.command {
            SlashCommand::Help => {
                self.notice = Some(get_help_text());
                ConversationAction::None
            }
            SlashCommand::Bye => ConversationAction::Exit,
        }
    }
}

impl Widget for &ConversationManager {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2), // Header
                Constraint::Min(5),    // History
                Constraint::Length(4), // Composer
            ])
            .split(area);

        let header = Paragraph::new(vec![
            Line::from(Span::styled(
                "AskAnsh",
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                "Ask me about Anshumansinh Rathore",
                Style::default().fg(Color::Gray),
            )),
        ])
        .alignment(Alignment::Center);
        header.render(chunks[0], buf);

        ConversationHistory::new(self.controller.messages())
            .pending(self.controller.is_pending(), self.tick)
            .notice(self.notice.as_deref())
            .render(chunks[1], buf);

        self.composer.render(chunks[2], buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ChatMessage, ChatRole, RequestState};
    use async_trait::async_trait;

    struct EchoBackend;

    #[async_trait]
    impl CompletionBackend for EchoBackend {
        async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, LlmError> {
            let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
            Ok(format!("echo: {last}"))
        }
    }

    fn manager() -> (ConversationManager, mpsc::UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let manager = ConversationManager::new(
            ConversationController::new("persona"),
            Arc::new(EchoBackend),
            tx,
        );
        (manager, rx)
    }

    fn type_text(manager: &mut ConversationManager, text: &str) {
        for c in text.chars() {
            manager.handle_key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE));
        }
    }

    fn enter() -> KeyEvent {
        KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE)
    }

    #[tokio::test]
    async fn test_typing_updates_draft_only() {
        let (mut manager, _rx) = manager();

        type_text(&mut manager, "hey");

        assert_eq!(manager.controller().draft(), "hey");
        assert!(manager.controller().messages().is_empty());
    }

    #[tokio::test]
    async fn test_full_turn_through_event_channel() {
        let (mut manager, mut rx) = manager();
        type_text(&mut manager, "hello");

        manager.handle_key(enter());
        assert_eq!(manager.controller().state(), RequestState::Pending);
        assert_eq!(manager.controller().draft(), "");
        assert!(manager.composer.is_disabled());

        // A second question typed while waiting stays in the composer
        type_text(&mut manager, "again");
        manager.handle_key(enter());
        assert_eq!(manager.controller().messages().len(), 1);

        let Some(AppEvent::ReplySettled(outcome)) = rx.recv().await else {
            panic!("expected a settled reply");
        };
        manager.on_reply(outcome);

        let messages = manager.controller().messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, ChatRole::Assistant);
        assert_eq!(messages[1].content, "echo: hello");
        assert_eq!(manager.controller().state(), RequestState::Idle);
        assert!(!manager.composer.is_disabled());
        assert_eq!(manager.composer.content(), "again");
    }

    #[tokio::test]
    async fn test_commands_are_handled_locally() {
        let (mut manager, mut rx) = manager();

        type_text(&mut manager, "/help");
        assert_eq!(manager.handle_key(enter()), ConversationAction::None);
        assert!(manager.notice.as_deref().unwrap().contains("/bye"));

        type_text(&mut manager, "/bye");
        assert_eq!(manager.handle_key(enter()), ConversationAction::Exit);

        assert!(manager.controller().messages().is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_ctrl_c_exits() {
        let (mut manager, _rx) = manager();
        let key = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);

        assert_eq!(manager.handle_key(key), ConversationAction::Exit);
    }

    #[tokio::test]
    async fn test_render_shows_header_and_placeholder() {
        let (manager, _rx) = manager();
        let area = Rect::new(0, 0, 60, 16);
        let mut buf = Buffer::empty(area);

        (&manager).render(area, &mut buf);

        let screen: String = buf.content().iter().map(|cell| cell.symbol()).collect();
        assert!(screen.contains("AskAnsh"));
        assert!(screen.contains("Ask me about Anshumansinh Rathore"));
        assert!(screen.contains("Ask something..."));
    }
}
