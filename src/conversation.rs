use crate::error::LlmError;
use crate::events::{ChatMessage, RequestState};
use crate::llm::CompletionBackend;
use crate::prompts::{FETCH_ERROR, UNKNOWN_TIME, rate_limit_notice};
use chrono::{DateTime, Local, Utc};
use tracing::{info, warn};
use uuid::Uuid;

/// Owns the visible conversation, the unsent draft and the single-flight
/// request state for one chat session.
///
/// A turn is split in two: [`submit`](Self::submit) records the user message
/// and hands back the request to send, [`settle`](Self::settle) records the
/// outcome. Between the two the controller is `Pending` and refuses new
/// submissions, so each accepted submit produces exactly one assistant reply.
#[derive(Debug, Clone)]
pub struct ConversationController {
    session_id: Uuid,
    system_prompt: String,
    messages: Vec<ChatMessage>,
    draft: String,
    state: RequestState,
}

impl ConversationController {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            system_prompt: system_prompt.into(),
            messages: Vec::new(),
            draft: String::new(),
            state: RequestState::Idle,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Visible conversation, oldest first. Never includes the system prompt.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    #[cfg(test)]
    pub fn draft(&self) -> &str {
        &self.draft
    }

    #[cfg(test)]
    pub fn state(&self) -> RequestState {
        self.state
    }

    pub fn is_pending(&self) -> bool {
        self.state == RequestState::Pending
    }

    /// Whether `submit` would currently accept `text`
    pub fn can_submit(&self, text: &str) -> bool {
        !self.is_pending() && !text.trim().is_empty()
    }

    /// Replace the unsent input text
    pub fn update_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// Start a turn.
    ///
    /// Returns the message list to send (system prompt first), or `None` if
    /// `text` is blank or a request is already pending. Nothing changes in
    /// the `None` case.
    pub fn submit(&mut self, text: &str) -> Option<Vec<ChatMessage>> {
        if !self.can_submit(text) {
            return None;
        }

        self.messages.push(ChatMessage::user(text));
        self.draft.clear();
        self.state = RequestState::Pending;

        info!(session = %self.session_id, turns = self.messages.len(), "submitted user message");

        let mut outbound = Vec::with_capacity(self.messages.len() + 1);
        outbound.push(ChatMessage::system(self.system_prompt.clone()));
        outbound.extend(self.messages.iter().cloned());
        Some(outbound)
    }

    /// Finish the pending turn with the request's outcome.
    ///
    /// Appends exactly one assistant message and returns to `Idle`.
    /// Outcomes arriving while idle are dropped.
    pub fn settle(&mut self, outcome: Result<String, LlmError>) {
        if !self.is_pending() {
            warn!(session = %self.session_id, "dropping completion outcome with no pending request");
            return;
        }

        let reply = match outcome {
            Ok(reply) => reply,
            Err(LlmError::RateLimited { reset }) => {
                rate_limit_notice(&format_reset_time(reset.as_deref()))
            }
            Err(err) => {
                warn!(session = %self.session_id, error = %err, "completion request failed");
                FETCH_ERROR.to_string()
            }
        };

        self.messages.push(ChatMessage::assistant(reply));
        self.state = RequestState::Idle;
    }

    /// Submit and wait for the reply in one step.
    ///
    /// Returns `false` if the submission was rejected.
    pub async fn converse(&mut self, text: &str, backend: &dyn CompletionBackend) -> bool {
        let Some(outbound) = self.submit(text) else {
            return false;
        };

        let outcome = backend.complete(outbound).await;
        self.settle(outcome);
        true
    }
}

/// Render a rate-limit reset header (millisecond epoch) as local time.
///
/// Anything that is not a positive integer within chrono's range becomes
/// [`UNKNOWN_TIME`].
pub fn format_reset_time(raw: Option<&str>) -> String {
    raw.map(str::trim)
        .and_then(|value| value.parse::<i64>().ok())
        .filter(|millis| *millis > 0)
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|reset| {
            reset
                .with_timezone(&Local)
                .format("%b %-d, %Y, %-I:%M:%S %p")
                .to_string()
        })
        .unwrap_or_else(|| UNKNOWN_TIME.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ChatRole;
    use crate::prompts::NO_RESPONSE;
    use async_trait::async_trait;
    use std::sync::Mutex;

    type Script = Box<dyn Fn() -> Result<String, LlmError> + Send + Sync>;

    /// Backend that answers every call from a closure and records requests
    struct ScriptedBackend {
        script: Script,
        requests: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedBackend {
        fn new(script: impl Fn() -> Result<String, LlmError> + Send + Sync + 'static) -> Self {
            Self {
                script: Box::new(script),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn replying_with_body(raw: &'static str) -> Self {
            Self::new(move || crate::llm::parse_reply(reqwest::StatusCode::OK, raw))
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CompletionBackend for ScriptedBackend {
        async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, LlmError> {
            self.requests.lock().unwrap().push(messages);
            (self.script)()
        }
    }

    fn transport_error() -> LlmError {
        let err = reqwest::Client::new()
            .get("not a url")
            .build()
            .unwrap_err();
        LlmError::Transport(err)
    }

    fn last_reply(controller: &ConversationController) -> &str {
        let last = controller.messages().last().unwrap();
        assert_eq!(last.role, ChatRole::Assistant);
        &last.content
    }

    #[tokio::test]
    async fn test_valid_submit_appends_user_and_assistant() {
        let backend = ScriptedBackend::replying_with_body(
            r#"{"choices":[{"message":{"content":"Hello"}}]}"#,
        );
        let mut controller = ConversationController::new("persona");

        assert!(controller.converse("Who is Anshuman?", &backend).await);

        let messages = controller.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, ChatRole::User);
        assert_eq!(messages[0].content, "Who is Anshuman?");
        assert_eq!(last_reply(&controller), "Hello");
        assert_eq!(controller.state(), RequestState::Idle);
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_every_turn_sends_system_prompt_then_full_history() {
        let backend = ScriptedBackend::new(|| Ok("ok".to_string()));
        let mut controller = ConversationController::new("persona");

        controller.converse("first", &backend).await;
        controller.converse("second", &backend).await;

        let requests = backend.requests.lock().unwrap();
        let second: Vec<(ChatRole, &str)> = requests[1]
            .iter()
            .map(|m| (m.role, m.content.as_str()))
            .collect();
        assert_eq!(
            second,
            vec![
                (ChatRole::System, "persona"),
                (ChatRole::User, "first"),
                (ChatRole::Assistant, "ok"),
                (ChatRole::User, "second"),
            ]
        );
        assert!(controller.messages().iter().all(|m| m.role != ChatRole::System));
    }

    #[tokio::test]
    async fn test_blank_submissions_are_ignored() {
        let backend = ScriptedBackend::new(|| Ok("unused".to_string()));
        let mut controller = ConversationController::new("persona");
        controller.update_draft("   ");

        for text in ["", "   ", "\n\t "] {
            assert!(!controller.converse(text, &backend).await);
        }

        assert!(controller.messages().is_empty());
        assert_eq!(controller.draft(), "   ");
        assert_eq!(controller.state(), RequestState::Idle);
        assert_eq!(backend.calls(), 0);
    }

    #[test]
    fn test_submit_while_pending_is_rejected() {
        let mut controller = ConversationController::new("persona");
        controller.update_draft("first");

        assert!(controller.submit("first").is_some());
        assert_eq!(controller.draft(), "");
        assert!(controller.is_pending());

        controller.update_draft("second");
        assert!(controller.submit("second").is_none());
        assert_eq!(controller.messages().len(), 1);
        assert_eq!(controller.draft(), "second");
        assert_eq!(controller.state(), RequestState::Pending);

        controller.settle(Ok("reply".to_string()));
        assert_eq!(controller.messages().len(), 2);
        assert_eq!(controller.state(), RequestState::Idle);
    }

    #[test]
    fn test_user_text_is_kept_as_typed() {
        let mut controller = ConversationController::new("persona");
        controller.submit("  padded question \n");

        assert_eq!(controller.messages()[0].content, "  padded question \n");
    }

    #[tokio::test]
    async fn test_missing_choices_yields_fallback() {
        for body in [r#"{"choices":[]}"#, r#"{"id":"gen-1"}"#] {
            let backend = ScriptedBackend::replying_with_body(body);
            let mut controller = ConversationController::new("persona");

            controller.converse("hi", &backend).await;

            assert_eq!(last_reply(&controller), NO_RESPONSE);
        }
    }

    #[tokio::test]
    async fn test_rate_limit_reports_reset_time() {
        let backend = ScriptedBackend::new(|| {
            Err(LlmError::RateLimited {
                reset: Some("1700000000000".to_string()),
            })
        });
        let mut controller = ConversationController::new("persona");

        controller.converse("hi", &backend).await;

        let expected = DateTime::<Utc>::from_timestamp_millis(1_700_000_000_000)
            .unwrap()
            .with_timezone(&Local)
            .format("%b %-d, %Y, %-I:%M:%S %p")
            .to_string();
        let reply = last_reply(&controller);
        assert!(reply.contains(&expected), "reply: {reply}");
        assert!(reply.contains("2023"));
        assert!(!reply.contains(FETCH_ERROR));
        assert_eq!(controller.messages().len(), 2);
        assert_eq!(controller.state(), RequestState::Idle);
    }

    #[tokio::test]
    async fn test_rate_limit_without_reset_header() {
        let backend = ScriptedBackend::new(|| Err(LlmError::RateLimited { reset: None }));
        let mut controller = ConversationController::new("persona");

        controller.converse("hi", &backend).await;

        assert_eq!(last_reply(&controller), rate_limit_notice(UNKNOWN_TIME));
    }

    #[tokio::test]
    async fn test_transport_failure_yields_generic_error() {
        let backend = ScriptedBackend::new(|| Err(transport_error()));
        let mut controller = ConversationController::new("persona");

        controller.converse("hi", &backend).await;

        assert_eq!(last_reply(&controller), FETCH_ERROR);
        assert_eq!(controller.messages().len(), 2);
        assert_eq!(controller.state(), RequestState::Idle);
    }

    #[tokio::test]
    async fn test_http_failure_hides_status_and_body() {
        let backend = ScriptedBackend::new(|| {
            Err(LlmError::RequestFailed {
                status: 500,
                body: "upstream exploded".to_string(),
            })
        });
        let mut controller = ConversationController::new("persona");

        controller.converse("hi", &backend).await;

        assert_eq!(last_reply(&controller), FETCH_ERROR);
    }

    #[tokio::test]
    async fn test_malformed_body_yields_generic_error() {
        let backend = ScriptedBackend::replying_with_body("not json");
        let mut controller = ConversationController::new("persona");

        controller.converse("hi", &backend).await;

        assert_eq!(last_reply(&controller), FETCH_ERROR);
    }

    #[test]
    fn test_settle_without_pending_request_is_dropped() {
        let mut controller = ConversationController::new("persona");

        controller.settle(Ok("stray".to_string()));

        assert!(controller.messages().is_empty());
        assert_eq!(controller.state(), RequestState::Idle);
    }

    #[test]
    fn test_update_draft_never_touches_conversation() {
        let mut controller = ConversationController::new("persona");
        controller.submit("hello");
        controller.settle(Ok("hi".to_string()));
        let before: Vec<String> = controller.messages().iter().map(|m| m.content.clone()).collect();

        for draft in ["a", "ab", "", "   ", "anything\nat all"] {
            controller.update_draft(draft);
        }

        let after: Vec<String> = controller.messages().iter().map(|m| m.content.clone()).collect();
        assert_eq!(before, after);
        assert_eq!(controller.draft(), "anything\nat all");
        assert_eq!(controller.state(), RequestState::Idle);
    }

    #[test]
    fn test_format_reset_time_rejects_garbage() {
        for raw in [None, Some(""), Some("soon"), Some("-5"), Some("0"), Some("1.7e12"), Some("99999999999999999999")] {
            assert_eq!(format_reset_time(raw), UNKNOWN_TIME, "input: {raw:?}");
        }
    }

    #[test]
    fn test_format_reset_time_accepts_padded_millis() {
        assert_ne!(format_reset_time(Some(" 1700000000000 ")), UNKNOWN_TIME);
    }
}
