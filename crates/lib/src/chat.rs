//! Chat transcript and the turn lifecycle (pending → answered / failed).
//!
//! One turn is in flight at a time. The pending placeholder is removed before the
//! outcome is appended, whatever the outcome is.

use uuid::Uuid;

use crate::api::{ApiError, ChatReply};
use crate::debug_log::DebugLogEntry;
use crate::render;

/// Correlates a completion with the turn that issued it.
pub type TurnId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Ai,
    System,
}

impl ChatRole {
    pub fn as_str(self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Ai => "ai",
            ChatRole::System => "system",
        }
    }
}

/// One transcript entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
    /// Local time of day (`03:41 PM`). System messages are not stamped.
    pub timestamp: Option<String>,
    /// The typing indicator shown while a turn is in flight.
    pub is_pending: bool,
}

fn time_of_day() -> String {
    chrono::Local::now().format("%I:%M %p").to_string()
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
            timestamp: Some(time_of_day()),
            is_pending: false,
        }
    }

    pub fn ai(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Ai,
            text: text.into(),
            timestamp: Some(time_of_day()),
            is_pending: false,
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            text: text.into(),
            timestamp: None,
            is_pending: false,
        }
    }

    fn pending() -> Self {
        Self {
            role: ChatRole::Ai,
            text: String::new(),
            timestamp: None,
            is_pending: true,
        }
    }

    /// Clipboard text for AI messages (image references replaced); None for other roles.
    pub fn copy_text(&self) -> Option<String> {
        if self.role != ChatRole::Ai || self.is_pending {
            return None;
        }
        Some(render::copy_text(&self.text))
    }
}

/// Why a chat turn failed. The Display text is what the system bubble shows.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    /// Server returned an error payload.
    #[error("❌ Error: {0}")]
    Server(String),
    /// Network failure, timeout, or unparseable reply.
    #[error("❌ Connection error: {0}")]
    Transport(String),
}

impl From<ApiError> for ChatError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::Server { detail, .. } => ChatError::Server(detail),
            other => ChatError::Transport(other.to_string()),
        }
    }
}

/// A started turn: the id to complete it with and the text to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub id: TurnId,
    pub message: String,
}

/// Result of completing a turn.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnResolution {
    /// AI reply appended. Carries the trace when the reply had one.
    Answered {
        debug_logs: Option<Vec<DebugLogEntry>>,
    },
    /// System error message appended.
    Failed(ChatError),
    /// Completion did not match the in-flight turn and was dropped.
    Stale,
}

/// Owns the transcript and serializes turns.
#[derive(Debug, Default)]
pub struct ChatSessionController {
    messages: Vec<ChatMessage>,
    in_flight: Option<TurnId>,
    focus_requested: bool,
}

impl ChatSessionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Append an AI message outside of a turn (e.g. the post-upload greeting).
    pub fn push_ai(&mut self, text: impl Into<String>) {
        self.messages.push(ChatMessage::ai(text));
    }

    /// Start a turn: append the user message and a pending placeholder.
    /// Returns None (and changes nothing) for blank text or while a turn is in flight.
    pub fn begin(&mut self, text: &str) -> Option<Turn> {
        let message = text.trim();
        if message.is_empty() {
            return None;
        }
        if let Some(id) = self.in_flight {
            log::warn!("chat turn {} still in flight; ignoring send", id);
            return None;
        }
        let id = Uuid::new_v4();
        self.messages.push(ChatMessage::user(message));
        self.messages.push(ChatMessage::pending());
        self.in_flight = Some(id);
        log::debug!("chat turn {} started", id);
        Some(Turn {
            id,
            message: message.to_string(),
        })
    }

    /// Finish the in-flight turn with the server outcome.
    pub fn complete(&mut self, id: TurnId, result: Result<ChatReply, ApiError>) -> TurnResolution {
        if self.in_flight != Some(id) {
            log::warn!("dropping completion for stale chat turn {}", id);
            return TurnResolution::Stale;
        }
        self.messages.retain(|m| !m.is_pending);
        self.in_flight = None;
        self.focus_requested = true;
        match result {
            Ok(reply) => {
                log::debug!("chat turn {} answered", id);
                self.messages.push(ChatMessage::ai(reply.response));
                TurnResolution::Answered {
                    debug_logs: reply.debug_logs,
                }
            }
            Err(e) => {
                let err = ChatError::from(e);
                log::warn!("chat turn {} failed: {}", id, err);
                self.messages.push(ChatMessage::system(err.to_string()));
                TurnResolution::Failed(err)
            }
        }
    }

    /// True once after a turn resolves; adapters refocus the input when set.
    pub fn take_focus_request(&mut self) -> bool {
        std::mem::take(&mut self.focus_requested)
    }

    /// Clipboard text for the message at `index` (AI messages only).
    pub fn copy_text(&self, index: usize) -> Option<String> {
        self.messages.get(index).and_then(ChatMessage::copy_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(text: &str) -> ChatReply {
        ChatReply {
            response: text.to_string(),
            debug_logs: None,
        }
    }

    #[test]
    fn blank_send_is_noop() {
        let mut c = ChatSessionController::new();
        assert!(c.begin("   ").is_none());
        assert!(c.messages().is_empty());
    }

    #[test]
    fn begin_appends_user_and_placeholder() {
        let mut c = ChatSessionController::new();
        let turn = c.begin("  total spend?  ").unwrap();
        assert_eq!(turn.message, "total spend?");
        assert!(c.is_busy());
        assert_eq!(c.messages().len(), 2);
        assert_eq!(c.messages()[0].role, ChatRole::User);
        assert!(c.messages()[1].is_pending);
        assert!(c.begin("again").is_none());
        assert_eq!(c.messages().len(), 2);
    }

    #[test]
    fn success_replaces_placeholder() {
        let mut c = ChatSessionController::new();
        let turn = c.begin("hi").unwrap();
        let res = c.complete(turn.id, Ok(reply("$420 total")));
        assert!(matches!(res, TurnResolution::Answered { debug_logs: None }));
        assert!(!c.is_busy());
        assert!(c.messages().iter().all(|m| !m.is_pending));
        let last = c.messages().last().unwrap();
        assert_eq!(last.role, ChatRole::Ai);
        assert_eq!(last.text, "$420 total");
        assert!(last.timestamp.is_some());
        assert!(c.take_focus_request());
    }

    #[test]
    fn server_error_becomes_unstamped_system_message() {
        let mut c = ChatSessionController::new();
        let turn = c.begin("hi").unwrap();
        let res = c.complete(
            turn.id,
            Err(ApiError::Server {
                status: 500,
                detail: "agent crashed".into(),
            }),
        );
        assert_eq!(res, TurnResolution::Failed(ChatError::Server("agent crashed".into())));
        let last = c.messages().last().unwrap();
        assert_eq!(last.role, ChatRole::System);
        assert_eq!(last.text, "❌ Error: agent crashed");
        assert!(last.timestamp.is_none());
        assert_eq!(c.messages().iter().filter(|m| m.is_pending).count(), 0);
        assert!(!c.is_busy());
    }

    #[test]
    fn decode_failure_is_connection_error() {
        let mut c = ChatSessionController::new();
        let turn = c.begin("hi").unwrap();
        c.complete(turn.id, Err(ApiError::Decode("expected value".into())));
        assert!(c.messages().last().unwrap().text.starts_with("❌ Connection error:"));
    }

    #[test]
    fn stale_completion_is_dropped() {
        let mut c = ChatSessionController::new();
        let turn = c.begin("hi").unwrap();
        assert_eq!(c.complete(Uuid::new_v4(), Ok(reply("late"))), TurnResolution::Stale);
        assert!(c.is_busy());
        c.complete(turn.id, Ok(reply("ok")));
        assert_eq!(c.complete(turn.id, Ok(reply("dup"))), TurnResolution::Stale);
        assert_eq!(c.messages().iter().filter(|m| m.role == ChatRole::Ai).count(), 1);
    }

    #[test]
    fn copy_only_for_ai_messages() {
        let mut c = ChatSessionController::new();
        let turn = c.begin("![u](http://x/u.png) mine").unwrap();
        c.complete(turn.id, Ok(reply("![logo](http://x/img.png) hello")));
        assert_eq!(c.copy_text(0), None);
        assert_eq!(c.copy_text(1).as_deref(), Some("[Image] hello"));
        assert_eq!(c.copy_text(9), None);
    }
}
