//! Session composition root.
//!
//! [`SessionState`] is the pure transition layer: intents in, effects out, completions
//! fed back. It never performs I/O, so adapters (CLI, desktop) decide how and where the
//! upload/chat calls run. [`Session`] is the simple driver that awaits each effect inline.

use crate::api::{ApiError, Backend, ChatReply, RawFile, UploadResponse};
use crate::chat::{ChatSessionController, TurnId, TurnResolution};
use crate::config::QuickAction;
use crate::debug_log::DebugLogPresenter;
use crate::upload::{RemovalNotice, UploadCoordinator};

/// Greeting appended after every successful upload.
pub const READY_MESSAGE: &str = "✨ I've analyzed your statement. What would you like to know?";

/// Something the user did.
#[derive(Debug, Clone)]
pub enum Intent {
    Upload {
        files: Vec<RawFile>,
        password: Option<String>,
    },
    Send(String),
    /// Index into the configured quick actions.
    QuickAction(usize),
    RemoveFile(usize),
    /// Index into the transcript.
    Copy(usize),
    ToggleDebug,
}

/// I/O the adapter must perform on behalf of the state.
#[derive(Debug, Clone)]
pub enum Effect {
    /// Send the upload; feed the result to [`SessionState::upload_finished`].
    Upload {
        files: Vec<RawFile>,
        password: Option<String>,
    },
    /// Send the chat message; feed the result to [`SessionState::chat_finished`].
    Chat { turn: TurnId, message: String },
    /// Put text on the clipboard. Failures are logged, never shown.
    CopyToClipboard(String),
}

/// All state of one session. Discarded when the app exits.
#[derive(Debug)]
pub struct SessionState {
    pub upload: UploadCoordinator,
    pub chat: ChatSessionController,
    pub debug: DebugLogPresenter,
    quick_actions: Vec<QuickAction>,
    /// Set by a successful upload, cleared when the last file is removed.
    chat_enabled: bool,
}

impl SessionState {
    pub fn new(quick_actions: Vec<QuickAction>) -> Self {
        Self {
            upload: UploadCoordinator::new(),
            chat: ChatSessionController::new(),
            debug: DebugLogPresenter::new(),
            quick_actions,
            chat_enabled: false,
        }
    }

    pub fn quick_actions(&self) -> &[QuickAction] {
        &self.quick_actions
    }

    /// Chat input and send/quick-action buttons are enabled.
    pub fn can_chat(&self) -> bool {
        self.chat_enabled && !self.upload.files().is_empty() && !self.chat.is_busy()
    }

    /// Apply a user intent. Returns the effect to run, if any.
    pub fn apply(&mut self, intent: Intent) -> Option<Effect> {
        match intent {
            Intent::Upload { files, password } => {
                let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
                match self.upload.begin(&names) {
                    Ok(true) => Some(Effect::Upload {
                        files,
                        password: password.filter(|p| !p.is_empty()),
                    }),
                    Ok(false) | Err(_) => None,
                }
            }
            Intent::Send(text) => self.send(&text),
            Intent::QuickAction(index) => {
                let query = self.quick_actions.get(index)?.query.clone();
                self.send(&query)
            }
            Intent::RemoveFile(index) => {
                if self.upload.remove_file_locally(index) == Some(RemovalNotice::Cleared) {
                    self.chat_enabled = false;
                }
                None
            }
            Intent::Copy(index) => self.chat.copy_text(index).map(Effect::CopyToClipboard),
            Intent::ToggleDebug => {
                self.debug.toggle();
                None
            }
        }
    }

    fn send(&mut self, text: &str) -> Option<Effect> {
        if !self.can_chat() {
            log::debug!("chat unavailable; ignoring send");
            return None;
        }
        let turn = self.chat.begin(text)?;
        Some(Effect::Chat {
            turn: turn.id,
            message: turn.message,
        })
    }

    /// Feed back the result of an [`Effect::Upload`].
    pub fn upload_finished(&mut self, result: Result<UploadResponse, ApiError>) {
        if self.upload.complete(result).is_ok() {
            self.chat_enabled = true;
            self.chat.push_ai(READY_MESSAGE);
        }
    }

    /// Feed back the result of an [`Effect::Chat`].
    pub fn chat_finished(&mut self, turn: TurnId, result: Result<ChatReply, ApiError>) {
        if let TurnResolution::Answered {
            debug_logs: Some(logs),
        } = self.chat.complete(turn, result)
        {
            self.debug.render(Some(logs.as_slice()));
        }
    }
}

/// Drives a [`SessionState`] against a [`Backend`], awaiting each call inline.
pub struct Session<B: Backend> {
    backend: B,
    state: SessionState,
}

impl<B: Backend> Session<B> {
    pub fn new(backend: B, quick_actions: Vec<QuickAction>) -> Self {
        Self {
            backend,
            state: SessionState::new(quick_actions),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut SessionState {
        &mut self.state
    }

    /// Apply `intent` and run its network effect to completion.
    /// Returns effects the caller must perform itself (clipboard).
    pub async fn handle(&mut self, intent: Intent) -> Option<Effect> {
        match self.state.apply(intent)? {
            Effect::Upload { files, password } => {
                let result = self.backend.upload(&files, password.as_deref()).await;
                self.state.upload_finished(result);
                None
            }
            Effect::Chat { turn, message } => {
                let result = self.backend.chat(&message).await;
                self.state.chat_finished(turn, result);
                None
            }
            other => Some(other),
        }
    }
}
