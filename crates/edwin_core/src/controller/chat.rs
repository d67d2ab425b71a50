//! crates/edwin_core/src/controller/chat.rs

use std::sync::Arc;
use tracing::{error, info, warn};

use super::control::BusyGuard;
use crate::domain::ChatMessage;
use crate::ports::{Control, HostPage, PanelView, PortResult, StatusArea, StatusKind};
use crate::state::ClientState;

pub const OFFLINE_REPLY: &str = "I'm currently offline. Please check your connection and try again.";
pub const BACKEND_TROUBLE_REPLY: &str =
    "I'm having trouble connecting to my knowledge base. Please try again in a moment.";
const OFF_COURSE: &str = "Please navigate to a Canvas course page to chat with Edwin";

/// The chat transcript: questions go out in order and answers are appended
/// in the order they arrive.
pub struct ChatController {
    state: Arc<ClientState>,
    view: Arc<dyn PanelView>,
}

impl ChatController {
    pub fn new(state: Arc<ClientState>, view: Arc<dyn PanelView>) -> Self {
        Self { state, view }
    }

    /// Sends one question. Returns the reply that was appended, if any.
    ///
    /// Transport failures are answered with a canned reply instead of an
    /// error, so the transcript always gets a response.
    pub async fn send_message(&self, page: &dyn HostPage, text: &str) -> PortResult<Option<ChatMessage>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }

        let Some(ctx) = self.state.course_context(page)? else {
            self.view.show_status(StatusArea::Chat, StatusKind::Error, OFF_COURSE);
            return Ok(None);
        };

        self.view
            .append_message(&ChatMessage::from_user(text, self.state.clock.now()));

        let result = {
            let _busy = BusyGuard::engage(self.view.as_ref(), Control::SendMessage, "Thinking...");
            self.state.backend.send_message(&ctx, text).await
        };

        let now = self.state.clock.now();
        let reply = match result {
            Ok(reply) => {
                let mut message = ChatMessage::from_edwin(reply.answer, now);
                message.grounded = Some(reply.grounded);
                message.citations = reply.citations;
                message
            }
            Err(e) if e.is_offline() => {
                warn!(error = %e, "Backend unreachable while chatting");
                self.view.set_backend_online(false);
                ChatMessage::from_edwin(OFFLINE_REPLY, now)
            }
            Err(e) => {
                error!(error = %e, "Chat request failed");
                self.view
                    .show_status(StatusArea::Chat, StatusKind::Error, &e.to_string());
                ChatMessage::from_edwin(BACKEND_TROUBLE_REPLY, now)
            }
        };

        self.view.append_message(&reply);
        Ok(Some(reply))
    }

    /// Starts a fresh conversation; the transcript is cleared only on success.
    pub async fn new_conversation(&self, page: &dyn HostPage) -> PortResult<Option<String>> {
        let Some(ctx) = self.state.course_context(page)? else {
            self.view.show_status(StatusArea::Chat, StatusKind::Error, OFF_COURSE);
            return Ok(None);
        };

        let result = {
            let _busy = BusyGuard::engage(self.view.as_ref(), Control::NewConversation, "Starting...");
            self.state.backend.new_conversation(&ctx).await
        };

        match result {
            Ok(started) => {
                info!(conversation_id = ?started.conversation_id, "Conversation started");
                self.view.clear_messages();
                if let Some(greeting) = started.message {
                    self.view
                        .append_message(&ChatMessage::from_edwin(greeting, self.state.clock.now()));
                }
                Ok(started.conversation_id)
            }
            Err(e) => {
                error!(error = %e, "Failed to start conversation");
                if e.is_offline() {
                    self.view.set_backend_online(false);
                }
                self.view.show_status(
                    StatusArea::Chat,
                    StatusKind::Error,
                    &format!("Failed to start new conversation: {}", e),
                );
                Ok(None)
            }
        }
    }
}
