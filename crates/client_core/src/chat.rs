use std::sync::{Mutex, MutexGuard, PoisonError};

use reqwest::Client;
use shared::{
    domain::{Message, Role},
    protocol::{AnswerRequest, AnswerResponse},
};
use tokio::sync::broadcast;
use tracing::warn;

use crate::{error::AskError, ClientEvent, ANSWER_TOP_K};

/// Snapshot of the chat exchange: the ordered transcript plus the busy flag.
#[derive(Default, Debug, Clone)]
pub struct ChatSession {
    pub transcript: Vec<Message>,
    pub pending: bool,
}

pub struct ChatController {
    http: Client,
    server_url: String,
    session: Mutex<ChatSession>,
    events: broadcast::Sender<ClientEvent>,
}

impl ChatController {
    pub(crate) fn new(
        http: Client,
        server_url: String,
        events: broadcast::Sender<ClientEvent>,
    ) -> Self {
        Self {
            http,
            server_url,
            session: Mutex::new(ChatSession::default()),
            events,
        }
    }

    pub fn snapshot(&self) -> ChatSession {
        self.lock_session().clone()
    }

    /// Sends `text` to the answering service and appends both sides of the
    /// exchange to the transcript. Whitespace-only input is silently ignored;
    /// a submission while another is pending is rejected, not queued.
    pub async fn submit(&self, text: &str) -> Result<(), AskError> {
        if text.trim().is_empty() {
            return Ok(());
        }

        let question = Message::new(Role::User, text);
        {
            let mut session = self.lock_session();
            if session.pending {
                return Err(AskError::AlreadyPending);
            }
            session.pending = true;
            session.transcript.push(question.clone());
        }
        let _ = self.events.send(ClientEvent::MessageAppended(question));
        let _ = self.events.send(ClientEvent::ChatPendingChanged(true));

        // Pending is released on every exit path below, error returns included.
        let _resolve = PendingReset { controller: self };
        let answer = self.request_answer(text).await.map_err(|err| {
            warn!("chat: answer request failed: {err}");
            let _ = self.events.send(ClientEvent::Error(err.to_string()));
            err
        })?;

        let reply = Message::new(Role::Assistant, answer);
        {
            let mut session = self.lock_session();
            session.pending = false;
            session.transcript.push(reply.clone());
        }
        let _ = self.events.send(ClientEvent::MessageAppended(reply));
        let _ = self.events.send(ClientEvent::ChatPendingChanged(false));
        Ok(())
    }

    async fn request_answer(&self, query: &str) -> Result<String, AskError> {
        let response = self
            .http
            .post(format!("{}/message", self.server_url))
            .json(&AnswerRequest {
                query: query.to_string(),
                top_k: ANSWER_TOP_K,
            })
            .send()
            .await
            .map_err(AskError::Transport)?
            .error_for_status()
            .map_err(AskError::Rejected)?;
        let body: AnswerResponse = response.json().await.map_err(AskError::MalformedAnswer)?;
        Ok(body.answer)
    }

    fn lock_session(&self) -> MutexGuard<'_, ChatSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct PendingReset<'a> {
    controller: &'a ChatController,
}

impl Drop for PendingReset<'_> {
    fn drop(&mut self) {
        let mut session = self.controller.lock_session();
        if session.pending {
            session.pending = false;
            drop(session);
            let _ = self
                .controller
                .events
                .send(ClientEvent::ChatPendingChanged(false));
        }
    }
}

#[cfg(test)]
#[path = "tests/chat_tests.rs"]
mod tests;
