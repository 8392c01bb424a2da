//! Per-session state owned by the host application.
//!
//! A [`SessionContext`] holds the active [`VectorIndex`], the chat history and
//! the session persona. The host creates one per user session and passes it by
//! reference into every [`RagEngine`](crate::RagEngine) call; the engine never
//! keeps it.
//!
//! Every [`reset`](SessionContext::reset) bumps an epoch counter. Work started
//! before a reset is only published if the epoch it captured is still current,
//! so results of in-flight calls are discarded after a reset. A second
//! counter tracks the conversation: it also moves when a new index is
//! published or the persona changes, and an answer is only recorded into the
//! conversation it was asked in.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::index::VectorIndex;

/// The opening line a host shows before the first question.
pub const GREETING: &str = "Hello! Upload a document and ask me anything about it.";

/// Who authored a chat turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person asking questions.
    User,
    /// The answering assistant.
    Assistant,
}

/// One message in the chat history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatTurn {
    /// The author of the message.
    pub role: Role,
    /// The message text.
    pub content: String,
    /// When the message was recorded.
    pub at: DateTime<Utc>,
}

impl ChatTurn {
    /// A user message stamped with the current time.
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into(), at: Utc::now() }
    }

    /// An assistant message stamped with the current time.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into(), at: Utc::now() }
    }
}

#[derive(Debug, Default)]
struct SessionState {
    index: Option<Arc<VectorIndex>>,
    history: Vec<ChatTurn>,
    system_instruction: Option<String>,
    epoch: u64,
    conversation: u64,
}

impl SessionState {
    fn clear_history(&mut self) {
        self.history.clear();
        self.conversation += 1;
    }
}

/// A consistent view of the session taken at the start of a question.
#[derive(Debug, Clone)]
pub(crate) struct SessionSnapshot {
    pub index: Arc<VectorIndex>,
    pub history: Vec<ChatTurn>,
    pub system_instruction: Option<String>,
    pub conversation: u64,
}

/// Mutable state for one user session.
#[derive(Debug)]
pub struct SessionContext {
    id: Uuid,
    state: RwLock<SessionState>,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionContext {
    /// Create an empty session with a fresh id.
    pub fn new() -> Self {
        Self { id: Uuid::new_v4(), state: RwLock::new(SessionState::default()) }
    }

    /// Create an empty session with a persona.
    pub fn with_system_instruction(instruction: impl Into<String>) -> Self {
        let state = SessionState {
            system_instruction: Some(instruction.into()),
            ..SessionState::default()
        };
        Self { id: Uuid::new_v4(), state: RwLock::new(state) }
    }

    /// The session id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The assistant's opening line.
    pub fn greeting(&self) -> &'static str {
        GREETING
    }

    /// Discard the index and chat history. Calling it again is harmless.
    ///
    /// Ingestions and questions still running when this is called finish, but
    /// their results are dropped.
    pub async fn reset(&self) {
        let mut state = self.state.write().await;
        state.index = None;
        state.clear_history();
        state.epoch += 1;
        info!(session.id = %self.id, epoch = state.epoch, "session reset");
    }

    /// Whether a document has been ingested since the last reset.
    pub async fn is_ready(&self) -> bool {
        self.state.read().await.index.is_some()
    }

    /// The active index, if any.
    pub async fn index(&self) -> Option<Arc<VectorIndex>> {
        self.state.read().await.index.clone()
    }

    /// A copy of the chat history, oldest first.
    pub async fn history(&self) -> Vec<ChatTurn> {
        self.state.read().await.history.clone()
    }

    /// The session persona, if one is set.
    pub async fn system_instruction(&self) -> Option<String> {
        self.state.read().await.system_instruction.clone()
    }

    /// Change the persona. A different persona clears the chat history; the
    /// index is kept.
    pub async fn set_system_instruction(&self, instruction: Option<String>) {
        let mut state = self.state.write().await;
        if state.system_instruction != instruction {
            state.system_instruction = instruction;
            state.clear_history();
            info!(session.id = %self.id, "persona changed, chat history cleared");
        }
    }

    pub(crate) async fn epoch(&self) -> u64 {
        self.state.read().await.epoch
    }

    /// Install `index` if no reset happened since `epoch` was read.
    ///
    /// The previous index is replaced wholesale and the chat history cleared.
    pub(crate) async fn publish(&self, epoch: u64, index: Arc<VectorIndex>) -> bool {
        let mut state = self.state.write().await;
        if state.epoch != epoch {
            debug!(session.id = %self.id, expected = epoch, current = state.epoch, "stale index dropped");
            return false;
        }
        state.index = Some(index);
        state.clear_history();
        true
    }

    pub(crate) async fn snapshot(&self) -> Option<SessionSnapshot> {
        let state = self.state.read().await;
        let index = state.index.clone()?;
        Some(SessionSnapshot {
            index,
            history: state.history.clone(),
            system_instruction: state.system_instruction.clone(),
            conversation: state.conversation,
        })
    }

    #[cfg(test)]
    async fn conversation(&self) -> u64 {
        self.state.read().await.conversation
    }

    /// Append a question and its answer if the history has not been cleared
    /// since `conversation` was read.
    pub(crate) async fn record_exchange(&self, conversation: u64, question: &str, answer: &str) -> bool {
        let mut state = self.state.write().await;
        if state.conversation != conversation {
            return false;
        }
        state.history.push(ChatTurn::user(question));
        state.history.push(ChatTurn::assistant(answer));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{IndexEntry, Passage};

    fn tiny_index() -> Arc<VectorIndex> {
        let passage = Passage {
            index: 0,
            document_name: "doc.txt".into(),
            text: "text".into(),
            char_range: 0..4,
            segments: 0..=0,
        };
        Arc::new(VectorIndex::build(vec![IndexEntry::new(vec![1.0], passage)]).unwrap())
    }

    #[tokio::test]
    async fn publish_after_reset_is_rejected() {
        let session = SessionContext::new();
        let epoch = session.epoch().await;
        session.reset().await;
        assert!(!session.publish(epoch, tiny_index()).await);
        assert!(!session.is_ready().await);

        let epoch = session.epoch().await;
        assert!(session.publish(epoch, tiny_index()).await);
        assert!(session.is_ready().await);
    }

    #[tokio::test]
    async fn reset_is_idempotent() {
        let session = SessionContext::new();
        session.reset().await;
        session.reset().await;
        assert!(!session.is_ready().await);
        assert!(session.history().await.is_empty());
    }

    #[tokio::test]
    async fn persona_change_clears_history_but_keeps_index() {
        let session = SessionContext::with_system_instruction("Be formal.");
        let epoch = session.epoch().await;
        session.publish(epoch, tiny_index()).await;
        session.record_exchange(session.conversation().await, "q", "a").await;
        assert_eq!(session.history().await.len(), 2);

        session.set_system_instruction(Some("Be formal.".into())).await;
        assert_eq!(session.history().await.len(), 2);

        session.set_system_instruction(Some("Be casual.".into())).await;
        assert!(session.history().await.is_empty());
        assert!(session.is_ready().await);
        assert_eq!(session.system_instruction().await.as_deref(), Some("Be casual."));
    }

    #[tokio::test]
    async fn exchanges_after_reset_are_not_recorded() {
        let session = SessionContext::new();
        let conversation = session.conversation().await;
        session.reset().await;
        assert!(!session.record_exchange(conversation, "q", "a").await);
        assert!(session.history().await.is_empty());
    }

    #[tokio::test]
    async fn exchanges_across_a_persona_change_are_not_recorded() {
        let session = SessionContext::with_system_instruction("Be formal.");
        let epoch = session.epoch().await;
        session.publish(epoch, tiny_index()).await;
        let conversation = session.snapshot().await.unwrap().conversation;

        session.set_system_instruction(Some("Be casual.".into())).await;

        assert!(!session.record_exchange(conversation, "q", "formal answer").await);
        assert!(session.history().await.is_empty());
        assert_eq!(session.epoch().await, epoch);
        assert!(session.is_ready().await);
    }

    #[tokio::test]
    async fn a_new_index_starts_a_new_conversation() {
        let session = SessionContext::new();
        let epoch = session.epoch().await;
        session.publish(epoch, tiny_index()).await;
        let conversation = session.conversation().await;

        session.publish(epoch, tiny_index()).await;

        assert!(!session.record_exchange(conversation, "q", "a").await);
        let current = session.conversation().await;
        assert!(session.record_exchange(current, "q", "a").await);
        assert_eq!(session.history().await.len(), 2);
    }
}
