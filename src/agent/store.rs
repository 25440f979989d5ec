//! Process-wide conversation history.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::resilience::ExpiringCache;
use crate::types::{Message, SessionId};

/// Bounds for [`ConversationStore`].
#[derive(Debug, Clone)]
pub struct ConversationConfig {
    pub max_sessions: usize,
    /// A session not saved for this long is forgotten.
    pub session_ttl: Duration,
    pub max_messages: usize,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_sessions: 10_000,
            session_ttl: Duration::from_secs(86_400),
            max_messages: 40,
        }
    }
}

impl ConversationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_sessions(mut self, n: usize) -> Self {
        self.max_sessions = n;
        self
    }

    pub fn session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    pub fn max_messages(mut self, n: usize) -> Self {
        self.max_messages = n.max(1);
        self
    }
}

/// History of every session, shared by all tenant agents.
///
/// Sessions are isolated by key only. A load-modify-save cycle is not atomic,
/// so callers must hold the session's lock for the whole turn.
#[derive(Debug)]
pub struct ConversationStore {
    sessions: Mutex<ExpiringCache<SessionId, Vec<Message>>>,
    max_messages: usize,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new(ConversationConfig::default())
    }
}

impl ConversationStore {
    pub fn new(config: ConversationConfig) -> Self {
        Self {
            sessions: Mutex::new(ExpiringCache::new(config.max_sessions, config.session_ttl)),
            max_messages: config.max_messages.max(1),
        }
    }

    /// History of `session`, oldest first. Unknown or expired sessions are empty.
    pub fn load(&self, session: SessionId) -> Vec<Message> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&session)
            .unwrap_or_default()
    }

    /// Replace the history of `session`, restarting its idle timer.
    pub fn save(&self, session: SessionId, mut messages: Vec<Message>) {
        trim_history(&mut messages, self.max_messages);
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session, messages);
    }

    pub fn forget(&self, session: SessionId) {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&session);
    }

    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Keep at most `max` trailing messages, starting on a user message so no
/// tool result is left without the call that produced it.
///
/// When the window holds no user message, a single turn is longer than
/// `max`; the cut moves back to that turn's user message so the turn is kept
/// whole.
fn trim_history(messages: &mut Vec<Message>, max: usize) {
    if messages.len() <= max {
        return;
    }
    let cut = messages.len() - max;
    let start = (cut..messages.len())
        .find(|&i| messages[i].is_user())
        .or_else(|| (0..cut).rev().find(|&i| messages[i].is_user()))
        .unwrap_or(0);
    messages.drain(..start);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToolCall;

    fn turn(n: usize) -> Vec<Message> {
        vec![
            Message::user(format!("q{n}")),
            Message::assistant_with_tool_calls("", vec![ToolCall::new("c", "search_catalog", "{}")]),
            Message::tool_result("c", "r"),
            Message::assistant(format!("a{n}")),
        ]
    }

    #[test]
    fn trim_starts_on_a_user_message() {
        let mut history: Vec<Message> = (0..3).flat_map(turn).collect();
        trim_history(&mut history, 6);
        assert_eq!(history.len(), 4);
        assert_eq!(history[0], Message::user("q2"));
    }

    #[test]
    fn turn_longer_than_limit_is_kept_whole() {
        let mut long_turn = vec![Message::user("q")];
        for i in 0..3 {
            let id = format!("c{i}");
            long_turn.push(Message::assistant_with_tool_calls(
                "",
                vec![ToolCall::new(&id, "search_catalog", "{}")],
            ));
            long_turn.push(Message::tool_result(&id, "r"));
        }
        long_turn.push(Message::assistant("a"));

        let mut history: Vec<Message> = turn(0).into_iter().chain(long_turn.clone()).collect();
        trim_history(&mut history, 4);
        assert_eq!(history, long_turn);

        let store = ConversationStore::new(ConversationConfig::new().max_messages(1));
        store.save(1, turn(0));
        assert_eq!(store.load(1), turn(0));
    }

    #[test]
    fn save_and_load_are_per_session() {
        let store = ConversationStore::new(ConversationConfig::new().max_messages(10));
        store.save(1, turn(0));
        assert_eq!(store.load(1).len(), 4);
        assert!(store.load(2).is_empty());

        store.forget(1);
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn idle_sessions_expire() {
        let store = ConversationStore::new(
            ConversationConfig::new().session_ttl(Duration::from_secs(60)),
        );
        store.save(9, turn(0));
        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(store.load(9).len(), 4);
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(store.load(9).is_empty());
    }
}
