//! Conversation sessions and the per-id session store owned by a serving
//! layer.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::model::conversation_turn::{ConversationTurn, Role};

/// Ordered, append-only turn log.
///
/// The initial state is the instructions (system turn, when configured)
/// followed by the greeting (assistant turn). `reset` restores exactly that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSession {
    instructions: Option<String>,
    greeting: String,
    turns: Vec<ConversationTurn>,
}

impl ConversationSession {
    pub fn start(instructions: Option<String>, greeting: impl Into<String>) -> Self {
        let mut session = Self {
            instructions,
            greeting: greeting.into(),
            turns: Vec::new(),
        };
        session.reset();
        session
    }

    /// Discard every turn and return to the initial state.
    pub fn reset(&mut self) {
        self.turns.clear();
        if let Some(instructions) = &self.instructions {
            self.turns.push(ConversationTurn::system(instructions.clone()));
        }
        self.turns.push(ConversationTurn::assistant(self.greeting.clone()));
    }

    pub fn append_user(&mut self, text: impl Into<String>) {
        self.turns.push(ConversationTurn::user(text));
    }

    pub fn append_assistant(&mut self, text: impl Into<String>) {
        self.turns.push(ConversationTurn::assistant(text));
    }

    pub fn as_context(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn greeting(&self) -> &str {
        &self.greeting
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// Context for one fallback call: `turns`, with `system_text` prepended when
/// the first turn is not already a system turn. `turns` is never modified.
pub fn as_context_with_system(
    turns: &[ConversationTurn],
    system_text: &str,
) -> Vec<ConversationTurn> {
    let has_system = turns.first().is_some_and(|t| t.role == Role::System);
    let mut context = Vec::with_capacity(turns.len() + usize::from(!has_system));
    if !has_system {
        context.push(ConversationTurn::system(system_text));
    }
    context.extend_from_slice(turns);
    context
}

type SharedSession = Arc<tokio::sync::Mutex<ConversationSession>>;

/// Sessions keyed by caller-supplied id. Turns within one session are
/// serialised by the session's own async mutex; distinct sessions never
/// contend beyond the short map lookup.
pub struct SessionStore {
    instructions: Option<String>,
    greeting: String,
    sessions: Mutex<HashMap<String, SharedSession>>,
}

impl SessionStore {
    pub fn new(instructions: Option<String>, greeting: impl Into<String>) -> Self {
        Self {
            instructions,
            greeting: greeting.into(),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Session for `id`, created in its initial state on first use.
    pub fn session(&self, id: &str) -> SharedSession {
        let mut sessions = self.sessions.lock();
        Arc::clone(sessions.entry(id.to_string()).or_insert_with(|| {
            Arc::new(tokio::sync::Mutex::new(ConversationSession::start(
                self.instructions.clone(),
                self.greeting.clone(),
            )))
        }))
    }

    /// Reset the session for `id` by dropping it from the store. The next
    /// `session(id)` recreates it in the initial state. Idempotent; unknown
    /// ids are a no-op. A caller still holding the old handle keeps its turns
    /// but they are no longer reachable by id.
    pub fn reset(&self, id: &str) -> bool {
        self.sessions.lock().remove(id).is_some()
    }

    /// Greeting every session starts with.
    pub fn greeting(&self) -> &str {
        &self.greeting
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}
