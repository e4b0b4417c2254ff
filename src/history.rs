//! Conversation history storage.
//!
//! Stores recent turns for remote-call context and for display. Uses a
//! fixed-capacity ring buffer to prevent unbounded growth; the engine keeps
//! history purely in memory and it vanishes with the session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The user spoke.
    User,
    /// The assistant replied.
    Assistant,
    /// Session lifecycle notes (activation, deactivation).
    System,
}

/// A recorded conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Who produced the turn.
    pub role: Role,
    /// Turn text.
    pub text: String,
    /// When the turn was recorded.
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    /// Build a turn stamped now.
    #[must_use]
    pub fn now(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Bounded, append-only conversation log.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    /// Turns in insertion order (oldest first).
    turns: VecDeque<ConversationTurn>,
    /// Number of turns handed to remote calls as context.
    context_turns: usize,
    /// Number of turns retained for display.
    display_turns: usize,
}

impl ConversationHistory {
    /// Create a history with the given context and display window sizes.
    ///
    /// Capacity is the larger of the two windows; older turns are evicted.
    #[must_use]
    pub fn new(context_turns: usize, display_turns: usize) -> Self {
        let capacity = context_turns.max(display_turns).max(1);
        Self {
            turns: VecDeque::with_capacity(capacity),
            context_turns,
            display_turns,
        }
    }

    /// Append a turn, evicting the oldest if at capacity.
    pub fn push(&mut self, turn: ConversationTurn) {
        let capacity = self.context_turns.max(self.display_turns).max(1);
        if self.turns.len() >= capacity {
            self.turns.pop_front();
        }
        self.turns.push_back(turn);
    }

    /// The most recent turns passed as context to remote calls,
    /// oldest first.
    #[must_use]
    pub fn context_window(&self) -> Vec<ConversationTurn> {
        self.window(self.context_turns)
    }

    /// The most recent turns for display, oldest first.
    #[must_use]
    pub fn display_window(&self) -> Vec<ConversationTurn> {
        self.window(self.display_turns)
    }

    fn window(&self, n: usize) -> Vec<ConversationTurn> {
        let skip = self.turns.len().saturating_sub(n);
        self.turns.iter().skip(skip).cloned().collect()
    }

    /// Number of turns currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether no turns are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new(5, 5)
    }
}
