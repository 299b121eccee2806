//! Recent conversation turns for LLM prompts
//!
//! The router keeps one `ConversationContext` per session. It is a bounded
//! window: pushing past the limit drops the oldest turn. Nothing here is
//! persisted.

use std::collections::VecDeque;

/// One handled exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    /// What the user typed
    pub user: String,
    /// What was shown back
    pub reply: String,
}

/// Bounded window of the last turns of one session
#[derive(Debug, Clone)]
pub struct ConversationContext {
    turns: VecDeque<Turn>,
    max_turns: usize,
}

impl ConversationContext {
    pub fn new(max_turns: usize) -> Self {
        Self {
            turns: VecDeque::with_capacity(max_turns),
            max_turns,
        }
    }

    /// Record a turn, dropping the oldest one when the window is full
    pub fn push(&mut self, user: impl Into<String>, reply: impl Into<String>) {
        if self.max_turns == 0 {
            return;
        }
        while self.turns.len() >= self.max_turns {
            self.turns.pop_front();
        }
        self.turns.push_back(Turn {
            user: user.into(),
            reply: reply.into(),
        });
    }

    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Generate a text summary of the window for LLM prompts
    ///
    /// Replies are clipped to their first line; listings add nothing the
    /// model needs.
    pub fn summary(&self) -> String {
        if self.turns.is_empty() {
            return "(no previous messages)\n".into();
        }

        let mut s = String::new();
        for turn in &self.turns {
            s.push_str(&format!("User: {}\n", turn.user));
            let reply = turn.reply.lines().next().unwrap_or_default();
            s.push_str(&format!("Assistant: {}\n", reply));
        }
        s
    }
}

impl Default for ConversationContext {
    fn default() -> Self {
        Self::new(10)
    }
}
