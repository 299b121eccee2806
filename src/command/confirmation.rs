//! Two-step confirmation for destructive commands
//!
//! Per session the gate is either idle or holding exactly one
//! `PendingAction`. Only an affirmative reply turns a pending action into a
//! `ConfirmedAction`, and that type has no public constructor, so the
//! dispatcher cannot be handed a deletion that skipped this gate.
//!
//! Expiry is checked when the session is next looked at; there are no timers.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use ahash::AHashMap;
use tokio::time::Instant;

use crate::core::types::SessionId;
use crate::nl::command::CommandKind;

/// Whole-utterance replies that confirm a pending action
pub const AFFIRMATIVE: &[&str] = &[
    "sim", "s", "yes", "y", "confirmar", "confirmo", "confirma", "pode", "concordo", "ok",
];

/// Whole-utterance replies that cancel a pending action
pub const NEGATIVE: &[&str] = &[
    "não", "nao", "n", "no", "cancelar", "cancela", "cancelo", "parar",
];

/// A reply to a confirmation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Affirmative,
    Negative,
}

impl Reply {
    /// Recognise a whole-utterance reply ("sim", "Não!", "ok.")
    pub fn parse(utterance: &str) -> Option<Reply> {
        let word = utterance
            .trim()
            .trim_end_matches(['.', '!'])
            .trim()
            .to_lowercase();
        if AFFIRMATIVE.contains(&word.as_str()) {
            Some(Reply::Affirmative)
        } else if NEGATIVE.contains(&word.as_str()) {
            Some(Reply::Negative)
        } else {
            None
        }
    }

    /// The reply a lexicon kind stands for, if it is one
    pub fn from_kind(kind: CommandKind) -> Option<Reply> {
        match kind {
            CommandKind::Confirm => Some(Reply::Affirmative),
            CommandKind::Cancel => Some(Reply::Negative),
            _ => None,
        }
    }
}

/// A destructive command waiting for the user's "sim"
#[derive(Debug, Clone, PartialEq)]
pub struct PendingAction {
    pub action_kind: CommandKind,
    pub target_entity_id: String,
    /// Human-readable name of the target, shown in prompts
    pub target_entity_label: String,
    pub requested_at: Instant,
    pub ttl: Duration,
}

impl PendingAction {
    pub fn new(
        action_kind: CommandKind,
        target_entity_id: impl Into<String>,
        target_entity_label: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        Self {
            action_kind,
            target_entity_id: target_entity_id.into(),
            target_entity_label: target_entity_label.into(),
            requested_at: Instant::now(),
            ttl,
        }
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.requested_at) >= self.ttl
    }

    fn same_target(&self, other: &PendingAction) -> bool {
        self.action_kind == other.action_kind && self.target_entity_id == other.target_entity_id
    }
}

/// A pending action that received an affirmative reply in time
///
/// Only the gate creates these.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmedAction(PendingAction);

impl ConfirmedAction {
    pub fn action(&self) -> &PendingAction {
        &self.0
    }
}

/// What happened when a new destructive request was held
#[derive(Debug, Clone, PartialEq)]
pub enum Hold {
    /// Session was idle
    Fresh,
    /// Same target was already pending; its clock was restarted
    Refreshed,
    /// A pending action for a different target was dropped
    Replaced(PendingAction),
}

/// Outcome of feeding a reply to the gate
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Confirmed(ConfirmedAction),
    Cancelled(PendingAction),
    /// The action lapsed before the reply arrived; it was discarded
    Expired(PendingAction),
    NothingPending,
}

/// Per-session table of pending destructive actions
#[derive(Debug, Default)]
pub struct ConfirmationGate {
    pending: Mutex<AHashMap<SessionId, PendingAction>>,
}

impl ConfirmationGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter (or stay in) pending-confirmation with `action`
    pub fn hold(&self, session: &SessionId, action: PendingAction) -> Hold {
        let now = Instant::now();
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);

        match pending.insert(session.clone(), action) {
            None => Hold::Fresh,
            Some(previous) if previous.is_expired_at(now) => Hold::Fresh,
            Some(previous) => {
                let current = &pending[session];
                if previous.same_target(current) {
                    Hold::Refreshed
                } else {
                    Hold::Replaced(previous)
                }
            }
        }
    }

    /// Apply a confirmation reply; the session is idle afterwards
    pub fn resolve(&self, session: &SessionId, reply: Reply) -> Resolution {
        let now = Instant::now();
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);

        let Some(action) = pending.remove(session) else {
            return Resolution::NothingPending;
        };

        if action.is_expired_at(now) {
            return Resolution::Expired(action);
        }

        match reply {
            Reply::Affirmative => Resolution::Confirmed(ConfirmedAction(action)),
            Reply::Negative => Resolution::Cancelled(action),
        }
    }

    /// Current pending action, if any and still live
    pub fn pending(&self, session: &SessionId) -> Option<PendingAction> {
        let now = Instant::now();
        let pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending
            .get(session)
            .filter(|action| !action.is_expired_at(now))
            .cloned()
    }

    /// Drop the session's pending action if it has lapsed, returning it
    pub fn discard_expired(&self, session: &SessionId) -> Option<PendingAction> {
        let now = Instant::now();
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if pending.get(session)?.is_expired_at(now) {
            pending.remove(session)
        } else {
            None
        }
    }

    /// Whether the session holds an entry at all, expired or not
    pub fn has_entry(&self, session: &SessionId) -> bool {
        let pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.contains_key(session)
    }
}
