//! Core type definitions used throughout the codebase

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies one chat conversation
///
/// All per-conversation state (pending confirmations, prior turns) is keyed
/// by this value, so two sessions never observe each other's state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// A fresh random session
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// A session with a caller-chosen name (user handle, channel id, ...)
    pub fn named(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
