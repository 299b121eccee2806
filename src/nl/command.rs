//! Structured commands produced by classification
//!
//! A `Command` is built once per utterance (by the lexicon + extractor or by
//! the language model) and consumed by the router. It is never mutated.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The closed set of actions the chat surface understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommandKind {
    ListBoards,
    CreateBoard,
    DeleteBoard,
    ListLists,
    CreateList,
    ListCards,
    CreateCard,
    ArchiveCard,
    ListActivity,
    SearchCard,
    /// Affirmative reply to a pending confirmation
    Confirm,
    /// Negative reply to a pending confirmation
    Cancel,
    /// Could not determine intent
    Unknown,
}

impl CommandKind {
    /// Every kind, in declaration order
    pub const ALL: [CommandKind; 13] = [
        CommandKind::ListBoards,
        CommandKind::CreateBoard,
        CommandKind::DeleteBoard,
        CommandKind::ListLists,
        CommandKind::CreateList,
        CommandKind::ListCards,
        CommandKind::CreateCard,
        CommandKind::ArchiveCard,
        CommandKind::ListActivity,
        CommandKind::SearchCard,
        CommandKind::Confirm,
        CommandKind::Cancel,
        CommandKind::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CommandKind::ListBoards => "list-boards",
            CommandKind::CreateBoard => "create-board",
            CommandKind::DeleteBoard => "delete-board",
            CommandKind::ListLists => "list-lists",
            CommandKind::CreateList => "create-list",
            CommandKind::ListCards => "list-cards",
            CommandKind::CreateCard => "create-card",
            CommandKind::ArchiveCard => "archive-card",
            CommandKind::ListActivity => "list-activity",
            CommandKind::SearchCard => "search-card",
            CommandKind::Confirm => "confirm",
            CommandKind::Cancel => "cancel",
            CommandKind::Unknown => "unknown",
        }
    }

    /// Dispatch causes an irreversible external change
    pub fn is_destructive(self) -> bool {
        matches!(self, CommandKind::DeleteBoard)
    }

    /// Read-only; eligible for the response cache
    pub fn is_cacheable(self) -> bool {
        matches!(
            self,
            CommandKind::ListBoards
                | CommandKind::ListLists
                | CommandKind::ListCards
                | CommandKind::ListActivity
                | CommandKind::SearchCard
        )
    }

    /// Changes external state
    pub fn is_mutation(self) -> bool {
        matches!(
            self,
            CommandKind::CreateBoard
                | CommandKind::DeleteBoard
                | CommandKind::CreateList
                | CommandKind::CreateCard
                | CommandKind::ArchiveCard
        )
    }

    /// Kinds the language model may answer with
    ///
    /// Confirmation replies are only ever recognised by vocabulary.
    pub fn is_classifiable(self) -> bool {
        !matches!(
            self,
            CommandKind::Confirm | CommandKind::Cancel | CommandKind::Unknown
        )
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        CommandKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| format!("Unknown command kind: {}", s))
    }
}

/// Names of the typed values a command can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Param {
    BoardId,
    /// Board URL exactly as the user typed it; display only
    BoardUrl,
    BoardName,
    ListId,
    ListName,
    Name,
    Description,
    CardName,
    Limit,
}

impl Param {
    pub const ALL: [Param; 9] = [
        Param::BoardId,
        Param::BoardUrl,
        Param::BoardName,
        Param::ListId,
        Param::ListName,
        Param::Name,
        Param::Description,
        Param::CardName,
        Param::Limit,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Param::BoardId => "board_id",
            Param::BoardUrl => "board_url",
            Param::BoardName => "board_name",
            Param::ListId => "list_id",
            Param::ListName => "list_name",
            Param::Name => "name",
            Param::Description => "description",
            Param::CardName => "card_name",
            Param::Limit => "limit",
        }
    }

    /// Whether the value takes part in cache-key derivation
    pub fn is_display_only(self) -> bool {
        matches!(self, Param::BoardUrl)
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Param {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        Param::ALL
            .into_iter()
            .find(|param| param.as_str() == normalized)
            .ok_or_else(|| format!("Unknown parameter: {}", s))
    }
}

/// Extracted parameter values; an absent key means "not found"
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Params(BTreeMap<Param, String>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value, ignoring blank strings
    pub fn set(&mut self, param: Param, value: impl Into<String>) {
        let value = value.into();
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            self.0.insert(param, trimmed.to_string());
        }
    }

    pub fn with(mut self, param: Param, value: impl Into<String>) -> Self {
        self.set(param, value);
        self
    }

    pub fn get(&self, param: Param) -> Option<&str> {
        self.0.get(&param).map(String::as_str)
    }

    pub fn contains(&self, param: Param) -> bool {
        self.0.contains_key(&param)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Param, &str)> {
        self.0.iter().map(|(param, value)| (*param, value.as_str()))
    }
}

/// Which tier produced a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandSource {
    Pattern,
    Llm,
}

/// One classified utterance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub kind: CommandKind,
    pub params: Params,
    pub source: CommandSource,
    /// Classifier confidence (0.0 - 1.0)
    pub confidence: f32,
}

impl Command {
    pub fn new(kind: CommandKind, params: Params, source: CommandSource, confidence: f32) -> Self {
        Self {
            kind,
            params,
            source,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// The "no intent found" result
    pub fn unknown(source: CommandSource) -> Self {
        Self::new(CommandKind::Unknown, Params::new(), source, 0.0)
    }

    /// Cache key: kind plus every identity-bearing parameter, in a stable order
    ///
    /// Display-only values (the raw board URL) are left out, so the URL and
    /// the bare-id phrasings of the same request share one key.
    pub fn cache_key(&self) -> String {
        let mut key = self.kind.as_str().to_string();
        for (param, value) in self.params.iter() {
            if param.is_display_only() {
                continue;
            }
            key.push('|');
            key.push_str(param.as_str());
            key.push('=');
            key.push_str(&key_value(param, value));
        }
        key
    }
}

/// Ids are case-sensitive; free-text names are not
fn key_value(param: Param, value: &str) -> String {
    match param {
        Param::BoardId | Param::ListId => value.to_string(),
        _ => value.to_lowercase(),
    }
}
