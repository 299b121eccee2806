//! Pattern table for the fast classification tier
//!
//! The lexicon is an ordered list of (pattern, kind) entries. Matching walks
//! the list in declaration order and the first entry that matches wins, so
//! the order is part of the behavior: the URL and id phrasings of "delete
//! board" sit above the bare phrasing, and confirmation replies sit above
//! everything.

use std::sync::OnceLock;

use regex::Regex;

use crate::command::confirmation::{AFFIRMATIVE, NEGATIVE};
use crate::nl::command::CommandKind;

/// One (pattern → kind) row of the table
#[derive(Debug, Clone)]
pub struct LexiconEntry {
    pub label: String,
    pub pattern: Regex,
    pub kind: CommandKind,
    /// How much a hit on this entry is trusted (0.0 - 1.0)
    pub confidence: f32,
}

impl LexiconEntry {
    pub fn new(
        label: impl Into<String>,
        pattern: &str,
        kind: CommandKind,
        confidence: f32,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            label: label.into(),
            pattern: Regex::new(pattern)?,
            kind,
            confidence: confidence.clamp(0.0, 1.0),
        })
    }
}

/// A successful lexicon hit
#[derive(Debug, Clone, PartialEq)]
pub struct LexiconMatch {
    pub kind: CommandKind,
    /// The matched slice of the utterance
    pub raw: String,
    /// Position of the winning entry in the table
    pub entry: usize,
    pub label: String,
    pub confidence: f32,
}

/// Ordered (pattern → kind) table with first-match-wins lookup
#[derive(Debug, Clone)]
pub struct CommandLexicon {
    entries: Vec<LexiconEntry>,
}

const READ_VERBS: &str = r"mostra|mostrar|mostre|exibir|exibe|exiba|listar|lista|liste|ver|veja|show|list|see";
const CREATE_VERBS: &str = r"criar|cria|crie|adicionar|adiciona|adicione|create|add";
const DELETE_VERBS: &str = r"apagar|apaga|apague|deletar|deleta|delete|excluir|exclui|exclua|remover|remove|remova";
const ARCHIVE_VERBS: &str = r"arquivar|arquiva|arquive|archive|remover|remove|remova|excluir|exclui|exclua";
const SEARCH_VERBS: &str = r"buscar|busca|busque|localizar|localize|encontrar|encontre|achar|ache|procurar|procure|find|search";

const BOARD: &str = r"quadros?|boards?";
const LISTS: &str = r"listas|lists";
const CARD: &str = r"cards?|cart[õo]es|cart[ãa]o|tarefas?|tasks?";

impl CommandLexicon {
    /// Build a lexicon from explicit entries, kept in the given order
    pub fn new(entries: Vec<LexiconEntry>) -> Self {
        Self { entries }
    }

    /// The built-in Portuguese/English table
    pub fn builtin() -> Self {
        let reply = |words: &[&str]| format!(r"(?i)^\s*({})\s*[.!]*\s*$", words.join("|"));

        let rows: Vec<(&str, String, CommandKind, f32)> = vec![
            // Confirmation replies must beat every other entry
            ("confirm", reply(AFFIRMATIVE), CommandKind::Confirm, 1.0),
            ("cancel", reply(NEGATIVE), CommandKind::Cancel, 1.0),
            // delete-board, most specific first
            (
                "delete-board-url",
                format!(
                    r"(?i)\b({DELETE_VERBS})\s+(o\s+|um\s+|the\s+|a\s+)?({BOARD})\b.*https?://\S*trello\.com/b/\S+"
                ),
                CommandKind::DeleteBoard,
                0.95,
            ),
            (
                "delete-board-id",
                format!(
                    r"(?i)\b({DELETE_VERBS})\s+(o\s+|um\s+|the\s+|a\s+)?({BOARD})\b.*\b(id|identificador)\s+\S+"
                ),
                CommandKind::DeleteBoard,
                0.95,
            ),
            (
                "delete-board",
                format!(r"(?i)\b({DELETE_VERBS})\s+(o\s+|um\s+|the\s+|a\s+)?({BOARD})\b"),
                CommandKind::DeleteBoard,
                0.85,
            ),
            (
                "list-boards",
                format!(r"(?i)\b({READ_VERBS})\s+(os\s+|meus\s+|my\s+|all\s+|the\s+)?(quadros|boards)\b"),
                CommandKind::ListBoards,
                0.9,
            ),
            (
                "list-lists",
                format!(r"(?i)\b({READ_VERBS})\s+(as\s+|the\s+)?({LISTS})\b"),
                CommandKind::ListLists,
                0.9,
            ),
            (
                "list-cards",
                format!(r"(?i)\b({READ_VERBS})\s+(os\s+|as\s+|the\s+)?(cards|cart[õo]es|tarefas|tasks)\b"),
                CommandKind::ListCards,
                0.9,
            ),
            (
                "create-list",
                format!(r"(?i)\b({CREATE_VERBS}|nova)\s+(uma\s+|a\s+)?(lista|list)\b"),
                CommandKind::CreateList,
                0.9,
            ),
            (
                "create-card",
                format!(r"(?i)\b({CREATE_VERBS}|novo|nova)\s+(um\s+|uma\s+|a\s+)?({CARD})\b"),
                CommandKind::CreateCard,
                0.9,
            ),
            (
                "archive-card",
                format!(r"(?i)\b({ARCHIVE_VERBS})\s+(o\s+|um\s+|a\s+|the\s+)?({CARD})\b"),
                CommandKind::ArchiveCard,
                0.85,
            ),
            (
                "list-activity",
                format!(
                    r"(?i)\b({READ_VERBS})\s+(as\s+|a\s+|the\s+)?(([úu]ltim[ao]s|last|recent)\s+(\d+\s+)?)?(atividades?|activity)\b"
                ),
                CommandKind::ListActivity,
                0.9,
            ),
            (
                "create-board",
                format!(r"(?i)\b({CREATE_VERBS}|novo)\s+(um\s+|a\s+)?(quadro|board)\b"),
                CommandKind::CreateBoard,
                0.9,
            ),
            (
                "search-card",
                format!(r"(?i)\b({SEARCH_VERBS})\s+(o\s+|um\s+|a\s+|the\s+)?({CARD})\b"),
                CommandKind::SearchCard,
                0.8,
            ),
        ];

        let entries = rows
            .into_iter()
            .map(|(label, pattern, kind, confidence)| {
                LexiconEntry::new(label, &pattern, kind, confidence)
                    .expect("built-in lexicon pattern must compile")
            })
            .collect();

        Self::new(entries)
    }

    pub fn entries(&self) -> &[LexiconEntry] {
        &self.entries
    }

    /// First matching entry in declaration order
    pub fn find(&self, utterance: &str) -> Option<LexiconMatch> {
        self.entries
            .iter()
            .enumerate()
            .find_map(|(i, entry)| Self::try_entry(i, entry, utterance))
    }

    /// Every matching entry, in declaration order
    pub fn find_all(&self, utterance: &str) -> Vec<LexiconMatch> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(i, entry)| Self::try_entry(i, entry, utterance))
            .collect()
    }

    fn try_entry(index: usize, entry: &LexiconEntry, utterance: &str) -> Option<LexiconMatch> {
        entry.pattern.find(utterance).map(|m| LexiconMatch {
            kind: entry.kind,
            raw: m.as_str().to_string(),
            entry: index,
            label: entry.label.clone(),
            confidence: entry.confidence,
        })
    }
}

impl Default for CommandLexicon {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Whether the utterance talks about boards, lists, cards or Trello at all
pub fn mentions_domain(utterance: &str) -> bool {
    static DOMAIN: OnceLock<Regex> = OnceLock::new();
    DOMAIN
        .get_or_init(|| {
            Regex::new(&format!(r"(?i)\b(trello|{BOARD}|listas?|lists?|{CARD})\b"))
                .expect("domain pattern must compile")
        })
        .is_match(utterance)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind_of(text: &str) -> Option<CommandKind> {
        CommandLexicon::builtin().find(text).map(|m| m.kind)
    }

    #[test]
    fn test_list_boards_scenario() {
        let m = CommandLexicon::builtin()
            .find("mostrar quadros do Trello")
            .unwrap();
        assert_eq!(m.kind, CommandKind::ListBoards);
        assert_eq!(m.label, "list-boards");
        assert_eq!(m.raw, "mostrar quadros");
    }

    #[test]
    fn test_common_phrasings() {
        assert_eq!(kind_of("listar as listas do quadro"), Some(CommandKind::ListLists));
        assert_eq!(kind_of("ver os cards da lista Backlog"), Some(CommandKind::ListCards));
        assert_eq!(kind_of("criar uma lista chamada Backlog"), Some(CommandKind::CreateList));
        assert_eq!(kind_of("criar um card chamado Revisar PR na lista Doing"), Some(CommandKind::CreateCard));
        assert_eq!(kind_of("arquivar o card chamado Deploy"), Some(CommandKind::ArchiveCard));
        assert_eq!(kind_of("mostrar as atividades do trello"), Some(CommandKind::ListActivity));
        assert_eq!(kind_of("mostrar as últimas 5 atividades"), Some(CommandKind::ListActivity));
        assert_eq!(kind_of("criar quadro chamado Alpha"), Some(CommandKind::CreateBoard));
        assert_eq!(kind_of("buscar card chamado login"), Some(CommandKind::SearchCard));
        assert_eq!(kind_of("show my boards"), Some(CommandKind::ListBoards));
    }

    #[test]
    fn test_delete_board_specific_entries_win() {
        let lexicon = CommandLexicon::builtin();

        let by_url = lexicon
            .find("apagar quadro com url https://trello.com/b/abc123/alpha")
            .unwrap();
        assert_eq!(by_url.label, "delete-board-url");

        let by_id = lexicon.find("apagar quadro com id abc123").unwrap();
        assert_eq!(by_id.label, "delete-board-id");

        let bare = lexicon.find("apagar quadro").unwrap();
        assert_eq!(bare.label, "delete-board");
    }

    #[test]
    fn test_find_returns_earliest_of_find_all() {
        let lexicon = CommandLexicon::builtin();
        let text = "apagar quadro com id abc123";
        let all = lexicon.find_all(text);
        assert!(all.len() >= 2);
        assert!(all.windows(2).all(|w| w[0].entry < w[1].entry));
        assert_eq!(lexicon.find(text).unwrap(), all[0]);
    }

    #[test]
    fn test_confirmation_words_only_match_whole_utterance() {
        assert_eq!(kind_of("sim"), Some(CommandKind::Confirm));
        assert_eq!(kind_of("  Sim! "), Some(CommandKind::Confirm));
        assert_eq!(kind_of("não"), Some(CommandKind::Cancel));
        assert_eq!(kind_of("cancelar"), Some(CommandKind::Cancel));
        assert_ne!(kind_of("sim, mostrar quadros"), Some(CommandKind::Confirm));
    }

    #[test]
    fn test_no_match_is_empty_not_error() {
        assert!(CommandLexicon::builtin().find("bom dia, tudo bem?").is_none());
    }

    #[test]
    fn test_custom_table_keeps_declared_order() {
        let lexicon = CommandLexicon::new(vec![
            LexiconEntry::new("general", r"(?i)quadro", CommandKind::ListBoards, 0.4).unwrap(),
            LexiconEntry::new("specific", r"(?i)apagar quadro", CommandKind::DeleteBoard, 0.9).unwrap(),
        ]);
        // Declared first wins, even though the later entry is longer
        assert_eq!(lexicon.find("apagar quadro").unwrap().label, "general");
    }

    #[test]
    fn test_mentions_domain() {
        assert!(mentions_domain("preciso organizar umas tarefas"));
        assert!(mentions_domain("o que tem no Trello hoje?"));
        assert!(!mentions_domain("qual a capital da França?"));
        assert!(!mentions_domain("specialist"));
    }
}
