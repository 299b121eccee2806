//! Parameter extraction for lexicon matches
//!
//! Each command kind has a fixed set of sub-patterns. Patterns run
//! case-insensitively against the original text so extracted names keep the
//! user's casing. Extraction never fails: anything not found is simply left
//! out of the returned `Params`.

use std::sync::OnceLock;

use regex::Regex;

use crate::nl::command::{CommandKind, Param, Params};
use crate::nl::url::board_id_from_url;

/// Compiled sub-patterns, built once per process
struct Patterns {
    board_url: Regex,
    board_id: Regex,
    bare_id: Regex,
    board_name_lead: Regex,
    list_lead: Regex,
    masculine_name_lead: Regex,
    feminine_name_lead: Regex,
    description_lead: Regex,
    limit: Regex,
    create_board_rest: Regex,
    create_list_rest: Regex,
    card_rest: Regex,
    boundary: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let re = |p: &str| Regex::new(p).expect("extractor pattern must compile");
        Patterns {
            board_url: re(r#"(?i)(https?://(?:www\.)?trello\.com/b/[A-Za-z0-9]+(?:/[^\s"']*)?)"#),
            board_id: re(r#"(?i)\b(?:quadro|board)\s+(?:com\s+(?:o\s+)?id|id|with\s+id)\s+["']?([A-Za-z0-9]+)"#),
            bare_id: re(r#"(?i)\b(?:id|identificador)\s+["']?([A-Za-z0-9]+)"#),
            board_name_lead: re(r"(?i)\b(?:quadro|board)\s+(?:chamado|com\s+(?:o\s+)?nome|named|called)\s+"),
            list_lead: re(
                r"(?i)\b(?:da|na|do|no|para\s+a|para\s+o|in|on|from|to)\s+(?:the\s+)?(?:lista|list)\s+(?:chamada\s+|com\s+(?:o\s+)?nome\s+|named\s+|called\s+)?",
            ),
            masculine_name_lead: re(r"(?i)\b(?:chamado|com\s+(?:o\s+)?nome|nome|named|called|t[íi]tulo)\s+"),
            feminine_name_lead: re(r"(?i)\b(?:chamada|com\s+(?:o\s+)?nome|nome|named|called)\s+"),
            description_lead: re(
                r"(?i)\b(?:com\s+(?:a\s+)?descri[çc][ãa]o|descri[çc][ãa]o|with\s+description|description)\s*:?\s+",
            ),
            limit: re(r"(?i)\b(?:[úu]ltim[ao]s|limite|last)\s+(\d+)"),
            create_board_rest: re(
                r"(?i)\b(?:criar|cria|crie|adicionar|adiciona|adicione|novo|create|add)\s+(?:um\s+|a\s+|new\s+)?(?:quadro|board)\s+",
            ),
            create_list_rest: re(
                r"(?i)\b(?:criar|cria|crie|adicionar|adiciona|adicione|nova|create|add)\s+(?:uma\s+|a\s+|new\s+)?(?:lista|list)\s+",
            ),
            card_rest: re(r"(?i)\b(?:cards?|cart[ãa]o|tarefa|task)\s+"),
            boundary: re(
                r"(?i)(?:^|\s)(?:(?:na|da|no|do|in|on|to|from)\s+(?:the\s+)?(?:lista|list|quadro|board|trello)\b|(?:com\s+(?:a\s+)?)?descri[çc][ãa]o\b|with\s+description\b)",
            ),
        }
    })
}

/// Pulls typed parameters out of an utterance for a given command kind
#[derive(Debug, Clone, Copy, Default)]
pub struct ParameterExtractor;

impl ParameterExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Best-effort extraction; missing values are absent, never errors
    pub fn extract(&self, kind: CommandKind, utterance: &str) -> Params {
        let p = patterns();
        let mut params = Params::new();

        match kind {
            CommandKind::ListLists | CommandKind::ListActivity => {
                board_reference(utterance, &mut params, false);
                if let Some(limit) = p.limit.captures(utterance).and_then(|c| c.get(1)) {
                    params.set(Param::Limit, limit.as_str());
                }
            }
            CommandKind::ListCards => {
                board_reference(utterance, &mut params, false);
                set_opt(&mut params, Param::ListName, capture_after(utterance, &p.list_lead));
            }
            CommandKind::CreateList => {
                board_reference(utterance, &mut params, false);
                let name = capture_after(utterance, &p.feminine_name_lead)
                    .or_else(|| capture_after(utterance, &p.create_list_rest));
                set_opt(&mut params, Param::Name, name);
            }
            CommandKind::CreateCard => {
                board_reference(utterance, &mut params, false);
                set_opt(&mut params, Param::ListName, capture_after(utterance, &p.list_lead));
                set_opt(
                    &mut params,
                    Param::Name,
                    capture_after(utterance, &p.masculine_name_lead),
                );
                set_opt(
                    &mut params,
                    Param::Description,
                    capture_after(utterance, &p.description_lead),
                );
            }
            CommandKind::ArchiveCard => {
                let name = capture_after(utterance, &p.masculine_name_lead)
                    .or_else(|| capture_after(utterance, &p.card_rest));
                set_opt(&mut params, Param::CardName, name);
            }
            CommandKind::CreateBoard => {
                let name = capture_after(utterance, &p.masculine_name_lead)
                    .or_else(|| capture_after(utterance, &p.create_board_rest));
                set_opt(&mut params, Param::Name, name);
                set_opt(
                    &mut params,
                    Param::Description,
                    capture_after(utterance, &p.description_lead),
                );
            }
            CommandKind::DeleteBoard => {
                board_reference(utterance, &mut params, true);
            }
            CommandKind::SearchCard => {
                board_reference(utterance, &mut params, false);
                // The board clause is cut off before looking for the card name
                let card_part = p
                    .boundary
                    .find(utterance)
                    .map_or(utterance, |m| &utterance[..m.start()]);
                let name = capture_after(card_part, &p.masculine_name_lead)
                    .or_else(|| quoted(card_part))
                    .or_else(|| capture_after(card_part, &p.card_rest));
                set_opt(&mut params, Param::CardName, name);
            }
            CommandKind::ListBoards
            | CommandKind::Confirm
            | CommandKind::Cancel
            | CommandKind::Unknown => {}
        }

        params
    }
}

/// Board by URL, by id, or by name, in that order of preference
///
/// A URL is normalized to its id; the URL itself is kept for display.
fn board_reference(utterance: &str, params: &mut Params, bare_id: bool) {
    let p = patterns();

    if let Some(url) = p.board_url.captures(utterance).and_then(|c| c.get(1)) {
        if let Some(id) = board_id_from_url(url.as_str()) {
            params.set(Param::BoardId, id);
        }
        params.set(Param::BoardUrl, url.as_str());
        return;
    }

    let id_pattern = if bare_id { &p.bare_id } else { &p.board_id };
    if let Some(id) = id_pattern.captures(utterance).and_then(|c| c.get(1)) {
        params.set(Param::BoardId, id.as_str());
        return;
    }

    set_opt(params, Param::BoardName, capture_after(utterance, &p.board_name_lead));
}

fn set_opt(params: &mut Params, param: Param, value: Option<String>) {
    if let Some(value) = value {
        params.set(param, value);
    }
}

/// The value that follows `lead`, quoted or up to the next clause
fn capture_after(text: &str, lead: &Regex) -> Option<String> {
    let m = lead.find(text)?;
    take_value(&text[m.end()..])
}

fn quoted(text: &str) -> Option<String> {
    let start = text.find(['"', '“', '\''])?;
    take_value(&text[start..])
}

fn take_value(rest: &str) -> Option<String> {
    let rest = rest.trim_start();
    let first = rest.chars().next()?;

    let raw = match first {
        '"' | '\'' | '“' | '‘' => {
            let close = match first {
                '“' => '”',
                '‘' => '’',
                other => other,
            };
            let inner = &rest[first.len_utf8()..];
            inner.find(close).map_or(inner, |end| &inner[..end])
        }
        _ => patterns()
            .boundary
            .find(rest)
            .map_or(rest, |m| &rest[..m.start()]),
    };

    let value = raw
        .trim()
        .trim_end_matches(['.', '!', '?', ',', ';', ':'])
        .trim();
    (!value.is_empty()).then(|| value.to_string())
}
