//! User-facing text for every command outcome
//!
//! All messages shown in the chat are built here so the dispatcher and the
//! router only decide *what* happened.

use std::fmt;

use crate::core::error::TalkError;
use crate::nl::command::{CommandKind, Param};
use crate::service::ServiceError;

/// Category of a display result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayKind {
    /// A mutation went through
    Success,
    /// A read returned data (possibly an empty listing)
    Listing,
    ConfirmationRequest,
    Cancelled,
    MissingParameter,
    Error,
    /// A pending confirmation lapsed before the reply
    Expired,
}

/// Text returned to the chat surface, tagged with what produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayResult {
    pub kind: DisplayKind,
    pub text: String,
}

impl DisplayResult {
    pub fn new(kind: DisplayKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self::new(DisplayKind::Success, text)
    }

    pub fn listing(text: impl Into<String>) -> Self {
        Self::new(DisplayKind::Listing, text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(DisplayKind::Error, text)
    }

    /// Whether the underlying operation completed
    pub fn is_success(&self) -> bool {
        matches!(self.kind, DisplayKind::Success | DisplayKind::Listing)
    }

    /// Render an error from the dispatch path
    ///
    /// `mutation` adds the "check before repeating" warning to timeouts.
    pub fn from_error(error: &TalkError, mutation: bool) -> Self {
        match error {
            TalkError::MissingParameter { kind, param } => {
                Self::new(DisplayKind::MissingParameter, missing_parameter(*kind, *param))
            }
            TalkError::Service(service) => Self::error(service_error(service)),
            TalkError::Timeout { after, .. } if mutation => Self::error(format!(
                "⚠️ O Trello não respondeu em {}s. Não é possível saber se a operação foi concluída; \
                 confira o quadro antes de repetir o pedido.",
                after.as_secs()
            )),
            TalkError::Timeout { after, .. } => Self::error(format!(
                "O Trello não respondeu em {}s. O resultado é desconhecido; tente novamente.",
                after.as_secs()
            )),
            other => Self::error(format!("Erro: {}", other)),
        }
    }
}

impl fmt::Display for DisplayResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// 1-based numbered lines, or `empty` when there are none
pub fn numbered<I>(items: I, empty: &str) -> String
where
    I: IntoIterator,
    I::Item: fmt::Display,
{
    let lines: Vec<String> = items
        .into_iter()
        .enumerate()
        .map(|(i, item)| format!("{}. {}", i + 1, item))
        .collect();
    if lines.is_empty() {
        empty.to_string()
    } else {
        lines.join("\n")
    }
}

fn service_error(error: &ServiceError) -> String {
    match error {
        ServiceError::NotFound(what) if what.is_empty() => {
            "O item solicitado não foi encontrado no Trello.".into()
        }
        ServiceError::NotFound(what) => format!("Não encontrei {} no Trello.", what),
        ServiceError::Unauthorized(_) => {
            "O Trello recusou o acesso. Verifique TRELLO_API_KEY e TRELLO_TOKEN.".into()
        }
        ServiceError::RateLimited {
            retry_after: Some(after),
        } => format!(
            "O Trello está limitando as requisições. Tente novamente em {}s.",
            after.as_secs().max(1)
        ),
        ServiceError::RateLimited { retry_after: None } => {
            "O Trello está limitando as requisições. Tente novamente mais tarde.".into()
        }
        ServiceError::Transport(detail) => format!("Falha de comunicação com o Trello: {}", detail),
    }
}

fn missing_parameter(kind: CommandKind, param: Param) -> String {
    format!(
        "Para {}, preciso de {}. Repita o pedido incluindo essa informação.",
        action_phrase(kind),
        param_phrase(param)
    )
}

fn action_phrase(kind: CommandKind) -> &'static str {
    match kind {
        CommandKind::ListBoards => "listar os quadros",
        CommandKind::CreateBoard => "criar um quadro",
        CommandKind::DeleteBoard => "excluir um quadro",
        CommandKind::ListLists => "listar as listas",
        CommandKind::CreateList => "criar uma lista",
        CommandKind::ListCards => "listar os cartões",
        CommandKind::CreateCard => "criar um cartão",
        CommandKind::ArchiveCard => "arquivar um cartão",
        CommandKind::ListActivity => "mostrar a atividade",
        CommandKind::SearchCard => "buscar um cartão",
        CommandKind::Confirm | CommandKind::Cancel | CommandKind::Unknown => "continuar",
    }
}

fn param_phrase(param: Param) -> &'static str {
    match param {
        Param::BoardId | Param::BoardUrl => "o ID ou a URL do quadro",
        Param::BoardName => "o nome do quadro",
        Param::ListId | Param::ListName => "o nome da lista",
        Param::Name => "um nome",
        Param::Description => "uma descrição",
        Param::CardName => "o nome do cartão",
        Param::Limit => "a quantidade de itens",
    }
}

pub fn confirmation_request(id: &str, label: &str) -> DisplayResult {
    DisplayResult::new(
        DisplayKind::ConfirmationRequest,
        format!(
            "⚠️ ATENÇÃO: você está prestes a excluir o quadro '{}' (ID: {}). \
             Esta ação não pode ser desfeita.\nDigite 'sim' para confirmar ou 'não' para cancelar.",
            label, id
        ),
    )
}

/// Confirmation request preceded by the notice that an older one was dropped
pub fn replacement_request(previous_label: &str, id: &str, label: &str) -> DisplayResult {
    let request = confirmation_request(id, label);
    DisplayResult::new(
        DisplayKind::ConfirmationRequest,
        format!(
            "O pedido anterior de exclusão do quadro '{}' foi cancelado.\n{}",
            previous_label, request.text
        ),
    )
}

pub fn cancelled(label: &str) -> DisplayResult {
    DisplayResult::new(
        DisplayKind::Cancelled,
        format!("Exclusão do quadro '{}' cancelada.", label),
    )
}

pub fn expired(label: &str) -> DisplayResult {
    DisplayResult::new(
        DisplayKind::Expired,
        format!(
            "O pedido de exclusão do quadro '{}' expirou. Repita o pedido se ainda quiser excluí-lo.",
            label
        ),
    )
}
