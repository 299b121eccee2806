//! Command dispatch - turns a classified `Command` into board-service calls
//!
//! Every path ends in a `DisplayResult`. Internally each handler is a plain
//! `Result`-returning function; errors are rendered once, at `dispatch`.
//! Deletions are not reachable through `dispatch` at all: they need a
//! `ConfirmedAction`, which only the confirmation gate can produce.

use std::future::Future;
use std::sync::Arc;

use ahash::AHashMap;

use crate::command::confirmation::ConfirmedAction;
use crate::command::format::{numbered, DisplayResult};
use crate::core::config::RouterConfig;
use crate::core::error::{Result, TalkError};
use crate::nl::command::{Command, CommandKind, Param, Params};
use crate::service::{Board, BoardList, BoardService, Card, ServiceError};

/// Whether a call may be repeated after a transport failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Read,
    Write,
}

/// Resolved target of a destructive command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTarget {
    pub id: String,
    pub label: String,
}

/// Validates parameters, calls the board service and formats the answer
pub struct CommandDispatcher {
    service: Arc<dyn BoardService>,
    config: RouterConfig,
}

impl CommandDispatcher {
    pub fn new(service: Arc<dyn BoardService>, config: RouterConfig) -> Self {
        Self { service, config }
    }

    /// Execute a non-destructive command
    pub async fn dispatch(&self, command: &Command) -> DisplayResult {
        let params = &command.params;
        let result = match command.kind {
            CommandKind::ListBoards => self.list_boards().await,
            CommandKind::CreateBoard => self.create_board(params).await,
            CommandKind::ListLists => self.list_lists(params).await,
            CommandKind::CreateList => self.create_list(params).await,
            CommandKind::ListCards => self.list_cards(params).await,
            CommandKind::CreateCard => self.create_card(params).await,
            CommandKind::ArchiveCard => self.archive_card(params).await,
            CommandKind::ListActivity => self.list_activity(params).await,
            CommandKind::SearchCard => self.search_card(params).await,
            CommandKind::DeleteBoard => {
                return DisplayResult::error("A exclusão de quadros precisa ser confirmada antes.")
            }
            CommandKind::Confirm | CommandKind::Cancel | CommandKind::Unknown => {
                return DisplayResult::error("Não há nenhum comando para executar.")
            }
        };

        result.unwrap_or_else(|e| {
            tracing::warn!(kind = %command.kind, error = %e, "Command failed");
            DisplayResult::from_error(&e, command.kind.is_mutation())
        })
    }

    /// Identify the board a destructive command points at
    ///
    /// The label comes from the service so the confirmation prompt names the
    /// board the user is about to lose. The configured default board is
    /// never used here.
    pub async fn target_for(&self, command: &Command) -> std::result::Result<PendingTarget, DisplayResult> {
        self.resolve_target(&command.params, command.kind)
            .await
            .map_err(|e| {
                tracing::warn!(kind = %command.kind, error = %e, "Could not resolve target");
                DisplayResult::from_error(&e, false)
            })
    }

    async fn resolve_target(&self, params: &Params, kind: CommandKind) -> Result<PendingTarget> {
        let board = if let Some(id) = params.get(Param::BoardId) {
            self.call(Access::Read, || self.service.get_board(id)).await?
        } else if let Some(name) = params.get(Param::BoardName) {
            let boards = self.call(Access::Read, || self.service.list_boards()).await?;
            unique_match(boards, name, |b| &b.name, "quadro")?
        } else {
            return Err(TalkError::MissingParameter {
                kind,
                param: Param::BoardId,
            });
        };

        Ok(PendingTarget {
            id: board.id,
            label: board.name,
        })
    }

    /// Perform a destructive action the user has confirmed
    pub async fn execute(&self, confirmed: ConfirmedAction) -> DisplayResult {
        let action = confirmed.action();
        match action.action_kind {
            CommandKind::DeleteBoard => {
                let id = action.target_entity_id.as_str();
                match self.call(Access::Write, || self.service.delete_board(id)).await {
                    Ok(()) => {
                        tracing::info!(board_id = %id, "Board deleted");
                        DisplayResult::success(format!(
                            "Quadro '{}' (ID: {}) excluído com sucesso.",
                            action.target_entity_label, id
                        ))
                    }
                    Err(e) => {
                        tracing::warn!(board_id = %id, error = %e, "Board deletion failed");
                        DisplayResult::from_error(&e, true)
                    }
                }
            }
            other => DisplayResult::error(format!("'{}' não é uma ação que exige confirmação.", other)),
        }
    }

    /// One service call under `service_timeout`, with a single retry of
    /// transport failures for reads
    async fn call<T, F, Fut>(&self, access: Access, op: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = std::result::Result<T, ServiceError>>,
    {
        let mut retried = false;
        loop {
            match tokio::time::timeout(self.config.service_timeout, op()).await {
                Err(_) => {
                    return Err(TalkError::Timeout {
                        operation: "board service call",
                        after: self.config.service_timeout,
                    })
                }
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(ServiceError::Transport(detail))) if access == Access::Read && !retried => {
                    tracing::warn!(error = %detail, "Transport error, retrying once");
                    retried = true;
                    tokio::time::sleep(self.config.retry_backoff).await;
                }
                Ok(Err(e)) => return Err(e.into()),
            }
        }
    }

    fn require<'a>(params: &'a Params, kind: CommandKind, param: Param) -> Result<&'a str> {
        params
            .get(param)
            .ok_or(TalkError::MissingParameter { kind, param })
    }

    /// Board id from the utterance, by id or name, falling back to the default board
    async fn board_id(&self, params: &Params, kind: CommandKind) -> Result<String> {
        if let Some(id) = params.get(Param::BoardId) {
            return Ok(id.to_string());
        }
        if let Some(name) = params.get(Param::BoardName) {
            return Ok(self.board_named(name).await?.id);
        }
        self.config
            .default_board_id
            .clone()
            .ok_or(TalkError::MissingParameter {
                kind,
                param: Param::BoardId,
            })
    }

    async fn board_named(&self, name: &str) -> Result<Board> {
        let boards = self.call(Access::Read, || self.service.list_boards()).await?;
        best_match(boards, name, |b| &b.name).ok_or_else(|| {
            ServiceError::NotFound(format!("quadro '{}'", name)).into()
        })
    }

    async fn list_named(&self, board_id: &str, name: &str) -> Result<BoardList> {
        let lists = self.call(Access::Read, || self.service.list_lists(board_id)).await?;
        best_match(lists, name, |l| &l.name)
            .ok_or_else(|| ServiceError::NotFound(format!("lista '{}'", name)).into())
    }

    async fn list_boards(&self) -> Result<DisplayResult> {
        let boards = self.call(Access::Read, || self.service.list_boards()).await?;
        let lines = boards.iter().map(|b| format!("{} (ID: {})", b.name, b.id));
        Ok(DisplayResult::listing(numbered(lines, "Nenhum quadro encontrado.")))
    }

    async fn create_board(&self, params: &Params) -> Result<DisplayResult> {
        let name = Self::require(params, CommandKind::CreateBoard, Param::Name)?;
        let description = params.get(Param::Description);

        let board = self
            .call(Access::Write, || self.service.create_board(name, description))
            .await?;
        tracing::info!(board_id = %board.id, "Board created");

        let mut created = Vec::new();
        for list in &self.config.default_lists {
            match self
                .call(Access::Write, || self.service.create_list(&board.id, list))
                .await
            {
                Ok(_) => created.push(list.as_str()),
                Err(e) => tracing::warn!(board_id = %board.id, list = %list, error = %e, "Default list not created"),
            }
        }

        let mut text = format!("Quadro '{}' criado com sucesso (ID: {}).", board.name, board.id);
        if let Some(url) = &board.url {
            text.push_str(&format!("\nURL: {}", url));
        }
        if !created.is_empty() {
            text.push_str(&format!("\nListas criadas: {}", created.join(", ")));
        }
        Ok(DisplayResult::success(text))
    }

    async fn list_lists(&self, params: &Params) -> Result<DisplayResult> {
        let board_id = self.board_id(params, CommandKind::ListLists).await?;
        let lists = self
            .call(Access::Read, || self.service.list_lists(&board_id))
            .await?;

        // Counts are a nicety; a failure here still shows the lists
        let counts = match self
            .call(Access::Read, || self.service.board_cards(&board_id))
            .await
        {
            Ok(cards) => Some(cards_per_list(&cards)),
            Err(e) => {
                tracing::warn!(board_id = %board_id, error = %e, "Card counts unavailable");
                None
            }
        };

        let lines = lists.iter().map(|l| match &counts {
            Some(counts) => format!(
                "{} (ID: {}) - {} cartão(ões)",
                l.name,
                l.id,
                counts.get(&l.id).copied().unwrap_or(0)
            ),
            None => format!("{} (ID: {})", l.name, l.id),
        });
        Ok(DisplayResult::listing(numbered(
            lines,
            "Nenhuma lista encontrada neste quadro.",
        )))
    }

    async fn create_list(&self, params: &Params) -> Result<DisplayResult> {
        let name = Self::require(params, CommandKind::CreateList, Param::Name)?;
        let board_id = self.board_id(params, CommandKind::CreateList).await?;

        let list = self
            .call(Access::Write, || self.service.create_list(&board_id, name))
            .await?;
        Ok(DisplayResult::success(format!(
            "Lista '{}' criada com sucesso (ID: {}).",
            list.name, list.id
        )))
    }

    /// List id by explicit id, by name on the board, or the board's first list
    async fn resolve_list(&self, params: &Params, kind: CommandKind) -> Result<BoardList> {
        if let Some(id) = params.get(Param::ListId) {
            return Ok(BoardList {
                id: id.to_string(),
                name: params.get(Param::ListName).unwrap_or(id).to_string(),
            });
        }

        let board_id = self.board_id(params, kind).await?;
        match params.get(Param::ListName) {
            Some(name) => self.list_named(&board_id, name).await,
            None if kind == CommandKind::CreateCard => {
                let lists = self
                    .call(Access::Read, || self.service.list_lists(&board_id))
                    .await?;
                lists.into_iter().next().ok_or(TalkError::MissingParameter {
                    kind,
                    param: Param::ListName,
                })
            }
            None => Err(TalkError::MissingParameter {
                kind,
                param: Param::ListName,
            }),
        }
    }

    async fn list_cards(&self, params: &Params) -> Result<DisplayResult> {
        if !params.contains(Param::ListId) && !params.contains(Param::ListName) {
            return self.board_card_listing(params).await;
        }

        let list = self.resolve_list(params, CommandKind::ListCards).await?;
        let cards = self
            .call(Access::Read, || self.service.list_cards(&list.id))
            .await?;
        let lines = cards.iter().map(|c| format!("{} (ID: {})", c.name, c.id));
        Ok(DisplayResult::listing(numbered(
            lines,
            "Nenhum cartão encontrado nesta lista.",
        )))
    }

    /// Every card on the board, under a heading per list
    async fn board_card_listing(&self, params: &Params) -> Result<DisplayResult> {
        let board_id = self.board_id(params, CommandKind::ListCards).await?;
        let lists = self
            .call(Access::Read, || self.service.list_lists(&board_id))
            .await?;
        let cards = self
            .call(Access::Read, || self.service.board_cards(&board_id))
            .await?;

        if lists.is_empty() {
            return Ok(DisplayResult::listing("Nenhuma lista encontrada neste quadro."));
        }

        let sections: Vec<String> = lists
            .iter()
            .map(|list| {
                let lines = cards
                    .iter()
                    .filter(|c| c.list_id.as_deref() == Some(list.id.as_str()))
                    .map(|c| format!("{} (ID: {})", c.name, c.id));
                let body = numbered(lines, "(nenhum cartão)")
                    .lines()
                    .map(|line| format!("  {}", line))
                    .collect::<Vec<_>>()
                    .join("\n");
                format!("{}:\n{}", list.name, body)
            })
            .collect();
        Ok(DisplayResult::listing(sections.join("\n")))
    }

    async fn create_card(&self, params: &Params) -> Result<DisplayResult> {
        let name = Self::require(params, CommandKind::CreateCard, Param::Name)?;
        let description = params.get(Param::Description);
        let list = self.resolve_list(params, CommandKind::CreateCard).await?;

        let card = self
            .call(Access::Write, || {
                self.service.create_card(&list.id, name, description)
            })
            .await?;

        let mut text = format!(
            "Cartão '{}' criado com sucesso na lista '{}' (ID: {}).",
            card.name, list.name, card.id
        );
        if let Some(url) = &card.url {
            text.push_str(&format!("\nURL: {}", url));
        }
        Ok(DisplayResult::success(text))
    }

    async fn archive_card(&self, params: &Params) -> Result<DisplayResult> {
        let name = Self::require(params, CommandKind::ArchiveCard, Param::CardName)?;
        let board_id = self.board_id(params, CommandKind::ArchiveCard).await?;

        let cards = self
            .call(Access::Read, || self.service.board_cards(&board_id))
            .await?;
        let card = single_match(cards, name)?;

        let archived = self
            .call(Access::Write, || self.service.archive_card(&card.id))
            .await?;
        Ok(DisplayResult::success(format!(
            "Cartão '{}' arquivado com sucesso.",
            archived.name
        )))
    }

    async fn list_activity(&self, params: &Params) -> Result<DisplayResult> {
        let board_id = self.board_id(params, CommandKind::ListActivity).await?;
        let limit = params
            .get(Param::Limit)
            .and_then(|l| l.parse::<usize>().ok())
            .filter(|&l| l > 0)
            .unwrap_or(self.config.activity_limit);

        let activity = self
            .call(Access::Read, || self.service.recent_activity(&board_id, limit))
            .await?;
        let lines = activity
            .iter()
            .take(limit)
            .map(|a| format!("{} - {}: {}", a.date, a.member, a.description));
        Ok(DisplayResult::listing(numbered(
            lines,
            "Nenhuma atividade recente neste quadro.",
        )))
    }

    async fn search_card(&self, params: &Params) -> Result<DisplayResult> {
        let name = Self::require(params, CommandKind::SearchCard, Param::CardName)?;

        // Named board, then default board, then every open board
        let scope: Vec<(String, String)> = if params.contains(Param::BoardId)
            || params.contains(Param::BoardName)
            || self.config.default_board_id.is_some()
        {
            let id = self.board_id(params, CommandKind::SearchCard).await?;
            let label = params.get(Param::BoardName).unwrap_or(&id).to_string();
            vec![(id, label)]
        } else {
            self.call(Access::Read, || self.service.list_boards())
                .await?
                .into_iter()
                .map(|b| (b.id, b.name))
                .collect()
        };

        let needle = name.to_lowercase();
        let mut found = Vec::new();
        for (board_id, board_label) in &scope {
            let cards = self
                .call(Access::Read, || self.service.board_cards(board_id))
                .await?;
            found.extend(
                cards
                    .into_iter()
                    .filter(|c| c.name.to_lowercase().contains(&needle))
                    .map(|c| format!("{} (ID: {}) - quadro {}", c.name, c.id, board_label)),
            );
        }

        Ok(DisplayResult::listing(numbered(
            found,
            &format!("Nenhum cartão encontrado para '{}'.", name),
        )))
    }
}

/// Case-insensitive exact name match, else the first partial match
fn best_match<T>(mut items: Vec<T>, name: &str, name_of: impl Fn(&T) -> &String) -> Option<T> {
    let needle = name.to_lowercase();
    let exact = items
        .iter()
        .position(|item| name_of(item).to_lowercase() == needle);
    let index = exact.or_else(|| {
        items
            .iter()
            .position(|item| name_of(item).to_lowercase().contains(&needle))
    })?;
    Some(items.swap_remove(index))
}

/// The one item `name` refers to: an exact match, or a single partial one
///
/// Several partial matches are ambiguous and name the candidates.
fn unique_match<T>(
    mut items: Vec<T>,
    name: &str,
    name_of: impl Fn(&T) -> &String,
    what: &str,
) -> Result<T> {
    let needle = name.to_lowercase();
    if let Some(index) = items
        .iter()
        .position(|item| name_of(item).to_lowercase() == needle)
    {
        return Ok(items.swap_remove(index));
    }

    let mut partial: Vec<T> = items
        .into_iter()
        .filter(|item| name_of(item).to_lowercase().contains(&needle))
        .collect();
    match partial.len() {
        0 => Err(ServiceError::NotFound(format!("{} '{}'", what, name)).into()),
        1 => Ok(partial.remove(0)),
        _ => {
            let names: Vec<&str> = partial.iter().map(|item| name_of(item).as_str()).collect();
            Err(TalkError::Service(ServiceError::NotFound(format!(
                "{} único para '{}' (candidatos: {})",
                what,
                name,
                names.join(", ")
            ))))
        }
    }
}

fn single_match(cards: Vec<Card>, name: &str) -> Result<Card> {
    unique_match(cards, name, |c| &c.name, "cartão")
}

fn cards_per_list(cards: &[Card]) -> AHashMap<String, usize> {
    let mut counts = AHashMap::new();
    for list_id in cards.iter().filter_map(|c| c.list_id.as_deref()) {
        *counts.entry(list_id.to_string()).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(id: &str, name: &str, list: &str) -> Card {
        Card {
            id: id.into(),
            name: name.into(),
            desc: None,
            url: None,
            list_id: Some(list.into()),
        }
    }

    #[test]
    fn test_best_match_prefers_exact() {
        let lists = vec![
            BoardList {
                id: "l1".into(),
                name: "A Fazer Depois".into(),
            },
            BoardList {
                id: "l2".into(),
                name: "A fazer".into(),
            },
        ];
        let found = best_match(lists, "a fazer", |l| &l.name).unwrap();
        assert_eq!(found.id, "l2");
    }

    #[test]
    fn test_best_match_falls_back_to_partial() {
        let lists = vec![BoardList {
            id: "l1".into(),
            name: "Em Andamento".into(),
        }];
        assert!(best_match(lists.clone(), "andamento", |l| &l.name).is_some());
        assert!(best_match(lists, "concluído", |l| &l.name).is_none());
    }

    #[test]
    fn test_single_match_rejects_ambiguity() {
        let cards = vec![card("c1", "Deploy API", "l1"), card("c2", "Deploy Web", "l1")];
        assert!(single_match(cards.clone(), "deploy").is_err());
        assert_eq!(single_match(cards, "deploy web").unwrap().id, "c2");
    }

    #[test]
    fn test_unique_match_names_candidates() {
        let boards = vec![
            Board {
                id: "abc123".into(),
                name: "Projeto Alpha".into(),
                url: None,
                desc: None,
            },
            Board {
                id: "def456".into(),
                name: "Projeto Beta".into(),
                url: None,
                desc: None,
            },
        ];
        match unique_match(boards.clone(), "projeto", |b| &b.name, "quadro") {
            Err(TalkError::Service(ServiceError::NotFound(detail))) => {
                assert!(detail.contains("Projeto Alpha, Projeto Beta"));
            }
            other => panic!("expected ambiguity, got {:?}", other),
        }
        assert_eq!(unique_match(boards, "beta", |b| &b.name, "quadro").unwrap().id, "def456");
    }

    #[test]
    fn test_cards_per_list() {
        let cards = vec![card("c1", "a", "l1"), card("c2", "b", "l1"), card("c3", "c", "l2")];
        let counts = cards_per_list(&cards);
        assert_eq!(counts.get("l1"), Some(&2));
        assert_eq!(counts.get("l2"), Some(&1));
        assert_eq!(counts.get("l3"), None);
    }
}
