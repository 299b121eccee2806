//! Shared fakes for the integration tests
//!
//! `FakeBoards` is an in-memory board service that records every call.
//! `ScriptedModel` answers every completion with a fixed text (or fails, or
//! stalls) and records the prompts it was shown.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use boardtalk::command::{NlCommandRouter, RouteOutcome};
use boardtalk::core::config::RouterConfig;
use boardtalk::core::error::{Result, TalkError};
use boardtalk::llm::LanguageModel;
use boardtalk::service::{Activity, Board, BoardList, BoardService, Card, ServiceError};

pub fn board(id: &str, name: &str) -> Board {
    Board {
        id: id.into(),
        name: name.into(),
        url: Some(format!("https://trello.com/b/{}", id)),
        desc: None,
    }
}

pub fn list(id: &str, name: &str) -> BoardList {
    BoardList {
        id: id.into(),
        name: name.into(),
    }
}

pub fn card(id: &str, name: &str, list_id: &str) -> Card {
    Card {
        id: id.into(),
        name: name.into(),
        desc: None,
        url: None,
        list_id: Some(list_id.into()),
    }
}

/// In-memory board service with call counters and failure injection
pub struct FakeBoards {
    boards: Mutex<Vec<Board>>,
    lists: Mutex<Vec<BoardList>>,
    cards: Mutex<Vec<Card>>,
    calls: Mutex<Vec<&'static str>>,
    /// Upcoming calls that fail with a transport error
    transport_failures: AtomicUsize,
    /// Delay applied to every call
    delay: Mutex<Option<Duration>>,
}

impl FakeBoards {
    /// Two boards, three lists on abc123, a few cards
    pub fn seeded() -> Self {
        Self {
            boards: Mutex::new(vec![
                board("abc123", "Projeto Alpha"),
                board("def456", "Projeto Beta"),
            ]),
            lists: Mutex::new(vec![
                list("l1", "A Fazer"),
                list("l2", "Em Andamento"),
                list("l3", "Concluído"),
            ]),
            cards: Mutex::new(vec![
                card("c1", "Deploy API", "l1"),
                card("c2", "Revisar contrato", "l1"),
                card("c3", "Login social", "l2"),
                card("c4", "Deploy Web", "l2"),
            ]),
            calls: Mutex::new(Vec::new()),
            transport_failures: AtomicUsize::new(0),
            delay: Mutex::new(None),
        }
    }

    pub fn calls(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| **c == operation)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn fail_next(&self, n: usize) {
        self.transport_failures.store(n, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn clear_delay(&self) {
        *self.delay.lock().unwrap() = None;
    }

    pub fn board_ids(&self) -> Vec<String> {
        self.boards.lock().unwrap().iter().map(|b| b.id.clone()).collect()
    }

    async fn enter(&self, operation: &'static str) -> std::result::Result<(), ServiceError> {
        self.calls.lock().unwrap().push(operation);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let failing = self
            .transport_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ServiceError::Transport("connection reset".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl BoardService for FakeBoards {
    async fn list_boards(&self) -> std::result::Result<Vec<Board>, ServiceError> {
        self.enter("list_boards").await?;
        Ok(self.boards.lock().unwrap().clone())
    }

    async fn get_board(&self, board_id: &str) -> std::result::Result<Board, ServiceError> {
        self.enter("get_board").await?;
        self.boards
            .lock()
            .unwrap()
            .iter()
            .find(|b| b.id == board_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(String::new()))
    }

    async fn list_lists(&self, board_id: &str) -> std::result::Result<Vec<BoardList>, ServiceError> {
        self.enter("list_lists").await?;
        if board_id == "abc123" {
            Ok(self.lists.lock().unwrap().clone())
        } else {
            Ok(Vec::new())
        }
    }

    async fn create_board(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> std::result::Result<Board, ServiceError> {
        self.enter("create_board").await?;
        let mut created = board("new789", name);
        created.desc = description.map(str::to_string);
        self.boards.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn create_list(&self, _board_id: &str, name: &str) -> std::result::Result<BoardList, ServiceError> {
        self.enter("create_list").await?;
        let mut lists = self.lists.lock().unwrap();
        let created = list(&format!("l{}", lists.len() + 1), name);
        lists.push(created.clone());
        Ok(created)
    }

    async fn create_card(
        &self,
        list_id: &str,
        name: &str,
        _description: Option<&str>,
    ) -> std::result::Result<Card, ServiceError> {
        self.enter("create_card").await?;
        let mut cards = self.cards.lock().unwrap();
        let created = card(&format!("c{}", cards.len() + 1), name, list_id);
        cards.push(created.clone());
        Ok(created)
    }

    async fn list_cards(&self, list_id: &str) -> std::result::Result<Vec<Card>, ServiceError> {
        self.enter("list_cards").await?;
        Ok(self
            .cards
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.list_id.as_deref() == Some(list_id))
            .cloned()
            .collect())
    }

    async fn delete_board(&self, board_id: &str) -> std::result::Result<(), ServiceError> {
        self.enter("delete_board").await?;
        let mut boards = self.boards.lock().unwrap();
        let before = boards.len();
        boards.retain(|b| b.id != board_id);
        if boards.len() == before {
            return Err(ServiceError::NotFound(String::new()));
        }
        Ok(())
    }

    async fn archive_card(&self, card_id: &str) -> std::result::Result<Card, ServiceError> {
        self.enter("archive_card").await?;
        let mut cards = self.cards.lock().unwrap();
        let index = cards
            .iter()
            .position(|c| c.id == card_id)
            .ok_or_else(|| ServiceError::NotFound(String::new()))?;
        Ok(cards.remove(index))
    }

    async fn board_cards(&self, board_id: &str) -> std::result::Result<Vec<Card>, ServiceError> {
        self.enter("board_cards").await?;
        if board_id == "abc123" {
            Ok(self.cards.lock().unwrap().clone())
        } else {
            Ok(Vec::new())
        }
    }

    async fn recent_activity(
        &self,
        _board_id: &str,
        limit: usize,
    ) -> std::result::Result<Vec<Activity>, ServiceError> {
        self.enter("recent_activity").await?;
        let all = vec![
            Activity {
                date: "2024-03-02 10:00:00".into(),
                member: "Ana".into(),
                description: "createCard 'Login social'".into(),
            },
            Activity {
                date: "2024-03-01 09:00:00".into(),
                member: "Bruno".into(),
                description: "updateCard 'Deploy API'".into(),
            },
        ];
        Ok(all.into_iter().take(limit).collect())
    }
}

/// How a `ScriptedModel` behaves on every call
#[derive(Clone)]
pub enum Script {
    Answer(String),
    Fail,
    Stall(Duration),
}

/// Language model with a fixed behaviour that records its prompts
pub struct ScriptedModel {
    script: Mutex<Script>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedModel {
    pub fn answering(answer: &str) -> Self {
        Self::new(Script::Answer(answer.to_string()))
    }

    pub fn new(script: Script) -> Self {
        Self {
            script: Mutex::new(script),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_script(&self, script: Script) {
        *self.script.lock().unwrap() = script;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, _system: &str, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        let script = self.script.lock().unwrap().clone();
        match script {
            Script::Answer(text) => Ok(text),
            Script::Fail => Err(TalkError::LlmError("connection refused".into())),
            Script::Stall(delay) => {
                tokio::time::sleep(delay).await;
                Ok(r#"{"kind": "unknown"}"#.into())
            }
        }
    }
}

pub fn router_with(service: Arc<FakeBoards>, config: RouterConfig) -> NlCommandRouter {
    NlCommandRouter::new(service, config)
}

/// Text of a `Display` outcome; panics on anything else
pub fn text(outcome: RouteOutcome) -> String {
    match outcome {
        RouteOutcome::Display(display) => display.text,
        other => panic!("expected a display result, got {:?}", other),
    }
}
