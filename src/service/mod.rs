//! Contract for the external project-management service
//!
//! The dispatcher only ever talks to `BoardService`. `TrelloClient` is the
//! production implementation; tests substitute in-memory fakes.

pub mod trello;

pub use trello::TrelloClient;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Typed failure of one service call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub id: String,
    pub name: String,
    #[serde(default, rename = "shortUrl")]
    pub url: Option<String>,
    #[serde(default)]
    pub desc: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardList {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default, rename = "shortUrl")]
    pub url: Option<String>,
    #[serde(default, rename = "idList")]
    pub list_id: Option<String>,
}

/// One entry of a board's recent activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub member: String,
    #[serde(default)]
    pub description: String,
}

/// Operations the chat surface can perform on the board service
#[async_trait]
pub trait BoardService: Send + Sync {
    async fn list_boards(&self) -> Result<Vec<Board>, ServiceError>;

    async fn get_board(&self, board_id: &str) -> Result<Board, ServiceError>;

    async fn list_lists(&self, board_id: &str) -> Result<Vec<BoardList>, ServiceError>;

    async fn create_board(&self, name: &str, description: Option<&str>)
        -> Result<Board, ServiceError>;

    async fn create_list(&self, board_id: &str, name: &str) -> Result<BoardList, ServiceError>;

    async fn create_card(
        &self,
        list_id: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<Card, ServiceError>;

    async fn list_cards(&self, list_id: &str) -> Result<Vec<Card>, ServiceError>;

    async fn delete_board(&self, board_id: &str) -> Result<(), ServiceError>;

    async fn archive_card(&self, card_id: &str) -> Result<Card, ServiceError>;

    /// Every open card on a board, across lists
    async fn board_cards(&self, board_id: &str) -> Result<Vec<Card>, ServiceError>;

    async fn recent_activity(
        &self,
        board_id: &str,
        limit: usize,
    ) -> Result<Vec<Activity>, ServiceError>;
}
