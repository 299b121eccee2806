//! Trello REST client
//!
//! Thin `reqwest` wrapper implementing `BoardService` against
//! `https://api.trello.com/1`. Credentials travel as `key`/`token` query
//! parameters. HTTP status codes are folded into `ServiceError` so callers
//! never see transport details.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::core::error::{Result, TalkError};
use crate::service::{Activity, Board, BoardList, BoardService, Card, ServiceError};

const DEFAULT_API_URL: &str = "https://api.trello.com/1";

/// Async Trello client
pub struct TrelloClient {
    client: Client,
    api_url: String,
    api_key: String,
    token: String,
}

impl TrelloClient {
    /// Create a new client with explicit credentials
    pub fn new(api_key: String, token: String) -> Self {
        Self::with_api_url(api_key, token, DEFAULT_API_URL.into())
    }

    /// Create a client against a different base URL (proxies, test servers)
    pub fn with_api_url(api_key: String, token: String, api_url: String) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
            token,
        }
    }

    /// Create a client from environment variables
    ///
    /// Required: TRELLO_API_KEY, TRELLO_TOKEN
    /// Optional: TRELLO_API_URL (defaults to the public API)
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("TRELLO_API_KEY")
            .map_err(|_| TalkError::Config("TRELLO_API_KEY not set".into()))?;
        let token = std::env::var("TRELLO_TOKEN")
            .map_err(|_| TalkError::Config("TRELLO_TOKEN not set".into()))?;
        let api_url = std::env::var("TRELLO_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.into());

        Ok(Self::with_api_url(api_key, token, api_url))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.api_url, path))
            .query(&[("key", self.api_key.as_str()), ("token", self.token.as_str())])
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> std::result::Result<T, ServiceError> {
        let response = request
            .send()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;
        let response = check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| ServiceError::Transport(format!("Invalid response body: {}", e)))
    }
}

/// Map a non-success HTTP status to the matching `ServiceError`
async fn check_status(response: Response) -> std::result::Result<Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    let body = response.text().await.unwrap_or_default();
    tracing::debug!(%status, %body, "Trello request failed");

    Err(match status {
        // Trello's 404 body is a generic sentence; callers render their own
        StatusCode::NOT_FOUND => ServiceError::NotFound(String::new()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ServiceError::Unauthorized(body),
        StatusCode::TOO_MANY_REQUESTS => ServiceError::RateLimited { retry_after },
        other => ServiceError::Transport(format!("HTTP {}: {}", other, body)),
    })
}

#[async_trait]
impl BoardService for TrelloClient {
    async fn list_boards(&self) -> std::result::Result<Vec<Board>, ServiceError> {
        self.send(
            self.request(Method::GET, "/members/me/boards")
                .query(&[("filter", "open")]),
        )
        .await
    }

    async fn get_board(&self, board_id: &str) -> std::result::Result<Board, ServiceError> {
        self.send(self.request(Method::GET, &format!("/boards/{}", board_id)))
            .await
    }

    async fn list_lists(&self, board_id: &str) -> std::result::Result<Vec<BoardList>, ServiceError> {
        self.send(self.request(Method::GET, &format!("/boards/{}/lists", board_id)))
            .await
    }

    async fn create_board(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> std::result::Result<Board, ServiceError> {
        // Default lists are created by the dispatcher, not by Trello
        let mut request = self
            .request(Method::POST, "/boards/")
            .query(&[("name", name), ("defaultLists", "false")]);
        if let Some(desc) = description {
            request = request.query(&[("desc", desc)]);
        }
        self.send(request).await
    }

    async fn create_list(&self, board_id: &str, name: &str) -> std::result::Result<BoardList, ServiceError> {
        self.send(
            self.request(Method::POST, "/lists")
                .query(&[("name", name), ("idBoard", board_id)]),
        )
        .await
    }

    async fn create_card(
        &self,
        list_id: &str,
        name: &str,
        description: Option<&str>,
    ) -> std::result::Result<Card, ServiceError> {
        self.send(self.request(Method::POST, "/cards").query(&[
            ("idList", list_id),
            ("name", name),
            ("desc", description.unwrap_or_default()),
        ]))
        .await
    }

    async fn list_cards(&self, list_id: &str) -> std::result::Result<Vec<Card>, ServiceError> {
        self.send(self.request(Method::GET, &format!("/lists/{}/cards", list_id)))
            .await
    }

    async fn delete_board(&self, board_id: &str) -> std::result::Result<(), ServiceError> {
        let _: serde_json::Value = self
            .send(self.request(Method::DELETE, &format!("/boards/{}", board_id)))
            .await?;
        Ok(())
    }

    async fn archive_card(&self, card_id: &str) -> std::result::Result<Card, ServiceError> {
        self.send(
            self.request(Method::PUT, &format!("/cards/{}", card_id))
                .query(&[("closed", "true")]),
        )
        .await
    }

    async fn board_cards(&self, board_id: &str) -> std::result::Result<Vec<Card>, ServiceError> {
        self.send(self.request(Method::GET, &format!("/boards/{}/cards", board_id)))
            .await
    }

    async fn recent_activity(
        &self,
        board_id: &str,
        limit: usize,
    ) -> std::result::Result<Vec<Activity>, ServiceError> {
        let actions: Vec<TrelloAction> = self
            .send(
                self.request(Method::GET, &format!("/boards/{}/actions", board_id))
                    .query(&[("limit", limit.to_string())]),
            )
            .await?;
        Ok(actions.into_iter().map(TrelloAction::into_activity).collect())
    }
}

// Trello action payload (only the fields shown to the user)
#[derive(Deserialize)]
struct TrelloAction {
    #[serde(rename = "type", default)]
    action_type: String,
    #[serde(default)]
    date: String,
    #[serde(rename = "memberCreator", default)]
    member_creator: Option<MemberCreator>,
    #[serde(default)]
    data: Option<ActionData>,
}

#[derive(Deserialize)]
struct MemberCreator {
    #[serde(rename = "fullName", default)]
    full_name: String,
}

#[derive(Deserialize)]
struct ActionData {
    card: Option<NamedRef>,
    list: Option<NamedRef>,
    board: Option<NamedRef>,
}

#[derive(Deserialize)]
struct NamedRef {
    #[serde(default)]
    name: String,
}

impl TrelloAction {
    fn into_activity(self) -> Activity {
        let subject = self
            .data
            .and_then(|d| d.card.or(d.list).or(d.board))
            .map(|r| r.name)
            .filter(|name| !name.is_empty());

        let description = match subject {
            Some(subject) => format!("{} '{}'", self.action_type, subject),
            None => self.action_type,
        };

        // "2024-03-01T12:34:56.789Z" -> "2024-03-01 12:34:56"
        let date = self
            .date
            .split('.')
            .next()
            .unwrap_or_default()
            .replace('T', " ");

        Activity {
            date,
            member: self
                .member_creator
                .map(|m| m.full_name)
                .unwrap_or_else(|| "N/A".into()),
            description,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = TrelloClient::with_api_url(
            "test-key".into(),
            "test-token".into(),
            "https://trello.example.com/1/".into(),
        );
        assert_eq!(client.api_key, "test-key");
        assert_eq!(client.token, "test-token");
        assert_eq!(client.api_url, "https://trello.example.com/1");
    }

    #[test]
    fn test_board_deserialization_uses_short_url() {
        let json = r#"{
            "id": "abc123",
            "name": "Projeto Alpha",
            "desc": "",
            "url": "https://trello.com/b/abc123/projeto-alpha",
            "shortUrl": "https://trello.com/b/abc123"
        }"#;
        let board: Board = serde_json::from_str(json).unwrap();
        assert_eq!(board.id, "abc123");
        assert_eq!(board.url.as_deref(), Some("https://trello.com/b/abc123"));
    }

    #[test]
    fn test_card_deserialization() {
        let json = r#"{"id": "c1", "name": "Deploy", "idList": "l1", "desc": "prod"}"#;
        let card: Card = serde_json::from_str(json).unwrap();
        assert_eq!(card.list_id.as_deref(), Some("l1"));
        assert_eq!(card.url, None);
    }

    #[test]
    fn test_action_into_activity() {
        let json = r#"{
            "type": "createCard",
            "date": "2024-03-01T12:34:56.789Z",
            "memberCreator": {"fullName": "Ana Souza"},
            "data": {"card": {"name": "Deploy"}, "list": {"name": "Doing"}}
        }"#;
        let action: TrelloAction = serde_json::from_str(json).unwrap();
        let activity = action.into_activity();
        assert_eq!(activity.date, "2024-03-01 12:34:56");
        assert_eq!(activity.member, "Ana Souza");
        assert_eq!(activity.description, "createCard 'Deploy'");
    }
}
