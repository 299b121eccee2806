//! Language-model fallback for utterances the lexicon does not recognise
//!
//! The model is asked for a single JSON object `{"kind", "params",
//! "confidence"}`. Whatever comes back is coerced into a `Command`: garbage
//! becomes `unknown`, never an error. Errors are reserved for the model
//! being unreachable or too slow, so the router can tell "the model said
//! no" apart from "the model said nothing".

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::core::error::{Result, TalkError};
use crate::llm::client::LanguageModel;
use crate::llm::context::ConversationContext;
use crate::nl::command::{Command, CommandKind, CommandSource, Param, Params};
use crate::nl::url::board_id_from_url;

/// Confidence assumed when the model leaves it out
const DEFAULT_CONFIDENCE: f32 = 0.5;

/// Classifies free text into a `Command` through a `LanguageModel`
#[derive(Clone)]
pub struct LlmIntentClassifier {
    model: Arc<dyn LanguageModel>,
    timeout: Duration,
}

impl LlmIntentClassifier {
    pub fn new(model: Arc<dyn LanguageModel>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    pub fn model(&self) -> &Arc<dyn LanguageModel> {
        &self.model
    }

    /// Ask the model what `utterance` means
    ///
    /// `Err(Classification)` when the model fails or exceeds the timeout.
    pub async fn classify(&self, utterance: &str, context: &ConversationContext) -> Result<Command> {
        let prompt = build_prompt(utterance, context);

        let response = match tokio::time::timeout(
            self.timeout,
            self.model.complete(CLASSIFY_SYSTEM_PROMPT, &prompt),
        )
        .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "LLM classification call failed");
                return Err(TalkError::Classification(e.to_string()));
            }
            Err(_) => {
                tracing::warn!(after = ?self.timeout, "LLM classification timed out");
                return Err(TalkError::Classification(format!(
                    "no answer within {:?}",
                    self.timeout
                )));
            }
        };

        let command = parse_response(&response);
        tracing::debug!(kind = %command.kind, confidence = command.confidence, "LLM classification");
        Ok(command)
    }
}

fn build_prompt(utterance: &str, context: &ConversationContext) -> String {
    format!(
        "RECENT CONVERSATION:\n{}\nUSER MESSAGE:\n{}\n\nClassify this message into JSON:",
        context.summary(),
        utterance
    )
}

/// Coerce a raw model answer into a `Command`
pub fn parse_response(response: &str) -> Command {
    let unknown = Command::unknown(CommandSource::Llm);

    let Some(json_str) = extract_json(response) else {
        return unknown;
    };
    let Ok(Value::Object(object)) = serde_json::from_str::<Value>(json_str) else {
        return unknown;
    };

    let kind = object
        .get("kind")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<CommandKind>().ok())
        .filter(|kind| kind.is_classifiable());
    let Some(kind) = kind else {
        return unknown;
    };

    let mut params = Params::new();
    if let Some(Value::Object(raw)) = object.get("params") {
        for (key, value) in raw {
            let Ok(param) = key.parse::<Param>() else {
                continue;
            };
            match value {
                Value::String(s) => params.set(param, s.as_str()),
                Value::Number(n) => params.set(param, n.to_string()),
                _ => {}
            }
        }
    }
    normalize_board_reference(&mut params);

    let confidence = object
        .get("confidence")
        .and_then(Value::as_f64)
        .map_or(DEFAULT_CONFIDENCE, |c| c as f32);

    Command::new(kind, params, CommandSource::Llm, confidence)
}

// A URL in either board field wins over a plain id, same as extraction
fn normalize_board_reference(params: &mut Params) {
    let from_url = [Param::BoardUrl, Param::BoardId]
        .into_iter()
        .filter_map(|p| params.get(p))
        .find_map(board_id_from_url)
        .map(str::to_string);

    if let Some(id) = from_url {
        if !params.contains(Param::BoardUrl) {
            if let Some(url) = params.get(Param::BoardId).map(str::to_string) {
                params.set(Param::BoardUrl, url);
            }
        }
        params.set(Param::BoardId, id);
    }
}

/// Extract JSON object from LLM response (handles surrounding text)
fn extract_json(response: &str) -> Option<&str> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    (start < end).then(|| &response[start..=end])
}

/// System prompt for intent classification
const CLASSIFY_SYSTEM_PROMPT: &str = r#"You classify chat messages for an assistant that manages Trello boards.
Messages are usually in Portuguese, sometimes in English.
Decide whether the message asks for one of the actions below and extract its parameters.

AVAILABLE KINDS:
- list-boards: show the user's boards
- create-board: create a new board (params: name, description)
- delete-board: delete a board (params: board_id, board_url, board_name)
- list-lists: show the lists of a board (params: board_id, board_url)
- create-list: create a list on a board (params: board_id, board_url, name)
- list-cards: show the cards of a list (params: board_id, list_id, list_name)
- create-card: create a card in a list (params: board_id, list_id, list_name, name, description)
- archive-card: archive a card (params: card_name)
- list-activity: show recent activity on a board (params: board_id, board_url, limit)
- search-card: find cards by name (params: card_name, board_id, board_name)
- unknown: anything else, including small talk and questions about Trello itself

OUTPUT FORMAT (JSON only, no explanation):
{
  "kind": "one of the kinds above",
  "params": {"param_name": "value"},
  "confidence": 0.0-1.0
}
Leave out parameters the message does not mention. Never invent ids.

Examples:
"quais são meus quadros?" -> {"kind": "list-boards", "params": {}, "confidence": 0.9}
"me mostra tudo que tenho no trello" -> {"kind": "list-boards", "params": {}, "confidence": 0.7}
"what boards do I have" -> {"kind": "list-boards", "params": {}, "confidence": 0.9}
"preciso de um quadro novo pro projeto Gama" -> {"kind": "create-board", "params": {"name": "Gama"}, "confidence": 0.85}
"monta um board chamado Sprint 12 para o time de dados" -> {"kind": "create-board", "params": {"name": "Sprint 12", "description": "time de dados"}, "confidence": 0.8}
"start a new board called Roadmap" -> {"kind": "create-board", "params": {"name": "Roadmap"}, "confidence": 0.9}
"não preciso mais do quadro abc123, pode sumir com ele" -> {"kind": "delete-board", "params": {"board_id": "abc123"}, "confidence": 0.8}
"get rid of https://trello.com/b/Xy12Ab" -> {"kind": "delete-board", "params": {"board_url": "https://trello.com/b/Xy12Ab"}, "confidence": 0.85}
"quero me livrar do quadro Projeto Beta" -> {"kind": "delete-board", "params": {"board_name": "Projeto Beta"}, "confidence": 0.75}
"como está organizado o quadro abc123?" -> {"kind": "list-lists", "params": {"board_id": "abc123"}, "confidence": 0.75}
"which columns does board def456 have" -> {"kind": "list-lists", "params": {"board_id": "def456"}, "confidence": 0.8}
"bota uma coluna Revisão no quadro abc123" -> {"kind": "create-list", "params": {"board_id": "abc123", "name": "Revisão"}, "confidence": 0.8}
"I need a Blocked column" -> {"kind": "create-list", "params": {"name": "Blocked"}, "confidence": 0.75}
"o que tem pra fazer na lista A Fazer?" -> {"kind": "list-cards", "params": {"list_name": "A Fazer"}, "confidence": 0.8}
"what's in list 5f2a9c?" -> {"kind": "list-cards", "params": {"list_id": "5f2a9c"}, "confidence": 0.8}
"anota aí: revisar contrato, na lista A Fazer" -> {"kind": "create-card", "params": {"name": "revisar contrato", "list_name": "A Fazer"}, "confidence": 0.8}
"lembrete para pagar o servidor amanhã" -> {"kind": "create-card", "params": {"name": "pagar o servidor amanhã"}, "confidence": 0.6}
"track a task to update the docs in Doing" -> {"kind": "create-card", "params": {"name": "update the docs", "list_name": "Doing"}, "confidence": 0.8}
"já terminei o deploy, tira ele do quadro" -> {"kind": "archive-card", "params": {"card_name": "deploy"}, "confidence": 0.7}
"archive the Deploy task" -> {"kind": "archive-card", "params": {"card_name": "Deploy"}, "confidence": 0.85}
"o que andaram mexendo no quadro abc123?" -> {"kind": "list-activity", "params": {"board_id": "abc123"}, "confidence": 0.8}
"show me the last 5 changes on board def456" -> {"kind": "list-activity", "params": {"board_id": "def456", "limit": 5}, "confidence": 0.85}
"onde está aquela tarefa do relatório?" -> {"kind": "search-card", "params": {"card_name": "relatório"}, "confidence": 0.75}
"is there a card about invoices on Projeto Alpha" -> {"kind": "search-card", "params": {"card_name": "invoices", "board_name": "Projeto Alpha"}, "confidence": 0.8}
"o que é o trello?" -> {"kind": "unknown", "params": {}, "confidence": 0.9}
"bom dia!" -> {"kind": "unknown", "params": {}, "confidence": 0.95}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Canned(&'static str);

    #[async_trait]
    impl LanguageModel for Canned {
        async fn complete(&self, _system: &str, _prompt: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct Failing;

    #[async_trait]
    impl LanguageModel for Failing {
        async fn complete(&self, _system: &str, _prompt: &str) -> Result<String> {
            Err(TalkError::LlmError("connection refused".into()))
        }
    }

    struct Slow;

    #[async_trait]
    impl LanguageModel for Slow {
        async fn complete(&self, _system: &str, _prompt: &str) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(r#"{"kind": "list-boards"}"#.into())
        }
    }

    #[test]
    fn test_extract_json_with_surrounding_text() {
        let response = "Claro! Aqui está:\n{\"kind\": \"list-boards\"}\nAlgo mais?";
        assert_eq!(extract_json(response), Some("{\"kind\": \"list-boards\"}"));
    }

    #[test]
    fn test_extract_json_no_json() {
        assert_eq!(extract_json("não sei"), None);
        assert_eq!(extract_json("} backwards {"), None);
    }

    #[test]
    fn test_parse_full_answer() {
        let command = parse_response(
            r#"{"kind": "create-card", "params": {"name": "Deploy", "list_name": "A Fazer"}, "confidence": 0.8}"#,
        );
        assert_eq!(command.kind, CommandKind::CreateCard);
        assert_eq!(command.source, CommandSource::Llm);
        assert_eq!(command.params.get(Param::Name), Some("Deploy"));
        assert_eq!(command.params.get(Param::ListName), Some("A Fazer"));
        assert!((command.confidence - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn test_garbage_is_unknown_with_zero_confidence() {
        for response in ["I cannot help with that", "[1, 2, 3]", "{not json}"] {
            let command = parse_response(response);
            assert_eq!(command.kind, CommandKind::Unknown, "{}", response);
            assert_eq!(command.confidence, 0.0);
        }
    }

    #[test]
    fn test_kind_outside_enumeration_is_unknown() {
        assert_eq!(parse_response(r#"{"kind": "rename-board"}"#).kind, CommandKind::Unknown);
        // Replies are only ever recognised by the gate
        assert_eq!(parse_response(r#"{"kind": "confirm"}"#).kind, CommandKind::Unknown);
        assert_eq!(parse_response(r#"{"kind": 7}"#).kind, CommandKind::Unknown);
    }

    #[test]
    fn test_params_coercion() {
        let command = parse_response(
            r#"{"kind": "list-activity", "params": {"board_id": "abc123", "limit": 5, "colour": "red", "name": null}}"#,
        );
        assert_eq!(command.params.get(Param::Limit), Some("5"));
        assert_eq!(command.params.get(Param::BoardId), Some("abc123"));
        assert!(!command.params.contains(Param::Name));
        assert_eq!(command.confidence, DEFAULT_CONFIDENCE);
    }

    #[test]
    fn test_confidence_is_clamped() {
        let command = parse_response(r#"{"kind": "list-boards", "confidence": 7}"#);
        assert_eq!(command.confidence, 1.0);
        let command = parse_response(r#"{"kind": "list-boards", "confidence": -1}"#);
        assert_eq!(command.confidence, 0.0);
    }

    #[test]
    fn test_board_url_is_normalized() {
        let command = parse_response(
            r#"{"kind": "delete-board", "params": {"board_url": "https://trello.com/b/Xy12Ab/roadmap"}}"#,
        );
        assert_eq!(command.params.get(Param::BoardId), Some("Xy12Ab"));

        let command = parse_response(
            r#"{"kind": "list-lists", "params": {"board_id": "https://www.trello.com/b/abc123"}}"#,
        );
        assert_eq!(command.params.get(Param::BoardId), Some("abc123"));
        assert_eq!(
            command.params.get(Param::BoardUrl),
            Some("https://www.trello.com/b/abc123")
        );
    }

    #[tokio::test]
    async fn test_classify_uses_model_answer() {
        let classifier = LlmIntentClassifier::new(
            Arc::new(Canned(r#"{"kind": "list-boards", "confidence": 0.9}"#)),
            Duration::from_secs(5),
        );
        let command = classifier
            .classify("quais são meus quadros?", &ConversationContext::default())
            .await
            .unwrap();
        assert_eq!(command.kind, CommandKind::ListBoards);
    }

    #[tokio::test]
    async fn test_transport_failure_is_an_error() {
        let classifier = LlmIntentClassifier::new(Arc::new(Failing), Duration::from_secs(5));
        let result = classifier
            .classify("bom dia", &ConversationContext::default())
            .await;
        assert!(matches!(result, Err(TalkError::Classification(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_an_error() {
        let classifier = LlmIntentClassifier::new(Arc::new(Slow), Duration::from_secs(30));
        let result = classifier
            .classify("bom dia", &ConversationContext::default())
            .await;
        assert!(matches!(result, Err(TalkError::Classification(_))));
    }

    #[test]
    fn test_prompt_embeds_context_and_utterance() {
        let mut ctx = ConversationContext::new(3);
        ctx.push("mostrar quadros", "1. Projeto Alpha (ID: abc123)");
        let prompt = build_prompt("apaga esse", &ctx);
        assert!(prompt.contains("User: mostrar quadros"));
        assert!(prompt.ends_with("apaga esse\n\nClassify this message into JSON:"));
    }

    #[test]
    fn test_system_prompt_lists_every_classifiable_kind() {
        for kind in CommandKind::ALL.into_iter().filter(|k| k.is_classifiable()) {
            assert!(
                CLASSIFY_SYSTEM_PROMPT.contains(&format!("- {}:", kind.as_str())),
                "{}",
                kind
            );
        }
    }
}
