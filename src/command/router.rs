//! Per-utterance orchestration
//!
//! For each chat line the router decides, in order: is this a reply to a
//! pending confirmation, does the lexicon know it, does the language model
//! know it. Whatever comes out is gated (deletions), served from cache
//! (reads) or dispatched. The router never returns an error; every path
//! ends in a `RouteOutcome`.
//!
//! Turns of one session are serialized through that session's async mutex,
//! so a "sim" can never race the request it confirms. Different sessions
//! run independently.

use std::sync::{Arc, Mutex, PoisonError};

use ahash::AHashMap;
use tokio::time::Instant;

use crate::command::cache::{CacheStats, ResponseCache};
use crate::command::confirmation::{ConfirmationGate, Hold, PendingAction, Reply, Resolution};
use crate::command::dispatcher::CommandDispatcher;
use crate::command::format::{self, DisplayResult};
use crate::core::config::RouterConfig;
use crate::core::types::SessionId;
use crate::llm::classifier::LlmIntentClassifier;
use crate::llm::client::LanguageModel;
use crate::llm::context::ConversationContext;
use crate::nl::command::{Command, CommandKind, CommandSource};
use crate::nl::extractor::ParameterExtractor;
use crate::nl::lexicon::{mentions_domain, CommandLexicon};
use crate::service::BoardService;

/// What the chat surface should do with an utterance
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    /// Show this to the user
    Display(DisplayResult),
    /// Not a board command; hand the message to ordinary chat
    PassThrough,
    /// The language model could not be reached or did not answer in time
    ClassificationFailure(String),
}

type SessionState = Arc<tokio::sync::Mutex<ConversationContext>>;

struct SessionSlot {
    state: SessionState,
    last_seen: Instant,
}

/// Natural-language front door to the board service
pub struct NlCommandRouter {
    lexicon: CommandLexicon,
    extractor: ParameterExtractor,
    classifier: Option<LlmIntentClassifier>,
    dispatcher: CommandDispatcher,
    gate: ConfirmationGate,
    cache: ResponseCache<DisplayResult>,
    sessions: Mutex<AHashMap<SessionId, SessionSlot>>,
    config: RouterConfig,
}

impl NlCommandRouter {
    /// Router with the built-in lexicon and no language model
    pub fn new(service: Arc<dyn BoardService>, config: RouterConfig) -> Self {
        Self {
            lexicon: CommandLexicon::builtin(),
            extractor: ParameterExtractor::new(),
            classifier: None,
            dispatcher: CommandDispatcher::new(service, config.clone()),
            gate: ConfirmationGate::new(),
            cache: ResponseCache::new(),
            sessions: Mutex::new(AHashMap::new()),
            config,
        }
    }

    /// Enable the language-model tier
    pub fn with_language_model(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.classifier = Some(LlmIntentClassifier::new(model, self.config.llm_timeout));
        self
    }

    /// Replace the built-in lexicon
    pub fn with_lexicon(mut self, lexicon: CommandLexicon) -> Self {
        self.lexicon = lexicon;
        self
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// The session's live pending deletion, if any
    pub fn pending(&self, session: &SessionId) -> Option<PendingAction> {
        self.gate.pending(session)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Sessions currently holding conversation state
    pub fn session_count(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Number of turns remembered for `session`
    pub async fn context_len(&self, session: &SessionId) -> usize {
        self.session_state(session).lock().await.len()
    }

    /// Route one chat line
    pub async fn handle(&self, session: &SessionId, utterance: &str) -> RouteOutcome {
        let state = self.session_state(session);
        let mut context = state.lock().await;

        let outcome = self.route(session, utterance.trim(), &context).await;

        match &outcome {
            RouteOutcome::Display(display) => context.push(utterance.trim(), display.text.as_str()),
            RouteOutcome::ClassificationFailure(reason) => context.push(utterance.trim(), reason.as_str()),
            RouteOutcome::PassThrough => {}
        }
        outcome
    }

    /// The session's state, creating it on first use
    ///
    /// Sessions idle for longer than `session_idle_ttl` are dropped on the
    /// way, unless a turn of theirs is still in flight.
    fn session_state(&self, session: &SessionId) -> SessionState {
        let now = Instant::now();
        let idle_ttl = self.config.session_idle_ttl;
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);

        sessions.retain(|id, slot| {
            let keep = id == session
                || Arc::strong_count(&slot.state) > 1
                || now.saturating_duration_since(slot.last_seen) < idle_ttl;
            if !keep {
                self.gate.discard_expired(id);
                tracing::debug!(session = %id, "Evicted idle session");
            }
            keep
        });

        let slot = sessions.entry(session.clone()).or_insert_with(|| SessionSlot {
            state: Arc::new(tokio::sync::Mutex::new(ConversationContext::new(
                self.config.context_turns,
            ))),
            last_seen: now,
        });
        slot.last_seen = now;
        slot.state.clone()
    }

    async fn route(
        &self,
        session: &SessionId,
        utterance: &str,
        context: &ConversationContext,
    ) -> RouteOutcome {
        if utterance.is_empty() {
            return RouteOutcome::PassThrough;
        }

        // Replies to a pending confirmation come first, whatever the lexicon holds
        if let Some(reply) = Reply::parse(utterance) {
            return self.resolve(session, reply).await;
        }

        let matched = self.lexicon.find(utterance);
        if let Some(reply) = matched.as_ref().and_then(|m| Reply::from_kind(m.kind)) {
            return self.resolve(session, reply).await;
        }
        if let Some(lapsed) = self.gate.discard_expired(session) {
            tracing::debug!(
                session = %session,
                board_id = %lapsed.target_entity_id,
                "Dropped expired confirmation"
            );
        }

        // Lexicon, then the language model
        let command = match matched {
            Some(m) => {
                let params = self.extractor.extract(m.kind, utterance);
                let command = Command::new(m.kind, params, CommandSource::Pattern, m.confidence);
                tracing::debug!(kind = %command.kind, entry = %m.label, "Lexicon match");
                if m.confidence < self.config.corroboration_threshold {
                    self.corroborate(command, utterance, context).await
                } else {
                    command
                }
            }
            None => {
                if self.config.domain_filter && !mentions_domain(utterance) {
                    tracing::debug!("No board vocabulary, passing through");
                    return RouteOutcome::PassThrough;
                }
                let Some(classifier) = &self.classifier else {
                    return RouteOutcome::PassThrough;
                };
                match classifier.classify(utterance, context).await {
                    Ok(command) => command,
                    Err(e) => return RouteOutcome::ClassificationFailure(e.to_string()),
                }
            }
        };

        // Deletions go through the gate
        if command.kind.is_destructive() {
            return self.request_confirmation(session, &command).await;
        }

        // Nothing actionable
        if !command.kind.is_classifiable() {
            return RouteOutcome::PassThrough;
        }

        let key = command.cache_key();
        if command.kind.is_cacheable() {
            if let Some(hit) = self.cache.get(&key) {
                tracing::debug!(key = %key, "Cache hit");
                return RouteOutcome::Display(hit);
            }
        }

        let display = self.dispatcher.dispatch(&command).await;
        if command.kind.is_mutation() {
            // A failed or timed-out mutation may still have reached the service
            self.cache.invalidate_all();
        } else if command.kind.is_cacheable() && display.is_success() {
            self.cache.put(key, display.clone(), self.config.cache_ttl);
        }
        RouteOutcome::Display(display)
    }

    async fn resolve(&self, session: &SessionId, reply: Reply) -> RouteOutcome {
        match self.gate.resolve(session, reply) {
            Resolution::Confirmed(confirmed) => {
                tracing::info!(
                    session = %session,
                    board_id = %confirmed.action().target_entity_id,
                    "Deletion confirmed"
                );
                let display = self.dispatcher.execute(confirmed).await;
                self.cache.invalidate_all();
                RouteOutcome::Display(display)
            }
            Resolution::Cancelled(action) => {
                tracing::info!(session = %session, board_id = %action.target_entity_id, "Deletion cancelled");
                RouteOutcome::Display(format::cancelled(&action.target_entity_label))
            }
            Resolution::Expired(action) => {
                tracing::info!(session = %session, board_id = %action.target_entity_id, "Confirmation expired");
                RouteOutcome::Display(format::expired(&action.target_entity_label))
            }
            Resolution::NothingPending => RouteOutcome::PassThrough,
        }
    }

    async fn request_confirmation(&self, session: &SessionId, command: &Command) -> RouteOutcome {
        let target = match self.dispatcher.target_for(command).await {
            Ok(target) => target,
            Err(display) => return RouteOutcome::Display(display),
        };

        let action = PendingAction::new(
            command.kind,
            target.id.as_str(),
            target.label.as_str(),
            self.config.confirmation_ttl,
        );
        tracing::info!(session = %session, board_id = %target.id, "Deletion requested, awaiting confirmation");

        let display = match self.gate.hold(session, action) {
            Hold::Fresh | Hold::Refreshed => format::confirmation_request(&target.id, &target.label),
            Hold::Replaced(previous) => {
                format::replacement_request(&previous.target_entity_label, &target.id, &target.label)
            }
        };
        RouteOutcome::Display(display)
    }

    /// Second opinion on a weak lexicon match; the lexicon answer stands
    /// unless the model names a concrete command
    async fn corroborate(&self, command: Command, utterance: &str, context: &ConversationContext) -> Command {
        let Some(classifier) = &self.classifier else {
            return command;
        };
        match classifier.classify(utterance, context).await {
            Ok(llm) if llm.kind != CommandKind::Unknown => {
                tracing::debug!(lexicon = %command.kind, llm = %llm.kind, "Corroborated by LLM");
                llm
            }
            Ok(_) => command,
            Err(e) => {
                tracing::warn!(error = %e, "Corroboration failed, keeping lexicon match");
                command
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{Activity, Board, BoardList, Card, ServiceError};
    use async_trait::async_trait;
    use std::time::Duration;

    struct Empty;

    #[async_trait]
    impl BoardService for Empty {
        async fn list_boards(&self) -> Result<Vec<Board>, ServiceError> {
            Ok(Vec::new())
        }
        async fn get_board(&self, board_id: &str) -> Result<Board, ServiceError> {
            Err(ServiceError::NotFound(board_id.to_string()))
        }
        async fn list_lists(&self, _: &str) -> Result<Vec<BoardList>, ServiceError> {
            Ok(Vec::new())
        }
        async fn create_board(&self, _: &str, _: Option<&str>) -> Result<Board, ServiceError> {
            Err(ServiceError::Transport("offline".into()))
        }
        async fn create_list(&self, _: &str, _: &str) -> Result<BoardList, ServiceError> {
            Err(ServiceError::Transport("offline".into()))
        }
        async fn create_card(&self, _: &str, _: &str, _: Option<&str>) -> Result<Card, ServiceError> {
            Err(ServiceError::Transport("offline".into()))
        }
        async fn list_cards(&self, _: &str) -> Result<Vec<Card>, ServiceError> {
            Ok(Vec::new())
        }
        async fn delete_board(&self, _: &str) -> Result<(), ServiceError> {
            Ok(())
        }
        async fn archive_card(&self, card_id: &str) -> Result<Card, ServiceError> {
            Err(ServiceError::NotFound(card_id.to_string()))
        }
        async fn board_cards(&self, _: &str) -> Result<Vec<Card>, ServiceError> {
            Ok(Vec::new())
        }
        async fn recent_activity(&self, _: &str, _: usize) -> Result<Vec<Activity>, ServiceError> {
            Ok(Vec::new())
        }
    }

    fn router() -> NlCommandRouter {
        NlCommandRouter::new(Arc::new(Empty), RouterConfig::default())
    }

    #[tokio::test]
    async fn test_empty_and_small_talk_pass_through() {
        let router = router();
        let session = SessionId::named("a");
        assert_eq!(router.handle(&session, "   ").await, RouteOutcome::PassThrough);
        assert_eq!(router.handle(&session, "bom dia!").await, RouteOutcome::PassThrough);
        assert_eq!(router.context_len(&session).await, 0);
    }

    #[tokio::test]
    async fn test_bare_reply_without_pending_passes_through() {
        let router = router();
        assert_eq!(
            router.handle(&SessionId::named("a"), "sim").await,
            RouteOutcome::PassThrough
        );
    }

    #[tokio::test]
    async fn test_empty_listing_is_displayed_and_remembered() {
        let router = router();
        let session = SessionId::named("a");
        match router.handle(&session, "mostrar quadros").await {
            RouteOutcome::Display(display) => assert_eq!(display.text, "Nenhum quadro encontrado."),
            other => panic!("expected display, got {:?}", other),
        }
        assert_eq!(router.context_len(&session).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_sessions_are_evicted() {
        let router = router();
        let idle_ttl = router.config().session_idle_ttl;

        router.handle(&SessionId::named("a"), "mostrar quadros").await;
        router.handle(&SessionId::named("b"), "mostrar quadros").await;
        assert_eq!(router.session_count(), 2);

        tokio::time::advance(idle_ttl + Duration::from_secs(1)).await;
        router.handle(&SessionId::named("b"), "mostrar quadros").await;
        assert_eq!(router.session_count(), 1);
        assert_eq!(router.context_len(&SessionId::named("b")).await, 2);
    }

    #[tokio::test]
    async fn test_unknown_board_is_not_held() {
        let router = router();
        let session = SessionId::named("a");
        let outcome = router.handle(&session, "apagar quadro com id zzz999").await;
        assert!(matches!(outcome, RouteOutcome::Display(ref d) if d.kind == format::DisplayKind::Error));
        assert!(router.pending(&session).is_none());
    }
}
