//! Router configuration with documented constants
//!
//! All timing knobs live here with a note on how they interact. Values can
//! be overridden from a TOML file; anything the file leaves out keeps its
//! default.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::core::error::{Result, TalkError};

/// Configuration for the natural-language router and its collaborators
#[derive(Debug, Clone)]
pub struct RouterConfig {
    // === CACHING ===
    /// How long a read-only answer (board list, list list, ...) is reused
    ///
    /// Edits made elsewhere (web UI, phone) can stay invisible for this long.
    pub cache_ttl: Duration,

    // === CONFIRMATION ===
    /// How long a pending deletion waits for "sim" before it lapses
    ///
    /// After this the user must restate the request. Checked lazily on the
    /// next utterance of the same session.
    pub confirmation_ttl: Duration,

    // === EXTERNAL CALLS ===
    /// Upper bound on one language-model completion
    ///
    /// On expiry the turn is a classification failure, never "unknown".
    pub llm_timeout: Duration,

    /// Upper bound on one board-service call
    ///
    /// On expiry the outcome of the call is reported as unknown.
    pub service_timeout: Duration,

    /// Pause before the single retry of a read call that hit a transport error
    pub retry_backoff: Duration,

    // === CLASSIFICATION ===
    /// Number of prior turns handed to the language model as context
    pub context_turns: usize,

    /// How long a silent session keeps its conversation window
    ///
    /// Idle sessions are dropped when another session is next served.
    pub session_idle_ttl: Duration,

    /// Lexicon matches whose entry confidence is below this are re-checked
    /// with the language model (when one is configured)
    ///
    /// 0.0 disables corroboration entirely.
    pub corroboration_threshold: f32,

    /// Skip the language model for utterances that never mention boards,
    /// lists, cards or Trello
    pub domain_filter: bool,

    // === DISPATCH DEFAULTS ===
    /// Board used when an utterance names no board
    pub default_board_id: Option<String>,

    /// Lists created on every new board, in order
    pub default_lists: Vec<String>,

    /// Number of activity entries shown when the user gives no limit
    pub activity_limit: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(60),

            confirmation_ttl: Duration::from_secs(120),

            llm_timeout: Duration::from_secs(30),
            service_timeout: Duration::from_secs(15),
            retry_backoff: Duration::from_millis(500),

            context_turns: 10,
            session_idle_ttl: Duration::from_secs(30 * 60),
            corroboration_threshold: 0.5,
            domain_filter: true,

            default_board_id: None,
            default_lists: vec![
                "A Fazer".to_string(),
                "Em Andamento".to_string(),
                "Concluído".to_string(),
            ],
            activity_limit: 10,
        }
    }
}

impl RouterConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.llm_timeout.is_zero() || self.service_timeout.is_zero() {
            return Err("Timeouts must be positive".into());
        }

        if self.confirmation_ttl.is_zero() {
            return Err("confirmation_ttl must be positive".into());
        }

        // An evicted session must not leave a live confirmation behind
        if self.session_idle_ttl < self.confirmation_ttl {
            return Err(format!(
                "session_idle_ttl ({:?}) should be >= confirmation_ttl ({:?})",
                self.session_idle_ttl, self.confirmation_ttl
            ));
        }

        // The single retry must fit inside the call budget
        if self.retry_backoff >= self.service_timeout {
            return Err(format!(
                "retry_backoff ({:?}) should be < service_timeout ({:?})",
                self.retry_backoff, self.service_timeout
            ));
        }

        if !(0.0..=1.0).contains(&self.corroboration_threshold) {
            return Err(format!(
                "corroboration_threshold ({}) must be within 0.0..=1.0",
                self.corroboration_threshold
            ));
        }

        if self.activity_limit == 0 {
            return Err("activity_limit must be at least 1".into());
        }

        Ok(())
    }

    /// Load a config from a TOML file, starting from defaults
    pub fn load_from_toml(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Parse a config from a TOML string, starting from defaults
    pub fn parse_toml(content: &str) -> Result<Self> {
        let file: TomlConfig = toml::from_str(content)?;
        let config = file.apply(Self::default());
        config.validate().map_err(TalkError::Config)?;
        Ok(config)
    }
}

/// TOML representation of the config file
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlConfig {
    cache_ttl_secs: Option<u64>,
    confirmation_ttl_secs: Option<u64>,
    llm_timeout_secs: Option<u64>,
    service_timeout_secs: Option<u64>,
    retry_backoff_ms: Option<u64>,
    context_turns: Option<usize>,
    session_idle_ttl_secs: Option<u64>,
    corroboration_threshold: Option<f32>,
    domain_filter: Option<bool>,
    default_board_id: Option<String>,
    default_lists: Option<Vec<String>>,
    activity_limit: Option<usize>,
}

impl TomlConfig {
    fn apply(self, mut config: RouterConfig) -> RouterConfig {
        if let Some(secs) = self.cache_ttl_secs {
            config.cache_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = self.confirmation_ttl_secs {
            config.confirmation_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = self.llm_timeout_secs {
            config.llm_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.service_timeout_secs {
            config.service_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = self.retry_backoff_ms {
            config.retry_backoff = Duration::from_millis(ms);
        }
        if let Some(turns) = self.context_turns {
            config.context_turns = turns;
        }
        if let Some(secs) = self.session_idle_ttl_secs {
            config.session_idle_ttl = Duration::from_secs(secs);
        }
        if let Some(threshold) = self.corroboration_threshold {
            config.corroboration_threshold = threshold;
        }
        if let Some(filter) = self.domain_filter {
            config.domain_filter = filter;
        }
        if self.default_board_id.is_some() {
            config.default_board_id = self.default_board_id;
        }
        if let Some(lists) = self.default_lists {
            config.default_lists = lists;
        }
        if let Some(limit) = self.activity_limit {
            config.activity_limit = limit;
        }
        config
    }
}
