//! Language-model tier: the HTTP client, the intent classifier and the
//! conversation window it reads from.

pub mod classifier;
pub mod client;
pub mod context;

pub use classifier::LlmIntentClassifier;
pub use client::{LanguageModel, LlmClient};
pub use context::ConversationContext;
