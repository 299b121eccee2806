pub mod config;
pub mod error;
pub mod types;

pub use config::RouterConfig;
pub use error::{Result, TalkError};
pub use types::SessionId;
