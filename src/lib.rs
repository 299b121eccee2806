//! Boardtalk - natural-language control of Trello boards

pub mod command;
pub mod core;
pub mod llm;
pub mod nl;
pub mod service;
