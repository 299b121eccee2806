//! Pattern tier: command vocabulary, the lexicon, parameter extraction and
//! board URL parsing.

pub mod command;
pub mod extractor;
pub mod lexicon;
pub mod url;

pub use command::{Command, CommandKind, CommandSource, Param, Params};
pub use extractor::ParameterExtractor;
pub use lexicon::{mentions_domain, CommandLexicon, LexiconEntry, LexiconMatch};
