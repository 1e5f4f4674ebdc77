//! Grammar model shared by the schema compiler and the parser generator.
//!
//! A [`Grammar`] is built through a [`GrammarBuilder`], which checks that every
//! referenced symbol is defined. The parser generator works on the
//! [`LoweredGrammar`] form, where symbols are replaced by dense ids.

use thiserror::Error;

mod grammar;
mod flatten;
mod lower;

pub use self::grammar::*;
pub use self::flatten::terminal_nonterminal;
pub use self::lower::*;

pub type Map<K, V> = indexmap::IndexMap<K, V>;

pub type Set<K> = indexmap::IndexSet<K>;

pub type BiMap<K, V> = bimap::BiHashMap<K, V>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarError {
  #[error("start nonterminal `{0}` has no productions")]
  MissingStart(String),
  #[error("nonterminal `{name}` is referenced by `{referenced_by}` but has no productions")]
  UndefinedNonterminal {
    name: String,
    referenced_by: String,
  },
  #[error("terminal class `{name}` is referenced by `{referenced_by}` but never declared")]
  UndeclaredClass {
    name: String,
    referenced_by: String,
  },
  #[error("`{0}` is used as more than one kind of terminal")]
  ClassConflict(String),
  #[error("extensible terminal class `{0}` has an empty vocabulary")]
  EmptyVocabulary(String),
}
