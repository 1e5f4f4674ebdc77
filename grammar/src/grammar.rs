use std::fmt;
use crate::{GrammarError, Map, Set};

/// A terminal symbol.
///
/// Fixed terminals are identified by their text. Extensible and copy
/// terminals are identified by their class name; the concrete value of a use
/// is carried next to the terminal (a vocabulary index or an input span).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Terminal {
  Fixed(String),
  Extensible(String),
  Copy(String),
}

impl Terminal {
  pub fn name(&self) -> &str {
    match self {
      Self::Fixed(name) | Self::Extensible(name) | Self::Copy(name) => name,
    }
  }
}

impl fmt::Display for Terminal {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.write_str(self.name())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Item {
  Terminal(Terminal),
  Nonterminal(String),
}

impl fmt::Display for Item {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Self::Terminal(terminal) => terminal.fmt(f),
      Self::Nonterminal(name) => f.write_str(name),
    }
  }
}

pub fn fixed(text: impl Into<String>) -> Item {
  Item::Terminal(Terminal::Fixed(text.into()))
}

pub fn ext(class: impl Into<String>) -> Item {
  Item::Terminal(Terminal::Extensible(class.into()))
}

pub fn copy(class: impl Into<String>) -> Item {
  Item::Terminal(Terminal::Copy(class.into()))
}

pub fn nt(name: impl Into<String>) -> Item {
  Item::Nonterminal(name.into())
}

/// Declaration of a copy terminal class.
///
/// In program text a copied span is written between `open` and `close`.
/// `values` are the placeholder terminals that replace the class when the
/// grammar is flattened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyClass {
  pub open: String,
  pub close: String,
  pub values: Vec<String>,
}

/// An immutable, validated context-free grammar.
#[derive(Debug, Clone)]
pub struct Grammar {
  pub(crate) start: String,
  pub(crate) rules: Map<String, Vec<Vec<Item>>>,
  pub(crate) extensible: Map<String, Vec<String>>,
  pub(crate) copy: Map<String, CopyClass>,
}

impl Grammar {
  pub fn start(&self) -> &str {
    &self.start
  }

  /// Nonterminals with their productions, in declaration order.
  pub fn rules(&self) -> &Map<String, Vec<Vec<Item>>> {
    &self.rules
  }

  pub fn productions(&self, nonterminal: &str) -> &[Vec<Item>] {
    self.rules.get(nonterminal).map(|prods| prods.as_slice()).unwrap_or(&[])
  }

  pub fn num_productions(&self) -> usize {
    self.rules.values().map(|prods| prods.len()).sum()
  }

  /// Extensible classes with their value vocabularies.
  pub fn extensible_terminals(&self) -> &Map<String, Vec<String>> {
    &self.extensible
  }

  pub fn copy_terminals(&self) -> &Map<String, CopyClass> {
    &self.copy
  }

  /// Whether a production `lhs -> items` exists.
  pub fn contains(&self, lhs: &str, items: &[Item]) -> bool {
    self.productions(lhs).iter().any(|prod| prod.as_slice() == items)
  }
}

/// Collects productions and terminal classes for one grammar.
///
/// Adding the same production twice is a no-op, so callers may emit a rule
/// once per occurrence of whatever produced it.
#[derive(Debug)]
pub struct GrammarBuilder {
  start: String,
  rules: Map<String, Set<Vec<Item>>>,
  extensible: Map<String, Vec<String>>,
  copy: Map<String, CopyClass>,
}

impl GrammarBuilder {
  pub fn new(start: impl Into<String>) -> Self {
    Self {
      start: start.into(),
      rules: Map::new(),
      extensible: Map::new(),
      copy: Map::new(),
    }
  }

  pub fn rule(&mut self, nonterminal: impl Into<String>, items: Vec<Item>) -> &mut Self {
    self.rules.entry(nonterminal.into()).or_default().insert(items);
    self
  }

  pub fn has_rules(&self, nonterminal: &str) -> bool {
    self.rules.get(nonterminal).map_or(false, |prods| !prods.is_empty())
  }

  pub fn extensible(
    &mut self,
    class: impl Into<String>,
    values: Vec<String>,
  ) -> &mut Self {
    self.extensible.insert(class.into(), values);
    self
  }

  pub fn copy(&mut self, class: impl Into<String>, decl: CopyClass) -> &mut Self {
    self.copy.insert(class.into(), decl);
    self
  }

  pub fn build(self) -> Result<Grammar, GrammarError> {
    if !self.has_rules(&self.start) {
      return Err(GrammarError::MissingStart(self.start));
    }

    for class in self.extensible.keys() {
      if self.copy.contains_key(class) {
        return Err(GrammarError::ClassConflict(class.clone()));
      }
    }

    for (class, values) in &self.extensible {
      if values.is_empty() {
        return Err(GrammarError::EmptyVocabulary(class.clone()));
      }
    }

    for (lhs, prods) in &self.rules {
      for item in prods.iter().flatten() {
        match item {
          Item::Nonterminal(name) => {
            if !self.has_rules(name) {
              return Err(GrammarError::UndefinedNonterminal {
                name: name.clone(),
                referenced_by: lhs.clone(),
              });
            }
          }
          Item::Terminal(Terminal::Fixed(text)) => {
            if self.extensible.contains_key(text) || self.copy.contains_key(text) {
              return Err(GrammarError::ClassConflict(text.clone()));
            }
          }
          Item::Terminal(Terminal::Extensible(class)) => {
            if !self.extensible.contains_key(class) {
              return Err(GrammarError::UndeclaredClass {
                name: class.clone(),
                referenced_by: lhs.clone(),
              });
            }
          }
          Item::Terminal(Terminal::Copy(class)) => {
            if !self.copy.contains_key(class) {
              return Err(GrammarError::UndeclaredClass {
                name: class.clone(),
                referenced_by: lhs.clone(),
              });
            }
          }
        }
      }
    }

    let rules: Map<String, Vec<Vec<Item>>> = self.rules.into_iter()
      .map(|(lhs, prods)| (lhs, prods.into_iter().collect::<Vec<_>>()))
      .collect();

    Ok(Grammar {
      start: self.start,
      rules,
      extensible: self.extensible,
      copy: self.copy,
    })
  }
}
