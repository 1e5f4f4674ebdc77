//! SLR(1) parser generation and a table-driven shift-reduce engine.

use grammar::{TokenId, Terminal, CONTROL_TOKEN_NAMES, NUM_CONTROL_TOKENS};
use thiserror::Error;

pub use grammar::{Map, BiMap};

mod augment;
mod ffn;
mod builder;
mod engine;
mod reconstruct;
pub mod report;

pub use self::builder::build;
pub use self::engine::*;
pub use self::reconstruct::ReconstructError;

#[derive(Debug)]
pub struct Parser {
  /// positive: shift (n - 1)
  /// zero: error
  /// negative: reduce (-n - 1)
  /// MIN: accept
  pub action: Vec<Vec<i32>>,
  /// positive: goto (n - 1)
  /// zero: error
  pub goto: Vec<Vec<u32>>,
  /// Rules in id order. The augmented start production comes last and has
  /// no public rule id.
  pub prods: Vec<Production>,
  /// nonterminal names, indexed by nonterminal id
  pub nts: Vec<String>,
  pub tokens: BiMap<TokenId, Terminal>,
  /// vocabulary size of each extensible token
  pub vocab_sizes: Map<TokenId, usize>,
  pub start_nt: u32,
  pub start_state: u32,
  pub accept_prod: usize,
}

#[derive(Debug, Clone)]
pub struct Production {
  pub rhs_len: usize,
  pub nt: u32,
  pub symbols: Vec<Symbol>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbol {
  Token(TokenId),
  Nonterminal(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
  Shift(u32),
  Reduce(usize),
  Accept,
  Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
  pub states: usize,
  pub rules: usize,
  pub terminals: usize,
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("shift-reduce conflict at state {} on {}", .0.state, .0.shift)]
  ShiftReduceConflict(ShiftReduceConflictError),
  #[error("reduce-reduce conflict at state {} on {}", .0.state, .0.lookahead)]
  ReduceReduceConflict(ReduceReduceConflictError),
  #[error("state {0} has no action")]
  DeadState(u32),
}

#[derive(Debug)]
pub struct ShiftReduceConflictError {
  pub state: u32,
  pub state_items: Vec<String>,
  pub shift: String,
  pub reduce: String,
}

#[derive(Debug)]
pub struct ReduceReduceConflictError {
  pub state: u32,
  pub state_items: Vec<String>,
  pub lookahead: String,
  pub reduce1: String,
  pub reduce2: String,
}

impl Parser {
  pub fn action(&self, state: u32, token: TokenId) -> Action {
    let entry = self.action.get(state as usize)
      .and_then(|row| row.get(token.index()))
      .copied()
      .unwrap_or(0);
    match entry {
      0 => Action::Error,
      i32::MIN => Action::Accept,
      n if n > 0 => Action::Shift(n as u32 - 1),
      n => Action::Reduce(!n as usize),
    }
  }

  pub fn goto(&self, state: u32, nt: u32) -> Option<u32> {
    match self.goto[state as usize][nt as usize] {
      0 => None,
      n => Some(n - 1),
    }
  }

  pub fn num_states(&self) -> usize {
    self.action.len()
  }

  /// Number of public rules, the augmented start production excluded.
  pub fn num_rules(&self) -> usize {
    self.accept_prod
  }

  /// Number of token ids, control tokens included.
  pub fn num_tokens(&self) -> usize {
    NUM_CONTROL_TOKENS + self.tokens.len()
  }

  pub fn terminal(&self, token: TokenId) -> Option<&Terminal> {
    self.tokens.get_by_left(&token)
  }

  pub fn token_id(&self, terminal: &Terminal) -> Option<TokenId> {
    self.tokens.get_by_right(terminal).copied()
  }

  pub fn token_name(&self, token: TokenId) -> &str {
    if token.index() < NUM_CONTROL_TOKENS {
      CONTROL_TOKEN_NAMES[token.index()]
    } else {
      self.terminal(token).map(|t| t.name()).unwrap_or("?")
    }
  }

  pub fn nt_name(&self, nt: u32) -> &str {
    self.nts.get(nt as usize).map(|s| s.as_str()).unwrap_or("?")
  }

  pub fn rule_to_string(&self, rule: usize) -> String {
    let prod = &self.prods[rule];
    let mut buf = format!("{} ->", self.nt_name(prod.nt));
    for sym in &prod.symbols {
      buf.push(' ');
      match *sym {
        Symbol::Token(token) => buf.push_str(self.token_name(token)),
        Symbol::Nonterminal(nt) => buf.push_str(self.nt_name(nt)),
      }
    }
    buf
  }

  pub fn stats(&self) -> Stats {
    Stats {
      states: self.num_states(),
      rules: self.num_rules(),
      terminals: self.tokens.len(),
    }
  }
}
