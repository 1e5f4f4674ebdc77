use grammar::{Terminal, TokenId, EOS, NUM_CONTROL_TOKENS};
use thiserror::Error;
use crate::{Action, Parser, ReconstructError};

/// Value carried by a shifted terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Payload {
  /// fixed terminals
  None,
  /// index into the vocabulary of an extensible terminal
  Index(usize),
  /// inclusive span of the input sentence, for copy terminals
  Span(usize, usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseEvent {
  Shift {
    token: TokenId,
    payload: Payload,
  },
  Reduce(u32),
  Accept,
}

/// Order of the events of a parse.
///
/// Bottom-up is the order of a shift-reduce parse: every reduction follows
/// the events of its children (rightmost derivation in reverse). Top-down
/// puts every reduction before its children (leftmost derivation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
  #[default]
  BottomUp,
  TopDown,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
  #[error("unexpected token {token} at position {position} in state {state}")]
  UnexpectedToken {
    position: usize,
    token: TokenId,
    state: u32,
  },
  #[error("unknown token {token} at position {position}")]
  UnknownToken {
    position: usize,
    token: TokenId,
  },
  #[error("payload of token {token} at position {position} does not match its terminal class")]
  MalformedPayload {
    position: usize,
    token: TokenId,
  },
}

/// Runs a built automaton over token sequences and event sequences.
#[derive(Debug)]
pub struct Engine {
  parser: Parser,
}

impl Engine {
  pub fn new(parser: Parser) -> Self {
    Self { parser }
  }

  pub fn parser(&self) -> &Parser {
    &self.parser
  }

  /// Checks that `payload` is what a shift of `token` carries.
  pub(crate) fn payload_matches(&self, token: TokenId, payload: Payload) -> bool {
    match (self.parser.terminal(token), payload) {
      (Some(Terminal::Fixed(_)), Payload::None) => true,
      (Some(Terminal::Extensible(_)), Payload::Index(ix)) => {
        ix < self.parser.vocab_sizes.get(&token).copied().unwrap_or(0)
      }
      (Some(Terminal::Copy(_)), Payload::Span(begin, end)) => begin <= end,
      _ => false,
    }
  }

  pub(crate) fn is_known_token(&self, token: TokenId) -> bool {
    token.index() >= NUM_CONTROL_TOKENS && self.parser.terminal(token).is_some()
  }

  /// Parses a complete token sequence. The end of input is implied.
  pub fn parse(
    &self,
    tokens: &[(TokenId, Payload)],
    direction: Direction,
  ) -> Result<Vec<ParseEvent>, ParseError> {
    for (position, &(token, payload)) in tokens.iter().enumerate() {
      if !self.is_known_token(token) {
        return Err(ParseError::UnknownToken { position, token });
      }
      if !self.payload_matches(token, payload) {
        return Err(ParseError::MalformedPayload { position, token });
      }
    }

    let parser = &self.parser;
    let mut events = vec![];
    let mut stack = vec![parser.start_state];
    let mut position = 0;

    loop {
      let (token, payload) = tokens.get(position)
        .copied()
        .unwrap_or((EOS, Payload::None));
      let state = stack[stack.len() - 1];

      match parser.action(state, token) {
        Action::Shift(next) => {
          events.push(ParseEvent::Shift { token, payload });
          stack.push(next);
          position += 1;
        }
        Action::Reduce(prod_ix) => {
          let prod = &parser.prods[prod_ix];
          stack.truncate(stack.len() - prod.rhs_len);
          let state0 = stack[stack.len() - 1];
          match parser.goto(state0, prod.nt) {
            Some(next) => stack.push(next),
            None => return Err(ParseError::UnexpectedToken { position, token, state }),
          }
          events.push(ParseEvent::Reduce(prod_ix as u32));
        }
        Action::Accept => {
          events.push(ParseEvent::Accept);
          break;
        }
        Action::Error => {
          return Err(ParseError::UnexpectedToken { position, token, state });
        }
      }
    }

    match direction {
      Direction::BottomUp => Ok(events),
      Direction::TopDown => Ok(self.to_preorder(events)),
    }
  }

  /// Reorders the events of a shift-reduce parse so that each reduction
  /// precedes the events of its children.
  fn to_preorder(&self, events: Vec<ParseEvent>) -> Vec<ParseEvent> {
    let mut subtrees: Vec<Vec<ParseEvent>> = vec![];

    for event in events {
      match event {
        ParseEvent::Shift { .. } => subtrees.push(vec![event]),
        ParseEvent::Reduce(prod_ix) => {
          let rhs_len = self.parser.prods[prod_ix as usize].rhs_len;
          let children = subtrees.split_off(subtrees.len() - rhs_len);
          let mut tree = vec![event];
          tree.extend(children.into_iter().flatten());
          subtrees.push(tree);
        }
        ParseEvent::Accept => {}
      }
    }

    let mut events = subtrees.into_iter().flatten().collect::<Vec<_>>();
    events.push(ParseEvent::Accept);
    events
  }

  /// Rebuilds the terminal sequence whose parse produced `events`.
  ///
  /// Fixed terminals come from the right-hand sides of the reduced rules, so
  /// their shift events may be left out. Extensible and copy terminals are
  /// taken from the shift events with their payloads.
  pub fn reconstruct(
    &self,
    events: &[ParseEvent],
    direction: Direction,
  ) -> Result<Vec<(TokenId, Payload)>, ReconstructError> {
    crate::reconstruct::reconstruct(self, events, direction)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use grammar::{GrammarBuilder, fixed, nt, ext};
  use pretty_assertions::assert_eq;

  fn engine() -> Engine {
    let mut builder = GrammarBuilder::new("E");
    builder
      .rule("E", vec![nt("T"), fixed("+"), nt("E")])
      .rule("E", vec![nt("T")])
      .rule("T", vec![ext("NUMBER")]);
    builder.extensible("NUMBER", vec!["NUMBER_0".to_owned(), "NUMBER_1".to_owned()]);
    Engine::new(crate::build(&builder.build().unwrap()).unwrap())
  }

  fn token(engine: &Engine, name: &str) -> TokenId {
    engine.parser().tokens.iter()
      .find(|(_, t)| t.name() == name)
      .map(|(&id, _)| id)
      .unwrap()
  }

  #[test]
  fn parse_bottom_up_and_top_down() {
    let engine = engine();
    let num = token(&engine, "NUMBER");
    let plus = token(&engine, "+");
    let input = [
      (num, Payload::Index(1)),
      (plus, Payload::None),
      (num, Payload::Index(0)),
    ];

    let events = engine.parse(&input, Direction::BottomUp).unwrap();
    assert_eq!(events, vec![
      ParseEvent::Shift { token: num, payload: Payload::Index(1) },
      ParseEvent::Reduce(2),
      ParseEvent::Shift { token: plus, payload: Payload::None },
      ParseEvent::Shift { token: num, payload: Payload::Index(0) },
      ParseEvent::Reduce(2),
      ParseEvent::Reduce(1),
      ParseEvent::Reduce(0),
      ParseEvent::Accept,
    ]);

    let events = engine.parse(&input, Direction::TopDown).unwrap();
    assert_eq!(events, vec![
      ParseEvent::Reduce(0),
      ParseEvent::Reduce(2),
      ParseEvent::Shift { token: num, payload: Payload::Index(1) },
      ParseEvent::Shift { token: plus, payload: Payload::None },
      ParseEvent::Reduce(1),
      ParseEvent::Reduce(2),
      ParseEvent::Shift { token: num, payload: Payload::Index(0) },
      ParseEvent::Accept,
    ]);
  }

  #[test]
  fn parse_errors() {
    let engine = engine();
    let num = token(&engine, "NUMBER");
    let plus = token(&engine, "+");

    assert_eq!(
      engine.parse(&[(num, Payload::Index(0)), (plus, Payload::None)], Direction::BottomUp),
      Err(ParseError::UnexpectedToken { position: 2, token: EOS, state: 4 }));
    assert_eq!(
      engine.parse(&[(num, Payload::Index(2))], Direction::BottomUp),
      Err(ParseError::MalformedPayload { position: 0, token: num }));
    assert_eq!(
      engine.parse(&[(TokenId::new(40), Payload::None)], Direction::BottomUp),
      Err(ParseError::UnknownToken { position: 0, token: TokenId::new(40) }));
    assert_eq!(
      engine.parse(&[(EOS, Payload::None)], Direction::BottomUp),
      Err(ParseError::UnknownToken { position: 0, token: EOS }));
  }
}
