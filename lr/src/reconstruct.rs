use grammar::{Terminal, TokenId};
use thiserror::Error;
use crate::{Direction, Engine, ParseEvent, Payload, Symbol};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconstructError {
  #[error("event {position} reduces rule {rule}, which does not exist")]
  RuleOutOfRange {
    position: usize,
    rule: u32,
  },
  #[error("event {position} reduces `{rule}` where `{expected}` is expected")]
  MismatchedReduce {
    position: usize,
    rule: String,
    expected: String,
  },
  #[error("event {position} shifts {token} where {expected} is expected")]
  UnexpectedShift {
    position: usize,
    token: TokenId,
    expected: String,
  },
  #[error("event {position} reduces where a shift of `{expected}` is expected")]
  ExpectedShift {
    position: usize,
    expected: String,
  },
  #[error("payload of event {position} does not match token {token}")]
  MalformedPayload {
    position: usize,
    token: TokenId,
  },
  #[error("event {position} shifts unknown token {token}")]
  UnknownToken {
    position: usize,
    token: TokenId,
  },
  #[error("accepted at event {0} before the derivation is complete")]
  PrematureAccept(usize),
  #[error("event sequence does not accept")]
  MissingAccept,
  #[error("event {0} and the events after it are not part of the derivation")]
  TrailingEvents(usize),
}

/// Cursor over the events of one derivation, in the order in which the
/// derivation consumes them.
struct Events<'a> {
  events: &'a [ParseEvent],
  /// positions still to be consumed, in consumption order
  order: Box<dyn Iterator<Item = usize> + 'a>,
  peeked: Option<usize>,
}

impl<'a> Events<'a> {
  fn new(events: &'a [ParseEvent], direction: Direction) -> Self {
    let order: Box<dyn Iterator<Item = usize>> = match direction {
      Direction::BottomUp => Box::new((0..events.len()).rev()),
      Direction::TopDown => Box::new(0..events.len()),
    };
    let mut cursor = Self { events, order, peeked: None };
    cursor.peeked = cursor.order.next();
    cursor
  }

  fn peek(&self) -> Option<(usize, ParseEvent)> {
    self.peeked.map(|position| (position, self.events[position]))
  }

  fn advance(&mut self) {
    self.peeked = self.order.next();
  }
}

pub fn reconstruct(
  engine: &Engine,
  events: &[ParseEvent],
  direction: Direction,
) -> Result<Vec<(TokenId, Payload)>, ReconstructError> {
  let parser = engine.parser();

  let accept_at = events.iter()
    .position(|e| *e == ParseEvent::Accept)
    .ok_or(ReconstructError::MissingAccept)?;
  if accept_at + 1 < events.len() {
    return Err(ReconstructError::TrailingEvents(accept_at + 1));
  }

  let mut cursor = Events::new(&events[..accept_at], direction);
  let mut output = vec![];
  let mut stack = vec![Symbol::Nonterminal(parser.start_nt)];

  while let Some(symbol) = stack.pop() {
    match symbol {
      Symbol::Nonterminal(nt) => {
        let (position, event) = cursor.peek()
          .ok_or(ReconstructError::PrematureAccept(accept_at))?;
        let rule = match event {
          ParseEvent::Reduce(rule) => rule,
          ParseEvent::Shift { token, .. } => {
            return Err(ReconstructError::UnexpectedShift {
              position,
              token,
              expected: parser.nt_name(nt).to_owned(),
            });
          }
          ParseEvent::Accept => unreachable!("events are cut at the first accept"),
        };
        if rule as usize >= parser.num_rules() {
          return Err(ReconstructError::RuleOutOfRange { position, rule });
        }
        let prod = &parser.prods[rule as usize];
        if prod.nt != nt {
          return Err(ReconstructError::MismatchedReduce {
            position,
            rule: parser.rule_to_string(rule as usize),
            expected: parser.nt_name(nt).to_owned(),
          });
        }
        cursor.advance();

        // the symbol consumed next goes on top
        match direction {
          Direction::BottomUp => stack.extend(prod.symbols.iter().copied()),
          Direction::TopDown => stack.extend(prod.symbols.iter().rev().copied()),
        }
      }
      Symbol::Token(expected) => {
        let is_fixed = matches!(parser.terminal(expected), Some(Terminal::Fixed(_)));
        let next = cursor.peek();

        if let Some((position, ParseEvent::Shift { token, payload })) = next {
          if !engine.is_known_token(token) {
            return Err(ReconstructError::UnknownToken { position, token });
          }
          if token == expected {
            if !engine.payload_matches(token, payload) {
              return Err(ReconstructError::MalformedPayload { position, token });
            }
            cursor.advance();
            output.push((token, payload));
            continue;
          }
          if !is_fixed {
            return Err(ReconstructError::UnexpectedShift {
              position,
              token,
              expected: parser.token_name(expected).to_owned(),
            });
          }
        }

        if is_fixed {
          output.push((expected, Payload::None));
          continue;
        }

        return Err(match next {
          Some((position, _)) => ReconstructError::ExpectedShift {
            position,
            expected: parser.token_name(expected).to_owned(),
          },
          None => ReconstructError::PrematureAccept(accept_at),
        });
      }
    }
  }

  if let Some((position, _)) = cursor.peek() {
    return Err(ReconstructError::TrailingEvents(position));
  }

  if direction == Direction::BottomUp {
    output.reverse();
  }

  Ok(output)
}
