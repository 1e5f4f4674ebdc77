//! Fixed-width action vectors for programs, and back.
//!
//! Action ids are laid out as
//!
//! ```text
//! <pad> </s> <s> | reduce 0 .. reduce R-1 | copy class 0 .. | extensible class 0 ..
//! ```
//!
//! with copy and extensible classes sorted by name. Every copy class has a
//! begin and an end channel holding one-based inclusive span bounds, and
//! every extensible class has a channel holding vocabulary indices. Channels
//! are aligned with the actions and padded with the pad id.
//!
//! In the linear direction the action ids are the token ids of the program
//! terminals, and the same channels carry the payloads of copy and
//! extensible terminals.

use fnv::FnvHashMap;
use grammar::{GrammarError, Map, Terminal, TokenId, EOS, NUM_CONTROL_TOKENS, PAD, START};
use lr::{Engine, ParseError, ParseEvent, Payload, ReconstructError};
use thiserror::Error;
use crate::compile::CompiledGrammar;
use crate::program::{ProgramTerm, ProgramToken, ProgramTokenizer, TermValue};

pub const ACTIONS: &str = "actions";

pub const DEFAULT_MAX_INPUT_LENGTH: usize = 60;

/// Order of the actions in a vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
  /// every reduction after the actions of its children
  #[default]
  BottomUp,
  /// every reduction before the actions of its children
  TopDown,
  /// the program terminals themselves, reparsed when reconstructing
  Linear,
}

impl Direction {
  fn parse_order(self) -> Option<lr::Direction> {
    match self {
      Direction::BottomUp => Some(lr::Direction::BottomUp),
      Direction::TopDown => Some(lr::Direction::TopDown),
      Direction::Linear => None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecConfig {
  /// Build the parser from the flattened grammar.
  pub flatten: bool,
  /// Width of the action vectors. Vectors are exactly as long as needed if
  /// unset.
  pub max_length: Option<usize>,
  /// Size of the copy span channels.
  pub max_input_length: usize,
  pub direction: Direction,
  /// Reconstruct malformed action vectors as empty programs.
  pub ignore_errors: bool,
}

impl Default for CodecConfig {
  fn default() -> Self {
    Self {
      flatten: false,
      max_length: None,
      max_input_length: DEFAULT_MAX_INPUT_LENGTH,
      direction: Direction::BottomUp,
      ignore_errors: false,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CopySpans {
  pub begin: Vec<u32>,
  pub end: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionVectors {
  pub actions: Vec<u32>,
  /// extensible class -> vocabulary indices
  pub extensible: Map<String, Vec<u32>>,
  /// copy class -> span bounds
  pub copy: Map<String, CopySpans>,
  /// number of used slots, `</s>` included
  pub length: usize,
  pub truncated: bool,
}

#[derive(Debug, Error)]
pub enum CodecError {
  #[error("unknown program token `{0}`")]
  UnknownToken(String),
  #[error("span opened by `{0}` is never closed")]
  UnterminatedSpan(String),
  #[error(transparent)]
  Parse(#[from] ParseError),
  #[error(transparent)]
  Reconstruct(#[from] ReconstructError),
  #[error("invalid action {action} at position {position}")]
  InvalidAction {
    position: usize,
    action: u32,
  },
  #[error("channels of action {action} at position {position} hold no valid value")]
  MalformedPayload {
    position: usize,
    action: u32,
  },
  #[error("invalid prediction `{0}`")]
  InvalidPrediction(String),
  #[error("invalid codec configuration: {0}")]
  InvalidConfig(String),
  #[error(transparent)]
  Build(#[from] lr::Error),
  #[error(transparent)]
  Grammar(#[from] GrammarError),
}

impl CodecError {
  /// Errors caused by an action vector that the grammar cannot produce.
  pub fn is_structural(&self) -> bool {
    matches!(
      self,
      CodecError::Parse(_)
        | CodecError::Reconstruct(_)
        | CodecError::InvalidAction { .. }
        | CodecError::MalformedPayload { .. })
  }
}

/// Meaning of an action id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
  Pad,
  Eos,
  Start,
  Reduce(usize),
  /// copy class index
  Copy(usize),
  /// extensible class index
  Shift(usize),
  /// program terminal, in the linear direction
  Token(TokenId),
  /// past the last action
  Invalid,
}

#[derive(Debug)]
struct CopyChannel {
  class: String,
  token: TokenId,
  open: String,
  close: String,
}

#[derive(Debug)]
struct ExtensibleChannel {
  class: String,
  token: TokenId,
  values: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
enum Channel {
  Copy(usize),
  Extensible(usize),
}

/// Converts between programs and action vectors of one compiled grammar.
#[derive(Debug)]
pub struct ActionCodec {
  engine: Engine,
  tokenizer: ProgramTokenizer,
  config: CodecConfig,
  copy: Vec<CopyChannel>,
  extensible: Vec<ExtensibleChannel>,
  channels: FnvHashMap<TokenId, Channel>,
}

impl ActionCodec {
  pub fn new(compiled: &CompiledGrammar, config: CodecConfig) -> Result<Self, CodecError> {
    if config.max_length == Some(0) {
      return Err(CodecError::InvalidConfig("max_length must be positive".to_owned()));
    }
    if config.max_input_length < 2 {
      return Err(CodecError::InvalidConfig("max_input_length must be at least 2".to_owned()));
    }

    let flattened;
    let grammar = if config.flatten {
      flattened = compiled.grammar.flatten()?;
      &flattened
    } else {
      &compiled.grammar
    };

    let parser = lr::build(grammar)?;

    let function_devices = if compiled.split_devices {
      compiled.function_devices.iter()
        .map(|(function, device)| (function.clone(), compiled.device_token(device)))
        .collect()
    } else {
      Map::new()
    };
    let tokenizer = ProgramTokenizer::new(grammar, &parser, function_devices);

    let mut copy = vec![];
    let mut extensible = vec![];
    for (&token, terminal) in parser.tokens.iter() {
      match terminal {
        Terminal::Fixed(_) => {}
        Terminal::Copy(class) => {
          if let Some(decl) = grammar.copy_terminals().get(class) {
            copy.push(CopyChannel {
              class: class.clone(),
              token,
              open: decl.open.clone(),
              close: decl.close.clone(),
            });
          }
        }
        Terminal::Extensible(class) => {
          if let Some(values) = grammar.extensible_terminals().get(class) {
            extensible.push(ExtensibleChannel {
              class: class.clone(),
              token,
              values: values.clone(),
            });
          }
        }
      }
    }
    copy.sort_by(|a, b| a.class.cmp(&b.class));
    extensible.sort_by(|a, b| a.class.cmp(&b.class));

    let mut channels = FnvHashMap::default();
    for (k, channel) in copy.iter().enumerate() {
      channels.insert(channel.token, Channel::Copy(k));
    }
    for (k, channel) in extensible.iter().enumerate() {
      channels.insert(channel.token, Channel::Extensible(k));
    }

    let codec = Self {
      engine: Engine::new(parser),
      tokenizer,
      config,
      copy,
      extensible,
      channels,
    };
    tracing::debug!(
      actions = codec.num_actions(),
      copy = codec.copy.len(),
      extensible = codec.extensible.len(),
      "created action codec");

    Ok(codec)
  }

  pub fn engine(&self) -> &Engine {
    &self.engine
  }

  pub fn config(&self) -> &CodecConfig {
    &self.config
  }

  pub fn num_rules(&self) -> usize {
    self.engine.parser().num_rules()
  }

  fn is_linear(&self) -> bool {
    self.config.direction == Direction::Linear
  }

  /// Size of the action id space.
  pub fn num_actions(&self) -> usize {
    if self.is_linear() {
      self.engine.parser().num_tokens()
    } else {
      NUM_CONTROL_TOKENS + self.num_rules() + self.copy.len() + self.extensible.len()
    }
  }

  fn copy_base(&self) -> usize {
    NUM_CONTROL_TOKENS + self.num_rules()
  }

  fn extensible_base(&self) -> usize {
    self.copy_base() + self.copy.len()
  }

  pub fn action_kind(&self, action: u32) -> ActionKind {
    let action = action as usize;
    if action == PAD.index() {
      ActionKind::Pad
    } else if action == EOS.index() {
      ActionKind::Eos
    } else if action == START.index() {
      ActionKind::Start
    } else if self.is_linear() {
      if action < self.num_actions() {
        ActionKind::Token(TokenId::new(action as u32))
      } else {
        ActionKind::Invalid
      }
    } else if action < self.copy_base() {
      ActionKind::Reduce(action - NUM_CONTROL_TOKENS)
    } else if action < self.extensible_base() {
      ActionKind::Copy(action - self.copy_base())
    } else if action < self.num_actions() {
      ActionKind::Shift(action - self.extensible_base())
    } else {
      ActionKind::Invalid
    }
  }

  /// The side channel that carries the payload of `action`.
  fn channel(&self, action: u32) -> Option<Channel> {
    match self.action_kind(action) {
      ActionKind::Copy(k) => Some(Channel::Copy(k)),
      ActionKind::Shift(k) => Some(Channel::Extensible(k)),
      ActionKind::Token(token) => self.channels.get(&token).copied(),
      _ => None,
    }
  }

  /// Channel names with the number of distinct values of each.
  pub fn output_sizes(&self) -> Map<String, usize> {
    let mut sizes = Map::new();
    sizes.insert(ACTIONS.to_owned(), self.num_actions());
    for channel in &self.extensible {
      sizes.insert(channel.class.clone(), 1 + channel.values.len());
    }
    for channel in &self.copy {
      sizes.insert(format!("COPY_{}_begin", channel.class), self.config.max_input_length);
      sizes.insert(format!("COPY_{}_end", channel.class), self.config.max_input_length);
    }
    sizes
  }

  /// Locates `span` in `sentence`. Bounds are one-based and inclusive; spans
  /// that are empty, absent or past the input limit land on the last input
  /// position.
  fn find_span(&self, sentence: &[&str], span: &[String]) -> (usize, usize) {
    let last = self.config.max_input_length - 1;
    if span.is_empty() || span.len() > sentence.len() {
      return (last, last);
    }

    let found = sentence.windows(span.len())
      .position(|window| window.iter().zip(span).all(|(a, b)| *a == b));
    match found {
      Some(ix) if ix + span.len() < self.config.max_input_length => (ix + 1, ix + span.len()),
      _ => (last, last),
    }
  }

  fn payload(&self, sentence: &[&str], term: &ProgramTerm) -> Payload {
    match &term.value {
      TermValue::None => Payload::None,
      TermValue::Index(ix) => Payload::Index(*ix),
      TermValue::Words(words) => {
        let (begin, end) = self.find_span(sentence, words);
        Payload::Span(begin, end)
      }
    }
  }

  /// The action slot of a parse event. Shifts of fixed terminals take none.
  fn slot(&self, event: &ParseEvent) -> Option<(u32, Payload)> {
    match *event {
      ParseEvent::Reduce(rule) => Some((NUM_CONTROL_TOKENS as u32 + rule, Payload::None)),
      ParseEvent::Shift { token, payload } => match self.channels.get(&token)? {
        Channel::Copy(k) => Some(((self.copy_base() + k) as u32, payload)),
        Channel::Extensible(k) => Some(((self.extensible_base() + k) as u32, payload)),
      },
      ParseEvent::Accept => None,
    }
  }

  fn empty_vectors(&self, width: usize) -> ActionVectors {
    ActionVectors {
      actions: vec![PAD.id(); width],
      extensible: self.extensible.iter()
        .map(|c| (c.class.clone(), vec![PAD.id(); width]))
        .collect(),
      copy: self.copy.iter()
        .map(|c| (c.class.clone(), CopySpans {
          begin: vec![PAD.id(); width],
          end: vec![PAD.id(); width],
        }))
        .collect(),
      length: 0,
      truncated: false,
    }
  }

  /// Encodes `program` as action vectors. Copied spans are located in
  /// `sentence`.
  pub fn vectorize(&self, sentence: &[&str], program: &str) -> Result<ActionVectors, CodecError> {
    let terms = self.tokenizer.tokenize(program)?;
    let input = terms.iter()
      .map(|term| (term.token, self.payload(sentence, term)))
      .collect::<Vec<_>>();

    let mut slots = match self.config.direction.parse_order() {
      Some(order) => {
        let events = self.engine.parse(&input, order)?;
        events.iter().filter_map(|event| self.slot(event)).collect::<Vec<_>>()
      }
      None => {
        self.engine.parse(&input, lr::Direction::BottomUp)?;
        input.iter().map(|&(token, payload)| (token.id(), payload)).collect()
      }
    };
    slots.push((EOS.id(), Payload::None));

    let mut truncated = false;
    if let Some(max_length) = self.config.max_length {
      if slots.len() > max_length {
        tracing::warn!(program, needed = slots.len(), max_length, "truncated action sequence");
        slots.truncate(max_length - 1);
        slots.push((EOS.id(), Payload::None));
        truncated = true;
      }
    }

    let width = self.config.max_length.unwrap_or(slots.len());
    let mut vectors = self.empty_vectors(width);
    vectors.length = slots.len();
    vectors.truncated = truncated;

    for (i, &(action, payload)) in slots.iter().enumerate() {
      vectors.actions[i] = action;
      match (self.channel(action), payload) {
        (Some(Channel::Copy(k)), Payload::Span(begin, end)) => {
          if let Some(spans) = vectors.copy.get_mut(&self.copy[k].class) {
            spans.begin[i] = begin as u32;
            spans.end[i] = end as u32;
          }
        }
        (Some(Channel::Extensible(k)), Payload::Index(ix)) => {
          if let Some(indices) = vectors.extensible.get_mut(&self.extensible[k].class) {
            indices[i] = ix as u32;
          }
        }
        _ => {}
      }
    }

    Ok(vectors)
  }

  /// Reads the payload of a copy or extensible terminal at `position`.
  fn shifted(
    &self,
    vectors: &ActionVectors,
    position: usize,
    action: u32,
    channel: Channel,
  ) -> Result<(TokenId, Payload), CodecError> {
    let malformed = || CodecError::MalformedPayload { position, action };

    match channel {
      Channel::Copy(k) => {
        let channel = &self.copy[k];
        let (begin, end) = vectors.copy.get(&channel.class)
          .and_then(|spans| Some((*spans.begin.get(position)?, *spans.end.get(position)?)))
          .ok_or_else(malformed)?;
        if begin < 1 || end < begin {
          return Err(malformed());
        }
        Ok((channel.token, Payload::Span(begin as usize - 1, end as usize - 1)))
      }
      Channel::Extensible(k) => {
        let channel = &self.extensible[k];
        let ix = vectors.extensible.get(&channel.class)
          .and_then(|indices| indices.get(position))
          .ok_or_else(malformed)?;
        Ok((channel.token, Payload::Index(*ix as usize)))
      }
    }
  }

  /// Maps action vectors to parse events, up to the first accepting action.
  fn events(&self, vectors: &ActionVectors) -> Result<Vec<ParseEvent>, CodecError> {
    let mut events = vec![];

    for (position, &action) in vectors.actions.iter().enumerate() {
      let event = match self.action_kind(action) {
        ActionKind::Pad | ActionKind::Eos => ParseEvent::Accept,
        ActionKind::Start | ActionKind::Token(_) => {
          return Err(CodecError::InvalidAction { position, action });
        }
        ActionKind::Reduce(rule) => ParseEvent::Reduce(rule as u32),
        ActionKind::Invalid => ParseEvent::Reduce(action - NUM_CONTROL_TOKENS as u32),
        ActionKind::Copy(k) => {
          let (token, payload) = self.shifted(vectors, position, action, Channel::Copy(k))?;
          ParseEvent::Shift { token, payload }
        }
        ActionKind::Shift(k) => {
          let (token, payload) = self.shifted(vectors, position, action, Channel::Extensible(k))?;
          ParseEvent::Shift { token, payload }
        }
      };

      events.push(event);
      if event == ParseEvent::Accept {
        break;
      }
    }

    Ok(events)
  }

  /// Reads the terminals of a linear action vector, up to the first
  /// accepting action.
  fn linear_terms(&self, vectors: &ActionVectors) -> Result<Vec<(TokenId, Payload)>, CodecError> {
    let mut terms = vec![];

    for (position, &action) in vectors.actions.iter().enumerate() {
      let term = match self.action_kind(action) {
        ActionKind::Pad | ActionKind::Eos => break,
        ActionKind::Token(token) => match self.channels.get(&token) {
          Some(&channel) => self.shifted(vectors, position, action, channel)?,
          None => (token, Payload::None),
        },
        _ => return Err(CodecError::InvalidAction { position, action }),
      };
      terms.push(term);
    }

    Ok(terms)
  }

  /// Program terminals described by action vectors, checked against the
  /// grammar.
  fn terms(&self, vectors: &ActionVectors) -> Result<Vec<(TokenId, Payload)>, CodecError> {
    match self.config.direction.parse_order() {
      Some(order) => {
        let events = self.events(vectors)?;
        Ok(self.engine.reconstruct(&events, order)?)
      }
      None => {
        let terms = self.linear_terms(vectors)?;
        self.engine.parse(&terms, lr::Direction::BottomUp)?;
        Ok(terms)
      }
    }
  }

  /// Decodes action vectors into a program.
  ///
  /// Copied spans are cut out of `sentence` and written between the
  /// delimiters of their class; without a sentence they are returned as
  /// zero-based spans.
  pub fn reconstruct(
    &self,
    sentence: Option<&[&str]>,
    vectors: &ActionVectors,
  ) -> Result<Vec<ProgramToken>, CodecError> {
    match self.try_reconstruct(sentence, vectors) {
      Err(err) if self.config.ignore_errors && err.is_structural() => {
        tracing::debug!(%err, "ignoring action vector outside the grammar");
        Ok(vec![])
      }
      result => result,
    }
  }

  fn try_reconstruct(
    &self,
    sentence: Option<&[&str]>,
    vectors: &ActionVectors,
  ) -> Result<Vec<ProgramToken>, CodecError> {
    let terms = self.terms(vectors)?;
    let parser = self.engine.parser();

    let mut program = vec![];
    for (position, (token, payload)) in terms.into_iter().enumerate() {
      match (self.channels.get(&token), payload) {
        (Some(&Channel::Extensible(k)), Payload::Index(ix)) => {
          let channel = &self.extensible[k];
          let action = if self.is_linear() {
            token.id()
          } else {
            (self.extensible_base() + k) as u32
          };
          let value = channel.values.get(ix)
            .ok_or(CodecError::MalformedPayload { position, action })?;
          program.push(ProgramToken::Word(value.clone()));
        }
        (Some(&Channel::Copy(k)), Payload::Span(begin, end)) => {
          let channel = &self.copy[k];
          match sentence {
            Some(sentence) => {
              let lo = begin.min(sentence.len());
              let hi = end.saturating_add(1).min(sentence.len()).max(lo);
              program.push(ProgramToken::Word(channel.open.clone()));
              program.extend(sentence[lo..hi].iter().map(|w| ProgramToken::Word((*w).to_owned())));
              program.push(ProgramToken::Word(channel.close.clone()));
            }
            None => program.push(ProgramToken::Span {
              class: channel.class.clone(),
              begin,
              end,
            }),
          }
        }
        _ => program.push(ProgramToken::Word(parser.token_name(token).to_owned())),
      }
    }

    Ok(self.tokenizer.detokenize(program))
  }

  /// Checks that action vectors describe a derivation of the grammar.
  pub fn verify(&self, vectors: &ActionVectors) -> Result<(), CodecError> {
    self.terms(vectors).map(|_| ())
  }

  pub fn describe_action(&self, action: u32) -> String {
    match self.action_kind(action) {
      ActionKind::Pad => "pad".to_owned(),
      ActionKind::Eos => "accept".to_owned(),
      ActionKind::Start => "start".to_owned(),
      ActionKind::Reduce(rule) => format!("reduce {}", self.engine.parser().rule_to_string(rule)),
      ActionKind::Copy(k) => format!("copy {}", self.copy[k].class),
      ActionKind::Shift(k) => format!("shift {}", self.extensible[k].class),
      ActionKind::Token(token) => format!("token {}", self.engine.parser().token_name(token)),
      ActionKind::Invalid => "invalid".to_owned(),
    }
  }

  /// Every action id with its description.
  pub fn describe_actions(&self) -> Vec<(u32, String)> {
    (0..self.num_actions() as u32)
      .map(|action| (action, self.describe_action(action)))
      .collect()
  }

  /// Short spelling of actions: `A` accept, `G` start, `R<rule>`,
  /// `C<copy class>`, `S<extensible class>`, and `T<token>` in the linear
  /// direction.
  pub fn prediction_to_string(&self, actions: &[u32]) -> Vec<String> {
    actions.iter()
      .map(|&action| match self.action_kind(action) {
        ActionKind::Pad | ActionKind::Eos => "A".to_owned(),
        ActionKind::Start => "G".to_owned(),
        ActionKind::Reduce(rule) => format!("R{}", rule),
        ActionKind::Token(token) => format!("T{}", token.id()),
        ActionKind::Invalid if self.is_linear() => format!("T{}", action),
        ActionKind::Invalid => format!("R{}", action as usize - NUM_CONTROL_TOKENS),
        ActionKind::Copy(k) => format!("C{}", k),
        ActionKind::Shift(k) => format!("S{}", k),
      })
      .collect()
  }

  pub fn string_to_prediction<S: AsRef<str>>(&self, strings: &[S]) -> Result<Vec<u32>, CodecError> {
    strings.iter()
      .map(|s| {
        let s = s.as_ref();
        let invalid = || CodecError::InvalidPrediction(s.to_owned());
        let index = || s.get(1..)
          .and_then(|n| n.parse::<usize>().ok())
          .ok_or_else(invalid);

        let action = match s.chars().next() {
          Some('A') if s.len() == 1 => EOS.index(),
          Some('G') if s.len() == 1 => START.index(),
          Some('T') if self.is_linear() => index()?,
          _ if self.is_linear() => return Err(invalid()),
          Some('R') => NUM_CONTROL_TOKENS + index()?,
          Some('C') => {
            let k = index()?;
            if k >= self.copy.len() {
              return Err(invalid());
            }
            self.copy_base() + k
          }
          Some('S') => {
            let k = index()?;
            if k >= self.extensible.len() {
              return Err(invalid());
            }
            self.extensible_base() + k
          }
          _ => return Err(invalid()),
        };
        u32::try_from(action).map_err(|_| invalid())
      })
      .collect()
  }
}
