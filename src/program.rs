//! Surface form of programs: whitespace separated terminals, with copied
//! spans written between the delimiters of their class.

use std::fmt;
use itertools::Itertools;
use grammar::{Grammar, Map, Terminal, TokenId};
use lr::Parser;
use crate::codec::CodecError;

/// One word of a reconstructed program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramToken {
  Word(String),
  /// zero-based inclusive span of the sentence, when no sentence was given
  Span {
    class: String,
    begin: usize,
    end: usize,
  },
}

impl ProgramToken {
  fn as_word(&self) -> Option<&str> {
    match self {
      ProgramToken::Word(word) => Some(word),
      ProgramToken::Span { .. } => None,
    }
  }
}

impl fmt::Display for ProgramToken {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      ProgramToken::Word(word) => f.write_str(word),
      ProgramToken::Span { class, begin, end } => write!(f, "{}[{}..={}]", class, begin, end),
    }
  }
}

/// Joins program tokens with single spaces.
pub fn program_to_string(program: &[ProgramToken]) -> String {
  program.iter().join(" ")
}

/// What a program token carries besides its terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TermValue {
  None,
  /// vocabulary index of an extensible terminal
  Index(usize),
  /// words of a copied span, still to be located in the sentence
  Words(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramTerm {
  pub token: TokenId,
  pub value: TermValue,
}

/// Classifies program words against the token dictionary of a parser.
#[derive(Debug)]
pub struct ProgramTokenizer {
  fixed: Map<String, TokenId>,
  /// extensible value -> (class token, vocabulary index)
  values: Map<String, (TokenId, usize)>,
  /// open delimiter -> (class token, close delimiter)
  delimiters: Map<String, (TokenId, String)>,
  /// placeholder value of a copy class -> class token
  placeholders: Map<String, TokenId>,
  /// function terminal -> device terminal, in split mode
  function_devices: Map<String, String>,
}

impl ProgramTokenizer {
  /// `function_devices` maps function terminals to the device terminal that
  /// must precede them; it is empty unless devices are split.
  pub fn new(
    grammar: &Grammar,
    parser: &Parser,
    function_devices: Map<String, String>,
  ) -> Self {
    let mut tokenizer = Self {
      fixed: Map::new(),
      values: Map::new(),
      delimiters: Map::new(),
      placeholders: Map::new(),
      function_devices,
    };

    let mut tokens = parser.tokens.iter().collect::<Vec<_>>();
    tokens.sort_by_key(|&(&token, _)| token);

    for (&token, terminal) in tokens {
      match terminal {
        Terminal::Fixed(text) => {
          tokenizer.fixed.insert(text.clone(), token);
        }
        Terminal::Extensible(class) => {
          let values = grammar.extensible_terminals().get(class).into_iter().flatten();
          for (ix, value) in values.enumerate() {
            tokenizer.values.insert(value.clone(), (token, ix));
          }
        }
        Terminal::Copy(class) => {
          if let Some(decl) = grammar.copy_terminals().get(class) {
            tokenizer.delimiters.insert(decl.open.clone(), (token, decl.close.clone()));
            for value in &decl.values {
              tokenizer.placeholders.insert(value.clone(), token);
            }
          }
        }
      }
    }

    tokenizer
  }

  pub fn tokenize(&self, program: &str) -> Result<Vec<ProgramTerm>, CodecError> {
    let mut terms = vec![];
    let mut words = program.split_whitespace();

    while let Some(word) = words.next() {
      if let Some((token, close)) = self.delimiters.get(word) {
        let mut span = vec![];
        loop {
          match words.next() {
            Some(w) if w == close => break,
            Some(w) => span.push(w.to_owned()),
            None => return Err(CodecError::UnterminatedSpan(word.to_owned())),
          }
        }
        terms.push(ProgramTerm { token: *token, value: TermValue::Words(span) });
        continue;
      }

      if let Some(device) = self.function_devices.get(word) {
        let device_token = self.fixed.get(device)
          .copied()
          .ok_or_else(|| CodecError::UnknownToken(device.clone()))?;
        if terms.last().map(|t: &ProgramTerm| t.token) != Some(device_token) {
          terms.push(ProgramTerm { token: device_token, value: TermValue::None });
        }
      }

      let term = if let Some(&token) = self.fixed.get(word) {
        ProgramTerm { token, value: TermValue::None }
      } else if let Some(&(token, ix)) = self.values.get(word) {
        ProgramTerm { token, value: TermValue::Index(ix) }
      } else if let Some(&token) = self.placeholders.get(word) {
        ProgramTerm { token, value: TermValue::Words(vec![word.to_owned()]) }
      } else {
        return Err(CodecError::UnknownToken(word.to_owned()));
      };
      terms.push(term);
    }

    Ok(terms)
  }

  /// Drops the device terminals that `tokenize` puts in front of functions.
  pub fn detokenize(&self, program: Vec<ProgramToken>) -> Vec<ProgramToken> {
    let mut out: Vec<ProgramToken> = Vec::with_capacity(program.len());

    for token in program {
      let device = token.as_word().and_then(|word| self.function_devices.get(word));
      if let Some(device) = device {
        if out.last().and_then(ProgramToken::as_word) == Some(device.as_str()) {
          out.pop();
        }
      }
      out.push(token);
    }

    out
  }
}
