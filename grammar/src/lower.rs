use std::fmt::{self, Write};
use std::ops::Range;
use crate::{Grammar, Item, Terminal, BiMap, Map};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenId(u32);

impl TokenId {
  pub const fn new(id: u32) -> Self {
    Self(id)
  }

  pub fn id(self) -> u32 {
    self.0
  }

  pub fn index(self) -> usize {
    self.0 as usize
  }
}

impl fmt::Display for TokenId {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NonterminalId(u32);

impl NonterminalId {
  pub fn id(self) -> u32 {
    self.0
  }

  pub fn index(self) -> usize {
    self.0 as usize
  }
}

#[derive(Default)]
pub struct NonterminalIdGen(u32);

impl NonterminalIdGen {
  pub fn gen(&mut self) -> NonterminalId {
    let i = self.0;
    self.0 += 1;
    NonterminalId(i)
  }
}

impl From<u32> for NonterminalIdGen {
  /// Generator whose first id follows `max`.
  fn from(max: u32) -> Self {
    Self(max + 1)
  }
}

/// Padding id.
pub const PAD: TokenId = TokenId(0);
/// End of sequence. Doubles as the end-of-input lookahead of the parser.
pub const EOS: TokenId = TokenId(1);
/// Start of sequence.
pub const START: TokenId = TokenId(2);

pub const NUM_CONTROL_TOKENS: usize = 3;

pub const CONTROL_TOKEN_NAMES: [&str; NUM_CONTROL_TOKENS] = ["<pad>", "</s>", "<s>"];

/// A grammar whose symbols are dense ids.
///
/// Productions of one nonterminal are contiguous, and production indices
/// follow the declaration order of the source grammar. Token ids start after
/// the control tokens and are handed out in order of first use.
#[derive(Debug, Clone)]
pub struct LoweredGrammar {
  pub prods: Vec<Production>,
  pub start_nt: NonterminalId,
  pub nts: BiMap<NonterminalId, String>,
  pub nt_prods: Map<NonterminalId, Range<usize>>,
  pub tokens: BiMap<TokenId, Terminal>,
  /// vocabulary size of each extensible token
  pub vocab_sizes: Map<TokenId, usize>,
}

#[derive(Debug, Clone)]
pub struct Production {
  pub nt: NonterminalId,
  pub symbols: Vec<Symbol>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Symbol {
  Nonterminal(NonterminalId),
  Token(TokenId),
}

impl Grammar {
  pub fn lower(&self) -> LoweredGrammar {
    let mut nt_id_gen = NonterminalIdGen::default();
    let mut nts = BiMap::new();
    for name in self.rules.keys() {
      nts.insert(nt_id_gen.gen(), name.clone());
    }

    let mut tokens = BiMap::new();
    let mut prods = vec![];
    let mut nt_prods = Map::new();

    for (name, rules) in &self.rules {
      let nt = *nts.get_by_right(name).unwrap();
      let start = prods.len();

      for rule in rules {
        let symbols = rule.iter().map(|item| {
          match item {
            Item::Nonterminal(name) => Symbol::Nonterminal(*nts.get_by_right(name).unwrap()),
            Item::Terminal(terminal) => Symbol::Token(store_token(&mut tokens, terminal)),
          }
        }).collect();

        prods.push(Production {
          nt,
          symbols,
        });
      }

      nt_prods.insert(nt, start..prods.len());
    }

    // unreferenced classes still get an id, so that every declared class
    // owns an output channel
    for class in self.extensible.keys() {
      store_token(&mut tokens, &Terminal::Extensible(class.clone()));
    }
    for class in self.copy.keys() {
      store_token(&mut tokens, &Terminal::Copy(class.clone()));
    }

    let vocab_sizes = self.extensible.iter().map(|(class, values)| {
      let token = *tokens.get_by_right(&Terminal::Extensible(class.clone())).unwrap();
      (token, values.len())
    }).collect();

    LoweredGrammar {
      prods,
      start_nt: *nts.get_by_right(&self.start).unwrap(),
      nts,
      nt_prods,
      tokens,
      vocab_sizes,
    }
  }
}

fn store_token(tokens: &mut BiMap<TokenId, Terminal>, terminal: &Terminal) -> TokenId {
  if let Some(&token) = tokens.get_by_right(terminal) {
    token
  } else {
    let token = TokenId((NUM_CONTROL_TOKENS + tokens.len()) as u32);
    tokens.insert(token, terminal.clone());
    token
  }
}

impl LoweredGrammar {
  /// Number of token ids, control tokens included.
  pub fn num_tokens(&self) -> usize {
    NUM_CONTROL_TOKENS + self.tokens.len()
  }

  pub fn token_name(&self, token: TokenId) -> &str {
    if token.index() < NUM_CONTROL_TOKENS {
      CONTROL_TOKEN_NAMES[token.index()]
    } else {
      self.tokens.get_by_left(&token).map(|t| t.name()).unwrap_or("?")
    }
  }

  pub fn nt_name(&self, nt: NonterminalId) -> &str {
    self.nts.get_by_left(&nt).map(|s| s.as_str()).unwrap_or("?")
  }

  pub fn fmt_symbol(&self, symbol: Symbol, f: &mut impl Write) -> fmt::Result {
    match symbol {
      Symbol::Token(token) => f.write_str(self.token_name(token)),
      Symbol::Nonterminal(nt) => f.write_str(self.nt_name(nt)),
    }
  }

  /// `lhs -> sym sym ...`, with a dot before symbol `dot` if given.
  pub fn fmt_production(
    &self,
    prod_ix: usize,
    dot: Option<usize>,
    f: &mut impl Write,
  ) -> fmt::Result {
    let prod = &self.prods[prod_ix];
    write!(f, "{} ->", self.nt_name(prod.nt))?;

    for (i, &sym) in prod.symbols.iter().enumerate() {
      if dot == Some(i) {
        f.write_str(" .")?;
      }
      f.write_char(' ')?;
      self.fmt_symbol(sym, f)?;
    }

    if dot == Some(prod.symbols.len()) {
      f.write_str(" .")?;
    }

    Ok(())
  }

  pub fn production_to_string(&self, prod_ix: usize) -> String {
    self.item_to_string(prod_ix, None)
  }

  pub fn item_to_string(&self, prod_ix: usize, dot: Option<usize>) -> String {
    let mut buf = String::new();
    // writing to a String never fails
    let _ = self.fmt_production(prod_ix, dot, &mut buf);
    buf
  }
}
