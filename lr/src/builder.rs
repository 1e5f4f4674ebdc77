use std::collections::VecDeque;
use bit_set::BitSet;
use grammar::{Grammar, LoweredGrammar, Symbol, TokenId, EOS};
use crate::{
  BiMap, Map, Parser, Production, Error,
  ShiftReduceConflictError, ReduceReduceConflictError,
};
use crate::ffn::{self, Ffn};
use crate::augment;

/// Builds the SLR(1) automaton of `grammar`.
///
/// Conflicts are never resolved: any state with two actions on one terminal
/// makes the grammar unusable.
pub fn build(grammar: &Grammar) -> Result<Parser, Error> {
  let grammar = augment::augment(grammar.lower());
  let ffn = ffn::compute(&grammar);

  let mut builder = Builder::new(&grammar, ffn);

  let start_state = builder.build()?;

  let action = builder.build_action_table();
  let accept_prod = builder.accept_prod;
  let goto = builder.goto;

  let prods = grammar.prods.iter().map(|prod| {
    let symbols = prod.symbols.iter()
      .map(|sym| {
        match sym {
          Symbol::Token(tok) => crate::Symbol::Token(*tok),
          Symbol::Nonterminal(nt) => crate::Symbol::Nonterminal(nt.id()),
        }
      })
      .collect();

    Production {
      rhs_len: prod.symbols.len(),
      nt: prod.nt.id(),
      symbols,
    }
  }).collect::<Vec<_>>();

  let mut nts = grammar.nts.iter()
    .map(|(nt, name)| (nt.id(), name.clone()))
    .collect::<Vec<_>>();
  nts.sort();
  let nts = nts.into_iter().map(|(_, name)| name).collect();

  let start_nt = match prods[accept_prod].symbols[0] {
    crate::Symbol::Nonterminal(nt) => nt,
    crate::Symbol::Token(_) => unreachable!("augmented production starts with the start symbol"),
  };

  let parser = Parser {
    action,
    goto,
    prods,
    nts,
    tokens: grammar.tokens,
    vocab_sizes: grammar.vocab_sizes,
    start_nt,
    start_state,
    accept_prod,
  };

  let stats = parser.stats();
  tracing::info!(
    states = stats.states,
    rules = stats.rules,
    terminals = stats.terminals,
    "built SLR(1) automaton");

  Ok(parser)
}

struct Builder<'a> {
  grammar: &'a LoweredGrammar,
  ffn: Ffn,
  /// item set -> state, numbered in discovery order
  states: BiMap<BitSet, u32>,
  items: BiMap<(usize, usize), usize>,
  /// state -> token -> (shift state, reduce production)
  action: Vec<Map<u32, ActionEntry>>,
  goto: Vec<Vec<u32>>,
  goto_row_len: usize,
  accept_prod: usize,
}

#[derive(Default)]
struct ActionEntry {
  shift: Option<u32>,
  /// the accept production stands for accept
  reduce: Option<u32>,
}

impl<'a> Builder<'a> {
  fn new(grammar: &'a LoweredGrammar, ffn: Ffn) -> Self {
    Builder {
      grammar,
      ffn,
      states: BiMap::new(),
      items: BiMap::new(),
      action: vec![],
      goto: vec![],
      goto_row_len: grammar.nts.len(),
      accept_prod: grammar.nt_prods[&grammar.start_nt].start,
    }
  }

  fn build(&mut self) -> Result<u32, Error> {
    let start_state = self.start()?;
    self.check_conflicts()?;
    self.check_dead_states()?;
    Ok(start_state)
  }

  fn check_conflicts(&self) -> Result<(), Error> {
    for (state, tx) in self.action.iter().enumerate() {
      for (&token, entry) in tx {
        if let (Some(_), Some(reduce_prod)) = (entry.shift, entry.reduce) {
          return Err(Error::ShiftReduceConflict(ShiftReduceConflictError {
            state: state as u32,
            state_items: self.state_items(state as u32),
            shift: self.grammar.token_name(TokenId::new(token)).to_owned(),
            reduce: self.grammar.production_to_string(reduce_prod as usize),
          }));
        }
      }
    }

    Ok(())
  }

  fn check_dead_states(&self) -> Result<(), Error> {
    match self.action.iter().position(|tx| tx.is_empty()) {
      Some(state) => Err(Error::DeadState(state as u32)),
      None => Ok(()),
    }
  }

  fn build_action_table(&self) -> Vec<Vec<i32>> {
    let row_len = self.grammar.num_tokens();
    let mut action = vec![vec![0i32; row_len]; self.action.len()];

    for (state, tx) in self.action.iter().enumerate() {
      let row = &mut action[state];
      for (token, entry) in tx {
        if let Some(new_state) = entry.shift {
          row[*token as usize] = new_state as i32 + 1;
        } else if let Some(prod) = entry.reduce {
          row[*token as usize] = if prod as usize == self.accept_prod {
            i32::MIN
          } else {
            !(prod as i32)
          };
        }
      }
    }

    action
  }

  fn start(&mut self) -> Result<u32, Error> {
    let start_item = self.item(self.accept_prod, 0);
    let start_state_set = self.closure({
      let mut set = BitSet::new();
      set.insert(start_item);
      set
    });
    let start_state = self.state(&start_state_set);

    let mut queue = VecDeque::new();
    queue.push_back(start_state_set);

    while let Some(state) = queue.pop_front() {
      let from_state = self.state(&state) as usize;
      let mut to_states = Map::<Symbol, BitSet>::new();

      for item in state.iter() {
        let &(prod_ix, prod_dot) = self.item_of(item);
        let symbols = &self.grammar.prods[prod_ix].symbols;

        if prod_dot == 1 && prod_ix == self.accept_prod {
          self.accept(from_state)?;
          continue;
        }

        if prod_dot == symbols.len() {
          self.reduce(from_state, prod_ix)?;
          continue;
        }

        let sym = symbols[prod_dot];
        let new_item = self.item(prod_ix, prod_dot + 1);
        to_states.entry(sym).or_default().insert(new_item);
      }

      for (sym, to_state) in to_states {
        let to_state = self.closure(to_state);
        let is_new_state = !self.states.contains_left(&to_state);
        let to_state_ix = self.state(&to_state);

        match sym {
          Symbol::Token(token) => {
            let entry = self.action[from_state].entry(token.id()).or_default();
            debug_assert!(entry.shift.is_none());

            entry.shift = Some(to_state_ix);
          }
          Symbol::Nonterminal(nt) => {
            debug_assert!(self.goto[from_state][nt.index()] == 0);

            self.goto[from_state][nt.index()] = to_state_ix + 1;
          }
        }

        if is_new_state {
          queue.push_back(to_state);
        }
      }
    }

    Ok(start_state)
  }

  fn closure(&mut self, initial: BitSet) -> BitSet {
    let mut result = initial.clone();
    let mut last = initial;

    loop {
      let mut new = BitSet::new();
      for i in last.iter() {
        let &(prod_ix, prod_dot) = self.item_of(i);
        let symbols = &self.grammar.prods[prod_ix].symbols;
        if let Some(Symbol::Nonterminal(nt)) = symbols.get(prod_dot) {
          for prod_ix in self.grammar.nt_prods[nt].clone() {
            let item = self.item(prod_ix, 0);
            if !result.contains(item) {
              new.insert(item);
            }
          }
        }
      }

      if new.is_empty() {
        break;
      }

      result.union_with(&new);

      last = new;
    }

    result
  }

  fn item(&mut self, prod_ix: usize, prod_dot: usize) -> usize {
    if let Some(&item) = self.items.get_by_left(&(prod_ix, prod_dot)) {
      item
    } else {
      let len = self.items.len();
      self.items.insert((prod_ix, prod_dot), len);
      len
    }
  }

  fn item_of(&self, item: usize) -> &(usize, usize) {
    // item ids are only handed out by `item`
    self.items.get_by_right(&item).unwrap()
  }

  fn state(&mut self, set: &BitSet) -> u32 {
    if let Some(&state) = self.states.get_by_left(set) {
      state
    } else {
      let state = self.states.len() as u32;
      self.states.insert(set.clone(), state);

      self.action.push(Map::new());
      self.goto.push(vec![0; self.goto_row_len]);

      state
    }
  }

  fn reduce(&mut self, from_state: usize, prod_ix: usize) -> Result<(), Error> {
    let nt = self.grammar.prods[prod_ix].nt;
    let follow = match self.ffn.follow.get(&nt) {
      Some(follow) => follow.clone(),
      None => return Ok(()),
    };

    for token in follow.iter() {
      self.add_reduce(from_state, token as u32, prod_ix)?;
    }

    Ok(())
  }

  fn accept(&mut self, from_state: usize) -> Result<(), Error> {
    self.add_reduce(from_state, EOS.id(), self.accept_prod)
  }

  fn add_reduce(&mut self, from_state: usize, token: u32, prod_ix: usize) -> Result<(), Error> {
    let entry = self.action[from_state].entry(token).or_default();
    if let Some(other) = entry.reduce {
      let (reduce1, reduce2) = (other as usize, prod_ix);
      return Err(Error::ReduceReduceConflict(ReduceReduceConflictError {
        state: from_state as u32,
        state_items: self.state_items(from_state as u32),
        lookahead: self.grammar.token_name(TokenId::new(token)).to_owned(),
        reduce1: self.grammar.production_to_string(reduce1),
        reduce2: self.grammar.production_to_string(reduce2),
      }));
    }

    entry.reduce = Some(prod_ix as u32);
    Ok(())
  }

  fn state_items(&self, state: u32) -> Vec<String> {
    let set = match self.states.get_by_right(&state) {
      Some(set) => set,
      None => return vec![],
    };

    set.iter()
      .map(|item| {
        let &(prod_ix, prod_dot) = self.item_of(item);
        self.grammar.item_to_string(prod_ix, Some(prod_dot))
      })
      .collect()
  }
}

#[cfg(test)]
use std::fmt::{self, Write};

#[cfg(test)]
impl<'a> Builder<'a> {
  fn states(self) -> String {
    let mut buf = String::new();
    self.fmt_states(&mut buf).unwrap();
    buf
  }

  fn fmt_states(self, fmt: &mut impl Write) -> fmt::Result {
    let mut states = self.states.iter().collect::<Vec<_>>();
    states.sort_by_key(|(_, x)| **x);

    for (state_set, state) in states {
      writeln!(fmt, "State {}", state)?;

      for item in state_set.iter() {
        let &(prod_ix, prod_dot) = self.item_of(item);
        writeln!(fmt, "  {}", self.grammar.item_to_string(prod_ix, Some(prod_dot)))?;
      }

      let mut actions = self.action[*state as usize].iter().collect::<Vec<_>>();
      actions.sort_by_key(|(token, _)| **token);
      for (&token, entry) in actions {
        let name = self.grammar.token_name(TokenId::new(token));
        if let Some(shift) = entry.shift {
          writeln!(fmt, "  {} => shift {}", name, shift)?;
        } else if let Some(prod) = entry.reduce {
          if prod as usize == self.accept_prod {
            writeln!(fmt, "  {} => accept", name)?;
          } else {
            writeln!(fmt, "  {} => reduce {}", name, prod)?;
          }
        }
      }
    }

    Ok(())
  }
}
