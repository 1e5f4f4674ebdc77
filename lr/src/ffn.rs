//! compute FIRST, FOLLOW, and NULLABLE sets.

use bit_set::BitSet;
use bitvec::prelude::*;
use grammar::{LoweredGrammar, NonterminalId, Symbol};
use crate::Map;

/// FOLLOW sets of the nonterminals, the only sets SLR reductions need.
#[derive(Default, Debug)]
pub struct Ffn {
  pub follow: Map<NonterminalId, BitSet>,
}

pub fn compute(grammar: &LoweredGrammar) -> Ffn {
  let nullable = compute_nullable(grammar);
  let first = compute_first(grammar, &nullable);

  Ffn {
    follow: compute_follow(grammar, &nullable, &first),
  }
}

fn compute_follow(
  grammar: &LoweredGrammar,
  nullable: &BitSet,
  first: &Map<NonterminalId, BitSet>,
) -> Map<NonterminalId, BitSet> {
  let mut follow = Map::<NonterminalId, BitSet>::new();

  loop {
    let mut changed = false;

    for prod in &grammar.prods {
      // FOLLOW contribution of the suffix after the current symbol
      let mut sym_follow = follow.get(&prod.nt).cloned().unwrap_or_default();
      for symbol in prod.symbols.iter().rev() {
        match symbol {
          Symbol::Token(token) => {
            sym_follow = BitSet::new();
            sym_follow.insert(token.index());
          }
          Symbol::Nonterminal(nt) => {
            let nt_follow = follow.entry(*nt).or_default();
            let old_len = nt_follow.len();
            nt_follow.union_with(&sym_follow);
            if nt_follow.len() != old_len {
              changed = true;
            }

            if nullable.contains(nt.index()) {
              sym_follow.union_with(&first[nt]);
            } else {
              sym_follow = first[nt].clone();
            }
          }
        }
      }
    }

    if !changed {
      break;
    }
  }

  follow
}

fn compute_first(
  grammar: &LoweredGrammar,
  nullable: &BitSet,
) -> Map<NonterminalId, BitSet> {
  let mut first = grammar.nts.left_values()
    .map(|&nt| (nt, BitSet::new()))
    .collect::<Map<_, _>>();

  loop {
    let mut changed = false;

    for prod in &grammar.prods {
      let mut prod_first = BitSet::new();
      for symbol in &prod.symbols {
        match symbol {
          Symbol::Token(token) => {
            prod_first.insert(token.index());
            break;
          }
          Symbol::Nonterminal(nt) => {
            prod_first.union_with(&first[nt]);
            if !nullable.contains(nt.index()) {
              break;
            }
          }
        }
      }

      let nt_first = &mut first[&prod.nt];
      let old_len = nt_first.len();
      nt_first.union_with(&prod_first);
      if nt_first.len() != old_len {
        changed = true;
      }
    }

    if !changed {
      break;
    }
  }

  first
}

fn compute_nullable(grammar: &LoweredGrammar) -> BitSet {
  let mut prods_nullable = bitvec![0; grammar.prods.len()];
  let mut prods_completed = bitvec![0; grammar.prods.len()];

  loop {
    let mut changed = false;

    'outer: for (i, prod) in grammar.prods.iter().enumerate() {
      if prods_completed[i] {
        continue;
      }

      let mut prod_nullable = true;
      for sym in &prod.symbols {
        match sym {
          Symbol::Token(_) => {
            prod_nullable = false;
            break;
          }
          Symbol::Nonterminal(nt) => {
            let nt_range = grammar.nt_prods[nt].clone();
            if prods_nullable[nt_range.clone()].any() {
              continue;
            }
            if prods_completed[nt_range].all() {
              prod_nullable = false;
              break;
            }
            continue 'outer;
          }
        }
      }

      prods_nullable.set(i, prod_nullable);
      prods_completed.set(i, true);
      changed = true;
    }

    if !changed {
      break;
    }
  }

  grammar.nt_prods.iter().filter_map(|(nt, range)| {
    if prods_nullable[range.clone()].any() {
      Some(nt.index())
    } else {
      None
    }
  }).collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use grammar::{GrammarBuilder, fixed, nt, TokenId};
  use pretty_assertions::assert_eq;

  fn names(grammar: &LoweredGrammar, set: &BitSet) -> Vec<String> {
    set.iter()
      .map(|t| grammar.token_name(TokenId::new(t as u32)).to_owned())
      .collect()
  }

  fn set_of(grammar: &LoweredGrammar, sets: &Map<NonterminalId, BitSet>, name: &str) -> Vec<String> {
    let nt = *grammar.nts.get_by_right(name).unwrap();
    names(grammar, &sets[&nt])
  }

  #[test]
  fn ffn_simple() {
    let mut builder = GrammarBuilder::new("Z");
    builder
      .rule("Z", vec![fixed("d")])
      .rule("Z", vec![nt("X"), nt("Y"), nt("Z")])
      .rule("Y", vec![])
      .rule("Y", vec![fixed("c")])
      .rule("X", vec![nt("Y")])
      .rule("X", vec![fixed("a")]);
    let lowered = crate::augment::augment(builder.build().unwrap().lower());
    let ffn = compute(&lowered);
    let nullable_set = compute_nullable(&lowered);
    let first = compute_first(&lowered, &nullable_set);

    let mut nullable = lowered.nts.iter()
      .filter(|(nt, _)| nullable_set.contains(nt.index()))
      .map(|(_, name)| name.as_str())
      .collect::<Vec<_>>();
    nullable.sort();
    assert_eq!(nullable, vec!["X", "Y"]);

    assert_eq!(set_of(&lowered, &first, "Z"), vec!["d", "c", "a"]);
    assert_eq!(set_of(&lowered, &first, "X"), vec!["c", "a"]);
    assert_eq!(set_of(&lowered, &ffn.follow, "Z"), vec!["</s>"]);
    assert_eq!(set_of(&lowered, &ffn.follow, "X"), vec!["d", "c", "a"]);
  }

  #[test]
  fn ffn_left_recursive() {
    let mut builder = GrammarBuilder::new("E");
    builder
      .rule("E", vec![nt("E"), fixed("+"), nt("T")])
      .rule("E", vec![nt("T")])
      .rule("T", vec![fixed("("), nt("E"), fixed(")")])
      .rule("T", vec![fixed("x")]);
    let lowered = crate::augment::augment(builder.build().unwrap().lower());
    let ffn = compute(&lowered);
    let nullable = compute_nullable(&lowered);

    assert!(nullable.is_empty());
    assert_eq!(set_of(&lowered, &compute_first(&lowered, &nullable), "E"), vec!["(", "x"]);
    assert_eq!(set_of(&lowered, &ffn.follow, "E"), vec!["</s>", "+", ")"]);
    assert_eq!(set_of(&lowered, &ffn.follow, "T"), vec!["</s>", "+", ")"]);
  }
}
