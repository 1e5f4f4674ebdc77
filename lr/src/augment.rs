use grammar::{LoweredGrammar, NonterminalIdGen, Production, Symbol, EOS};

pub const ACCEPT_NT_NAME: &str = "$accept";

/// Add `$accept -> S </s>` to grammar, as the last production.
pub fn augment(grammar: LoweredGrammar) -> LoweredGrammar {
  let max_nt_id = grammar.nts
    .left_values()
    .map(|x| x.id())
    .max()
    .unwrap_or(0);
  let mut nt_id_gen = NonterminalIdGen::from(max_nt_id);
  let accept_nt = nt_id_gen.gen();

  let mut prods = grammar.prods;
  let mut nt_prods = grammar.nt_prods;
  let mut nts = grammar.nts;

  let start = prods.len();
  prods.push(Production {
    nt: accept_nt,
    symbols: vec![
      Symbol::Nonterminal(grammar.start_nt),
      Symbol::Token(EOS),
    ],
  });
  nt_prods.insert(accept_nt, start..prods.len());
  nts.insert(accept_nt, ACCEPT_NT_NAME.to_owned());

  LoweredGrammar {
    prods,
    start_nt: accept_nt,
    nts,
    nt_prods,
    ..grammar
  }
}
