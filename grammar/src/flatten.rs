use crate::{Grammar, GrammarBuilder, GrammarError, Item, Terminal};

/// Name of the nonterminal standing for a flattened terminal class.
pub fn terminal_nonterminal(class: &str) -> String {
  format!("$terminal_{}", class)
}

impl Grammar {
  /// Rewrites every extensible and copy terminal into a nonterminal with one
  /// production per declared value, leaving only fixed terminals.
  ///
  /// The result recognizes programs where open values are spelled out as
  /// their placeholder tokens (`NUMBER_0`, `QUOTED_STRING_1`, ...).
  pub fn flatten(&self) -> Result<Grammar, GrammarError> {
    let mut builder = GrammarBuilder::new(self.start.clone());

    for (lhs, prods) in &self.rules {
      for prod in prods {
        builder.rule(lhs.clone(), prod.iter().map(flatten_item).collect());
      }
    }

    let values = self.extensible.iter()
      .chain(self.copy.iter().map(|(class, decl)| (class, &decl.values)));
    for (class, values) in values {
      for value in values {
        builder.rule(
          terminal_nonterminal(class),
          vec![Item::Terminal(Terminal::Fixed(value.clone()))]);
      }
    }

    builder.build()
  }
}

fn flatten_item(item: &Item) -> Item {
  match item {
    Item::Terminal(Terminal::Extensible(class)) | Item::Terminal(Terminal::Copy(class)) => {
      Item::Nonterminal(terminal_nonterminal(class))
    }
    Item::Terminal(Terminal::Fixed(_)) | Item::Nonterminal(_) => item.clone(),
  }
}
