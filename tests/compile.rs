use std::collections::HashSet;
use lr::Action;
use thingtalk_sr::{compile, ActionCodec, Catalog, CodecConfig, CompileOptions};
use pretty_assertions::assert_eq;

mod common;

const CATALOG: &str = "\
units ms ms s min h
units C C F
entity com.spotify:song text
enum on off
query @thermostat.get_temperature out:value Measure(C) out:mode Enum(heat,cool,off)
query @com.spotify.get_song out:song Entity(com.spotify:song) out:popular Boolean out:tags Array(Hashtag)
query @builtin.get_date out:date Date
action @thermostat.set_target in:value Measure(C) in:mode Enum(heat,cool,off)
action @com.spotify.play in:song Entity(com.spotify:song) in:repeat Boolean
action @builtin.say in:message String
action @builtin.open_url in:url URL
";

fn catalog() -> Catalog {
  Catalog::from_lines(CATALOG.lines()).unwrap()
}

#[test]
fn catalog_grammar_is_slr() {
  for split_devices in [false, true] {
    let options = CompileOptions { split_devices, ..CompileOptions::default() };
    let compiled = compile(&catalog(), &options).unwrap();
    let parser = lr::build(&compiled.grammar).unwrap();
    assert!(parser.stats().states > 0);
  }
}

#[test]
fn flattened_catalog_grammar_is_slr() {
  let compiled = compile(&catalog(), &CompileOptions::default()).unwrap();
  let flattened = compiled.grammar.flatten().unwrap();

  assert!(flattened.extensible_terminals().is_empty());
  assert!(flattened.copy_terminals().is_empty());
  lr::build(&flattened).unwrap();
}

#[test]
fn compilation_is_deterministic() {
  let a = compile(&catalog(), &CompileOptions::default()).unwrap();
  let b = compile(&catalog(), &CompileOptions::default()).unwrap();
  assert_eq!(format!("{:?}", a.grammar.rules()), format!("{:?}", b.grammar.rules()));

  let a = ActionCodec::new(&a, CodecConfig::default()).unwrap();
  let b = ActionCodec::new(&b, CodecConfig::default()).unwrap();
  assert_eq!(a.describe_actions(), b.describe_actions());
  assert_eq!(a.output_sizes(), b.output_sizes());
}

/// Every rule is reduced in some state.
#[test]
fn every_rule_is_reachable() {
  let compiled = compile(&catalog(), &CompileOptions::default()).unwrap();
  let parser = lr::build(&compiled.grammar).unwrap();

  let mut reduced = HashSet::new();
  for state in 0..parser.num_states() as u32 {
    for token in 0..parser.num_tokens() as u32 {
      if let Action::Reduce(rule) = parser.action(state, grammar::TokenId::new(token)) {
        reduced.insert(rule);
      }
    }
  }

  let missing = (0..parser.num_rules())
    .filter(|rule| !reduced.contains(rule))
    .map(|rule| parser.rule_to_string(rule))
    .collect::<Vec<_>>();
  assert_eq!(missing, Vec::<String>::new());
}

#[test]
fn builtin_scenario_grammar() {
  let compiled = common::builtin(&CompileOptions::default());
  let g = &compiled.grammar;

  assert_eq!(g.start(), "$input");
  assert!(g.contains("$input", &[grammar::nt("$rule")]));
  assert!(g.contains("$stream", &[
    grammar::fixed("timer"), grammar::fixed("base"), grammar::fixed("="), grammar::nt("$constant_Date"),
    grammar::fixed(","), grammar::fixed("interval"), grammar::fixed("="), grammar::nt("$constant_Measure(ms)"),
  ]));
  assert!(g.contains("$param_passing", &[
    grammar::fixed("param:message:String"), grammar::fixed("="), grammar::fixed("event"),
  ]));
  assert!(g.contains("$out_param_Any", &[grammar::nt("$out_param_Time")]));
}

#[test]
fn every_parameter_is_readable() {
  let catalog = Catalog::from_lines("\
query @weather.current in:location Location out:where Location
action @builtin.say in:message String
".lines()).unwrap();
  let compiled = compile(&catalog, &CompileOptions::default()).unwrap();
  let g = &compiled.grammar;

  assert!(g.contains("$out_param_Location", &[grammar::fixed("param:location:Location")]));
  assert!(g.contains("$out_param_Location", &[grammar::fixed("param:where:Location")]));
  assert!(g.contains("$out_param_String", &[grammar::fixed("param:message:String")]));
  assert!(g.contains("$atom_filter", &[
    grammar::nt("$out_param_Location"), grammar::fixed("=="), grammar::nt("$constant_Location"),
  ]));
  assert!(g.contains("$const_param", &[
    grammar::fixed("param:location:Location"), grammar::fixed("="), grammar::nt("$constant_Location"),
  ]));
  lr::build(g).unwrap();
}
