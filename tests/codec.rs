use grammar::{GrammarBuilder, CopyClass, Map, fixed, copy, nt};
use insta::assert_snapshot;
use thingtalk_sr::{
  program_to_string, ActionCodec, ActionKind, CodecConfig, CodecError, CompileOptions,
  CompiledGrammar, Direction,
};
use pretty_assertions::assert_eq;

mod common;

fn compiled(builder: GrammarBuilder) -> CompiledGrammar {
  CompiledGrammar {
    grammar: builder.build().unwrap(),
    function_devices: Map::new(),
    split_devices: false,
  }
}

/// (sentence, program)
const PROGRAMS: [(&str, &str); 9] = [
  ("", "now => @builtin.get_time => @builtin.say param:message:String = param:time:Time"),
  ("", "now => @builtin.get_time => notify"),
  ("", "now => ( @builtin.get_time ) filter param:time:Time >= TIME_0 => notify"),
  ("", "now => ( @builtin.get_time ) filter not param:time:Time == TIME_0 or param:time:Time in_range [ TIME_0 , TIME_1 ] => return"),
  ("say hello at five", "attimer time = TIME_1 => @builtin.say param:message:String = \" hello \""),
  ("", "timer base = now + NUMBER_0 unit:h , interval = NUMBER_1 unit:min => notify"),
  ("", "monitor ( @builtin.get_time ) => @builtin.say param:message:String = event"),
  ("", "bookkeeping special special:yes"),
  ("", "bookkeeping answer NUMBER_2 unit:s"),
];

fn words(sentence: &str) -> Vec<&str> {
  sentence.split_whitespace().collect()
}

#[test]
fn builtin_scenario() {
  let compiled = common::builtin(&CompileOptions::default());
  let codec = ActionCodec::new(&compiled, CodecConfig::default()).unwrap();

  let vectors = codec.vectorize(&[], PROGRAMS[0].1).unwrap();
  let used = &vectors.actions[..vectors.length];

  assert_eq!(used[used.len() - 1], 1);
  assert_eq!(codec.describe_action(used[used.len() - 2]), "reduce $input -> $rule");
  assert_eq!(
    codec.describe_action(used[used.len() - 3]),
    "reduce $rule -> now => $table => $action");
  assert!(codec.verify(&vectors).is_ok());
}

#[test]
fn round_trip() {
  for split_devices in [false, true] {
    let compiled = common::builtin(&CompileOptions { split_devices, ..CompileOptions::default() });

    for direction in [Direction::BottomUp, Direction::TopDown, Direction::Linear] {
      for flatten in [false, true] {
        let codec = ActionCodec::new(&compiled, CodecConfig {
          direction,
          flatten,
          ..CodecConfig::default()
        }).unwrap();

        for (sentence, program) in PROGRAMS {
          // copied spans need the copy class
          if flatten && program.contains('"') {
            continue;
          }

          let sentence = words(sentence);
          let vectors = codec.vectorize(&sentence, program).unwrap();
          let reconstructed = codec.reconstruct(Some(&sentence), &vectors).unwrap();
          assert_eq!(program_to_string(&reconstructed), program, "{:?} {:?}", direction, flatten);
        }
      }
    }
  }
}

#[test]
fn vectorize_is_deterministic() {
  let compiled = common::builtin(&CompileOptions::default());
  let a = ActionCodec::new(&compiled, CodecConfig::default()).unwrap();
  let b = ActionCodec::new(&compiled, CodecConfig::default()).unwrap();

  for (sentence, program) in PROGRAMS {
    let sentence = words(sentence);
    assert_eq!(a.vectorize(&sentence, program).unwrap(), b.vectorize(&sentence, program).unwrap());
  }
}

#[test]
fn action_id_partition() {
  let compiled = common::builtin(&CompileOptions::default());
  let codec = ActionCodec::new(&compiled, CodecConfig::default()).unwrap();
  let num_actions = codec.num_actions();

  let kinds = (0..num_actions as u32).map(|a| codec.action_kind(a)).collect::<Vec<_>>();
  assert_eq!(&kinds[..3], &[ActionKind::Pad, ActionKind::Eos, ActionKind::Start]);

  let rules = kinds.iter().filter(|k| matches!(k, ActionKind::Reduce(_))).count();
  let copies = kinds.iter().filter(|k| matches!(k, ActionKind::Copy(_))).count();
  let shifts = kinds.iter().filter(|k| matches!(k, ActionKind::Shift(_))).count();
  assert_eq!(rules, codec.num_rules());
  assert_eq!(3 + rules + copies + shifts, num_actions);
  assert_eq!(copies, 1);
  assert_eq!(codec.action_kind(num_actions as u32), ActionKind::Invalid);

  // reduces, then copies, then shifts
  let order = kinds[3..].iter()
    .map(|k| match k {
      ActionKind::Reduce(_) => 0,
      ActionKind::Copy(_) => 1,
      _ => 2,
    })
    .collect::<Vec<_>>();
  let mut sorted = order.clone();
  sorted.sort();
  assert_eq!(order, sorted);

  assert_eq!(codec.output_sizes()["actions"], num_actions);
  assert_eq!(codec.output_sizes()["COPY_QUOTED_STRING_begin"], 60);
  assert_eq!(codec.output_sizes()["NUMBER"], 9);
}

/// `$list -> $list x | x`
fn list() -> CompiledGrammar {
  let mut builder = GrammarBuilder::new("$list");
  builder
    .rule("$list", vec![nt("$list"), fixed("x")])
    .rule("$list", vec![fixed("x")]);
  compiled(builder)
}

#[test]
fn truncation() {
  let codec = ActionCodec::new(&list(), CodecConfig {
    max_length: Some(10),
    ..CodecConfig::default()
  }).unwrap();
  let program = vec!["x"; 11].join(" ");

  let vectors = codec.vectorize(&[], &program).unwrap();

  assert_eq!(vectors.actions.len(), 10);
  assert_eq!(vectors.length, 10);
  assert_eq!(vectors.actions[9], 1);
  assert!(vectors.truncated);
  assert_snapshot!(codec.prediction_to_string(&vectors.actions).join(" "), @"R1 R0 R0 R0 R0 R0 R0 R0 R0 A");

  let vectors = codec.vectorize(&[], "x x x").unwrap();
  assert_eq!(vectors.actions, vec![4, 3, 3, 1, 0, 0, 0, 0, 0, 0]);
  assert!(!vectors.truncated);
}

#[test]
fn top_down_order() {
  let codec = ActionCodec::new(&list(), CodecConfig {
    direction: Direction::TopDown,
    ..CodecConfig::default()
  }).unwrap();

  let vectors = codec.vectorize(&[], "x x x").unwrap();
  assert_snapshot!(codec.prediction_to_string(&vectors.actions).join(" "), @"R0 R0 R1 A");
  assert_eq!(program_to_string(&codec.reconstruct(None, &vectors).unwrap()), "x x x");
}

#[test]
fn copy_fallback() {
  let mut builder = GrammarBuilder::new("$s");
  builder
    .rule("$s", vec![fixed("say"), copy("QUOTED_STRING")])
    .copy("QUOTED_STRING", CopyClass {
      open: "\"".to_owned(),
      close: "\"".to_owned(),
      values: vec!["QUOTED_STRING_0".to_owned()],
    });
  let codec = ActionCodec::new(&compiled(builder), CodecConfig::default()).unwrap();

  let vectors = codec.vectorize(&["hello", "world"], "say \" foo bar \"").unwrap();
  let spans = &vectors.copy["QUOTED_STRING"];
  assert_eq!((spans.begin[0], spans.end[0]), (59, 59));

  let vectors = codec.vectorize(&["hello", "world"], "say \" world \"").unwrap();
  let spans = &vectors.copy["QUOTED_STRING"];
  assert_eq!((spans.begin[0], spans.end[0]), (2, 2));
}

#[test]
fn ignore_errors() {
  let mut builder = GrammarBuilder::new("$s");
  builder.rule("$s", vec![fixed("a")]);
  let compiled = compiled(builder);

  let strict = ActionCodec::new(&compiled, CodecConfig::default()).unwrap();
  let mut vectors = strict.vectorize(&[], "a").unwrap();
  assert_eq!(vectors.actions, vec![3, 1]);

  // one past the last rule
  vectors.actions[0] = 4;
  assert!(matches!(
    strict.reconstruct(None, &vectors),
    Err(CodecError::Reconstruct(lr::ReconstructError::RuleOutOfRange { position: 0, rule: 1 }))));

  let lenient = ActionCodec::new(&compiled, CodecConfig {
    ignore_errors: true,
    ..CodecConfig::default()
  }).unwrap();
  assert_eq!(lenient.reconstruct(None, &vectors).unwrap(), vec![]);
}

#[test]
fn vocabulary_errors_are_fatal() {
  let compiled = common::builtin(&CompileOptions::default());
  let codec = ActionCodec::new(&compiled, CodecConfig {
    ignore_errors: true,
    ..CodecConfig::default()
  }).unwrap();

  assert!(matches!(
    codec.vectorize(&[], "now => @builtin.sing => notify"),
    Err(CodecError::UnknownToken(token)) if token == "@builtin.sing"));
  assert!(matches!(
    codec.vectorize(&[], "now => notify notify"),
    Err(CodecError::Parse(_))));
}
