use grammar::TokenId;
use lr::{Direction, Engine, ParseEvent, Payload};

/// Parses `input`, a whitespace separated list of fixed terminals, and
/// renders the events the way a parser trace reads.
pub fn parse(engine: &Engine, input: &str, direction: Direction) -> Vec<String> {
  let parser = engine.parser();
  let tokens = input.split_whitespace()
    .map(|word| {
      let token = parser.token_id(&grammar::Terminal::Fixed(word.to_owned()))
        .unwrap_or(TokenId::new(u32::MAX));
      (token, Payload::None)
    })
    .collect::<Vec<_>>();

  match engine.parse(&tokens, direction) {
    Ok(events) => events.iter().map(|event| fmt_event(engine, event)).collect(),
    Err(err) => vec![format!("error: {}", err)],
  }
}

pub fn fmt_event(engine: &Engine, event: &ParseEvent) -> String {
  let parser = engine.parser();
  match *event {
    ParseEvent::Shift { token, .. } => format!("shift {}", parser.token_name(token)),
    ParseEvent::Reduce(rule) => format!("reduce {}", parser.rule_to_string(rule as usize)),
    ParseEvent::Accept => "accept".to_owned(),
  }
}
