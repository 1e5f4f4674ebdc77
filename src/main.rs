use std::env;
use std::fs;
use std::io::{self, BufRead};
use std::process;
use getopts::Options;
use itertools::Itertools;
use tracing_subscriber::EnvFilter;
use thingtalk_sr::{
  compile, program_to_string, ActionCodec, ActionVectors, Catalog, CodecConfig,
  CompileOptions, Direction,
};

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
    .with_writer(io::stderr)
    .init();

  let args = env::args().collect::<Vec<_>>();
  let prog = args[0].clone();
  let mut opts = Options::new();
  opts.optflag("", "flatten", "Expand extensible and copy terminals into plain productions");
  opts.optflag("", "split-devices", "Spell functions as a device terminal followed by the function");
  opts.optopt("", "max-length", "Width of the action vectors", "N");
  opts.optopt("", "max-input-length",
    "Number of input positions a copied span may point at. Defaults to 60",
    "N");
  opts.optopt("", "direction",
    "Order of the actions. Defaults to bottomup.\n\
      Supported directions: bottomup, topdown, linear",
    "DIRECTION");
  opts.optflag("", "ignore-errors", "Reconstruct invalid action vectors as empty programs");
  opts.optflag("", "actions", "Print the action id space and exit");
  opts.optflag("h", "help", "Print this message");

  let matches = match opts.parse(&args[1..]) {
    Ok(m) => m,
    Err(err) => {
      eprintln!("{}", err);
      process::exit(1);
    }
  };

  if matches.opt_present("h") {
    print_usage(prog, opts);
    return;
  }

  let path = if matches.free.len() == 1 {
    matches.free[0].clone()
  } else {
    print_usage(prog, opts);
    process::exit(1);
  };

  let direction = match matches.opt_str("direction").as_deref() {
    None | Some("bottomup") => Direction::BottomUp,
    Some("topdown") => Direction::TopDown,
    Some("linear") => Direction::Linear,
    Some(other) => fail(format!("unsupported direction: {}", other)),
  };

  let config = CodecConfig {
    flatten: matches.opt_present("flatten"),
    max_length: matches.opt_str("max-length").map(|n| parse_number("max-length", &n)),
    max_input_length: matches.opt_str("max-input-length")
      .map(|n| parse_number("max-input-length", &n))
      .unwrap_or(CodecConfig::default().max_input_length),
    direction,
    ignore_errors: matches.opt_present("ignore-errors"),
  };
  let options = CompileOptions {
    split_devices: matches.opt_present("split-devices"),
    ..CompileOptions::default()
  };

  let text = fs::read_to_string(&path)
    .unwrap_or_else(|err| fail(format!("cannot read {}: {}", path, err)));
  let catalog = Catalog::from_lines(text.lines())
    .unwrap_or_else(|err| fail(format!("{}: {}", path, err)));
  let compiled = compile(&catalog, &options)
    .unwrap_or_else(|err| fail(err.to_string()));

  let codec = match ActionCodec::new(&compiled, config) {
    Ok(codec) => codec,
    Err(thingtalk_sr::CodecError::Build(err)) => fail(lr::report::report(&err)),
    Err(err) => fail(err.to_string()),
  };

  let stats = codec.engine().parser().stats();
  println!("states: {}", stats.states);
  println!("rules: {}", stats.rules);
  println!("terminals: {}", stats.terminals);

  if matches.opt_present("actions") {
    for (action, description) in codec.describe_actions() {
      println!("{} {}", action, description);
    }
    return;
  }

  for line in io::stdin().lock().lines() {
    let line = line.unwrap_or_else(|err| fail(err.to_string()));
    let (sentence, program) = match line.split_once('\t') {
      Some(pair) => pair,
      None => {
        eprintln!("skipping line without a tab: {}", line);
        continue;
      }
    };
    let sentence = sentence.split_whitespace().collect::<Vec<_>>();

    println!("{}", program);
    match codec.vectorize(&sentence, program) {
      Ok(vectors) => print_vectors(&codec, &sentence, &vectors),
      Err(err) => println!("  error: {}", err),
    }
  }
}

fn print_vectors(codec: &ActionCodec, sentence: &[&str], vectors: &ActionVectors) {
  let used = &vectors.actions[..vectors.length];
  println!("  actions: {}", used.iter().join(" "));
  println!("  prediction: {}", codec.prediction_to_string(used).join(" "));

  for (class, indices) in &vectors.extensible {
    println!("  {}: {}", class, indices[..vectors.length].iter().join(" "));
  }
  for (class, spans) in &vectors.copy {
    println!("  COPY_{}_begin: {}", class, spans.begin[..vectors.length].iter().join(" "));
    println!("  COPY_{}_end: {}", class, spans.end[..vectors.length].iter().join(" "));
  }

  if vectors.truncated {
    println!("  truncated");
  }

  match codec.reconstruct(Some(sentence), vectors) {
    Ok(program) => println!("  reconstructed: {}", program_to_string(&program)),
    Err(err) => println!("  reconstruction failed: {}", err),
  }
}

fn parse_number(name: &str, value: &str) -> usize {
  value.parse()
    .unwrap_or_else(|_| fail(format!("--{} expects a number, got {}", name, value)))
}

fn fail(message: String) -> ! {
  eprintln!("{}", message);
  process::exit(1);
}

fn print_usage(prog: String, opts: Options) {
  let brief = format!("Usage: {} [options] CATALOG\n\n\
    Reads `sentence<TAB>program` lines from standard input and prints their\n\
    action vectors.", prog);
  print!("{}", opts.usage(&brief));
}
