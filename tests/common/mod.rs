use thingtalk_sr::{compile, Catalog, CompileOptions, CompiledGrammar};

pub const BUILTIN: &str = "\
device builtin
units ms ms s min h
query @builtin.get_time out:time Time
action @builtin.say in:message String
";

pub fn builtin(options: &CompileOptions) -> CompiledGrammar {
  let catalog = Catalog::from_lines(BUILTIN.lines()).unwrap();
  compile(&catalog, options).unwrap()
}
