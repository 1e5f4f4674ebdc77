//! Compiles a [`Catalog`] into the grammar of the command language.

use grammar::{
  CopyClass, Grammar, GrammarBuilder, GrammarError, Item, Map, Set,
  fixed, ext, copy, nt,
};
use thiserror::Error;
use crate::catalog::{Catalog, FunctionDecl, FunctionKind, ParamDirection};
use crate::types::Type;

/// Default number of numbered placeholder values per extensible class.
pub const MAX_ARG_VALUES: usize = 8;

pub const START: &str = "$input";

pub const QUOTED_STRING: &str = "QUOTED_STRING";

const SPECIALS: [&str; 4] = ["yes", "no", "nevermind", "failed"];

const DATE_EDGE_UNITS: [&str; 5] = ["h", "day", "week", "mon", "year"];

const LOCATIONS: [&str; 3] = ["current_location", "home", "work"];

/// Entity kinds that are always available, with their placeholder classes.
const WELL_KNOWN_ENTITIES: [(&str, &str); 7] = [
  ("tt:username", "USERNAME"),
  ("tt:hashtag", "HASHTAG"),
  ("tt:url", "URL"),
  ("tt:phone_number", "PHONE_NUMBER"),
  ("tt:email_address", "EMAIL_ADDRESS"),
  ("tt:picture", "PICTURE"),
  ("tt:path_name", "PATH_NAME"),
];

const DEVICE_ENTITY: &str = "tt:device";

/// The measurement family whose values are durations.
const DURATION_FAMILY: &str = "ms";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
  /// Spell every function as a device terminal followed by the function
  /// terminal.
  pub split_devices: bool,
  /// Vocabulary size of every placeholder class.
  pub max_arg_values: usize,
}

impl Default for CompileOptions {
  fn default() -> Self {
    Self {
      split_devices: false,
      max_arg_values: MAX_ARG_VALUES,
    }
  }
}

#[derive(Debug, Clone)]
pub struct CompiledGrammar {
  pub grammar: Grammar,
  /// function terminal -> device id
  pub function_devices: Map<String, String>,
  pub split_devices: bool,
}

impl CompiledGrammar {
  /// Terminal spelling a device id.
  pub fn device_token(&self, device: &str) -> String {
    device_token(self.split_devices, device)
  }
}

fn device_token(split_devices: bool, device: &str) -> String {
  if split_devices {
    format!("@@{}", device)
  } else {
    format!("device:{}", device)
  }
}

#[derive(Debug, Error)]
pub enum SchemaError {
  #[error("parameter `{param}` of `{function}` has unknown type `{ty}`")]
  UnknownType {
    function: String,
    param: String,
    ty: String,
  },
  #[error("measurement family `{0}` has no units")]
  MissingUnits(String),
  #[error("unit `{unit}` belongs to both `{first}` and `{second}`")]
  DuplicateUnit {
    unit: String,
    first: String,
    second: String,
  },
  #[error(transparent)]
  Grammar(#[from] GrammarError),
}

/// A parameter as the grammar sees it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParamKey {
  pub name: String,
  pub ty: Type,
  pub direction: ParamDirection,
}

impl ParamKey {
  /// `param:<name>:<type>`
  pub fn token(&self) -> String {
    format!("param:{}:{}", self.name, self.ty)
  }
}

pub fn compile(catalog: &Catalog, options: &CompileOptions) -> Result<CompiledGrammar, SchemaError> {
  SchemaCompiler::new(catalog, options)?.compile()
}

/// Grammar construction state for one catalog.
pub struct SchemaCompiler<'a> {
  catalog: &'a Catalog,
  options: &'a CompileOptions,
  builder: GrammarBuilder,
  functions: Vec<(&'a FunctionDecl, Vec<ParamKey>)>,
  /// entity kind -> whether it may be spelled as a quoted string
  entities: Map<String, bool>,
  /// types whose constant nonterminal has been emitted
  constants: Set<Type>,
  /// types of output parameters
  out_types: Set<Type>,
  placeholders: Set<String>,
  uses_quoted_string: bool,
}

impl<'a> SchemaCompiler<'a> {
  pub fn new(catalog: &'a Catalog, options: &'a CompileOptions) -> Result<Self, SchemaError> {
    let mut unit_families = Map::<&str, &str>::new();
    for (family, units) in &catalog.units {
      if units.is_empty() {
        return Err(SchemaError::MissingUnits(family.clone()));
      }
      for unit in units {
        if let Some(first) = unit_families.insert(unit, family) {
          return Err(SchemaError::DuplicateUnit {
            unit: unit.clone(),
            first: first.to_owned(),
            second: family.clone(),
          });
        }
      }
    }

    let mut entities = Map::new();
    for &(kind, _) in &WELL_KNOWN_ENTITIES {
      entities.insert(kind.to_owned(), false);
    }
    for decl in &catalog.entities {
      entities.insert(decl.kind.clone(), decl.has_ner);
    }

    let mut compiler = Self {
      catalog,
      options,
      builder: GrammarBuilder::new(START),
      functions: vec![],
      entities,
      constants: Set::new(),
      out_types: Set::new(),
      placeholders: Set::new(),
      uses_quoted_string: false,
    };

    for function in &catalog.functions {
      let params = function.params.iter()
        .map(|param| {
          let ty = param.ty.parse::<Type>()
            .ok()
            .filter(|ty| compiler.is_known(ty))
            .ok_or_else(|| SchemaError::UnknownType {
              function: function.token(),
              param: param.name.clone(),
              ty: param.ty.clone(),
            })?;
          if let Type::Measure(family) = ty.element() {
            if !catalog.units.contains_key(family) {
              return Err(SchemaError::MissingUnits(family.clone()));
            }
          }

          Ok(ParamKey {
            name: param.name.clone(),
            ty,
            direction: param.direction,
          })
        })
        .collect::<Result<Vec<_>, _>>()?;
      compiler.functions.push((function, params));
    }

    Ok(compiler)
  }

  fn is_known(&self, ty: &Type) -> bool {
    match ty.element() {
      Type::Entity(kind) => kind == DEVICE_ENTITY || self.entities.contains_key(kind),
      _ => true,
    }
  }

  pub fn compile(mut self) -> Result<CompiledGrammar, SchemaError> {
    self.program();
    let function_devices = self.functions();
    self.params();
    self.filters();
    self.answers();
    self.declare_classes();

    let grammar = self.builder.build()?;
    tracing::info!(
      nonterminals = grammar.rules().len(),
      productions = grammar.num_productions(),
      "compiled catalog grammar");

    Ok(CompiledGrammar {
      grammar,
      function_devices,
      split_devices: self.options.split_devices,
    })
  }

  fn has_kind(&self, kind: FunctionKind) -> bool {
    self.functions.iter().any(|(f, _)| f.kind == kind)
  }

  fn has_durations(&self) -> bool {
    self.catalog.units.contains_key(DURATION_FAMILY)
  }

  fn program(&mut self) {
    let b = &mut self.builder;
    b.rule(START, vec![nt("$rule")])
      .rule(START, vec![fixed("bookkeeping"), fixed("special"), nt("$special")])
      .rule(START, vec![fixed("bookkeeping"), fixed("answer"), nt("$constant_Any")]);
    for special in &SPECIALS {
      b.rule("$special", vec![fixed(format!("special:{}", special))]);
    }

    b.rule("$rule", vec![nt("$stream"), fixed("=>"), nt("$action")])
      .rule("$rule", vec![fixed("now"), fixed("=>"), nt("$action")])
      .rule("$action", vec![fixed("notify")])
      .rule("$action", vec![fixed("return")]);

    let has_queries = self.has_kind(FunctionKind::Query);
    let has_actions = self.has_kind(FunctionKind::Action);

    if has_queries {
      self.builder
        .rule("$rule", vec![fixed("now"), fixed("=>"), nt("$table"), fixed("=>"), nt("$action")])
        .rule("$table", vec![nt("$get_query")])
        .rule("$get_query", vec![nt("$query_function")])
        .rule("$stream", vec![fixed("monitor"), fixed("("), nt("$table"), fixed(")")]);
    }
    if has_actions {
      self.builder
        .rule("$action", vec![nt("$call")])
        .rule("$call", vec![nt("$action_function")]);
    }

    let time = self.constant(&Type::Time);
    self.builder.rule("$stream", vec![
      fixed("attimer"), fixed("time"), fixed("="), nt(time),
    ]);

    if self.has_durations() {
      let date = self.constant(&Type::Date);
      let duration = self.constant(&Type::Measure(DURATION_FAMILY.to_owned()));
      self.builder.rule("$stream", vec![
        fixed("timer"), fixed("base"), fixed("="), nt(date),
        fixed(","), fixed("interval"), fixed("="), nt(duration),
      ]);
    }
  }

  /// Function terminals. Returns the device of every function terminal.
  fn functions(&mut self) -> Map<String, String> {
    let mut function_devices = Map::new();

    for &(function, _) in &self.functions {
      let token = function.token();
      let (lhs, group) = match function.kind {
        FunctionKind::Query => ("$query_function", "queries"),
        FunctionKind::Action => ("$action_function", "actions"),
      };

      if self.options.split_devices {
        let group = format!("${}_{}", group, function.device);
        self.builder
          .rule(lhs, vec![fixed(device_token(true, &function.device)), nt(group.clone())])
          .rule(group, vec![fixed(token.clone())]);
      } else {
        self.builder.rule(lhs, vec![fixed(token.clone())]);
      }

      function_devices.insert(token, function.device.clone());
    }

    function_devices
  }

  fn params(&mut self) {
    let params = self.functions.iter()
      .flat_map(|(_, params)| params.iter().cloned())
      .collect::<Set<_>>();

    // every parameter can be read, whatever its direction
    for param in &params {
      self.builder.rule(out_param(&param.ty), vec![fixed(param.token())]);
      if self.out_types.insert(param.ty.clone()) {
        self.builder.rule("$out_param_Any", vec![nt(out_param(&param.ty))]);
      }
    }

    for param in params.iter().filter(|p| p.direction == ParamDirection::In) {
      let token = fixed(param.token());
      let eq = fixed("=");

      for value in self.assigned_values(&param.ty) {
        let mut rhs = vec![token.clone(), eq.clone()];
        rhs.extend(value);
        self.builder.rule("$const_param", rhs);
      }

      if param.ty == Type::String {
        self.builder.rule("$param_passing", vec![token.clone(), eq.clone(), fixed("event")]);
        if !self.out_types.is_empty() {
          self.builder.rule("$param_passing", vec![token, eq, nt("$out_param_Any")]);
        }
      } else if self.out_types.contains(&param.ty) {
        self.builder.rule("$param_passing", vec![token, eq, nt(out_param(&param.ty))]);
      }
    }

    if self.builder.has_rules("$const_param") {
      if self.has_kind(FunctionKind::Query) {
        self.builder.rule("$get_query", vec![nt("$get_query"), nt("$const_param")]);
      }
      if self.has_kind(FunctionKind::Action) {
        self.builder.rule("$call", vec![nt("$call"), nt("$const_param")]);
      }
    }
    if self.builder.has_rules("$param_passing") && self.has_kind(FunctionKind::Action) {
      self.builder.rule("$call", vec![nt("$call"), nt("$param_passing")]);
    }
  }

  /// Right-hand sides of the value assigned to an input parameter.
  fn assigned_values(&mut self, ty: &Type) -> Vec<Vec<Item>> {
    match ty {
      Type::Array(_) => {
        let list = self.constant(ty);
        vec![vec![fixed("["), nt(list), fixed("]")]]
      }
      _ => self.values(ty),
    }
  }

  /// Right-hand sides standing for one value of `ty`. Enum members and
  /// booleans are spelled out as literals.
  fn values(&mut self, ty: &Type) -> Vec<Vec<Item>> {
    match ty {
      Type::Enum(members) => members.iter()
        .map(|m| vec![fixed(format!("enum:{}", m))])
        .collect(),
      Type::Boolean => vec![vec![fixed("true")], vec![fixed("false")]],
      _ => vec![vec![nt(self.constant(ty))]],
    }
  }

  fn filters(&mut self) {
    let out_types = self.out_types.iter().cloned().collect::<Vec<_>>();

    for ty in &out_types {
      let lhs = nt(out_param(ty));

      if let Type::Array(elem) = ty {
        for value in self.values(elem) {
          let mut rhs = vec![lhs.clone(), fixed("contains")];
          rhs.extend(value);
          self.builder.rule("$atom_filter", rhs);
        }
        continue;
      }

      for op in ty.operators() {
        for value in self.values(ty) {
          let mut rhs = vec![lhs.clone(), fixed(*op)];
          rhs.extend(value);
          self.builder.rule("$atom_filter", rhs);
        }
      }

      if ty.is_ordered() {
        let constant = self.constant(ty);
        self.builder.rule("$atom_filter", vec![
          lhs.clone(), fixed("in_range"), fixed("["),
          nt(constant.clone()), fixed(","), nt(constant), fixed("]"),
        ]);
      }

      if ty.has_membership() {
        let list = self.constant(&Type::Array(Box::new(ty.clone())));
        self.builder.rule("$atom_filter", vec![
          lhs, fixed("in_array"), fixed("["), nt(list), fixed("]"),
        ]);
      }
    }

    if !self.builder.has_rules("$atom_filter") {
      return;
    }

    self.builder
      .rule("$filter", vec![nt("$or_filter")])
      .rule("$filter", vec![nt("$filter"), fixed("and"), nt("$or_filter")])
      .rule("$or_filter", vec![nt("$atom_filter")])
      .rule("$or_filter", vec![fixed("not"), nt("$atom_filter")])
      .rule("$or_filter", vec![nt("$or_filter"), fixed("or"), nt("$atom_filter")])
      .rule("$or_filter", vec![nt("$or_filter"), fixed("or"), fixed("not"), nt("$atom_filter")])
      .rule("$stream", vec![
        fixed("edge"), fixed("("), nt("$stream"), fixed(")"), fixed("on"), nt("$filter"),
      ]);

    if self.has_kind(FunctionKind::Query) {
      self.builder.rule("$table", vec![
        fixed("("), nt("$table"), fixed(")"), fixed("filter"), nt("$filter"),
      ]);
    }
  }

  /// `$constant_Any`, the answer to a slot-filling question.
  fn answers(&mut self) {
    let mut types = vec![
      Type::String,
      Type::Number,
      Type::Boolean,
      Type::Date,
      Type::Time,
      Type::Currency,
      Type::Location,
    ];
    types.extend(self.entity_kinds().into_iter().map(Type::Entity));
    types.extend(self.catalog.units.keys().map(|f| Type::Measure(f.clone())));

    for ty in &types {
      let constant = self.constant(ty);
      self.builder.rule("$constant_Any", vec![nt(constant)]);
    }

    let mut members = Set::new();
    members.extend(self.catalog.enums.iter().flatten().cloned());
    for (_, params) in &self.functions {
      for param in params {
        if let Type::Enum(m) = param.ty.element() {
          members.extend(m.iter().cloned());
        }
      }
    }
    for member in members {
      self.builder.rule("$constant_Any", vec![fixed(format!("enum:{}", member))]);
    }
  }

  /// Entity kinds that are declared or used by some parameter.
  fn entity_kinds(&self) -> Vec<String> {
    let mut kinds = self.catalog.entities.iter()
      .map(|e| e.kind.clone())
      .collect::<Set<_>>();
    for (_, params) in &self.functions {
      for param in params {
        if let Type::Entity(kind) = param.ty.element() {
          kinds.insert(kind.clone());
        }
      }
    }
    if self.catalog.devices.is_empty() {
      kinds.shift_remove(DEVICE_ENTITY);
    } else {
      kinds.insert(DEVICE_ENTITY.to_owned());
    }
    kinds.into_iter().collect()
  }

  fn placeholder(&mut self, class: &str) -> Item {
    self.placeholders.insert(class.to_owned());
    ext(class)
  }

  /// Emits the productions of `$constant_<ty>` on first use, and returns its
  /// name.
  fn constant(&mut self, ty: &Type) -> String {
    let name = format!("$constant_{}", ty);
    if !self.constants.insert(ty.clone()) {
      return name;
    }

    let mut rules = vec![];
    match ty {
      Type::String => {
        self.uses_quoted_string = true;
        rules.push(vec![copy(QUOTED_STRING)]);
      }
      Type::Number => rules.push(vec![self.placeholder("NUMBER")]),
      Type::Currency => rules.push(vec![self.placeholder("CURRENCY")]),
      Type::Time => rules.push(vec![self.placeholder("TIME")]),
      Type::Boolean => {
        rules.push(vec![fixed("true")]);
        rules.push(vec![fixed("false")]);
      }
      Type::Date => {
        rules.push(vec![self.placeholder("DATE")]);
        rules.push(vec![fixed("now")]);
        for unit in &DATE_EDGE_UNITS {
          rules.push(vec![fixed("start_of"), fixed(format!("unit:{}", unit))]);
          rules.push(vec![fixed("end_of"), fixed(format!("unit:{}", unit))]);
        }
        if self.has_durations() {
          let duration = self.constant(&Type::Measure(DURATION_FAMILY.to_owned()));
          rules.push(vec![nt(name.clone()), fixed("+"), nt(duration.clone())]);
          rules.push(vec![nt(name.clone()), fixed("-"), nt(duration)]);
        }
      }
      Type::Location => {
        rules.push(vec![self.placeholder("LOCATION")]);
        for location in &LOCATIONS {
          rules.push(vec![fixed(format!("location:{}", location))]);
        }
      }
      Type::Entity(kind) if kind == DEVICE_ENTITY => {
        for device in &self.catalog.devices {
          rules.push(vec![fixed(device_token(self.options.split_devices, device))]);
        }
      }
      Type::Entity(kind) => {
        let class = WELL_KNOWN_ENTITIES.iter()
          .find(|(k, _)| *k == kind.as_str())
          .map(|(_, class)| (*class).to_owned())
          .unwrap_or_else(|| format!("GENERIC_ENTITY_{}", kind));
        rules.push(vec![self.placeholder(&class)]);
        if self.entities.get(kind).copied().unwrap_or(false) {
          let string = self.constant(&Type::String);
          rules.push(vec![nt(string), fixed(format!("^^{}", kind))]);
        }
      }
      Type::Measure(family) => {
        let number = self.constant(&Type::Number);
        let units = self.catalog.units.get(family).cloned().unwrap_or_default();
        for unit in units {
          rules.push(vec![nt(number.clone()), fixed(format!("unit:{}", unit))]);
        }
        if family == DURATION_FAMILY {
          rules.push(vec![self.placeholder("DURATION")]);
        }
      }
      Type::Enum(_) => rules.extend(self.values(ty)),
      Type::Array(elem) => {
        for value in self.values(elem) {
          let mut more = vec![nt(name.clone()), fixed(",")];
          more.extend(value.iter().cloned());
          rules.push(value);
          rules.push(more);
        }
      }
    }

    for rule in rules {
      self.builder.rule(name.clone(), rule);
    }
    name
  }

  fn declare_classes(&mut self) {
    let max = self.options.max_arg_values;
    let values = |class: &str| (0..max).map(|i| format!("{}_{}", class, i)).collect::<Vec<_>>();

    for class in &self.placeholders {
      self.builder.extensible(class.clone(), values(class));
    }
    if self.uses_quoted_string {
      self.builder.copy(QUOTED_STRING, CopyClass {
        open: "\"".to_owned(),
        close: "\"".to_owned(),
        values: values(QUOTED_STRING),
      });
    }
  }
}

fn out_param(ty: &Type) -> String {
  format!("$out_param_{}", ty)
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  fn catalog(lines: &str) -> Catalog {
    Catalog::from_lines(lines.lines()).unwrap()
  }

  #[test]
  fn parameters_and_filters() {
    let catalog = catalog("\
units ms ms s min h
query @builtin.get_time out:time Time
query @thermostat.get out:temperature Measure(C) in:mode Enum(heat,cool)
action @builtin.say in:message String
units C C F
");
    let compiled = compile(&catalog, &CompileOptions::default()).unwrap();
    let g = &compiled.grammar;

    assert!(g.contains("$out_param_Time", &[fixed("param:time:Time")]));
    assert!(g.contains("$const_param", &[
      fixed("param:mode:Enum(heat,cool)"), fixed("="), fixed("enum:cool"),
    ]));
    assert!(g.contains("$const_param", &[
      fixed("param:message:String"), fixed("="), nt("$constant_String"),
    ]));
    assert!(g.contains("$param_passing", &[
      fixed("param:message:String"), fixed("="), nt("$out_param_Any"),
    ]));
    assert!(g.contains("$atom_filter", &[
      nt("$out_param_Measure(C)"), fixed(">="), nt("$constant_Measure(C)"),
    ]));
    assert!(g.contains("$constant_Measure(C)", &[nt("$constant_Number"), fixed("unit:F")]));
    assert!(g.contains("$constant_Measure(ms)", &[ext("DURATION")]));
    assert!(g.contains("$constant_Date", &[nt("$constant_Date"), fixed("+"), nt("$constant_Measure(ms)")]));
    assert!(g.contains("$constant_Any", &[fixed("enum:heat")]));
    assert_eq!(g.extensible_terminals()["NUMBER"].len(), MAX_ARG_VALUES);
    assert_eq!(g.copy_terminals()[QUOTED_STRING].values[7], "QUOTED_STRING_7");
    assert_eq!(compiled.function_devices["@thermostat.get"], "thermostat");
  }

  #[test]
  fn split_devices() {
    let catalog = catalog("\
query @builtin.get_time out:time Time
action @builtin.say in:message String
");
    let options = CompileOptions { split_devices: true, ..CompileOptions::default() };
    let compiled = compile(&catalog, &options).unwrap();
    let g = &compiled.grammar;

    assert!(g.contains("$query_function", &[fixed("@@builtin"), nt("$queries_builtin")]));
    assert!(g.contains("$actions_builtin", &[fixed("@builtin.say")]));
    assert!(g.contains("$constant_Entity(tt:device)", &[fixed("@@builtin")]));
    assert_eq!(compiled.device_token("builtin"), "@@builtin");
  }

  #[test]
  fn free_text_entities() {
    let catalog = catalog("\
entity com.spotify:song text
action @com.spotify.play in:song Entity(com.spotify:song) in:tags Array(Hashtag)
query @com.spotify.get_song out:song Entity(com.spotify:song)
");
    let g = compile(&catalog, &CompileOptions::default()).unwrap().grammar;

    assert!(g.contains("$constant_Entity(com.spotify:song)", &[ext("GENERIC_ENTITY_com.spotify:song")]));
    assert!(g.contains("$constant_Entity(com.spotify:song)", &[
      nt("$constant_String"), fixed("^^com.spotify:song"),
    ]));
    assert!(g.contains("$const_param", &[
      fixed("param:tags:Array(Entity(tt:hashtag))"), fixed("="),
      fixed("["), nt("$constant_Array(Entity(tt:hashtag))"), fixed("]"),
    ]));
    assert!(g.contains("$atom_filter", &[
      nt("$out_param_Entity(com.spotify:song)"), fixed("in_array"),
      fixed("["), nt("$constant_Array(Entity(com.spotify:song))"), fixed("]"),
    ]));
  }

  #[test]
  fn schema_errors() {
    let err = compile(&catalog("query @a.b out:x Integer"), &CompileOptions::default()).unwrap_err();
    assert_eq!(err.to_string(), "parameter `x` of `@a.b` has unknown type `Integer`");

    let err = compile(&catalog("query @a.b out:x Entity(foo:bar)"), &CompileOptions::default()).unwrap_err();
    assert!(matches!(err, SchemaError::UnknownType { .. }));

    let err = compile(&catalog("query @a.b out:x Measure(kg)"), &CompileOptions::default()).unwrap_err();
    assert!(matches!(err, SchemaError::MissingUnits(family) if family == "kg"));

    let err = compile(&catalog("units kg\nquery @a.b out:x Number"), &CompileOptions::default()).unwrap_err();
    assert!(matches!(err, SchemaError::MissingUnits(family) if family == "kg"));

    let err = compile(&catalog("units m m\nunits mi m"), &CompileOptions::default()).unwrap_err();
    assert!(matches!(err, SchemaError::DuplicateUnit { .. }));
  }
}
