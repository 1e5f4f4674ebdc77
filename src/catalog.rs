//! Typed function catalog, the input of the schema compiler.

use std::fmt;
use grammar::Map;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionKind {
  Query,
  Action,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamDirection {
  In,
  Out,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDecl {
  pub name: String,
  /// type as written in the catalog; checked by the compiler
  pub ty: String,
  pub direction: ParamDirection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDecl {
  pub kind: FunctionKind,
  pub device: String,
  pub name: String,
  pub params: Vec<ParamDecl>,
}

impl FunctionDecl {
  /// `@<device>.<name>`
  pub fn token(&self) -> String {
    format!("@{}.{}", self.device, self.name)
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDecl {
  pub kind: String,
  /// whether the entity can be recognized in free text, and so be spelled
  /// as a quoted string
  pub has_ner: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
  pub devices: Vec<String>,
  pub functions: Vec<FunctionDecl>,
  pub enums: Vec<Vec<String>>,
  /// measurement family -> unit names
  pub units: Map<String, Vec<String>>,
  pub entities: Vec<EntityDecl>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct CatalogError {
  pub line: usize,
  pub message: String,
}

impl Catalog {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn device(&mut self, id: impl Into<String>) -> &mut Self {
    let id = id.into();
    if !self.devices.contains(&id) {
      self.devices.push(id);
    }
    self
  }

  pub fn function(&mut self, decl: FunctionDecl) -> &mut Self {
    self.device(decl.device.clone());
    self.functions.push(decl);
    self
  }

  pub fn units(&mut self, family: impl Into<String>, units: &[&str]) -> &mut Self {
    self.units.insert(family.into(), units.iter().map(|&u| u.to_owned()).collect());
    self
  }

  pub fn entity(&mut self, kind: impl Into<String>, has_ner: bool) -> &mut Self {
    self.entities.push(EntityDecl { kind: kind.into(), has_ner });
    self
  }

  /// Reads a catalog in the line format
  ///
  /// ```text
  /// device <id>
  /// entity <kind> [text]
  /// units <family> <unit>...
  /// enum <member>...
  /// query <@device.name> <in|out>:<param> <Type>...
  /// action <@device.name> <in|out>:<param> <Type>...
  /// ```
  ///
  /// Blank lines and lines starting with `#` are skipped.
  pub fn from_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Result<Self, CatalogError> {
    let mut catalog = Catalog::new();

    for (i, line) in lines.into_iter().enumerate() {
      let line_no = i + 1;
      let err = |message: String| CatalogError { line: line_no, message };

      let words = line.split_whitespace().collect::<Vec<_>>();
      let (directive, args) = match words.split_first() {
        None => continue,
        Some((d, _)) if d.starts_with('#') => continue,
        Some((&d, args)) => (d, args),
      };

      match directive {
        "device" => match args {
          [id] => { catalog.device(*id); }
          _ => return Err(err("expected `device <id>`".to_owned())),
        },
        "entity" => match args {
          [kind] => { catalog.entity(*kind, false); }
          [kind, "text"] => { catalog.entity(*kind, true); }
          _ => return Err(err("expected `entity <kind> [text]`".to_owned())),
        },
        "units" => match args {
          [family, units @ ..] => { catalog.units(*family, units); }
          [] => return Err(err("expected `units <family> <unit>...`".to_owned())),
        },
        "enum" => {
          if args.is_empty() {
            return Err(err("expected `enum <member>...`".to_owned()));
          }
          catalog.enums.push(args.iter().map(|&m| m.to_owned()).collect());
        }
        "query" | "action" => {
          let kind = if directive == "query" {
            FunctionKind::Query
          } else {
            FunctionKind::Action
          };
          let (name, params) = args.split_first()
            .ok_or_else(|| err(format!("expected `{} <@device.name> ...`", directive)))?;
          let (device, name) = name.strip_prefix('@')
            .and_then(|n| n.rsplit_once('.'))
            .ok_or_else(|| err(format!("malformed function name `{}`", name)))?;
          if params.len() % 2 != 0 {
            return Err(err("parameters must come in `<in|out>:<name> <Type>` pairs".to_owned()));
          }

          let params = params.chunks(2)
            .map(|pair| parse_param(pair[0], pair[1]).map_err(err))
            .collect::<Result<Vec<_>, _>>()?;

          catalog.function(FunctionDecl {
            kind,
            device: device.to_owned(),
            name: name.to_owned(),
            params,
          });
        }
        _ => return Err(err(format!("unknown directive `{}`", directive))),
      }
    }

    Ok(catalog)
  }
}

fn parse_param(param: &str, ty: &str) -> Result<ParamDecl, String> {
  let (direction, name) = param.split_once(':')
    .ok_or_else(|| format!("malformed parameter `{}`", param))?;
  let direction = match direction {
    "in" => ParamDirection::In,
    "out" => ParamDirection::Out,
    _ => return Err(format!("unknown parameter direction `{}`", direction)),
  };

  Ok(ParamDecl {
    name: name.to_owned(),
    ty: ty.to_owned(),
    direction,
  })
}

impl fmt::Display for ParamDirection {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      ParamDirection::In => f.write_str("in"),
      ParamDirection::Out => f.write_str("out"),
    }
  }
}
