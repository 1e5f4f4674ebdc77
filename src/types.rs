use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Parameter type of a catalog function.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
  String,
  Number,
  Boolean,
  Date,
  Time,
  Currency,
  Location,
  /// entity kind, e.g. `tt:username`
  Entity(String),
  /// measurement family, named after its base unit
  Measure(String),
  Enum(Vec<String>),
  Array(Box<Type>),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown type `{0}`")]
pub struct TypeError(pub String);

/// Shorthand type names and the entity kinds they stand for.
const ALIASES: [(&str, &str); 7] = [
  ("Username", "tt:username"),
  ("Hashtag", "tt:hashtag"),
  ("PhoneNumber", "tt:phone_number"),
  ("EmailAddress", "tt:email_address"),
  ("URL", "tt:url"),
  ("Picture", "tt:picture"),
  ("PathName", "tt:path_name"),
];

/// Category of a type, in the order in which categories are tried when
/// deciding which operators apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Category {
  Array,
  Enum,
  Boolean,
  Measure,
  Entity,
  String,
  Ordered,
  Location,
}

impl Type {
  pub fn category(&self) -> Category {
    match self {
      Type::Array(_) => Category::Array,
      Type::Enum(_) => Category::Enum,
      Type::Boolean => Category::Boolean,
      Type::Measure(_) => Category::Measure,
      Type::Entity(_) => Category::Entity,
      Type::String => Category::String,
      Type::Number | Type::Currency | Type::Date | Type::Time => Category::Ordered,
      Type::Location => Category::Location,
    }
  }

  /// Comparison operators of `$atom_filter` productions over this type.
  ///
  /// Enums and booleans are asserted against literals with `==`; arrays are
  /// only tested for membership with `contains`.
  pub fn operators(&self) -> &'static [&'static str] {
    match self.category() {
      Category::Array => &["contains"],
      Category::Enum | Category::Boolean | Category::Entity | Category::Location => &["=="],
      Category::String => &["==", "=~"],
      Category::Measure | Category::Ordered => &["==", ">=", "<="],
    }
  }

  /// Whether `in_range [ a , b ]` filters apply.
  pub fn is_ordered(&self) -> bool {
    matches!(self.category(), Category::Measure | Category::Ordered)
  }

  /// Whether `in_array [ ... ]` filters apply.
  pub fn has_membership(&self) -> bool {
    matches!(self.category(), Category::Entity | Category::String)
  }

  pub fn element(&self) -> &Type {
    match self {
      Type::Array(elem) => elem.element(),
      _ => self,
    }
  }
}

impl FromStr for Type {
  type Err = TypeError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let err = || TypeError(s.to_owned());

    let ty = match s {
      "String" => Type::String,
      "Number" => Type::Number,
      "Boolean" | "Bool" => Type::Boolean,
      "Date" => Type::Date,
      "Time" => Type::Time,
      "Currency" => Type::Currency,
      "Location" => Type::Location,
      _ => {
        if let Some(&(_, kind)) = ALIASES.iter().find(|(alias, _)| *alias == s) {
          return Ok(Type::Entity(kind.to_owned()));
        }

        let (ctor, arg) = s.strip_suffix(')')
          .and_then(|s| s.split_once('('))
          .ok_or_else(err)?;
        if arg.is_empty() {
          return Err(err());
        }
        match ctor {
          "Array" => Type::Array(Box::new(arg.parse().map_err(|_| err())?)),
          "Entity" => Type::Entity(arg.to_owned()),
          "Measure" => Type::Measure(arg.to_owned()),
          "Enum" => {
            let members = arg.split(',').map(|m| m.trim().to_owned()).collect::<Vec<_>>();
            if members.iter().any(|m| m.is_empty()) {
              return Err(err());
            }
            Type::Enum(members)
          }
          _ => return Err(err()),
        }
      }
    };

    Ok(ty)
  }
}

impl fmt::Display for Type {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Type::String => f.write_str("String"),
      Type::Number => f.write_str("Number"),
      Type::Boolean => f.write_str("Boolean"),
      Type::Date => f.write_str("Date"),
      Type::Time => f.write_str("Time"),
      Type::Currency => f.write_str("Currency"),
      Type::Location => f.write_str("Location"),
      Type::Entity(kind) => write!(f, "Entity({})", kind),
      Type::Measure(family) => write!(f, "Measure({})", family),
      Type::Enum(members) => write!(f, "Enum({})", members.join(",")),
      Type::Array(elem) => write!(f, "Array({})", elem),
    }
  }
}
