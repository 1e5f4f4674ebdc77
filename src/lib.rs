//! Shift-reduce grammar compiler for a typed command language.
//!
//! A [`Catalog`] of device functions is compiled into a grammar, the grammar
//! into an SLR(1) automaton, and programs into fixed-width action vectors
//! suitable as model targets. [`ActionCodec::reconstruct`] turns predicted
//! action vectors back into programs.

pub mod types;
pub mod catalog;
pub mod compile;
pub mod program;
pub mod codec;

pub use self::catalog::{Catalog, CatalogError, FunctionDecl, FunctionKind, ParamDecl, ParamDirection};
pub use self::codec::{
  ActionCodec, ActionKind, ActionVectors, CodecConfig, CodecError, CopySpans, Direction,
};
pub use self::compile::{compile, CompileOptions, CompiledGrammar, ParamKey, SchemaCompiler, SchemaError};
pub use self::program::{program_to_string, ProgramToken};
pub use self::types::{Type, TypeError};
