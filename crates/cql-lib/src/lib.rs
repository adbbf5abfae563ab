//! Name resolution, semantic analysis, and AST rewriting for the compiler
//! core (spec §4.5-§4.7, components E-G). [`analyzer::analyze`] is the
//! single entry point consumers call after building (or loading) a
//! [`cql_core::AstArena`]; the emitters in `cql-json`/`cql-queryplan` walk
//! the [`context::CompilationContext`] it produces.

pub mod analyzer;
pub mod context;
pub mod registries;
pub mod resolver;
pub mod rewriter;

pub use context::{CompilationContext, CompileOptions};
