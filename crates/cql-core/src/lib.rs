//! Arena-allocated, tagged-node AST plus the bulk-lifetime and symbol-table
//! plumbing it sits on (spec components A-D).
//!
//! Every AST node lives in a single [`arena::Arena`] for the lifetime of one
//! compilation; there is no per-node ownership to track, only the arena's.

pub mod arena;
pub mod ast;
pub mod buffers;
pub mod errors;
pub mod location;
pub mod macros;
pub mod sem;
pub mod symtab;

pub use ast::{AstArena, NodeId};
pub use location::{RewriteScopeGuard, SourceLocation};
