//! AST rewriter (spec §4.7, component G). Each submodule owns one family
//! of rewrites; all of them mint new nodes under an open rewrite scope
//! (spec §3.1, §5) rather than mutating in place, so the pre-rewrite tree
//! stays valid for anything that still holds a reference to it.

pub mod backed_tables;
pub mod operators;
pub mod out_union;
pub mod shape;
pub mod sugar;
