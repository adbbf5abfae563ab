//! Fixture AST loader (spec §6 "Parser boundary"): the lexer/parser for the
//! source dialect is explicitly out of scope for this compiler core, which
//! consumes "a pointer to a statement-list AST rooted at a top-level list
//! node." This module is the oracle/fixture stand-in a harness uses to hand
//! the analyzer a tree without a real parser: a small JSON shape mirroring
//! `cql_core::ast::NodePayload` one-to-one, loaded with `serde_json`.
//!
//! A leaf node is one of:
//! ```json
//! {"int": 5}
//! {"num": {"text": "1.5", "kind": "real"}}
//! {"str": {"value": "widgets", "subtype": "id"}}
//! {"blob": "deadbeef"}
//! ```
//! Anything else must carry `"kind"` (the `AstKind` variant in snake_case,
//! e.g. `"create_table"`) plus optional `"left"`/`"right"` children.

use std::str::FromStr;

use cql_core::ast::{AstKind, NumKind, StrSubtype};
use cql_core::location::SourceLocation;
use cql_core::{AstArena, NodeId};
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error("fixture JSON is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unknown AST kind {0:?}")]
    UnknownKind(String),
    #[error("unknown literal subtype {0:?}")]
    UnknownSubtype(String),
    #[error("unknown numeric kind {0:?}")]
    UnknownNumKind(String),
}

#[derive(Debug, Deserialize)]
struct NumFixture {
    text: String,
    kind: String,
}

#[derive(Debug, Deserialize)]
struct StrFixture {
    value: String,
    subtype: String,
}

#[derive(Debug, Deserialize)]
struct RawFixture {
    #[serde(default)]
    int: Option<i64>,
    #[serde(default)]
    num: Option<NumFixture>,
    #[serde(default)]
    str: Option<StrFixture>,
    #[serde(default)]
    blob: Option<String>,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    left: Option<Box<RawFixture>>,
    #[serde(default)]
    right: Option<Box<RawFixture>>,
}

fn parse_subtype(s: &str) -> Result<StrSubtype, FixtureError> {
    match s {
        "id" => Ok(StrSubtype::Id),
        "c_str" => Ok(StrSubtype::CStr),
        "quoted_id" => Ok(StrSubtype::QuotedId),
        other => Err(FixtureError::UnknownSubtype(other.to_string())),
    }
}

fn parse_num_kind(s: &str) -> Result<NumKind, FixtureError> {
    match s {
        "int" => Ok(NumKind::Int),
        "long" => Ok(NumKind::Long),
        "real" => Ok(NumKind::Real),
        "bool" => Ok(NumKind::Bool),
        other => Err(FixtureError::UnknownNumKind(other.to_string())),
    }
}

fn build(arena: &mut AstArena, source_name: &str, raw: RawFixture) -> Result<NodeId, FixtureError> {
    let loc = SourceLocation::new(source_name, 1);

    if let Some(v) = raw.int {
        return Ok(arena.new_int(loc, v));
    }
    if let Some(n) = raw.num {
        let kind = parse_num_kind(&n.kind)?;
        return Ok(arena.new_num(loc, n.text, kind));
    }
    if let Some(s) = raw.str {
        let subtype = parse_subtype(&s.subtype)?;
        let node = arena.new_str(loc, s.value, subtype);
        if let Some(kind_name) = &raw.kind {
            let kind = AstKind::from_str(kind_name)
                .map_err(|_| FixtureError::UnknownKind(kind_name.clone()))?;
            arena.get_mut(node).kind = kind;
        }
        return Ok(node);
    }
    if let Some(hex) = raw.blob {
        return Ok(arena.new_blob(loc, hex));
    }

    let kind_name = raw
        .kind
        .as_deref()
        .ok_or_else(|| FixtureError::UnknownKind("<missing \"kind\">".to_string()))?;
    let kind = AstKind::from_str(kind_name).map_err(|_| FixtureError::UnknownKind(kind_name.to_string()))?;

    let left = raw.left.map(|b| build(arena, source_name, *b)).transpose()?;
    let right = raw.right.map(|b| build(arena, source_name, *b)).transpose()?;

    Ok(match (left, right) {
        (Some(l), Some(r)) => arena.new_binary(kind, loc, l, r),
        (Some(l), None) => arena.new_unary(kind, loc, l),
        (None, None) => arena.new_leafless(kind, loc),
        (None, Some(_)) => return Err(FixtureError::UnknownKind(format!("{kind_name} has a right child but no left"))),
    })
}

/// Parses `text` as fixture JSON and materializes it into `arena`, returning
/// the root node id. `source_name` is attached to every synthesized
/// [`SourceLocation`] for diagnostics.
pub fn load(arena: &mut AstArena, source_name: &str, text: &str) -> Result<NodeId, FixtureError> {
    let raw: RawFixture = serde_json::from_str(text)?;
    build(arena, source_name, raw)
}
