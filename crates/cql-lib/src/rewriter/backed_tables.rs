//! Backed-table rewrite (spec §4.7.4): a table declared `@backed_by
//! <backing_table>` does not exist as a real SQLite table; every
//! read/write against it is rewritten into a call against the backing
//! table's blob-column API (`cql_blob_get`/`cql_blob_create`/
//! `cql_blob_update`/`cql_blob_delete`), keyed by the type hash of the
//! backed table's shape so a schema change invalidates stored blobs.

use std::rc::Rc;

use cql_core::ast::{AstKind, StrSubtype};
use cql_core::location::open_rewrite_scope;
use cql_core::sem::StructDescriptor;
use cql_core::NodeId;
use smol_str::SmolStr;

use crate::context::CompilationContext;

/// A stable hash of a shape's column names, types and flags (spec §4.7.4):
/// any change to the shape changes the hash, so a blob written under the
/// old shape is detected as stale rather than silently misread.
pub fn type_hash(desc: &StructDescriptor) -> u64 {
    let mut buf = Vec::new();
    for col in &desc.columns {
        buf.extend_from_slice(col.name.as_bytes());
        buf.push(0);
        buf.extend_from_slice(&(col.sem_type as u8).to_le_bytes());
        buf.extend_from_slice(&col.flags.bits().to_le_bytes());
    }
    cql_helpers::fnv64(&buf)
}

fn call_node(ctx: &mut CompilationContext, loc: cql_core::location::SourceLocation, fn_name: &str, args: Vec<NodeId>) -> NodeId {
    let name_id = ctx.arena.new_str(loc.clone(), fn_name, StrSubtype::Id);
    ctx.arena.get_mut(name_id).kind = AstKind::Id;
    let mut tail = None;
    for arg in args.into_iter().rev() {
        tail = Some(ctx.arena.new_chain_node(AstKind::ArgList, arg, tail));
    }
    match tail {
        Some(t) => ctx.arena.new_binary(AstKind::CallStmt, loc, name_id, t),
        None => ctx.arena.new_unary(AstKind::CallStmt, loc, name_id),
    }
}

fn str_lit(ctx: &mut CompilationContext, loc: cql_core::location::SourceLocation, s: impl Into<SmolStr>) -> NodeId {
    ctx.arena.new_str(loc, s, StrSubtype::CStr)
}

fn int_lit(ctx: &mut CompilationContext, loc: cql_core::location::SourceLocation, v: i64) -> NodeId {
    ctx.arena.new_int(loc, v)
}

/// Rewrites `INSERT INTO backed_table (...) VALUES (...)` into a call to
/// `cql_blob_create(backing_table, type_hash, <original value exprs>)`.
pub fn rewrite_insert(
    ctx: &mut CompilationContext,
    insert_stmt: NodeId,
    backing_table: &str,
    hash: u64,
) -> NodeId {
    let loc = ctx.arena.get(insert_stmt).loc.clone();
    let _scope = open_rewrite_scope(loc.clone());
    tracing::debug!(backing_table, hash, "rewriting insert into backed table");
    let values = ctx.arena.get(insert_stmt).right();
    let mut args = vec![str_lit(ctx, loc.clone(), backing_table), int_lit(ctx, loc.clone(), hash as i64)];
    if let Some(v) = values {
        args.push(v);
    }
    call_node(ctx, loc, "cql_blob_create", args)
}

/// Rewrites `UPDATE backed_table SET ... WHERE pk = ...` into
/// `cql_blob_update(backing_table, type_hash, <pk expr>, <set exprs>)`.
pub fn rewrite_update(
    ctx: &mut CompilationContext,
    update_stmt: NodeId,
    backing_table: &str,
    hash: u64,
    pk_expr: NodeId,
) -> NodeId {
    let loc = ctx.arena.get(update_stmt).loc.clone();
    let _scope = open_rewrite_scope(loc.clone());
    tracing::debug!(backing_table, hash, "rewriting update against backed table");
    let set_list = ctx.arena.get(update_stmt).right();
    let mut args = vec![
        str_lit(ctx, loc.clone(), backing_table),
        int_lit(ctx, loc.clone(), hash as i64),
        pk_expr,
    ];
    if let Some(s) = set_list {
        args.push(s);
    }
    call_node(ctx, loc, "cql_blob_update", args)
}

/// Rewrites `DELETE FROM backed_table WHERE pk = ...` into
/// `cql_blob_delete(backing_table, <pk expr>)`.
pub fn rewrite_delete(ctx: &mut CompilationContext, delete_stmt: NodeId, backing_table: &str, pk_expr: NodeId) -> NodeId {
    let loc = ctx.arena.get(delete_stmt).loc.clone();
    let _scope = open_rewrite_scope(loc.clone());
    tracing::debug!(backing_table, "rewriting delete against backed table");
    call_node(ctx, loc.clone(), "cql_blob_delete", vec![str_lit(ctx, loc, backing_table), pk_expr])
}

/// Rewrites a `SELECT` whose `FROM` references a backed table into one
/// reading through a `WITH` binding that calls `cql_blob_get`, so ordinary
/// column resolution against the backed table's shape still works
/// unmodified on the projected rows (spec §4.7.4 "reads look like reads").
pub fn rewrite_select_from(
    ctx: &mut CompilationContext,
    select_stmt: NodeId,
    backed_table: &str,
    backing_table: &str,
    hash: u64,
) -> NodeId {
    let loc = ctx.arena.get(select_stmt).loc.clone();
    let _scope = open_rewrite_scope(loc.clone());
    tracing::debug!(backed_table, backing_table, hash, "rewriting select from backed table");
    let get_call = call_node(
        ctx,
        loc.clone(),
        "cql_blob_get",
        vec![str_lit(ctx, loc.clone(), backing_table), int_lit(ctx, loc.clone(), hash as i64)],
    );
    let binding_name = ctx.arena.new_str(loc.clone(), backed_table, StrSubtype::Id);
    let cte = ctx.arena.new_binary(AstKind::CteBinding, loc.clone(), binding_name, get_call);
    let with_chain = ctx.arena.new_chain_node(AstKind::WithClause, cte, None);
    ctx.arena.new_binary(AstKind::SelectStmt, loc, with_chain, ctx.arena.get(select_stmt).right().unwrap_or(select_stmt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CompileOptions;
    use cql_core::location::SourceLocation;
    use cql_core::sem::{ColumnDescriptor, CoreType, SemFlags};

    fn loc() -> SourceLocation {
        SourceLocation::new("t.sql", 1)
    }

    #[test]
    fn type_hash_changes_when_columns_change() {
        let a = StructDescriptor {
            name: "t".into(),
            columns: vec![ColumnDescriptor {
                name: "x".into(),
                kind: None,
                sem_type: CoreType::Int64,
                flags: SemFlags::empty(),
            }],
            is_backed: true,
        };
        let mut b = a.clone();
        b.columns[0].sem_type = CoreType::Text;
        assert_ne!(type_hash(&a), type_hash(&b));
    }

    #[test]
    fn insert_rewrite_produces_call_to_blob_create() {
        let mut ctx = CompilationContext::new(CompileOptions::default());
        let name = ctx.arena.new_str(loc(), "widgets", StrSubtype::Id);
        ctx.arena.get_mut(name).kind = AstKind::Id;
        let insert = ctx.arena.new_unary(AstKind::InsertStmt, loc(), name);
        let rewritten = rewrite_insert(&mut ctx, insert, "widgets_backing", 42);
        assert_eq!(ctx.arena.get(rewritten).kind, AstKind::CallStmt);
    }
}
