//! Dependency visitor (spec §4.6 "Dependency tracking"): walks a
//! procedure/trigger body and classifies every table/view reference by the
//! context it appears in (insert-target / update-target / delete-target /
//! from-source / any), accumulating the result into a [`DependencySets`]
//! that gets attached to the owning [`crate::registries::ProcInfo`].

use cql_core::ast::{AstKind, NodePayload};
use cql_core::NodeId;
use smol_str::SmolStr;

use crate::context::CompilationContext;
use crate::registries::DependencySets;

/// Recursively walks `body`, folding every table/view/procedure reference
/// it finds into `deps`. Safe to call on any statement or statement list;
/// unrecognized node kinds just recurse into both children.
pub fn collect(ctx: &CompilationContext, body: NodeId, deps: &mut DependencySets) {
    let node = ctx.arena.get(body);
    match node.kind {
        AstKind::InsertStmt => {
            if let Some(name) = target_table_name(ctx, body) {
                push_unique(&mut deps.insert_tables, name);
            }
            recurse_children(ctx, body, deps);
        }
        AstKind::UpdateStmt => {
            if let Some(name) = target_table_name(ctx, body) {
                push_unique(&mut deps.update_tables, name);
            }
            recurse_children(ctx, body, deps);
        }
        AstKind::DeleteStmt => {
            if let Some(name) = target_table_name(ctx, body) {
                push_unique(&mut deps.delete_tables, name);
            }
            recurse_children(ctx, body, deps);
        }
        AstKind::UpsertStmt => {
            // An upsert is simultaneously an insert-target and an
            // update-target reference (spec §4.7.4 backed-table rewrite
            // treats it the same way): the conflict-resolution branch may
            // run an UPDATE, so both sets see the table.
            if let Some(name) = target_table_name(ctx, body) {
                push_unique(&mut deps.insert_tables, name.clone());
                push_unique(&mut deps.update_tables, name);
            }
            recurse_children(ctx, body, deps);
        }
        AstKind::FromClause => {
            for table_ref in ctx.arena.chain_elements(Some(body)) {
                if let Some(name) = table_or_subquery_name(ctx, table_ref) {
                    classify_from_source(ctx, name, deps);
                } else {
                    recurse_children(ctx, table_ref, deps);
                }
            }
        }
        AstKind::CallStmt => {
            if let Some(name) = callee_name(ctx, body) {
                push_unique(&mut deps.uses_procedures, name.clone());
                if let Some(callee) = ctx.registries.procedures.get(name.as_str()) {
                    merge(deps, &callee.deps);
                }
            }
            recurse_children(ctx, body, deps);
        }
        _ => recurse_children(ctx, body, deps),
    }
}

fn recurse_children(ctx: &CompilationContext, id: NodeId, deps: &mut DependencySets) {
    let node = ctx.arena.get(id);
    if let Some(l) = node.left() {
        collect(ctx, l, deps);
    }
    if let Some(r) = node.right() {
        collect(ctx, r, deps);
    }
}

fn push_unique(set: &mut Vec<SmolStr>, name: SmolStr) {
    if !set.contains(&name) {
        set.push(name);
    }
}

fn merge(deps: &mut DependencySets, other: &DependencySets) {
    for n in &other.from_tables {
        push_unique(&mut deps.from_tables, n.clone());
    }
    for n in &other.insert_tables {
        push_unique(&mut deps.insert_tables, n.clone());
    }
    for n in &other.update_tables {
        push_unique(&mut deps.update_tables, n.clone());
    }
    for n in &other.delete_tables {
        push_unique(&mut deps.delete_tables, n.clone());
    }
    for n in &other.uses_views {
        push_unique(&mut deps.uses_views, n.clone());
    }
    for n in &other.uses_procedures {
        push_unique(&mut deps.uses_procedures, n.clone());
    }
}

/// A view reference goes to `uses_views`; everything else (including
/// unknown names, which may be forward-referenced tables or CTEs) is
/// treated as a `from_tables` reference, matching the original's
/// conservative default.
fn classify_from_source(ctx: &CompilationContext, name: SmolStr, deps: &mut DependencySets) {
    if ctx.registries.views.contains_key(name.as_str()) {
        push_unique(&mut deps.uses_views, name);
    } else if ctx.cte_stack.resolve(&name).is_none() {
        push_unique(&mut deps.from_tables, name);
    }
}

/// `INSERT`/`UPDATE`/`DELETE`/`UPSERT` all carry the target table name as
/// an `Id` in their `left` child.
fn target_table_name(ctx: &CompilationContext, stmt: NodeId) -> Option<SmolStr> {
    let name_node = ctx.arena.get(stmt).left()?;
    id_text(ctx, name_node)
}

fn table_or_subquery_name(ctx: &CompilationContext, table_ref: NodeId) -> Option<SmolStr> {
    if ctx.arena.get(table_ref).kind != AstKind::TableOrSubquery {
        return None;
    }
    let name_node = ctx.arena.get(table_ref).left()?;
    id_text(ctx, name_node)
}

fn callee_name(ctx: &CompilationContext, call_stmt: NodeId) -> Option<SmolStr> {
    let name_node = ctx.arena.get(call_stmt).left()?;
    id_text(ctx, name_node)
}

fn id_text(ctx: &CompilationContext, id: NodeId) -> Option<SmolStr> {
    if !matches!(ctx.arena.get(id).kind, AstKind::Id | AstKind::DotId | AstKind::QualifiedId) {
        return None;
    }
    match &ctx.arena.get(id).payload {
        NodePayload::Str { value, .. } => Some(value.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{CompilationContext, CompileOptions};
    use cql_core::ast::StrSubtype;
    use cql_core::location::SourceLocation;

    fn loc() -> SourceLocation {
        SourceLocation::new("t.sql", 1)
    }

    #[test]
    fn insert_adds_target_table() {
        let mut ctx = CompilationContext::new(CompileOptions::default());
        let name = ctx.arena.new_str(loc(), "widgets", StrSubtype::Id);
        ctx.arena.get_mut(name).kind = AstKind::Id;
        let stmt = ctx.arena.new_unary(AstKind::InsertStmt, loc(), name);
        let mut deps = DependencySets::default();
        collect(&ctx, stmt, &mut deps);
        assert_eq!(deps.insert_tables, vec![SmolStr::from("widgets")]);
    }

    #[test]
    fn upsert_adds_both_insert_and_update() {
        let mut ctx = CompilationContext::new(CompileOptions::default());
        let name = ctx.arena.new_str(loc(), "widgets", StrSubtype::Id);
        ctx.arena.get_mut(name).kind = AstKind::Id;
        let stmt = ctx.arena.new_unary(AstKind::UpsertStmt, loc(), name);
        let mut deps = DependencySets::default();
        collect(&ctx, stmt, &mut deps);
        assert_eq!(deps.insert_tables, vec![SmolStr::from("widgets")]);
        assert_eq!(deps.update_tables, vec![SmolStr::from("widgets")]);
    }

    #[test]
    fn call_stmt_records_callee() {
        let mut ctx = CompilationContext::new(CompileOptions::default());
        let name = ctx.arena.new_str(loc(), "helper_proc", StrSubtype::Id);
        ctx.arena.get_mut(name).kind = AstKind::Id;
        let stmt = ctx.arena.new_unary(AstKind::CallStmt, loc(), name);
        let mut deps = DependencySets::default();
        collect(&ctx, stmt, &mut deps);
        assert_eq!(deps.uses_procedures, vec![SmolStr::from("helper_proc")]);
    }
}
