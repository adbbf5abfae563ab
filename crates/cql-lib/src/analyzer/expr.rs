//! Expression analysis: kind-checking and numeric promotion (spec §4.6
//! item 3), plus the minimal SELECT-core handling the rest of the analyzer
//! leans on to build join scopes.

use std::rc::Rc;

use cql_core::ast::AstKind;
use cql_core::errors::{codes, SemanticError};
use cql_core::sem::{CoreType, JoinDescriptor, SemanticRecord, StructDescriptor};
use cql_core::NodeId;

use super::{is_poisoned, mark_ok, poison};
use crate::context::CompilationContext;
use crate::resolver::{resolve_unqualified, Resolved, Scope, StageOutcome};

/// Analyzes an expression node and returns its resulting core type,
/// poisoning `id` on error and propagating poison from children (spec
/// §3.2 "Error propagation").
pub fn analyze_expr(ctx: &mut CompilationContext, id: NodeId, scope: &Scope) -> CoreType {
    let kind = ctx.arena.get(id).kind;
    match kind {
        AstKind::IntLit => {
            mark_ok(ctx, id, SemanticRecord::of_type(CoreType::Int64));
            CoreType::Int64
        }
        AstKind::NumLit => {
            let t = match &ctx.arena.get(id).payload {
                cql_core::ast::NodePayload::Num { kind, .. } => match kind {
                    cql_core::ast::NumKind::Int => CoreType::Int32,
                    cql_core::ast::NumKind::Long => CoreType::Int64,
                    cql_core::ast::NumKind::Real => CoreType::Real,
                    cql_core::ast::NumKind::Bool => CoreType::Bool,
                },
                _ => unreachable!(),
            };
            mark_ok(ctx, id, SemanticRecord::of_type(t));
            t
        }
        AstKind::StrLit => {
            mark_ok(ctx, id, SemanticRecord::of_type(CoreType::Text));
            CoreType::Text
        }
        AstKind::BlobLit => {
            mark_ok(ctx, id, SemanticRecord::of_type(CoreType::Blob));
            CoreType::Blob
        }
        AstKind::Id => analyze_id(ctx, id, scope),
        AstKind::Add | AstKind::Sub | AstKind::Mul | AstKind::Div | AstKind::Mod => {
            analyze_numeric_binary(ctx, id, scope)
        }
        AstKind::And | AstKind::Or => analyze_logical_binary(ctx, id, scope),
        AstKind::Eq
        | AstKind::Ne
        | AstKind::Lt
        | AstKind::Le
        | AstKind::Gt
        | AstKind::Ge
        | AstKind::Like
        | AstKind::NotLike
        | AstKind::In
        | AstKind::NotIn
        | AstKind::Between
        | AstKind::Is
        | AstKind::IsNot => {
            let left = ctx.arena.get(id).left();
            let right = ctx.arena.get(id).right();
            if let Some(l) = left {
                analyze_expr(ctx, l, scope);
            }
            if let Some(r) = right {
                analyze_expr(ctx, r, scope);
            }
            mark_ok(ctx, id, SemanticRecord::of_type(CoreType::Bool));
            CoreType::Bool
        }
        AstKind::IsNull | AstKind::IsNotNull | AstKind::Not | AstKind::Neg | AstKind::BitNot => {
            if let Some(l) = ctx.arena.get(id).left() {
                analyze_expr(ctx, l, scope);
            }
            let t = if kind == AstKind::Neg { CoreType::Int64 } else { CoreType::Bool };
            mark_ok(ctx, id, SemanticRecord::of_type(t));
            t
        }
        AstKind::Call => analyze_call(ctx, id, scope),
        _ => {
            // Sub-expression kinds without bespoke handling (CASE, CAST,
            // array/dot sugar prior to rewrite, ...) still recurse into
            // their children so nested literals/ids get analyzed.
            if let Some(l) = ctx.arena.get(id).left() {
                analyze_expr(ctx, l, scope);
            }
            if let Some(r) = ctx.arena.get(id).right() {
                analyze_expr(ctx, r, scope);
            }
            mark_ok(ctx, id, SemanticRecord::of_type(CoreType::Pending));
            CoreType::Pending
        }
    }
}

fn analyze_id(ctx: &mut CompilationContext, id: NodeId, scope: &Scope) -> CoreType {
    let name = match &ctx.arena.get(id).payload {
        cql_core::ast::NodePayload::Str { value, .. } => value.clone(),
        _ => panic!("Id node must carry a Str payload"),
    };
    match resolve_unqualified(ctx, scope, &name) {
        StageOutcome::Stop(Ok(resolved)) => {
            let sem_type = resolved_core_type(&resolved);
            mark_ok(ctx, id, SemanticRecord::of_type(sem_type));
            sem_type
        }
        StageOutcome::Stop(Err(e)) => {
            poison(ctx, id, e);
            CoreType::Error
        }
        StageOutcome::Continue => {
            poison(
                ctx,
                id,
                SemanticError::new(codes::NAME_NOT_FOUND, "name not found", name),
            );
            CoreType::Error
        }
    }
}

fn resolved_core_type(resolved: &Resolved) -> CoreType {
    match resolved {
        Resolved::Local { sem_type }
        | Resolved::ProcFormal { sem_type }
        | Resolved::GlobalVariable { sem_type } => *sem_type,
        Resolved::ArgBundleField { column, .. }
        | Resolved::CursorField { column, .. }
        | Resolved::JoinColumn { column, .. }
        | Resolved::OuterJoinColumn { column, .. }
        | Resolved::NamedTypeMember { column, .. } => column.sem_type,
        Resolved::EnumMember { .. } => CoreType::Int64,
        Resolved::ConstGroupMember { value, .. } => match value {
            cql_core::sem::ConstValue::Int(_) => CoreType::Int64,
            cql_core::sem::ConstValue::Real(_) => CoreType::Real,
            cql_core::sem::ConstValue::Bool(_) => CoreType::Bool,
            cql_core::sem::ConstValue::Text(_) => CoreType::Text,
        },
        Resolved::ProcAsFunction { .. } | Resolved::DeclaredFunction { .. } | Resolved::DeclaredSelectFunction { .. } => {
            CoreType::Pending
        }
        Resolved::Region { .. } => CoreType::Region,
    }
}

fn analyze_numeric_binary(ctx: &mut CompilationContext, id: NodeId, scope: &Scope) -> CoreType {
    let left = ctx.arena.get(id).left().expect("binary op missing left");
    let right = ctx.arena.get(id).right().expect("binary op missing right");
    let lt = analyze_expr(ctx, left, scope);
    let rt = analyze_expr(ctx, right, scope);
    if is_poisoned(ctx, left) || is_poisoned(ctx, right) {
        poison(
            ctx,
            id,
            SemanticError::new(codes::TYPE_MISMATCH, "operand has an error", ""),
        );
        return CoreType::Error;
    }
    // Kind compatibility: an `integer<meters>` combines only with
    // compatible-kind integers unless explicitly cast (spec §4.6 item 3).
    let lk = ctx.arena.get(left).sem.as_ref().and_then(|s| s.kind.clone());
    let rk = ctx.arena.get(right).sem.as_ref().and_then(|s| s.kind.clone());
    if let (Some(lk), Some(rk)) = (&lk, &rk) {
        if lk != rk {
            poison(
                ctx,
                id,
                SemanticError::new(codes::TYPE_MISMATCH, "incompatible kinds", format!("{lk} vs {rk}")),
            );
            return CoreType::Error;
        }
    }
    match lt.widen(rt) {
        Some(t) => {
            mark_ok(ctx, id, SemanticRecord::of_type(t));
            t
        }
        None => {
            poison(
                ctx,
                id,
                SemanticError::new(codes::TYPE_MISMATCH, "non-numeric operand", ""),
            );
            CoreType::Error
        }
    }
}

fn analyze_logical_binary(ctx: &mut CompilationContext, id: NodeId, scope: &Scope) -> CoreType {
    if let Some(l) = ctx.arena.get(id).left() {
        analyze_expr(ctx, l, scope);
    }
    if let Some(r) = ctx.arena.get(id).right() {
        analyze_expr(ctx, r, scope);
    }
    mark_ok(ctx, id, SemanticRecord::of_type(CoreType::Bool));
    CoreType::Bool
}

fn analyze_call(ctx: &mut CompilationContext, id: NodeId, scope: &Scope) -> CoreType {
    for arg in ctx.arena.chain_elements(ctx.arena.get(id).right()) {
        analyze_expr(ctx, arg, scope);
    }
    mark_ok(ctx, id, SemanticRecord::of_type(CoreType::Pending));
    CoreType::Pending
}

/// Minimal SELECT-core analysis: resolves the FROM clause into a
/// [`JoinDescriptor`], analyzes WHERE/select-list under that scope, and
/// returns the shape of the projected columns (so nested/CTE selects can
/// be used as a `LIKE`-able shape per the GLOSSARY).
pub fn analyze_select(ctx: &mut CompilationContext, id: NodeId, scope: &Scope) -> Rc<StructDescriptor> {
    let from = ctx.arena.get(id).left();
    let mut inner_scope = Scope {
        locals: scope.locals.clone(),
        proc_formals: scope.proc_formals.clone(),
        arg_bundles: scope.arg_bundles.clone(),
        cursor_fields: scope.cursor_fields.clone(),
        join: None,
        outer_join: scope.join.clone(),
        region_list_context: false,
        current_proc: scope.current_proc.clone(),
    };

    if let Some(from_clause) = from {
        let join = build_join_descriptor(ctx, from_clause);
        inner_scope.join = Some(Rc::new(join));

        // Backed-table rewrite (spec §4.7.4): a bare `FROM <backed table>`
        // reads through `cql_blob_get` instead of the (nonexistent) table.
        // Joins against a backed table aren't modeled here; only the single-
        // table case is rewritten.
        if let Some((table_name, backing)) = single_backed_from(ctx, from_clause) {
            let entry = ctx.registries.tables.get(table_name.as_str()).cloned();
            if let Some(entry) = entry {
                let hash = crate::rewriter::backed_tables::type_hash(&entry.descriptor);
                let rewritten = crate::rewriter::backed_tables::rewrite_select_from(ctx, id, table_name.as_str(), backing.as_str(), hash);
                let new_node = ctx.arena.get(rewritten).clone();
                ctx.arena.get_mut(id).kind = new_node.kind;
                ctx.arena.get_mut(id).payload = new_node.payload;
            }
        }
    }

    let select_list = ctx.arena.get(id).right();
    let mut columns = Vec::new();
    if let Some(list) = select_list {
        for item in ctx.arena.chain_elements(Some(list)) {
            let t = analyze_expr(ctx, item, &inner_scope);
            let name = ctx
                .arena
                .get(item)
                .sem
                .as_ref()
                .and_then(|s| s.name.clone())
                .unwrap_or_else(|| format!("_col{}", columns.len()).into());
            columns.push(cql_core::sem::ColumnDescriptor {
                name,
                kind: None,
                sem_type: t,
                flags: cql_core::sem::SemFlags::empty(),
            });
        }
    }

    let desc = Rc::new(StructDescriptor {
        name: "select_result".into(),
        columns,
        is_backed: false,
    });
    let mut record = SemanticRecord::of_type(CoreType::Struct);
    record.struct_desc = Some(desc.clone());
    mark_ok(ctx, id, record);
    desc
}

/// Builds the join descriptor for a FROM clause by resolving each table
/// reference against the table registry (views/CTEs are resolved the same
/// way via their own struct descriptors).
fn build_join_descriptor(ctx: &mut CompilationContext, from_clause: NodeId) -> JoinDescriptor {
    let mut scopes = Vec::new();
    for table_ref in ctx.arena.chain_elements(Some(from_clause)) {
        let (alias, table_name) = table_ref_parts(ctx, table_ref);
        if let Some(entry) = ctx.registries.tables.get(table_name.as_str()) {
            scopes.push((alias.unwrap_or_else(|| table_name.clone()), entry.descriptor.clone()));
        } else if let Some((desc, _)) = ctx.registries.views.get(table_name.as_str()) {
            scopes.push((alias.unwrap_or_else(|| table_name.clone()), desc.clone()));
        } else if let Some(desc) = ctx.cte_stack.resolve(&table_name) {
            scopes.push((alias.unwrap_or_else(|| table_name.clone()), desc.clone()));
        }
    }
    JoinDescriptor { scopes }
}

/// If `from_clause` names exactly one backed table and nothing else (no
/// join), returns its name and backing table.
fn single_backed_from(ctx: &CompilationContext, from_clause: NodeId) -> Option<(smol_str::SmolStr, smol_str::SmolStr)> {
    let refs = ctx.arena.chain_elements(Some(from_clause));
    let [table_ref] = refs.as_slice() else { return None };
    let (_alias, table_name) = table_ref_parts(ctx, *table_ref);
    let entry = ctx.registries.tables.get(table_name.as_str())?;
    entry.backed_by.as_ref().map(|b| (table_name.clone(), b.clone()))
}

fn table_ref_parts(ctx: &CompilationContext, table_ref: NodeId) -> (Option<smol_str::SmolStr>, smol_str::SmolStr) {
    let node = ctx.arena.get(table_ref);
    let name_node = node.left().unwrap_or(table_ref);
    let name = match &ctx.arena.get(name_node).payload {
        cql_core::ast::NodePayload::Str { value, .. } => value.clone(),
        _ => "".into(),
    };
    let alias = node.right().and_then(|a| match &ctx.arena.get(a).payload {
        cql_core::ast::NodePayload::Str { value, .. } => Some(value.clone()),
        _ => None,
    });
    (alias, name)
}
