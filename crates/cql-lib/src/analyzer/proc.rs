//! Procedure/function analysis (spec §4.6 items 2, 5, 6): `CREATE PROC`/
//! `DECLARE PROC`/`FUNC`/`SELECT FUNC` registration, `IF`/`WHILE`/`LOOP`
//! control flow with nullability-inference hookup, DML statement dispatch,
//! and the cursor and out-union lifecycle state machines.
//!
//! Shape convention: a `CreateProc`/`DeclareProc`/`DeclareFunc`/
//! `DeclareSelectFunc` node's `left` is the `Id` name; `right` is a chain
//! whose elements are, in order, zero or more `Param` nodes (each
//! pre-stamped with its type/`IN_PARAM`/`OUT_PARAM` flags by the AST
//! builder, the same convention `ColumnDef` uses), at most one
//! `ProcResultShape` node describing an OUT/SELECT result shape, and then
//! the body's statements directly (a declaration with no body simply has
//! none).
//!
//! `InsertStmt`/`UpdateStmt`/`DeleteStmt`/`UpsertStmt` follow the same
//! `left` = target table `Id`, `right` = chain convention; an `UPDATE`'s
//! chain holds `UpdateSetItem`s, an `UPSERT`'s holds the insert values plus
//! an `OnConflictClause`, and any of them may additionally carry a single
//! `WhereClause` element (its `left` the predicate) mixed into the same
//! chain, the way `CreateTable`/`CreateProc` already mix element kinds.

use std::rc::Rc;

use cql_core::ast::{AstKind, NodePayload};
use cql_core::errors::{codes, SemanticError};
use cql_core::sem::{CoreType, SemFlags, SemanticRecord, StructDescriptor};
use cql_core::NodeId;
use smol_str::SmolStr;

use super::{is_poisoned, mark_ok, poison};
use crate::context::CompilationContext;
use crate::registries::{DependencySets, ProcInfo};
use crate::resolver::Scope;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    Declared,
    OpenedStatementBound,
    OpenedValueBound,
    HasRow,
    FetchedInto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutUnionState {
    NotYetEmitted,
    EmittedAtLeastOnce,
}

fn id_text(ctx: &CompilationContext, id: NodeId) -> Option<SmolStr> {
    match &ctx.arena.get(id).payload {
        NodePayload::Str { value, .. } => Some(value.clone()),
        _ => None,
    }
}

fn field_descriptor(ctx: &mut CompilationContext, param: NodeId) -> Option<cql_core::sem::ColumnDescriptor> {
    let name_node = ctx.arena.get(param).left()?;
    let name = id_text(ctx, name_node)?;
    let sem = ctx.arena.get(param).sem.clone().unwrap_or_default();
    mark_ok(ctx, param, (*sem).clone());
    Some(cql_core::sem::ColumnDescriptor {
        name,
        kind: sem.kind.clone(),
        sem_type: sem.core_type,
        flags: sem.flags,
    })
}

/// Splits a `CreateProc`/`DeclareProc`-style chain into `(params,
/// result_shape, body_statements)` per the module-level shape convention.
fn split_signature(
    ctx: &mut CompilationContext,
    chain_head: Option<NodeId>,
) -> (Vec<cql_core::sem::ColumnDescriptor>, Option<Rc<StructDescriptor>>, Vec<NodeId>) {
    let mut params = Vec::new();
    let mut result = None;
    let mut body = Vec::new();
    let mut in_body = false;

    for item in ctx.arena.chain_elements(chain_head) {
        if !in_body {
            match ctx.arena.get(item).kind {
                AstKind::Param => {
                    if let Some(p) = field_descriptor(ctx, item) {
                        params.push(p);
                    }
                    continue;
                }
                AstKind::ProcResultShape => {
                    let mut cols = Vec::new();
                    for field in ctx.arena.chain_elements(ctx.arena.get(item).right()) {
                        if let Some(c) = field_descriptor(ctx, field) {
                            cols.push(c);
                        }
                    }
                    result = Some(Rc::new(StructDescriptor {
                        name: "result".into(),
                        columns: cols,
                        is_backed: false,
                    }));
                    continue;
                }
                _ => {
                    in_body = true;
                }
            }
        }
        body.push(item);
    }
    (params, result, body)
}

fn register_proc(
    ctx: &mut CompilationContext,
    id: NodeId,
    name: SmolStr,
    params: Vec<cql_core::sem::ColumnDescriptor>,
    result: Option<Rc<StructDescriptor>>,
    body: &[NodeId],
) {
    let args = Rc::new(StructDescriptor {
        name: format!("{name}_args").into(),
        columns: params,
        is_backed: false,
    });

    let mut deps = DependencySets::default();
    for stmt in body {
        super::dependency::collect(ctx, *stmt, &mut deps);
    }

    ctx.registries.procedures.insert(
        name.clone(),
        ProcInfo {
            name: name.clone(),
            args: args.clone(),
            result: result.clone(),
            body: id,
            deps,
            region: None,
            is_shared_fragment: false,
        },
    );

    let mut record = SemanticRecord::of_type(if result.is_some() { CoreType::Struct } else { CoreType::Ok });
    record.name = Some(name);
    record.struct_desc = result;
    mark_ok(ctx, id, record);
}

pub fn analyze_create_proc(ctx: &mut CompilationContext, id: NodeId) {
    let Some(name_node) = ctx.arena.get(id).left() else {
        poison(ctx, id, SemanticError::new(codes::NAME_NOT_FOUND, "proc missing a name", ""));
        return;
    };
    let Some(name) = id_text(ctx, name_node) else {
        poison(ctx, id, SemanticError::new(codes::NAME_NOT_FOUND, "proc name is not an identifier", ""));
        return;
    };
    if ctx.registries.procedures.contains_key(name.as_str()) {
        poison(ctx, id, SemanticError::new(codes::DUPLICATE_NAME, "procedure already declared", name.as_str()));
        return;
    }

    let (params, result, body) = split_signature(ctx, ctx.arena.get(id).right());
    let proc_formals = Rc::new(StructDescriptor {
        name: format!("{name}_args").into(),
        columns: params.clone(),
        is_backed: false,
    });

    let scope = Scope {
        proc_formals: Some(proc_formals),
        current_proc: Some(name.clone()),
        ..Scope::default()
    };
    for stmt in &body {
        super::analyze_statement(ctx, *stmt, &scope);
    }

    register_proc(ctx, id, name, params, result, &body);
}

pub fn analyze_declaration(ctx: &mut CompilationContext, id: NodeId) {
    let Some(name_node) = ctx.arena.get(id).left() else {
        poison(ctx, id, SemanticError::new(codes::NAME_NOT_FOUND, "declaration missing a name", ""));
        return;
    };
    let Some(name) = id_text(ctx, name_node) else {
        poison(ctx, id, SemanticError::new(codes::NAME_NOT_FOUND, "declaration name is not an identifier", ""));
        return;
    };

    let (params, result, _body) = split_signature(ctx, ctx.arena.get(id).right());
    let args = Rc::new(StructDescriptor {
        name: format!("{name}_args").into(),
        columns: params,
        is_backed: false,
    });
    let return_type = result
        .as_ref()
        .and_then(|r| r.columns.first())
        .map(|c| c.sem_type)
        .unwrap_or(CoreType::Pending);

    let info = crate::registries::FunctionInfo {
        name: name.clone(),
        params: args,
        return_type,
    };

    match ctx.arena.get(id).kind {
        AstKind::DeclareFunc => {
            ctx.registries.functions.insert(name.clone(), info);
        }
        AstKind::DeclareSelectFunc => {
            ctx.registries.select_functions.insert(name.clone(), info);
        }
        AstKind::DeclareProc => {
            ctx.registries.procedures.insert(
                name.clone(),
                ProcInfo {
                    name: name.clone(),
                    args: info.params,
                    result,
                    body: id,
                    deps: DependencySets::default(),
                    region: None,
                    is_shared_fragment: false,
                },
            );
        }
        _ => {}
    }

    mark_ok(ctx, id, SemanticRecord::of_type(CoreType::Ok));
}

/// `IF cond THEN body [ELSE IF ...] [ELSE ...]` (spec §4.6 item 5): the
/// condition is analyzed under the incoming scope, then each branch gets a
/// nullability-refined scope for the duration of its own body only — the
/// refinement never survives past the `IF` statement (spec §3.2 monotone
/// invariant, dropped rather than merged at the join point).
pub fn analyze_if_stmt(ctx: &mut CompilationContext, id: NodeId, scope: &Scope) {
    let Some(cond) = ctx.arena.get(id).left() else {
        poison(ctx, id, SemanticError::new(codes::TYPE_MISMATCH, "if missing a condition", ""));
        return;
    };
    super::expr::analyze_expr(ctx, cond, scope);

    let mut refined = scope.locals.clone();
    if let Some(name) = super::nullability::provably_not_null(ctx, cond) {
        refined.insert(name, cql_core::sem::CoreType::Int64);
    }
    let then_scope = Scope {
        locals: refined,
        proc_formals: scope.proc_formals.clone(),
        arg_bundles: scope.arg_bundles.clone(),
        cursor_fields: scope.cursor_fields.clone(),
        join: scope.join.clone(),
        outer_join: scope.outer_join.clone(),
        region_list_context: scope.region_list_context,
        current_proc: scope.current_proc.clone(),
    };

    for branch in ctx.arena.chain_elements(ctx.arena.get(id).right()) {
        match ctx.arena.get(branch).kind {
            AstKind::ElseClause | AstKind::ElseIfClause => {
                for stmt in ctx.arena.chain_elements(ctx.arena.get(branch).right()) {
                    super::analyze_statement(ctx, stmt, scope);
                }
            }
            _ => super::analyze_statement(ctx, branch, &then_scope),
        }
    }

    mark_ok(ctx, id, SemanticRecord::of_type(CoreType::Ok));
}

pub fn analyze_loop(ctx: &mut CompilationContext, id: NodeId, scope: &Scope) {
    if let Some(cond) = ctx.arena.get(id).left() {
        super::expr::analyze_expr(ctx, cond, scope);
    }
    for stmt in ctx.arena.chain_elements(ctx.arena.get(id).right()) {
        super::analyze_statement(ctx, stmt, scope);
    }
    mark_ok(ctx, id, SemanticRecord::of_type(CoreType::Ok));
}

/// `INSERT`/`UPDATE`/`DELETE`/`UPSERT` (spec §4.6 item 2): validates the
/// target exists and type-checks the value expressions against its shape.
/// Dependency bookkeeping happens once per procedure body in
/// [`register_proc`], not per statement, so it isn't repeated here.
pub fn analyze_dml(ctx: &mut CompilationContext, id: NodeId, scope: &Scope) {
    let kind = ctx.arena.get(id).kind;
    let Some(name_node) = ctx.arena.get(id).left() else {
        poison(ctx, id, SemanticError::new(codes::NAME_NOT_FOUND, "statement missing a target table", ""));
        return;
    };
    let Some(name) = id_text(ctx, name_node) else {
        poison(ctx, id, SemanticError::new(codes::NAME_NOT_FOUND, "target is not a table name", ""));
        return;
    };

    let Some(entry) = ctx.registries.tables.get(name.as_str()).cloned() else {
        poison(ctx, id, SemanticError::new(codes::NAME_NOT_FOUND, "unknown table", name.as_str()));
        return;
    };

    if kind == AstKind::UpsertStmt {
        let has_key_conflict_target = entry
            .descriptor
            .columns
            .iter()
            .any(|c| c.flags.intersects(SemFlags::PK | SemFlags::UK));
        if !has_key_conflict_target {
            poison(
                ctx,
                id,
                SemanticError::new(
                    codes::UPSERT_CONFLICT_NOT_KEY,
                    "upsert target has no primary or unique key to conflict on",
                    name.as_str(),
                ),
            );
            return;
        }
    }

    // A `WHERE`/`ON CONFLICT` clause rides along as an ordinary element of
    // the statement's right-chain (the same mixed-kind right-chain
    // convention `CreateTable`/`CreateProc` already use), so it shows up in
    // `chain_elements` next to the value/set items rather than in a
    // dedicated field.
    let elements = ctx.arena.chain_elements(ctx.arena.get(id).right());
    let where_expr = elements
        .iter()
        .copied()
        .find(|&e| ctx.arena.get(e).kind == AstKind::WhereClause)
        .and_then(|w| ctx.arena.get(w).left());
    let value_elements: Vec<NodeId> = elements
        .iter()
        .copied()
        .filter(|&e| !matches!(ctx.arena.get(e).kind, AstKind::WhereClause | AstKind::OnConflictClause))
        .collect();

    // Backed-table rewrite (spec §4.7.4) is applied in place: the original
    // node's kind/payload are overwritten with the synthesized
    // `cql_blob_*` call so the enclosing statement list still points at the
    // same node id. INSERT/UPSERT rewrite the value list; UPDATE/DELETE need
    // the WHERE predicate as the pk expression, so they only rewrite once
    // one is present.
    if let Some(backing) = entry.backed_by.clone() {
        let hash = crate::rewriter::backed_tables::type_hash(&entry.descriptor);
        let rewritten = match kind {
            AstKind::InsertStmt | AstKind::UpsertStmt => {
                set_right_chain(ctx, id, &value_elements);
                Some(crate::rewriter::backed_tables::rewrite_insert(ctx, id, backing.as_str(), hash))
            }
            AstKind::UpdateStmt => where_expr.map(|pk_expr| {
                set_right_chain(ctx, id, &value_elements);
                crate::rewriter::backed_tables::rewrite_update(ctx, id, backing.as_str(), hash, pk_expr)
            }),
            AstKind::DeleteStmt => {
                where_expr.map(|pk_expr| crate::rewriter::backed_tables::rewrite_delete(ctx, id, backing.as_str(), pk_expr))
            }
            _ => None,
        };
        if let Some(rewritten) = rewritten {
            let new_node = ctx.arena.get(rewritten).clone();
            ctx.arena.get_mut(id).kind = new_node.kind;
            ctx.arena.get_mut(id).payload = new_node.payload;
        }
    }

    for expr in value_elements {
        analyze_dml_value_node(ctx, expr, scope);
    }
    if let Some(where_clause) = elements.into_iter().find(|&e| ctx.arena.get(e).kind == AstKind::WhereClause) {
        analyze_dml_value_node(ctx, where_clause, scope);
    }

    let mut record = SemanticRecord::of_type(CoreType::Ok);
    record.name = Some(name);
    mark_ok(ctx, id, record);
}

/// Rebuilds `id`'s right-chain from `elements` (dropping whatever spine
/// nodes were there before), so a backed-table rewrite sees only the
/// value/set items and not the `WHERE`/`ON CONFLICT` clause mixed in
/// alongside them.
fn set_right_chain(ctx: &mut CompilationContext, id: NodeId, elements: &[NodeId]) {
    let mut tail = None;
    for &e in elements.iter().rev() {
        tail = Some(ctx.arena.new_chain_node(AstKind::ExprList, e, tail));
    }
    ctx.arena.set_right(id, tail);
}

fn analyze_dml_value_node(ctx: &mut CompilationContext, node: NodeId, scope: &Scope) {
    match ctx.arena.get(node).kind {
        AstKind::UpdateSetItem => {
            if let Some(value) = ctx.arena.get(node).right() {
                super::expr::analyze_expr(ctx, value, scope);
            }
            mark_ok(ctx, node, SemanticRecord::of_type(CoreType::Ok));
        }
        AstKind::WhereClause => {
            if let Some(pred) = ctx.arena.get(node).left() {
                super::expr::analyze_expr(ctx, pred, scope);
            }
            mark_ok(ctx, node, SemanticRecord::of_type(CoreType::Ok));
        }
        _ => {
            super::expr::analyze_expr(ctx, node, scope);
        }
    }
}

/// Advances the cursor state machine (spec §4.6 item 6): `DECLARE CURSOR`
/// creates it in `Declared`; `OPEN` moves it to one of the two opened
/// states depending on whether it is statement-bound (a `SELECT`) or
/// value-bound (`LIKE`); `FETCH`/`FETCH INTO` requires an opened cursor and
/// leaves it `HasRow`/`FetchedInto`; `CLOSE` is legal from any state.
pub fn advance_cursor(ctx: &mut CompilationContext, id: NodeId) {
    let kind = ctx.arena.get(id).kind;
    let Some(name_node) = ctx.arena.get(id).left() else { return };
    let Some(name) = id_text(ctx, name_node) else { return };

    match kind {
        AstKind::DeclareCursor | AstKind::DeclareCursorLike | AstKind::DeclareValueCursor => {
            ctx.cursor_value_bound
                .insert(name.clone(), kind == AstKind::DeclareValueCursor);
            ctx.cursor_states.insert(name, CursorState::Declared);
        }
        AstKind::OpenStmt => {
            let target = if ctx.cursor_value_bound.get(name.as_str()).copied().unwrap_or(false) {
                CursorState::OpenedValueBound
            } else {
                CursorState::OpenedStatementBound
            };
            ctx.cursor_states.insert(name, target);
        }
        AstKind::FetchStmt => match ctx.cursor_states.get(name.as_str()) {
            Some(CursorState::OpenedStatementBound) | Some(CursorState::HasRow) => {
                ctx.cursor_states.insert(name, CursorState::HasRow);
            }
            _ => {
                poison(
                    ctx,
                    id,
                    SemanticError::new(codes::CURSOR_STATE, "fetch on a cursor that is not open", name.as_str()),
                );
            }
        },
        AstKind::FetchIntoStmt => {
            ctx.cursor_states.insert(name, CursorState::FetchedInto);
        }
        AstKind::CloseStmt => {
            ctx.cursor_states.shift_remove(&name);
        }
        _ => {}
    }
}

/// Advances an out-union proc's emission state machine (spec §4.6 item 6):
/// mixing `OUT` and `OUT UNION` in the same proc is forbidden, and the
/// first `OUT UNION` flips it from `NotYetEmitted` to
/// `EmittedAtLeastOnce`.
pub fn advance_out_union(ctx: &mut CompilationContext, id: NodeId, proc_name: &str) {
    let kind = ctx.arena.get(id).kind;
    let entry = ctx
        .out_union_states
        .entry(proc_name.into())
        .or_insert(OutUnionState::NotYetEmitted);

    match kind {
        AstKind::OutStmt => {
            if *entry == OutUnionState::EmittedAtLeastOnce {
                poison(
                    ctx,
                    id,
                    SemanticError::new(codes::OUT_OUT_UNION_MIX, "cannot mix OUT with OUT UNION in the same procedure", proc_name),
                );
            }
        }
        AstKind::OutUnionStmt | AstKind::OutUnionParentChildStmt => {
            *entry = OutUnionState::EmittedAtLeastOnce;
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CompileOptions;
    use cql_core::ast::StrSubtype;
    use cql_core::location::SourceLocation;
    use cql_core::sem::{ColumnDescriptor, SemFlags};

    fn loc() -> SourceLocation {
        SourceLocation::new("t.sql", 1)
    }

    #[test]
    fn create_proc_registers_args_and_body_deps() {
        let mut ctx = CompilationContext::new(CompileOptions::default());
        ctx.registries.tables.insert(
            "widgets".into(),
            crate::registries::TableInfoEntry {
                name: "widgets".into(),
                descriptor: Rc::new(StructDescriptor {
                    name: "widgets".into(),
                    columns: vec![ColumnDescriptor {
                        name: "id".into(),
                        kind: None,
                        sem_type: CoreType::Int64,
                        flags: SemFlags::PK,
                    }],
                    is_backed: false,
                }),
                node: ctx.arena.new_leafless(AstKind::CreateTable, loc()),
                backed_by: None,
                create_version: None,
                delete_version: None,
                recreate_group: None,
                foreign_keys: vec![],
            },
        );

        let proc_name = ctx.arena.new_str(loc(), "p1", StrSubtype::Id);
        ctx.arena.get_mut(proc_name).kind = AstKind::Id;

        let table_name = ctx.arena.new_str(loc(), "widgets", StrSubtype::Id);
        ctx.arena.get_mut(table_name).kind = AstKind::Id;
        let insert = ctx.arena.new_unary(AstKind::InsertStmt, loc(), table_name);
        let body_chain = ctx.arena.new_unary(AstKind::StmtList, loc(), insert);

        // `right` is the chain directly (here: just the one body statement),
        // per the module shape convention.
        let proc = ctx.arena.new_binary(AstKind::CreateProc, loc(), proc_name, body_chain);

        analyze_create_proc(&mut ctx, proc);
        assert!(!is_poisoned(&ctx, proc));
        assert!(ctx.registries.procedures.contains_key("p1"));
        let info = &ctx.registries.procedures["p1"];
        assert_eq!(info.deps.insert_tables, vec![SmolStr::from("widgets")]);
    }

    #[test]
    fn upsert_without_key_is_rejected() {
        let mut ctx = CompilationContext::new(CompileOptions::default());
        ctx.registries.tables.insert(
            "nokeys".into(),
            crate::registries::TableInfoEntry {
                name: "nokeys".into(),
                descriptor: Rc::new(StructDescriptor {
                    name: "nokeys".into(),
                    columns: vec![ColumnDescriptor {
                        name: "v".into(),
                        kind: None,
                        sem_type: CoreType::Int64,
                        flags: SemFlags::empty(),
                    }],
                    is_backed: false,
                }),
                node: ctx.arena.new_leafless(AstKind::CreateTable, loc()),
                backed_by: None,
                create_version: None,
                delete_version: None,
                recreate_group: None,
                foreign_keys: vec![],
            },
        );
        let table_name = ctx.arena.new_str(loc(), "nokeys", StrSubtype::Id);
        ctx.arena.get_mut(table_name).kind = AstKind::Id;
        let upsert = ctx.arena.new_unary(AstKind::UpsertStmt, loc(), table_name);
        let scope = Scope::default();
        analyze_dml(&mut ctx, upsert, &scope);
        assert!(is_poisoned(&ctx, upsert));
    }

    #[test]
    fn insert_into_backed_table_is_rewritten_to_blob_create() {
        let mut ctx = CompilationContext::new(CompileOptions::default());
        ctx.registries.tables.insert(
            "prefs".into(),
            crate::registries::TableInfoEntry {
                name: "prefs".into(),
                descriptor: Rc::new(StructDescriptor {
                    name: "prefs".into(),
                    columns: vec![ColumnDescriptor {
                        name: "id".into(),
                        kind: None,
                        sem_type: CoreType::Int64,
                        flags: SemFlags::PK,
                    }],
                    is_backed: true,
                }),
                node: ctx.arena.new_leafless(AstKind::CreateTable, loc()),
                backed_by: Some("prefs_backing".into()),
                create_version: None,
                delete_version: None,
                recreate_group: None,
                foreign_keys: vec![],
            },
        );
        let table_name = ctx.arena.new_str(loc(), "prefs", StrSubtype::Id);
        ctx.arena.get_mut(table_name).kind = AstKind::Id;
        let insert = ctx.arena.new_unary(AstKind::InsertStmt, loc(), table_name);
        let scope = Scope::default();
        analyze_dml(&mut ctx, insert, &scope);
        assert!(!is_poisoned(&ctx, insert));
        assert_eq!(ctx.arena.get(insert).kind, AstKind::CallStmt);
    }

    #[test]
    fn update_of_backed_table_is_rewritten_to_blob_update() {
        let mut ctx = CompilationContext::new(CompileOptions::default());
        ctx.registries.tables.insert(
            "prefs".into(),
            crate::registries::TableInfoEntry {
                name: "prefs".into(),
                descriptor: Rc::new(StructDescriptor {
                    name: "prefs".into(),
                    columns: vec![ColumnDescriptor {
                        name: "id".into(),
                        kind: None,
                        sem_type: CoreType::Int64,
                        flags: SemFlags::PK,
                    }],
                    is_backed: true,
                }),
                node: ctx.arena.new_leafless(AstKind::CreateTable, loc()),
                backed_by: Some("prefs_backing".into()),
                create_version: None,
                delete_version: None,
                recreate_group: None,
                foreign_keys: vec![],
            },
        );
        let table_name = ctx.arena.new_str(loc(), "prefs", StrSubtype::Id);
        ctx.arena.get_mut(table_name).kind = AstKind::Id;

        let pk_lit = ctx.arena.new_int(loc(), 1);
        let pred = ctx.arena.new_binary(AstKind::Eq, loc(), pk_lit, pk_lit);
        let where_clause = ctx.arena.new_unary(AstKind::WhereClause, loc(), pred);

        let value = ctx.arena.new_int(loc(), 2);
        let set_item = ctx.arena.new_unary(AstKind::UpdateSetItem, loc(), value);
        let where_tail = ctx.arena.new_chain_node(AstKind::ExprList, where_clause, None);
        let set_chain = ctx.arena.new_chain_node(AstKind::ExprList, set_item, Some(where_tail));

        let update = ctx.arena.new_binary(AstKind::UpdateStmt, loc(), table_name, set_chain);
        let scope = Scope::default();
        analyze_dml(&mut ctx, update, &scope);
        assert!(!is_poisoned(&ctx, update));
        assert_eq!(ctx.arena.get(update).kind, AstKind::CallStmt);
    }

    #[test]
    fn update_of_backed_table_without_where_is_left_unrewritten() {
        let mut ctx = CompilationContext::new(CompileOptions::default());
        ctx.registries.tables.insert(
            "prefs".into(),
            crate::registries::TableInfoEntry {
                name: "prefs".into(),
                descriptor: Rc::new(StructDescriptor {
                    name: "prefs".into(),
                    columns: vec![ColumnDescriptor {
                        name: "id".into(),
                        kind: None,
                        sem_type: CoreType::Int64,
                        flags: SemFlags::PK,
                    }],
                    is_backed: true,
                }),
                node: ctx.arena.new_leafless(AstKind::CreateTable, loc()),
                backed_by: Some("prefs_backing".into()),
                create_version: None,
                delete_version: None,
                recreate_group: None,
                foreign_keys: vec![],
            },
        );
        let table_name = ctx.arena.new_str(loc(), "prefs", StrSubtype::Id);
        ctx.arena.get_mut(table_name).kind = AstKind::Id;
        let value = ctx.arena.new_int(loc(), 2);
        let set_item = ctx.arena.new_unary(AstKind::UpdateSetItem, loc(), value);
        let set_chain = ctx.arena.new_chain_node(AstKind::ExprList, set_item, None);
        let update = ctx.arena.new_binary(AstKind::UpdateStmt, loc(), table_name, set_chain);
        let scope = Scope::default();
        analyze_dml(&mut ctx, update, &scope);
        assert!(!is_poisoned(&ctx, update));
        assert_eq!(ctx.arena.get(update).kind, AstKind::UpdateStmt);
    }

    #[test]
    fn delete_from_backed_table_is_rewritten_to_blob_delete() {
        let mut ctx = CompilationContext::new(CompileOptions::default());
        ctx.registries.tables.insert(
            "prefs".into(),
            crate::registries::TableInfoEntry {
                name: "prefs".into(),
                descriptor: Rc::new(StructDescriptor {
                    name: "prefs".into(),
                    columns: vec![ColumnDescriptor {
                        name: "id".into(),
                        kind: None,
                        sem_type: CoreType::Int64,
                        flags: SemFlags::PK,
                    }],
                    is_backed: true,
                }),
                node: ctx.arena.new_leafless(AstKind::CreateTable, loc()),
                backed_by: Some("prefs_backing".into()),
                create_version: None,
                delete_version: None,
                recreate_group: None,
                foreign_keys: vec![],
            },
        );
        let table_name = ctx.arena.new_str(loc(), "prefs", StrSubtype::Id);
        ctx.arena.get_mut(table_name).kind = AstKind::Id;
        let pk_lit = ctx.arena.new_int(loc(), 1);
        let pred = ctx.arena.new_binary(AstKind::Eq, loc(), pk_lit, pk_lit);
        let where_clause = ctx.arena.new_unary(AstKind::WhereClause, loc(), pred);
        let where_chain = ctx.arena.new_chain_node(AstKind::ExprList, where_clause, None);
        let delete = ctx.arena.new_binary(AstKind::DeleteStmt, loc(), table_name, where_chain);
        let scope = Scope::default();
        analyze_dml(&mut ctx, delete, &scope);
        assert!(!is_poisoned(&ctx, delete));
        assert_eq!(ctx.arena.get(delete).kind, AstKind::CallStmt);
    }

    #[test]
    fn fetch_without_open_is_a_cursor_state_error() {
        let mut ctx = CompilationContext::new(CompileOptions::default());
        let cursor_name = ctx.arena.new_str(loc(), "c", StrSubtype::Id);
        ctx.arena.get_mut(cursor_name).kind = AstKind::Id;
        let fetch = ctx.arena.new_unary(AstKind::FetchStmt, loc(), cursor_name);
        advance_cursor(&mut ctx, fetch);
        assert!(is_poisoned(&ctx, fetch));
    }
}
