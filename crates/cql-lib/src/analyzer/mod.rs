//! Semantic analyzer (spec §4.6, component F). Dispatches per AST-node
//! kind; each handler records a provisional error on its own node, recurses
//! into children under the scope rules the node kind dictates, applies
//! kind-checking and nullability inference, registers declared objects, and
//! finally marks the node `Ok` or poisons it.

pub mod ddl;
pub mod dependency;
pub mod expr;
pub mod nullability;
pub mod proc;
pub mod versioning;

use cql_core::ast::AstKind;
use cql_core::errors::SemanticError;
use cql_core::sem::SemanticRecord;
use cql_core::NodeId;

use crate::context::CompilationContext;
use crate::resolver::Scope;

/// Top-level entry point (spec §9 "Global state"): `analyze(root, options)
/// -> context`. `root` is a `StmtList` chain; each statement is analyzed
/// independently so a failure in one does not stop analysis of the rest
/// (spec §4.6 "Failure semantics").
pub fn analyze(ctx: &mut CompilationContext, root: NodeId) {
    let statements = ctx.arena.chain_elements(Some(root));
    tracing::debug!(count = statements.len(), "analyzing statement list");
    for stmt in statements {
        let kind = ctx.arena.get(stmt).kind;
        let _span = tracing::debug_span!("analyze_statement", ?kind, node = stmt.index()).entered();
        let scope = Scope::default();
        analyze_statement(ctx, stmt, &scope);
        if is_poisoned(ctx, stmt) {
            tracing::debug!(?kind, "statement poisoned during analysis");
        }
    }
}

/// Poisons `id`'s semantic record with `error` and propagates: any ancestor
/// that later inspects this node's error state short-circuits further
/// analysis of its siblings (spec §3.2 "Error propagation").
pub fn poison(ctx: &mut CompilationContext, id: NodeId, error: SemanticError) {
    ctx.record_error(error.clone());
    ctx.arena.get_mut(id).sem = Some(Box::new(SemanticRecord::error(error.subject)));
}

pub fn mark_ok(ctx: &mut CompilationContext, id: NodeId, record: SemanticRecord) {
    ctx.arena.get_mut(id).sem = Some(Box::new(record));
}

pub fn is_poisoned(ctx: &CompilationContext, id: NodeId) -> bool {
    ctx.arena.get(id).is_error()
}

/// Dispatch table mapping AST tag to handler (spec §4.6). Statement-level
/// dispatch; expression-level dispatch lives in `expr::analyze_expr`.
pub fn analyze_statement(ctx: &mut CompilationContext, id: NodeId, scope: &Scope) {
    let kind = ctx.arena.get(id).kind;
    match kind {
        AstKind::CreateTable => ddl::analyze_create_table(ctx, id),
        AstKind::CreateView => ddl::analyze_create_view(ctx, id, scope),
        AstKind::CreateIndex => ddl::analyze_create_index(ctx, id),
        AstKind::CreateTrigger => ddl::analyze_create_trigger(ctx, id, scope),
        AstKind::DeclareRegion | AstKind::DeclareDeployableRegion => {
            ddl::analyze_declare_region(ctx, id)
        }
        AstKind::DeclareEnum => ddl::analyze_declare_enum(ctx, id),
        AstKind::DeclareConstGroup => ddl::analyze_declare_const_group(ctx, id),
        AstKind::CreateProc => proc::analyze_create_proc(ctx, id),
        AstKind::DeclareProc | AstKind::DeclareFunc | AstKind::DeclareSelectFunc => {
            proc::analyze_declaration(ctx, id)
        }
        AstKind::IfStmt => proc::analyze_if_stmt(ctx, id, scope),
        AstKind::WhileStmt | AstKind::LoopStmt => proc::analyze_loop(ctx, id, scope),
        AstKind::SelectStmt => {
            let _ = expr::analyze_select(ctx, id, scope);
        }
        AstKind::InsertStmt | AstKind::UpdateStmt | AstKind::DeleteStmt | AstKind::UpsertStmt => {
            proc::analyze_dml(ctx, id, scope)
        }
        AstKind::DeclareCursor | AstKind::DeclareCursorLike | AstKind::DeclareValueCursor
        | AstKind::OpenStmt | AstKind::FetchStmt | AstKind::FetchIntoStmt | AstKind::CloseStmt => {
            proc::advance_cursor(ctx, id);
            if !is_poisoned(ctx, id) {
                mark_ok(ctx, id, SemanticRecord::of_type(cql_core::sem::CoreType::Ok));
            }
        }
        AstKind::OutStmt | AstKind::OutUnionStmt | AstKind::OutUnionParentChildStmt => {
            let proc_name = scope.current_proc.clone().unwrap_or_default();
            proc::advance_out_union(ctx, id, &proc_name);
            if !is_poisoned(ctx, id) {
                mark_ok(ctx, id, SemanticRecord::of_type(cql_core::sem::CoreType::Ok));
            }
        }
        AstKind::CallStmt => {
            for arg in ctx.arena.chain_elements(ctx.arena.get(id).right()) {
                expr::analyze_expr(ctx, arg, scope);
            }
            mark_ok(ctx, id, SemanticRecord::of_type(cql_core::sem::CoreType::Ok));
        }
        AstKind::StmtList => {
            for s in ctx.arena.chain_elements(Some(id)) {
                analyze_statement(ctx, s, scope);
            }
        }
        _ => {
            // Statement kinds not covered by a dedicated handler (BEGIN/
            // COMMIT/ROLLBACK TRANSACTION, LET, SET, THROW, RETURN, LEAVE,
            // CONTINUE, ...) still get a baseline semantic record so
            // dependent analyses never see an un-analyzed node.
            mark_ok(ctx, id, SemanticRecord::of_type(cql_core::sem::CoreType::Ok));
        }
    }
}
