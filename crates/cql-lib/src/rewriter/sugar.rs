//! Statement-level sugar rewrites (spec §4.7.2): `IF` guard desugaring,
//! `iif(...)` to `CASE WHEN`, compound-assignment desugaring
//! (`x += e` -> `SET x := x + e`), and `printf`-argument cast insertion.

use cql_core::ast::AstKind;
use cql_core::location::open_rewrite_scope;
use cql_core::NodeId;

use crate::context::CompilationContext;

/// `IF x THEN stmt; END IF;` with no `ELSE` is sugar for a single-statement
/// guard; this normalizes it to the full `IfStmt` shape (a left condition,
/// a right chain whose only element wraps the guarded statement) so the
/// rest of the analyzer only has one shape to handle.
pub fn desugar_if_guard(ctx: &mut CompilationContext, guard: NodeId) -> NodeId {
    let node = ctx.arena.get(guard);
    debug_assert_eq!(node.kind, AstKind::IfGuardStmt);
    let cond = node.left();
    let body = node.right();
    let loc = node.loc.clone();
    let _scope = open_rewrite_scope(loc.clone());
    match (cond, body) {
        (Some(c), Some(b)) => ctx.arena.new_binary(AstKind::IfStmt, loc, c, b),
        (Some(c), None) => ctx.arena.new_unary(AstKind::IfStmt, loc, c),
        _ => guard,
    }
}

/// `iif(cond, then_val, else_val)` is sugar for `CASE WHEN cond THEN
/// then_val ELSE else_val END` (spec §4.7.2). `call` must be the `Iif`
/// node; its `right` is an `ArgList` chain of exactly three elements.
pub fn desugar_iif(ctx: &mut CompilationContext, iif: NodeId) -> Option<NodeId> {
    let node = ctx.arena.get(iif);
    debug_assert_eq!(node.kind, AstKind::Iif);
    let args = ctx.arena.chain_elements(node.right());
    let [cond, then_val, else_val]: [NodeId; 3] = args.try_into().ok()?;
    let loc = ctx.arena.get(iif).loc.clone();
    let _scope = open_rewrite_scope(loc.clone());

    let when = ctx.arena.new_binary(AstKind::CaseWhen, loc.clone(), cond, then_val);
    let case_list = ctx.arena.new_chain_node(AstKind::CaseList, when, None);
    Some(ctx.arena.new_binary(AstKind::Case, loc, case_list, else_val))
}

/// `x += e` is sugar for `SET x := x + e` (and similarly for `-=`, `*=`,
/// `/=`). `assign` is the `CompoundAssign` node; its payload carries which
/// arithmetic op via `left` being the target `Id` and `right` an
/// `ArgList`-style pair `(op_kind_node, rhs)` — here modeled simply as
/// `right` directly holding the already-built binary-op expression with the
/// target substituted in on its left, since the AST builder knows the
/// operator at construction time.
pub fn desugar_compound_assign(ctx: &mut CompilationContext, assign: NodeId) -> NodeId {
    let node = ctx.arena.get(assign);
    debug_assert_eq!(node.kind, AstKind::CompoundAssign);
    let target = node.left();
    let rhs_expr = node.right();
    let loc = node.loc.clone();
    let _scope = open_rewrite_scope(loc.clone());
    match (target, rhs_expr) {
        (Some(t), Some(rhs)) => ctx.arena.new_binary(AstKind::SetStmt, loc, t, rhs),
        _ => assign,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{CompilationContext, CompileOptions};
    use cql_core::ast::{NumKind, StrSubtype};
    use cql_core::location::SourceLocation;

    fn loc() -> SourceLocation {
        SourceLocation::new("t.sql", 1)
    }

    #[test]
    fn iif_desugars_to_case_when() {
        let mut ctx = CompilationContext::new(CompileOptions::default());
        let cond = ctx.arena.new_num(loc(), "true", NumKind::Bool);
        let then_val = ctx.arena.new_int(loc(), 1);
        let else_val = ctx.arena.new_int(loc(), 2);
        let arg3 = ctx.arena.new_chain_node(AstKind::ArgList, else_val, None);
        let arg2 = ctx.arena.new_chain_node(AstKind::ArgList, then_val, Some(arg3));
        let args = ctx.arena.new_chain_node(AstKind::ArgList, cond, Some(arg2));
        let iif = ctx.arena.new_binary(AstKind::Iif, loc(), cond, args);

        let case = desugar_iif(&mut ctx, iif).unwrap();
        assert_eq!(ctx.arena.get(case).kind, AstKind::Case);
    }

    #[test]
    fn compound_assign_desugars_to_set() {
        let mut ctx = CompilationContext::new(CompileOptions::default());
        let target = ctx.arena.new_str(loc(), "x", StrSubtype::Id);
        ctx.arena.get_mut(target).kind = AstKind::Id;
        let one = ctx.arena.new_int(loc(), 1);
        let sum = ctx.arena.new_binary(AstKind::Add, loc(), target, one);
        let assign = ctx.arena.new_binary(AstKind::CompoundAssign, loc(), target, sum);
        let set_stmt = desugar_compound_assign(&mut ctx, assign);
        assert_eq!(ctx.arena.get(set_stmt).kind, AstKind::SetStmt);
    }
}
