//! Nullability inference (spec §4.6 item 4): `x IS NOT NULL`, `x = y`
//! (one side a not-null literal), and `IF x IS NOT NULL THEN …` promote `x`
//! to inferred-not-null on the corresponding branch. Re-assignment or
//! passing `x` to an out-parameter demotes it. The invariant (spec §3.2)
//! is monotone: inferred-not-null may be added along a path that proves
//! it, never removed within that path — so this is a set that only grows
//! as you walk deeper into a branch, and is explicitly dropped (not
//! merged) when control flow rejoins outside the branch.

use cql_core::ast::AstKind;
use cql_core::NodeId;
use cql_helpers::IndexSet;
use smol_str::SmolStr;

use crate::context::CompilationContext;

#[derive(Debug, Clone, Default)]
pub struct NullabilityState {
    not_null: IndexSet<SmolStr>,
}

impl NullabilityState {
    pub fn promote(&mut self, name: SmolStr) {
        self.not_null.insert(name);
    }

    pub fn demote(&mut self, name: &str) {
        self.not_null.shift_remove(name);
    }

    pub fn is_not_null(&self, name: &str) -> bool {
        self.not_null.contains(name)
    }

    /// Returns a copy extended with whatever `cond` proves, for use on the
    /// branch taken when `cond` is true. Returns `self` unchanged (cloned)
    /// if `cond` proves nothing recognizable.
    pub fn refined_for_true_branch(&self, ctx: &CompilationContext, cond: NodeId) -> Self {
        let mut refined = self.clone();
        if let Some(name) = provably_not_null(ctx, cond) {
            refined.promote(name);
        }
        refined
    }
}

fn id_name(ctx: &CompilationContext, id: NodeId) -> Option<SmolStr> {
    if ctx.arena.get(id).kind != AstKind::Id {
        return None;
    }
    match &ctx.arena.get(id).payload {
        cql_core::ast::NodePayload::Str { value, .. } => Some(value.clone()),
        _ => None,
    }
}

/// Recognizes `x IS NOT NULL` and `x = <not-null literal>` (either operand
/// order), returning the proven-not-null variable name if found.
pub fn provably_not_null(ctx: &CompilationContext, cond: NodeId) -> Option<SmolStr> {
    let node = ctx.arena.get(cond);
    match node.kind {
        AstKind::IsNotNull => id_name(ctx, node.left()?),
        AstKind::Eq => {
            let l = node.left()?;
            let r = node.right()?;
            if let Some(name) = id_name(ctx, l) {
                if matches!(ctx.arena.get(r).kind, AstKind::IntLit | AstKind::NumLit | AstKind::StrLit) {
                    return Some(name);
                }
            }
            if let Some(name) = id_name(ctx, r) {
                if matches!(ctx.arena.get(l).kind, AstKind::IntLit | AstKind::NumLit | AstKind::StrLit) {
                    return Some(name);
                }
            }
            None
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CompileOptions;
    use cql_core::ast::NumKind;
    use cql_core::location::SourceLocation;

    fn loc() -> SourceLocation {
        SourceLocation::new("t.sql", 1)
    }

    #[test]
    fn is_not_null_predicate_promotes_variable() {
        let mut ctx = CompilationContext::new(CompileOptions::default());
        let x = ctx.arena.new_str(loc(), "x", cql_core::ast::StrSubtype::Id);
        ctx.arena.get_mut(x).kind = AstKind::Id;
        let cond = ctx.arena.new_unary(AstKind::IsNotNull, loc(), x);
        let name = provably_not_null(&ctx, cond).unwrap();
        assert_eq!(name.as_str(), "x");
    }

    #[test]
    fn equality_with_literal_promotes_variable() {
        let mut ctx = CompilationContext::new(CompileOptions::default());
        let x = ctx.arena.new_str(loc(), "x", cql_core::ast::StrSubtype::Id);
        ctx.arena.get_mut(x).kind = AstKind::Id;
        let one = ctx.arena.new_num(loc(), "1", NumKind::Int);
        let cond = ctx.arena.new_binary(AstKind::Eq, loc(), x, one);
        assert_eq!(provably_not_null(&ctx, cond).unwrap().as_str(), "x");
    }

    #[test]
    fn unrelated_condition_proves_nothing() {
        let mut ctx = CompilationContext::new(CompileOptions::default());
        let x = ctx.arena.new_str(loc(), "x", cql_core::ast::StrSubtype::Id);
        ctx.arena.get_mut(x).kind = AstKind::Id;
        let y = ctx.arena.new_str(loc(), "y", cql_core::ast::StrSubtype::Id);
        ctx.arena.get_mut(y).kind = AstKind::Id;
        let cond = ctx.arena.new_binary(AstKind::Lt, loc(), x, y);
        assert!(provably_not_null(&ctx, cond).is_none());
    }
}
