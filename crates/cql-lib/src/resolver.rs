//! Name resolution (spec §4.5): a chain of "try-resolve" stages, each
//! returning either "continue to next" or "stop (consumed, possibly with
//! error)". Per spec §9 "Error model", this uses a small `Continue | Stop`
//! enum rather than a fallible value, with errors recorded as a side effect
//! on the caller's node.

use std::rc::Rc;

use cql_core::errors::{codes, SemanticError};
use cql_core::sem::{ColumnDescriptor, JoinDescriptor, StructDescriptor};
use smol_str::SmolStr;

use crate::context::CompilationContext;

#[derive(Debug, Clone)]
pub enum Resolved {
    Local { sem_type: cql_core::sem::CoreType },
    ProcFormal { sem_type: cql_core::sem::CoreType },
    ArgBundleField { bundle: SmolStr, column: ColumnDescriptor },
    CursorField { cursor: SmolStr, column: ColumnDescriptor },
    JoinColumn { alias: SmolStr, column: ColumnDescriptor },
    OuterJoinColumn { alias: SmolStr, column: ColumnDescriptor },
    EnumMember { enum_name: SmolStr, value: i64 },
    ConstGroupMember { group: SmolStr, value: cql_core::sem::ConstValue },
    NamedTypeMember { type_name: SmolStr, column: ColumnDescriptor },
    GlobalVariable { sem_type: cql_core::sem::CoreType },
    ProcAsFunction { proc: SmolStr },
    DeclaredFunction { name: SmolStr },
    DeclaredSelectFunction { name: SmolStr },
    Region { name: SmolStr },
}

/// Outcome of a single resolution stage.
pub enum StageOutcome {
    /// This stage does not claim the name; try the next one.
    Continue,
    /// This stage claims the name. `Ok` on success, `Err` records the
    /// diagnostic and still stops the chain (no cascading "not found" on
    /// top of a more specific error).
    Stop(Result<Resolved, SemanticError>),
}

/// Per-statement scope: locals, the enclosing procedure's formals, any
/// active arg bundle, the active cursor (if in a cursor-scoped position),
/// and the current/outer FROM-clause joins. Built by the analyzer per
/// statement and handed to the resolver; this is intentionally flat rather
/// than a linked "scope chain" because CQL scoping is shallow (spec §4.5
/// lists a fixed stage order, not arbitrary nesting).
#[derive(Debug, Default)]
pub struct Scope {
    pub locals: cql_helpers::IndexMap<SmolStr, cql_core::sem::CoreType>,
    pub proc_formals: Option<Rc<StructDescriptor>>,
    pub arg_bundles: Vec<(SmolStr, Rc<StructDescriptor>)>,
    pub cursor_fields: Option<(SmolStr, Rc<StructDescriptor>)>,
    pub join: Option<Rc<JoinDescriptor>>,
    pub outer_join: Option<Rc<JoinDescriptor>>,
    pub region_list_context: bool,
    /// Name of the enclosing procedure, for the out-union state machine
    /// (spec §4.6 "Out-union state machine"), which is keyed per-proc.
    pub current_proc: Option<SmolStr>,
}

/// Runs the fixed stage order from spec §4.5 for an unqualified name.
pub fn resolve_unqualified(ctx: &CompilationContext, scope: &Scope, name: &str) -> StageOutcome {
    macro_rules! try_stage {
        ($outcome:expr) => {
            match $outcome {
                StageOutcome::Continue => {}
                stop => return stop,
            }
        };
    }

    try_stage!(stage_local(scope, name));
    try_stage!(stage_proc_formal(scope, name));
    try_stage!(stage_arg_bundle_field(scope, name));
    try_stage!(stage_cursor_field(scope, name));
    try_stage!(stage_join_column(scope, name));
    try_stage!(stage_outer_join_column(scope, name));
    try_stage!(stage_enum_member(ctx, name));
    try_stage!(stage_const_group_member(ctx, name));
    try_stage!(stage_named_type_member(ctx, name));
    try_stage!(stage_global_variable(ctx, name));
    try_stage!(stage_proc_as_function(ctx, name));
    try_stage!(stage_declared_function(ctx, name));
    try_stage!(stage_declared_select_function(ctx, name));
    if scope.region_list_context {
        try_stage!(stage_region(ctx, name));
    }

    StageOutcome::Stop(Err(SemanticError::new(
        codes::NAME_NOT_FOUND,
        "name not found",
        name,
    )))
}

/// Dotted name `A.B` (spec §4.5): alias-qualified column, else enum
/// member, else arg-bundle field, else a sugared object-method call left
/// for the rewriter (§4.7.3) to turn into a function call.
pub enum DottedOutcome {
    Column(ColumnDescriptor),
    EnumMember(i64),
    ArgBundleField(ColumnDescriptor),
    SugaredMethodCall,
    NotFound(SemanticError),
}

pub fn resolve_dotted(ctx: &CompilationContext, scope: &Scope, qualifier: &str, member: &str) -> DottedOutcome {
    if let Some(join) = &scope.join {
        if let Some(s) = join.find_alias(qualifier) {
            if let Some(col) = s.find_column(member) {
                return DottedOutcome::Column(col.clone());
            }
        }
    }
    if let Some(e) = ctx.registries.enums.get(qualifier) {
        if let Some(v) = e.values.get(member) {
            return DottedOutcome::EnumMember(*v);
        }
    }
    if let Some((_, bundle)) = scope.arg_bundles.iter().find(|(n, _)| n == qualifier) {
        if let Some(col) = bundle.find_column(member) {
            return DottedOutcome::ArgBundleField(col.clone());
        }
    }
    // An object with a registered operator for `:call:<member>` is sugar
    // for a method-style call; the rewriter turns `x.f(...)`/`x:f(...)`
    // dispatch into a plain function call (§4.7.3). We don't know here
    // whether the operator exists, only that this *shape* (qualifier not a
    // known alias/enum/bundle) falls through to that rewrite path.
    if ctx.registries.tables.contains_key(qualifier) || scope.proc_formals.is_some() {
        return DottedOutcome::SugaredMethodCall;
    }
    DottedOutcome::NotFound(SemanticError::new(
        codes::NAME_NOT_FOUND,
        "name not found",
        format!("{qualifier}.{member}"),
    ))
}

fn stage_local(scope: &Scope, name: &str) -> StageOutcome {
    match scope.locals.get(name) {
        Some(t) => StageOutcome::Stop(Ok(Resolved::Local { sem_type: *t })),
        None => StageOutcome::Continue,
    }
}

fn stage_proc_formal(scope: &Scope, name: &str) -> StageOutcome {
    if let Some(formals) = &scope.proc_formals {
        if let Some(col) = formals.find_column(name) {
            return StageOutcome::Stop(Ok(Resolved::ProcFormal { sem_type: col.sem_type }));
        }
    }
    StageOutcome::Continue
}

fn stage_arg_bundle_field(scope: &Scope, name: &str) -> StageOutcome {
    for (bundle_name, bundle) in &scope.arg_bundles {
        if let Some(col) = bundle.find_column(name) {
            return StageOutcome::Stop(Ok(Resolved::ArgBundleField {
                bundle: bundle_name.clone(),
                column: col.clone(),
            }));
        }
    }
    StageOutcome::Continue
}

fn stage_cursor_field(scope: &Scope, name: &str) -> StageOutcome {
    if let Some((cursor_name, fields)) = &scope.cursor_fields {
        if let Some(col) = fields.find_column(name) {
            return StageOutcome::Stop(Ok(Resolved::CursorField {
                cursor: cursor_name.clone(),
                column: col.clone(),
            }));
        }
    }
    StageOutcome::Continue
}

fn stage_join_column(scope: &Scope, name: &str) -> StageOutcome {
    let Some(join) = &scope.join else {
        return StageOutcome::Continue;
    };
    match join.resolve_unqualified(name) {
        Ok(Some((alias, col))) => StageOutcome::Stop(Ok(Resolved::JoinColumn {
            alias: alias.into(),
            column: col.clone(),
        })),
        Ok(None) => StageOutcome::Continue,
        Err(()) => StageOutcome::Stop(Err(SemanticError::new(
            codes::NAME_NOT_FOUND,
            "ambiguous column name",
            name,
        ))),
    }
}

fn stage_outer_join_column(scope: &Scope, name: &str) -> StageOutcome {
    let Some(join) = &scope.outer_join else {
        return StageOutcome::Continue;
    };
    match join.resolve_unqualified(name) {
        Ok(Some((alias, col))) => StageOutcome::Stop(Ok(Resolved::OuterJoinColumn {
            alias: alias.into(),
            column: col.clone(),
        })),
        Ok(None) => StageOutcome::Continue,
        Err(()) => StageOutcome::Stop(Err(SemanticError::new(
            codes::NAME_NOT_FOUND,
            "ambiguous correlated column name",
            name,
        ))),
    }
}

fn stage_enum_member(ctx: &CompilationContext, name: &str) -> StageOutcome {
    if let Some(e) = ctx.registries.enums.get(name) {
        return StageOutcome::Stop(Ok(Resolved::EnumMember {
            enum_name: e.name.clone(),
            value: 0,
        }));
    }
    StageOutcome::Continue
}

fn stage_const_group_member(ctx: &CompilationContext, name: &str) -> StageOutcome {
    if let Some(g) = ctx.registries.constant_groups.get(name) {
        return StageOutcome::Stop(Ok(Resolved::ConstGroupMember {
            group: g.name.clone(),
            value: cql_core::sem::ConstValue::Bool(false),
        }));
    }
    StageOutcome::Continue
}

fn stage_named_type_member(ctx: &CompilationContext, name: &str) -> StageOutcome {
    if let Some(t) = ctx.registries.named_types.get(name) {
        if let Some(col) = t.columns.first() {
            return StageOutcome::Stop(Ok(Resolved::NamedTypeMember {
                type_name: t.name.clone(),
                column: col.clone(),
            }));
        }
    }
    StageOutcome::Continue
}

fn stage_global_variable(ctx: &CompilationContext, name: &str) -> StageOutcome {
    if let Some(v) = ctx.registries.constants.get(name) {
        let sem_type = match v {
            cql_core::sem::ConstValue::Int(_) => cql_core::sem::CoreType::Int64,
            cql_core::sem::ConstValue::Real(_) => cql_core::sem::CoreType::Real,
            cql_core::sem::ConstValue::Bool(_) => cql_core::sem::CoreType::Bool,
            cql_core::sem::ConstValue::Text(_) => cql_core::sem::CoreType::Text,
        };
        return StageOutcome::Stop(Ok(Resolved::GlobalVariable { sem_type }));
    }
    StageOutcome::Continue
}

fn stage_proc_as_function(ctx: &CompilationContext, name: &str) -> StageOutcome {
    if let Some(p) = ctx.registries.procedures.get(name) {
        if p.result.is_some() {
            return StageOutcome::Stop(Ok(Resolved::ProcAsFunction { proc: p.name.clone() }));
        }
    }
    StageOutcome::Continue
}

fn stage_declared_function(ctx: &CompilationContext, name: &str) -> StageOutcome {
    if ctx.registries.functions.contains_key(name) || ctx.registries.unchecked_functions.contains_key(name) {
        return StageOutcome::Stop(Ok(Resolved::DeclaredFunction { name: name.into() }));
    }
    StageOutcome::Continue
}

fn stage_declared_select_function(ctx: &CompilationContext, name: &str) -> StageOutcome {
    if ctx.registries.select_functions.contains_key(name) {
        return StageOutcome::Stop(Ok(Resolved::DeclaredSelectFunction { name: name.into() }));
    }
    StageOutcome::Continue
}

fn stage_region(ctx: &CompilationContext, name: &str) -> StageOutcome {
    if ctx.registries.regions.contains_key(name) {
        return StageOutcome::Stop(Ok(Resolved::Region { name: name.into() }));
    }
    StageOutcome::Continue
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CompileOptions;

    #[test]
    fn local_shadows_global() {
        let ctx = CompilationContext::new(CompileOptions::default());
        let mut scope = Scope::default();
        scope.locals.insert("x".into(), cql_core::sem::CoreType::Int64);
        match resolve_unqualified(&ctx, &scope, "x") {
            StageOutcome::Stop(Ok(Resolved::Local { sem_type })) => {
                assert_eq!(sem_type, cql_core::sem::CoreType::Int64)
            }
            _ => panic!("expected local resolution"),
        }
    }

    #[test]
    fn unknown_name_is_not_found() {
        let ctx = CompilationContext::new(CompileOptions::default());
        let scope = Scope::default();
        match resolve_unqualified(&ctx, &scope, "nope") {
            StageOutcome::Stop(Err(e)) => assert_eq!(e.code, codes::NAME_NOT_FOUND),
            _ => panic!("expected not-found error"),
        }
    }

    #[test]
    fn ambiguous_join_column_stops_with_error() {
        let ctx = CompilationContext::new(CompileOptions::default());
        let t1 = Rc::new(StructDescriptor {
            name: "t1".into(),
            columns: vec![ColumnDescriptor {
                name: "id".into(),
                kind: None,
                sem_type: cql_core::sem::CoreType::Int64,
                flags: cql_core::sem::SemFlags::empty(),
            }],
            is_backed: false,
        });
        let t2 = Rc::new(StructDescriptor {
            name: "t2".into(),
            columns: vec![ColumnDescriptor {
                name: "id".into(),
                kind: None,
                sem_type: cql_core::sem::CoreType::Int64,
                flags: cql_core::sem::SemFlags::empty(),
            }],
            is_backed: false,
        });
        let mut scope = Scope::default();
        scope.join = Some(Rc::new(JoinDescriptor {
            scopes: vec![("a".into(), t1), ("b".into(), t2)],
        }));
        match resolve_unqualified(&ctx, &scope, "id") {
            StageOutcome::Stop(Err(e)) => assert_eq!(e.message, "ambiguous column name"),
            _ => panic!("expected ambiguity error"),
        }
    }
}
