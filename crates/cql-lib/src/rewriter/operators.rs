//! Operator dispatch table (spec §4.7.3): user-registered overloads of
//! builtin operators/method-style calls, looked up most-specific-first:
//! `<type>[<kind>]:<op>:<name>` -> `<type>[<kind>]:<op>:*` -> `<op>:<name>`
//! (type-erased) -> `<op>:*`. The first hit wins; a miss falls through to
//! the builtin behavior (spec §8 "operator lookup never errors on a
//! miss — only on an ambiguous *registration*").

use cql_core::sem::CoreType;
use smol_str::SmolStr;

use crate::context::CompilationContext;

fn type_key(sem_type: CoreType, kind: Option<&str>) -> String {
    match kind {
        Some(k) => format!("{sem_type:?}[{k}]"),
        None => format!("{sem_type:?}"),
    }
}

/// Registers `type[kind]:op:name -> replacement`, rejecting a duplicate
/// registration for the exact same key (spec §8).
pub fn register(
    ctx: &mut CompilationContext,
    sem_type: CoreType,
    kind: Option<&str>,
    op: &str,
    name: Option<&str>,
    replacement: SmolStr,
) -> Result<(), cql_core::errors::SemanticError> {
    let key = dispatch_key(&type_key(sem_type, kind), op, name);
    if ctx.registries.operator_dispatch.contains_key(key.as_str()) {
        return Err(cql_core::errors::SemanticError::new(
            cql_core::errors::codes::OPERATOR_NOT_FOUND,
            "operator already registered for this key",
            key,
        ));
    }
    ctx.registries.operator_dispatch.insert(key.into(), replacement);
    Ok(())
}

fn dispatch_key(type_part: &str, op: &str, name: Option<&str>) -> String {
    format!("{type_part}:{op}:{}", name.unwrap_or("*"))
}

/// Looks up a replacement function for `op` applied to an operand of
/// `sem_type`/`kind`, optionally further qualified by a method-style call
/// target `name`. Tries, in order: kind-qualified + named, kind-qualified +
/// wildcard, plain-type + named, plain-type + wildcard.
pub fn lookup<'a>(
    ctx: &'a CompilationContext,
    sem_type: CoreType,
    kind: Option<&str>,
    op: &str,
    name: Option<&str>,
) -> Option<&'a SmolStr> {
    let kinded = kind.map(|k| type_key(sem_type, Some(k)));
    let plain = type_key(sem_type, None);

    let candidates = [
        kinded.as_deref().map(|t| dispatch_key(t, op, name)),
        kinded.as_deref().map(|t| dispatch_key(t, op, None)),
        Some(dispatch_key(&plain, op, name)),
        Some(dispatch_key(&plain, op, None)),
    ];

    for key in candidates.into_iter().flatten() {
        if let Some(replacement) = ctx.registries.operator_dispatch.get(key.as_str()) {
            return Some(replacement);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CompileOptions;

    #[test]
    fn kind_qualified_registration_wins_over_plain_type() {
        let mut ctx = CompilationContext::new(CompileOptions::default());
        register(&mut ctx, CoreType::Int64, None, "+", None, "plain_add".into()).unwrap();
        register(&mut ctx, CoreType::Int64, Some("meters"), "+", None, "meters_add".into()).unwrap();

        let hit = lookup(&ctx, CoreType::Int64, Some("meters"), "+", None).unwrap();
        assert_eq!(hit.as_str(), "meters_add");
    }

    #[test]
    fn falls_back_to_plain_type_when_no_kind_match() {
        let mut ctx = CompilationContext::new(CompileOptions::default());
        register(&mut ctx, CoreType::Int64, None, "+", None, "plain_add".into()).unwrap();
        let hit = lookup(&ctx, CoreType::Int64, Some("meters"), "+", None).unwrap();
        assert_eq!(hit.as_str(), "plain_add");
    }

    #[test]
    fn miss_returns_none_without_error() {
        let ctx = CompilationContext::new(CompileOptions::default());
        assert!(lookup(&ctx, CoreType::Text, None, "+", None).is_none());
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut ctx = CompilationContext::new(CompileOptions::default());
        register(&mut ctx, CoreType::Int64, None, "+", None, "a".into()).unwrap();
        assert!(register(&mut ctx, CoreType::Int64, None, "+", None, "b".into()).is_err());
    }
}
