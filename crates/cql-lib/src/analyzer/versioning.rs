//! Schema-versioning model (spec §4.6 "Schema-versioning model"):
//! `@create(v)`/`@delete(v)` validation, ad-hoc migrator signature checks,
//! and recreate-group topological sort with cycle detection.

use cql_core::errors::{codes, SemanticError};
use cql_helpers::IndexMap;
use smol_str::SmolStr;

/// Validates `delete_version > create_version` for a single object (spec
/// §8 "For every `@create(v)`/`@delete(v)` pair on the same column,
/// create-version < delete-version").
pub fn validate_create_delete(create: Option<i64>, delete: Option<i64>) -> Result<(), SemanticError> {
    if let (Some(c), Some(d)) = (create, delete) {
        if d <= c {
            return Err(SemanticError::new(
                codes::INVALID_SCHEMA_VERSION,
                "delete version must be greater than create version",
                format!("@create({c})/@delete({d})"),
            ));
        }
    }
    Ok(())
}

/// Validates an ad-hoc migrator procedure's signature is `(proc () using
/// transaction)`, i.e. no parameters and marked as touching the database.
pub fn validate_adhoc_migrator_signature(has_params: bool, uses_transaction: bool) -> Result<(), SemanticError> {
    if has_params || !uses_transaction {
        return Err(SemanticError::new(
            codes::INVALID_SCHEMA_VERSION,
            "ad-hoc migrator must be declared as `proc () using transaction`",
            "",
        ));
    }
    Ok(())
}

/// Topologically sorts recreate groups by their FK-dependency edges
/// (`deps[g]` = groups `g` must be recreated after), assigning each group
/// an ordinal. A cycle is an error (spec §8 "Recreate-group cycle
/// detection").
pub fn topo_sort_recreate_groups(deps: &IndexMap<SmolStr, Vec<SmolStr>>) -> Result<Vec<SmolStr>, SemanticError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
    }

    let mut marks: IndexMap<SmolStr, Mark> = deps.keys().map(|k| (k.clone(), Mark::Unvisited)).collect();
    let mut order = Vec::new();

    fn visit(
        name: &SmolStr,
        deps: &IndexMap<SmolStr, Vec<SmolStr>>,
        marks: &mut IndexMap<SmolStr, Mark>,
        order: &mut Vec<SmolStr>,
    ) -> Result<(), SemanticError> {
        match marks.get(name).copied() {
            Some(Mark::Done) | None => return Ok(()),
            Some(Mark::InProgress) => {
                return Err(SemanticError::new(
                    codes::RECREATE_GROUP_CYCLE,
                    "cycle in recreate-group dependencies",
                    name.as_str(),
                ))
            }
            Some(Mark::Unvisited) => {}
        }
        marks.insert(name.clone(), Mark::InProgress);
        if let Some(edges) = deps.get(name) {
            for dep in edges {
                visit(dep, deps, marks, order)?;
            }
        }
        marks.insert(name.clone(), Mark::Done);
        order.push(name.clone());
        Ok(())
    }

    let names: Vec<SmolStr> = deps.keys().cloned().collect();
    for name in &names {
        visit(name, deps, &mut marks, &mut order)?;
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_before_delete_is_required() {
        assert!(validate_create_delete(Some(3), Some(5)).is_ok());
        assert!(validate_create_delete(Some(5), Some(5)).is_err());
        assert!(validate_create_delete(Some(5), Some(3)).is_err());
    }

    #[test]
    fn topo_sort_orders_dependencies_first() {
        let mut deps = IndexMap::default();
        deps.insert("b".into(), vec!["a".into()]);
        deps.insert("a".into(), vec![]);
        let order = topo_sort_recreate_groups(&deps).unwrap();
        assert_eq!(order, vec![SmolStr::from("a"), SmolStr::from("b")]);
    }

    #[test]
    fn topo_sort_detects_cycle() {
        let mut deps = IndexMap::default();
        deps.insert("a".into(), vec!["b".into()]);
        deps.insert("b".into(), vec!["a".into()]);
        assert!(topo_sort_recreate_groups(&deps).is_err());
    }
}
