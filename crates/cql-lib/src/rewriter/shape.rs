//! Shape expansion (spec §4.7.1): `LIKE shape` arguments, `FROM shape`
//! argument-bundle expansion, and `@COLUMNS([DISTINCT] ...)` select-list
//! expansion, all of which turn a named shape reference into the concrete
//! column list it denotes before the rest of analysis ever sees them.

use cql_core::ast::{AstKind, NodePayload};
use cql_core::errors::{codes, SemanticError};
use cql_core::location::open_rewrite_scope;
use cql_core::sem::StructDescriptor;
use cql_core::NodeId;
use smol_str::SmolStr;

use crate::context::CompilationContext;

/// Resolves the `StructDescriptor` a `LikeShape`/`FromShape` node's name
/// denotes: a table, a view, a named type, or a proc's result/arg shape.
pub fn resolve_shape_name(ctx: &CompilationContext, name: &str) -> Option<std::rc::Rc<StructDescriptor>> {
    if let Some(entry) = ctx.registries.tables.get(name) {
        return Some(entry.descriptor.clone());
    }
    if let Some((desc, _)) = ctx.registries.views.get(name) {
        return Some(desc.clone());
    }
    if let Some(desc) = ctx.registries.named_types.get(name) {
        return Some(desc.clone());
    }
    if let Some(proc) = ctx.registries.procedures.get(name) {
        if let Some(result) = &proc.result {
            return Some(result.clone());
        }
        return Some(proc.args.clone());
    }
    None
}

/// Expands `LIKE shape` into an `Id` chain naming every visible column of
/// the resolved shape, in declaration order (spec §4.7.1, §8 "zero
/// non-hidden columns is an error").
pub fn expand_like_shape(ctx: &mut CompilationContext, like_shape: NodeId) -> Result<NodeId, SemanticError> {
    let name = shape_name(ctx, like_shape)?;
    let shape = resolve_shape_name(ctx, &name)
        .ok_or_else(|| SemanticError::new(codes::NAME_NOT_FOUND, "unknown shape", name.as_str()))?;

    let visible: Vec<_> = shape.visible_columns().cloned().collect();
    if visible.is_empty() {
        return Err(SemanticError::new(codes::EMPTY_FROM_SHAPE, "shape has no non-hidden columns", name.as_str()));
    }

    let _guard = open_rewrite_scope(ctx.arena.get(like_shape).loc.clone());
    Ok(build_id_chain(ctx, visible.iter().map(|c| c.name.clone())))
}

/// Expands `@COLUMNS(DISTINCT col1, col2, ...)` / `@COLUMNS(shape.*)` into
/// the plain select-list it denotes, deduplicating repeated names when
/// `distinct` is set (spec §4.7.1).
pub fn expand_columns_spec(
    ctx: &mut CompilationContext,
    columns_spec: NodeId,
    distinct: bool,
) -> Result<NodeId, SemanticError> {
    let mut names: Vec<SmolStr> = Vec::new();
    for item in ctx.arena.chain_elements(ctx.arena.get(columns_spec).right()) {
        if let Some(name) = shape_name(ctx, item).ok() {
            if let Some(shape) = resolve_shape_name(ctx, &name) {
                for col in shape.visible_columns() {
                    if !distinct || !names.contains(&col.name) {
                        names.push(col.name.clone());
                    }
                }
                continue;
            }
        }
        if let NodePayload::Str { value, .. } = &ctx.arena.get(item).payload {
            if !distinct || !names.contains(value) {
                names.push(value.clone());
            }
        }
    }
    if names.is_empty() {
        return Err(SemanticError::new(codes::COLUMNS_STAR_NO_FROM, "@COLUMNS expansion is empty", ""));
    }
    let _guard = open_rewrite_scope(ctx.arena.get(columns_spec).loc.clone());
    Ok(build_id_chain(ctx, names.into_iter()))
}

fn shape_name(ctx: &CompilationContext, node: NodeId) -> Result<SmolStr, SemanticError> {
    let name_node = ctx
        .arena
        .get(node)
        .left()
        .ok_or_else(|| SemanticError::new(codes::NAME_NOT_FOUND, "shape reference missing a name", ""))?;
    match &ctx.arena.get(name_node).payload {
        NodePayload::Str { value, .. } => Ok(value.clone()),
        _ => Err(SemanticError::new(codes::NAME_NOT_FOUND, "shape reference is not an identifier", "")),
    }
}

fn build_id_chain(ctx: &mut CompilationContext, names: impl DoubleEndedIterator<Item = SmolStr>) -> NodeId {
    let loc = cql_core::location::ambient_location();
    let mut tail = None;
    for name in names.rev() {
        let id_node = ctx.arena.new_str(loc, name, cql_core::ast::StrSubtype::Id);
        ctx.arena.get_mut(id_node).kind = AstKind::Id;
        tail = Some(ctx.arena.new_chain_node(AstKind::ExprList, id_node, tail));
    }
    tail.expect("build_id_chain called with no names")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CompileOptions;
    use cql_core::location::SourceLocation;
    use cql_core::sem::{ColumnDescriptor, CoreType, SemFlags};
    use std::rc::Rc;

    fn loc() -> SourceLocation {
        SourceLocation::new("t.sql", 1)
    }

    fn make_ctx_with_table() -> CompilationContext {
        let mut ctx = CompilationContext::new(CompileOptions::default());
        ctx.registries.tables.insert(
            "widgets".into(),
            crate::registries::TableInfoEntry {
                name: "widgets".into(),
                descriptor: Rc::new(StructDescriptor {
                    name: "widgets".into(),
                    columns: vec![
                        ColumnDescriptor {
                            name: "id".into(),
                            kind: None,
                            sem_type: CoreType::Int64,
                            flags: SemFlags::PK,
                        },
                        ColumnDescriptor {
                            name: "rowid".into(),
                            kind: None,
                            sem_type: CoreType::Int64,
                            flags: SemFlags::HIDDEN_COLUMN,
                        },
                    ],
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
        ctx
    }

    #[test]
    fn like_shape_expands_to_visible_columns_only() {
        let mut ctx = make_ctx_with_table();
        let name = ctx.arena.new_str(loc(), "widgets", cql_core::ast::StrSubtype::Id);
        ctx.arena.get_mut(name).kind = AstKind::Id;
        let like_shape = ctx.arena.new_unary(AstKind::LikeShape, loc(), name);
        let expanded = expand_like_shape(&mut ctx, like_shape).unwrap();
        let elements = ctx.arena.chain_elements(Some(expanded));
        assert_eq!(elements.len(), 1);
    }

    #[test]
    fn unknown_shape_is_an_error() {
        let mut ctx = make_ctx_with_table();
        let name = ctx.arena.new_str(loc(), "nope", cql_core::ast::StrSubtype::Id);
        ctx.arena.get_mut(name).kind = AstKind::Id;
        let like_shape = ctx.arena.new_unary(AstKind::LikeShape, loc(), name);
        assert!(expand_like_shape(&mut ctx, like_shape).is_err());
    }
}
