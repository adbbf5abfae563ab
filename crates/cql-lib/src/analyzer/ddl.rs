//! DDL analysis (spec §4.6 item 1): `CREATE TABLE`/`VIEW`/`INDEX`/`TRIGGER`
//! registration, `@create`/`@delete`/`@recreate` annotation validation, and
//! `DECLARE REGION`/`DECLARE DEPLOYABLE REGION`/`DECLARE ENUM`/`DECLARE
//! CONST GROUP`.
//!
//! A `CREATE TABLE`'s column list is a chain mixing `ColumnDef` nodes with
//! at most one each of `AttrCreate`/`AttrDelete`/`AttrRecreate` (the
//! `@create(v)`/`@delete(v)`/`@recreate(group)` annotations); everything
//! else in the chain is ignored here and left to the rewriter.

use std::rc::Rc;

use cql_core::ast::{AstKind, NodePayload};
use cql_core::errors::{codes, SemanticError};
use cql_core::sem::{CoreType, SemFlags, SemanticRecord, StructDescriptor};
use cql_core::NodeId;

use super::{mark_ok, poison, versioning};
use crate::context::CompilationContext;
use crate::registries::{ConstGroupInfo, EnumInfo, RegionInfo, TableInfoEntry, Visibility};
use crate::resolver::Scope;

fn id_text(ctx: &CompilationContext, id: NodeId) -> Option<smol_str::SmolStr> {
    match &ctx.arena.get(id).payload {
        NodePayload::Str { value, .. } => Some(value.clone()),
        _ => None,
    }
}

fn int_payload(ctx: &CompilationContext, id: NodeId) -> Option<i64> {
    match &ctx.arena.get(id).payload {
        NodePayload::Int(v) => Some(*v),
        _ => None,
    }
}

pub fn analyze_create_table(ctx: &mut CompilationContext, id: NodeId) {
    let Some(name_node) = ctx.arena.get(id).left() else {
        poison(ctx, id, SemanticError::new(codes::NAME_NOT_FOUND, "table missing a name", ""));
        return;
    };
    let Some(name) = id_text(ctx, name_node) else {
        poison(ctx, id, SemanticError::new(codes::NAME_NOT_FOUND, "table name is not an identifier", ""));
        return;
    };

    if ctx.registries.tables.contains_key(name.as_str()) {
        poison(ctx, id, SemanticError::new(codes::DUPLICATE_NAME, "table already declared", name.as_str()));
        return;
    }

    let mut columns = Vec::new();
    let mut create_version = None;
    let mut delete_version = None;
    let mut recreate_group = None;

    for item in ctx.arena.chain_elements(ctx.arena.get(id).right()) {
        match ctx.arena.get(item).kind {
            AstKind::ColumnDef => {
                if let Some(col) = column_descriptor(ctx, item) {
                    columns.push(col);
                }
            }
            AstKind::AttrCreate => {
                create_version = ctx.arena.get(item).left().and_then(|v| int_payload(ctx, v));
            }
            AstKind::AttrDelete => {
                delete_version = ctx.arena.get(item).left().and_then(|v| int_payload(ctx, v));
            }
            AstKind::AttrRecreate => {
                recreate_group = ctx
                    .arena
                    .get(item)
                    .left()
                    .and_then(|v| id_text(ctx, v));
            }
            _ => {}
        }
    }

    if let Err(e) = versioning::validate_create_delete(create_version, delete_version) {
        poison(ctx, id, e);
        return;
    }

    let foreign_keys: Vec<_> = columns
        .iter()
        .filter(|c| c.flags.contains(SemFlags::FK))
        .map(|c| c.name.clone())
        .collect();

    let descriptor = Rc::new(StructDescriptor {
        name: name.clone(),
        columns,
        is_backed: false,
    });

    if let Some(group) = &recreate_group {
        ctx.registries
            .recreate_group_deps
            .entry(group.clone())
            .or_insert_with(Vec::new);
    }

    ctx.registries.tables.insert(
        name.clone(),
        TableInfoEntry {
            name: name.clone(),
            descriptor: descriptor.clone(),
            node: id,
            backed_by: None,
            create_version,
            delete_version,
            recreate_group,
            foreign_keys,
        },
    );

    let mut record = SemanticRecord::of_type(CoreType::Struct);
    record.name = Some(name);
    record.struct_desc = Some(descriptor);
    record.create_version = create_version;
    record.delete_version = delete_version;
    mark_ok(ctx, id, record);
}

fn column_descriptor(ctx: &mut CompilationContext, col_def: NodeId) -> Option<cql_core::sem::ColumnDescriptor> {
    let name_node = ctx.arena.get(col_def).left()?;
    let name = id_text(ctx, name_node)?;
    // The AST builder attaches the column's declared type and constraint
    // flags directly to the `ColumnDef` node's own semantic record, since
    // lexing/parsing declared types is out of scope here (spec §6).
    let sem = ctx.arena.get(col_def).sem.clone().unwrap_or_default();
    mark_ok(ctx, col_def, (*sem).clone());
    Some(cql_core::sem::ColumnDescriptor {
        name,
        kind: sem.kind.clone(),
        sem_type: sem.core_type,
        flags: sem.flags,
    })
}

pub fn analyze_create_view(ctx: &mut CompilationContext, id: NodeId, scope: &Scope) {
    let Some(name_node) = ctx.arena.get(id).left() else {
        poison(ctx, id, SemanticError::new(codes::NAME_NOT_FOUND, "view missing a name", ""));
        return;
    };
    let Some(name) = id_text(ctx, name_node) else {
        poison(ctx, id, SemanticError::new(codes::NAME_NOT_FOUND, "view name is not an identifier", ""));
        return;
    };
    if ctx.registries.views.contains_key(name.as_str()) || ctx.registries.tables.contains_key(name.as_str()) {
        poison(ctx, id, SemanticError::new(codes::DUPLICATE_NAME, "name already declared", name.as_str()));
        return;
    }
    let Some(select) = ctx.arena.get(id).right() else {
        poison(ctx, id, SemanticError::new(codes::EMPTY_FROM_SHAPE, "view body missing", name.as_str()));
        return;
    };
    let descriptor = super::expr::analyze_select(ctx, select, scope);
    ctx.registries.views.insert(name.clone(), (descriptor.clone(), id));

    let mut record = SemanticRecord::of_type(CoreType::Struct);
    record.name = Some(name);
    record.struct_desc = Some(descriptor);
    mark_ok(ctx, id, record);
}

pub fn analyze_create_index(ctx: &mut CompilationContext, id: NodeId) {
    let Some(name_node) = ctx.arena.get(id).left() else {
        poison(ctx, id, SemanticError::new(codes::NAME_NOT_FOUND, "index missing a name", ""));
        return;
    };
    let Some(name) = id_text(ctx, name_node) else {
        poison(ctx, id, SemanticError::new(codes::NAME_NOT_FOUND, "index name is not an identifier", ""));
        return;
    };
    if ctx.registries.indices.contains_key(name.as_str()) {
        poison(ctx, id, SemanticError::new(codes::DUPLICATE_NAME, "index already declared", name.as_str()));
        return;
    }
    ctx.registries.indices.insert(name.clone(), id);
    mark_ok(ctx, id, SemanticRecord::of_type(CoreType::Ok));
}

pub fn analyze_create_trigger(ctx: &mut CompilationContext, id: NodeId, scope: &Scope) {
    let Some(name_node) = ctx.arena.get(id).left() else {
        poison(ctx, id, SemanticError::new(codes::NAME_NOT_FOUND, "trigger missing a name", ""));
        return;
    };
    let Some(name) = id_text(ctx, name_node) else {
        poison(ctx, id, SemanticError::new(codes::NAME_NOT_FOUND, "trigger name is not an identifier", ""));
        return;
    };
    if ctx.registries.triggers.contains_key(name.as_str()) {
        poison(ctx, id, SemanticError::new(codes::DUPLICATE_NAME, "trigger already declared", name.as_str()));
        return;
    }
    ctx.registries.triggers.insert(name.clone(), id);
    if let Some(body) = ctx.arena.get(id).right() {
        super::analyze_statement(ctx, body, scope);
    }
    mark_ok(ctx, id, SemanticRecord::of_type(CoreType::Ok));
}

pub fn analyze_declare_region(ctx: &mut CompilationContext, id: NodeId) {
    let deployable = ctx.arena.get(id).kind == AstKind::DeclareDeployableRegion;
    let Some(name_node) = ctx.arena.get(id).left() else {
        poison(ctx, id, SemanticError::new(codes::NAME_NOT_FOUND, "region missing a name", ""));
        return;
    };
    let Some(name) = id_text(ctx, name_node) else {
        poison(ctx, id, SemanticError::new(codes::NAME_NOT_FOUND, "region name is not an identifier", ""));
        return;
    };
    if ctx.registries.regions.contains_key(name.as_str()) {
        poison(ctx, id, SemanticError::new(codes::DUPLICATE_NAME, "region already declared", name.as_str()));
        return;
    }

    let mut uses = Vec::new();
    for use_node in ctx.arena.chain_elements(ctx.arena.get(id).right()) {
        let private = ctx.arena.get(use_node).kind == AstKind::MiscAttr;
        let name_child = ctx.arena.get(use_node).left().unwrap_or(use_node);
        if let Some(parent) = id_text(ctx, name_child) {
            if !ctx.registries.regions.contains_key(parent.as_str()) {
                poison(
                    ctx,
                    id,
                    SemanticError::new(codes::REGION_NOT_ACCESSIBLE, "referenced region not declared", parent.as_str()),
                );
                return;
            }
            uses.push((parent, if private { Visibility::Private } else { Visibility::Public }));
        }
    }

    ctx.registries.regions.insert(
        name.clone(),
        RegionInfo {
            name: name.clone(),
            uses,
            deployable,
        },
    );
    mark_ok(ctx, id, SemanticRecord::of_type(CoreType::Region));
}

pub fn analyze_declare_enum(ctx: &mut CompilationContext, id: NodeId) {
    let Some(name_node) = ctx.arena.get(id).left() else {
        poison(ctx, id, SemanticError::new(codes::NAME_NOT_FOUND, "enum missing a name", ""));
        return;
    };
    let Some(name) = id_text(ctx, name_node) else {
        poison(ctx, id, SemanticError::new(codes::NAME_NOT_FOUND, "enum name is not an identifier", ""));
        return;
    };
    if ctx.registries.enums.contains_key(name.as_str()) {
        poison(ctx, id, SemanticError::new(codes::DUPLICATE_NAME, "enum already declared", name.as_str()));
        return;
    }

    let mut values = cql_helpers::IndexMap::default();
    let mut next = 0i64;
    for value_node in ctx.arena.chain_elements(ctx.arena.get(id).right()) {
        let Some(vname_node) = ctx.arena.get(value_node).left() else { continue };
        let Some(vname) = id_text(ctx, vname_node) else { continue };
        let explicit = ctx
            .arena
            .get(value_node)
            .right()
            .and_then(|v| int_payload(ctx, v));
        let value = explicit.unwrap_or(next);
        next = value + 1;
        if values.contains_key(vname.as_str()) {
            poison(ctx, id, SemanticError::new(codes::DUPLICATE_NAME, "duplicate enum member", vname.as_str()));
            return;
        }
        values.insert(vname, value);
    }

    ctx.registries.enums.insert(
        name.clone(),
        EnumInfo {
            name,
            base_type: CoreType::Int64,
            values,
        },
    );
    mark_ok(ctx, id, SemanticRecord::of_type(CoreType::Ok));
}

pub fn analyze_declare_const_group(ctx: &mut CompilationContext, id: NodeId) {
    let Some(name_node) = ctx.arena.get(id).left() else {
        poison(ctx, id, SemanticError::new(codes::NAME_NOT_FOUND, "const group missing a name", ""));
        return;
    };
    let Some(name) = id_text(ctx, name_node) else {
        poison(ctx, id, SemanticError::new(codes::NAME_NOT_FOUND, "const group name is not an identifier", ""));
        return;
    };
    if ctx.registries.constant_groups.contains_key(name.as_str()) {
        poison(ctx, id, SemanticError::new(codes::DUPLICATE_NAME, "const group already declared", name.as_str()));
        return;
    }

    let mut values = cql_helpers::IndexMap::default();
    for const_node in ctx.arena.chain_elements(ctx.arena.get(id).right()) {
        let Some(cname_node) = ctx.arena.get(const_node).left() else { continue };
        let Some(cname) = id_text(ctx, cname_node) else { continue };
        let Some(value_node) = ctx.arena.get(const_node).right() else { continue };
        let value = match &ctx.arena.get(value_node).payload {
            NodePayload::Int(v) => cql_core::sem::ConstValue::Int(*v),
            NodePayload::Num { text, .. } => text
                .parse::<f64>()
                .map(cql_core::sem::ConstValue::Real)
                .unwrap_or(cql_core::sem::ConstValue::Int(0)),
            NodePayload::Str { value, .. } => cql_core::sem::ConstValue::Text(value.clone()),
            _ => continue,
        };
        ctx.registries.constants.insert(cname.clone(), value.clone());
        values.insert(cname, value);
    }

    ctx.registries.constant_groups.insert(name.clone(), ConstGroupInfo { name, values });
    mark_ok(ctx, id, SemanticRecord::of_type(CoreType::Ok));
}
