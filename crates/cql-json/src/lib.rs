//! JSON schema emitter (spec §4.8, component H). Walks a
//! [`cql_lib::CompilationContext`] after analysis and produces the
//! top-level JSON document describing every registered schema object:
//! tables, views, indices, triggers, procedures (bucketed by the single
//! kind of statement they wrap, the way the original's `--rt json_schema`
//! output does), regions, enums, constant groups, and subscriptions.
//!
//! Emission refuses outright once [`CompilationContext::exit_on_validation`]
//! has fired (spec §7): a schema that failed validation must never be
//! handed to a codegen backend.

use cql_core::sem::{ColumnDescriptor, CoreType, SemFlags, StructDescriptor};
use cql_lib::registries::{DependencySets, ProcInfo, TableInfoEntry};
use cql_lib::CompilationContext;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    #[error("cannot emit JSON schema: schema validation previously failed")]
    ValidationFailed,
    #[error("cannot emit JSON schema: {0} unresolved semantic error(s) remain")]
    UnresolvedErrors(usize),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub sem_type: String,
    pub is_not_null: bool,
    pub is_primary_key: bool,
    pub is_unique_key: bool,
    pub is_sensitive: bool,
}

impl From<&ColumnDescriptor> for JsonColumn {
    fn from(c: &ColumnDescriptor) -> Self {
        JsonColumn {
            name: c.name.to_string(),
            sem_type: core_type_name(c.sem_type).to_string(),
            is_not_null: c.flags.contains(SemFlags::NOT_NULL),
            is_primary_key: c.flags.contains(SemFlags::PK),
            is_unique_key: c.flags.contains(SemFlags::UK),
            is_sensitive: c.flags.contains(SemFlags::SENSITIVE),
        }
    }
}

fn core_type_name(t: CoreType) -> &'static str {
    match t {
        CoreType::Bool => "bool",
        CoreType::Int32 => "integer",
        CoreType::Int64 => "long",
        CoreType::Real => "real",
        CoreType::Text => "text",
        CoreType::Blob => "blob",
        CoreType::Object => "object",
        _ => "unknown",
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonTable {
    pub name: String,
    pub crc: String,
    pub columns: Vec<JsonColumn>,
    pub primary_key: Vec<String>,
    pub foreign_keys: Vec<String>,
    pub region: Option<String>,
    pub create_version: Option<i64>,
    pub delete_version: Option<i64>,
    pub recreate_group: Option<String>,
    pub is_backed: bool,
}

fn crc_of(desc: &StructDescriptor) -> String {
    let mut buf = Vec::new();
    for c in &desc.columns {
        buf.extend_from_slice(c.name.as_bytes());
    }
    format!("{:x}", cql_helpers::fnv64(&buf))
}

fn table_to_json(name: &str, entry: &TableInfoEntry) -> JsonTable {
    JsonTable {
        name: name.to_string(),
        crc: crc_of(&entry.descriptor),
        columns: entry.descriptor.columns.iter().map(JsonColumn::from).collect(),
        primary_key: entry
            .descriptor
            .columns
            .iter()
            .filter(|c| c.flags.contains(SemFlags::PK))
            .map(|c| c.name.to_string())
            .collect(),
        foreign_keys: entry.foreign_keys.iter().map(|s| s.to_string()).collect(),
        region: None,
        create_version: entry.create_version,
        delete_version: entry.delete_version,
        recreate_group: entry.recreate_group.as_ref().map(|s| s.to_string()),
        is_backed: entry.backed_by.is_some(),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonView {
    pub name: String,
    pub columns: Vec<JsonColumn>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonDependencies {
    pub uses_tables: Vec<String>,
    pub uses_views: Vec<String>,
    pub uses_procedures: Vec<String>,
    pub insert_tables: Vec<String>,
    pub update_tables: Vec<String>,
    pub delete_tables: Vec<String>,
    pub from_tables: Vec<String>,
}

impl From<&DependencySets> for JsonDependencies {
    fn from(d: &DependencySets) -> Self {
        JsonDependencies {
            uses_tables: d.uses_tables().iter().map(|s| s.to_string()).collect(),
            uses_views: d.uses_views.iter().map(|s| s.to_string()).collect(),
            uses_procedures: d.uses_procedures.iter().map(|s| s.to_string()).collect(),
            insert_tables: d.insert_tables.iter().map(|s| s.to_string()).collect(),
            update_tables: d.update_tables.iter().map(|s| s.to_string()).collect(),
            delete_tables: d.delete_tables.iter().map(|s| s.to_string()).collect(),
            from_tables: d.from_tables.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonProcedure {
    pub name: String,
    pub args: Vec<JsonColumn>,
    pub arg_origin: Vec<String>,
    pub result: Option<Vec<JsonColumn>>,
    pub dependencies: JsonDependencies,
    pub is_shared_fragment: bool,
}

fn proc_to_json(info: &ProcInfo) -> JsonProcedure {
    JsonProcedure {
        name: info.name.to_string(),
        args: info.args.columns.iter().map(JsonColumn::from).collect(),
        arg_origin: info.args.columns.iter().map(|_| "explicit".to_string()).collect(),
        result: info.result.as_ref().map(|r| r.columns.iter().map(JsonColumn::from).collect()),
        dependencies: JsonDependencies::from(&info.deps),
        is_shared_fragment: info.is_shared_fragment,
    }
}

/// Classification bucket a procedure falls into based on the single kind
/// of write it performs (spec §4.8 "queries/inserts/updates/deletes vs
/// general"): a procedure touching more than one CRUD set, or none, is
/// "general".
fn classify(info: &ProcInfo) -> &'static str {
    let d = &info.deps;
    let buckets = [
        !d.insert_tables.is_empty(),
        !d.update_tables.is_empty(),
        !d.delete_tables.is_empty(),
    ];
    let active = buckets.iter().filter(|b| **b).count();
    if active == 0 && !d.from_tables.is_empty() {
        "queries"
    } else if active == 1 && d.insert_tables.len() == 1 {
        "inserts"
    } else if active == 1 && d.update_tables.len() == 1 {
        "updates"
    } else if active == 1 && d.delete_tables.len() == 1 {
        "deletes"
    } else {
        "general"
    }
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonSchema {
    pub tables: Vec<JsonTable>,
    pub views: Vec<JsonView>,
    pub indices: Vec<String>,
    pub triggers: Vec<String>,
    pub queries: Vec<JsonProcedure>,
    pub inserts: Vec<JsonProcedure>,
    pub general_inserts: Vec<JsonProcedure>,
    pub updates: Vec<JsonProcedure>,
    pub deletes: Vec<JsonProcedure>,
    pub general: Vec<JsonProcedure>,
    pub declare_procs: Vec<String>,
    pub declare_funcs: Vec<String>,
    pub regions: Vec<String>,
    pub ad_hoc_migration_procs: Vec<String>,
    pub enums: Vec<String>,
    pub constant_groups: Vec<String>,
    pub subscriptions: Vec<String>,
}

pub fn emit(ctx: &CompilationContext) -> Result<JsonSchema, EmitError> {
    if ctx.exit_on_validation {
        return Err(EmitError::ValidationFailed);
    }
    if ctx.has_errors() {
        return Err(EmitError::UnresolvedErrors(ctx.diagnostics.len()));
    }

    let mut schema = JsonSchema::default();

    for (name, entry) in &ctx.registries.tables {
        schema.tables.push(table_to_json(name, entry));
    }
    for (name, (desc, _)) in &ctx.registries.views {
        schema.views.push(JsonView {
            name: name.to_string(),
            columns: desc.columns.iter().map(JsonColumn::from).collect(),
        });
    }
    schema.indices = ctx.registries.indices.keys().map(|k| k.to_string()).collect();
    schema.triggers = ctx.registries.triggers.keys().map(|k| k.to_string()).collect();
    schema.regions = ctx.registries.regions.keys().map(|k| k.to_string()).collect();
    schema.enums = ctx.registries.enums.keys().map(|k| k.to_string()).collect();
    schema.constant_groups = ctx.registries.constant_groups.keys().map(|k| k.to_string()).collect();
    schema.subscriptions = ctx.registries.subscriptions.keys().map(|k| k.to_string()).collect();
    schema.ad_hoc_migration_procs = ctx.registries.adhoc_migrations.keys().map(|k| k.to_string()).collect();
    schema.declare_funcs = ctx.registries.functions.keys().map(|k| k.to_string()).collect();

    for info in ctx.registries.procedures.values() {
        let j = proc_to_json(info);
        match classify(info) {
            "queries" => schema.queries.push(j),
            "inserts" => schema.inserts.push(j),
            "updates" => schema.updates.push(j),
            "deletes" => schema.deletes.push(j),
            _ => {
                if j.dependencies.insert_tables.len() > 1 {
                    schema.general_inserts.push(j);
                } else {
                    schema.general.push(j);
                }
            }
        }
    }

    Ok(schema)
}

pub fn to_json_string(ctx: &CompilationContext) -> Result<String, EmitError> {
    let schema = emit(ctx)?;
    serde_json::to_string_pretty(&schema).map_err(|e| EmitError::UnresolvedErrors(0).tap_log(e))
}

trait TapLog {
    fn tap_log(self, e: serde_json::Error) -> Self;
}

impl TapLog for EmitError {
    fn tap_log(self, e: serde_json::Error) -> Self {
        tracing::error!(error = %e, "failed to serialize JSON schema");
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cql_core::sem::StructDescriptor;
    use cql_lib::CompileOptions;
    use std::rc::Rc;

    fn ctx_with_one_table() -> CompilationContext {
        let mut ctx = CompilationContext::new(CompileOptions::default());
        ctx.registries.tables.insert(
            "widgets".into(),
            TableInfoEntry {
                name: "widgets".into(),
                descriptor: Rc::new(StructDescriptor {
                    name: "widgets".into(),
                    columns: vec![ColumnDescriptor {
                        name: "id".into(),
                        kind: None,
                        sem_type: CoreType::Int64,
                        flags: SemFlags::PK | SemFlags::NOT_NULL,
                    }],
                    is_backed: false,
                }),
                node: ctx.arena.new_leafless(cql_core::ast::AstKind::CreateTable, cql_core::location::SourceLocation::new("t.sql", 1)),
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
    fn emits_registered_table() {
        let ctx = ctx_with_one_table();
        let schema = emit(&ctx).unwrap();
        assert_eq!(schema.tables.len(), 1);
        assert_eq!(schema.tables[0].name, "widgets");
        assert!(schema.tables[0].primary_key.contains(&"id".to_string()));
    }

    #[test]
    fn refuses_to_emit_after_validation_failure() {
        let mut ctx = ctx_with_one_table();
        ctx.exit_on_validation = true;
        assert!(matches!(emit(&ctx), Err(EmitError::ValidationFailed)));
    }
}
