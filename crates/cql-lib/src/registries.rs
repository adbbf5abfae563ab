//! Global registries (spec §3.3): insertion-ordered tables keyed by
//! canonical name. Each has a lifecycle tied to one compilation, so they
//! all live on [`crate::context::CompilationContext`].

use std::rc::Rc;

use cql_helpers::IndexMap;
use cql_core::NodeId;
use cql_core::sem::StructDescriptor;
use smol_str::SmolStr;

#[derive(Debug, Clone)]
pub struct RegionInfo {
    pub name: SmolStr,
    pub uses: Vec<(SmolStr, Visibility)>,
    pub deployable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
}

#[derive(Debug, Clone)]
pub struct EnumInfo {
    pub name: SmolStr,
    pub base_type: cql_core::sem::CoreType,
    pub values: IndexMap<SmolStr, i64>,
}

#[derive(Debug, Clone)]
pub struct ConstGroupInfo {
    pub name: SmolStr,
    pub values: IndexMap<SmolStr, cql_core::sem::ConstValue>,
}

#[derive(Debug, Clone)]
pub struct FunctionInfo {
    pub name: SmolStr,
    pub params: Rc<StructDescriptor>,
    pub return_type: cql_core::sem::CoreType,
}

/// Dependency sets accumulated while analyzing one procedure/trigger body
/// (spec §4.6 "Dependency tracking").
#[derive(Debug, Clone, Default)]
pub struct DependencySets {
    pub from_tables: Vec<SmolStr>,
    pub insert_tables: Vec<SmolStr>,
    pub update_tables: Vec<SmolStr>,
    pub delete_tables: Vec<SmolStr>,
    pub uses_views: Vec<SmolStr>,
    pub uses_procedures: Vec<SmolStr>,
}

impl DependencySets {
    /// The invariant spec §8 states: `usesTables == fromTables ∪
    /// insertTables ∪ updateTables ∪ deleteTables`.
    pub fn uses_tables(&self) -> Vec<SmolStr> {
        let mut out: Vec<SmolStr> = Vec::new();
        for set in [
            &self.from_tables,
            &self.insert_tables,
            &self.update_tables,
            &self.delete_tables,
        ] {
            for t in set {
                if !out.contains(t) {
                    out.push(t.clone());
                }
            }
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct ProcInfo {
    pub name: SmolStr,
    pub args: Rc<StructDescriptor>,
    pub result: Option<Rc<StructDescriptor>>,
    pub body: NodeId,
    pub deps: DependencySets,
    pub region: Option<SmolStr>,
    pub is_shared_fragment: bool,
}

#[derive(Debug, Clone)]
pub struct TableInfoEntry {
    pub name: SmolStr,
    pub descriptor: Rc<StructDescriptor>,
    pub node: NodeId,
    pub backed_by: Option<SmolStr>,
    pub create_version: Option<i64>,
    pub delete_version: Option<i64>,
    pub recreate_group: Option<SmolStr>,
    pub foreign_keys: Vec<SmolStr>,
}

#[derive(Debug, Default)]
pub struct GlobalRegistries {
    pub tables: IndexMap<SmolStr, TableInfoEntry>,
    pub views: IndexMap<SmolStr, (Rc<StructDescriptor>, NodeId)>,
    pub indices: IndexMap<SmolStr, NodeId>,
    pub triggers: IndexMap<SmolStr, NodeId>,
    pub regions: IndexMap<SmolStr, RegionInfo>,
    pub enums: IndexMap<SmolStr, EnumInfo>,
    pub constants: IndexMap<SmolStr, cql_core::sem::ConstValue>,
    pub constant_groups: IndexMap<SmolStr, ConstGroupInfo>,
    pub functions: IndexMap<SmolStr, FunctionInfo>,
    pub select_functions: IndexMap<SmolStr, FunctionInfo>,
    pub unchecked_functions: IndexMap<SmolStr, FunctionInfo>,
    pub procedures: IndexMap<SmolStr, ProcInfo>,
    pub named_types: IndexMap<SmolStr, Rc<StructDescriptor>>,
    pub arg_bundles: IndexMap<SmolStr, Rc<StructDescriptor>>,
    pub adhoc_migrations: IndexMap<SmolStr, i64>,
    pub subscriptions: IndexMap<SmolStr, SmolStr>,
    /// backed-table name -> backing-table name (spec §4.7.4).
    pub backed_by: IndexMap<SmolStr, SmolStr>,
    /// recreate-group name -> the FK-dependent group names it must follow.
    pub recreate_group_deps: IndexMap<SmolStr, Vec<SmolStr>>,
    /// `<type>[<kind>]:<op>:<name-or-all>` -> replacement function name
    /// (spec §4.7.3).
    pub operator_dispatch: IndexMap<SmolStr, SmolStr>,
}

impl GlobalRegistries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deployed region per spec §4.6: `region_of(region_of(obj))`, i.e. the
    /// nearest ancestor region that is itself deployable, else `None`
    /// ("(orphan)" at the presentation layer).
    pub fn deployed_in_region(&self, region: &str) -> Option<SmolStr> {
        let info = self.regions.get(region)?;
        if info.deployable {
            return Some(info.name.clone());
        }
        for (parent, _) in &info.uses {
            if let Some(found) = self.deployed_in_region(parent) {
                return Some(found);
            }
        }
        None
    }

    /// Whether `from_region` may reference an object declared in
    /// `target_region` (spec §4.6 "Regions and deployment"): either the
    /// same region, or `from_region` uses `target_region` with at least one
    /// path that is not marked private.
    pub fn region_can_see(&self, from_region: &str, target_region: &str) -> bool {
        if from_region == target_region {
            return true;
        }
        let Some(info) = self.regions.get(from_region) else {
            return false;
        };
        for (parent, vis) in &info.uses {
            if *vis == Visibility::Public || parent == target_region {
                if parent == target_region {
                    return true;
                }
                if self.region_can_see(parent, target_region) {
                    return true;
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uses_tables_is_union_of_crud_sets() {
        let deps = DependencySets {
            from_tables: vec!["a".into(), "b".into()],
            insert_tables: vec!["b".into(), "c".into()],
            update_tables: vec![],
            delete_tables: vec!["d".into()],
            uses_views: vec![],
            uses_procedures: vec![],
        };
        let mut uses = deps.uses_tables();
        uses.sort();
        assert_eq!(uses, vec!["a".to_string(), "b".into(), "c".into(), "d".into()]);
    }

    #[test]
    fn region_visibility_respects_privacy() {
        let mut regs = GlobalRegistries::new();
        regs.regions.insert(
            "r1".into(),
            RegionInfo {
                name: "r1".into(),
                uses: vec![],
                deployable: false,
            },
        );
        regs.regions.insert(
            "r2".into(),
            RegionInfo {
                name: "r2".into(),
                uses: vec![("r1".into(), Visibility::Private)],
                deployable: false,
            },
        );
        regs.regions.insert(
            "r3".into(),
            RegionInfo {
                name: "r3".into(),
                uses: vec![("r2".into(), Visibility::Private)],
                deployable: false,
            },
        );
        assert!(regs.region_can_see("r2", "r1"));
        assert!(!regs.region_can_see("r3", "r1"));
    }
}
