//! `OUT UNION` parent-child expansion (spec §4.7.5): a proc using `OUT
//! UNION [...] FROM (...) JOIN child USING (...)` is rewritten into two
//! parts, a partition object per child result set and a single widened
//! cursor whose shape is the union of the parent shape and every named
//! child's shape (nullable where a child's columns aren't populated for a
//! given parent row).

use std::rc::Rc;

use cql_core::sem::{ColumnDescriptor, SemFlags, StructDescriptor};

/// Builds the widened cursor shape for an `OUT UNION PARENT CHILD`
/// statement: the parent's own columns, followed by every child's visible
/// columns with `NOT_NULL` stripped (a child row may be absent for a given
/// parent row, so none of its columns can be asserted not-null in the
/// merged shape).
pub fn widened_shape(parent: &StructDescriptor, children: &[(&str, Rc<StructDescriptor>)]) -> StructDescriptor {
    let mut columns: Vec<ColumnDescriptor> = parent.columns.clone();
    for (child_name, child) in children {
        for col in child.visible_columns() {
            columns.push(ColumnDescriptor {
                name: format!("{child_name}_{}", col.name).into(),
                kind: col.kind.clone(),
                sem_type: col.sem_type,
                flags: col.flags - SemFlags::NOT_NULL,
            });
        }
    }
    StructDescriptor {
        name: format!("{}_widened", parent.name).into(),
        columns,
        is_backed: false,
    }
}

/// A single child's result set, re-packaged as its own named partition
/// object (spec §4.7.5 "one partition per child, keyed by the join
/// column(s)").
#[derive(Debug, Clone)]
pub struct PartitionObject {
    pub child_name: String,
    pub shape: Rc<StructDescriptor>,
    pub key_columns: Vec<String>,
}

pub fn build_partitions(children: &[(&str, Rc<StructDescriptor>, Vec<String>)]) -> Vec<PartitionObject> {
    children
        .iter()
        .map(|(name, shape, keys)| PartitionObject {
            child_name: name.to_string(),
            shape: shape.clone(),
            key_columns: keys.clone(),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutUnionResultType {
    SingleRow,
    MultiRow,
}

/// Whether a proc's aggregated `OUT UNION` usage produces a single-row or
/// multi-row result cursor: any child with a one-to-many join against the
/// parent forces the whole result multi-row (spec §4.7.5).
pub fn result_type(child_is_many: &[bool]) -> OutUnionResultType {
    if child_is_many.iter().any(|&m| m) {
        OutUnionResultType::MultiRow
    } else {
        OutUnionResultType::SingleRow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cql_core::sem::{ColumnDescriptor, CoreType, SemFlags};

    fn shape(name: &str, cols: &[(&str, SemFlags)]) -> StructDescriptor {
        StructDescriptor {
            name: name.into(),
            columns: cols
                .iter()
                .map(|(n, f)| ColumnDescriptor {
                    name: (*n).into(),
                    kind: None,
                    sem_type: CoreType::Int64,
                    flags: *f,
                })
                .collect(),
            is_backed: false,
        }
    }

    #[test]
    fn widened_shape_strips_not_null_from_child_columns() {
        let parent = shape("parent", &[("id", SemFlags::NOT_NULL)]);
        let child = Rc::new(shape("child", &[("v", SemFlags::NOT_NULL)]));
        let widened = widened_shape(&parent, &[("child", child)]);
        assert!(widened.find_column("id").unwrap().flags.contains(SemFlags::NOT_NULL));
        assert!(!widened.find_column("child_v").unwrap().flags.contains(SemFlags::NOT_NULL));
    }

    #[test]
    fn any_many_child_forces_multi_row() {
        assert_eq!(result_type(&[false, false]), OutUnionResultType::SingleRow);
        assert_eq!(result_type(&[false, true]), OutUnionResultType::MultiRow);
    }
}
