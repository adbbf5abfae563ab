use std::rc::Rc;

use cql_helpers::IndexSet;
use smol_str::SmolStr;

bitflags::bitflags! {
    /// 64-bit flag set (spec §3.2). Independent of `CoreType`: any subset of
    /// these may be set regardless of which core type bit is active.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SemFlags: u64 {
        const NOT_NULL            = 1 << 0;
        const HAS_DEFAULT         = 1 << 1;
        const AUTOINCREMENT       = 1 << 2;
        const IS_VARIABLE         = 1 << 3;
        const IN_PARAM            = 1 << 4;
        const OUT_PARAM           = 1 << 5;
        const DML_PROC            = 1 << 6;
        const HAS_SHAPE_STORAGE   = 1 << 7;
        const CREATE_FUNC         = 1 << 8;
        const SELECT_FUNC         = 1 << 9;
        const DELETED             = 1 << 10;
        const VALIDATED           = 1 << 11;
        const USES_OUT            = 1 << 12;
        const USES_OUT_UNION      = 1 << 13;
        const PK                  = 1 << 14;
        const FK                  = 1 << 15;
        const UK                  = 1 << 16;
        const VALUE_CURSOR        = 1 << 17;
        const SENSITIVE           = 1 << 18;
        const DEPLOYABLE_REGION   = 1 << 19;
        const BOXED               = 1 << 20;
        const HAS_CHECK           = 1 << 21;
        const HAS_COLLATE         = 1 << 22;
        const INFERRED_NOT_NULL   = 1 << 23;
        const VIRTUAL             = 1 << 24;
        const HIDDEN_COLUMN       = 1 << 25;
        const TVF                 = 1 << 26;
        const IMPLICIT_VARIABLE   = 1 << 27;
        const CALLS_OUT_UNION     = 1 << 28;
        const ALIAS               = 1 << 29;
        const INIT_REQUIRED       = 1 << 30;
        const INIT_COMPLETE       = 1 << 31;
        const INLINE_CALL         = 1 << 32;
        const SERIALIZE           = 1 << 33;
        const HAS_ROW             = 1 << 34;
        const FETCH_INTO          = 1 << 35;
        const WAS_SET             = 1 << 36;
        const BACKING_TABLE       = 1 << 37;
        const BACKED_TABLE        = 1 << 38;
        const PARTIAL_PK          = 1 << 39;
        const QID                 = 1 << 40;
        const CONSTANT            = 1 << 41;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoreType {
    #[default]
    Null,
    Bool,
    Int32,
    Int64,
    Real,
    Text,
    Blob,
    Object,
    Struct,
    Join,
    Error,
    Ok,
    Pending,
    Region,
    CursorFormal,
}

impl CoreType {
    /// SQLite's widening order for numeric promotion (spec §4.6 item 3):
    /// bool -> int -> long -> real. Used when combining two numeric-ish
    /// operands; the wider of the two wins.
    pub fn numeric_rank(self) -> Option<u8> {
        match self {
            CoreType::Bool => Some(0),
            CoreType::Int32 => Some(1),
            CoreType::Int64 => Some(2),
            CoreType::Real => Some(3),
            _ => None,
        }
    }

    pub fn widen(self, other: CoreType) -> Option<CoreType> {
        let (a, b) = (self.numeric_rank()?, other.numeric_rank()?);
        Some(if a >= b { self } else { other })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    pub name: SmolStr,
    pub kind: Option<SmolStr>,
    pub sem_type: CoreType,
    pub flags: SemFlags,
}

/// Named tuple of columns (spec §3.2): a table, view, cursor, proc result
/// shape, arg bundle, or named type, usable as the right operand of `LIKE`.
#[derive(Debug, Clone, PartialEq)]
pub struct StructDescriptor {
    pub name: SmolStr,
    pub columns: Vec<ColumnDescriptor>,
    pub is_backed: bool,
}

impl StructDescriptor {
    pub fn find_column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Non-hidden columns in declaration order, the expansion `LIKE T`
    /// draws from (spec §4.7.1, §8 boundary "zero non-hidden columns").
    pub fn visible_columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns
            .iter()
            .filter(|c| !c.flags.contains(SemFlags::HIDDEN_COLUMN))
    }
}

/// Ordered list of (alias, struct) pairs describing a FROM-clause scope
/// (spec §3.2).
#[derive(Debug, Clone, Default)]
pub struct JoinDescriptor {
    pub scopes: Vec<(SmolStr, Rc<StructDescriptor>)>,
}

impl JoinDescriptor {
    pub fn find_alias(&self, alias: &str) -> Option<&Rc<StructDescriptor>> {
        self.scopes
            .iter()
            .find(|(a, _)| a == alias)
            .map(|(_, s)| s)
    }

    /// Resolves an unqualified column name across every table in the join,
    /// returning `Err` on ambiguity the way spec §4.5 requires unless a
    /// disambiguation rule applies.
    pub fn resolve_unqualified<'a>(
        &'a self,
        column: &str,
    ) -> Result<Option<(&'a str, &'a ColumnDescriptor)>, ()> {
        let mut found = None;
        for (alias, s) in &self.scopes {
            if let Some(col) = s.find_column(column) {
                if found.is_some() {
                    return Err(());
                }
                found = Some((alias.as_str(), col));
            }
        }
        Ok(found)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Int(i64),
    Real(f64),
    Bool(bool),
    Text(SmolStr),
}

/// Table-info extension (spec §3.2), attached only to table nodes.
#[derive(Debug, Clone, Default)]
pub struct TableInfo {
    pub key_column_indices: Vec<usize>,
    pub not_null_column_indices: Vec<usize>,
    pub value_column_indices: Vec<usize>,
    pub type_hash: u64,
    pub indices: Vec<SmolStr>,
}

#[derive(Debug, Clone, Default)]
pub struct SemanticRecord {
    pub core_type: CoreType,
    pub flags: SemFlags,
    pub name: Option<SmolStr>,
    pub kind: Option<SmolStr>,
    pub error: Option<String>,
    pub backed_table: Option<SmolStr>,
    pub struct_desc: Option<Rc<StructDescriptor>>,
    pub join_desc: Option<Rc<JoinDescriptor>>,

    pub create_version: Option<i64>,
    pub delete_version: Option<i64>,
    pub unsubscribed_version: Option<i64>,
    pub recreate: bool,
    pub recreate_group: Option<SmolStr>,

    pub region: Option<SmolStr>,
    pub used_symbols: IndexSet<SmolStr>,
    pub const_value: Option<ConstValue>,

    pub table_info: Option<TableInfo>,
}

impl SemanticRecord {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            core_type: CoreType::Error,
            error: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.core_type == CoreType::Error
    }

    pub fn of_type(core_type: CoreType) -> Self {
        Self {
            core_type,
            flags: SemFlags::VALIDATED,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_widening_follows_sqlite_order() {
        assert_eq!(CoreType::Bool.widen(CoreType::Int64), Some(CoreType::Int64));
        assert_eq!(CoreType::Real.widen(CoreType::Bool), Some(CoreType::Real));
        assert_eq!(CoreType::Text.widen(CoreType::Int32), None);
    }

    #[test]
    fn visible_columns_excludes_hidden() {
        let s = StructDescriptor {
            name: "t".into(),
            columns: vec![
                ColumnDescriptor {
                    name: "a".into(),
                    kind: None,
                    sem_type: CoreType::Int64,
                    flags: SemFlags::NOT_NULL,
                },
                ColumnDescriptor {
                    name: "rowid".into(),
                    kind: None,
                    sem_type: CoreType::Int64,
                    flags: SemFlags::HIDDEN_COLUMN,
                },
            ],
            is_backed: false,
        };
        let names: Vec<_> = s.visible_columns().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a"]);
    }

    #[test]
    fn join_descriptor_detects_ambiguity() {
        let t1 = Rc::new(StructDescriptor {
            name: "t1".into(),
            columns: vec![ColumnDescriptor {
                name: "id".into(),
                kind: None,
                sem_type: CoreType::Int64,
                flags: SemFlags::empty(),
            }],
            is_backed: false,
        });
        let t2 = Rc::new(StructDescriptor {
            name: "t2".into(),
            columns: vec![ColumnDescriptor {
                name: "id".into(),
                kind: None,
                sem_type: CoreType::Int64,
                flags: SemFlags::empty(),
            }],
            is_backed: false,
        });
        let join = JoinDescriptor {
            scopes: vec![("a".into(), t1), ("b".into(), t2)],
        };
        assert!(join.resolve_unqualified("id").is_err());
    }
}
