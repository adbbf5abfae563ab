//! Semantic record attached to analyzed nodes (spec §3.2).

mod record;

pub use record::{
    ColumnDescriptor, ConstValue, CoreType, JoinDescriptor, SemFlags, SemanticRecord,
    StructDescriptor, TableInfo,
};
