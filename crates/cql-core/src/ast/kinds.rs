//! The closed set of AST node tags (spec §3.1, §9 "Tagged nodes vs. sum
//! types"). The original carries ~250 interned type-name strings with
//! pointer identity; a port prefers a closed sum type, which is what this
//! is. Variants are grouped by the section of the language they belong to.
//! `strum` gives us the `&'static str` round-trip the pretty printer and
//! JSON emitter want without hand-writing a match arm per variant, the way
//! `SyntaxKind` does it in the teacher (`lib-core/src/dialects/syntax.rs`).

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum_macros::IntoStaticStr,
    strum_macros::EnumString,
    strum_macros::Display,
)]
#[strum(serialize_all = "snake_case")]
pub enum AstKind {
    // ---- literal leaves (specialized payload, see `NodePayload`) ----
    IntLit,
    NumLit,
    StrLit,
    BlobLit,

    // ---- generic chains (right-linear lists: left = element, right = tail) ----
    StmtList,
    NameList,
    ExprList,
    ColumnDefList,
    SelectExprList,
    InsertListOrNone,

    // ---- identifiers / references ----
    Id,
    DotId,
    QualifiedId,

    // ---- expressions ----
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,
    Not,
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Concat,
    Arrow,
    LShift,
    RShift,
    BitAnd,
    BitOr,
    BitNot,
    Between,
    In,
    NotIn,
    Like,
    NotLike,
    IsNull,
    IsNotNull,
    Is,
    IsNot,
    Cast,
    Case,
    CaseList,
    CaseWhen,
    Call,
    ArgList,
    ReverseApply,
    PolymorphicApply,
    ArrayGet,
    ArraySet,
    Iif,

    // ---- shape sugar (desugared by the rewriter, §4.7.1) ----
    LikeShape,
    FromShape,
    ColumnsSpec,
    ColumnsSpecDistinct,
    ArgBundle,

    // ---- column / table DDL ----
    ColumnDef,
    ColumnConstraintNotNull,
    ColumnConstraintDefault,
    ColumnConstraintPrimaryKey,
    ColumnConstraintForeignKey,
    ColumnConstraintUnique,
    ColumnConstraintCheck,
    ColumnConstraintCollate,
    ColumnConstraintAutoIncrement,
    CreateTable,
    CreateVirtualTable,
    AlterTableAddColumn,
    DropTable,
    CreateView,
    DropView,
    CreateIndex,
    DropIndex,
    CreateTrigger,
    DropTrigger,

    // ---- schema versioning / attributes ----
    AttrCreate,
    AttrDelete,
    AttrRecreate,
    MiscAttr,

    // ---- regions ----
    DeclareRegion,
    DeclareDeployableRegion,
    RegionList,

    // ---- enums / constants ----
    DeclareEnum,
    EnumValues,
    DeclareConst,
    DeclareConstGroup,

    // ---- named types ----
    DeclareNamedType,

    // ---- select core ----
    SelectStmt,
    SelectCore,
    WithClause,
    CteBinding,
    FromClause,
    JoinClause,
    JoinOnCondition,
    JoinUsingCondition,
    WhereClause,
    GroupByClause,
    HavingClause,
    OrderByClause,
    LimitClause,
    OffsetClause,
    TableOrSubquery,

    // ---- DML ----
    InsertStmt,
    InsertValuesList,
    UpdateStmt,
    UpdateSetList,
    UpdateSetItem,
    DeleteStmt,
    UpsertStmt,
    OnConflictClause,
    UpsertSetList,

    // ---- procedures / functions ----
    CreateProc,
    DeclareProc,
    DeclareFunc,
    DeclareSelectFunc,
    DeclareUncheckedFunc,
    ParamList,
    Param,
    ProcResultShape,

    // ---- procedural control flow ----
    IfStmt,
    IfGuardStmt,
    ElseIfClause,
    ElseClause,
    WhileStmt,
    LoopStmt,
    TryCatchStmt,
    ThrowStmt,
    ReturnStmt,
    LeaveStmt,
    ContinueStmt,
    LetStmt,
    SetStmt,
    CompoundAssign,
    CallStmt,
    OutStmt,
    OutUnionStmt,
    OutUnionParentChildStmt,
    BeginTransactionStmt,
    CommitTransactionStmt,
    RollbackTransactionStmt,

    // ---- cursors ----
    DeclareCursor,
    DeclareCursorLike,
    DeclareValueCursor,
    OpenStmt,
    FetchStmt,
    FetchIntoStmt,
    CloseStmt,

    // ---- macros ----
    MacroDef,
    MacroFormalList,
    MacroRef,
    MacroArgRef,

    // ---- subscriptions / ad-hoc migration ----
    DeclareSubscription,
    DeclareAdHocMigration,

    // ---- misc / error ----
    ErrorNode,
}

impl AstKind {
    /// `true` for the four leaf kinds that use a literal payload instead of
    /// `left`/`right` children (spec §3.1).
    pub fn is_leaf(self) -> bool {
        matches!(
            self,
            AstKind::IntLit | AstKind::NumLit | AstKind::StrLit | AstKind::BlobLit
        )
    }

    /// Right-linear chain kinds, used as the generic "n-ary list" shape
    /// (spec §3.1 "Lifetime").
    pub fn is_chain(self) -> bool {
        matches!(
            self,
            AstKind::StmtList
                | AstKind::NameList
                | AstKind::ExprList
                | AstKind::ColumnDefList
                | AstKind::SelectExprList
                | AstKind::InsertListOrNone
                | AstKind::ArgList
                | AstKind::CaseList
                | AstKind::RegionList
                | AstKind::ParamList
                | AstKind::EnumValues
                | AstKind::UpdateSetList
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn roundtrips_through_static_str() {
        let s: &'static str = AstKind::CreateTable.into();
        assert_eq!(s, "create_table");
        assert_eq!(AstKind::from_str("create_table").unwrap(), AstKind::CreateTable);
    }

    #[test]
    fn leaf_classification() {
        assert!(AstKind::IntLit.is_leaf());
        assert!(!AstKind::CreateTable.is_leaf());
    }
}
