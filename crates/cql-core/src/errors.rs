//! Error taxonomy (spec §7). Semantic errors are node-attached, not raised;
//! this type is what gets attached, and is also what the JSON/query-plan
//! emitters bubble up when a global flag (schema-validation, macro
//! expansion) forces them to refuse to emit.

use thiserror::Error;

/// A single semantic diagnostic, stable-coded the way CQLxxxx codes are in
/// the original (spec §7). `subject` is the offending name/expression text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}: {subject}")]
pub struct SemanticError {
    pub code: &'static str,
    pub message: &'static str,
    pub subject: String,
}

impl SemanticError {
    pub fn new(code: &'static str, message: &'static str, subject: impl Into<String>) -> Self {
        Self {
            code,
            message,
            subject: subject.into(),
        }
    }
}

/// Top-level error type threaded through the analyzer/rewriter/emitters.
/// Mirrors spec §7's three non-assertion classes; assertion-class shape
/// violations are `panic!`/`debug_assert!` in this port, consistent with
/// "internal bug, not user error, and abort".
#[derive(Debug, Error)]
pub enum CqlError {
    /// A single statement failed analysis; already recorded on its node.
    /// Carried here only so callers that want to short-circuit a whole
    /// backend run (rather than continue to the next statement) can do so.
    #[error("semantic error: {0}")]
    Semantic(#[from] SemanticError),

    /// Schema-validation failed (mismatched prior schema, bad version
    /// numbers, recreate-group cycle). Sets a global flag; all backends
    /// must refuse to emit once this has fired once in a compilation.
    #[error("schema validation failed: {0}")]
    SchemaValidation(String),

    /// Macro expansion failed for at least one statement; that statement's
    /// analysis was skipped but the compilation as a whole continues.
    #[error("macro expansion failed: {0}")]
    MacroExpansion(String),

    /// Unrecoverable: caller should run cleanup-and-exit.
    #[error("fatal: {0}")]
    Fatal(String),
}

pub type CqlResult<T> = Result<T, CqlError>;

/// Common semantic error codes used across the analyzer, named the way the
/// original's stable CQLxxxx codes are so messages stay greppable.
pub mod codes {
    pub const NAME_NOT_FOUND: &str = "CQL0069";
    pub const CURSOR_WITHOUT_FIELDS: &str = "CQL0298";
    pub const DUPLICATE_NAME: &str = "CQL0036";
    pub const TYPE_MISMATCH: &str = "CQL0072";
    pub const REGION_NOT_ACCESSIBLE: &str = "CQL0401";
    pub const RECREATE_GROUP_CYCLE: &str = "CQL0402";
    pub const INVALID_SCHEMA_VERSION: &str = "CQL0403";
    pub const EMPTY_FROM_SHAPE: &str = "CQL0404";
    pub const COLUMNS_STAR_NO_FROM: &str = "CQL0405";
    pub const OPERATOR_NOT_FOUND: &str = "CQL0406";
    pub const OUT_OUT_UNION_MIX: &str = "CQL0407";
    pub const CURSOR_STATE: &str = "CQL0408";
    pub const UPSERT_CONFLICT_NOT_KEY: &str = "CQL0409";
}
