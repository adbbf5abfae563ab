//! Compilation context (spec §9 "Global state"): a language-neutral port
//! groups the arena, registries, location and options into a struct
//! threaded explicitly through every function, rather than leaving them as
//! C globals. `analyze(root, options) -> CompilationContext` is the single
//! top-level entry point.

use cql_core::macros::MacroRegistry;
use cql_core::AstArena;

use crate::registries::GlobalRegistries;

bitflags::bitflags! {
    /// `ENFORCE_*` pragma flags (SPEC_FULL.md supplement, grounded on
    /// `original_source/sources/ast.h`'s `ENFORCE_*` constants).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EnforcementOptions: u32 {
        const FK_ON_UPDATE       = 1 << 0;
        const FK_ON_DELETE       = 1 << 1;
        const STRICT_JOIN        = 1 << 2;
        const UPSERT_STMT        = 1 << 3;
        const WINDOW_FUNC        = 1 << 4;
        const CAST               = 1 << 5;
        const WITHOUT_ROWID      = 1 << 6;
        const TRANSACTION        = 1 << 7;
        const SELECT_IF_NOTHING  = 1 << 8;
        const INSERT_SELECT      = 1 << 9;
        const TABLE_FUNCTION     = 1 << 10;
        const SIGN_FUNCTION      = 1 << 11;
        const IS_TRUE            = 1 << 12;
        const CURSOR_HAS_ROW     = 1 << 13;
    }
}

impl Default for EnforcementOptions {
    fn default() -> Self {
        Self::empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    pub convert_hex: bool,
    pub enforcement: EnforcementOptions,
}

/// A single per-WITH-block map from CTE name to its analyzed struct
/// descriptor (spec §3.4). Pushed on entering a `WITH`, popped on exit.
#[derive(Debug, Default)]
pub struct CteScopeStack {
    frames: Vec<cql_helpers::IndexMap<smol_str::SmolStr, std::rc::Rc<cql_core::sem::StructDescriptor>>>,
}

impl CteScopeStack {
    pub fn push(&mut self) {
        self.frames.push(cql_helpers::IndexMap::default());
    }

    pub fn pop(&mut self) {
        self.frames.pop();
    }

    pub fn bind(&mut self, name: smol_str::SmolStr, desc: std::rc::Rc<cql_core::sem::StructDescriptor>) {
        self.frames
            .last_mut()
            .expect("bind called outside any WITH scope")
            .insert(name, desc);
    }

    /// Nested selects see the outer stack: search innermost-first.
    pub fn resolve(&self, name: &str) -> Option<&std::rc::Rc<cql_core::sem::StructDescriptor>> {
        self.frames.iter().rev().find_map(|f| f.get(name))
    }
}

pub struct CompilationContext {
    pub arena: AstArena,
    pub registries: GlobalRegistries,
    pub macros: MacroRegistry,
    pub cte_stack: CteScopeStack,
    pub options: CompileOptions,

    /// Schema-validation errors set this; all backends must refuse to emit
    /// once it is `true` (spec §7).
    pub exit_on_validation: bool,
    pub macro_expansion_errors: bool,
    pub diagnostics: Vec<cql_core::errors::SemanticError>,

    /// Cursor name -> lifecycle state, tracked for the duration of the
    /// enclosing procedure body (spec §4.6 "Cursor state machine").
    pub cursor_states: cql_helpers::IndexMap<smol_str::SmolStr, crate::analyzer::proc::CursorState>,
    /// Cursor name -> whether it was declared value-bound (`DECLARE ...
    /// CURSOR LIKE`/value cursor) rather than statement-bound (`DECLARE ...
    /// CURSOR FOR <select>`), set once at `DECLARE` time.
    pub cursor_value_bound: cql_helpers::IndexMap<smol_str::SmolStr, bool>,
    /// Out-union-returning proc name -> whether it has emitted at least one
    /// row yet (spec §4.6 "Out-union state machine").
    pub out_union_states: cql_helpers::IndexMap<smol_str::SmolStr, crate::analyzer::proc::OutUnionState>,
}

impl CompilationContext {
    pub fn new(options: CompileOptions) -> Self {
        Self {
            arena: AstArena::new(),
            registries: GlobalRegistries::new(),
            macros: MacroRegistry::new(),
            cte_stack: CteScopeStack::default(),
            options,
            exit_on_validation: false,
            macro_expansion_errors: false,
            diagnostics: Vec::new(),
            cursor_states: cql_helpers::IndexMap::default(),
            cursor_value_bound: cql_helpers::IndexMap::default(),
            out_union_states: cql_helpers::IndexMap::default(),
        }
    }

    pub fn record_error(&mut self, error: cql_core::errors::SemanticError) {
        self.diagnostics.push(error);
    }

    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}
