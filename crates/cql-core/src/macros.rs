//! Macro expansion (spec §4.4). Macros are ordinary AST nodes (`MacroDef`,
//! `MacroRef`, `MacroArgRef`) recognized by kind; expansion is a single pass
//! over the tree run before semantic analysis.

use cql_helpers::IndexMap;
use smol_str::SmolStr;

use crate::ast::{AstArena, AstKind, NodeId};
use crate::location::{open_rewrite_scope, SourceLocation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacroKind {
    Expression,
    QueryParts,
    CteTables,
    SelectCore,
    SelectExpr,
    StmtList,
}

#[derive(Debug, Clone)]
pub struct MacroDef {
    pub kind: MacroKind,
    pub formals: Vec<SmolStr>,
    pub body: NodeId,
}

#[derive(Debug, Default)]
pub struct MacroRegistry {
    defs: IndexMap<SmolStr, MacroDef>,
}

impl MacroRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, name: impl Into<SmolStr>, def: MacroDef) {
        self.defs.insert(name.into(), def);
    }

    pub fn lookup(&self, name: &str) -> Option<&MacroDef> {
        self.defs.get(name)
    }
}

/// Recursion guard: the original fails expansion rather than looping
/// forever on a macro that (directly or indirectly) references itself.
const MAX_EXPANSION_DEPTH: u32 = 32;

pub struct MacroExpander<'a> {
    registry: &'a MacroRegistry,
    errors: Vec<String>,
}

impl<'a> MacroExpander<'a> {
    pub fn new(registry: &'a MacroRegistry) -> Self {
        Self {
            registry,
            errors: Vec::new(),
        }
    }

    /// Sets the `macro_expansion_errors` flag (spec §4.4) when any
    /// statement failed to expand; analysis of that statement is the
    /// caller's responsibility to skip.
    pub fn had_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Expands every `MacroRef` reachable from `root`, replacing it in
    /// place with the macro body's clone (arguments substituted). Returns
    /// the possibly-rewritten root id (identical to `root` unless `root`
    /// itself was a macro reference).
    pub fn expand(&mut self, arena: &mut AstArena, root: NodeId) -> NodeId {
        self.expand_rec(arena, root, 0)
    }

    fn expand_rec(&mut self, arena: &mut AstArena, id: NodeId, depth: u32) -> NodeId {
        if depth > MAX_EXPANSION_DEPTH {
            self.errors.push(format!(
                "macro expansion exceeded depth {MAX_EXPANSION_DEPTH}"
            ));
            return id;
        }

        let kind = arena.get(id).kind;
        if kind == AstKind::MacroRef {
            return self.expand_ref(arena, id, depth);
        }

        if let (Some(left), Some(right)) = (arena.get(id).left(), arena.get(id).right()) {
            let nl = self.expand_rec(arena, left, depth);
            let nr = self.expand_rec(arena, right, depth);
            if nl != left {
                arena.set_left(id, Some(nl));
            }
            if nr != right {
                arena.set_right(id, Some(nr));
            }
        } else if let Some(left) = arena.get(id).left() {
            let nl = self.expand_rec(arena, left, depth);
            if nl != left {
                arena.set_left(id, Some(nl));
            }
        }
        id
    }

    fn expand_ref(&mut self, arena: &mut AstArena, id: NodeId, depth: u32) -> NodeId {
        let (name, arg_ids) = self.macro_ref_parts(arena, id);
        let Some(def) = self.registry.lookup(&name) else {
            self.errors.push(format!("undefined macro `{name}`"));
            return id;
        };
        if def.formals.len() != arg_ids.len() {
            self.errors.push(format!(
                "macro `{name}` expects {} argument(s), got {}",
                def.formals.len(),
                arg_ids.len()
            ));
            return id;
        }

        let loc = arena.get(id).loc.clone();
        let body = def.body;
        let formals = def.formals.clone();
        let _guard = open_rewrite_scope(loc);
        let body_clone = arena.clone_tree(body);
        let bindings: Vec<(SmolStr, NodeId)> = formals.into_iter().zip(arg_ids).collect();
        self.substitute_args(arena, body_clone, &bindings);
        self.expand_rec(arena, body_clone, depth + 1)
    }

    fn macro_ref_parts(&self, arena: &AstArena, id: NodeId) -> (SmolStr, Vec<NodeId>) {
        // By convention a MacroRef's `left` is a name-bearing Id/Str node
        // and `right` is the head of an ExprList chain of arguments.
        let left = arena.get(id).left().expect("macro_ref missing name");
        let name = match &arena.get(left).payload {
            crate::ast::NodePayload::Str { value, .. } => value.clone(),
            _ => panic!("macro_ref name must be a str node"),
        };
        let args = arena.chain_elements(arena.get(id).right());
        (name, args)
    }

    fn substitute_args(&mut self, arena: &mut AstArena, id: NodeId, bindings: &[(SmolStr, NodeId)]) {
        let kind = arena.get(id).kind;
        if kind == AstKind::MacroArgRef {
            let left = arena.get(id).left().expect("macro_arg_ref missing name");
            let name = match &arena.get(left).payload {
                crate::ast::NodePayload::Str { value, .. } => value.clone(),
                _ => return,
            };
            if let Some((_, arg)) = bindings.iter().find(|(n, _)| *n == name) {
                let replacement = arena.clone_tree(*arg);
                if let Some(parent) = arena.get(id).parent {
                    if arena.get(parent).left() == Some(id) {
                        arena.set_left(parent, Some(replacement));
                    } else if arena.get(parent).right() == Some(id) {
                        arena.set_right(parent, Some(replacement));
                    }
                }
            } else {
                self.errors.push(format!("unbound macro argument `{name}`"));
            }
            return;
        }

        let (left, right) = (arena.get(id).left(), arena.get(id).right());
        if let Some(l) = left {
            self.substitute_args(arena, l, bindings);
        }
        if let Some(r) = right {
            self.substitute_args(arena, r, bindings);
        }
    }
}

pub fn source_location(filename: &str, line: u32) -> SourceLocation {
    SourceLocation::new(filename, line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::NumKind;
    use crate::location::SourceLocation;

    fn loc() -> SourceLocation {
        SourceLocation::new("t.sql", 1)
    }

    #[test]
    fn expands_simple_expression_macro() {
        let mut arena = AstArena::new();
        // body: arg_ref(x) + 1
        let x_name = arena.new_str(loc(), "x", crate::ast::StrSubtype::Id);
        let x_ref = arena.new_unary(AstKind::MacroArgRef, loc(), x_name);
        let one = arena.new_num(loc(), "1", NumKind::Int);
        let body = arena.new_binary(AstKind::Add, loc(), x_ref, one);

        let mut registry = MacroRegistry::new();
        registry.define(
            "inc",
            MacroDef {
                kind: MacroKind::Expression,
                formals: vec!["x".into()],
                body,
            },
        );

        let mac_name = arena.new_str(loc(), "inc", crate::ast::StrSubtype::Id);
        let arg = arena.new_num(loc(), "41", NumKind::Int);
        let args = arena.new_unary(AstKind::ExprList, loc(), arg);
        let macro_ref = arena.new_binary(AstKind::MacroRef, loc(), mac_name, args);

        let mut expander = MacroExpander::new(&registry);
        let expanded = expander.expand(&mut arena, macro_ref);
        assert!(!expander.had_errors());
        assert_eq!(arena.get(expanded).kind, AstKind::Add);
        let lhs = arena.get(expanded).left().unwrap();
        match arena.get(lhs).payload {
            crate::ast::NodePayload::Num { ref text, .. } => assert_eq!(text.as_str(), "41"),
            _ => panic!("expected substituted literal"),
        }
    }

    #[test]
    fn wrong_arity_is_recorded_as_error_not_panic() {
        let mut arena = AstArena::new();
        let body = arena.new_num(loc(), "1", NumKind::Int);
        let mut registry = MacroRegistry::new();
        registry.define(
            "zero_arg",
            MacroDef {
                kind: MacroKind::Expression,
                formals: vec![],
                body,
            },
        );
        let mac_name = arena.new_str(loc(), "zero_arg", crate::ast::StrSubtype::Id);
        let arg = arena.new_num(loc(), "1", NumKind::Int);
        let args = arena.new_unary(AstKind::ExprList, loc(), arg);
        let macro_ref = arena.new_binary(AstKind::MacroRef, loc(), mac_name, args);

        let mut expander = MacroExpander::new(&registry);
        expander.expand(&mut arena, macro_ref);
        assert!(expander.had_errors());
    }
}
