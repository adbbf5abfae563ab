use smol_str::SmolStr;

use crate::arena::{Arena, Id};
use crate::ast::kinds::AstKind;
use crate::location::{ambient_location, SourceLocation};
use crate::sem::SemanticRecord;

pub type NodeId = Id<Node>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrSubtype {
    /// A bare SQL identifier (table/column/proc name, ...).
    Id,
    /// A C-style string literal (`"..."`), used in `printf` format strings
    /// and similar contexts.
    CStr,
    /// A quoted SQL identifier (`` `weird name` `` / `[weird name]`),
    /// carrying the quoted-identifier flag so emitters restore quoting.
    QuotedId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumKind {
    Int,
    Long,
    Real,
    Bool,
}

#[derive(Debug, Clone)]
pub enum NodePayload {
    /// Non-leaf nodes: up to two children, right-linear chains for lists.
    Branch {
        left: Option<NodeId>,
        right: Option<NodeId>,
    },
    Int(i64),
    /// Textual value retained verbatim (spec §3.1): `12`, `12L`, `1.5`,
    /// `true` are all distinct lexemes even when they'd compare equal
    /// numerically.
    Num { text: SmolStr, kind: NumKind },
    Str {
        value: SmolStr,
        subtype: StrSubtype,
    },
    Blob(SmolStr),
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: AstKind,
    pub loc: SourceLocation,
    pub parent: Option<NodeId>,
    pub payload: NodePayload,
    pub sem: Option<Box<SemanticRecord>>,
}

impl Node {
    pub fn left(&self) -> Option<NodeId> {
        match &self.payload {
            NodePayload::Branch { left, .. } => *left,
            _ => None,
        }
    }

    pub fn right(&self) -> Option<NodeId> {
        match &self.payload {
            NodePayload::Branch { right, .. } => *right,
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.sem.as_ref().is_some_and(|s| s.is_error())
    }
}

/// Owns the single arena every node in one compilation lives in, plus the
/// constructor/predicate/clone/mutate helper surface (spec §4.3).
#[derive(Debug, Default)]
pub struct AstArena {
    arena: Arena<Node>,
}

impl AstArena {
    pub fn new() -> Self {
        Self { arena: Arena::new() }
    }

    pub fn get(&self, id: NodeId) -> &Node {
        self.arena.get(id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        self.arena.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    fn alloc(&mut self, kind: AstKind, loc: SourceLocation, payload: NodePayload) -> NodeId {
        self.arena.alloc(Node {
            kind,
            loc,
            parent: None,
            payload,
            sem: None,
        })
    }

    /// `new_ast_X(l, r)`: both children populated.
    pub fn new_binary(&mut self, kind: AstKind, loc: SourceLocation, left: NodeId, right: NodeId) -> NodeId {
        debug_assert!(!kind.is_leaf());
        let id = self.alloc(
            kind,
            loc,
            NodePayload::Branch {
                left: Some(left),
                right: Some(right),
            },
        );
        self.attach_parent(left, id);
        self.attach_parent(right, id);
        id
    }

    /// `new_ast_X(l)`: single child populated, `right` empty.
    pub fn new_unary(&mut self, kind: AstKind, loc: SourceLocation, left: NodeId) -> NodeId {
        debug_assert!(!kind.is_leaf());
        let id = self.alloc(
            kind,
            loc,
            NodePayload::Branch {
                left: Some(left),
                right: None,
            },
        );
        self.attach_parent(left, id);
        id
    }

    /// `new_ast_X()`: no children (e.g. a marker node).
    pub fn new_leafless(&mut self, kind: AstKind, loc: SourceLocation) -> NodeId {
        debug_assert!(!kind.is_leaf());
        self.alloc(kind, loc, NodePayload::Branch { left: None, right: None })
    }

    pub fn new_int(&mut self, loc: SourceLocation, value: i64) -> NodeId {
        self.alloc(AstKind::IntLit, loc, NodePayload::Int(value))
    }

    pub fn new_num(&mut self, loc: SourceLocation, text: impl Into<SmolStr>, kind: NumKind) -> NodeId {
        self.alloc(
            AstKind::NumLit,
            loc,
            NodePayload::Num {
                text: text.into(),
                kind,
            },
        )
    }

    pub fn new_str(&mut self, loc: SourceLocation, value: impl Into<SmolStr>, subtype: StrSubtype) -> NodeId {
        self.alloc(
            AstKind::StrLit,
            loc,
            NodePayload::Str {
                value: value.into(),
                subtype,
            },
        )
    }

    pub fn new_blob(&mut self, loc: SourceLocation, value: impl Into<SmolStr>) -> NodeId {
        self.alloc(AstKind::BlobLit, loc, NodePayload::Blob(value.into()))
    }

    /// Constructs a chain node whose `left` is `element` and `right` is the
    /// (possibly absent) continuation of the list, using the ambient
    /// rewrite-scope location. For use by rewrite code only; parser-built
    /// chains should go through [`AstArena::new_binary`]/`new_unary`
    /// directly with a real location.
    pub fn new_chain_node(&mut self, kind: AstKind, element: NodeId, tail: Option<NodeId>) -> NodeId {
        debug_assert!(kind.is_chain());
        let loc = ambient_location();
        match tail {
            Some(t) => self.new_binary(kind, loc, element, t),
            None => self.new_unary(kind, loc, element),
        }
    }

    fn attach_parent(&mut self, child: NodeId, parent: NodeId) {
        self.arena.get_mut(child).parent = Some(parent);
    }

    pub fn set_left(&mut self, node: NodeId, left: Option<NodeId>) {
        if let Some(l) = left {
            self.attach_parent(l, node);
        }
        match &mut self.arena.get_mut(node).payload {
            NodePayload::Branch { left: l, .. } => *l = left,
            _ => panic!("set_left on a leaf node"),
        }
    }

    pub fn set_right(&mut self, node: NodeId, right: Option<NodeId>) {
        if let Some(r) = right {
            self.attach_parent(r, node);
        }
        match &mut self.arena.get_mut(node).payload {
            NodePayload::Branch { right: r, .. } => *r = right,
            _ => panic!("set_right on a leaf node"),
        }
    }

    /// Deep-clones the subtree rooted at `id`, producing a fresh isomorphic
    /// subtree in the same arena with no parent pointer set on the clone's
    /// root (the caller attaches it). Locations are preserved verbatim;
    /// semantic records are dropped since the clone is not yet analyzed.
    pub fn clone_tree(&mut self, id: NodeId) -> NodeId {
        let node = self.arena.get(id).clone();
        let payload = match node.payload {
            NodePayload::Branch { left, right } => NodePayload::Branch {
                left: left.map(|l| self.clone_tree(l)),
                right: right.map(|r| self.clone_tree(r)),
            },
            other => other,
        };
        let new_id = self.arena.alloc(Node {
            kind: node.kind,
            loc: node.loc,
            parent: None,
            payload,
            sem: None,
        });
        if let NodePayload::Branch { left, right } = &self.arena.get(new_id).payload {
            if let Some(l) = *left {
                self.attach_parent(l, new_id);
            }
            if let Some(r) = *right {
                self.attach_parent(r, new_id);
            }
        }
        new_id
    }

    pub fn is_kind(&self, id: NodeId, kind: AstKind) -> bool {
        self.get(id).kind == kind
    }

    pub fn is_any_macro_ref(&self, id: NodeId) -> bool {
        matches!(self.get(id).kind, AstKind::MacroRef | AstKind::MacroArgRef)
    }

    pub fn is_primitive(&self, id: NodeId) -> bool {
        matches!(
            self.get(id).sem.as_deref().map(|s| s.core_type),
            Some(crate::sem::CoreType::Int32)
                | Some(crate::sem::CoreType::Int64)
                | Some(crate::sem::CoreType::Real)
                | Some(crate::sem::CoreType::Bool)
        )
    }

    pub fn is_id(&self, id: NodeId) -> bool {
        matches!(self.get(id).kind, AstKind::Id)
    }

    pub fn is_qid(&self, id: NodeId) -> bool {
        matches!(
            &self.get(id).payload,
            NodePayload::Str {
                subtype: StrSubtype::QuotedId,
                ..
            }
        )
    }

    /// Walks a right-linear chain into a `Vec` of its elements, left to
    /// right, the typed-destructuring idiom that replaces the original's
    /// `EXTRACT_*` macros for list-shaped nodes.
    pub fn chain_elements(&self, mut id: Option<NodeId>) -> Vec<NodeId> {
        let mut out = Vec::new();
        while let Some(cur) = id {
            let node = self.get(cur);
            out.push(node.left().expect("chain node must have an element"));
            id = node.right();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::SourceLocation;

    fn loc() -> SourceLocation {
        SourceLocation::new("t.sql", 1)
    }

    #[test]
    fn binary_attaches_parent_pointers() {
        let mut a = AstArena::new();
        let l = a.new_int(loc(), 1);
        let r = a.new_int(loc(), 2);
        let n = a.new_binary(AstKind::Add, loc(), l, r);
        assert_eq!(a.get(l).parent, Some(n));
        assert_eq!(a.get(r).parent, Some(n));
    }

    #[test]
    fn clone_tree_is_isomorphic_but_distinct() {
        let mut a = AstArena::new();
        let l = a.new_int(loc(), 1);
        let r = a.new_int(loc(), 2);
        let n = a.new_binary(AstKind::Add, loc(), l, r);
        let cloned = a.clone_tree(n);
        assert_ne!(cloned, n);
        assert_eq!(a.get(cloned).kind, AstKind::Add);
        let cl = a.get(cloned).left().unwrap();
        assert_ne!(cl, l);
        match a.get(cl).payload {
            NodePayload::Int(v) => assert_eq!(v, 1),
            _ => panic!("expected int"),
        }
    }

    #[test]
    fn chain_elements_walks_left_to_right() {
        let mut a = AstArena::new();
        let e1 = a.new_int(loc(), 1);
        let e2 = a.new_int(loc(), 2);
        let e3 = a.new_int(loc(), 3);
        let tail = a.new_unary(AstKind::ExprList, loc(), e3);
        let mid = a.new_binary(AstKind::ExprList, loc(), e2, tail);
        let head = a.new_binary(AstKind::ExprList, loc(), e1, mid);
        let elements = a.chain_elements(Some(head));
        assert_eq!(elements.len(), 3);
        assert_eq!(elements[0], e1);
        assert_eq!(elements[2], e3);
    }
}
