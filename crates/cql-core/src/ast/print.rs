//! Indented textual pretty printer (spec §4.3), used by test harnesses to
//! assert tree shape without depending on a particular backend's text
//! generator.

use crate::ast::node::{AstArena, NodeId, NodePayload};
use crate::buffers::CharBuffer;

pub fn pretty_print(arena: &AstArena, root: NodeId) -> String {
    let mut buf = CharBuffer::new();
    print_node(arena, root, &mut buf);
    buf.into_string()
}

fn print_node(arena: &AstArena, id: NodeId, buf: &mut CharBuffer) {
    let node = arena.get(id);
    match &node.payload {
        NodePayload::Int(v) => {
            buf.appendln(&format!("{} {}", node.kind, v));
        }
        NodePayload::Num { text, kind } => {
            buf.appendln(&format!("{} {} ({:?})", node.kind, text, kind));
        }
        NodePayload::Str { value, subtype } => {
            buf.appendln(&format!("{} {:?} ({:?})", node.kind, value, subtype));
        }
        NodePayload::Blob(value) => {
            buf.appendln(&format!("{} {:?}", node.kind, value));
        }
        NodePayload::Branch { left, right } => {
            buf.appendln(&node.kind.to_string());
            buf.indent_in();
            if let Some(l) = left {
                print_node(arena, *l, buf);
            }
            if let Some(r) = right {
                print_node(arena, *r, buf);
            }
            buf.indent_out();
        }
    }
}
