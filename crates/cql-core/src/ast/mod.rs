pub mod kinds;
mod node;
mod print;

pub use kinds::AstKind;
pub use node::{AstArena, Node, NodeId, NodePayload, NumKind, StrSubtype};
pub use print::pretty_print;
