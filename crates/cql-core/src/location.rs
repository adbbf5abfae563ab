use smol_str::SmolStr;
use std::cell::Cell;

/// Source location carried on every node (spec §3.1). `filename` is interned
/// as a `SmolStr` so clones are cheap; cloning a subtree keeps the original
/// locations, it does not re-stamp them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub filename: SmolStr,
    pub line: u32,
}

impl SourceLocation {
    pub fn new(filename: impl Into<SmolStr>, line: u32) -> Self {
        Self {
            filename: filename.into(),
            line,
        }
    }

    /// The sentinel location asserted to be ambient outside any rewrite
    /// scope. Matches the "reset" contract in spec §3.1: stray node
    /// construction outside a scope faults immediately because this
    /// sentinel's line is 0, which no real source location ever has.
    pub fn sentinel() -> Self {
        Self {
            filename: SmolStr::new_static("<no-rewrite-scope>"),
            line: 0,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.line == 0
    }
}

thread_local! {
    static AMBIENT_LOCATION: Cell<Option<SourceLocation>> = const { Cell::new(None) };
}

/// Guard returned by [`open_rewrite_scope`]. Restores the previously ambient
/// location (possibly `None`) when dropped, implementing the save/restore
/// discipline spec §5 requires for nested rewrites.
pub struct RewriteScopeGuard {
    previous: Option<SourceLocation>,
    _not_send: std::marker::PhantomData<*const ()>,
}

impl Drop for RewriteScopeGuard {
    fn drop(&mut self) {
        AMBIENT_LOCATION.with(|cell| cell.set(self.previous.take()));
    }
}

/// Opens a rewrite scope supplying the location newly minted nodes should
/// use. Rewrite code must call this before constructing any node and let
/// the returned guard fall out of scope (or drop it explicitly) when done.
pub fn open_rewrite_scope(loc: SourceLocation) -> RewriteScopeGuard {
    tracing::trace!(file = %loc.filename, line = loc.line, "entering rewrite scope");
    let previous = AMBIENT_LOCATION.with(|cell| cell.replace(Some(loc)));
    RewriteScopeGuard {
        previous,
        _not_send: std::marker::PhantomData,
    }
}

/// The location new nodes should be stamped with right now, or the sentinel
/// if nothing opened a rewrite scope. Parser-supplied nodes bypass this and
/// carry their own locations directly; only rewrite-minted nodes read it.
pub fn ambient_location() -> SourceLocation {
    AMBIENT_LOCATION.with(|cell| {
        let current = cell.take();
        let result = current.clone().unwrap_or_else(SourceLocation::sentinel);
        cell.set(current);
        result
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_outside_scope() {
        assert!(ambient_location().is_sentinel());
    }

    #[test]
    fn scope_save_restore_nests() {
        assert!(ambient_location().is_sentinel());
        {
            let _g1 = open_rewrite_scope(SourceLocation::new("a.sql", 10));
            assert_eq!(ambient_location().line, 10);
            {
                let _g2 = open_rewrite_scope(SourceLocation::new("a.sql", 20));
                assert_eq!(ambient_location().line, 20);
            }
            assert_eq!(ambient_location().line, 10);
        }
        assert!(ambient_location().is_sentinel());
    }
}
