use std::hash::BuildHasherDefault;

/// Insertion-order preserving map, keyed the way the global registries in
/// §3.3 require: deterministic iteration order for emission.
pub type IndexMap<K, V> = indexmap::IndexMap<K, V, BuildHasherDefault<ahash::AHasher>>;
pub type IndexSet<V> = indexmap::IndexSet<V, BuildHasherDefault<ahash::AHasher>>;

/// Small builder-style ergonomics helper, used throughout the analyzer and
/// rewriter for constructing nodes/records with a handful of fields set.
pub trait Config: Sized {
    fn config(mut self, f: impl FnOnce(&mut Self)) -> Self {
        f(&mut self);
        self
    }
}

impl<T> Config for T {}

/// Stable, dependency-free 64-bit hash used for schema object type hashes
/// (§4.7.4) and CRCs (§4.8). Not cryptographic; only needs to be stable
/// across runs of this process, which a fixed-seed FNV-1a gives us.
pub fn fnv64(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    let mut hash = OFFSET;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fnv64_is_stable() {
        assert_eq!(fnv64(b"hello"), fnv64(b"hello"));
        assert_ne!(fnv64(b"hello"), fnv64(b"world"));
    }
}
