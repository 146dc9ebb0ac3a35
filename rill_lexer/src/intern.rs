//! String interning over an arena-backed data pool

use hashbrown::HashTable;
use rill_alloc::{Arena, HeapAlloc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Offset of an interned string in the data pool. Offset 0 never names a
/// real string and doubles as "absent".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Istr(pub u32);

impl Istr {
    pub const ABSENT: Istr = Istr(0);

    pub fn is_absent(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Istr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// Append-only pool of null-terminated strings with a content-hash index.
///
/// Interning equal byte sequences yields equal offsets; strings are never
/// relocated once interned (arena offsets are stable across growth).
pub struct InternPool<'h> {
    data: Arena<'h>,
    index: HashTable<Istr>,
}

impl<'h> InternPool<'h> {
    pub fn new(heap: &'h HeapAlloc) -> Self {
        let mut data = Arena::with_capacity(heap, 1024);
        // Burn the first bytes so that offset 0 means "not interned".
        data.allocate(std::mem::size_of::<u32>());
        Self { data, index: HashTable::new() }
    }

    pub fn intern(&mut self, string: &str) -> Istr {
        let bytes = string.as_bytes();
        let hash = fnv1a(bytes);
        let data = &self.data;
        let entry = self.index.entry(
            hash,
            |&candidate| str_at(data, candidate).as_bytes() == bytes,
            |&existing| fnv1a(str_at(data, existing).as_bytes()),
        );
        match entry {
            hashbrown::hash_table::Entry::Occupied(occupied) => *occupied.get(),
            hashbrown::hash_table::Entry::Vacant(vacant) => {
                let istr = Istr(self.data.append(bytes));
                self.data.append(&[0]);
                vacant.insert(istr);
                istr
            }
        }
    }

    /// Resolve an interned offset back to its string. The absent offset
    /// resolves to the empty string.
    pub fn get(&self, istr: Istr) -> &str {
        if istr.is_absent() {
            return "";
        }
        str_at(&self.data, istr)
    }

    /// Bytes currently held by the pool, including the reserved prefix.
    pub fn bytes_used(&self) -> usize {
        self.data.used()
    }

    pub fn entry_count(&self) -> usize {
        self.index.len()
    }
}

fn str_at<'a>(data: &'a Arena<'_>, istr: Istr) -> &'a str {
    let bytes = data.bytes();
    let start = istr.0 as usize;
    let end = bytes[start..]
        .iter()
        .position(|b| *b == 0)
        .map(|i| start + i)
        .unwrap_or(bytes.len());
    // The pool only ever stores byte slices taken from UTF-8 source text.
    std::str::from_utf8(&bytes[start..end]).expect("intern pool holds valid UTF-8")
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = OFFSET;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_idempotent() {
        let heap = HeapAlloc::new();
        let mut pool = InternPool::new(&heap);
        let a = pool.intern("hello");
        let b = pool.intern("world");
        let c = pool.intern("hello");
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(pool.entry_count(), 2);
    }

    #[test]
    fn offset_zero_is_reserved() {
        let heap = HeapAlloc::new();
        let mut pool = InternPool::new(&heap);
        let first = pool.intern("x");
        assert!(!first.is_absent());
        assert_eq!(pool.get(Istr::ABSENT), "");
    }

    #[test]
    fn strings_survive_pool_growth() {
        let heap = HeapAlloc::new();
        let mut pool = InternPool::new(&heap);
        let early = pool.intern("early");
        for i in 0..500 {
            pool.intern(&format!("filler_{i}"));
        }
        assert_eq!(pool.get(early), "early");
    }

    #[test]
    fn distinct_contents_get_distinct_offsets() {
        let heap = HeapAlloc::new();
        let mut pool = InternPool::new(&heap);
        let a = pool.intern("ab");
        let b = pool.intern("abc");
        let c = pool.intern("a");
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(b, c);
        assert_eq!(pool.get(a), "ab");
        assert_eq!(pool.get(b), "abc");
        assert_eq!(pool.get(c), "a");
    }
}
