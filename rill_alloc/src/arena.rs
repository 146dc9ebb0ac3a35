//! Byte arena with stable offsets

use crate::{AllocId, Backend, BackendKind, HeapAlloc};

/// A bump region growing geometrically through its parent allocator.
///
/// Allocations are identified by their byte offset, which stays valid for the
/// lifetime of the arena even across growth. Deallocation is honored only for
/// the most recent allocation (the bump pointer is rolled back); anything
/// else is a silent no-op.
#[derive(Debug)]
pub struct Arena<'p> {
    parent: &'p HeapAlloc,
    data: Box<[u8]>,
    used: usize,
}

impl<'p> Arena<'p> {
    pub fn new(parent: &'p HeapAlloc) -> Self {
        Self { parent, data: Box::default(), used: 0 }
    }

    pub fn with_capacity(parent: &'p HeapAlloc, capacity: usize) -> Self {
        Self { parent, data: parent.allocate(capacity), used: 0 }
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Reserve `size` zeroed bytes and return their offset.
    pub fn allocate(&mut self, size: usize) -> u32 {
        if self.used + size > self.data.len() {
            self.grow(size);
        }
        let offset = self.used;
        self.used += size;
        offset as u32
    }

    /// Append `bytes` and return the offset of the copy.
    pub fn append(&mut self, bytes: &[u8]) -> u32 {
        let offset = self.allocate(bytes.len());
        self.data[offset as usize..offset as usize + bytes.len()].copy_from_slice(bytes);
        offset
    }

    /// Roll back the bump pointer if `(offset, size)` is the topmost
    /// allocation; otherwise do nothing.
    pub fn deallocate(&mut self, offset: u32, size: usize) {
        if offset as usize + size == self.used {
            self.used -= size;
        }
    }

    pub fn reset(&mut self) {
        self.used = 0;
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data[..self.used]
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data[..self.used]
    }

    pub fn get(&self, offset: u32, size: usize) -> &[u8] {
        &self.data[offset as usize..offset as usize + size]
    }

    fn grow(&mut self, size: usize) {
        let mut new_capacity = if self.data.is_empty() { 8 } else { 2 * self.data.len() };
        while self.used + size > new_capacity {
            new_capacity *= 2;
        }
        log::trace!(target: "alloc", "arena grow {} -> {new_capacity}", self.data.len());
        let old = std::mem::take(&mut self.data);
        self.data = self.parent.reallocate(old, new_capacity);
    }
}

impl Drop for Arena<'_> {
    fn drop(&mut self) {
        let data = std::mem::take(&mut self.data);
        self.parent.deallocate(data);
    }
}

impl Backend for Arena<'_> {
    fn kind(&self) -> BackendKind {
        BackendKind::Arena
    }

    fn live_bytes(&self) -> usize {
        self.used
    }

    fn allocate(&mut self, size: usize) -> Option<AllocId> {
        Some(AllocId(u64::from(Arena::allocate(self, size))))
    }

    fn reallocate(&mut self, id: AllocId, old_size: usize, new_size: usize) -> Option<AllocId> {
        let offset = id.0 as usize;
        if new_size <= old_size {
            // Shrinking rolls the bump pointer back only for the topmost
            // allocation; the offset stays valid either way.
            if offset + old_size == self.used {
                self.used = offset + new_size;
            }
            return Some(id);
        }
        let new_offset = Arena::allocate(self, new_size) as usize;
        self.data.copy_within(offset..offset + old_size, new_offset);
        Some(AllocId(new_offset as u64))
    }

    fn deallocate(&mut self, id: AllocId, size: usize) {
        Arena::deallocate(self, id.0 as u32, size);
    }

    /// Rolls every allocation back at once; the region itself returns to the
    /// parent when the arena is dropped.
    fn destroy(&mut self) {
        self.reset();
    }
}
