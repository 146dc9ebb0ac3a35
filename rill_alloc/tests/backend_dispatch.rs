//! Every backend speaks the same four verbs through the dispatch seam.

use rill_alloc::{AllocId, Arena, Backend, BackendKind, HeapAlloc, Pool};

/// Drive one full allocate → reallocate → deallocate → destroy cycle without
/// knowing which backend is behind the trait object.
fn exercise(backend: &mut dyn Backend) {
    let id = backend.allocate(16).expect("allocation fits every backend");
    assert!(backend.live_bytes() >= 16);

    let id = backend.reallocate(id, 16, 8).expect("shrinking always succeeds");
    backend.deallocate(id, 8);

    backend.allocate(4).expect("allocates");
    backend.destroy();
    assert_eq!(backend.live_bytes(), 0);
}

#[test]
fn all_backends_speak_the_same_four_verbs() {
    let parent = HeapAlloc::new();

    let mut heap = HeapAlloc::new();
    let mut arena = Arena::with_capacity(&parent, 64);
    let mut pool: Pool<[u8; 16]> = Pool::new();

    let backends: [&mut dyn Backend; 3] = [&mut heap, &mut arena, &mut pool];
    for backend in backends {
        exercise(backend);
    }
}

#[test]
fn kinds_identify_the_backend_behind_the_seam() {
    let parent = HeapAlloc::new();

    let mut heap = HeapAlloc::new();
    let mut arena = Arena::new(&parent);
    let mut pool: Pool<u64> = Pool::new();

    let backends: [(&mut dyn Backend, BackendKind); 3] = [
        (&mut heap, BackendKind::Heap),
        (&mut arena, BackendKind::Arena),
        (&mut pool, BackendKind::Pool),
    ];
    for (backend, expected) in backends {
        assert_eq!(backend.kind(), expected);
        assert_eq!(BackendKind::from_tag(backend.kind().tag()), Some(expected));
    }
}

#[test]
fn failed_allocations_leave_the_backend_unchanged() {
    // A pool is the one backend with a bounded chunk size.
    let mut pool: Pool<[u8; 8]> = Pool::new();
    let backend: &mut dyn Backend = &mut pool;

    assert!(backend.allocate(9).is_none());
    assert_eq!(backend.live_bytes(), 0);

    let id = backend.allocate(8).expect("fits");
    assert!(backend.reallocate(id, 8, 9).is_none());
    assert_eq!(backend.live_bytes(), 8);
}

#[test]
fn ids_stay_valid_across_backend_specific_reallocation() {
    let parent = HeapAlloc::new();
    let mut arena = Arena::with_capacity(&parent, 32);
    let backend: &mut dyn Backend = &mut arena;

    // Growing an arena allocation relocates it; the heap and pool keep ids.
    let id = backend.allocate(8).expect("allocates");
    let grown = backend.reallocate(id, 8, 16).expect("grows");
    assert_ne!(grown, id);

    let mut heap = HeapAlloc::new();
    let backend: &mut dyn Backend = &mut heap;
    let id = backend.allocate(8).expect("allocates");
    assert_eq!(backend.reallocate(id, 8, 16), Some(id));
    backend.destroy();

    let mut pool: Pool<[u8; 32]> = Pool::new();
    let backend: &mut dyn Backend = &mut pool;
    let id = backend.allocate(8).expect("allocates");
    assert_eq!(backend.reallocate(id, 8, 16), Some(id));
}

#[test]
fn unknown_heap_ids_do_not_panic() {
    let mut heap = HeapAlloc::new();
    let backend: &mut dyn Backend = &mut heap;
    backend.deallocate(AllocId(1234), 8);
    assert_eq!(backend.live_bytes(), 0);
}
