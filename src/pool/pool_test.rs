use super::*;
use crate::host::MockMemory;

fn new_fixture(heap_size: usize) -> (PoolAllocator, Heap, MockMemory) {
    let mut mem = MockMemory::new(heap_size);
    let heap = Heap::new(&mut mem, Vaddr::new(0), heap_size, 0);
    (PoolAllocator::new(), heap, mem)
}

#[test]
fn miss_falls_through_to_heap() {
    let (mut pool, mut heap, mut mem) = new_fixture(128);
    let before = heap.allocated_bytes();
    let a = pool.alloc(&mut mem, &mut heap, PoolSize::Eight).expect("alloc");
    assert_eq!(heap.allocated_bytes(), before + 8);
    assert!(!a.is_null());
}

#[test]
fn freed_chunk_is_recycled_lifo() {
    let (mut pool, mut heap, mut mem) = new_fixture(128);
    let a = pool.alloc(&mut mem, &mut heap, PoolSize::Sixteen).expect("a");
    let b = pool.alloc(&mut mem, &mut heap, PoolSize::Sixteen).expect("b");
    pool.free(&mut mem, PoolSize::Sixteen, a);
    pool.free(&mut mem, PoolSize::Sixteen, b);
    let allocated_before_reuse = heap.allocated_bytes();

    let first_reused = pool.alloc(&mut mem, &mut heap, PoolSize::Sixteen).expect("reuse b");
    let second_reused = pool.alloc(&mut mem, &mut heap, PoolSize::Sixteen).expect("reuse a");
    assert_eq!(first_reused, b, "LIFO: most recently freed chunk comes back first");
    assert_eq!(second_reused, a);
    assert_eq!(heap.allocated_bytes(), allocated_before_reuse, "recycling must not touch the heap");
}

#[test]
fn eight_and_sixteen_byte_pools_are_independent() {
    let (mut pool, mut heap, mut mem) = new_fixture(128);
    let a = pool.alloc(&mut mem, &mut heap, PoolSize::Eight).expect("a");
    pool.free(&mut mem, PoolSize::Eight, a);
    // the 16-byte pool is still empty, so this must fall through to the heap
    let before = heap.allocated_bytes();
    pool.alloc(&mut mem, &mut heap, PoolSize::Sixteen).expect("b");
    assert_eq!(heap.allocated_bytes(), before + 16);
}

#[test]
fn collect_empty_reclaims_everything_to_the_heap() {
    let (mut pool, mut heap, mut mem) = new_fixture(128);
    let a = pool.alloc(&mut mem, &mut heap, PoolSize::Eight).expect("a");
    let b = pool.alloc(&mut mem, &mut heap, PoolSize::Sixteen).expect("b");
    pool.free(&mut mem, PoolSize::Eight, a);
    pool.free(&mut mem, PoolSize::Sixteen, b);

    let allocated_with_chunks_pooled = heap.allocated_bytes();
    let freed = pool.collect_empty(&mut mem, &mut heap);
    assert_eq!(freed, 24);
    assert_eq!(heap.allocated_bytes(), allocated_with_chunks_pooled - 24);
}

#[test]
fn from_bytes_rejects_other_sizes() {
    assert_eq!(PoolSize::from_bytes(8), Some(PoolSize::Eight));
    assert_eq!(PoolSize::from_bytes(16), Some(PoolSize::Sixteen));
    assert_eq!(PoolSize::from_bytes(12), None);
}
