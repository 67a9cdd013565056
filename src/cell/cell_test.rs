use super::*;
use crate::host::MockMemory;

fn new_fixture(heap_size: usize) -> (CellAllocator, Heap, MockMemory) {
    let mut mem = MockMemory::new(heap_size);
    let heap = Heap::new(&mut mem, Vaddr::new(0), heap_size, 0);
    (CellAllocator::new(), heap, mem)
}

#[test]
fn first_alloc_sources_a_page() {
    let (mut cells, mut heap, mut mem) = new_fixture(PAGE_SIZE * 2);
    assert_eq!(cells.page_count(), 0);
    let a = cells.alloc(&mut mem, &mut heap).expect("alloc");
    assert_eq!(cells.page_count(), 1);
    assert!(cells.is_cell_pointer(a));
}

#[test]
fn fills_a_page_then_sources_another() {
    let (mut cells, mut heap, mut mem) = new_fixture(PAGE_SIZE * 3);
    for _ in 0..CELLS_PER_PAGE {
        cells.alloc(&mut mem, &mut heap).expect("alloc within first page");
    }
    assert_eq!(cells.page_count(), 1);
    cells.alloc(&mut mem, &mut heap).expect("alloc triggers second page");
    assert_eq!(cells.page_count(), 2);
}

#[test]
fn freed_cell_is_reused_before_sourcing_a_new_page() {
    let (mut cells, mut heap, mut mem) = new_fixture(PAGE_SIZE * 2);
    let a = cells.alloc(&mut mem, &mut heap).expect("a");
    cells.free(&mut mem, &mut heap, a);
    let b = cells.alloc(&mut mem, &mut heap).expect("b");
    assert_eq!(a, b);
    assert_eq!(cells.page_count(), 1);
}

#[test]
fn free_of_foreign_address_forwards_to_heap() {
    let (mut cells, mut heap, mut mem) = new_fixture(PAGE_SIZE * 2);
    let plain = heap.alloc(&mut mem, 64).expect("plain heap alloc");
    assert!(!cells.is_cell_pointer(plain));
    let before = heap.allocated_bytes();
    cells.free(&mut mem, &mut heap, plain);
    assert_eq!(heap.allocated_bytes(), before - 64);
}

#[test]
fn cells_from_different_pages_are_distinguishable() {
    let (mut cells, mut heap, mut mem) = new_fixture(PAGE_SIZE * 3);
    let mut addrs = Vec::new();
    for _ in 0..(CELLS_PER_PAGE + 1) {
        addrs.push(cells.alloc(&mut mem, &mut heap).expect("alloc"));
    }
    assert_eq!(cells.page_count(), 2);
    let unique: std::collections::HashSet<_> = addrs.into_iter().map(Vaddr::as_u64).collect();
    assert_eq!(unique.len(), CELLS_PER_PAGE + 1);
}
