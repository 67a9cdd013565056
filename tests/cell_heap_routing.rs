// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Scenario 2: a request at or below the cell size is routed to the cell
//! allocator, a larger one to the heap, and freeing either through the
//! context-level `free` restores the prior statistics.

use ecma_core::Context;
use ecma_core::cell::CellAllocator;
use ecma_core::host::{MockGc, MockMemory};
use ecma_core::stats::Category;
use ecma_core::Vaddr;

#[test]
fn small_and_large_requests_route_to_different_allocators_and_free_cleanly() {
    let mut ctx = Context::new(MockMemory::new(4096), Vaddr::new(0), 4096, 0);
    let mut gc = MockGc::default();

    assert!(24 <= CellAllocator::cell_size());
    let small = ctx.alloc(&mut gc, 24).expect("cell-sized request");
    assert_eq!(ctx.stats().current(Category::Cell), CellAllocator::cell_size() as u64);
    assert_eq!(ctx.stats().current(Category::Heap), 0);

    assert!(40 > CellAllocator::cell_size());
    let large = ctx.alloc(&mut gc, 40).expect("oversized request");
    assert_eq!(ctx.stats().current(Category::Heap), 40);

    ctx.free(small, 24);
    assert_eq!(ctx.stats().current(Category::Cell), 0);

    ctx.free(large, 40);
    assert_eq!(ctx.stats().current(Category::Heap), 0);
}
