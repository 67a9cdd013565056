// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Cell sub-allocator (C3): a fixed-size, 32-byte slab allocator for the
//! engine's most common small object (property pairs, small strings).
//!
//! Cells are carved out of pages sourced from [`crate::heap::Heap`]. Each
//! page keeps its own intrusive free list (a free cell's first four bytes
//! hold the index of the next free cell in the same page, `NULL_CELL`
//! terminating the chain). [`CellAllocator::free`] is the join point named
//! in the design notes: an address that does not belong to any cell page is
//! forwarded straight to [`Heap::free`], so callers do not need to track
//! which allocator originally produced a pointer.

#[cfg(test)]
mod cell_test;

use crate::address::Vaddr;
use crate::heap::Heap;
use crate::host::HeapMemory;

/// Size of a single cell, in bytes.
pub const CELL_SIZE: usize = 32;

/// Cells per page.
pub const CELLS_PER_PAGE: usize = 32;

/// Page size in bytes, sourced as a single [`Heap`] allocation.
pub const PAGE_SIZE: usize = CELL_SIZE * CELLS_PER_PAGE;

/// Upper bound on the number of pages a single allocator instance may own.
/// Page descriptors are kept inline (no dynamic allocation for the
/// bookkeeping itself), so this is a hard cap rather than a growable `Vec`.
const MAX_PAGES: usize = 256;

const NULL_CELL: u32 = u32::MAX;

/// Fixed-size cell sub-allocator, layered on top of a [`Heap`].
pub struct CellAllocator {
    pages: [Option<Vaddr>; MAX_PAGES],
    free_heads: [u32; MAX_PAGES],
    page_count: usize,
    /// Cells per page and the resulting page size in bytes. Defaults to
    /// [`CELLS_PER_PAGE`]/[`PAGE_SIZE`] via [`CellAllocator::new`];
    /// [`CellAllocator::with_cells_per_page`] overrides both, matching
    /// `SPEC_FULL.md`'s decision that the slab size is configurable per
    /// context rather than a single crate-wide constant.
    page_cells: usize,
    page_bytes: usize,
}

impl Default for CellAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl CellAllocator {
    #[must_use]
    pub const fn new() -> Self {
        Self::with_cells_per_page(CELLS_PER_PAGE)
    }

    /// Create an allocator whose pages hold `cells_per_page` cells instead
    /// of the default [`CELLS_PER_PAGE`]. `cells_per_page` must be nonzero
    /// and at most `u32::MAX`, since cell indices within a page are stored
    /// as `u32`.
    #[must_use]
    pub const fn with_cells_per_page(cells_per_page: usize) -> Self {
        debug_assert!(cells_per_page > 0, "a page must hold at least one cell");
        Self {
            pages: [None; MAX_PAGES],
            free_heads: [NULL_CELL; MAX_PAGES],
            page_count: 0,
            page_cells: cells_per_page,
            page_bytes: cells_per_page * CELL_SIZE,
        }
    }

    #[must_use]
    pub const fn cell_size() -> usize {
        CELL_SIZE
    }

    #[must_use]
    pub const fn page_count(&self) -> usize {
        self.page_count
    }

    /// Allocate one cell, sourcing a fresh page from `heap` if every
    /// existing page is full. Returns `None` if both every page is full and
    /// the page cap or the underlying heap is exhausted.
    pub fn alloc<M: HeapMemory>(&mut self, mem: &mut M, heap: &mut Heap) -> Option<Vaddr> {
        for i in 0..self.page_count {
            if self.free_heads[i] != NULL_CELL {
                return Some(self.pop_free(mem, i));
            }
        }
        self.add_page(mem, heap)?;
        let i = self.page_count - 1;
        Some(self.pop_free(mem, i))
    }

    /// Return a cell to its page's free list, or forward to `heap` if
    /// `addr` was not handed out by this allocator.
    pub fn free<M: HeapMemory>(&mut self, mem: &mut M, heap: &mut Heap, addr: Vaddr) {
        if let Some((page_idx, cell_idx)) = self.locate(addr) {
            mem.write(addr, self.free_heads[page_idx]);
            self.free_heads[page_idx] = cell_idx;
        } else {
            heap.free(mem, addr, CELL_SIZE);
        }
    }

    /// Whether `addr` falls inside one of this allocator's pages.
    #[must_use]
    pub fn is_cell_pointer(&self, addr: Vaddr) -> bool {
        self.locate(addr).is_some()
    }

    fn add_page<M: HeapMemory>(&mut self, mem: &mut M, heap: &mut Heap) -> Option<()> {
        if self.page_count >= MAX_PAGES {
            return None;
        }
        let base = heap.alloc(mem, self.page_bytes)?;
        let page_cells = self.page_cells as u32;
        for c in 0..page_cells {
            let next = if c + 1 == page_cells { NULL_CELL } else { c + 1 };
            mem.write(base.add(u64::from(c) * CELL_SIZE as u64), next);
        }
        self.pages[self.page_count] = Some(base);
        self.free_heads[self.page_count] = 0;
        self.page_count += 1;
        Some(())
    }

    fn pop_free<M: HeapMemory>(&mut self, mem: &mut M, page_idx: usize) -> Vaddr {
        let head = self.free_heads[page_idx];
        debug_assert!(head != NULL_CELL, "popped from an empty page free list");
        let base = self.pages[page_idx].expect("page index in range implies a page exists");
        let addr = base.add(u64::from(head) * CELL_SIZE as u64);
        let next: u32 = mem.read(addr);
        self.free_heads[page_idx] = next;
        addr
    }

    fn locate(&self, addr: Vaddr) -> Option<(usize, u32)> {
        for i in 0..self.page_count {
            let base = self.pages[i]?;
            let end = base.add(self.page_bytes as u64);
            if addr >= base && addr < end {
                let off = addr.diff(base);
                debug_assert!(off % CELL_SIZE as u64 == 0, "misaligned cell address {addr}");
                return Some((i, (off / CELL_SIZE as u64) as u32));
            }
        }
        None
    }
}
