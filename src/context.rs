// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! The per-context facade: the single entry point an embedding VM calls
//! into for all managed allocation. Owns the heap, cell, and pool
//! allocators, the optional statistics counters, and the debugger, and is
//! the only place GC-pressure escalation and fatal-on-OOM handling happen
//! (C2/C3/C4 themselves stay GC-agnostic, see their module docs).


use crate::address::Vaddr;
use crate::cell::CellAllocator;
use crate::cptr::{self, CompressedPtr};
use crate::debugger::Debugger;
use crate::heap::Heap;
use crate::host::{FatalCode, FatalHandler, GcHost, HeapMemory, Pressure};
use crate::pool::{PoolAllocator, PoolSize};
use crate::stats::{Category, Stats};

/// Default number of cells per page, matching `SPEC_FULL.md`'s §9 decision.
pub const DEFAULT_CELL_PAGE_CELLS: usize = crate::cell::CELLS_PER_PAGE;

/// All mutable process-wide state for one instance of the engine's memory
/// subsystem and debugger.
///
/// Generic over the host memory port `M`; everything else (the GC host, the
/// fatal handler, the transport) is threaded through individual calls
/// rather than stored, since those callbacks are rarely needed and storing
/// them would force a second generic parameter onto every method.
pub struct Context<M: HeapMemory> {
    mem: M,
    heap: Heap,
    cells: CellAllocator,
    pool: PoolAllocator,
    stats: Stats,
    debugger: Debugger,
}

impl<M: HeapMemory> Context<M> {
    /// Create a context over an already-constructed host memory block of
    /// `heap_size` bytes starting at `heap_base`. `gc_limit` is the
    /// allocator pacing step (`0` disables pacing). Cells are sourced in
    /// pages of [`DEFAULT_CELL_PAGE_CELLS`]; use
    /// [`Context::with_cell_page_size`] to override that.
    pub fn new(mem: M, heap_base: Vaddr, heap_size: usize, gc_limit: u64) -> Self {
        Self::with_cell_page_size(mem, heap_base, heap_size, gc_limit, DEFAULT_CELL_PAGE_CELLS)
    }

    /// As [`Context::new`], with an explicit cell page size in cells.
    pub fn with_cell_page_size(mut mem: M, heap_base: Vaddr, heap_size: usize, gc_limit: u64, cell_page_cells: usize) -> Self {
        let heap = Heap::new(&mut mem, heap_base, heap_size, gc_limit);
        Self {
            mem,
            heap,
            cells: CellAllocator::with_cells_per_page(cell_page_cells),
            pool: PoolAllocator::new(),
            stats: Stats::new(),
            debugger: Debugger::new(),
        }
    }

    #[must_use]
    pub fn heap_base(&self) -> Vaddr {
        self.heap.base()
    }

    #[must_use]
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Mutable access to the statistics counters, for reporting the
    /// semantic [`crate::stats::Kind`] of an allocation the embedding VM
    /// just made through [`Context::alloc`] (`SPEC_FULL.md` §4.7): this
    /// facade only knows byte counts and allocator routing, never whether
    /// a request was for a string, object, property, or byte-code blob.
    #[must_use]
    pub fn stats_mut(&mut self) -> &mut Stats {
        &mut self.stats
    }

    /// Pack and send a `MEMSTATS` reply in response to
    /// [`crate::debugger::ClientEvent::MemStatsRequest`].
    pub fn send_memstats(&self, transport: &mut impl crate::debugger::Transport) -> bool {
        self.debugger.send_memstats(transport, &self.stats)
    }

    #[must_use]
    pub fn debugger(&self) -> &Debugger {
        &self.debugger
    }

    #[must_use]
    pub fn debugger_mut(&mut self) -> &mut Debugger {
        &mut self.debugger
    }

    #[must_use]
    pub fn mem(&self) -> &M {
        &self.mem
    }

    #[must_use]
    pub fn mem_mut(&mut self) -> &mut M {
        &mut self.mem
    }

    #[must_use]
    pub fn is_heap_pointer(&self, addr: Vaddr) -> bool {
        self.heap.is_heap_pointer(addr) || self.cells.is_cell_pointer(addr)
    }

    #[must_use]
    pub fn compress(&self, addr: Vaddr) -> CompressedPtr {
        cptr::encode_checked(self.heap.base(), addr)
    }

    #[must_use]
    pub fn decompress(&self, cp: CompressedPtr) -> Option<Vaddr> {
        cptr::decode_checked(self.heap.base(), cp)
    }

    /// Allocate `n` bytes, dispatching to the cell allocator for small
    /// requests and the heap otherwise (`SPEC_FULL.md` §2: "dispatches to
    /// C3 if size <= cell size, otherwise C2"). Runs the GC-pressure
    /// escalation ladder on exhaustion; returns `None` if even
    /// [`Pressure::Full`] reclamation fails to free enough.
    pub fn alloc(&mut self, gc: &mut impl GcHost, n: usize) -> Option<Vaddr> {
        if n == 0 {
            return None;
        }
        if n <= CellAllocator::cell_size() {
            self.alloc_cell_with_pressure(gc).inspect(|_| self.stats.record_alloc(Category::Cell, CellAllocator::cell_size()))
        } else {
            self.alloc_heap_with_pressure(gc, n).inspect(|_| self.stats.record_alloc(Category::Heap, n))
        }
    }

    /// As [`Context::alloc`] but calls `fatal.fatal(OutOfMemory)` instead of
    /// returning `None`.
    pub fn alloc_or_die(&mut self, gc: &mut impl GcHost, fatal: &mut impl FatalHandler, n: usize) -> Vaddr {
        match self.alloc(gc, n) {
            Some(addr) => addr,
            None => fatal.fatal(FatalCode::OutOfMemory),
        }
    }

    fn alloc_cell_with_pressure(&mut self, gc: &mut impl GcHost) -> Option<Vaddr> {
        if let Some(addr) = self.cells.alloc(&mut self.mem, &mut self.heap) {
            return Some(addr);
        }
        self.escalate_and_retry(gc, |this| this.cells.alloc(&mut this.mem, &mut this.heap))
    }

    fn alloc_heap_with_pressure(&mut self, gc: &mut impl GcHost, n: usize) -> Option<Vaddr> {
        if self.heap.should_pace() {
            gc.gc_run(Pressure::Low);
        }
        if let Some(addr) = self.heap.alloc(&mut self.mem, n) {
            return Some(addr);
        }
        self.escalate_and_retry(gc, |this| this.heap.alloc(&mut this.mem, n))
    }

    /// Run the reclamation ladder from `None` through `Full`, retrying
    /// `attempt` after each step. Also drains the pool's idle chunks back
    /// to the heap once, since that is pure upside with no GC involvement.
    fn escalate_and_retry(
        &mut self,
        gc: &mut impl GcHost,
        mut attempt: impl FnMut(&mut Self) -> Option<Vaddr>,
    ) -> Option<Vaddr> {
        self.pool.collect_empty(&mut self.mem, &mut self.heap);
        if let Some(addr) = attempt(self) {
            return Some(addr);
        }

        let mut pressure = Pressure::None;
        loop {
            gc.gc_run(pressure);
            gc.free_unused_memory(pressure);
            if let Some(addr) = attempt(self) {
                return Some(addr);
            }
            pressure = pressure.escalate()?;
        }
    }

    /// Free a region previously handed out by [`Context::alloc`] or
    /// [`Context::pool_alloc`]. Dispatches based on which allocator owns
    /// `addr`; an address belonging to none of them is forwarded straight
    /// to the heap (matching the cell allocator's own join-point
    /// behaviour, see `cell` module docs), which is a programmer error if
    /// `addr` was never actually heap-resident.
    pub fn free(&mut self, addr: Vaddr, n: usize) {
        if self.cells.is_cell_pointer(addr) {
            self.cells.free(&mut self.mem, &mut self.heap, addr);
            self.stats.record_free(Category::Cell, CellAllocator::cell_size());
        } else {
            self.heap.free(&mut self.mem, addr, n);
            self.stats.record_free(Category::Heap, n);
        }
    }

    /// Reallocate `addr` from `old_n` to `new_n` bytes. Implements case 1
    /// from `SPEC_FULL.md` §4.2 (shrink into cell range) in addition to the
    /// heap-local cases 2-4 that [`Heap::realloc`] already handles, since
    /// only this facade has access to both allocators.
    ///
    /// Dispatches on `addr`'s actual owning allocator rather than `old_n`
    /// alone: a cell-resident address must never reach [`Heap::realloc`],
    /// whose shrink path frees `addr + new_n` as a heap offset and would
    /// corrupt the free list on a cell address.
    pub fn realloc(&mut self, gc: &mut impl GcHost, addr: Vaddr, old_n: usize, new_n: usize) -> Option<Vaddr> {
        if self.cells.is_cell_pointer(addr) {
            if new_n <= CellAllocator::cell_size() {
                // Still fits the same cell; cells are fixed-size, so
                // there is nothing to move.
                return Some(addr);
            }
            let moved = self.alloc_heap_with_pressure(gc, new_n)?;
            self.mem.copy_within(addr, moved, old_n.min(new_n));
            self.cells.free(&mut self.mem, &mut self.heap, addr);
            self.stats.record_free(Category::Cell, CellAllocator::cell_size());
            self.stats.record_alloc(Category::Heap, new_n);
            return Some(moved);
        }

        if new_n <= CellAllocator::cell_size() && old_n > CellAllocator::cell_size() {
            let cell = self.alloc_cell_with_pressure(gc)?;
            let copy_len = new_n.min(old_n);
            self.mem.copy_within(addr, cell, copy_len);
            self.heap.free(&mut self.mem, addr, old_n);
            self.stats.record_free(Category::Heap, old_n);
            self.stats.record_alloc(Category::Cell, CellAllocator::cell_size());
            return Some(cell);
        }
        self.heap.realloc(&mut self.mem, addr, old_n, new_n)
    }

    /// Allocate an 8- or 16-byte chunk through the hot pool path rather
    /// than the general-purpose dispatch in [`Context::alloc`].
    pub fn pool_alloc(&mut self, gc: &mut impl GcHost, size: PoolSize) -> Option<Vaddr> {
        if let Some(addr) = self.pool.alloc(&mut self.mem, &mut self.heap, size) {
            self.stats.record_alloc(Category::Pool, size.bytes());
            return Some(addr);
        }
        self.escalate_and_retry(gc, |this| this.pool.alloc(&mut this.mem, &mut this.heap, size))
            .inspect(|_| self.stats.record_alloc(Category::Pool, size.bytes()))
    }

    /// Return a chunk to its pool's free list.
    pub fn pool_free(&mut self, size: PoolSize, addr: Vaddr) {
        self.pool.free(&mut self.mem, size, addr);
        self.stats.record_free(Category::Pool, size.bytes());
    }
}
