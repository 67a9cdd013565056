// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Bump/free-list heap (C2): the primary allocator for objects, strings,
//! bytecode, and property pairs.
//!
//! The free list lives inside the free regions themselves (a
//! [`FreeRecord`] overlays the first eight bytes of any free block) and is
//! kept sorted by ascending address so adjacent frees coalesce in O(1)
//! relative to the walk. A `skip` offset caches the most recently touched
//! predecessor to speed up the common case of frees that are address-local
//! to the last one (e.g. popping a stack-like allocation pattern).
//!
//! This module is GC-pressure-agnostic: reclamation escalation and the
//! fatal-on-OOM path belong to [`crate::Context`], the per-context facade
//! named in `SPEC_FULL.md` §2, since only it holds the [`crate::host::GcHost`]
//! and [`crate::host::FatalHandler`] ports. `Heap` only tracks the
//! allocated/limit bookkeeping those escalation decisions are based on.


use crate::address::Vaddr;
use crate::host::HeapMemory;

/// Allocation alignment, in bytes. Every region handed out by [`Heap::alloc`]
/// starts on a multiple of this.
pub const ALIGN: u64 = 8;

/// Offset sentinel marking the end of the free list / an absent neighbour.
const NULL_OFFSET: u32 = u32::MAX;

#[inline]
const fn align_up(n: usize) -> usize {
    let mask = ALIGN as usize - 1;
    (n + mask) & !mask
}

/// A free-list node, overlaid on the first 8 bytes of a free region.
#[derive(Clone, Copy)]
#[repr(C)]
struct FreeRecord {
    next: u32,
    size: u32,
}

/// The bump/free-list heap.
pub struct Heap {
    base: Vaddr,
    area_end: Vaddr,
    free_head: u32,
    skip: u32,
    allocated: u64,
    gc_limit: u64,
    limit: u64,
}

impl Heap {
    /// Create a heap over `[base, base + size)`. The whole region starts as
    /// a single free block. `gc_limit` is the pacing step described in
    /// `SPEC_FULL.md` §4.2; `0` disables pacing (callers never observe
    /// `should_pace` returning `true`).
    pub fn new<M: HeapMemory>(mem: &mut M, base: Vaddr, size: usize, gc_limit: u64) -> Self {
        assert!(size >= ALIGN as usize, "heap must hold at least one alignment unit");
        let area_end = base.add(size as u64);
        mem.write(base, FreeRecord { next: NULL_OFFSET, size: size as u32 });
        Self {
            base,
            area_end,
            free_head: 0,
            skip: NULL_OFFSET,
            allocated: 0,
            gc_limit,
            limit: gc_limit,
        }
    }

    #[must_use]
    pub const fn base(&self) -> Vaddr {
        self.base
    }

    #[must_use]
    pub const fn area_end(&self) -> Vaddr {
        self.area_end
    }

    #[must_use]
    pub const fn allocated_bytes(&self) -> u64 {
        self.allocated
    }

    #[must_use]
    pub const fn is_heap_pointer(&self, addr: Vaddr) -> bool {
        !addr.is_null() && addr.as_u64() >= self.base.as_u64() && addr.as_u64() < self.area_end.as_u64()
    }

    /// Whether the next allocation should trigger a low-pressure reclamation
    /// before attempting to satisfy the request (`SPEC_FULL.md` §4.2 GC
    /// pacing). Callers query this *before* calling [`Heap::alloc`].
    #[must_use]
    pub const fn should_pace(&self) -> bool {
        self.gc_limit != 0 && self.allocated + self.gc_limit >= self.limit
    }

    /// Grow or shrink the pacing `limit` after an allocation, per
    /// `SPEC_FULL.md` §4.2: the limit grows by `gc_limit` when exceeded and
    /// shrinks by the same step when `allocated` drops far enough below it.
    fn repace(&mut self) {
        if self.gc_limit == 0 {
            return;
        }
        if self.allocated + self.gc_limit >= self.limit {
            self.limit += self.gc_limit;
        } else if self.limit > self.gc_limit && self.allocated + 2 * self.gc_limit < self.limit {
            self.limit -= self.gc_limit;
        }
    }

    fn offset_of(&self, addr: Vaddr) -> u32 {
        let off = addr.diff(self.base);
        debug_assert!(off <= u32::MAX as u64, "offset {off} does not fit a free record");
        off as u32
    }

    fn read_free<M: HeapMemory>(&self, mem: &M, offset: u32) -> FreeRecord {
        mem.read(self.base.add(offset as u64))
    }

    fn write_free<M: HeapMemory>(&self, mem: &mut M, offset: u32, rec: FreeRecord) {
        mem.write(self.base.add(offset as u64), rec);
    }

    /// Allocate an 8-byte-aligned region of at least `n` bytes using
    /// first-fit. Returns `None` on exhaustion; never triggers reclamation
    /// (see the module docs).
    pub fn alloc<M: HeapMemory>(&mut self, mem: &mut M, n: usize) -> Option<Vaddr> {
        if n == 0 {
            return None;
        }
        let n = align_up(n) as u32;

        let mut prev = NULL_OFFSET;
        let mut cur = self.free_head;
        while cur != NULL_OFFSET {
            let rec = self.read_free(mem, cur);
            debug_assert!(
                rec.next == NULL_OFFSET || rec.next > cur,
                "corrupted free list: next {} does not follow {cur}",
                rec.next
            );
            if rec.size >= n {
                if rec.size == n {
                    self.unlink(mem, prev, cur, rec.next);
                } else {
                    let tail_offset = cur + n;
                    self.write_free(mem, tail_offset, FreeRecord { next: rec.next, size: rec.size - n });
                    self.unlink(mem, prev, cur, tail_offset);
                }
                self.skip = prev;
                self.allocated += n as u64;
                self.repace();
                return Some(self.base.add(cur as u64));
            }
            prev = cur;
            cur = rec.next;
        }
        None
    }

    /// Point `prev`'s `next` (or `free_head` if there is no predecessor) at
    /// `new_next`, removing `removed` from the list.
    fn unlink<M: HeapMemory>(&mut self, mem: &mut M, prev: u32, removed: u32, new_next: u32) {
        let _ = removed;
        if prev == NULL_OFFSET {
            self.free_head = new_next;
        } else {
            let mut prev_rec = self.read_free(mem, prev);
            prev_rec.next = new_next;
            self.write_free(mem, prev, prev_rec);
        }
    }

    /// Return `[addr, addr+n)` to the free list, coalescing with any
    /// immediately adjacent free regions.
    pub fn free<M: HeapMemory>(&mut self, mem: &mut M, addr: Vaddr, n: usize) {
        let n = align_up(n) as u32;
        let offset = self.offset_of(addr);

        let mut prev = NULL_OFFSET;
        let mut cur = if self.skip != NULL_OFFSET && self.skip < offset { self.skip } else { self.free_head };
        if cur == self.skip && cur != NULL_OFFSET {
            prev = cur;
            cur = self.read_free(mem, cur).next;
        }
        while cur != NULL_OFFSET {
            let rec = self.read_free(mem, cur);
            debug_assert!(cur + rec.size <= offset || cur >= offset + n, "double free or overlap at {addr}");
            if cur >= offset {
                break;
            }
            prev = cur;
            cur = rec.next;
        }

        let forward_coalesces = cur != NULL_OFFSET && cur == offset + n;
        let (merged_size, merged_next) = if forward_coalesces {
            let succ = self.read_free(mem, cur);
            (n + succ.size, succ.next)
        } else {
            (n, cur)
        };

        let backward_coalesces = prev != NULL_OFFSET && {
            let prev_rec = self.read_free(mem, prev);
            prev + prev_rec.size == offset
        };

        if backward_coalesces {
            let mut prev_rec = self.read_free(mem, prev);
            prev_rec.size += merged_size;
            prev_rec.next = merged_next;
            self.write_free(mem, prev, prev_rec);
        } else {
            self.write_free(mem, offset, FreeRecord { next: merged_next, size: merged_size });
            if prev == NULL_OFFSET {
                self.free_head = offset;
            } else {
                let mut prev_rec = self.read_free(mem, prev);
                prev_rec.next = offset;
                self.write_free(mem, prev, prev_rec);
            }
        }

        self.skip = prev;
        self.allocated = self.allocated.saturating_sub(n as u64);
        self.repace();
    }

    /// Heap-local realloc: identity, shrink, and grow (forward/backward
    /// extension, falling back to copy). Does **not** implement the
    /// shrink-into-a-cell special case from `SPEC_FULL.md` §4.2 case 1 —
    /// that crosses into C3 and is implemented by
    /// [`crate::Context::realloc`].
    pub fn realloc<M: HeapMemory>(
        &mut self,
        mem: &mut M,
        addr: Vaddr,
        old_n: usize,
        new_n: usize,
    ) -> Option<Vaddr> {
        let old_n = align_up(old_n);
        let new_n = align_up(new_n);

        if new_n == old_n {
            return Some(addr);
        }
        if new_n < old_n {
            self.free(mem, addr.add(new_n as u64), old_n - new_n);
            return Some(addr);
        }

        let grow = new_n - old_n;
        if self.try_extend_forward(mem, addr, old_n, grow) {
            self.allocated += grow as u64;
            self.repace();
            return Some(addr);
        }
        if let Some(new_addr) = self.try_extend_backward(mem, addr, old_n, grow) {
            self.allocated += grow as u64;
            self.repace();
            return Some(new_addr);
        }

        let fresh = self.alloc(mem, new_n)?;
        mem.copy_within(addr, fresh, old_n);
        self.free(mem, addr, old_n);
        Some(fresh)
    }

    /// Try to satisfy a grow-by-`grow` request by consuming a free region
    /// immediately following `addr`'s current `old_n`-byte allocation.
    fn try_extend_forward<M: HeapMemory>(&mut self, mem: &mut M, addr: Vaddr, old_n: usize, grow: usize) -> bool {
        let target = self.offset_of(addr) + old_n as u32;
        let grow = grow as u32;

        let mut prev = NULL_OFFSET;
        let mut cur = self.free_head;
        while cur != NULL_OFFSET && cur < target {
            prev = cur;
            cur = self.read_free(mem, cur).next;
        }
        if cur != target {
            return false;
        }
        let rec = self.read_free(mem, cur);
        if rec.size < grow {
            return false;
        }
        if rec.size == grow {
            self.unlink(mem, prev, cur, rec.next);
        } else {
            let new_offset = cur + grow;
            self.write_free(mem, new_offset, FreeRecord { next: rec.next, size: rec.size - grow });
            self.unlink(mem, prev, cur, new_offset);
        }
        self.skip = prev;
        true
    }

    /// Try to satisfy a grow-by-`grow` request by consuming the tail of a
    /// free region immediately preceding `addr`, moving the payload back.
    fn try_extend_backward<M: HeapMemory>(
        &mut self,
        mem: &mut M,
        addr: Vaddr,
        old_n: usize,
        grow: usize,
    ) -> Option<Vaddr> {
        let offset = self.offset_of(addr);
        let grow = grow as u32;

        let mut prev = NULL_OFFSET;
        let mut cur = self.free_head;
        while cur != NULL_OFFSET && cur < offset {
            let rec = self.read_free(mem, cur);
            if cur + rec.size == offset {
                if rec.size < grow {
                    return None;
                }
                let new_start = offset - grow;
                if rec.size == grow {
                    self.unlink(mem, prev, cur, rec.next);
                } else {
                    let mut shrunk = rec;
                    shrunk.size -= grow;
                    self.write_free(mem, cur, shrunk);
                }
                self.skip = prev;
                let new_addr = self.base.add(new_start as u64);
                mem.copy_within(addr, new_addr, old_n);
                return Some(new_addr);
            }
            prev = cur;
            cur = rec.next;
        }
        None
    }
}
