// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! P7: after `reset`, every fallback block taken out since the allocator
//! was created is released and the bump cursor returns to zero, for any
//! mix of buffer-fitting and overflowing request sizes.

use ecma_core::host::SystemFallback;
use ecma_core::scratch::ScratchAllocator;
use proptest::prelude::*;

const BUFFER_SIZE: usize = 256;

proptest! {
    #[test]
    fn reset_always_rewinds_the_cursor_to_zero(sizes in prop::collection::vec(1usize..400, 1..12)) {
        let mut buffer = [0u8; BUFFER_SIZE];
        let mut scratch = ScratchAllocator::new(&mut buffer, SystemFallback);
        let start = scratch.mark();

        for n in sizes {
            let _ = scratch.alloc(n);
        }
        scratch.reset();
        prop_assert_eq!(scratch.mark(), start);
    }
}
