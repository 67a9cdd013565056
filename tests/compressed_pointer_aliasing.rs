// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Scenario 3: encoding and decoding two distinct addresses never aliases
//! them, and tagging an encoded pointer recovers both the original address
//! and the tag.

use ecma_core::cptr::{decode, decode_tag, encode, encode_tag};
use ecma_core::Vaddr;

#[test]
fn two_distinct_blocks_decode_to_their_own_addresses() {
    let base = Vaddr::new(0x1000);
    let p = base.add(8 * 3);
    let q = base.add(8 * 7);

    let cp_p = encode(base, p);
    let cp_q = encode(base, q);

    assert_eq!(decode(base, cp_p), p);
    assert_eq!(decode(base, cp_q), q);
    assert_ne!(decode(base, cp_p), decode(base, cp_q));
}

#[test]
fn tagging_preserves_the_address_and_recovers_the_tag() {
    let base = Vaddr::new(0x2000);
    let p = base.add(8 * 12);

    for tag in 0u8..8 {
        let tagged = encode_tag(base, p, tag);
        let (addr, recovered_tag) = decode_tag(base, tagged);
        assert_eq!(addr, p);
        assert_eq!(recovered_tag, tag);
    }
}
