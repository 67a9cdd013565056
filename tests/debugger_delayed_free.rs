// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Scenario 4: two byte-code releases must be acknowledged in exactly the
//! reverse of the order they were released, and an out-of-order
//! acknowledgement closes the transport without changing the list.

mod common;

use ecma_core::cptr::encode;
use ecma_core::debugger::{ClientMessage, Debugger};
use ecma_core::host::MockMemory;
use ecma_core::Vaddr;

use common::VecTransport;

fn free_packet(cp_raw: u16) -> Vec<u8> {
    let mut bytes = vec![ClientMessage::FreeByteCodeCp as u8];
    bytes.extend_from_slice(&cp_raw.to_le_bytes());
    bytes
}

#[test]
fn acknowledgements_must_unwind_in_lifo_order() {
    let base = Vaddr::new(0);
    let mut mem = MockMemory::new(4096);
    let mut debugger = Debugger::new();
    let mut transport = VecTransport::default();

    assert!(debugger.connect(&mut transport, 128));

    let addr1 = base.add(32);
    let addr2 = base.add(64);
    let cp1 = encode(base, addr1);
    let cp2 = encode(base, addr2);

    assert!(debugger.release_byte_code(&mut mem, base, &mut transport, cp1));
    assert!(debugger.release_byte_code(&mut mem, base, &mut transport, cp2));

    // Client acks the most recent release first: accepted.
    let ack_2 = debugger.handle_client_message(&mut mem, base, &free_packet(cp2.raw()));
    assert!(ack_2.is_ok());
    assert!(!transport.closed);

    // Then the older release: also accepted, since it is now the tail.
    let ack_1 = debugger.handle_client_message(&mut mem, base, &free_packet(cp1.raw()));
    assert!(ack_1.is_ok());
    assert!(!transport.closed);
}

#[test]
fn acknowledging_out_of_order_closes_the_transport() {
    let base = Vaddr::new(0);
    let mut mem = MockMemory::new(4096);
    let mut debugger = Debugger::new();
    let mut transport = VecTransport::default();
    assert!(debugger.connect(&mut transport, 128));

    let addr1 = base.add(32);
    let addr2 = base.add(64);
    let cp1 = encode(base, addr1);
    let cp2 = encode(base, addr2);

    assert!(debugger.release_byte_code(&mut mem, base, &mut transport, cp1));
    assert!(debugger.release_byte_code(&mut mem, base, &mut transport, cp2));

    // Acking the older release first, while a newer one is still pending,
    // is out of order.
    let result = debugger.handle_client_message(&mut mem, base, &free_packet(cp1.raw()));
    assert!(result.is_err());
}
