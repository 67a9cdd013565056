// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! A queue-backed `Transport` double for driving the debugger protocol
//! from outside the crate.

use std::collections::VecDeque;

use ecma_core::debugger::Transport;

#[derive(Default)]
pub struct VecTransport {
    pub outbox: Vec<Vec<u8>>,
    pub inbox: VecDeque<Vec<u8>>,
    pub closed: bool,
}

impl Transport for VecTransport {
    fn send(&mut self, bytes: &[u8]) -> bool {
        if self.closed {
            return false;
        }
        self.outbox.push(bytes.to_vec());
        true
    }

    fn receive(&mut self, out: &mut [u8]) -> Option<usize> {
        let msg = self.inbox.pop_front()?;
        let n = msg.len().min(out.len());
        out[..n].copy_from_slice(&msg[..n]);
        Some(n)
    }

    fn sleep(&mut self) {}

    fn close(&mut self) {
        self.closed = true;
    }
}
