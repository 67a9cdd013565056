// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Little-endian wire primitives shared by the debugger protocol.
//!
//! Every multi-byte integer on the wire is little-endian (`SPEC_FULL.md`
//! §6 records this as a fixed Open Question decision: the core only
//! targets little-endian embedded hosts, so the handshake's advertised
//! endianness flag is informational, not negotiated). Strings are
//! length-prefixed by a single byte and therefore chunked at 255 bytes.

/// Maximum length of a single length-prefixed string chunk.
pub const MAX_STRING_CHUNK: usize = 255;

#[cfg(test)]
mod wire_test;

/// A growable little-endian byte sink bounded by a fixed capacity, standing
/// in for the engine's single outbound send buffer.
pub struct Writer<'buf> {
    buf: &'buf mut [u8],
    len: usize,
}

impl<'buf> Writer<'buf> {
    #[must_use]
    pub fn new(buf: &'buf mut [u8]) -> Self {
        Self { buf, len: 0 }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.len
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    fn push_bytes(&mut self, bytes: &[u8]) -> bool {
        if bytes.len() > self.remaining() {
            return false;
        }
        self.buf[self.len..self.len + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();
        true
    }

    pub fn u8(&mut self, v: u8) -> bool {
        self.push_bytes(&[v])
    }

    pub fn u16(&mut self, v: u16) -> bool {
        self.push_bytes(&v.to_le_bytes())
    }

    pub fn u32(&mut self, v: u32) -> bool {
        self.push_bytes(&v.to_le_bytes())
    }

    pub fn u64(&mut self, v: u64) -> bool {
        self.push_bytes(&v.to_le_bytes())
    }

    /// Write a single string chunk: a one-byte length followed by that many
    /// bytes of `s`, truncated to [`MAX_STRING_CHUNK`].
    pub fn string_chunk(&mut self, s: &[u8]) -> bool {
        let n = s.len().min(MAX_STRING_CHUNK);
        self.u8(n as u8) && self.push_bytes(&s[..n])
    }
}

/// A cursor over a received byte slice, for decoding fixed-layout payloads.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    #[must_use]
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn u8(&mut self) -> Option<u8> {
        let v = *self.buf.get(self.pos)?;
        self.pos += 1;
        Some(v)
    }

    pub fn u16(&mut self) -> Option<u16> {
        let bytes = self.buf.get(self.pos..self.pos + 2)?;
        self.pos += 2;
        Some(u16::from_le_bytes(bytes.try_into().expect("slice of len 2")))
    }

    pub fn u32(&mut self) -> Option<u32> {
        let bytes = self.buf.get(self.pos..self.pos + 4)?;
        self.pos += 4;
        Some(u32::from_le_bytes(bytes.try_into().expect("slice of len 4")))
    }

    pub fn u64(&mut self) -> Option<u64> {
        let bytes = self.buf.get(self.pos..self.pos + 8)?;
        self.pos += 8;
        Some(u64::from_le_bytes(bytes.try_into().expect("slice of len 8")))
    }

    /// Read the remainder of the buffer as-is (used for the tail of
    /// `Eval`/`ClientSource` payloads, which carry raw source bytes).
    #[must_use]
    pub fn rest(&mut self) -> &'a [u8] {
        let rest = &self.buf[self.pos..];
        self.pos = self.buf.len();
        rest
    }
}
