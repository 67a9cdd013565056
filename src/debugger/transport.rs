// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! The transport boundary (framed, unmasked "simplified RFC 6455") and the
//! VM hooks the debugger drives the backtrace/scope-chain/scope-variables
//! protocols through.

#[cfg(test)]
pub(crate) mod transport_test;

use super::mode::FrameId;
use super::wire::Writer;

/// Half-duplex byte transport the debugger sends framed messages over and
/// blocks on for client replies. Owned by the debugger for the lifetime of
/// a connection.
pub trait Transport {
    /// Send a complete, already-framed message. Returns `false` on failure;
    /// per `SPEC_FULL.md` §4.6 failure semantics this aborts the
    /// in-progress streaming operation without itself closing the
    /// transport (further sends become no-ops once the caller disconnects
    /// via [`Transport::close`]).
    fn send(&mut self, bytes: &[u8]) -> bool;

    /// Read available bytes into `out`, returning the number read, or
    /// `None` if the peer disconnected.
    fn receive(&mut self, out: &mut [u8]) -> Option<usize>;

    /// Yield control while waiting for more input in the blocking
    /// breakpoint receive loop.
    fn sleep(&mut self);

    fn close(&mut self);
}

/// A frame descriptor as reported for one backtrace entry.
#[derive(Debug, Clone, Copy)]
pub struct FrameDescriptor {
    pub byte_code_cp: u32,
    pub offset: u32,
    pub is_static_function: bool,
    pub debugger_ignore: bool,
}

/// The kind of one lexical environment node, as reported to
/// `GetScopeChain`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvKind {
    With,
    Local,
    Closure,
    Global,
    NonClosure,
}

/// Hooks the VM provides so the debugger can walk frames and environments
/// without this crate knowing the VM's internal representation.
pub trait VmHooks {
    /// Drain the delayed byte-code free list against the real heap. Called
    /// during GC/teardown.
    fn free_unreferenced_byte_code(&mut self);

    fn top_frame(&self) -> Option<FrameId>;
    fn previous_frame(&self, id: FrameId) -> Option<FrameId>;
    fn frame_descriptor(&self, id: FrameId) -> FrameDescriptor;

    /// The kind of the `depth`-th lexical environment outward from
    /// `frame`'s innermost scope, or `None` past the global environment.
    fn environment_kind(&self, frame: FrameId, depth: usize) -> Option<EnvKind>;

    /// Number of named, non-internal properties in the environment at
    /// `env_index` outward from `frame`.
    fn variable_count(&self, frame: FrameId, env_index: usize) -> usize;

    /// Write one variable's wire representation (name length-prefix,
    /// value-type tag, value length-prefix) into `w`. Returns `false` if
    /// it did not fit, mirroring [`Transport::send`]'s failure signalling.
    fn write_variable(&self, frame: FrameId, env_index: usize, idx: usize, w: &mut Writer) -> bool;
}
