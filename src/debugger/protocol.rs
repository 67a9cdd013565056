// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! The debugger protocol engine: handshake, client-message dispatch, the
//! mode machine, multi-part payload accounting, the backtrace/scope-chain/
//! scope-variables streaming protocols, and the delayed byte-code free
//! list.

#[cfg(test)]
mod protocol_test;

use alloc::vec::Vec;
use core::fmt;

use crate::address::Vaddr;
use crate::cptr::{self, CompressedPtr};
use crate::heap::Heap;
use crate::host::HeapMemory;
use crate::stats::{Kind, Stats};

use super::message::{ClientMessage, ServerMessage, PROTOCOL_VERSION};
use super::mode::{FrameId, Mode, StepCommand, StopContext};
use super::transport::{EnvKind, FrameDescriptor, Transport, VmHooks};
use super::wire::{Reader, Writer};

/// Default negotiated maximum message size, within the 64..=256 range the
/// handshake contract allows.
pub const DEFAULT_MAX_MESSAGE_SIZE: u16 = 128;

const MAX_MULTIPART_BYTES: usize = 64 * 1024;

/// The size, in bytes, of the overlay a freed byte-code header reserves
/// for the delayed-free list's link. Chosen to fit a [`CompressedPtr`]
/// comfortably regardless of cp16/cp32 mode.
const BYTE_CODE_HEADER_SIZE: usize = 32;

/// Errors that close the transport (`SPEC_FULL.md` §4.6 failure
/// semantics, §7 tier 3). None of these are recoverable mid-connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    WrongPacketSize,
    DisallowedForMode,
    UnknownMessageType,
    BufferAllocationFailed,
    OutOfOrderFree,
    MultiPartTypeMismatch,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::WrongPacketSize => "wrong packet size for the declared message type",
            Self::DisallowedForMode => "message not allowed in the current mode",
            Self::UnknownMessageType => "unknown message type code",
            Self::BufferAllocationFailed => "could not allocate a multi-part receive buffer",
            Self::OutOfOrderFree => "FreeByteCodeCp did not match the delayed-free list tail",
            Self::MultiPartTypeMismatch => "message type does not match the in-progress multi-part sequence",
        };
        f.write_str(msg)
    }
}

/// Evaluation mode for `Eval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalMode {
    Eval,
    Throw,
    Abort,
}

/// An event produced by a fully-parsed, mode-validated client message,
/// ready for the embedding engine to act on. `None` multi-part payloads
/// accumulate silently until complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    FreeByteCodeAck,
    UpdateBreakpoint { id: u32, enabled: bool },
    Stop,
    ClientSourceComplete(Vec<u8>),
    NoMoreSources,
    ContextReset,
    Step(StepCommand),
    GetBacktrace { min_depth: u32, max_depth: u32, want_total: bool },
    Eval { chain_index: u32, mode: EvalMode, source: Vec<u8> },
    GetScopeChain,
    GetScopeVariables { index: u32 },
    MemStatsRequest,
    /// Opaque host configuration messages this core does not interpret
    /// (exception/parser configuration are ECMAScript/parsing concerns,
    /// explicitly out of this crate's scope).
    HostConfig(ClientMessage, Vec<u8>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PartKind {
    Eval,
    ClientSource,
}

struct MultiPart {
    kind: PartKind,
    total: usize,
    buf: Vec<u8>,
    chain_index: u32,
    eval_mode: EvalMode,
}

impl MultiPart {
    fn start(kind: PartKind, total: usize, chain_index: u32, eval_mode: EvalMode) -> Result<Self, ProtocolError> {
        if total > MAX_MULTIPART_BYTES {
            return Err(ProtocolError::BufferAllocationFailed);
        }
        let mut buf = Vec::new();
        buf.try_reserve_exact(total).map_err(|_| ProtocolError::BufferAllocationFailed)?;
        Ok(Self { kind, total, buf, chain_index, eval_mode })
    }

    fn append(&mut self, chunk: &[u8]) -> Result<(), ProtocolError> {
        if self.buf.len() + chunk.len() > self.total {
            return Err(ProtocolError::WrongPacketSize);
        }
        self.buf.extend_from_slice(chunk);
        Ok(())
    }

    fn is_complete(&self) -> bool {
        self.buf.len() == self.total
    }
}

/// Singly-linked LIFO free list of delayed byte-code releases, threaded
/// through compressed pointers overlaying the freed headers themselves.
struct DelayedFreeList {
    top: CompressedPtr,
}

impl DelayedFreeList {
    const fn new() -> Self {
        Self { top: CompressedPtr::null() }
    }

    fn is_empty(&self) -> bool {
        self.top.is_null()
    }

    fn push<M: HeapMemory>(&mut self, mem: &mut M, heap_base: Vaddr, cp: CompressedPtr) {
        let addr = cptr::decode(heap_base, cp);
        mem.write(addr, self.top);
        self.top = cp;
    }

    /// Verify `cp` matches the most recently pushed, not-yet-acknowledged
    /// entry, and pop it if so.
    fn ack<M: HeapMemory>(&mut self, mem: &mut M, heap_base: Vaddr, cp: CompressedPtr) -> bool {
        if self.top.is_null() || self.top != cp {
            return false;
        }
        let addr = cptr::decode(heap_base, cp);
        let next: CompressedPtr = mem.read(addr);
        self.top = next;
        true
    }

    /// Force-free every entry back to the heap, used on disconnect.
    fn force_free_all<M: HeapMemory>(&mut self, mem: &mut M, heap_base: Vaddr, heap: &mut Heap) {
        let mut cur = self.top;
        while !cur.is_null() {
            let addr = cptr::decode(heap_base, cur);
            let next: CompressedPtr = mem.read(addr);
            heap.free(mem, addr, BYTE_CODE_HEADER_SIZE);
            cur = next;
        }
        self.top = CompressedPtr::null();
    }
}

/// The debugger's process-wide state: mode, stepping context, delayed
/// byte-code frees, and any in-flight multi-part payload.
pub struct Debugger {
    mode: Mode,
    stop: StopContext,
    delayed_free: DelayedFreeList,
    multipart: Option<MultiPart>,
    max_message_size: u16,
}

impl Default for Debugger {
    fn default() -> Self {
        Self::new()
    }
}

impl Debugger {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            mode: Mode::new(),
            stop: StopContext::new(),
            delayed_free: DelayedFreeList::new(),
            multipart: None,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }

    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    #[must_use]
    pub const fn stop_context(&self) -> &StopContext {
        &self.stop
    }

    #[must_use]
    pub const fn max_message_size(&self) -> u16 {
        self.max_message_size
    }

    /// Send the handshake `CONFIGURATION` record and mark the connection
    /// live. `max_message_size` is clamped to `[64, 256]` per the
    /// transport contract.
    pub fn connect(&mut self, transport: &mut impl Transport, max_message_size: u16) -> bool {
        self.max_message_size = max_message_size.clamp(64, 256);
        self.mode.set_connected(true);
        #[cfg(feature = "log")]
        tracing::debug!(max_message_size = self.max_message_size, "debugger client connected");

        let mut buf = [0u8; 16];
        let mut w = Writer::new(&mut buf);
        w.u8(ServerMessage::Configuration as u8);
        w.u8(PROTOCOL_VERSION);
        w.u8(0); // endianness flag: always little-endian, see module docs
        w.u16(self.max_message_size);
        w.u8(cptr_size_bytes());
        transport.send(w.as_slice())
    }

    /// Tear down the connection: force-free the delayed list and reset all
    /// mode/stepping state. Called on transport disconnect or an explicit
    /// `CloseConnection`.
    pub fn disconnect<M: HeapMemory>(&mut self, mem: &mut M, heap_base: Vaddr, heap: &mut Heap, transport: &mut impl Transport) {
        self.delayed_free.force_free_all(mem, heap_base, heap);
        self.multipart = None;
        self.mode = Mode::new();
        self.stop.clear();
        #[cfg(feature = "log")]
        tracing::debug!("debugger client disconnected");
        transport.close();
    }

    /// Record that `cp` was released while the debugger is connected:
    /// push it onto the delayed-free list and notify the client.
    pub fn release_byte_code<M: HeapMemory>(
        &mut self,
        mem: &mut M,
        heap_base: Vaddr,
        transport: &mut impl Transport,
        cp: CompressedPtr,
    ) -> bool {
        self.delayed_free.push(mem, heap_base, cp);
        let mut buf = [0u8; 8];
        let mut w = Writer::new(&mut buf);
        w.u8(ServerMessage::ReleaseByteCodeCp as u8);
        write_cp(&mut w, cp);
        transport.send(w.as_slice())
    }

    /// Parse and dispatch one client packet. Returns `Ok(None)` while a
    /// multi-part payload is still accumulating, `Ok(Some(event))` once a
    /// full client request is ready to act on, or `Err` if the transport
    /// must be closed.
    pub fn handle_client_message<M: HeapMemory>(
        &mut self,
        mem: &mut M,
        heap_base: Vaddr,
        raw: &[u8],
    ) -> Result<Option<ClientEvent>, ProtocolError> {
        let result = self.parse_and_dispatch(mem, heap_base, raw);
        #[cfg(feature = "log")]
        if let Err(err) = &result {
            tracing::warn!(error = %err, "closing debugger transport");
        }
        result
    }

    fn parse_and_dispatch<M: HeapMemory>(
        &mut self,
        mem: &mut M,
        heap_base: Vaddr,
        raw: &[u8],
    ) -> Result<Option<ClientEvent>, ProtocolError> {
        let mut r = Reader::new(raw);
        let code = r.u8().ok_or(ProtocolError::WrongPacketSize)?;
        let msg = ClientMessage::from_code(code).ok_or(ProtocolError::UnknownMessageType)?;

        if let Some(mp) = &self.multipart {
            let expected = match mp.kind {
                PartKind::Eval => ClientMessage::EvalPart,
                PartKind::ClientSource => ClientMessage::ClientSourcePart,
            };
            if msg != expected {
                self.multipart = None;
                return Err(ProtocolError::MultiPartTypeMismatch);
            }
        } else if !self.mode.accepts(msg) {
            return Err(ProtocolError::DisallowedForMode);
        }

        match msg {
            ClientMessage::FreeByteCodeCp => {
                let cp = read_cp(&mut r).ok_or(ProtocolError::WrongPacketSize)?;
                if !self.delayed_free.ack(mem, heap_base, cp) {
                    return Err(ProtocolError::OutOfOrderFree);
                }
                Ok(Some(ClientEvent::FreeByteCodeAck))
            }
            ClientMessage::UpdateBreakpoint => {
                let id = r.u32().ok_or(ProtocolError::WrongPacketSize)?;
                let enabled = r.u8().ok_or(ProtocolError::WrongPacketSize)? != 0;
                Ok(Some(ClientEvent::UpdateBreakpoint { id, enabled }))
            }
            ClientMessage::Stop => Ok(Some(ClientEvent::Stop)),
            ClientMessage::MemStatsRequest => Ok(Some(ClientEvent::MemStatsRequest)),
            ClientMessage::NoMoreSources => Ok(Some(ClientEvent::NoMoreSources)),
            ClientMessage::ContextReset => Ok(Some(ClientEvent::ContextReset)),
            ClientMessage::ExceptionConfig | ClientMessage::ParserConfig | ClientMessage::ParserResume => {
                Ok(Some(ClientEvent::HostConfig(msg, r.rest().to_vec())))
            }
            ClientMessage::ClientSource => {
                let total = r.u32().ok_or(ProtocolError::WrongPacketSize)? as usize;
                let mut mp = MultiPart::start(PartKind::ClientSource, total, 0, EvalMode::Eval)?;
                mp.append(r.rest())?;
                self.finish_or_store_multipart(mp)
            }
            ClientMessage::ClientSourcePart => {
                let mut mp = self.multipart.take().ok_or(ProtocolError::MultiPartTypeMismatch)?;
                mp.append(r.rest())?;
                self.finish_or_store_multipart(mp)
            }
            ClientMessage::Continue | ClientMessage::Step | ClientMessage::Next | ClientMessage::Finish => {
                let command = match msg {
                    ClientMessage::Continue => StepCommand::Continue,
                    ClientMessage::Step => StepCommand::Step,
                    ClientMessage::Next => StepCommand::Next,
                    ClientMessage::Finish => StepCommand::Finish,
                    _ => unreachable!(),
                };
                self.mode.exit_breakpoint_mode();
                Ok(Some(ClientEvent::Step(command)))
            }
            ClientMessage::GetBacktrace => {
                let min_depth = r.u32().ok_or(ProtocolError::WrongPacketSize)?;
                let max_depth = r.u32().ok_or(ProtocolError::WrongPacketSize)?;
                let want_total = r.u8().ok_or(ProtocolError::WrongPacketSize)? != 0;
                Ok(Some(ClientEvent::GetBacktrace { min_depth, max_depth, want_total }))
            }
            ClientMessage::Eval => {
                let chain_index = r.u32().ok_or(ProtocolError::WrongPacketSize)?;
                let eval_mode = match r.u8().ok_or(ProtocolError::WrongPacketSize)? {
                    0 => EvalMode::Eval,
                    1 => EvalMode::Throw,
                    2 => EvalMode::Abort,
                    _ => return Err(ProtocolError::WrongPacketSize),
                };
                let total = r.u32().ok_or(ProtocolError::WrongPacketSize)? as usize;
                let mut mp = MultiPart::start(PartKind::Eval, total, chain_index, eval_mode)?;
                mp.append(r.rest())?;
                self.finish_or_store_multipart(mp)
            }
            ClientMessage::EvalPart => {
                let mut mp = self.multipart.take().ok_or(ProtocolError::MultiPartTypeMismatch)?;
                mp.append(r.rest())?;
                self.finish_or_store_multipart(mp)
            }
            ClientMessage::GetScopeChain => Ok(Some(ClientEvent::GetScopeChain)),
            ClientMessage::GetScopeVariables => {
                let index = r.u32().ok_or(ProtocolError::WrongPacketSize)?;
                Ok(Some(ClientEvent::GetScopeVariables { index }))
            }
        }
    }

    fn finish_or_store_multipart(&mut self, mp: MultiPart) -> Result<Option<ClientEvent>, ProtocolError> {
        if !mp.is_complete() {
            self.multipart = Some(mp);
            return Ok(None);
        }
        let event = match mp.kind {
            PartKind::ClientSource => ClientEvent::ClientSourceComplete(mp.buf),
            PartKind::Eval => ClientEvent::Eval { chain_index: mp.chain_index, mode: mp.eval_mode, source: mp.buf },
        };
        Ok(Some(event))
    }

    /// Emit `BreakpointHit`/`ExceptionHit` and enter breakpoint mode,
    /// arming the stop context so a subsequent stepping command knows
    /// where it started from.
    pub fn enter_breakpoint_mode(&mut self, transport: &mut impl Transport, frame: FrameId, is_exception: bool) -> bool {
        self.mode.enter_breakpoint_mode();
        self.stop.arm(StepCommand::Continue, frame);
        let code = if is_exception { ServerMessage::ExceptionHit } else { ServerMessage::BreakpointHit };
        let mut buf = [0u8; 1];
        buf[0] = code as u8;
        transport.send(&buf)
    }

    /// Arm a newly issued stepping command (called once the event from
    /// [`Debugger::handle_client_message`] is acted on).
    pub fn arm_step(&mut self, command: StepCommand, current_frame: FrameId) {
        self.stop.arm(command, current_frame);
    }

    /// Whether the VM should stop at `hit` given the currently armed
    /// stepping command.
    #[must_use]
    pub fn should_stop(&self, hit: FrameId, breakpoint_enabled: bool) -> bool {
        self.stop.should_stop(hit, breakpoint_enabled)
    }

    /// Stream a backtrace in response to `GetBacktrace`.
    pub fn send_backtrace(
        &self,
        transport: &mut impl Transport,
        vm: &impl VmHooks,
        min_depth: u32,
        max_depth: u32,
        want_total: bool,
    ) -> bool {
        let descriptors = walk_frames(vm, min_depth, max_depth);

        if want_total {
            let mut buf = [0u8; 5];
            let mut w = Writer::new(&mut buf);
            w.u8(ServerMessage::BacktraceTotal as u8);
            w.u32(descriptors.len() as u32);
            if !transport.send(w.as_slice()) {
                return false;
            }
        }

        let mut buf = [0u8; 256];
        let per_packet = (self.max_message_size as usize).saturating_sub(1) / 8;
        let per_packet = per_packet.max(1);
        let mut idx = 0;
        while idx < descriptors.len() || idx == 0 {
            let mut w = Writer::new(&mut buf[..self.max_message_size as usize]);
            let is_last = idx + per_packet >= descriptors.len();
            let code = if is_last {
                ServerMessage::BacktraceEnd
            } else {
                ServerMessage::Backtrace
            };
            w.u8(code as u8);
            let end = (idx + per_packet).min(descriptors.len());
            for d in &descriptors[idx..end] {
                w.u32(d.byte_code_cp);
                w.u32(d.offset);
            }
            if !transport.send(w.as_slice()) {
                return false;
            }
            idx = end;
            if is_last {
                break;
            }
        }
        true
    }

    /// Stream the scope chain for the current frame.
    pub fn send_scope_chain(&self, transport: &mut impl Transport, vm: &impl VmHooks, frame: FrameId) -> bool {
        let mut buf = [0u8; 256];
        let mut depth = 0usize;
        loop {
            let Some(kind) = vm.environment_kind(frame, depth) else {
                // ran off the end without an explicit Global terminator;
                // treat as already closed.
                let mut w = Writer::new(&mut buf);
                w.u8(ServerMessage::ScopeChainEnd as u8);
                return transport.send(w.as_slice());
            };
            let is_global = kind == EnvKind::Global;
            let mut w = Writer::new(&mut buf);
            let code = if is_global { ServerMessage::ScopeChainEnd } else { ServerMessage::ScopeChain };
            w.u8(code as u8);
            w.u8(env_kind_byte(kind));
            if !transport.send(w.as_slice()) {
                return false;
            }
            if is_global {
                return true;
            }
            depth += 1;
        }
    }

    /// Stream the named variables of one scope-chain environment.
    pub fn send_scope_variables(&self, transport: &mut impl Transport, vm: &impl VmHooks, frame: FrameId, env_index: u32) -> bool {
        let env_index = env_index as usize;
        let count = vm.variable_count(frame, env_index);
        let mut buf = [0u8; 256];
        if count == 0 {
            let mut w = Writer::new(&mut buf);
            w.u8(ServerMessage::ScopeVariablesEnd as u8);
            return transport.send(w.as_slice());
        }
        for idx in 0..count {
            let is_last = idx + 1 == count;
            let mut w = Writer::new(&mut buf);
            let code = if is_last { ServerMessage::ScopeVariablesEnd } else { ServerMessage::ScopeVariables };
            w.u8(code as u8);
            if !vm.write_variable(frame, env_index, idx, &mut w) {
                return false;
            }
            if !transport.send(w.as_slice()) {
                return false;
            }
        }
        true
    }

    /// Send the result of a successful `Eval`.
    pub fn send_eval_result(&self, transport: &mut impl Transport, result: &[u8]) -> bool {
        send_chunked_string(transport, ServerMessage::EvalResult, ServerMessage::EvalResultEnd, result)
    }

    /// Send an `Eval` failure.
    pub fn send_eval_error(&self, transport: &mut impl Transport, message: &[u8]) -> bool {
        let mut buf = [0u8; 256];
        let mut w = Writer::new(&mut buf);
        w.u8(ServerMessage::EvalError as u8);
        w.string_chunk(message);
        transport.send(w.as_slice())
    }

    /// Reply to `MemStatsRequest`: five `u32`s, `(allocated, byte-code,
    /// string, object, property)` (`SPEC_FULL.md` §4.7/§6). `allocated` is
    /// the total currently live across every allocator category;
    /// byte-code/string/object/property are the semantic-kind totals the
    /// embedding VM reports alongside its [`crate::Context::alloc`] calls.
    pub fn send_memstats(&self, transport: &mut impl Transport, stats: &Stats) -> bool {
        let mut buf = [0u8; 21];
        let mut w = Writer::new(&mut buf);
        w.u8(ServerMessage::MemStats as u8);
        w.u32(stats.total_current() as u32);
        w.u32(stats.kind_current(Kind::ByteCode) as u32);
        w.u32(stats.kind_current(Kind::String) as u32);
        w.u32(stats.kind_current(Kind::Object) as u32);
        w.u32(stats.kind_current(Kind::Property) as u32);
        transport.send(w.as_slice())
    }
}

fn walk_frames(vm: &impl VmHooks, min_depth: u32, max_depth: u32) -> Vec<FrameDescriptor> {
    let mut out = Vec::new();
    let mut frame = vm.top_frame();
    let mut depth = 0u32;
    while let Some(id) = frame {
        if depth >= min_depth && depth < max_depth {
            let d = vm.frame_descriptor(id);
            if !d.is_static_function && !d.debugger_ignore {
                out.push(d);
            }
        }
        if depth + 1 >= max_depth {
            break;
        }
        frame = vm.previous_frame(id);
        depth += 1;
    }
    out
}

const fn env_kind_byte(kind: EnvKind) -> u8 {
    match kind {
        EnvKind::With => 0,
        EnvKind::Local => 1,
        EnvKind::Closure => 2,
        EnvKind::Global => 3,
        EnvKind::NonClosure => 4,
    }
}

fn send_chunked_string(transport: &mut impl Transport, more: ServerMessage, end: ServerMessage, s: &[u8]) -> bool {
    let mut buf = [0u8; 260];
    if s.is_empty() {
        let mut w = Writer::new(&mut buf);
        w.u8(end as u8);
        w.string_chunk(s);
        return transport.send(w.as_slice());
    }
    let mut offset = 0;
    while offset < s.len() {
        let take = (s.len() - offset).min(super::wire::MAX_STRING_CHUNK);
        let is_last = offset + take >= s.len();
        let mut w = Writer::new(&mut buf);
        w.u8(if is_last { end as u8 } else { more as u8 });
        w.string_chunk(&s[offset..offset + take]);
        if !transport.send(w.as_slice()) {
            return false;
        }
        offset += take;
    }
    true
}

#[cfg(feature = "cp32")]
const fn cptr_size_bytes() -> u8 {
    4
}
#[cfg(not(feature = "cp32"))]
const fn cptr_size_bytes() -> u8 {
    2
}

#[cfg(feature = "cp32")]
fn write_cp(w: &mut Writer, cp: CompressedPtr) {
    w.u32(cp.raw());
}
#[cfg(not(feature = "cp32"))]
fn write_cp(w: &mut Writer, cp: CompressedPtr) {
    w.u16(cp.raw());
}

#[cfg(feature = "cp32")]
fn read_cp(r: &mut Reader) -> Option<CompressedPtr> {
    r.u32().map(CompressedPtr::from_raw)
}
#[cfg(not(feature = "cp32"))]
fn read_cp(r: &mut Reader) -> Option<CompressedPtr> {
    r.u16().map(CompressedPtr::from_raw)
}
