// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! The debugger wire protocol (C6): a stateful, binary, half-duplex
//! protocol a host VM speaks over any byte transport to expose
//! breakpoints, stepping, backtraces, scope inspection, and evaluation to
//! an external client.
//!
//! This module only implements the protocol state machine and wire
//! encoding; the actual breakpoint table, parser, and bytecode
//! interpreter are the embedding VM's responsibility, reached through
//! [`VmHooks`] and [`Transport`].

mod message;
mod mode;
mod protocol;
mod transport;
mod wire;

pub use message::{ClientMessage, ServerMessage, PROTOCOL_VERSION};
pub use mode::{FrameId, Mode, StepCommand};
pub use protocol::{ClientEvent, Debugger, EvalMode, ProtocolError, DEFAULT_MAX_MESSAGE_SIZE};
pub use transport::{EnvKind, FrameDescriptor, Transport, VmHooks};
pub use wire::{Reader, Writer, MAX_STRING_CHUNK};
