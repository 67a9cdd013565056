// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! The debugger's flag-word mode machine and step-command semantics.

#[cfg(test)]
mod mode_test;

use super::message::ClientMessage;

const CONNECTED: u8 = 0b0000_0001;
const BREAKPOINT: u8 = 0b0000_0010;

/// Run mode vs. breakpoint mode, plus the connection flag, packed into a
/// single byte the way the reference engine keeps its debugger state as a
/// bitset rather than a `bool` per concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Mode(u8);

impl Mode {
    #[must_use]
    pub const fn new() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn is_connected(self) -> bool {
        self.0 & CONNECTED != 0
    }

    pub fn set_connected(&mut self, connected: bool) {
        if connected {
            self.0 |= CONNECTED;
        } else {
            self.0 &= !CONNECTED;
        }
    }

    #[must_use]
    pub const fn in_breakpoint_mode(self) -> bool {
        self.0 & BREAKPOINT != 0
    }

    pub fn enter_breakpoint_mode(&mut self) {
        self.0 |= BREAKPOINT;
    }

    pub fn exit_breakpoint_mode(&mut self) {
        self.0 &= !BREAKPOINT;
    }

    /// Whether `msg` is accepted in the current mode. Callers in the wrong
    /// mode must close the transport (`SPEC_FULL.md` §4.6 failure
    /// semantics), never just ignore the message. Breakpoint mode accepts
    /// the stepping/inspection messages *in addition to* the run-mode
    /// whitelist, not instead of it: a client can still e.g. `Stop` while
    /// sitting at a breakpoint.
    #[must_use]
    pub const fn accepts(self, msg: ClientMessage) -> bool {
        msg.allowed_in_run_mode() || (self.in_breakpoint_mode() && msg.allowed_in_breakpoint_mode())
    }
}

/// Opaque VM call-frame identity, used only for ordering ("is this frame at
/// or above the saved one"). Lower values are assumed to be deeper in the
/// call stack, matching a downward-growing native stack; the VM supplies
/// the actual ordering via `VmHooks`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameId(pub u64);

/// The four stepping commands that can arm a stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepCommand {
    Continue,
    Step,
    Next,
    Finish,
}

/// The "stop context": which command armed the current run, and the frame
/// it was armed from (irrelevant for `Continue`/`Step`).
#[derive(Debug, Clone, Copy, Default)]
pub struct StopContext {
    command: Option<StepCommand>,
    frame: Option<FrameId>,
}

impl StopContext {
    #[must_use]
    pub const fn new() -> Self {
        Self { command: None, frame: None }
    }

    pub fn arm(&mut self, command: StepCommand, frame: FrameId) {
        self.command = Some(command);
        self.frame = Some(frame);
    }

    pub fn clear(&mut self) {
        self.command = None;
        self.frame = None;
    }

    #[must_use]
    pub const fn command(&self) -> Option<StepCommand> {
        self.command
    }

    /// Whether execution should stop at `hit`, a frame that just reached a
    /// breakpoint opcode. `enabled` reports whether that particular
    /// breakpoint is itself enabled (irrelevant to every command but
    /// `Continue`, which only honours enabled breakpoints).
    #[must_use]
    pub fn should_stop(&self, hit: FrameId, enabled: bool) -> bool {
        match self.command {
            None => false,
            Some(StepCommand::Continue) => enabled,
            Some(StepCommand::Step) => true,
            Some(StepCommand::Next) => match self.frame {
                Some(saved) => hit >= saved,
                None => true,
            },
            Some(StepCommand::Finish) => match self.frame {
                Some(saved) => hit > saved,
                None => false,
            },
        }
    }
}
