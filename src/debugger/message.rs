// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Server-to-client and client-to-server message type codes.
//!
//! Streamed messages come in pairs (`X` / `XEnd`); by convention the `End`
//! variant's discriminant is exactly one higher than its non-terminal
//! counterpart, matching the "promote the low bit of the type code" rule
//! from the wire format notes.

/// Protocol version advertised in the handshake configuration record.
/// Bumping this is required whenever a message type is added, removed, or
/// renumbered.
pub const PROTOCOL_VERSION: u8 = 1;

/// Server (engine) to client message codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ServerMessage {
    Configuration = 1,
    ParseError = 2,
    ByteCodeCp = 3,
    ParseFunction = 4,
    BreakpointList = 5,
    SourceCode = 6,
    SourceCodeEnd = 7,
    BreakpointHit = 8,
    ExceptionHit = 9,
    BacktraceTotal = 10,
    Backtrace = 11,
    BacktraceEnd = 12,
    EvalResult = 13,
    EvalResultEnd = 14,
    EvalError = 15,
    ScopeChain = 16,
    ScopeChainEnd = 17,
    ScopeVariables = 18,
    ScopeVariablesEnd = 19,
    ReleaseByteCodeCp = 20,
    MemStats = 21,
    CloseConnection = 22,
}

const SERVER_MESSAGE_COUNT: u8 = 22;
const _: () = assert!(PROTOCOL_VERSION == 1, "bump PROTOCOL_VERSION when the message set changes");
const _: () = assert!(SERVER_MESSAGE_COUNT == 22, "update SERVER_MESSAGE_COUNT alongside ServerMessage");

impl ServerMessage {
    /// The terminator variant for a streamed message that has one, if any.
    #[must_use]
    pub const fn end_variant(self) -> Option<Self> {
        match self {
            Self::SourceCode => Some(Self::SourceCodeEnd),
            Self::Backtrace => Some(Self::BacktraceEnd),
            Self::EvalResult => Some(Self::EvalResultEnd),
            Self::ScopeChain => Some(Self::ScopeChainEnd),
            Self::ScopeVariables => Some(Self::ScopeVariablesEnd),
            _ => None,
        }
    }
}

/// Client to server message codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ClientMessage {
    FreeByteCodeCp = 1,
    UpdateBreakpoint = 2,
    MemStatsRequest = 3,
    Stop = 4,
    ExceptionConfig = 5,
    ParserConfig = 6,
    ParserResume = 7,
    ClientSource = 8,
    ClientSourcePart = 9,
    NoMoreSources = 10,
    ContextReset = 11,
    Continue = 12,
    Step = 13,
    Next = 14,
    Finish = 15,
    GetBacktrace = 16,
    Eval = 17,
    EvalPart = 18,
    GetScopeChain = 19,
    GetScopeVariables = 20,
}

impl ClientMessage {
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            1 => Self::FreeByteCodeCp,
            2 => Self::UpdateBreakpoint,
            3 => Self::MemStatsRequest,
            4 => Self::Stop,
            5 => Self::ExceptionConfig,
            6 => Self::ParserConfig,
            7 => Self::ParserResume,
            8 => Self::ClientSource,
            9 => Self::ClientSourcePart,
            10 => Self::NoMoreSources,
            11 => Self::ContextReset,
            12 => Self::Continue,
            13 => Self::Step,
            14 => Self::Next,
            15 => Self::Finish,
            16 => Self::GetBacktrace,
            17 => Self::Eval,
            18 => Self::EvalPart,
            19 => Self::GetScopeChain,
            20 => Self::GetScopeVariables,
            _ => return None,
        })
    }

    /// Whether this message is accepted while the debugger is in run mode.
    #[must_use]
    pub const fn allowed_in_run_mode(self) -> bool {
        matches!(
            self,
            Self::FreeByteCodeCp
                | Self::UpdateBreakpoint
                | Self::MemStatsRequest
                | Self::Stop
                | Self::ExceptionConfig
                | Self::ParserConfig
                | Self::ParserResume
                | Self::ClientSource
                | Self::ClientSourcePart
                | Self::NoMoreSources
                | Self::ContextReset
        )
    }

    /// Whether this message is accepted while the debugger is in
    /// breakpoint mode. Note most run-mode messages are *not* repeated
    /// here: only the ones `SPEC_FULL.md` names as additionally available.
    #[must_use]
    pub const fn allowed_in_breakpoint_mode(self) -> bool {
        matches!(
            self,
            Self::Continue
                | Self::Step
                | Self::Next
                | Self::Finish
                | Self::GetBacktrace
                | Self::Eval
                | Self::EvalPart
                | Self::GetScopeChain
                | Self::GetScopeVariables
        )
    }

    /// Whether handling this message returns the debugger to run mode.
    #[must_use]
    pub const fn exits_breakpoint_mode(self) -> bool {
        matches!(self, Self::Continue | Self::Step | Self::Next | Self::Finish)
    }
}
