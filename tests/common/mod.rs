// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Shared test infrastructure for integration tests: a queue-backed
//! `Transport` and a scripted `VmHooks` double, both built only on this
//! crate's public API.

#![allow(dead_code, reason = "not every scenario file uses every helper")]

pub mod transport;
pub mod vm_hooks;

pub use transport::VecTransport;
pub use vm_hooks::ScriptedVm;
