// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Host ports: the traits an embedding VM implements so this crate never
//! depends on a concrete memory layout, GC, or transport.
//!
//! This module mirrors the split the reference VM crate draws between its
//! `platform::traits` module (the trait boundary) and its `platform::mock`
//! module (host-backed test doubles): [`traits`] defines the contract,
//! [`mock`] provides the `std`-only implementations the test suite runs
//! against.

mod traits;

#[cfg(any(test, feature = "std"))]
mod mock;

pub use traits::{FallbackAllocator, FatalCode, FatalHandler, GcHost, HeapMemory, Pressure};

#[cfg(any(test, feature = "std"))]
pub use mock::{MockFatal, MockGc, MockMemory, SystemFallback};
