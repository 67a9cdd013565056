// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! A scripted `VmHooks` double: a fixed call stack and a fixed lexical
//! environment chain, handed to the debugger as if it were a real VM.

use ecma_core::debugger::{EnvKind, FrameDescriptor, FrameId, VmHooks, Writer};

/// Call stack ordered innermost-first; environment chain ordered
/// innermost-first, terminated implicitly once exhausted (callers that
/// need an explicit `Global` push it as the chain's last entry).
pub struct ScriptedVm {
    pub frames: Vec<FrameId>,
    pub environments: Vec<EnvKind>,
    pub variable_names: Vec<&'static str>,
}

impl ScriptedVm {
    pub fn new(frames: Vec<FrameId>, environments: Vec<EnvKind>) -> Self {
        Self { frames, environments, variable_names: Vec::new() }
    }

    fn frame_index(&self, id: FrameId) -> Option<usize> {
        self.frames.iter().position(|f| *f == id)
    }
}

impl VmHooks for ScriptedVm {
    fn free_unreferenced_byte_code(&mut self) {}

    fn top_frame(&self) -> Option<FrameId> {
        self.frames.first().copied()
    }

    fn previous_frame(&self, id: FrameId) -> Option<FrameId> {
        let idx = self.frame_index(id)?;
        self.frames.get(idx + 1).copied()
    }

    fn frame_descriptor(&self, id: FrameId) -> FrameDescriptor {
        let idx = self.frame_index(id).expect("descriptor requested for unknown frame");
        FrameDescriptor {
            byte_code_cp: idx as u32,
            offset: 0,
            is_static_function: false,
            debugger_ignore: false,
        }
    }

    fn environment_kind(&self, _frame: FrameId, depth: usize) -> Option<EnvKind> {
        self.environments.get(depth).copied()
    }

    fn variable_count(&self, _frame: FrameId, _env_index: usize) -> usize {
        self.variable_names.len()
    }

    fn write_variable(&self, _frame: FrameId, _env_index: usize, idx: usize, w: &mut Writer) -> bool {
        w.string_chunk(self.variable_names[idx].as_bytes()) && w.u8(0)
    }
}
