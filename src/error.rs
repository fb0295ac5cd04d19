// BSD 2-Clause License
//
// Copyright (c) 2024 Alasdair Armstrong
//
// All rights reserved.
//
// Redistribution and use in source and binary forms, with or without
// modification, are permitted provided that the following conditions are
// met:
//
// 1. Redistributions of source code must retain the above copyright
// notice, this list of conditions and the following disclaimer.
//
// 2. Redistributions in binary form must reproduce the above copyright
// notice, this list of conditions and the following disclaimer in the
// documentation and/or other materials provided with the distribution.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS
// "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES, INCLUDING, BUT NOT
// LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR
// A PARTICULAR PURPOSE ARE DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT
// HOLDER OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL,
// SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT
// LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR SERVICES; LOSS OF USE,
// DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY
// THEORY OF LIABILITY, WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT
// (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE USE
// OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

use std::fmt;

use crate::ir::Name;

/// Errors that can occur while instrumenting a single execution
/// state. None of these abort the hosting engine: a hook that hits one
/// downgrades it to a recorded anomaly, while the symbol/memory
/// primitives surface them to their caller via `Result`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExecError {
    Type(&'static str),
    /// Used when we access memory that is not mapped in the current
    /// execution state.
    Unmapped,
    /// A memory access whose address expression cannot be reduced to
    /// a concrete byte address.
    SymbolicAddress,
    /// Raised for access widths that are not a positive multiple of
    /// 8, or for floating-point symbol widths other than 32 and 64.
    Width(u32),
    /// A register operand that has no value in the current state.
    UninitRegister(Name),
    /// The engine announced the creation of a thread identity that is
    /// already registered in the same state.
    DuplicateThread(usize),
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ExecError::*;
        match self {
            Type(msg) => write!(f, "Type error: {}", msg),
            Unmapped => write!(f, "Tried to access unmapped memory"),
            SymbolicAddress => write!(f, "Address expression did not reduce to a concrete address"),
            Width(w) => write!(f, "Unsupported access or symbol width {}", w),
            UninitRegister(r) => write!(f, "Register {} has no value in this state", r),
            DuplicateThread(tid) => write!(f, "Thread {} was announced twice in the same state", tid),
        }
    }
}

impl std::error::Error for ExecError {}
