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

//! Opaque handles for already-decoded bitcode instructions. The
//! engine owns instruction decoding; the listener only sees a kind
//! tag with static operand metadata and the source location the
//! instruction was compiled from. Operands are interned register
//! identifiers resolved against the execution state's bindings.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::source_loc::SourceLoc;

/// A `Name` is an interned identifier for a register or virtual
/// operand slot in the bitcode, assigned by the engine's frontend.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct Name {
    id: u32,
}

impl Name {
    pub fn from_u32(id: u32) -> Self {
        Name { id }
    }

    pub fn as_u32(self) -> u32 {
        self.id
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.id)
    }
}

/// The statically-known shape of an instruction, with just enough
/// operand metadata for instrumentation. Widths are always in bits.
#[derive(Clone, Debug)]
pub enum InstrKind {
    /// Read `width` bits from the address in `addr` into `dst`.
    Load { dst: Name, addr: Name, width: u32 },
    /// Write the `width`-bit value in `value` to the address in `addr`.
    Store { value: Name, addr: Name, width: u32 },
    /// Allocate `width` bits; the base address is visible in `addr`
    /// once the instruction has executed.
    Alloc { addr: Name, width: u32 },
    /// Release the `width`-bit allocation based at the address in `addr`.
    Free { addr: Name, width: u32 },
    /// Division or remainder with divisor `rhs`.
    Div { dst: Name, lhs: Name, rhs: Name },
    Rem { dst: Name, lhs: Name, rhs: Name },
    /// Assertion over the boolean in `cond`. A violated assert
    /// arrives at the listener via the execution-failed hook.
    Assert { cond: Name },
    /// Assumption: `cond` joins the path constraints.
    Assume { cond: Name },
    /// Library-call model requesting a fresh symbolic input in `dst`.
    MakeSymbolic { dst: Name, name: String, width: u32, float: bool },
    /// A thread-creation call; the new thread is announced separately
    /// through the thread-created hook.
    ThreadCreate { entry: Name },
    Exit,
    /// Anything the listener has no special handling for, tagged with
    /// the opcode mnemonic for logging.
    Other(&'static str),
}

/// One decoded instruction occurrence. Immutable from the listener's
/// perspective.
#[derive(Clone, Debug)]
pub struct Instr {
    kind: InstrKind,
    loc: SourceLoc,
}

impl Instr {
    pub fn new(kind: InstrKind, loc: SourceLoc) -> Self {
        Instr { kind, loc }
    }

    pub fn kind(&self) -> &InstrKind {
        &self.kind
    }

    pub fn loc(&self) -> SourceLoc {
        self.loc
    }

    pub fn is_memory(&self) -> bool {
        matches!(
            self.kind,
            InstrKind::Load { .. } | InstrKind::Store { .. } | InstrKind::Alloc { .. } | InstrKind::Free { .. }
        )
    }

    pub fn mnemonic(&self) -> &'static str {
        use InstrKind::*;
        match &self.kind {
            Load { .. } => "load",
            Store { .. } => "store",
            Alloc { .. } => "alloc",
            Free { .. } => "free",
            Div { .. } => "div",
            Rem { .. } => "rem",
            Assert { .. } => "assert",
            Assume { .. } => "assume",
            MakeSymbolic { .. } => "make_symbolic",
            ThreadCreate { .. } => "thread_create",
            Exit => "exit",
            Other(op) => op,
        }
    }
}
