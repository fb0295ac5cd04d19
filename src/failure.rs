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

//! Failure classification. When the engine reports that an
//! instruction cannot complete validly, we classify the failure from
//! locally available information: the instruction's static kind, any
//! memory error latched on the state by an earlier failed access, and
//! whether a divisor expression can be zero on this path. This is the
//! only listener output meant for end-user visibility; the precision
//! here keeps bug reports distinct from infeasible-path pruning.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::expr::{classify, fold, Category};
use crate::ir::{Instr, InstrKind};
use crate::state::ExecutionState;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    Assertion,
    InvalidMemoryAccess,
    Arithmetic,
    Unclassified,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Assertion => write!(f, "assertion violation"),
            FailureKind::InvalidMemoryAccess => write!(f, "invalid memory access"),
            FailureKind::Arithmetic => write!(f, "arithmetic error"),
            FailureKind::Unclassified => write!(f, "unclassified failure"),
        }
    }
}

/// Classify the failure of `instr` in `state`. A latched memory error
/// from the accessor takes priority over the instruction kind, since
/// it identifies the underlying cause of whatever instruction finally
/// tripped.
pub fn classify_failure(state: &ExecutionState, instr: &Instr) -> FailureKind {
    if state.pending_memory_error().is_some() {
        return FailureKind::InvalidMemoryAccess;
    }
    match instr.kind() {
        InstrKind::Assert { .. } => FailureKind::Assertion,
        InstrKind::Load { .. } | InstrKind::Store { .. } | InstrKind::Alloc { .. } | InstrKind::Free { .. } => {
            FailureKind::InvalidMemoryAccess
        }
        InstrKind::Div { rhs, .. } | InstrKind::Rem { rhs, .. } => match state.reg(*rhs) {
            Ok(divisor) => {
                let divisor = fold(divisor);
                if divisor.is_zero() || classify(&divisor) != Category::Concrete {
                    // Either definitely zero, or symbolic and the
                    // path allows zero (the engine only reports
                    // failures it found reachable).
                    FailureKind::Arithmetic
                } else {
                    FailureKind::Unclassified
                }
            }
            Err(_) => FailureKind::Unclassified,
        },
        _ => FailureKind::Unclassified,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::ExecError;
    use crate::expr::{Exp, Ty};
    use crate::ir::Name;
    use crate::source_loc::SourceLoc;

    fn div(dst: u32, lhs: u32, rhs: u32) -> Instr {
        Instr::new(
            InstrKind::Div { dst: Name::from_u32(dst), lhs: Name::from_u32(lhs), rhs: Name::from_u32(rhs) },
            SourceLoc::unknown(),
        )
    }

    #[test]
    fn asserts_classify_as_assertion_violations() {
        let state = ExecutionState::new();
        let instr = Instr::new(InstrKind::Assert { cond: Name::from_u32(0) }, SourceLoc::unknown());
        assert_eq!(classify_failure(&state, &instr), FailureKind::Assertion);
    }

    #[test]
    fn latched_memory_error_wins_over_instruction_kind() {
        let mut state = ExecutionState::new();
        state.latch_memory_error(ExecError::Unmapped);
        let instr = Instr::new(InstrKind::Assert { cond: Name::from_u32(0) }, SourceLoc::unknown());
        assert_eq!(classify_failure(&state, &instr), FailureKind::InvalidMemoryAccess);
    }

    #[test]
    fn symbolic_divisor_is_an_arithmetic_error() {
        let mut state = ExecutionState::new();
        let (d, _, _) = state.fresh_symbol("d", Ty::BitVec(32));
        state.set_reg(Name::from_u32(2), d);
        assert_eq!(classify_failure(&state, &div(0, 1, 2)), FailureKind::Arithmetic);
    }

    #[test]
    fn concrete_zero_divisor_is_an_arithmetic_error() {
        let mut state = ExecutionState::new();
        state.set_reg(Name::from_u32(2), Arc::new(Exp::Bits64(0, 32)));
        assert_eq!(classify_failure(&state, &div(0, 1, 2)), FailureKind::Arithmetic);
    }

    #[test]
    fn nonzero_concrete_divisor_is_not_arithmetic() {
        let mut state = ExecutionState::new();
        state.set_reg(Name::from_u32(2), Arc::new(Exp::Bits64(3, 32)));
        assert_eq!(classify_failure(&state, &div(0, 1, 2)), FailureKind::Unclassified);
    }
}
