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

//! The instrumentation entry point. The engine drives a
//! [BitcodeListener] through six hooks as it executes a program, and
//! [SymbolicListener] implements those hooks to maintain the symbolic
//! shadow of each execution state and append what it observes to a
//! shared [RunData] collector.
//!
//! Every hook is total. Anything that goes wrong inside the listener
//! is downgraded to an anomaly record or a latched memory error; the
//! engine never sees a panic or an error from this module.

use std::sync::Arc;

use crate::config::ListenerConfig;
use crate::error::ExecError;
use crate::expr::{classify, fold, Category, ExpRef, Ty};
use crate::failure::classify_failure;
use crate::ir::{Instr, InstrKind, Name};
use crate::log;
use crate::memory::Address;
use crate::source_loc::SourceLoc;
use crate::state::ExecutionState;
use crate::stats::{AnomalyRecord, FailureRecord, RunData, RunId, SummaryRecord, ThreadRecord};

/// The engine's view of a newly created thread, passed to the
/// thread-created hook. `tid` is the engine's identity for the thread
/// and is opaque to us apart from equality.
#[derive(Copy, Clone, Debug)]
pub struct ThreadHandle {
    pub tid: usize,
    pub created_at: SourceLoc,
}

/// The hook surface the engine calls into. All hooks have empty
/// default bodies so a listener only implements the events it cares
/// about, and none of them can fail.
///
/// Per run the call sequence is: `run_start`, then for every executed
/// instruction `before_instruction` followed by `after_instruction`
/// (with `thread_created` and `execution_failed` interleaved as those
/// events arise), then `run_end`.
pub trait BitcodeListener {
    /// Called once before the first instruction of a run executes in
    /// the root state.
    fn run_start(&mut self, _state: &mut ExecutionState) {}

    /// Called before an instruction executes. The state still
    /// reflects the world prior to the instruction's effects.
    fn before_instruction(&mut self, _state: &mut ExecutionState, _instr: &Instr) {}

    /// Called after an instruction has executed, with its operand
    /// registers populated.
    fn after_instruction(&mut self, _state: &mut ExecutionState, _instr: &Instr) {}

    /// Called when the engine registers a new thread in `state`.
    fn thread_created(&mut self, _state: &mut ExecutionState, _thread: &ThreadHandle) {}

    /// Called when the engine terminates a path at `instr` with an
    /// error. The state is the failing path's final state.
    fn execution_failed(&mut self, _state: &mut ExecutionState, _instr: &Instr) {}

    /// Called once after the last path of a run has terminated.
    fn run_end(&mut self) {}
}

pub struct SymbolicListener {
    config: ListenerConfig,
    data: Arc<RunData>,
    run: Option<RunId>,
}

impl SymbolicListener {
    pub fn new(config: ListenerConfig, data: Arc<RunData>) -> Self {
        SymbolicListener { config, data, run: None }
    }

    pub fn data(&self) -> &Arc<RunData> {
        &self.data
    }

    fn run(&self) -> RunId {
        // Recording before run_start only happens if the engine is
        // misbehaving, but we still file those records under run 0
        // rather than dropping them.
        self.run.unwrap_or_else(|| RunId::from_u32(0))
    }

    /// Declare a fresh symbolic input of the given width. Integer
    /// symbols must be a positive multiple of 8 bits wide, and float
    /// symbols exactly 32 or 64 bits. A name collision is resolved by
    /// suffixing and recorded as an anomaly, never an error.
    pub fn make_symbolic(
        &self,
        state: &mut ExecutionState,
        name: &str,
        width: u32,
        float: bool,
        at: SourceLoc,
    ) -> Result<ExpRef, ExecError> {
        let ty = if float {
            Ty::float_from_width(width).ok_or(ExecError::Width(width))?
        } else if width == 0 || width % 8 != 0 {
            return Err(ExecError::Width(width));
        } else {
            Ty::BitVec(width)
        };
        let (exp, unique_name, collided) = state.fresh_symbol(name, ty);
        if collided {
            self.anomaly(state, at, format!("Symbol name {} already in use, renamed to {}", name, unique_name));
        }
        Ok(exp)
    }

    /// Read a `width`-bit expression from the symbolic shadow of
    /// memory, using the configured endianness.
    pub fn read_expr(&self, state: &ExecutionState, addr: Address, width: u32) -> Result<ExpRef, ExecError> {
        state.memory().read_exp(addr, width, self.config.endianness)
    }

    /// Overwrite `width` bits of shadow memory with concrete zeros.
    pub fn store_zero(&self, state: &mut ExecutionState, addr: Address, width: u32) -> Result<(), ExecError> {
        state.memory_mut().store_zero(addr, width)
    }

    fn anomaly(&self, state: &ExecutionState, at: SourceLoc, message: String) {
        log!(log::ANOMALY, &format!("{} at {}", message, at));
        self.data.add_anomaly(AnomalyRecord { run: self.run(), path: state.path(), at, message })
    }

    fn summarize(&self, state: &ExecutionState, at: SourceLoc, exp: &ExpRef) {
        let category = classify(exp);
        let detail = if category == Category::SymbolicComplex {
            let mut rendered = format!("{}", exp);
            if rendered.len() > self.config.max_detail {
                let mut cut = self.config.max_detail;
                while !rendered.is_char_boundary(cut) {
                    cut -= 1
                }
                rendered.truncate(cut)
            }
            Some(rendered)
        } else {
            None
        };
        self.data.add_summary(SummaryRecord { run: self.run(), path: state.path(), at, category, detail })
    }

    /// Reduce the address register `reg` to a concrete byte address.
    fn concrete_address(state: &ExecutionState, reg: Name) -> Result<Address, ExecError> {
        let exp = fold(state.reg(reg)?);
        match exp.as_bits64() {
            Some((addr, 64)) => Ok(addr),
            Some(_) => Err(ExecError::Type("Address register is not 64 bits wide")),
            None => Err(ExecError::SymbolicAddress),
        }
    }

    fn do_load(&self, state: &mut ExecutionState, dst: Name, addr: Name, width: u32, at: SourceLoc) -> Result<(), ExecError> {
        let addr = Self::concrete_address(state, addr)?;
        let exp = self.read_expr(state, addr, width)?;
        self.summarize(state, at, &exp);
        state.set_reg(dst, exp);
        Ok(())
    }

    fn do_store(&self, state: &mut ExecutionState, value: Name, addr: Name, width: u32, at: SourceLoc) -> Result<(), ExecError> {
        let addr = Self::concrete_address(state, addr)?;
        let exp = fold(state.reg(value)?);
        // A value whose sort disagrees with the access width would
        // put ill-sorted extracts into shadow memory.
        match exp.infer(state.symbols().tcx()) {
            Some(ty) if ty != Ty::Bool && ty.width() == width => (),
            _ => return Err(ExecError::Type("store value sort does not match the access width")),
        }
        self.summarize(state, at, &exp);
        state.memory_mut().write_exp(addr, &exp, width, self.config.endianness)
    }

    fn do_alloc(&self, state: &mut ExecutionState, addr: Name, width: u32) -> Result<(), ExecError> {
        if width == 0 || width % 8 != 0 {
            return Err(ExecError::Width(width));
        }
        let base = Self::concrete_address(state, addr)?;
        let top = match base.checked_add((width / 8) as u64) {
            Some(top) => top,
            None => return Err(ExecError::Type("allocation wraps past the end of the address space")),
        };
        state.memory_mut().add_region(base..top);
        self.store_zero(state, base, width)
    }

    fn do_free(&self, state: &mut ExecutionState, addr: Name, width: u32) -> Result<(), ExecError> {
        if width == 0 || width % 8 != 0 {
            return Err(ExecError::Width(width));
        }
        let base = Self::concrete_address(state, addr)?;
        if !state.memory().is_mapped(base, (width / 8) as u64) {
            return Err(ExecError::Unmapped);
        }
        // Unmapping drops the freed byte contents, so remapping these
        // addresses later reads zeros, never the freed values.
        state.memory_mut().remove_region(base);
        Ok(())
    }

    fn do_make_symbolic(
        &self,
        state: &mut ExecutionState,
        dst: Name,
        name: &str,
        width: u32,
        float: bool,
        at: SourceLoc,
    ) -> Result<(), ExecError> {
        let exp = self.make_symbolic(state, name, width, float, at)?;
        state.set_reg(dst, exp);
        Ok(())
    }

    fn do_assume(&self, state: &mut ExecutionState, cond: Name) -> Result<(), ExecError> {
        let cond = fold(state.reg(cond)?);
        state.add_constraint(cond);
        Ok(())
    }
}

impl BitcodeListener for SymbolicListener {
    fn run_start(&mut self, state: &mut ExecutionState) {
        let run = RunId::fresh();
        self.run = Some(run);
        log!(log::VERBOSE, &format!("Starting run {} on {}", run.as_u32(), state.path()))
    }

    fn before_instruction(&mut self, state: &mut ExecutionState, instr: &Instr) {
        // Observation only. The state must not change before the
        // engine has executed the instruction.
        self.data.count_instruction();
        if instr.is_memory() {
            log!(log::MEMORY, &format!("{} at {} on path {}", instr.mnemonic(), instr.loc(), state.path()))
        } else {
            log!(log::VERBOSE, &format!("{} at {}", instr.mnemonic(), instr.loc()))
        }
    }

    fn after_instruction(&mut self, state: &mut ExecutionState, instr: &Instr) {
        let at = instr.loc();
        let result = match instr.kind() {
            InstrKind::Load { dst, addr, width } => self.do_load(state, *dst, *addr, *width, at),
            InstrKind::Store { value, addr, width } => self.do_store(state, *value, *addr, *width, at),
            InstrKind::Alloc { addr, width } => self.do_alloc(state, *addr, *width),
            InstrKind::Free { addr, width } => self.do_free(state, *addr, *width),
            InstrKind::MakeSymbolic { dst, name, width, float } => {
                self.do_make_symbolic(state, *dst, name, *width, *float, at)
            }
            InstrKind::Assume { cond } => self.do_assume(state, *cond),
            _ => Ok(()),
        };
        if let Err(err) = result {
            match err {
                // Address errors on memory instructions are candidate
                // program failures and stay latched until the engine
                // decides the path's fate. Everything else is an
                // internal inconsistency, recorded and moved past.
                ExecError::Unmapped | ExecError::SymbolicAddress if instr.is_memory() => {
                    log!(log::MEMORY, &format!("{} failed at {}: {}", instr.mnemonic(), at, err));
                    state.latch_memory_error(err)
                }
                _ => self.anomaly(state, at, format!("{} failed: {}", instr.mnemonic(), err)),
            }
        }
    }

    fn thread_created(&mut self, state: &mut ExecutionState, thread: &ThreadHandle) {
        let creation_order = self.data.next_creation_order();
        match state.add_thread(thread.tid, thread.created_at, creation_order) {
            Ok(_) => {
                log!(log::THREAD, &format!("Thread {} created at {}", thread.tid, thread.created_at));
                self.data.add_thread(ThreadRecord {
                    run: self.run(),
                    path: state.path(),
                    tid: thread.tid,
                    created_at: thread.created_at,
                    creation_order,
                })
            }
            Err(err) => self.anomaly(state, thread.created_at, format!("{}", err)),
        }
    }

    fn execution_failed(&mut self, state: &mut ExecutionState, instr: &Instr) {
        let kind = classify_failure(state, instr);
        state.take_memory_error();
        log!(log::FAILURE, &format!("Path {} failed at {}: {}", state.path(), instr.loc(), kind));
        if self.config.reports(kind) {
            self.data.add_failure(FailureRecord { run: self.run(), path: state.path(), kind, at: instr.loc() })
        }
    }

    fn run_end(&mut self) {
        self.data.seal();
        log!(
            log::VERBOSE,
            &format!(
                "Run {} finished: {} instructions, {} threads, {} failures, {} anomalies",
                self.run().as_u32(),
                self.data.instruction_count(),
                self.data.thread_count(),
                self.data.failure_count(),
                self.data.anomaly_count()
            )
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::expr::Exp;
    use crate::failure::FailureKind;

    fn listener() -> SymbolicListener {
        SymbolicListener::new(ListenerConfig::default(), Arc::new(RunData::new()))
    }

    fn set_addr(state: &mut ExecutionState, reg: u32, addr: u64) {
        state.set_reg(Name::from_u32(reg), Arc::new(Exp::Bits64(addr, 64)))
    }

    fn alloc(addr: u32, width: u32) -> Instr {
        Instr::new(InstrKind::Alloc { addr: Name::from_u32(addr), width }, SourceLoc::unknown())
    }

    fn load(dst: u32, addr: u32, width: u32) -> Instr {
        Instr::new(InstrKind::Load { dst: Name::from_u32(dst), addr: Name::from_u32(addr), width }, SourceLoc::unknown())
    }

    fn store(value: u32, addr: u32, width: u32) -> Instr {
        Instr::new(
            InstrKind::Store { value: Name::from_u32(value), addr: Name::from_u32(addr), width },
            SourceLoc::unknown(),
        )
    }

    fn free(addr: u32, width: u32) -> Instr {
        Instr::new(InstrKind::Free { addr: Name::from_u32(addr), width }, SourceLoc::unknown())
    }

    #[test]
    fn symbol_width_is_respected() {
        let mut listener = listener();
        let mut state = ExecutionState::new();
        listener.run_start(&mut state);

        let exp = listener.make_symbolic(&mut state, "input", 32, false, SourceLoc::unknown()).unwrap();
        assert_eq!(exp.infer(state.symbols().tcx()), Some(Ty::BitVec(32)));

        let f = listener.make_symbolic(&mut state, "f", 64, true, SourceLoc::unknown()).unwrap();
        assert_eq!(f.infer(state.symbols().tcx()), Some(Ty::Float(11, 53)));

        assert_eq!(listener.make_symbolic(&mut state, "bad", 12, false, SourceLoc::unknown()), Err(ExecError::Width(12)));
        assert_eq!(listener.make_symbolic(&mut state, "bad", 16, true, SourceLoc::unknown()), Err(ExecError::Width(16)));
    }

    #[test]
    fn colliding_symbol_names_are_renamed_and_flagged() {
        let mut listener = listener();
        let mut state = ExecutionState::new();
        listener.run_start(&mut state);

        let a = listener.make_symbolic(&mut state, "x", 8, false, SourceLoc::unknown()).unwrap();
        let b = listener.make_symbolic(&mut state, "x", 8, false, SourceLoc::unknown()).unwrap();
        assert_ne!(a, b);
        assert_eq!(listener.data().anomaly_count(), 1);
    }

    #[test]
    fn load_returns_what_store_wrote() {
        let mut listener = listener();
        let mut state = ExecutionState::new();
        listener.run_start(&mut state);

        set_addr(&mut state, 0, 0x1000);
        state.set_reg(Name::from_u32(1), Arc::new(Exp::Bits64(0xDEAD_BEEF, 32)));

        listener.after_instruction(&mut state, &alloc(0, 64));
        listener.after_instruction(&mut state, &store(1, 0, 32));
        listener.after_instruction(&mut state, &load(2, 0, 32));

        assert!(state.pending_memory_error().is_none());
        let loaded = fold(state.reg(Name::from_u32(2)).unwrap());
        assert_eq!(loaded.as_bits64(), Some((0xDEAD_BEEF, 32)));
    }

    #[test]
    fn width_mismatched_store_is_an_anomaly_not_a_write() {
        let mut listener = listener();
        let mut state = ExecutionState::new();
        listener.run_start(&mut state);

        set_addr(&mut state, 0, 0x6000);
        state.set_reg(Name::from_u32(1), Arc::new(Exp::Bits64(0xDEAD_BEEF, 32)));
        listener.after_instruction(&mut state, &alloc(0, 64));
        listener.after_instruction(&mut state, &store(1, 0, 64));

        assert!(state.pending_memory_error().is_none());
        assert_eq!(listener.data().anomaly_count(), 1);
        // The allocation's zeros are untouched by the rejected store.
        let exp = listener.read_expr(&state, 0x6000, 64).unwrap();
        assert_eq!(exp.as_bits64(), Some((0, 64)));
    }

    #[test]
    fn alloc_that_wraps_the_address_space_is_an_anomaly() {
        let mut listener = listener();
        let mut state = ExecutionState::new();
        listener.run_start(&mut state);

        set_addr(&mut state, 0, u64::MAX - 4);
        listener.after_instruction(&mut state, &alloc(0, 64));

        assert!(state.pending_memory_error().is_none());
        assert_eq!(listener.data().anomaly_count(), 1);
        assert!(listener.read_expr(&state, u64::MAX - 4, 8).is_err());
    }

    #[test]
    fn assume_appends_the_folded_condition() {
        let mut listener = listener();
        let mut state = ExecutionState::new();
        listener.run_start(&mut state);

        let (flag, _, _) = state.fresh_symbol("flag", Ty::BitVec(8));
        let cond = Arc::new(Exp::Eq(flag, Arc::new(Exp::Bits64(1, 8))));
        state.set_reg(Name::from_u32(0), cond.clone());
        let instr = Instr::new(InstrKind::Assume { cond: Name::from_u32(0) }, SourceLoc::unknown());
        listener.after_instruction(&mut state, &instr);

        assert_eq!(state.constraints(), &[cond]);
        assert_eq!(listener.data().anomaly_count(), 0);
    }

    #[test]
    fn free_unmaps_and_drops_the_freed_contents() {
        let mut listener = listener();
        let mut state = ExecutionState::new();
        listener.run_start(&mut state);

        set_addr(&mut state, 0, 0x5000);
        state.set_reg(Name::from_u32(1), Arc::new(Exp::Bits64(0xAB, 8)));
        listener.after_instruction(&mut state, &alloc(0, 8));
        listener.after_instruction(&mut state, &store(1, 0, 8));
        listener.after_instruction(&mut state, &free(0, 8));
        assert!(state.pending_memory_error().is_none());

        // The region is gone, so a dangling load latches.
        listener.after_instruction(&mut state, &load(2, 0, 8));
        assert_eq!(state.take_memory_error(), Some(ExecError::Unmapped));

        // Remapping the addresses reads zeros, never the freed value.
        state.memory_mut().add_region(0x5000..0x5001);
        let exp = listener.read_expr(&state, 0x5000, 8).unwrap();
        assert_eq!(exp.as_bits64(), Some((0, 8)));
    }

    #[test]
    fn freeing_an_unmapped_base_latches_a_memory_error() {
        let mut listener = listener();
        let mut state = ExecutionState::new();
        listener.run_start(&mut state);

        set_addr(&mut state, 0, 0x7000);
        listener.after_instruction(&mut state, &free(0, 8));
        assert_eq!(state.take_memory_error(), Some(ExecError::Unmapped));
    }

    #[test]
    fn unmapped_load_latches_a_memory_error() {
        let mut listener = listener();
        let mut state = ExecutionState::new();
        listener.run_start(&mut state);

        set_addr(&mut state, 0, 0x4000);
        let instr = load(1, 0, 8);
        listener.after_instruction(&mut state, &instr);
        assert_eq!(state.pending_memory_error(), Some(&ExecError::Unmapped));

        listener.execution_failed(&mut state, &instr);
        assert!(state.pending_memory_error().is_none());
        let failures = listener.data().take_failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].kind, FailureKind::InvalidMemoryAccess);
    }

    #[test]
    fn duplicate_thread_creation_is_an_anomaly_not_a_record() {
        let mut listener = listener();
        let mut state = ExecutionState::new();
        listener.run_start(&mut state);

        let handle = ThreadHandle { tid: 7, created_at: SourceLoc::unknown() };
        listener.thread_created(&mut state, &handle);
        listener.thread_created(&mut state, &handle);

        let threads = listener.data().take_threads();
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].tid, 7);
        assert_eq!(listener.data().anomaly_count(), 1);
    }

    #[test]
    fn thread_creation_order_is_monotonic_across_paths() {
        let mut listener = listener();
        let mut parent = ExecutionState::new();
        listener.run_start(&mut parent);

        listener.thread_created(&mut parent, &ThreadHandle { tid: 1, created_at: SourceLoc::unknown() });
        let mut child = parent.fork();
        listener.thread_created(&mut child, &ThreadHandle { tid: 2, created_at: SourceLoc::unknown() });
        listener.thread_created(&mut parent, &ThreadHandle { tid: 3, created_at: SourceLoc::unknown() });

        let threads = listener.data().take_threads();
        let orders: Vec<usize> = threads.iter().map(|t| t.creation_order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
    }

    #[test]
    fn store_zero_in_a_fork_leaves_the_parent_untouched() {
        let mut listener = listener();
        let mut parent = ExecutionState::new();
        listener.run_start(&mut parent);

        set_addr(&mut parent, 0, 0x2000);
        parent.set_reg(Name::from_u32(1), Arc::new(Exp::Bits64(0xFF, 8)));
        listener.after_instruction(&mut parent, &alloc(0, 8));
        listener.after_instruction(&mut parent, &store(1, 0, 8));

        let mut child = parent.fork();
        listener.store_zero(&mut child, 0x2000, 8).unwrap();

        let in_child = fold(&listener.read_expr(&child, 0x2000, 8).unwrap());
        let in_parent = fold(&listener.read_expr(&parent, 0x2000, 8).unwrap());
        assert_eq!(in_child.as_bits64(), Some((0x00, 8)));
        assert_eq!(in_parent.as_bits64(), Some((0xFF, 8)));
    }

    #[test]
    fn unreported_failure_kinds_are_still_classified_but_dropped() {
        let config = ListenerConfig { report: vec![FailureKind::Assertion], ..ListenerConfig::default() };
        let mut listener = SymbolicListener::new(config, Arc::new(RunData::new()));
        let mut state = ExecutionState::new();
        listener.run_start(&mut state);

        set_addr(&mut state, 0, 0x4000);
        listener.after_instruction(&mut state, &load(1, 0, 8));
        listener.execution_failed(&mut state, &load(1, 0, 8));
        assert!(listener.data().take_failures().is_empty());
    }

    #[test]
    fn hooks_fire_in_run_order() {
        let mut listener = listener();
        let mut state = ExecutionState::new();

        listener.run_start(&mut state);
        set_addr(&mut state, 0, 0x3000);
        for instr in [alloc(0, 32), load(1, 0, 32)] {
            listener.before_instruction(&mut state, &instr);
            listener.after_instruction(&mut state, &instr);
        }
        listener.run_end();

        assert_eq!(listener.data().instruction_count(), 2);
        assert!(listener.data().is_sealed());
        let summaries = listener.data().take_summaries();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].category, Category::Concrete);
    }
}
