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

//! One `ExecutionState` per program path: private memory, register
//! bindings, path constraints, a constraint environment for declared
//! symbols, and the threads created along the path. States fork
//! cheaply because expressions are reference counted and thread
//! records are arena indexed, so a fork copies indices rather than
//! deep object graphs. The listener never owns a state; the engine
//! passes one to each hook call.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use id_arena::{Arena, Id};
use serde::{Deserialize, Serialize};

use crate::error::ExecError;
use crate::expr::{Exp, ExpRef, Sym, Ty, TyCtx};
use crate::ir::Name;
use crate::memory::Memory;
use crate::source_loc::SourceLoc;

static PATH_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Identifies one execution path for the lifetime of a run. Forked
/// descendants get fresh identifiers, so collector records keyed by
/// path never collide across interleaved hook calls.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct PathId {
    id: u32,
}

impl PathId {
    pub fn fresh() -> Self {
        PathId { id: PATH_COUNTER.fetch_add(1, Ordering::SeqCst) }
    }

    pub fn as_u32(self) -> u32 {
        self.id
    }
}

impl std::fmt::Display for PathId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "path{}", self.id)
    }
}

/// One concurrently-runnable unit inside a state. Created exactly
/// once per create-thread event; teardown belongs to the engine.
#[derive(Clone, Debug)]
pub struct Thread {
    pub tid: usize,
    pub created_at: SourceLoc,
    /// Run-wide monotonic creation order, used to reconstruct
    /// interleavings for reporting.
    pub creation_order: usize,
}

pub type ThreadId = Id<Thread>;

pub type Bindings = HashMap<Name, ExpRef, ahash::RandomState>;

/// The constraint environment of a single state: the sort of every
/// declared symbol, plus the name bookkeeping that keeps two
/// logically distinct unknowns from aliasing in the solver.
#[derive(Clone, Default)]
pub struct SymbolEnv {
    decls: TyCtx,
    names: HashMap<String, u32, ahash::RandomState>,
    next: u32,
}

impl SymbolEnv {
    pub fn new() -> Self {
        Self::default()
    }

    fn fresh(&mut self) -> Sym {
        let n = self.next;
        self.next += 1;
        Sym::from_u32(n)
    }

    /// Declare a named symbol of the given sort. If the name is
    /// already taken in this state the registered name is suffixed
    /// with a per-name counter, and the collision is reported back so
    /// the caller can record it; silently aliasing two distinct
    /// unknowns would corrupt constraint solving.
    pub fn declare(&mut self, name: &str, ty: Ty) -> (Sym, String, bool) {
        let sym = self.fresh();
        self.decls.insert(sym, ty);
        match self.names.get_mut(name) {
            None => {
                self.names.insert(name.to_string(), 1);
                (sym, name.to_string(), false)
            }
            Some(count) => {
                let unique = format!("{}#{}", name, count);
                *count += 1;
                (sym, unique, true)
            }
        }
    }

    pub fn ty(&self, sym: Sym) -> Option<Ty> {
        self.decls.get(&sym).copied()
    }

    pub fn tcx(&self) -> &TyCtx {
        &self.decls
    }
}

#[derive(Clone)]
pub struct ExecutionState {
    path: PathId,
    parent: Option<PathId>,
    memory: Memory,
    regs: Bindings,
    constraints: Vec<ExpRef>,
    symbols: SymbolEnv,
    threads: Arena<Thread>,
    thread_index: HashMap<usize, ThreadId, ahash::RandomState>,
    pending_mem_error: Option<ExecError>,
}

impl ExecutionState {
    pub fn new() -> Self {
        ExecutionState {
            path: PathId::fresh(),
            parent: None,
            memory: Memory::new(),
            regs: HashMap::default(),
            constraints: Vec::new(),
            symbols: SymbolEnv::new(),
            threads: Arena::new(),
            thread_index: HashMap::default(),
            pending_mem_error: None,
        }
    }

    /// Fork this state at a scheduling or branch choice. The child is
    /// fully isolated from the parent: both share expression trees by
    /// reference, but writes to either state's memory, registers, or
    /// constraints are invisible to the other.
    pub fn fork(&self) -> Self {
        let mut child = self.clone();
        child.parent = Some(self.path);
        child.path = PathId::fresh();
        child
    }

    pub fn path(&self) -> PathId {
        self.path
    }

    pub fn parent(&self) -> Option<PathId> {
        self.parent
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    pub fn reg(&self, name: Name) -> Result<&ExpRef, ExecError> {
        self.regs.get(&name).ok_or(ExecError::UninitRegister(name))
    }

    pub fn set_reg(&mut self, name: Name, exp: ExpRef) {
        self.regs.insert(name, exp);
    }

    pub fn add_constraint(&mut self, exp: ExpRef) {
        self.constraints.push(exp)
    }

    pub fn constraints(&self) -> &[ExpRef] {
        &self.constraints
    }

    pub fn symbols(&self) -> &SymbolEnv {
        &self.symbols
    }

    /// Create a fresh symbol as an expression, sharing the leaf
    /// across every later use.
    pub fn fresh_symbol(&mut self, name: &str, ty: Ty) -> (ExpRef, String, bool) {
        let (sym, unique, collided) = self.symbols.declare(name, ty);
        (Arc::new(Exp::Var(sym)), unique, collided)
    }

    /// Register a thread created in this state. A duplicate identity
    /// is an engine/listener desynchronization and is surfaced as an
    /// error, never merged into the existing record.
    pub fn add_thread(&mut self, tid: usize, created_at: SourceLoc, creation_order: usize) -> Result<ThreadId, ExecError> {
        if self.thread_index.contains_key(&tid) {
            return Err(ExecError::DuplicateThread(tid));
        }
        let id = self.threads.alloc(Thread { tid, created_at, creation_order });
        self.thread_index.insert(tid, id);
        Ok(id)
    }

    pub fn thread(&self, id: ThreadId) -> Option<&Thread> {
        self.threads.get(id)
    }

    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    pub fn latch_memory_error(&mut self, err: ExecError) {
        // The first error is the interesting one; a later one on the
        // same doomed path must not overwrite it.
        if self.pending_mem_error.is_none() {
            self.pending_mem_error = Some(err)
        }
    }

    pub fn pending_memory_error(&self) -> Option<&ExecError> {
        self.pending_mem_error.as_ref()
    }

    pub fn take_memory_error(&mut self) -> Option<ExecError> {
        self.pending_mem_error.take()
    }
}

impl Default for ExecutionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_names_never_alias() {
        let mut state = ExecutionState::new();
        let (x0, name0, collided0) = state.fresh_symbol("x", Ty::BitVec(32));
        let (x1, name1, collided1) = state.fresh_symbol("x", Ty::BitVec(32));
        assert!(!collided0);
        assert!(collided1);
        assert_ne!(name0, name1);
        assert_ne!(x0, x1);
    }

    #[test]
    fn symbol_sorts_are_recorded() {
        let mut state = ExecutionState::new();
        let (x, _, _) = state.fresh_symbol("x", Ty::BitVec(32));
        assert_eq!(x.infer(state.symbols().tcx()), Some(Ty::BitVec(32)));
        let (f, _, _) = state.fresh_symbol("f", Ty::float_from_width(64).unwrap());
        assert_eq!(f.infer(state.symbols().tcx()), Some(Ty::Float(11, 53)));
    }

    #[test]
    fn duplicate_thread_identity_is_an_error() {
        let mut state = ExecutionState::new();
        let loc = SourceLoc::unknown();
        state.add_thread(1, loc, 0).unwrap();
        assert_eq!(state.add_thread(1, loc, 1), Err(ExecError::DuplicateThread(1)));
        assert_eq!(state.thread_count(), 1);
    }

    #[test]
    fn forked_states_have_isolated_memory() {
        let mut a = ExecutionState::new();
        a.memory_mut().add_region(0x1000..0x1100);
        a.memory_mut()
            .write_exp(0x1000, &Arc::new(Exp::Bits64(0xaa, 8)), 8, crate::memory::Endianness::Little)
            .unwrap();
        let b = a.fork();
        assert_ne!(a.path(), b.path());
        assert_eq!(b.parent(), Some(a.path()));
        a.memory_mut().store_zero(0x1000, 8).unwrap();
        let b_byte = b.memory().read_exp(0x1000, 8, crate::memory::Endianness::Little).unwrap();
        assert_eq!(*b_byte, Exp::Bits64(0xaa, 8));
    }

    #[test]
    fn fork_copies_thread_records_by_index() {
        let mut a = ExecutionState::new();
        let id = a.add_thread(7, SourceLoc::unknown(), 3).unwrap();
        let b = a.fork();
        assert_eq!(b.thread(id).map(|t| t.tid), Some(7));
        assert_eq!(b.thread(id).map(|t| t.creation_order), Some(3));
    }
}
