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

//! Cayo is an instrumentation layer for a symbolic execution engine
//! running multi-threaded bitcode programs. The engine drives the
//! [listener::BitcodeListener] hooks as it executes; the
//! [listener::SymbolicListener] implementation maintains a symbolic
//! shadow of each execution state (registers, byte-granular memory,
//! path constraints, thread records) and appends classified failures,
//! expression summaries, and thread lifecycle events to a lock-free
//! [stats::RunData] collector shared between worker threads.
//!
//! Expressions are immutable reference-counted trees in SMT bitvector
//! terms, see [expr]. Deciding satisfiability is the job of an
//! external solver; this crate only builds, folds, and classifies the
//! terms the solver would be asked about.

pub mod config;
pub mod error;
pub mod expr;
pub mod failure;
pub mod ir;
pub mod listener;
pub mod log;
pub mod memory;
pub mod source_loc;
pub mod state;
pub mod stats;
