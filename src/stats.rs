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

//! The run-wide data collector. The engine advances many states in an
//! arbitrary interleaving, so every record is keyed by the owning
//! path (and thread identity where relevant) and the collector only
//! ever appends: a record appended for one path can never be
//! destructively updated by activity on another. Appends go through
//! lock-free queues so no hook call can observe a torn record.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};

use crossbeam::queue::SegQueue;
use serde::{Deserialize, Serialize};

use crate::expr::Category;
use crate::failure::FailureKind;
use crate::source_loc::SourceLoc;
use crate::state::PathId;

static RUN_COUNTER: AtomicU32 = AtomicU32::new(0);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId {
    id: u32,
}

impl RunId {
    pub fn fresh() -> Self {
        RunId { id: RUN_COUNTER.fetch_add(1, Ordering::SeqCst) }
    }

    pub fn from_u32(id: u32) -> Self {
        RunId { id }
    }

    pub fn as_u32(self) -> u32 {
        self.id
    }
}

/// One thread registration, recorded when the engine announces a
/// create-thread event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadRecord {
    pub run: RunId,
    pub path: PathId,
    pub tid: usize,
    pub created_at: SourceLoc,
    pub creation_order: usize,
}

/// One classified execution failure. Never mutated after it is
/// appended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub run: RunId,
    pub path: PathId,
    pub kind: FailureKind,
    pub at: SourceLoc,
}

/// A listener-internal inconsistency: width mismatch, duplicate
/// thread registration, symbol name collision. Diagnostics only;
/// execution continues.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    pub run: RunId,
    pub path: PathId,
    pub at: SourceLoc,
    pub message: String,
}

/// A compact record of an expression the instrumentation observed.
/// Complex expressions carry their full rendering; simple and
/// concrete ones only the category, which keeps the collector's
/// output bounded regardless of path explosion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub run: RunId,
    pub path: PathId,
    pub at: SourceLoc,
    pub category: Category,
    pub detail: Option<String>,
}

pub struct RunData {
    threads: SegQueue<ThreadRecord>,
    failures: SegQueue<FailureRecord>,
    anomalies: SegQueue<AnomalyRecord>,
    summaries: SegQueue<SummaryRecord>,
    creation_order: AtomicUsize,
    instructions: AtomicU64,
    thread_count: AtomicUsize,
    failure_count: AtomicUsize,
    anomaly_count: AtomicUsize,
    sealed: AtomicBool,
}

impl RunData {
    pub fn new() -> Self {
        RunData {
            threads: SegQueue::new(),
            failures: SegQueue::new(),
            anomalies: SegQueue::new(),
            summaries: SegQueue::new(),
            creation_order: AtomicUsize::new(0),
            instructions: AtomicU64::new(0),
            thread_count: AtomicUsize::new(0),
            failure_count: AtomicUsize::new(0),
            anomaly_count: AtomicUsize::new(0),
            sealed: AtomicBool::new(false),
        }
    }

    /// The next run-wide thread creation order index.
    pub fn next_creation_order(&self) -> usize {
        self.creation_order.fetch_add(1, Ordering::SeqCst)
    }

    pub fn count_instruction(&self) {
        self.instructions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn instruction_count(&self) -> u64 {
        self.instructions.load(Ordering::Relaxed)
    }

    pub fn add_thread(&self, record: ThreadRecord) {
        self.thread_count.fetch_add(1, Ordering::Relaxed);
        self.threads.push(record)
    }

    pub fn add_failure(&self, record: FailureRecord) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
        self.failures.push(record)
    }

    pub fn add_anomaly(&self, record: AnomalyRecord) {
        self.anomaly_count.fetch_add(1, Ordering::Relaxed);
        self.anomalies.push(record)
    }

    pub fn add_summary(&self, record: SummaryRecord) {
        self.summaries.push(record)
    }

    pub fn thread_count(&self) -> usize {
        self.thread_count.load(Ordering::Relaxed)
    }

    pub fn failure_count(&self) -> usize {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn anomaly_count(&self) -> usize {
        self.anomaly_count.load(Ordering::Relaxed)
    }

    /// Mark the run finished. Sealing is advisory: late appends from
    /// a straggling path are kept rather than lost.
    pub fn seal(&self) {
        self.sealed.store(true, Ordering::SeqCst)
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::SeqCst)
    }

    /// Drain the collected records, in append order, for reporting.
    pub fn take_threads(&self) -> Vec<ThreadRecord> {
        let mut records = Vec::new();
        while let Some(r) = self.threads.pop() {
            records.push(r)
        }
        records
    }

    pub fn take_failures(&self) -> Vec<FailureRecord> {
        let mut records = Vec::new();
        while let Some(r) = self.failures.pop() {
            records.push(r)
        }
        records
    }

    pub fn take_anomalies(&self) -> Vec<AnomalyRecord> {
        let mut records = Vec::new();
        while let Some(r) = self.anomalies.pop() {
            records.push(r)
        }
        records
    }

    pub fn take_summaries(&self) -> Vec<SummaryRecord> {
        let mut records = Vec::new();
        while let Some(r) = self.summaries.pop() {
            records.push(r)
        }
        records
    }
}

impl Default for RunData {
    fn default() -> Self {
        Self::new()
    }
}
