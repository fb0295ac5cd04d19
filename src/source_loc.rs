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

use serde::{Deserialize, Serialize};

/// A compact source location attached to each decoded instruction by
/// the bitcode frontend. The file component is an index into the
/// engine's file table; -1 means the location is unknown.
#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SourceLoc {
    file: i16,
    line: u32,
    char1: u16,
    char2: u16,
}

impl SourceLoc {
    pub fn unknown() -> Self {
        SourceLoc { file: -1, line: 0, char1: 0, char2: 0 }
    }

    pub fn is_unknown(self) -> bool {
        self.file == -1
    }

    pub fn new(file: i16, line: u32, char1: u16, char2: u16) -> Self {
        if file < 0 {
            SourceLoc::unknown()
        } else {
            SourceLoc { file, line, char1, char2 }
        }
    }

    pub fn file(self) -> Option<u16> {
        if self.file >= 0 {
            Some(self.file as u16)
        } else {
            None
        }
    }

    pub fn line(self) -> u32 {
        self.line
    }
}

impl fmt::Display for SourceLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unknown() {
            write!(f, "unknown location")
        } else {
            write!(f, "file {} {}:{}-{}", self.file, self.line, self.char1, self.char2)
        }
    }
}
