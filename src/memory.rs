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

//! Per-state symbolic memory. Memory is byte granular: each mapped
//! byte holds an 8-bit expression, and wider reads concatenate the
//! byte expressions in the configured endianness. The mapped address
//! space is a set of half-open regions [base, top); accessing an
//! address outside every region is an explicit `Unmapped` error
//! rather than a crash, because the engine decides whether that
//! constitutes a program failure. A `Memory` belongs to exactly one
//! execution state; forking a state clones it, after which the two
//! copies share byte expressions but never writes.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ExecError;
use crate::expr::{fold, Exp, ExpRef};

/// For now, we assume the interpreted bitcode targets a 64-bit
/// address space.
pub type Address = u64;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Endianness {
    Little,
    Big,
}

#[derive(Clone)]
pub struct Memory {
    regions: Vec<Range<Address>>,
    bytes: HashMap<Address, ExpRef, ahash::RandomState>,
}

fn byte_length(width: u32) -> Result<u64, ExecError> {
    if width == 0 || width % 8 != 0 {
        Err(ExecError::Width(width))
    } else {
        Ok(u64::from(width / 8))
    }
}

impl Memory {
    pub fn new() -> Self {
        Memory { regions: Vec::new(), bytes: HashMap::default() }
    }

    /// Map [base, top) so the bytes within become accessible. Freshly
    /// mapped bytes read as constant zero until written.
    pub fn add_region(&mut self, region: Range<Address>) {
        self.regions.push(region)
    }

    /// Unmap the region based at `base`, dropping the byte contents
    /// it covered.
    pub fn remove_region(&mut self, base: Address) {
        if let Some(i) = self.regions.iter().position(|r| r.start == base) {
            let region = self.regions.remove(i);
            for addr in region {
                self.bytes.remove(&addr);
            }
        }
    }

    pub fn is_mapped(&self, addr: Address, bytes: u64) -> bool {
        // An access must fall entirely within a single region. The
        // checked add keeps accesses near the top of the address
        // space from wrapping around to low addresses.
        self.regions
            .iter()
            .any(|r| r.contains(&addr) && addr.checked_add(bytes).map_or(false, |top| top <= r.end))
    }

    fn read_byte(&self, addr: Address) -> Result<ExpRef, ExecError> {
        if !self.is_mapped(addr, 1) {
            return Err(ExecError::Unmapped);
        }
        match self.bytes.get(&addr) {
            Some(exp) => Ok(exp.clone()),
            None => Ok(Arc::new(Exp::zeros(8))),
        }
    }

    fn write_byte(&mut self, addr: Address, exp: ExpRef) -> Result<(), ExecError> {
        if !self.is_mapped(addr, 1) {
            return Err(ExecError::Unmapped);
        }
        self.bytes.insert(addr, exp);
        Ok(())
    }

    /// Read `width` bits starting at the byte address `addr`,
    /// concatenating the byte expressions in the given endianness and
    /// folding away fully concrete results. Little endian places the
    /// byte at the highest address in the most significant position.
    pub fn read_exp(&self, addr: Address, width: u32, endianness: Endianness) -> Result<ExpRef, ExecError> {
        let len = byte_length(width)?;
        if !self.is_mapped(addr, len) {
            return Err(ExecError::Unmapped);
        }
        let mut exp: Option<ExpRef> = None;
        for i in 0..len {
            let byte = self.read_byte(addr + i)?;
            exp = Some(match exp {
                None => byte,
                Some(acc) => match endianness {
                    Little => Arc::new(Exp::Concat(byte, acc)),
                    Big => Arc::new(Exp::Concat(acc, byte)),
                },
            });
        }
        // len is always at least 1 here
        Ok(fold(&exp.unwrap()))
    }

    /// Write a `width`-bit expression at `addr`, splitting it into
    /// byte expressions. Concrete values split into concrete bytes;
    /// symbolic values split into extracts of the stored expression.
    pub fn write_exp(&mut self, addr: Address, exp: &ExpRef, width: u32, endianness: Endianness) -> Result<(), ExecError> {
        let len = byte_length(width)?;
        if !self.is_mapped(addr, len) {
            return Err(ExecError::Unmapped);
        }
        for i in 0..len {
            let lo = match endianness {
                Little => (i as u32) * 8,
                Big => ((len - 1 - i) as u32) * 8,
            };
            let byte = fold(&Arc::new(Exp::Extract(lo + 7, lo, exp.clone())));
            self.write_byte(addr + i, byte)?;
        }
        Ok(())
    }

    /// Write a constant zero of `width` bits at `addr`. Used to
    /// initialize freshly allocated or freed memory deterministically
    /// so residual symbolic garbage never leaks into a program's
    /// observable state.
    pub fn store_zero(&mut self, addr: Address, width: u32) -> Result<(), ExecError> {
        let len = byte_length(width)?;
        if !self.is_mapped(addr, len) {
            return Err(ExecError::Unmapped);
        }
        for i in 0..len {
            self.write_byte(addr + i, Arc::new(Exp::zeros(8)))?;
        }
        Ok(())
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

use Endianness::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Sym;

    fn mapped() -> Memory {
        let mut mem = Memory::new();
        mem.add_region(0x1000..0x2000);
        mem
    }

    #[test]
    fn store_zero_then_read_round_trips() {
        let mut mem = mapped();
        for width in [8, 16, 32, 64, 128] {
            mem.store_zero(0x1000, width).unwrap();
            let exp = mem.read_exp(0x1000, width, Little).unwrap();
            assert!(exp.is_zero(), "width {} did not read back zero", width);
            let tcx = crate::expr::TyCtx::default();
            assert_eq!(exp.infer(&tcx), Some(crate::expr::Ty::BitVec(width)));
        }
    }

    #[test]
    fn unwritten_mapped_bytes_read_as_zero() {
        let mem = mapped();
        assert!(mem.read_exp(0x1800, 32, Little).unwrap().is_zero());
    }

    #[test]
    fn little_endian_byte_order() {
        let mut mem = mapped();
        mem.write_exp(0x1000, &Arc::new(Exp::Bits64(0x1122, 16)), 16, Little).unwrap();
        assert_eq!(*mem.read_exp(0x1000, 8, Little).unwrap(), Exp::Bits64(0x22, 8));
        assert_eq!(*mem.read_exp(0x1001, 8, Little).unwrap(), Exp::Bits64(0x11, 8));
        assert_eq!(*mem.read_exp(0x1000, 16, Little).unwrap(), Exp::Bits64(0x1122, 16));
    }

    #[test]
    fn big_endian_byte_order() {
        let mut mem = mapped();
        mem.write_exp(0x1000, &Arc::new(Exp::Bits64(0x1122, 16)), 16, Big).unwrap();
        assert_eq!(*mem.read_exp(0x1000, 8, Big).unwrap(), Exp::Bits64(0x11, 8));
        assert_eq!(*mem.read_exp(0x1000, 16, Big).unwrap(), Exp::Bits64(0x1122, 16));
    }

    #[test]
    fn symbolic_bytes_concatenate() {
        let mut mem = mapped();
        let sym = Arc::new(Exp::Var(Sym::from_u32(0)));
        mem.write_exp(0x1000, &sym, 16, Little).unwrap();
        let exp = mem.read_exp(0x1000, 16, Little).unwrap();
        let mut vars = std::collections::HashSet::default();
        exp.collect_symbolic_variables(&mut vars);
        assert_eq!(vars.len(), 1);
    }

    #[test]
    fn unmapped_reads_are_errors_not_crashes() {
        let mem = mapped();
        assert_eq!(mem.read_exp(0x3000, 8, Little), Err(ExecError::Unmapped));
        // Access straddling the end of a region.
        assert_eq!(mem.read_exp(0x1ffc, 64, Little), Err(ExecError::Unmapped));
        assert_eq!(mapped().store_zero(0x3000, 8), Err(ExecError::Unmapped));
    }

    #[test]
    fn accesses_at_the_top_of_the_address_space_do_not_wrap() {
        let mut mem = Memory::new();
        mem.add_region(u64::MAX - 8..u64::MAX);
        mem.store_zero(u64::MAX - 8, 64).unwrap();
        assert!(mem.read_exp(u64::MAX - 8, 64, Little).unwrap().is_zero());
        // An access whose top would wrap past the end of the address
        // space is unmapped, not a crash.
        assert_eq!(mem.read_exp(u64::MAX - 1, 64, Little), Err(ExecError::Unmapped));
        assert_eq!(mem.store_zero(u64::MAX - 1, 16), Err(ExecError::Unmapped));
        assert_eq!(
            mem.write_exp(u64::MAX - 1, &Arc::new(Exp::Bits64(0, 16)), 16, Little),
            Err(ExecError::Unmapped)
        );
    }

    #[test]
    fn non_byte_aligned_widths_rejected() {
        let mut mem = mapped();
        assert_eq!(mem.store_zero(0x1000, 12), Err(ExecError::Width(12)));
        assert_eq!(mem.read_exp(0x1000, 0, Little), Err(ExecError::Width(0)));
    }

    #[test]
    fn cloned_memory_is_isolated() {
        let mut a = mapped();
        a.write_exp(0x1000, &Arc::new(Exp::Bits64(0x7f, 8)), 8, Little).unwrap();
        let b = a.clone();
        a.store_zero(0x1000, 8).unwrap();
        assert!(a.read_exp(0x1000, 8, Little).unwrap().is_zero());
        assert_eq!(*b.read_exp(0x1000, 8, Little).unwrap(), Exp::Bits64(0x7f, 8));
    }
}
