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

//! This module defines the symbolic expression representation shared
//! between execution states. Expressions are immutable trees with
//! reference-counted children, so a forked state shares every
//! sub-expression with its parent for free; no operation here mutates
//! an expression in place, every transformation builds a new one. The
//! subset of operators corresponds to the quantifier-free bitvector
//! theory the engine's solver consumes, plus a floating-point sort
//! tag for symbols created from floating-point program values.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A `Sym` is a unique identifier for a symbolic leaf value declared
/// in one execution state's constraint environment.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct Sym {
    id: u32,
}

impl Sym {
    pub fn from_u32(id: u32) -> Self {
        Sym { id }
    }

    pub fn as_u32(self) -> u32 {
        self.id
    }
}

impl fmt::Display for Sym {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.id)
    }
}

/// The sort of a symbol or expression. Floating-point sorts carry
/// exponent and significand widths in the IEEE 754-2008 interchange
/// format, so `Float(8, 24)` is a 32-bit float and `Float(11, 53)` a
/// 64-bit double.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ty {
    Bool,
    BitVec(u32),
    Float(u32, u32),
}

impl Ty {
    /// The declared width of the sort in bits.
    pub fn width(self) -> u32 {
        match self {
            Ty::Bool => 1,
            Ty::BitVec(sz) => sz,
            Ty::Float(ebits, sbits) => ebits + sbits,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, Ty::Float(_, _))
    }

    /// The floating-point sort for a supported interchange width.
    pub fn float_from_width(width: u32) -> Option<Self> {
        match width {
            32 => Some(Ty::Float(8, 24)),
            64 => Some(Ty::Float(11, 53)),
            _ => None,
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Bool => write!(f, "Bool"),
            Ty::BitVec(sz) => write!(f, "(_ BitVec {})", sz),
            Ty::Float(ebits, sbits) => write!(f, "(_ FloatingPoint {} {})", ebits, sbits),
        }
    }
}

/// Declaration context mapping each symbol to its sort, used to infer
/// the type of expressions containing symbolic leaves.
pub type TyCtx = HashMap<Sym, Ty, ahash::RandomState>;

pub type ExpRef = Arc<Exp>;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Exp {
    Var(Sym),
    Bits64(u64, u32),
    Bits(Vec<bool>),
    Bool(bool),
    Not(ExpRef),
    Eq(ExpRef, ExpRef),
    Neq(ExpRef, ExpRef),
    And(ExpRef, ExpRef),
    Or(ExpRef, ExpRef),
    Bvnot(ExpRef),
    Bvneg(ExpRef),
    Bvand(ExpRef, ExpRef),
    Bvor(ExpRef, ExpRef),
    Bvxor(ExpRef, ExpRef),
    Bvadd(ExpRef, ExpRef),
    Bvsub(ExpRef, ExpRef),
    Bvmul(ExpRef, ExpRef),
    Bvudiv(ExpRef, ExpRef),
    Bvsdiv(ExpRef, ExpRef),
    Bvurem(ExpRef, ExpRef),
    Bvsrem(ExpRef, ExpRef),
    Bvult(ExpRef, ExpRef),
    Bvslt(ExpRef, ExpRef),
    Bvshl(ExpRef, ExpRef),
    Bvlshr(ExpRef, ExpRef),
    Bvashr(ExpRef, ExpRef),
    Extract(u32, u32, ExpRef),
    ZeroExtend(u32, ExpRef),
    SignExtend(u32, ExpRef),
    Concat(ExpRef, ExpRef),
    Ite(ExpRef, ExpRef, ExpRef),
}

fn mask64(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

impl Exp {
    /// A constant zero bitvector of the given width.
    pub fn zeros(width: u32) -> Self {
        if width <= 64 {
            Exp::Bits64(0, width)
        } else {
            Exp::Bits(vec![false; width as usize])
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Exp::Bits64(bits, _) => *bits == 0,
            Exp::Bits(bits) => bits.iter().all(|b| !b),
            _ => false,
        }
    }

    /// The value and width of a constant bitvector expression that
    /// fits in a `u64`, used for reducing address expressions.
    pub fn as_bits64(&self) -> Option<(u64, u32)> {
        match self {
            Exp::Bits64(bits, len) => Some((*bits, *len)),
            Exp::Bits(bits) if bits.len() <= 64 => {
                let mut v = 0u64;
                for (i, bit) in bits.iter().enumerate() {
                    if *bit {
                        v |= 1 << i
                    }
                }
                Some((v, bits.len() as u32))
            }
            _ => None,
        }
    }

    /// Constant bitvectors as a bit list with index 0 the least
    /// significant bit. `None` for anything non-constant.
    fn to_bools(&self) -> Option<Vec<bool>> {
        match self {
            Exp::Bits64(bits, len) => Some((0..*len).map(|i| (bits >> i) & 1 == 1).collect()),
            Exp::Bits(bits) => Some(bits.clone()),
            _ => None,
        }
    }

    fn from_bools(bits: Vec<bool>) -> Self {
        if bits.len() <= 64 {
            let mut v = 0u64;
            for (i, bit) in bits.iter().enumerate() {
                if *bit {
                    v |= 1 << i
                }
            }
            Exp::Bits64(v, bits.len() as u32)
        } else {
            Exp::Bits(bits)
        }
    }

    pub fn collect_symbolic_variables(&self, vars: &mut HashSet<Sym, ahash::RandomState>) {
        use Exp::*;
        match self {
            Var(v) => {
                vars.insert(*v);
            }
            Bits64(_, _) | Bits(_) | Bool(_) => (),
            Not(exp) | Bvnot(exp) | Bvneg(exp) | Extract(_, _, exp) | ZeroExtend(_, exp) | SignExtend(_, exp) => {
                exp.collect_symbolic_variables(vars)
            }
            Eq(lhs, rhs)
            | Neq(lhs, rhs)
            | And(lhs, rhs)
            | Or(lhs, rhs)
            | Bvand(lhs, rhs)
            | Bvor(lhs, rhs)
            | Bvxor(lhs, rhs)
            | Bvadd(lhs, rhs)
            | Bvsub(lhs, rhs)
            | Bvmul(lhs, rhs)
            | Bvudiv(lhs, rhs)
            | Bvsdiv(lhs, rhs)
            | Bvurem(lhs, rhs)
            | Bvsrem(lhs, rhs)
            | Bvult(lhs, rhs)
            | Bvslt(lhs, rhs)
            | Bvshl(lhs, rhs)
            | Bvlshr(lhs, rhs)
            | Bvashr(lhs, rhs)
            | Concat(lhs, rhs) => {
                lhs.collect_symbolic_variables(vars);
                rhs.collect_symbolic_variables(vars)
            }
            Ite(cond, then_exp, else_exp) => {
                cond.collect_symbolic_variables(vars);
                then_exp.collect_symbolic_variables(vars);
                else_exp.collect_symbolic_variables(vars)
            }
        }
    }

    fn contains_ite(&self) -> bool {
        use Exp::*;
        match self {
            Var(_) | Bits64(_, _) | Bits(_) | Bool(_) => false,
            Not(exp) | Bvnot(exp) | Bvneg(exp) | Extract(_, _, exp) | ZeroExtend(_, exp) | SignExtend(_, exp) => {
                exp.contains_ite()
            }
            Eq(lhs, rhs)
            | Neq(lhs, rhs)
            | And(lhs, rhs)
            | Or(lhs, rhs)
            | Bvand(lhs, rhs)
            | Bvor(lhs, rhs)
            | Bvxor(lhs, rhs)
            | Bvadd(lhs, rhs)
            | Bvsub(lhs, rhs)
            | Bvmul(lhs, rhs)
            | Bvudiv(lhs, rhs)
            | Bvsdiv(lhs, rhs)
            | Bvurem(lhs, rhs)
            | Bvsrem(lhs, rhs)
            | Bvult(lhs, rhs)
            | Bvslt(lhs, rhs)
            | Bvshl(lhs, rhs)
            | Bvlshr(lhs, rhs)
            | Bvashr(lhs, rhs)
            | Concat(lhs, rhs) => lhs.contains_ite() || rhs.contains_ite(),
            Ite(_, _, _) => true,
        }
    }

    /// Infer the sort of an already well-formed expression against a
    /// declaration context.
    pub fn infer(&self, tcx: &TyCtx) -> Option<Ty> {
        use Exp::*;
        match self {
            Var(v) => tcx.get(v).copied(),
            Bits(bv) => Some(Ty::BitVec(bv.len() as u32)),
            Bits64(_, sz) => Some(Ty::BitVec(*sz)),
            Bool(_)
            | Not(_)
            | Eq(_, _)
            | Neq(_, _)
            | And(_, _)
            | Or(_, _)
            | Bvult(_, _)
            | Bvslt(_, _) => Some(Ty::Bool),
            Bvnot(exp) | Bvneg(exp) => exp.infer(tcx),
            Extract(i, j, _) => Some(Ty::BitVec((i - j) + 1)),
            ZeroExtend(ext, exp) | SignExtend(ext, exp) => match exp.infer(tcx) {
                Some(Ty::BitVec(sz)) => Some(Ty::BitVec(sz + ext)),
                _ => None,
            },
            Bvand(lhs, _)
            | Bvor(lhs, _)
            | Bvxor(lhs, _)
            | Bvadd(lhs, _)
            | Bvsub(lhs, _)
            | Bvmul(lhs, _)
            | Bvudiv(lhs, _)
            | Bvsdiv(lhs, _)
            | Bvurem(lhs, _)
            | Bvsrem(lhs, _)
            | Bvshl(lhs, _)
            | Bvlshr(lhs, _)
            | Bvashr(lhs, _) => lhs.infer(tcx),
            Concat(lhs, rhs) => match (lhs.infer(tcx), rhs.infer(tcx)) {
                (Some(Ty::BitVec(lsz)), Some(Ty::BitVec(rsz))) => Some(Ty::BitVec(lsz + rsz)),
                (_, _) => None,
            },
            Ite(_, then_exp, _) => then_exp.infer(tcx),
        }
    }
}

fn bits64_binop(exp: &ExpRef, lhs: &ExpRef, rhs: &ExpRef) -> ExpRef {
    use Exp::*;
    let (l, r, sz) = match (lhs.as_bits64(), rhs.as_bits64()) {
        (Some((l, lsz)), Some((r, rsz))) if lsz == rsz => (l, r, lsz),
        _ => return rebuild2(exp, lhs, rhs),
    };
    let m = mask64(sz);
    let folded = match &**exp {
        Bvand(_, _) => Some(l & r),
        Bvor(_, _) => Some(l | r),
        Bvxor(_, _) => Some(l ^ r),
        Bvadd(_, _) => Some(l.wrapping_add(r) & m),
        Bvsub(_, _) => Some(l.wrapping_sub(r) & m),
        Bvmul(_, _) => Some(l.wrapping_mul(r) & m),
        Bvudiv(_, _) if r != 0 => Some(l / r),
        Bvurem(_, _) if r != 0 => Some(l % r),
        _ => None,
    };
    match folded {
        Some(v) => Arc::new(Bits64(v, sz)),
        None => rebuild2(exp, lhs, rhs),
    }
}

fn rebuild2(exp: &ExpRef, lhs: &ExpRef, rhs: &ExpRef) -> ExpRef {
    use Exp::*;
    let node = match &**exp {
        Bvand(_, _) => Bvand(lhs.clone(), rhs.clone()),
        Bvor(_, _) => Bvor(lhs.clone(), rhs.clone()),
        Bvxor(_, _) => Bvxor(lhs.clone(), rhs.clone()),
        Bvadd(_, _) => Bvadd(lhs.clone(), rhs.clone()),
        Bvsub(_, _) => Bvsub(lhs.clone(), rhs.clone()),
        Bvmul(_, _) => Bvmul(lhs.clone(), rhs.clone()),
        Bvudiv(_, _) => Bvudiv(lhs.clone(), rhs.clone()),
        Bvurem(_, _) => Bvurem(lhs.clone(), rhs.clone()),
        _ => return exp.clone(),
    };
    Arc::new(node)
}

/// Fold the constant parts of an expression bottom-up, without
/// touching sub-expressions the fold cannot reduce. This covers the
/// shapes the memory accessor builds (concatenations, extracts and
/// extensions of byte constants) plus simple bitvector arithmetic;
/// anything else passes through untouched.
pub fn fold(exp: &ExpRef) -> ExpRef {
    use Exp::*;
    match &**exp {
        Concat(lhs, rhs) => {
            let lhs = fold(lhs);
            let rhs = fold(rhs);
            match (lhs.to_bools(), rhs.to_bools()) {
                (Some(hi), Some(mut lo)) => {
                    // In (concat hi lo) the first operand forms the
                    // high bits; bit lists are LSB-first.
                    lo.extend(hi);
                    Arc::new(Exp::from_bools(lo))
                }
                _ => Arc::new(Concat(lhs, rhs)),
            }
        }
        Extract(hi, lo, e) => {
            let e = fold(e);
            match e.to_bools() {
                Some(bits) if (*hi as usize) < bits.len() && lo <= hi => {
                    Arc::new(Exp::from_bools(bits[*lo as usize..=*hi as usize].to_vec()))
                }
                _ => Arc::new(Extract(*hi, *lo, e)),
            }
        }
        ZeroExtend(ext, e) => {
            let e = fold(e);
            match e.to_bools() {
                Some(mut bits) => {
                    bits.extend(std::iter::repeat(false).take(*ext as usize));
                    Arc::new(Exp::from_bools(bits))
                }
                None => Arc::new(ZeroExtend(*ext, e)),
            }
        }
        SignExtend(ext, e) => {
            let e = fold(e);
            match e.to_bools() {
                Some(mut bits) if !bits.is_empty() => {
                    let sign = *bits.last().unwrap();
                    bits.extend(std::iter::repeat(sign).take(*ext as usize));
                    Arc::new(Exp::from_bools(bits))
                }
                _ => Arc::new(SignExtend(*ext, e)),
            }
        }
        Ite(cond, then_exp, else_exp) => {
            let cond = fold(cond);
            if let Bool(b) = &*cond {
                if *b {
                    fold(then_exp)
                } else {
                    fold(else_exp)
                }
            } else {
                Arc::new(Ite(cond, fold(then_exp), fold(else_exp)))
            }
        }
        Not(e) => {
            let e = fold(e);
            if let Bool(b) = &*e {
                Arc::new(Bool(!b))
            } else {
                Arc::new(Not(e))
            }
        }
        Bvnot(e) => {
            let e = fold(e);
            match e.as_bits64() {
                Some((v, sz)) => Arc::new(Bits64(!v & mask64(sz), sz)),
                None => Arc::new(Bvnot(e)),
            }
        }
        Bvneg(e) => {
            let e = fold(e);
            match e.as_bits64() {
                Some((v, sz)) => Arc::new(Bits64(v.wrapping_neg() & mask64(sz), sz)),
                None => Arc::new(Bvneg(e)),
            }
        }
        Bvand(lhs, rhs) | Bvor(lhs, rhs) | Bvxor(lhs, rhs) | Bvadd(lhs, rhs) | Bvsub(lhs, rhs) | Bvmul(lhs, rhs)
        | Bvudiv(lhs, rhs) | Bvurem(lhs, rhs) => bits64_binop(exp, &fold(lhs), &fold(rhs)),
        _ => exp.clone(),
    }
}

fn write_bits(f: &mut fmt::Formatter<'_>, bits: &[bool]) -> fmt::Result {
    if bits.len() % 4 == 0 {
        write!(f, "#x")?;
        for i in (0..(bits.len() / 4)).rev() {
            let j = i * 4;
            let hex = (if bits[j] { 0b0001 } else { 0 })
                | (if bits[j + 1] { 0b0010 } else { 0 })
                | (if bits[j + 2] { 0b0100 } else { 0 })
                | (if bits[j + 3] { 0b1000 } else { 0 });
            write!(f, "{:x}", hex)?;
        }
    } else {
        write!(f, "#b")?;
        for bit in bits.iter().rev() {
            if *bit {
                write!(f, "1")?
            } else {
                write!(f, "0")?
            }
        }
    }
    Ok(())
}

fn write_bits64(f: &mut fmt::Formatter<'_>, bits: u64, len: u32) -> fmt::Result {
    if len % 4 == 0 {
        write!(f, "#x")?;
        for i in (0..(len / 4)).rev() {
            write!(f, "{:x}", (bits >> (i * 4)) & 0xf)?;
        }
    } else {
        write!(f, "#b")?;
        for i in (0..len).rev() {
            write!(f, "{}", (bits >> i) & 1)?;
        }
    }
    Ok(())
}

impl fmt::Display for Exp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Exp::*;
        match self {
            Var(v) => write!(f, "{}", v),
            Bits(bv) => write_bits(f, bv),
            Bits64(bits, len) => write_bits64(f, *bits, *len),
            Bool(b) => write!(f, "{}", b),
            Not(exp) => write!(f, "(not {})", exp),
            Eq(lhs, rhs) => write!(f, "(= {} {})", lhs, rhs),
            Neq(lhs, rhs) => write!(f, "(not (= {} {}))", lhs, rhs),
            And(lhs, rhs) => write!(f, "(and {} {})", lhs, rhs),
            Or(lhs, rhs) => write!(f, "(or {} {})", lhs, rhs),
            Bvnot(exp) => write!(f, "(bvnot {})", exp),
            Bvneg(exp) => write!(f, "(bvneg {})", exp),
            Bvand(lhs, rhs) => write!(f, "(bvand {} {})", lhs, rhs),
            Bvor(lhs, rhs) => write!(f, "(bvor {} {})", lhs, rhs),
            Bvxor(lhs, rhs) => write!(f, "(bvxor {} {})", lhs, rhs),
            Bvadd(lhs, rhs) => write!(f, "(bvadd {} {})", lhs, rhs),
            Bvsub(lhs, rhs) => write!(f, "(bvsub {} {})", lhs, rhs),
            Bvmul(lhs, rhs) => write!(f, "(bvmul {} {})", lhs, rhs),
            Bvudiv(lhs, rhs) => write!(f, "(bvudiv {} {})", lhs, rhs),
            Bvsdiv(lhs, rhs) => write!(f, "(bvsdiv {} {})", lhs, rhs),
            Bvurem(lhs, rhs) => write!(f, "(bvurem {} {})", lhs, rhs),
            Bvsrem(lhs, rhs) => write!(f, "(bvsrem {} {})", lhs, rhs),
            Bvult(lhs, rhs) => write!(f, "(bvult {} {})", lhs, rhs),
            Bvslt(lhs, rhs) => write!(f, "(bvslt {} {})", lhs, rhs),
            Bvshl(lhs, rhs) => write!(f, "(bvshl {} {})", lhs, rhs),
            Bvlshr(lhs, rhs) => write!(f, "(bvlshr {} {})", lhs, rhs),
            Bvashr(lhs, rhs) => write!(f, "(bvashr {} {})", lhs, rhs),
            Extract(i, j, exp) => write!(f, "((_ extract {} {}) {})", i, j, exp),
            ZeroExtend(n, exp) => write!(f, "((_ zero_extend {}) {})", n, exp),
            SignExtend(n, exp) => write!(f, "((_ sign_extend {}) {})", n, exp),
            Concat(lhs, rhs) => write!(f, "(concat {} {})", lhs, rhs),
            Ite(cond, then_exp, else_exp) => write!(f, "(ite {} {} {})", cond, then_exp, else_exp),
        }
    }
}

/// How an expression should be treated when it is recorded: constant
/// expressions and single-symbol arithmetic get a compact summary,
/// while multi-symbol or control-dependent expressions are recorded
/// in full. Classification depends only on the structure of the
/// expression, so two states sharing a sub-expression always agree on
/// its category.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Concrete,
    SymbolicSimple,
    SymbolicComplex,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Concrete => write!(f, "concrete"),
            Category::SymbolicSimple => write!(f, "symbolic-simple"),
            Category::SymbolicComplex => write!(f, "symbolic-complex"),
        }
    }
}

pub fn classify(exp: &Exp) -> Category {
    let mut vars = HashSet::default();
    exp.collect_symbolic_variables(&mut vars);
    match vars.len() {
        0 => Category::Concrete,
        1 if !exp.contains_ite() => Category::SymbolicSimple,
        _ => Category::SymbolicComplex,
    }
}

#[cfg(test)]
mod tests {
    use super::Exp::*;
    use super::*;

    fn var(id: u32) -> ExpRef {
        Arc::new(Var(Sym::from_u32(id)))
    }

    #[test]
    fn fold_concat_of_zero_bytes() {
        let lo = Arc::new(Exp::zeros(8));
        let hi = Arc::new(Exp::zeros(8));
        let folded = fold(&Arc::new(Concat(hi, lo)));
        assert_eq!(*folded, Bits64(0, 16));
        assert!(folded.is_zero());
    }

    #[test]
    fn fold_concat_orders_bytes() {
        // (concat #x12 #x34) == #x1234
        let hi = Arc::new(Bits64(0x12, 8));
        let lo = Arc::new(Bits64(0x34, 8));
        let folded = fold(&Arc::new(Concat(hi, lo)));
        assert_eq!(*folded, Bits64(0x1234, 16));
    }

    #[test]
    fn fold_wide_concat_stays_zero() {
        let mut exp = Arc::new(Exp::zeros(8));
        for _ in 0..15 {
            exp = Arc::new(Concat(Arc::new(Exp::zeros(8)), exp));
        }
        let folded = fold(&exp);
        assert!(folded.is_zero());
        assert_eq!(*folded, Bits(vec![false; 128]));
    }

    #[test]
    fn fold_extract() {
        let folded = fold(&Arc::new(Extract(15, 8, Arc::new(Bits64(0xabcd, 16)))));
        assert_eq!(*folded, Bits64(0xab, 8));
    }

    #[test]
    fn fold_arith() {
        let folded = fold(&Arc::new(Bvadd(Arc::new(Bits64(0xff, 8)), Arc::new(Bits64(1, 8)))));
        assert_eq!(*folded, Bits64(0, 8));
    }

    #[test]
    fn fold_leaves_symbolic_untouched() {
        let exp = Arc::new(Bvadd(var(0), Arc::new(Bits64(1, 8))));
        assert_eq!(*fold(&exp), *exp);
    }

    #[test]
    fn infer_widths() {
        let mut tcx = TyCtx::default();
        tcx.insert(Sym::from_u32(0), Ty::BitVec(32));
        let exp = Concat(var(0), Arc::new(Bits64(0, 8)));
        assert_eq!(exp.infer(&tcx), Some(Ty::BitVec(40)));
        assert_eq!(Ty::float_from_width(64).map(Ty::width), Some(64));
        assert_eq!(Ty::float_from_width(48), None);
    }

    #[test]
    fn classify_by_symbol_count() {
        assert_eq!(classify(&Exp::zeros(64)), Category::Concrete);
        let simple = Bvadd(var(0), Arc::new(Bits64(1, 8)));
        assert_eq!(classify(&simple), Category::SymbolicSimple);
        let complex = Bvadd(var(0), var(1));
        assert_eq!(classify(&complex), Category::SymbolicComplex);
        let nested = Ite(Arc::new(Eq(var(0), Arc::new(Bits64(0, 8)))), var(0), var(0));
        assert_eq!(classify(&nested), Category::SymbolicComplex);
    }

    #[test]
    fn classify_is_stable_across_shared_references() {
        let shared = Arc::new(Bvmul(var(3), Arc::new(Bits64(4, 32))));
        let in_state_a = shared.clone();
        let in_state_b = shared.clone();
        assert_eq!(classify(&in_state_a), classify(&in_state_b));
        assert_eq!(classify(&shared), Category::SymbolicSimple);
    }
}
