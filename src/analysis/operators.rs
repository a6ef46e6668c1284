// src/analysis/operators.rs
//! The abstract operator table (C2, §4.2): `abstract_fn`/`narrow_fn` per
//! opcode.
//!
//! `abstract_fn` must be monotone (R3, P1): feeding it `Top` inputs always
//! yields `Top`, and refining any input can only refine (never coarsen) the
//! output. `narrow_fn` is only invoked from trace construction (§4.4.3); for
//! opcodes where no useful narrowing is known, it's a safe no-op (leaves
//! inputs unrefined) rather than an incorrect guess.

use crate::analysis::lattice::{Bits, Bounds, ConstraintElem};
use crate::ir::opcode::Opcode;
use crate::ir::types::Type;

fn elem_binop(
    a: ConstraintElem,
    b: ConstraintElem,
    mask: u64,
    f: impl Fn(i128, i128) -> i128,
) -> ConstraintElem {
    match (a, b) {
        (ConstraintElem::Top, _) | (_, ConstraintElem::Top) => ConstraintElem::Top,
        (ConstraintElem::Val { bounds: ba, .. }, ConstraintElem::Val { bounds: bb, .. }) => {
            // Sound but simple: evaluate `f` at all four corners and take
            // the enclosing interval. Correct for monotone-in-each-argument
            // `f` (true of +, -, *, shifts over nonnegative bounds).
            let corners =
                [f(ba.min, bb.min), f(ba.min, bb.max), f(ba.max, bb.min), f(ba.max, bb.max)];
            let min = corners.iter().copied().fold(i128::MAX, i128::min).max(0);
            let max = corners.iter().copied().fold(i128::MIN, i128::max).min(i128::from(mask));
            ConstraintElem::Val { bounds: Bounds { min, max }, bits: Bits::unconstrained(), mask }.normalize()
        }
    }
}

fn elem_bitop(a: ConstraintElem, b: ConstraintElem, mask: u64, known1: fn(u64, u64) -> u64, known0: fn(u64, u64) -> u64) -> ConstraintElem {
    match (a, b) {
        (ConstraintElem::Top, _) | (_, ConstraintElem::Top) => ConstraintElem::Top,
        (ConstraintElem::Val { bits: bia, .. }, ConstraintElem::Val { bits: bib, .. }) => {
            let bits = Bits { known1: known1(bia.known1, bib.known1) & mask, known0: known0(bia.known0, bib.known0) & mask };
            ConstraintElem::Val { bounds: Bounds::bottom(mask), bits, mask }.normalize()
        }
    }
}

/// §4.2 `abstract_fn(op)` — computes the result element from input elements.
#[must_use]
pub fn abstract_fn(op: Opcode, inputs: &[ConstraintElem], ty: &Type) -> ConstraintElem {
    let mask = ty.numeric_bitmask();
    match op {
        Opcode::Param => ConstraintElem::bottom(mask),
        Opcode::Add => elem_binop(inputs[0], inputs[1], mask, |a, b| a + b),
        Opcode::Sub => elem_binop(inputs[0], inputs[1], mask, |a, b| a - b),
        Opcode::Mul => elem_binop(inputs[0], inputs[1], mask, |a, b| a * b),
        Opcode::UDiv | Opcode::SDiv => {
            if let ConstraintElem::Val { bounds: bb, .. } = inputs[1] {
                if bb.min <= 0 && bb.max >= 0 && bb.min == bb.max {
                    // Divisor provably zero: result unconstrained rather
                    // than a spurious panic path — division-by-zero
                    // semantics belong to a later pass, not this lattice.
                    return ConstraintElem::bottom(mask);
                }
            }
            elem_binop(inputs[0], inputs[1], mask, |a, b| if b == 0 { 0 } else { a / b })
        }
        Opcode::And => elem_bitop(inputs[0], inputs[1], mask, |a, b| a & b, |a, b| a | b),
        Opcode::Or => elem_bitop(inputs[0], inputs[1], mask, |a, b| a | b, |a, b| a & b),
        Opcode::Xor => {
            // known bits of xor: bit is known1 iff exactly one side known1
            // and the other known0 (or vice versa); known0 iff both sides
            // agree on a known bit.
            match (inputs[0], inputs[1]) {
                (ConstraintElem::Top, _) | (_, ConstraintElem::Top) => ConstraintElem::Top,
                (ConstraintElem::Val { bits: a, .. }, ConstraintElem::Val { bits: b, .. }) => {
                    let known1 = (a.known1 & b.known0) | (a.known0 & b.known1);
                    let known0 = (a.known1 & b.known1) | (a.known0 & b.known0);
                    ConstraintElem::Val { bounds: Bounds::bottom(mask), bits: Bits { known0, known1 }, mask }
                        .normalize()
                }
            }
        }
        Opcode::Shl => elem_binop(inputs[0], inputs[1], mask, |a, b| {
            if (0..64).contains(&b) { a << b } else { 0 }
        }),
        Opcode::Lshr | Opcode::Ashr => elem_binop(inputs[0], inputs[1], mask, |a, b| {
            if (0..64).contains(&b) { a >> b } else { 0 }
        }),
        Opcode::Eq | Opcode::Neq | Opcode::Lt | Opcode::Lte => abstract_comparison_chain(op, inputs, mask),
        Opcode::If | Opcode::Switch => ConstraintElem::Top,
        Opcode::Phi => inputs.iter().copied().fold(ConstraintElem::Top, ConstraintElem::union_),
        Opcode::Trace => inputs.first().copied().unwrap_or(ConstraintElem::Top),
    }
}

/// Evaluates a k-ary `Eq`/`Neq`/`Lt`/`Lte` chain (§4.5) to a single boolean
/// element, taken pairwise (`Eq`/`Neq`) or as an ordered chain (`Lt`/`Lte`).
fn abstract_comparison_chain(op: Opcode, inputs: &[ConstraintElem], bool_mask: u64) -> ConstraintElem {
    if inputs.iter().any(ConstraintElem::is_top) {
        return ConstraintElem::Top;
    }
    let pairs: Box<dyn Iterator<Item = (ConstraintElem, ConstraintElem)>> = match op {
        Opcode::Eq | Opcode::Neq => Box::new(inputs.iter().copied().zip(inputs.iter().copied().skip(1)).step_by(2)),
        _ => Box::new(inputs.windows(2).map(|w| (w[0], w[1]))),
    };
    let mut all_true_definite = true;
    let mut all_false_definite = true;
    for (a, b) in pairs {
        let (ConstraintElem::Val { bounds: ba, .. }, ConstraintElem::Val { bounds: bb, .. }) = (a, b) else {
            return ConstraintElem::bottom(bool_mask);
        };
        let (def_true, def_false) = match op {
            Opcode::Eq => (ba.is_const() && bb.is_const() && ba.min == bb.min, ba.max < bb.min || bb.max < ba.min),
            Opcode::Neq => (ba.max < bb.min || bb.max < ba.min, ba.is_const() && bb.is_const() && ba.min == bb.min),
            Opcode::Lt => (ba.max < bb.min, ba.min >= bb.max),
            Opcode::Lte => (ba.max <= bb.min, ba.min > bb.max),
            _ => unreachable!(),
        };
        all_true_definite &= def_true;
        all_false_definite &= def_false;
        if !def_true && !def_false {
            return ConstraintElem::bottom(bool_mask);
        }
    }
    if all_true_definite {
        ConstraintElem::const_(1, bool_mask)
    } else if all_false_definite {
        ConstraintElem::const_(0, bool_mask)
    } else {
        ConstraintElem::bottom(bool_mask)
    }
}

/// §4.2 `narrow_fn(op)` — given a refinement `out` of the result, tighten
/// `inputs` in place. Only invoked by trace construction (§4.4.3); opcodes
/// with no useful narrowing leave `inputs` untouched (a sound no-op: an
/// unrefined operand is never unsound, only less precise).
pub fn narrow_fn(op: Opcode, inputs: &mut [ConstraintElem], out: ConstraintElem, ty: &Type) {
    let mask = ty.numeric_bitmask();
    let ConstraintElem::Val { bounds: ob, .. } = out else { return };
    match op {
        Opcode::Lt if ob.is_const() => {
            if ob.min == 1 {
                narrow_less_than(&mut inputs[0], &mut inputs[1], mask);
            } else {
                narrow_less_than(&mut inputs[1], &mut inputs[0], mask);
            }
        }
        Opcode::Lte if ob.is_const() => {
            if ob.min == 1 {
                narrow_less_equal(&mut inputs[0], &mut inputs[1], mask);
            } else {
                narrow_less_equal(&mut inputs[1], &mut inputs[0], mask);
            }
        }
        Opcode::Eq if ob.is_const() && ob.min == 1 => {
            let refined = inputs[0].intersect(inputs[1]);
            inputs[0] = refined;
            inputs[1] = refined;
        }
        Opcode::Add if ob.is_const() => {
            // result = a + b is constant and b is constant => a is pinned.
            if let ConstraintElem::Val { bounds: bb, .. } = inputs[1] {
                if bb.is_const() {
                    inputs[0] = ConstraintElem::const_((ob.min - bb.min) as u64 & mask, mask);
                }
            }
        }
        _ => {}
    }
}

fn narrow_less_than(lo: &mut ConstraintElem, hi: &mut ConstraintElem, mask: u64) {
    if let (ConstraintElem::Val { bounds: blo, bits, .. }, ConstraintElem::Val { bounds: bhi, .. }) = (*lo, *hi) {
        *lo = ConstraintElem::Val { bounds: Bounds { min: blo.min, max: blo.max.min(bhi.max - 1) }, bits, mask }
            .normalize();
    }
    if let (ConstraintElem::Val { bounds: blo, .. }, ConstraintElem::Val { bounds: bhi, bits, .. }) = (*lo, *hi) {
        *hi = ConstraintElem::Val { bounds: Bounds { min: bhi.min.max(blo.min + 1), max: bhi.max }, bits, mask }
            .normalize();
    }
}

fn narrow_less_equal(lo: &mut ConstraintElem, hi: &mut ConstraintElem, mask: u64) {
    if let (ConstraintElem::Val { bounds: blo, bits, .. }, ConstraintElem::Val { bounds: bhi, .. }) = (*lo, *hi) {
        *lo =
            ConstraintElem::Val { bounds: Bounds { min: blo.min, max: blo.max.min(bhi.max) }, bits, mask }.normalize();
    }
    if let (ConstraintElem::Val { bounds: blo, .. }, ConstraintElem::Val { bounds: bhi, bits, .. }) = (*lo, *hi) {
        *hi =
            ConstraintElem::Val { bounds: Bounds { min: bhi.min.max(blo.min), max: bhi.max }, bits, mask }.normalize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::types::Type;

    #[test]
    fn abstract_fn_top_inputs_yield_top() {
        let ty = Type::I32;
        for op in [Opcode::Add, Opcode::Sub, Opcode::Mul, Opcode::And, Opcode::Or, Opcode::Xor, Opcode::Lt] {
            let out = abstract_fn(op, &[ConstraintElem::Top, ConstraintElem::Top], &ty);
            assert!(out.is_top(), "{op} did not propagate top");
        }
    }

    #[test]
    fn add_is_monotone_on_constants() {
        let ty = Type::I32;
        let a = ConstraintElem::const_(2, ty.numeric_bitmask());
        let b = ConstraintElem::const_(3, ty.numeric_bitmask());
        let out = abstract_fn(Opcode::Add, &[a, b], &ty);
        assert!(out.is_const());
        assert_eq!(out.get_const(), 5);
    }

    #[test]
    fn lt_of_disjoint_ranges_is_const_true() {
        let ty = Type::I32;
        let mask = ty.numeric_bitmask();
        let low = ConstraintElem::Val { bounds: Bounds { min: 0, max: 9 }, bits: Bits::unconstrained(), mask };
        let high = ConstraintElem::Val { bounds: Bounds { min: 10, max: 20 }, bits: Bits::unconstrained(), mask };
        let out = abstract_fn(Opcode::Lt, &[low, high], &ty);
        assert_eq!(out.get_const(), 1);
    }

    #[test]
    fn narrow_lt_tightens_both_sides() {
        let ty = Type::I32;
        let mask = ty.numeric_bitmask();
        let mut inputs = vec![
            ConstraintElem::Val { bounds: Bounds { min: 0, max: 255 }, bits: Bits::unconstrained(), mask },
            ConstraintElem::Val { bounds: Bounds { min: 10, max: 10 }, bits: Bits::unconstrained(), mask },
        ];
        let out = ConstraintElem::const_(1, 0x1);
        narrow_fn(Opcode::Lt, &mut inputs, out, &ty);
        let ConstraintElem::Val { bounds, .. } = inputs[0] else { unreachable!() };
        assert_eq!(bounds.max, 9);
    }
}
