// src/analysis/lattice.rs
//! The fixed-point constraint lattice (C1, §4.1): interval bounds + known-bit
//! tristate on a per-type mask, with the two widening thresholds that give
//! the engine its termination guarantee (P3).

use std::fmt;

/// Visit count at which a value's bounds are forced to `bottom`, bits kept.
pub const WIDEN_OP_BOUNDS: u32 = 16;
/// Visit count at which a value's entire element is forced to `bottom`.
pub const WIDEN_OP: u32 = 24;

/// Inclusive interval over the value's bit-pattern, interpreted as signed so
/// a single representation covers both signed and unsigned scalar types up
/// to 64 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub min: i128,
    pub max: i128,
}

impl Bounds {
    #[must_use]
    pub const fn single(v: i128) -> Self {
        Self { min: v, max: v }
    }

    /// §4.1 `bounds_t::bottom(mask)` — every value representable under `mask`.
    #[must_use]
    pub fn bottom(mask: u64) -> Self {
        let unsigned_max = i128::from(mask);
        Self { min: 0, max: unsigned_max }
    }

    #[must_use]
    pub const fn is_const(self) -> bool {
        self.min == self.max
    }

    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self { min: self.min.min(other.min), max: self.max.max(other.max) }
    }

    /// Greatest lower bound; empty (`min > max`) signals contradiction.
    #[must_use]
    pub fn intersect(self, other: Self) -> Self {
        Self { min: self.min.max(other.min), max: self.max.min(other.max) }
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.min > self.max
    }
}

/// Known-bit tristate: `known1` bits are proven 1, `known0` bits proven 0;
/// a bit position set in neither is unconstrained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bits {
    pub known0: u64,
    pub known1: u64,
}

impl Bits {
    #[must_use]
    pub const fn unconstrained() -> Self {
        Self { known0: 0, known1: 0 }
    }

    #[must_use]
    pub const fn from_const(v: u64, mask: u64) -> Self {
        Self { known0: !v & mask, known1: v & mask }
    }

    /// Meet: union the known sets (more precise agrees, more precise wins).
    #[must_use]
    pub const fn intersect(self, other: Self) -> Self {
        Self { known0: self.known0 | other.known0, known1: self.known1 | other.known1 }
    }

    /// Join: only bits both operands agree on stay known.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self { known0: self.known0 & other.known0, known1: self.known1 & other.known1 }
    }

    #[must_use]
    pub const fn contradictory(self) -> bool {
        self.known0 & self.known1 != 0
    }
}

/// One value's abstract state: `top` (no information yet) or a concrete
/// bounds+bits element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintElem {
    /// Unreachable / undefined — the defining edge isn't executable yet.
    Top,
    Val { bounds: Bounds, bits: Bits, mask: u64 },
}

impl ConstraintElem {
    #[must_use]
    pub const fn top() -> Self {
        Self::Top
    }

    #[must_use]
    pub fn bottom(mask: u64) -> Self {
        Self::Val { bounds: Bounds::bottom(mask), bits: Bits::unconstrained(), mask }
    }

    #[must_use]
    pub const fn const_(v: u64, mask: u64) -> Self {
        Self::Val { bounds: Bounds::single(v as i128), bits: Bits::from_const(v, mask), mask }
    }

    #[must_use]
    pub const fn is_top(&self) -> bool {
        matches!(self, Self::Top)
    }

    #[must_use]
    pub const fn is_const(&self) -> bool {
        matches!(self, Self::Val { bounds, .. } if bounds.is_const())
    }

    /// Undefined unless `is_const()`.
    #[must_use]
    pub const fn get_const(&self) -> u64 {
        match self {
            Self::Val { bounds, mask, .. } => (bounds.min as u64) & mask,
            Self::Top => 0,
        }
    }

    /// Meet (`intersect`, §4.1): greatest lower bound. By the spec's stated
    /// convention a contradictory intersection collapses to `Top`, used as
    /// the "this refinement is unreachable" marker.
    #[must_use]
    pub fn intersect(self, other: Self) -> Self {
        match (self, other) {
            (Self::Top, _) | (_, Self::Top) => Self::Top,
            (Self::Val { bounds: b1, bits: bi1, mask }, Self::Val { bounds: b2, bits: bi2, .. }) => {
                let bounds = b1.intersect(b2);
                let bits = bi1.intersect(bi2);
                if bounds.is_empty() || bits.contradictory() {
                    Self::Top
                } else {
                    Self::Val { bounds, bits, mask }
                }
            }
        }
    }

    /// Join (`union_`, §4.1): least upper bound.
    #[must_use]
    pub fn union_(self, other: Self) -> Self {
        match (self, other) {
            (Self::Top, x) | (x, Self::Top) => x,
            (Self::Val { bounds: b1, bits: bi1, mask }, Self::Val { bounds: b2, bits: bi2, .. }) => {
                Self::Val { bounds: b1.union(b2), bits: bi1.union(bi2), mask }
            }
        }
    }

    /// Iteratively derive tighter bits from bounds and tighter bounds from
    /// bits until a fixed point. Idempotent (R1).
    #[must_use]
    pub fn normalize(self) -> Self {
        let Self::Val { mut bounds, mut bits, mask } = self else { return self };
        loop {
            let mut changed = false;

            // A single-valued bounds range fully determines bits.
            if bounds.is_const() {
                let exact = Bits::from_const(bounds.min as u64, mask);
                if exact != bits.intersect(exact) {
                    bits = bits.intersect(exact);
                    changed = true;
                }
            }
            // Known bits tighten the achievable range when they pin the
            // high end (every bit above the top known-0 bit forces max down;
            // every bit pinned to 1 forces min up). We only apply the cheap,
            // always-sound refinements: min can never be below the bits
            // forced on, max can never be above mask with the known-0 bits
            // cleared.
            let forced_min = i128::from(bits.known1);
            if forced_min > bounds.min {
                bounds.min = forced_min;
                changed = true;
            }
            let forced_max = i128::from(mask & !bits.known0);
            if forced_max < bounds.max {
                bounds.max = forced_max;
                changed = true;
            }
            if bounds.is_empty() {
                return Self::Top;
            }
            if !changed {
                break;
            }
        }
        Self::Val { bounds, bits, mask }
    }

    /// Widening (§4.1). `visited_count` is the caller's per-value counter
    /// (already incorporating the trace 2x rate) *after* the current visit.
    #[must_use]
    pub fn widen(self, visited_count: u32, config_bounds: u32, config_full: u32) -> Self {
        match self {
            Self::Top => Self::Top,
            Self::Val { bounds, bits, mask } => {
                if visited_count >= config_full {
                    Self::bottom(mask)
                } else if visited_count >= config_bounds {
                    Self::Val { bounds: Bounds::bottom(mask), bits, mask }
                } else {
                    Self::Val { bounds, bits, mask }
                }
            }
        }
    }

    /// Subset check used by `all_subset` (P1): is `self` at least as precise
    /// as `other`, i.e. does `other ⊑ self` hold going the other way? We
    /// define `self.is_subset_of(other)` as "every concrete value `self`
    /// allows, `other` also allows" — the monotonicity direction P1 checks
    /// is `old ⊑ new`, i.e. `old.is_subset_of(new)`.
    #[must_use]
    pub fn is_subset_of(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Top, _) => true,
            (_, Self::Top) => false,
            (Self::Val { bounds: b1, bits: bi1, .. }, Self::Val { bounds: b2, bits: bi2, .. }) => {
                b2.min <= b1.min
                    && b1.max <= b2.max
                    && (bi2.known0 & !bi1.known0) == 0
                    && (bi2.known1 & !bi1.known1) == 0
            }
        }
    }
}

impl fmt::Display for ConstraintElem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Top => write!(f, "⊤"),
            Self::Val { bounds, .. } if bounds.is_const() => write!(f, "{}", bounds.min),
            Self::Val { bounds, .. } => write!(f, "[{}, {}]", bounds.min, bounds.max),
        }
    }
}

/// §3 `constraints_def_t`: the constraint vector for one SSA value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintsDef {
    pub mask: u64,
    pub vec: Vec<ConstraintElem>,
}

impl ConstraintsDef {
    #[must_use]
    pub fn top(mask: u64, size: usize) -> Self {
        Self { mask, vec: vec![ConstraintElem::Top; size] }
    }

    #[must_use]
    pub fn bottom(mask: u64, size: usize) -> Self {
        Self { mask, vec: vec![ConstraintElem::bottom(mask); size] }
    }

    #[must_use]
    pub fn first(&self) -> ConstraintElem {
        self.vec.first().copied().unwrap_or(ConstraintElem::Top)
    }

    /// P1's `all_subset(old, new)`.
    #[must_use]
    pub fn all_subset(&self, new: &Self) -> bool {
        self.vec.len() == new.vec.len() && self.vec.iter().zip(&new.vec).all(|(o, n)| o.is_subset_of(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_is_idempotent() {
        let c = ConstraintElem::Val { bounds: Bounds { min: 2, max: 2 }, bits: Bits::unconstrained(), mask: 0xFF };
        let once = c.normalize();
        assert_eq!(once.normalize(), once);
    }

    #[test]
    fn union_of_self_is_normalize() {
        let c = ConstraintElem::const_(5, 0xFF);
        assert_eq!(c.union_(c), c.normalize());
    }

    #[test]
    fn intersect_of_self_is_normalize() {
        let c = ConstraintElem::const_(5, 0xFF);
        assert_eq!(c.intersect(c), c.normalize());
    }

    #[test]
    fn contradictory_intersect_is_top() {
        let a = ConstraintElem::const_(1, 0xFF);
        let b = ConstraintElem::const_(2, 0xFF);
        assert!(a.intersect(b).is_top());
    }

    #[test]
    fn widen_steps() {
        let c = ConstraintElem::const_(5, 0xFF);
        let at_bounds = c.widen(16, 16, 24);
        assert!(!at_bounds.is_const());
        let at_full = c.widen(24, 16, 24);
        assert_eq!(at_full, ConstraintElem::bottom(0xFF));
    }

    #[test]
    fn monotonicity_top_is_subset_of_anything() {
        let top = ConstraintElem::top();
        let c = ConstraintElem::const_(1, 0xFF);
        assert!(top.is_subset_of(&c));
        assert!(!c.is_subset_of(&top) || c == top);
    }
}
