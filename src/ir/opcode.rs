// src/ir/opcode.rs
//! SSA opcodes and their static flags (§4.2, §6 `ssa_flags`).

use std::fmt;

/// Per-opcode static flags. A plain bitset over `u8`; the only flag the
/// engine needs (`TRACE_INPUTS`, §4.2) doesn't warrant pulling in a bitflags
/// dependency the teacher's stack doesn't already carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpFlags(u8);

impl OpFlags {
    /// §4.2: when set, inserting a trace for a node of this opcode also
    /// recursively traces every SSA-handle operand.
    pub const TRACE_INPUTS: Self = Self(1 << 0);

    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

/// SSA operation kind.
///
/// `Phi` and `Trace` are never produced by a front end; they are synthesized
/// by [`crate::analysis::trace`] during SSA rebuild (§4.4) and are always
/// marked via [`crate::ir::ssa::SsaNode::rebuild_mapping`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// A function parameter; no inputs, constraint seeded externally.
    Param,
    Add,
    Sub,
    Mul,
    UDiv,
    SDiv,
    And,
    Or,
    Xor,
    Shl,
    Lshr,
    Ashr,
    /// k-ary pairwise equality test (§4.5): operands taken two at a time.
    Eq,
    /// k-ary pairwise inequality test, dual of `Eq`.
    Neq,
    /// k-ary ordered chain (§4.5): `Lt(a, b, c)` means `a < b < c`.
    Lt,
    Lte,
    /// Two-way conditional branch; input(0) is the condition.
    If,
    /// Multi-way branch. Opaque to tracing/threading (non-goal, §1/§9): the
    /// engine treats it only as a sink with N successors.
    Switch,
    /// SSA phi, selecting an input by which predecessor edge was taken.
    Phi,
    /// Trace marker synthesized by C4 (§4.4).
    Trace,
}

impl Opcode {
    #[must_use]
    pub const fn flags(self) -> OpFlags {
        match self {
            // `orig` in `insert_trace` is always the traced value itself
            // (the branch condition, or one of its operands being traced
            // recursively) — never `If` itself, which is never an operand.
            // Every opcode that computes a value worth narrowing gets
            // traced through to its own operands.
            Self::Param | Self::If | Self::Switch | Self::Phi | Self::Trace => OpFlags::empty(),
            _ => OpFlags::TRACE_INPUTS,
        }
    }

    #[must_use]
    pub const fn is_terminator(self) -> bool {
        matches!(self, Self::If | Self::Switch)
    }

    #[must_use]
    pub const fn is_comparison(self) -> bool {
        matches!(self, Self::Eq | Self::Neq | Self::Lt | Self::Lte)
    }

    /// Number of result slots an SSA node of this opcode occupies in its
    /// `ConstraintsDef::vec` for a scalar operand type (§3): 2 for `Add`/
    /// `Sub` (result, carry), 1 otherwise. Array-like results instead get
    /// one slot per element — see `ConstraintsDef::size_for`.
    #[must_use]
    pub const fn scalar_constraint_slots(self) -> usize {
        match self {
            Self::Add | Self::Sub => 2,
            Self::If | Self::Switch => 0,
            _ => 1,
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Param => "param",
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::UDiv => "udiv",
            Self::SDiv => "sdiv",
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
            Self::Shl => "shl",
            Self::Lshr => "lshr",
            Self::Ashr => "ashr",
            Self::Eq => "eq",
            Self::Neq => "neq",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::If => "if",
            Self::Switch => "switch",
            Self::Phi => "phi",
            Self::Trace => "trace",
        };
        write!(f, "{s}")
    }
}
