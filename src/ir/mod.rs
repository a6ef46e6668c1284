// src/ir/mod.rs
//! Handle-based CFG/SSA intermediate representation.
//!
//! Every block and SSA node is addressed by a `CfgHandle`/`SsaHandle`, never
//! a name or a pointer, so the analysis side tables in `crate::analysis` can
//! be plain handle-indexed `Vec`s (§9).
pub mod block;
pub mod builder;
pub mod cfg;
pub mod dominance;
pub mod function;
pub mod handle;
pub mod opcode;
pub mod printer;
pub mod ssa;
pub mod types;
pub mod validator;
pub mod value;

pub use block::BasicBlock;
pub use cfg::ControlFlowGraph;
pub use function::Function;
pub use handle::{CfgHandle, SsaHandle};
pub use opcode::{OpFlags, Opcode};
pub use printer::FunctionPrinter;
pub use ssa::SsaNode;
pub use types::Type;
pub use value::{ConstValue, Value};
