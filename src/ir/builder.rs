// src/ir/builder.rs
//! A small declarative helper for constructing test fixtures.
//!
//! Not used by the optimizer itself — only by tests that want to build a
//! CFG/SSA graph without hand-managing handles.

use crate::ir::function::Function;
use crate::ir::handle::{CfgHandle, SsaHandle};
use crate::ir::opcode::Opcode;
use crate::ir::types::Type;
use crate::ir::value::{ConstValue, Value};

pub struct FunctionBuilder {
    func: Function,
}

impl FunctionBuilder {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { func: Function::new(name) }
    }

    #[must_use]
    pub const fn entry(&self) -> CfgHandle {
        self.func.cfg().entry()
    }

    pub fn add_block(&mut self) -> CfgHandle {
        self.func.cfg_mut().add_block()
    }

    pub fn add_edge(&mut self, from: CfgHandle, to: CfgHandle) {
        self.func.cfg_mut().add_edge(from, to);
    }

    pub fn param(&mut self, block: CfgHandle, ty: Type) -> SsaHandle {
        self.func.params.push(ty.clone());
        self.func.emplace_ssa(Opcode::Param, ty, block, Vec::new())
    }

    pub fn op(&mut self, block: CfgHandle, op: Opcode, ty: Type, inputs: Vec<Value>) -> SsaHandle {
        self.func.emplace_ssa(op, ty, block, inputs)
    }

    pub fn branch(&mut self, block: CfgHandle, cond: SsaHandle) -> SsaHandle {
        self.func.emplace_ssa(Opcode::If, Type::Bool, block, vec![Value::Handle(cond)])
    }

    pub fn phi(&mut self, block: CfgHandle, ty: Type, inputs: Vec<Value>) -> SsaHandle {
        self.func.emplace_ssa(Opcode::Phi, ty, block, inputs)
    }

    pub fn const_i32(&self, v: i32) -> Value {
        Value::Const(ConstValue::I32(v))
    }

    pub fn const_bool(&self, v: bool) -> Value {
        Value::Const(ConstValue::Bool(v))
    }

    #[must_use]
    pub fn finish(self) -> Function {
        self.func
    }
}
