// src/ir/printer.rs
//! `Display` dump of a function's CFG/SSA, used by snapshot tests and
//! `--verbose` debugging. Kept separate from the data types themselves,
//! mirroring the teacher's dedicated printing layer.

use std::fmt;

use crate::ir::function::Function;
use crate::ir::value::Value;

pub struct FunctionPrinter<'a>(pub &'a Function);

impl fmt::Display for FunctionPrinter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let func = self.0;
        writeln!(f, "fn {}() {{", func.name)?;
        for block in func.cfg().blocks() {
            writeln!(f, "{block}:")?;
            for h in func.cfg().block(block).all() {
                let node = func.node(h);
                if node.dead {
                    continue;
                }
                let inputs = node.inputs.iter().map(render_value).collect::<Vec<_>>().join(", ");
                writeln!(f, "    {h} = {}({inputs}) : {}", node.op, node.ty)?;
            }
        }
        writeln!(f, "}}")
    }
}

fn render_value(v: &Value) -> String {
    match v {
        Value::Const(c) => c.to_string(),
        Value::Handle(h) => h.to_string(),
    }
}
